use crate::error::StoreError;
use crate::types::{Complaint, Role, User};
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

pub type Item = HashMap<String, AttributeValue>;

pub const COMPLAINT_PREFIX: &str = "COMPLAINT#";
pub const USER_PREFIX: &str = "USER#";
pub const OWNER_PREFIX: &str = "OWNER#";
pub const DEPARTMENT_PREFIX: &str = "DEPARTMENT#";
pub const CONNECTION_PREFIX: &str = "CONNECTION#";

pub fn complaint_key(id: &str) -> String {
    format!("{}{}", COMPLAINT_PREFIX, id)
}

pub fn user_key(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

pub fn owner_key(user_id: &str) -> String {
    format!("{}{}", OWNER_PREFIX, user_id)
}

pub fn department_key(department: &str) -> String {
    format!("{}{}", DEPARTMENT_PREFIX, department)
}

/// Fixed-width timestamp so the department index sorts by creation time.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn complaint_to_item(complaint: &Complaint) -> Item {
    let pk = complaint_key(&complaint.id);
    let created_at = format_timestamp(&complaint.created_at);

    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity_type".to_string(), AttributeValue::S("complaint".to_string()));
    item.insert("GSI1PK".to_string(), AttributeValue::S(owner_key(&complaint.user_id)));
    item.insert("GSI2PK".to_string(), AttributeValue::S(department_key(&complaint.department)));
    item.insert("GSI2SK".to_string(), AttributeValue::S(created_at.clone()));
    item.insert("message".to_string(), AttributeValue::S(complaint.message.clone()));
    item.insert("category".to_string(), AttributeValue::S(complaint.category.as_str().to_string()));
    item.insert("department".to_string(), AttributeValue::S(complaint.department.clone()));
    item.insert("created_at".to_string(), AttributeValue::S(created_at));
    item.insert("status".to_string(), AttributeValue::S(complaint.status.as_str().to_string()));
    item.insert("user_id".to_string(), AttributeValue::S(complaint.user_id.clone()));
    item.insert("is_anonymous".to_string(), AttributeValue::Bool(complaint.is_anonymous));

    if !complaint.is_anonymous {
        if let Some(email) = &complaint.email {
            item.insert("email".to_string(), AttributeValue::S(email.clone()));
        }
    }
    if let Some(reply) = &complaint.reply {
        item.insert("reply".to_string(), AttributeValue::S(reply.clone()));
    }
    if let Some(section) = &complaint.section {
        item.insert("section".to_string(), AttributeValue::S(section.clone()));
    }
    if let Some(year) = &complaint.year {
        item.insert("year".to_string(), AttributeValue::S(year.clone()));
    }

    item
}

pub fn complaint_from_item(item: &Item) -> Result<Complaint, StoreError> {
    let pk = required_s(item, "PK")?;
    let id = pk
        .strip_prefix(COMPLAINT_PREFIX)
        .ok_or_else(|| StoreError::Malformed(format!("not a complaint key: {}", pk)))?;

    let created_at = required_s(item, "created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Malformed(format!("created_at {}: {}", created_at, e)))?
        .with_timezone(&Utc);

    let is_anonymous = item
        .get("is_anonymous")
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false);

    Ok(Complaint {
        id: id.to_string(),
        message: required_s(item, "message")?,
        category: required_s(item, "category")?.parse().map_err(StoreError::Malformed)?,
        department: required_s(item, "department")?,
        created_at,
        status: required_s(item, "status")?.parse().map_err(StoreError::Malformed)?,
        user_id: required_s(item, "user_id")?,
        is_anonymous,
        email: if is_anonymous { None } else { optional_s(item, "email") },
        reply: optional_s(item, "reply"),
        section: optional_s(item, "section"),
        year: optional_s(item, "year"),
    })
}

pub fn user_to_item(user: &User, created_at: &DateTime<Utc>) -> Item {
    let pk = user_key(&user.user_id);

    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity_type".to_string(), AttributeValue::S("user".to_string()));
    item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
    item.insert("department".to_string(), AttributeValue::S(user.department.clone()));
    item.insert("role".to_string(), AttributeValue::S(user.role.as_str().to_string()));
    item.insert("created_at".to_string(), AttributeValue::S(format_timestamp(created_at)));
    if let Some(year) = &user.year {
        item.insert("year".to_string(), AttributeValue::S(year.clone()));
    }
    if let Some(section) = &user.section {
        item.insert("section".to_string(), AttributeValue::S(section.clone()));
    }
    item
}

pub fn user_from_item(user_id: &str, item: &Item) -> Result<User, StoreError> {
    let role: Role = required_s(item, "role")?.parse().map_err(StoreError::Malformed)?;
    Ok(User {
        user_id: user_id.to_string(),
        email: required_s(item, "email")?,
        department: required_s(item, "department")?,
        year: optional_s(item, "year"),
        section: optional_s(item, "section"),
        role,
    })
}

pub(crate) fn required_s(item: &Item, name: &str) -> Result<String, StoreError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::Malformed(format!("missing attribute {}", name)))
}

pub(crate) fn optional_s(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}
