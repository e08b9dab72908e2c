use crate::store::codec::{optional_s, required_s, Item, CONNECTION_PREFIX};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Error;
use serde::Serialize;

const ENTITY_TYPE: &str = "connection";

/// WebSocket connection stored in DynamoDB
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub department: String,
    pub connected_at: String,
}

fn connection_key(connection_id: &str) -> String {
    format!("{}{}", CONNECTION_PREFIX, connection_id)
}

/// Save a WebSocket connection subscribed to one department's feed
pub async fn save_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    user_id: &str,
    department: &str,
) -> Result<(), Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let pk = connection_key(connection_id);

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("connection_id", AttributeValue::S(connection_id.to_string()))
        .item("user_id", AttributeValue::S(user_id.to_string()))
        .item("department", AttributeValue::S(department.to_string()))
        .item("connected_at", AttributeValue::S(now))
        .item("entity_type", AttributeValue::S(ENTITY_TYPE.to_string()))
        .send()
        .await?;

    tracing::info!(
        "Connection saved: {} (user: {}, department: {})",
        connection_id,
        user_id,
        department
    );
    Ok(())
}

/// Remove a WebSocket connection from DynamoDB
pub async fn remove_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<(), Error> {
    let pk = connection_key(connection_id);

    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;

    tracing::info!("Connection removed: {}", connection_id);
    Ok(())
}

/// Active connections subscribed to `department`
pub async fn connections_for_department(
    client: &DynamoClient,
    table_name: &str,
    department: &str,
) -> Result<Vec<Connection>, Error> {
    let mut connections = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .filter_expression("entity_type = :type AND department = :department")
            .expression_attribute_values(":type", AttributeValue::S(ENTITY_TYPE.to_string()))
            .expression_attribute_values(":department", AttributeValue::S(department.to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await?;

        for item in result.items() {
            match connection_from_item(item) {
                Some(connection) => connections.push(connection),
                None => tracing::warn!("Skipping unreadable connection record"),
            }
        }

        match result.last_evaluated_key() {
            Some(key) if !key.is_empty() => start_key = Some(key.clone()),
            _ => break,
        }
    }

    Ok(connections)
}

fn connection_from_item(item: &Item) -> Option<Connection> {
    Some(Connection {
        connection_id: required_s(item, "connection_id").ok()?,
        user_id: required_s(item, "user_id").ok()?,
        department: required_s(item, "department").ok()?,
        connected_at: optional_s(item, "connected_at").unwrap_or_default(),
    })
}
