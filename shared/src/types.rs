use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub department: String,
    pub year: Option<String>,
    pub section: Option<String>,
    pub role: Role,
}

impl User {
    pub fn is_faculty(&self) -> bool {
        self.role == Role::Faculty
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub department: String,
    pub year: Option<String>,
    pub section: Option<String>,
}

// ========== COMPLAINT ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Academic,
    Facilities,
    Harassment,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academic => "academic",
            Category::Facilities => "facilities",
            Category::Harassment => "harassment",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(Category::Academic),
            "facilities" => Ok(Category::Facilities),
            "harassment" => Ok(Category::Harassment),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Complaint status. Any status may follow any other.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "inProgress",
            Status::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "inProgress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: String,
    pub message: String,
    pub category: Category,
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub user_id: String,
    pub is_anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub section: Option<String>,
    pub year: Option<String>,
}

impl Complaint {
    /// Copy without the submitter email when the complaint is anonymous.
    pub fn redacted(&self) -> Complaint {
        let mut complaint = self.clone();
        if complaint.is_anonymous {
            complaint.email = None;
        }
        complaint
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitComplaintRequest {
    pub message: String,
    pub category: Category,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Status,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

/// Status filter used by the triage view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => complaint.status == *status,
        }
    }

    pub fn apply(&self, complaints: Vec<Complaint>) -> Vec<Complaint> {
        complaints.into_iter().filter(|c| self.matches(c)).collect()
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}
