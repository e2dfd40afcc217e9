//! User identity and roles

use serde::{Deserialize, Serialize};

/// Role classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Enrolled student (portal access)
    Student,
    /// Teaching staff
    Faculty,
    /// Console administrator
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Faculty => write!(f, "faculty"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// The server's view of the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    /// Unique user identifier
    pub id: String,
    pub username: String,
    pub role: Role,
    /// Set when the server requires a password change before anything else
    #[serde(default)]
    pub needs_password_reset: bool,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Identity {
    /// Display string for logs and status output
    pub fn display_string(&self) -> String {
        match &self.full_name {
            Some(name) => format!("{} ({})", name, self.role),
            None => format!("{} ({})", self.username, self.role),
        }
    }
}
