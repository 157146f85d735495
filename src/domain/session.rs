use serde::{Deserialize, Serialize};

use super::Role;

/// The authenticated user for one request. Passed explicitly to every use
/// case instead of living in process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub full_name: String,
}

impl Session {
    pub fn new(username: impl Into<String>, role: Role, full_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role,
            full_name: full_name.into(),
        }
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn is_faculty(&self) -> bool {
        self.role == Role::Faculty
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logged in as: {} ({})", self.full_name, self.role)
    }
}
