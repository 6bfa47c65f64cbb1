use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role reported by the backend at login. Used for UI gating only; the
/// backend remains authoritative for every authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::Viewer => "viewer",
        }
    }

    /// Users list and activity log are admin-only views.
    pub fn can_manage_users(&self) -> bool { matches!(self, UserRole::Admin) }

    pub fn can_view_activity(&self) -> bool { matches!(self, UserRole::Admin) }

    /// Tag and project creation is offered to admins and editors.
    pub fn can_edit_content(&self) -> bool { matches!(self, UserRole::Admin | UserRole::Editor) }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}
