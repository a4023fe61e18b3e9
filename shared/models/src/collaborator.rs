//! Collaborator models.
//!
//! Collaborators are the portal's user records. Permission flags gate the
//! mutating workflow operations server-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Collaborator {
    pub id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Collaborator name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(email(message = "Collaborator email must be a valid email address"))]
    pub email: String,
    pub area_id: String,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSet {
    pub can_manage_requests: bool,
    pub can_manage_definitions: bool,
    pub is_admin: bool,
}

impl PermissionSet {
    pub fn allows_request_management(&self) -> bool {
        self.is_admin || self.can_manage_requests
    }

    pub fn allows_definition_management(&self) -> bool {
        self.is_admin || self.can_manage_definitions
    }
}

impl Collaborator {
    pub fn new(name: String, email: String, area_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            area_id,
            permissions: PermissionSet::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
