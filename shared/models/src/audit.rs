//! Audit log models.
//!
//! Every mutating workflow operation appends a hash-chained entry. Each
//! entry's hash covers its payload and the previous entry's hash, so
//! tampering anywhere breaks verification from that point on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub user_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    DefinitionCreated,
    DefinitionUpdated,
    DefinitionDeleted,
    DefinitionImported,
    RequestSubmitted,
    StatusChanged,
    RequestArchived,
    ActionRequestCreated,
    ActionRequestResolved,
    CollaboratorCreated,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefinitionCreated => write!(f, "definition_created"),
            Self::DefinitionUpdated => write!(f, "definition_updated"),
            Self::DefinitionDeleted => write!(f, "definition_deleted"),
            Self::DefinitionImported => write!(f, "definition_imported"),
            Self::RequestSubmitted => write!(f, "request_submitted"),
            Self::StatusChanged => write!(f, "status_changed"),
            Self::RequestArchived => write!(f, "request_archived"),
            Self::ActionRequestCreated => write!(f, "action_request_created"),
            Self::ActionRequestResolved => write!(f, "action_request_resolved"),
            Self::CollaboratorCreated => write!(f, "collaborator_created"),
        }
    }
}

impl AuditEntry {
    /// Build a new entry chained onto the previous hash (None for the first
    /// entry in the log).
    pub fn chained(
        action: AuditAction,
        entity_type: impl Into<String>,
        entity_id: Uuid,
        user_id: Option<Uuid>,
        details: serde_json::Value,
        previous_hash: Option<String>,
    ) -> Self {
        let timestamp = Utc::now();
        let entity_type = entity_type.into();
        let hash = Self::calculate_hash(
            &action,
            &entity_type,
            entity_id,
            &details,
            &timestamp,
            previous_hash.as_deref(),
        );

        Self {
            id: Uuid::new_v4(),
            timestamp,
            action,
            entity_type,
            entity_id,
            user_id,
            details,
            hash,
            previous_hash,
            created_at: timestamp,
        }
    }

    fn calculate_hash(
        action: &AuditAction,
        entity_type: &str,
        entity_id: Uuid,
        details: &serde_json::Value,
        timestamp: &DateTime<Utc>,
        previous_hash: Option<&str>,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(action.to_string());
        hasher.update(entity_type);
        hasher.update(entity_id.as_bytes());
        hasher.update(details.to_string());
        hasher.update(timestamp.to_rfc3339());
        if let Some(previous) = previous_hash {
            hasher.update(previous);
        }

        hex::encode(hasher.finalize())
    }

    /// Recompute this entry's hash and compare.
    pub fn verify_integrity(&self) -> bool {
        let calculated = Self::calculate_hash(
            &self.action,
            &self.entity_type,
            self.entity_id,
            &self.details,
            &self.timestamp,
            self.previous_hash.as_deref(),
        );
        calculated == self.hash
    }
}

/// Walk a log slice in order, checking each entry's own hash and its linkage
/// to the predecessor. Returns the index of the first invalid entry.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), usize> {
    let mut previous: Option<&str> = None;
    for (index, entry) in entries.iter().enumerate() {
        if entry.previous_hash.as_deref() != previous || !entry.verify_integrity() {
            return Err(index);
        }
        previous = Some(entry.hash.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain(len: usize) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = Vec::with_capacity(len);
        for i in 0..len {
            let previous = entries.last().map(|e: &AuditEntry| e.hash.clone());
            entries.push(AuditEntry::chained(
                AuditAction::StatusChanged,
                "workflow_request",
                Uuid::new_v4(),
                None,
                json!({ "step": i }),
                previous,
            ));
        }
        entries
    }

    #[test]
    fn test_entry_integrity_roundtrip() {
        let entry = AuditEntry::chained(
            AuditAction::RequestSubmitted,
            "workflow_request",
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            json!({ "request_id": "REQ-0001" }),
            None,
        );
        assert!(entry.verify_integrity());

        let mut tampered = entry.clone();
        tampered.details = json!({ "request_id": "REQ-9999" });
        assert!(!tampered.verify_integrity());
    }

    #[test]
    fn test_chain_verification_detects_tampering() {
        let mut entries = chain(5);
        assert_eq!(verify_chain(&entries), Ok(()));

        entries[2].details = json!({ "step": 99 });
        assert_eq!(verify_chain(&entries), Err(2));
    }

    #[test]
    fn test_chain_verification_detects_broken_linkage() {
        let mut entries = chain(3);
        entries[1].previous_hash = None;
        assert_eq!(verify_chain(&entries), Err(1));
    }
}
