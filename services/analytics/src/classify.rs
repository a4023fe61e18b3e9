//! Status-bucket classification and per-status dwell times.
//!
//! Pure replays of a request's history against its definition. Nothing in
//! here mutates state; the analytics endpoints aggregate these results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use riva_models::{label_matches_terminal_vocabulary, WorkflowDefinition, WorkflowRequest};

use crate::business_days::business_days_between;

/// The three dashboard buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusBucket {
    /// "Em aberto"
    Open,
    /// "Em processamento"
    InProgress,
    /// "Finalizado"
    Finished,
}

impl std::fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Em aberto"),
            Self::InProgress => write!(f, "Em processamento"),
            Self::Finished => write!(f, "Finalizado"),
        }
    }
}

/// Terminality of a status id in the context of a definition.
///
/// With a definition the status entry decides (explicit flag, then label
/// vocabulary). Orphaned requests fall back to matching the vocabulary
/// against the raw status id.
pub fn is_terminal_status(definition: Option<&WorkflowDefinition>, status_id: &str) -> bool {
    match definition.and_then(|d| d.status(status_id)) {
        Some(status) => status.is_terminal(),
        None => label_matches_terminal_vocabulary(status_id),
    }
}

/// Classify a request into its dashboard bucket.
///
/// A request is open while it sits in the definition's first status with at
/// most its seed history entry. Once history grows, terminal vocabulary
/// takes priority; everything else is in processing.
pub fn classify(definition: Option<&WorkflowDefinition>, request: &WorkflowRequest) -> StatusBucket {
    if let Some(initial) = definition.and_then(|d| d.initial_status()) {
        if request.status == initial.id && request.history.len() <= 1 {
            return StatusBucket::Open;
        }
    }

    if is_terminal_status(definition, &request.status) {
        return StatusBucket::Finished;
    }

    StatusBucket::InProgress
}

/// Dwell time of one history entry.
#[derive(Debug, Clone, Serialize)]
pub struct StatusDwell {
    pub status_id: String,
    pub bucket: StatusBucket,
    pub business_days: i64,
}

/// Walk the history in stored order and compute per-entry dwell times.
///
/// Each entry dwells until the next entry's timestamp, or `now` for the
/// newest one. A terminal entry halts the walk and its own dwell is not
/// counted. Negative durations from out-of-order timestamps are discarded.
pub fn dwell_times(
    definition: Option<&WorkflowDefinition>,
    request: &WorkflowRequest,
    now: DateTime<Utc>,
) -> Vec<StatusDwell> {
    let mut dwells = Vec::new();

    for (index, entry) in request.history.iter().enumerate() {
        if is_terminal_status(definition, &entry.status) {
            break;
        }

        let until = request
            .history
            .get(index + 1)
            .map(|next| next.timestamp)
            .unwrap_or(now);
        let business_days = business_days_between(until, entry.timestamp);
        if business_days < 0 {
            continue;
        }

        let bucket = if index == 0 {
            StatusBucket::Open
        } else {
            StatusBucket::InProgress
        };

        dwells.push(StatusDwell {
            status_id: entry.status.clone(),
            bucket,
            business_days,
        });
    }

    dwells
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use riva_models::{HistoryEntry, StatusDef, UserRef};
    use uuid::Uuid;

    fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "Reembolso".into(),
            "financeiro".into(),
            "owner@riva.com".into(),
            vec![
                StatusDef { id: "em-aberto".into(), label: "Em Aberto".into(), terminal: None },
                StatusDef { id: "em-analise".into(), label: "Em Análise".into(), terminal: None },
                StatusDef { id: "aprovado".into(), label: "Aprovado".into(), terminal: None },
            ],
        )
    }

    fn user() -> UserRef {
        UserRef { id: Uuid::new_v4(), name: "Ana".into() }
    }

    fn request_with_history(def: &WorkflowDefinition, statuses: &[(&str, (i32, u32, u32))]) -> WorkflowRequest {
        let mut request = WorkflowRequest::new(def, &[], user(), "REQ-0001".into()).unwrap();
        request.history.clear();
        for (status, (y, m, d)) in statuses {
            request.history.push(HistoryEntry {
                status: status.to_string(),
                user: user(),
                timestamp: Utc.with_ymd_and_hms(*y, *m, *d, 9, 0, 0).unwrap(),
                notes: None,
            });
        }
        if let Some(last) = request.history.last() {
            request.status = last.status.clone();
            request.last_updated_at = last.timestamp;
            request.submitted_at = request.history[0].timestamp;
        }
        request
    }

    #[test]
    fn test_single_entry_in_first_status_is_open() {
        let def = definition();
        let request = request_with_history(&def, &[("em-aberto", (2024, 6, 3))]);
        assert_eq!(classify(Some(&def), &request), StatusBucket::Open);
    }

    #[test]
    fn test_single_entry_not_in_first_status_is_not_open() {
        let def = definition();
        let request = request_with_history(&def, &[("em-analise", (2024, 6, 3))]);
        assert_eq!(classify(Some(&def), &request), StatusBucket::InProgress);
    }

    #[test]
    fn test_terminal_label_wins_once_history_grows() {
        let def = definition();
        let request = request_with_history(
            &def,
            &[("em-aberto", (2024, 6, 3)), ("aprovado", (2024, 6, 5))],
        );
        assert_eq!(classify(Some(&def), &request), StatusBucket::Finished);
    }

    #[test]
    fn test_terminal_classification_ignores_history_length() {
        let def = definition();
        let request = request_with_history(&def, &[("aprovado", (2024, 6, 3))]);
        assert_eq!(classify(Some(&def), &request), StatusBucket::Finished);
    }

    #[test]
    fn test_orphaned_request_classifies_by_vocabulary_only() {
        let request = request_with_history(&definition(), &[("finalizado", (2024, 6, 3))]);
        assert_eq!(classify(None, &request), StatusBucket::Finished);

        let request = request_with_history(&definition(), &[("em-aberto", (2024, 6, 3))]);
        assert_eq!(classify(None, &request), StatusBucket::InProgress);
    }

    #[test]
    fn test_explicit_terminal_flag_changes_classification() {
        let mut def = definition();
        def.statuses.push(StatusDef {
            id: "encerrado".into(),
            label: "Encerrado".into(),
            terminal: Some(true),
        });
        let request = request_with_history(
            &def,
            &[("em-aberto", (2024, 6, 3)), ("encerrado", (2024, 6, 5))],
        );
        assert_eq!(classify(Some(&def), &request), StatusBucket::Finished);
    }

    #[test]
    fn test_dwell_walk_buckets_first_entry_as_open() {
        let def = definition();
        let request = request_with_history(
            &def,
            &[
                ("em-aberto", (2024, 6, 3)),  // Monday
                ("em-analise", (2024, 6, 5)), // Wednesday: open dwell = 2
                ("aprovado", (2024, 6, 7)),   // Friday: analise dwell = 2, terminal halts
            ],
        );
        let now = Utc.with_ymd_and_hms(2024, 6, 28, 9, 0, 0).unwrap();
        let dwells = dwell_times(Some(&def), &request, now);

        assert_eq!(dwells.len(), 2);
        assert_eq!(dwells[0].bucket, StatusBucket::Open);
        assert_eq!(dwells[0].business_days, 2);
        assert_eq!(dwells[1].bucket, StatusBucket::InProgress);
        assert_eq!(dwells[1].business_days, 2);
    }

    #[test]
    fn test_dwell_of_newest_entry_runs_until_now() {
        let def = definition();
        let request = request_with_history(&def, &[("em-aberto", (2024, 6, 3))]);
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

        let dwells = dwell_times(Some(&def), &request, now);
        assert_eq!(dwells.len(), 1);
        assert_eq!(dwells[0].business_days, 5);
    }

    #[test]
    fn test_negative_dwell_from_out_of_order_timestamps_is_discarded() {
        let def = definition();
        let request = request_with_history(
            &def,
            &[
                ("em-aberto", (2024, 6, 10)),
                ("em-analise", (2024, 6, 3)), // clock skew: earlier than predecessor
                ("em-analise", (2024, 6, 12)),
            ],
        );
        let now = Utc.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).unwrap();

        let dwells = dwell_times(Some(&def), &request, now);
        // The negative first span is dropped, the rest still accumulate.
        assert_eq!(dwells.len(), 2);
        assert!(dwells.iter().all(|d| d.business_days >= 0));
    }

    #[test]
    fn test_terminal_entry_halts_accumulation() {
        let def = definition();
        let request = request_with_history(
            &def,
            &[
                ("em-aberto", (2024, 6, 3)),
                ("aprovado", (2024, 6, 5)),
                ("em-analise", (2024, 6, 7)), // reopened after terminal
            ],
        );
        let now = Utc.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).unwrap();

        let dwells = dwell_times(Some(&def), &request, now);
        assert_eq!(dwells.len(), 1);
        assert_eq!(dwells[0].status_id, "em-aberto");
    }
}
