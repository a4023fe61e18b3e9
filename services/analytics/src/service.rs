//! Analytics Service
//!
//! Aggregates the pure derivations over the request repository: status
//! buckets, resolution time vs. SLA, and per-status dwell time.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;

use riva_database::{DefinitionRepository, PostgresPool, RequestFilter, RequestRepository};
use riva_models::{WorkflowDefinition, WorkflowRequest};
use riva_utils::RivaResult;

use crate::classify::{classify, dwell_times, StatusBucket};
use crate::sla::resolution;

#[derive(Clone)]
pub struct AnalyticsService {
    definitions: DefinitionRepository,
    requests: RequestRepository,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub finished: usize,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResolutionReport {
    pub workflow: String,
    pub finished_requests: usize,
    pub average_business_days: f64,
    pub within_sla: usize,
    pub beyond_sla: usize,
    pub within_sla_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct StatusDwellAverage {
    pub status_id: String,
    pub average_business_days: f64,
    pub samples: usize,
}

#[derive(Debug, Serialize)]
pub struct DwellReport {
    pub open_average_days: f64,
    pub in_progress_average_days: f64,
    pub per_status: Vec<StatusDwellAverage>,
}

impl AnalyticsService {
    pub fn new(pool: PostgresPool) -> Self {
        Self {
            definitions: DefinitionRepository::new(pool.clone()),
            requests: RequestRepository::new(pool),
        }
    }

    /// Bucket counts over live requests.
    pub async fn summary(&self, workflow: Option<String>) -> RivaResult<SummaryReport> {
        let (definitions, requests) = self.load(workflow).await?;

        let mut report = SummaryReport {
            total: requests.len(),
            open: 0,
            in_progress: 0,
            finished: 0,
        };

        for request in &requests {
            match classify(definitions.get(&request.workflow_name), request) {
                StatusBucket::Open => report.open += 1,
                StatusBucket::InProgress => report.in_progress += 1,
                StatusBucket::Finished => report.finished += 1,
            }
        }

        Ok(report)
    }

    /// Resolution time vs. SLA per workflow, over finished requests.
    pub async fn resolution_report(
        &self,
        workflow: Option<String>,
    ) -> RivaResult<Vec<WorkflowResolutionReport>> {
        let (definitions, requests) = self.load(workflow).await?;

        let mut grouped: HashMap<String, (usize, i64, usize, usize)> = HashMap::new();
        for request in &requests {
            let Some(definition) = definitions.get(&request.workflow_name) else {
                // Orphaned requests have no SLA policy left to compare against.
                continue;
            };
            let Some(outcome) = resolution(definition, request) else {
                continue;
            };

            let entry = grouped.entry(request.workflow_name.clone()).or_default();
            entry.0 += 1;
            entry.1 += outcome.business_days;
            if outcome.within_sla {
                entry.2 += 1;
            } else {
                entry.3 += 1;
            }
        }

        let mut report: Vec<WorkflowResolutionReport> = grouped
            .into_iter()
            .map(
                |(workflow, (finished, total_days, within, beyond))| WorkflowResolutionReport {
                    workflow,
                    finished_requests: finished,
                    average_business_days: total_days as f64 / finished as f64,
                    within_sla: within,
                    beyond_sla: beyond,
                    within_sla_rate: within as f64 / finished as f64,
                },
            )
            .collect();
        report.sort_by(|a, b| a.workflow.cmp(&b.workflow));

        Ok(report)
    }

    /// Average dwell time per status and per dashboard bucket.
    pub async fn dwell_report(&self, workflow: Option<String>) -> RivaResult<DwellReport> {
        let (definitions, requests) = self.load(workflow).await?;
        let now = Utc::now();

        let mut per_status: HashMap<String, (i64, usize)> = HashMap::new();
        let mut open = (0i64, 0usize);
        let mut in_progress = (0i64, 0usize);

        for request in &requests {
            for dwell in dwell_times(definitions.get(&request.workflow_name), request, now) {
                let entry = per_status.entry(dwell.status_id.clone()).or_default();
                entry.0 += dwell.business_days;
                entry.1 += 1;

                let bucket = match dwell.bucket {
                    StatusBucket::Open => &mut open,
                    _ => &mut in_progress,
                };
                bucket.0 += dwell.business_days;
                bucket.1 += 1;
            }
        }

        let mut per_status: Vec<StatusDwellAverage> = per_status
            .into_iter()
            .map(|(status_id, (total, samples))| StatusDwellAverage {
                status_id,
                average_business_days: total as f64 / samples as f64,
                samples,
            })
            .collect();
        per_status.sort_by(|a, b| a.status_id.cmp(&b.status_id));

        Ok(DwellReport {
            open_average_days: average(open),
            in_progress_average_days: average(in_progress),
            per_status,
        })
    }

    async fn load(
        &self,
        workflow: Option<String>,
    ) -> RivaResult<(HashMap<String, WorkflowDefinition>, Vec<WorkflowRequest>)> {
        let definitions = self
            .definitions
            .list()
            .await?
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        let filter = RequestFilter {
            workflow_name: workflow,
            status: None,
            include_archived: false,
        };
        let requests = self.requests.list(&filter).await?;

        Ok((definitions, requests))
    }
}

fn average((total, samples): (i64, usize)) -> f64 {
    if samples == 0 {
        0.0
    } else {
        total as f64 / samples as f64
    }
}
