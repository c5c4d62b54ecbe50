//! Offline sync reconciliation.
//!
//! Mobile clients record observations offline and submit them in batches
//! under at-least-once delivery, so the server must tolerate resubmission
//! of rows it has already stored. Each item is evaluated independently:
//!
//! - duplicate (`datastream`, `phenomenonTime`, `result` all equal to an
//!   existing row) → reported as a no-op, nothing written
//! - new → created, stamped with one common `serverTimestamp` and tagged
//!   with the client's `syncBatchId`
//! - invalid → an indexed error the client uses to retry only that item
//!
//! There is no whole-batch rollback: the batch always commits for the
//! succeeding subset. State machine per batch:
//! Submitted → Validating → {per item: Created | Duplicate | Rejected} →
//! Committed.

use crate::error::Result;
use obsdb_core::{EntityId, Observation, ResultValue, Timestamp};
use obsdb_store::{CancelFlag, EntityRepository, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// One client-recorded observation in a sync batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncObservation {
    pub datastream_id: EntityId,
    pub phenomenon_time: Timestamp,
    pub result: JsonValue,
    #[serde(default)]
    pub result_time: Option<Timestamp>,
    #[serde(default)]
    pub result_quality: Option<String>,
    #[serde(default)]
    pub parameters: Option<JsonValue>,
    /// When the client recorded the observation (client clock).
    #[serde(default)]
    pub client_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub feature_of_interest_id: Option<EntityId>,
}

/// A sync batch submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub thing_id: EntityId,
    /// The client's last successful sync time. Advisory: recorded for
    /// traceability, not used to reject items.
    #[serde(default)]
    pub since_timestamp: Option<Timestamp>,
    /// Client-chosen batch tag; generated when absent.
    #[serde(default)]
    pub sync_batch_id: Option<String>,
    pub observations: Vec<SyncObservation>,
}

/// A per-item failure, indexed so the client can retry selectively.
#[derive(Debug, Clone, Serialize)]
pub struct SyncItemError {
    pub index: usize,
    pub message: String,
}

/// The reconciliation report returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// The commit-time stamp applied to every created row.
    pub server_timestamp: Timestamp,
    pub sync_batch_id: String,
    /// Rows created by this batch.
    pub created: usize,
    /// Duplicates detected and skipped (no-ops).
    pub updated: usize,
    pub errors: Vec<SyncItemError>,
}

pub struct SyncReconciler {
    repo: Arc<EntityRepository>,
}

impl SyncReconciler {
    pub fn new(repo: Arc<EntityRepository>) -> Self {
        Self { repo }
    }

    /// Reconcile a batch against server state. Partial success is the
    /// contract: item failures never abort the batch.
    pub fn sync(&self, request: SyncRequest, cancel: &CancelFlag) -> Result<SyncReport> {
        // The referenced thing must exist; authorization against it is the
        // caller's concern (checked at the HTTP boundary).
        if !self
            .repo
            .tables()
            .things
            .read()
            .contains_key(&request.thing_id)
        {
            return Err(StoreError::not_found(format!("Things({})", request.thing_id)).into());
        }

        let server_timestamp = Timestamp::now();
        let sync_batch_id = request
            .sync_batch_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut created = 0usize;
        let mut updated = 0usize;
        let mut errors = Vec::new();
        let mut to_insert: Vec<Observation> = Vec::new();

        for (index, item) in request.observations.iter().enumerate() {
            if cancel.is_cancelled() {
                // Already-validated items still commit; the remainder is
                // reported for retry, keeping the batch at Committed.
                errors.push(SyncItemError {
                    index,
                    message: "cancelled before processing; retry this item".into(),
                });
                continue;
            }
            match self.reconcile_item(&request, item) {
                Ok(ItemOutcome::Duplicate) => updated += 1,
                // A batch may itself carry the same row twice (client retry
                // queues): dedup against rows staged in this batch too.
                Ok(ItemOutcome::Create(obs))
                    if to_insert.iter().any(|o| {
                        o.datastream_id == obs.datastream_id
                            && o.phenomenon_time == obs.phenomenon_time
                            && o.result == obs.result
                    }) =>
                {
                    updated += 1;
                }
                Ok(ItemOutcome::Create(mut obs)) => {
                    obs.server_timestamp = Some(server_timestamp.clone());
                    obs.sync_batch_id = Some(sync_batch_id.clone());
                    obs.id = self.repo.tables().allocate_id();
                    to_insert.push(obs);
                    created += 1;
                }
                Err(message) => errors.push(SyncItemError { index, message }),
            }
        }

        self.repo.observations().insert_bulk(to_insert);

        info!(
            thing = %request.thing_id,
            batch = %sync_batch_id,
            created,
            duplicates = updated,
            failed = errors.len(),
            "sync batch committed"
        );

        Ok(SyncReport {
            server_timestamp,
            sync_batch_id,
            created,
            updated,
            errors,
        })
    }

    fn reconcile_item(
        &self,
        request: &SyncRequest,
        item: &SyncObservation,
    ) -> std::result::Result<ItemOutcome, String> {
        let datastream = self
            .repo
            .tables()
            .datastreams
            .read()
            .get(&item.datastream_id)
            .cloned()
            .ok_or_else(|| format!("unknown datastream Datastreams({})", item.datastream_id))?;

        if datastream.thing_id != request.thing_id {
            return Err(format!(
                "Datastreams({}) does not belong to Things({})",
                item.datastream_id, request.thing_id
            ));
        }

        if item.result.is_null() {
            return Err("result must not be null".into());
        }
        let result = ResultValue::from_json(item.result.clone());

        // At-least-once delivery: an identical row may already exist.
        if self
            .repo
            .observations()
            .find_duplicate(item.datastream_id, &item.phenomenon_time, &result)
            .is_some()
        {
            return Ok(ItemOutcome::Duplicate);
        }

        if let Some(foi) = item.feature_of_interest_id {
            if !self.repo.tables().features.read().contains_key(&foi) {
                return Err(format!("unknown FeatureOfInterest({})", foi));
            }
        }

        Ok(ItemOutcome::Create(Observation {
            id: EntityId(0),
            datastream_id: item.datastream_id,
            feature_of_interest_id: item.feature_of_interest_id,
            phenomenon_time: item.phenomenon_time.clone(),
            result_time: item.result_time.clone(),
            result,
            result_quality: item.result_quality.clone(),
            parameters: item.parameters.clone(),
            client_timestamp: item.client_timestamp.clone(),
            server_timestamp: None,
            sync_batch_id: None,
        }))
    }
}

enum ItemOutcome {
    Create(Observation),
    Duplicate,
}
