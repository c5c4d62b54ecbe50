//! Bulk array-encoded ingestion.
//!
//! The wire format trades JSON overhead for throughput: one datastream
//! reference, an ordered component list, and positional value rows:
//!
//! ```json
//! {
//!   "datastream": 5,
//!   "components": ["phenomenonTime", "result", "FeatureOfInterest/id"],
//!   "rows": [["2024-01-15T10:30:00Z", 21.5, 9], ...]
//! }
//! ```
//!
//! The whole batch commits as a single unit. Validation runs over every
//! row before anything is written; any failure returns the complete
//! per-row error list and writes nothing. Cancellation is honored between
//! validation row groups — once the commit begins it runs to completion,
//! because partial application is not an allowed outcome here.

use crate::error::{IngestError, Result, RowError};
use obsdb_core::{EntityId, Observation, ResultValue, Timestamp};
use obsdb_store::{CancelFlag, EntityRepository};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Rows validated per cancellation check.
const VALIDATE_CHUNK: usize = 1024;

/// Recognized component names, in canonical order.
const COMPONENTS: &[&str] = &[
    "phenomenonTime",
    "result",
    "resultTime",
    "resultQuality",
    "parameters",
    "FeatureOfInterest/id",
];

/// A bulk creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    /// Target datastream id. Accepts either `datastream` or the long-form
    /// `datastreamRef` key.
    #[serde(alias = "datastreamRef")]
    pub datastream: EntityId,
    /// Ordered component names; each row is positionally aligned to these.
    pub components: Vec<String>,
    /// Value rows.
    pub rows: Vec<Vec<JsonValue>>,
}

/// Identities of the created observations, in row order.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedObservations {
    pub created: Vec<EntityId>,
}

pub struct BulkIngestPipeline {
    repo: Arc<EntityRepository>,
}

impl BulkIngestPipeline {
    pub fn new(repo: Arc<EntityRepository>) -> Self {
        Self { repo }
    }

    /// Ingest a batch: decode, validate everything, then commit as one
    /// unit. Exactly N observations exist afterwards, or zero.
    pub fn ingest(&self, request: BulkRequest, cancel: &CancelFlag) -> Result<CreatedObservations> {
        let max_rows = self.repo.config().max_batch_rows;
        if request.rows.len() > max_rows {
            return Err(IngestError::validation(format!(
                "batch of {} rows exceeds the configured maximum of {}",
                request.rows.len(),
                max_rows
            )));
        }

        let layout = ComponentLayout::resolve(&request.components)?;

        let datastream = self
            .repo
            .tables()
            .datastreams
            .read()
            .get(&request.datastream)
            .cloned()
            .ok_or_else(|| {
                IngestError::validation(format!(
                    "unknown datastream reference Datastreams({})",
                    request.datastream
                ))
            })?;

        // Decode and validate every row before any write.
        let mut drafts = Vec::with_capacity(request.rows.len());
        let mut errors = Vec::new();
        for (chunk_start, chunk) in request.rows.chunks(VALIDATE_CHUNK).enumerate() {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            for (offset, row) in chunk.iter().enumerate() {
                let index = chunk_start * VALIDATE_CHUNK + offset;
                match layout.decode_row(row, datastream.id) {
                    Ok(obs) => drafts.push(obs),
                    Err(message) => errors.push(RowError {
                        row: index,
                        message,
                    }),
                }
            }
        }

        // Feature references are validated once, across the whole batch.
        let features = self.repo.tables().features.read();
        for (index, draft) in drafts.iter().enumerate() {
            if let Some(foi) = draft.feature_of_interest_id {
                if !features.contains_key(&foi) {
                    errors.push(RowError {
                        row: index,
                        message: format!("unknown FeatureOfInterest({})", foi),
                    });
                }
            }
        }
        drop(features);

        if !errors.is_empty() {
            errors.sort_by_key(|e| e.row);
            return Err(IngestError::RowErrors { errors });
        }
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        // Commit: assign identities and append through the store's bulk
        // path (grouped per partition, one lock acquisition per group).
        let mut created = Vec::with_capacity(drafts.len());
        for draft in &mut drafts {
            draft.id = self.repo.tables().allocate_id();
            created.push(draft.id);
        }
        let rows = drafts.len();
        self.repo.observations().insert_bulk(drafts);

        info!(
            datastream = %datastream.id,
            rows,
            "bulk batch committed"
        );
        Ok(CreatedObservations { created })
    }
}

/// Resolved positions of each component within a row.
struct ComponentLayout {
    phenomenon_time: usize,
    result: usize,
    result_time: Option<usize>,
    result_quality: Option<usize>,
    parameters: Option<usize>,
    feature_id: Option<usize>,
    width: usize,
}

impl ComponentLayout {
    fn resolve(components: &[String]) -> Result<Self> {
        let mut seen = vec![false; COMPONENTS.len()];
        let find = |name: &str| -> Option<usize> { components.iter().position(|c| c == name) };

        for (i, component) in components.iter().enumerate() {
            let Some(known) = COMPONENTS.iter().position(|c| c == component) else {
                return Err(IngestError::validation(format!(
                    "unknown component '{}' at position {}",
                    component, i
                )));
            };
            if seen[known] {
                return Err(IngestError::validation(format!(
                    "duplicate component '{}'",
                    component
                )));
            }
            seen[known] = true;
        }

        let phenomenon_time = find("phenomenonTime").ok_or_else(|| {
            IngestError::validation("component list must include 'phenomenonTime'")
        })?;
        let result = find("result")
            .ok_or_else(|| IngestError::validation("component list must include 'result'"))?;

        Ok(Self {
            phenomenon_time,
            result,
            result_time: find("resultTime"),
            result_quality: find("resultQuality"),
            parameters: find("parameters"),
            feature_id: find("FeatureOfInterest/id"),
            width: components.len(),
        })
    }

    fn decode_row(
        &self,
        row: &[JsonValue],
        datastream_id: EntityId,
    ) -> std::result::Result<Observation, String> {
        if row.len() != self.width {
            return Err(format!(
                "row has {} values, component list has {}",
                row.len(),
                self.width
            ));
        }

        let phenomenon_time = row[self.phenomenon_time]
            .as_str()
            .ok_or_else(|| "phenomenonTime must be a string".to_string())
            .and_then(|s| Timestamp::parse(s).map_err(|e| e.to_string()))?;

        let result_value = row[self.result].clone();
        if result_value.is_null() {
            return Err("result must not be null".to_string());
        }
        let result = ResultValue::from_json(result_value);

        let result_time = match self.result_time {
            Some(i) if !row[i].is_null() => Some(
                row[i]
                    .as_str()
                    .ok_or_else(|| "resultTime must be a string".to_string())
                    .and_then(|s| Timestamp::parse(s).map_err(|e| e.to_string()))?,
            ),
            _ => None,
        };

        let result_quality = match self.result_quality {
            Some(i) if !row[i].is_null() => Some(
                row[i]
                    .as_str()
                    .ok_or_else(|| "resultQuality must be a string".to_string())?
                    .to_string(),
            ),
            _ => None,
        };

        let parameters = match self.parameters {
            Some(i) if !row[i].is_null() => Some(row[i].clone()),
            _ => None,
        };

        let feature_of_interest_id = match self.feature_id {
            Some(i) if !row[i].is_null() => Some(
                row[i]
                    .as_u64()
                    .map(EntityId)
                    .ok_or_else(|| "FeatureOfInterest/id must be an integer".to_string())?,
            ),
            _ => None,
        };

        Ok(Observation {
            id: EntityId(0),
            datastream_id,
            feature_of_interest_id,
            phenomenon_time,
            result_time,
            result,
            result_quality,
            parameters,
            client_timestamp: None,
            server_timestamp: None,
            sync_batch_id: None,
        })
    }
}
