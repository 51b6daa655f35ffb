//! Operation history shared by the calculator tools.

use crate::clients::Collaborator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// One recorded calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Sequential identifier, starting at 1.
    pub id: u64,

    /// Tool that produced the result.
    pub operation: String,

    /// Inputs in call order.
    pub operands: Vec<f64>,

    /// Computed result.
    pub result: f64,

    /// When the result was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// In-memory log of every calculation in this process.
///
/// Constructed once per process by the client manager and shared by every
/// calculator tool and resource.
#[derive(Debug, Default)]
pub struct OperationLog {
    entries: Mutex<Vec<Operation>>,
}

impl OperationLog {
    /// Append a calculation and return the stored record.
    pub fn record(&self, operation: &str, operands: Vec<f64>, result: f64) -> Operation {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = Operation {
            id: entries.len() as u64 + 1,
            operation: operation.to_string(),
            operands,
            result,
            recorded_at: Utc::now(),
        };
        entries.push(entry.clone());
        entry
    }

    /// Look up a calculation by id.
    pub fn get(&self, id: u64) -> Option<Operation> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|op| op.id == id)
            .cloned()
    }

    /// All calculations, oldest first.
    pub fn all(&self) -> Vec<Operation> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded calculations.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Collaborator for OperationLog {
    fn construct() -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    async fn authenticate(&self) -> bool {
        true
    }
}
