use crate::record::{Payload, ResolvedAnchor};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("anchor {index} could not be resolved")]
pub struct ResolutionFailure {
    /// Position of the record in the persisted ledger.
    pub index: usize,
    pub payload: Payload,
}

/// Outcome of restoring a ledger.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// Resolved anchors, in ledger order.
    pub resolved: Vec<ResolvedAnchor>,
    pub failures: Vec<ResolutionFailure>,
    /// Set when a failure stopped the load before every record was tried.
    pub halted: bool,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&ResolutionFailure> {
        self.failures.first()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.index).collect()
    }
}
