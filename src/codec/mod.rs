//! Ledger document encodings.
//!
//! Two layouts are supported:
//!
//! - [`LedgerFormat::Lines`]: the positional layout, three lines per record
//!   (payload, prefab index, scale). No header and no record count, so a
//!   reader that miscounts is misaligned for every record that follows.
//! - [`LedgerFormat::Json`]: a keyed, versioned document. This is the default
//!   for new ledgers.
//!
//! Both encodings carry the same logical fields, and both represent an empty
//! ledger as a document that decodes to zero records.

mod json;
mod lines;

use serde::{Deserialize, Serialize};

use crate::record::AnchorRecord;

pub use self::json::*;
pub use self::lines::*;

pub const DEFAULT_SCALE_PRECISION: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerFormat {
    Lines,
    #[default]
    Json,
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum FormatError {
    #[error("line {line}: ledger ends in the middle of a record, expected {expected}")]
    Truncated { line: usize, expected: &'static str },

    #[error("line {line}: invalid prefab index {value:?}")]
    PrefabIndex { line: usize, value: String },

    #[error("line {line}: invalid scale {value:?}")]
    Scale { line: usize, value: String },

    #[error("record {record}: empty payload")]
    EmptyPayload { record: usize },

    #[error("record {record}: payload contains a line break")]
    MultilinePayload { record: usize },

    #[error("record {record}: scale is not finite")]
    NonFiniteScale { record: usize },

    #[error("unsupported ledger version {0}")]
    UnsupportedVersion(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    pub format: LedgerFormat,
    /// Decimal places used for scale components in the line format.
    pub precision: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            format: LedgerFormat::default(),
            precision: DEFAULT_SCALE_PRECISION,
        }
    }
}

impl Codec {
    pub fn new(format: LedgerFormat, precision: usize) -> Self {
        Self { format, precision }
    }

    pub fn encode(&self, records: &[AnchorRecord]) -> Result<String, FormatError> {
        for (record, anchor) in records.iter().enumerate() {
            if anchor.payload.is_empty() {
                return Err(FormatError::EmptyPayload { record });
            }

            if !anchor.scale.is_finite() {
                return Err(FormatError::NonFiniteScale { record });
            }
        }

        match self.format {
            LedgerFormat::Lines => encode_lines(records, self.precision),
            LedgerFormat::Json => encode_json(records),
        }
    }

    pub fn decode(&self, text: &str) -> Result<Vec<AnchorRecord>, FormatError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match self.format {
            LedgerFormat::Lines => decode_lines(text),
            LedgerFormat::Json => decode_json(text),
        }
    }
}
