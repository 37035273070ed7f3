use serde::{Deserialize, Serialize};

use crate::codec::FormatError;
use crate::record::AnchorRecord;

pub const LEDGER_VERSION: u32 = 1;

#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
    version: u32,
    anchors: &'a [AnchorRecord],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LedgerDocument {
    version: u32,
    #[serde(default)]
    anchors: Vec<AnchorRecord>,
}

pub fn encode_json(records: &[AnchorRecord]) -> Result<String, FormatError> {
    let document = LedgerDocumentRef {
        version: LEDGER_VERSION,
        anchors: records,
    };

    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn decode_json(text: &str) -> Result<Vec<AnchorRecord>, FormatError> {
    let document: LedgerDocument = serde_json::from_str(text)?;

    if document.version != LEDGER_VERSION {
        return Err(FormatError::UnsupportedVersion(document.version));
    }

    for (record, anchor) in document.anchors.iter().enumerate() {
        if anchor.payload.is_empty() {
            return Err(FormatError::EmptyPayload { record });
        }

        if !anchor.scale.is_finite() {
            return Err(FormatError::NonFiniteScale { record });
        }
    }

    Ok(document.anchors)
}
