//! Structured error types for the Folio pagination engine.
//!
//! Layout only fails on caller misuse: the block and measure lists disagree
//! in length, or a measure does not match the kind of its block. Everything
//! else (degenerate columns, missing margins, empty header boxes) is
//! normalized rather than rejected.

use thiserror::Error;

/// The unified error type returned by all public Folio API functions.
#[derive(Debug, Error)]
pub enum FolioError {
    /// `blocks` and `measures` must be parallel arrays.
    #[error("block/measure count mismatch: {blocks} blocks but {measures} measures")]
    MeasureCountMismatch { blocks: usize, measures: usize },

    /// The measure at `index` describes a different kind of block.
    #[error(
        "measure kind mismatch at block {index} ({block_id}): expected {expected} measure, found {found}"
    )]
    MeasureKindMismatch {
        index: usize,
        block_id: String,
        expected: &'static str,
        found: &'static str,
    },

    /// JSON input failed to parse as a valid layout request.
    #[error("failed to parse layout input: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The layout could not be encoded as JSON.
    #[error("failed to serialize layout: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Result type for Folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the layout input schema. Check block kinds, field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input; is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FolioError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_block_kind_is_a_data_error_with_hint() {
        let err: FolioError = serde_json::from_str::<crate::model::FlowBlock>(
            r#"{ "kind": "footnote", "id": "f1" }"#,
        )
        .unwrap_err()
        .into();
        let msg = err.to_string();
        assert!(msg.contains("unknown variant"), "{msg}");
        assert!(msg.contains("Hint: The JSON is valid"), "{msg}");
    }

    #[test]
    fn count_mismatch_message() {
        let err = FolioError::MeasureCountMismatch {
            blocks: 3,
            measures: 2,
        };
        assert_eq!(
            err.to_string(),
            "block/measure count mismatch: 3 blocks but 2 measures"
        );
    }
}
