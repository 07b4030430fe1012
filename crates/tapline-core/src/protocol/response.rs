//! Response document parsing.
//!
//! The host publishes one JSON document per command:
//!
//! ```json
//! {"responses": [{"status": 0, "output": "7"}, {"status": 1, "output": "TypeError"}]}
//! ```
//!
//! Entry order is result order.

use serde::Deserialize;

use super::CommandResult;
use crate::error::ResponseParseError;

#[derive(Debug, Deserialize)]
struct ResponseDocument {
    responses: Vec<CommandResult>,
}

/// Parse a raw response document into ordered command results.
///
/// Returns `Err` for anything that is not a complete document; the channel
/// treats that the same as "not written yet".
pub fn parse_response(raw: &str) -> Result<Vec<CommandResult>, ResponseParseError> {
    let document: ResponseDocument = serde_json::from_str(raw)?;
    Ok(document.responses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_in_document_order() {
        let raw = r#"{"responses":[
            {"status":0,"output":"first"},
            {"status":1,"output":"second"},
            {"status":-3,"output":"third"}
        ]}"#;
        let results = parse_response(raw).unwrap();
        assert_eq!(
            results,
            vec![
                CommandResult::new(0, "first"),
                CommandResult::new(1, "second"),
                CommandResult::new(-3, "third"),
            ]
        );
    }

    #[test]
    fn empty_collection_yields_no_results() {
        assert!(parse_response(r#"{"responses":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn missing_output_defaults_to_empty() {
        let results = parse_response(r#"{"responses":[{"status":0}]}"#).unwrap();
        assert_eq!(results, vec![CommandResult::new(0, "")]);
    }

    #[test]
    fn output_keeps_embedded_markup_and_newlines() {
        let raw = r#"{"responses":[{"status":0,"output":"<b>15</b>\nnext"}]}"#;
        let results = parse_response(raw).unwrap();
        assert_eq!(results[0].output, "<b>15</b>\nnext");
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(parse_response(r#"{"responses":[{"status":0,"out"#).is_err());
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(parse_response("").is_err());
    }

    #[test]
    fn wrong_shape_is_an_error() {
        assert!(parse_response(r#"[{"status":0,"output":"x"}]"#).is_err());
        assert!(parse_response(r#"{"responses":[{"output":"no status"}]}"#).is_err());
    }
}
