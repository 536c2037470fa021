//! Record discovery response parsing
//!
//! The server answers the discovery call with either a list
//!
//! ```xml
//! <Records>
//!   <Record id="6e5c4a8b" label="Jane Doe" />
//! </Records>
//! ```
//!
//! or, for single-record tokens, a bare `<Record id=".." label=".."/>`.

use indivo_domain::{IndivoError, Record};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RecordsDocument {
    #[serde(rename = "Record", default)]
    records: Vec<RecordElement>,
}

#[derive(Debug, Deserialize)]
struct RecordElement {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@label", default)]
    label: Option<String>,
}

impl From<RecordElement> for Record {
    fn from(element: RecordElement) -> Self {
        let label = element.label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        Record::new(element.id.trim(), label)
    }
}

/// Parse a discovery body into records, in document order
///
/// Elements with an empty id are skipped. An empty list is not an error here.
///
/// # Errors
/// Returns `IndivoError::Discovery` if the body is not a records document
pub fn parse_records(body: &str) -> Result<Vec<Record>, IndivoError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let list = quick_xml::de::from_str::<RecordsDocument>(body);
    let elements = match list {
        Ok(document) if !document.records.is_empty() => document.records,
        list => match quick_xml::de::from_str::<RecordElement>(body) {
            Ok(single) => vec![single],
            Err(single_err) => match list {
                Ok(_) => Vec::new(),
                Err(_) => {
                    return Err(IndivoError::Discovery(format!(
                        "unreadable discovery response: {single_err}"
                    )))
                }
            },
        },
    };

    Ok(elements.into_iter().map(Record::from).filter(|r| !r.id.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_list_in_order() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
            <Records>
              <Record id="rec-2" label="Zed" />
              <Record id="rec-1" label=" Ann "><contact>ignored</contact></Record>
            </Records>"#;

        let records = parse_records(body).unwrap();
        assert_eq!(
            records,
            vec![
                Record::new("rec-2", Some("Zed".to_string())),
                Record::new("rec-1", Some("Ann".to_string())),
            ]
        );
    }

    #[test]
    fn parses_single_record_root() {
        let records = parse_records(r#"<Record id="only" />"#).unwrap();
        assert_eq!(records, vec![Record::new("only", None)]);
    }

    #[test]
    fn empty_documents_yield_no_records() {
        assert!(parse_records("").unwrap().is_empty());
        assert!(parse_records("<Records/>").unwrap().is_empty());
        assert!(parse_records("<Records></Records>").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_a_discovery_error() {
        let result = parse_records(r#"<Records><Record id="a"></Records>"#);
        assert!(matches!(result, Err(IndivoError::Discovery(_))));
    }
}
