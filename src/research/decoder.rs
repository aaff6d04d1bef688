//! Structured-output decoding for subtask lists
//!
//! Providers do not always honor a requested schema. Decoding first tries the
//! typed schema, then falls back to a permissive walk over any JSON value that
//! carries a `subtasks` array.

use crate::types::{Subtask, SubtaskList};
use serde_json::{Map, Value};

/// Outcome of decoding a decomposition payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Payload matched the schema exactly
    Strict(SubtaskList),
    /// Payload was JSON with a `subtasks` array but failed the schema
    Loose(SubtaskList),
    /// Neither path produced a list; carries the strict decode error
    Failed(String),
}

impl Decoded {
    pub fn into_list(self) -> Option<SubtaskList> {
        match self {
            Decoded::Strict(list) | Decoded::Loose(list) => Some(list),
            Decoded::Failed(_) => None,
        }
    }
}

/// Decode a provider payload into a subtask list.
pub fn decode(body: &str) -> Decoded {
    let strict_error = match decode_strict(body) {
        Ok(list) => return Decoded::Strict(list),
        Err(e) => e,
    };

    match decode_loose(body) {
        Some(list) => Decoded::Loose(list),
        None => Decoded::Failed(strict_error),
    }
}

fn decode_strict(body: &str) -> Result<SubtaskList, String> {
    let list: SubtaskList = serde_json::from_str(body).map_err(|e| e.to_string())?;
    for (index, subtask) in list.iter().enumerate() {
        if let Some(field) = subtask.first_empty_field() {
            return Err(format!("subtasks[{}].{} is empty", index, field));
        }
    }
    Ok(list)
}

fn decode_loose(body: &str) -> Option<SubtaskList> {
    let value = parse_lenient(body)?;
    let entries = value.get("subtasks")?.as_array()?;

    let subtasks = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(fields) => Subtask {
                id: field_text(fields, "id"),
                title: field_text(fields, "title"),
                description: field_text(fields, "description"),
            },
            other => Subtask {
                id: (index + 1).to_string(),
                title: String::new(),
                description: scalar_text(other),
            },
        })
        .collect();

    Some(SubtaskList::new(subtasks))
}

/// Parse the body as JSON, else the outermost `{...}` span inside it
/// (covers code fences and chatter around the object).
fn parse_lenient(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn field_text(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key).map(scalar_text).unwrap_or_default()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ab() -> SubtaskList {
        SubtaskList::new(vec![
            Subtask::new("A", "Regulation", "Track 2024 ESG disclosure rules."),
            Subtask::new("B", "Capital flows", "Measure ESG fund inflows and outflows."),
        ])
    }

    #[test]
    fn test_conformant_payload_decodes_strictly_in_order() {
        let body = serde_json::to_string(&ab()).unwrap();
        assert_eq!(decode(&body), Decoded::Strict(ab()));
    }

    #[test]
    fn test_empty_list_is_valid() {
        assert_eq!(
            decode(r#"{"subtasks": []}"#),
            Decoded::Strict(SubtaskList::default())
        );
    }

    #[test]
    fn test_extra_fields_fall_back_to_loose() {
        let body = r#"{"subtasks": [
            {"id": "A", "title": "Regulation", "description": "Track 2024 ESG disclosure rules.", "priority": 1},
            {"id": "B", "title": "Capital flows", "description": "Measure ESG fund inflows and outflows."}
        ]}"#;
        assert_eq!(decode(body), Decoded::Loose(ab()));
    }

    #[test]
    fn test_missing_and_empty_fields_are_adopted_as_is() {
        let body = r#"{"subtasks": [{"id": "A", "title": ""}, {"id": 7, "title": "T", "description": null}]}"#;
        let list = decode(body).into_list().unwrap();
        assert_eq!(list.subtasks[0], Subtask::new("A", "", ""));
        assert_eq!(list.subtasks[1], Subtask::new("7", "T", ""));
    }

    #[test]
    fn test_fenced_payload_is_loose() {
        let body = format!(
            "Here you go:\n```json\n{}\n```",
            serde_json::to_string(&ab()).unwrap()
        );
        assert_eq!(decode(&body), Decoded::Loose(ab()));
    }

    #[test]
    fn test_non_object_entries() {
        let list = decode(r#"{"subtasks": ["read the 10-K filings"]}"#)
            .into_list()
            .unwrap();
        assert_eq!(list.subtasks[0].id, "1");
        assert_eq!(list.subtasks[0].description, "read the 10-K filings");
    }

    #[rstest]
    #[case::empty("")]
    #[case::prose("not json at all")]
    #[case::wrong_key(r#"{"tasks": []}"#)]
    #[case::not_a_list(r#"{"subtasks": "A, B"}"#)]
    #[case::reversed_braces("} backwards {")]
    fn test_unusable_payloads_fail(#[case] body: &str) {
        assert!(matches!(decode(body), Decoded::Failed(_)));
    }
}
