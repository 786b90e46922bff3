//! Parses the canonical tool-call envelope into normalized [`ToolCall`]s.

use serde::{Deserialize, Serialize};

use crate::types::ToolCall;

/// The literal marker a [`crate::detector`] sniff looks for at the start
/// of a provider's response.
pub const TOOL_CALLS_MARKER: &str = r#"{"tool_calls":"#;

#[derive(Debug, Deserialize)]
struct Envelope {
    tool_calls: Vec<RawCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawCall {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    function: Option<RawFunction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

fn stringify_arguments(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Parse the canonical `{"tool_calls":[...]}` envelope out of `input`.
///
/// A top-level decode failure produces a single synthetic `_parse_error`
/// call carrying the whole input as its arguments. A successfully
/// decoded envelope whose `tool_calls` array is empty also produces a
/// single synthetic `_parse_error` call, so that case flows through the
/// same per-call error path as every other failure instead of being
/// silently dropped. Once the envelope decodes with entries, each entry
/// missing a non-empty `function.name` becomes its own synthetic
/// `_parse_error` call carrying that entry's own JSON as arguments, so
/// one malformed entry among several valid ones does not discard the
/// rest.
#[must_use]
pub fn parse_tool_calls(input: &[u8]) -> Vec<ToolCall> {
    let envelope: Result<Envelope, _> = serde_json::from_slice(input);
    match envelope {
        Ok(envelope) if envelope.tool_calls.is_empty() => vec![ToolCall {
            id: "call_0".to_string(),
            name: "_parse_error".to_string(),
            arguments: String::from_utf8_lossy(input).into_owned(),
            error: Some("JSON parsed successfully but contains no tool calls".to_string()),
        }],
        Ok(envelope) => envelope
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| parse_entry(idx, raw))
            .collect(),
        Err(e) => vec![ToolCall {
            id: "call_0".to_string(),
            name: "_parse_error".to_string(),
            arguments: String::from_utf8_lossy(input).into_owned(),
            error: Some(format!("invalid tool call envelope: {e}")),
        }],
    }
}

fn parse_entry(idx: usize, raw: RawCall) -> ToolCall {
    let id = format!("call_{idx}");
    let name = raw
        .function
        .as_ref()
        .and_then(|f| f.name.clone())
        .filter(|n| !n.is_empty());

    match name {
        Some(name) => {
            let arguments = raw
                .function
                .and_then(|f| f.arguments)
                .map(stringify_arguments)
                .unwrap_or_default();
            ToolCall {
                id,
                name,
                arguments,
                error: None,
            }
        }
        None => {
            let arguments = serde_json::to_string(&raw).unwrap_or_default();
            ToolCall {
                id,
                name: "_parse_error".to_string(),
                arguments,
                error: Some("tool call entry missing function name".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_valid_call() {
        let input = br#"{"tool_calls":[{"type":"function","function":{"name":"search","arguments":"{\"q\":\"rust\"}"}}]}"#;
        let calls = parse_tool_calls(input);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].id, "call_0");
        assert!(calls[0].error.is_none());
        assert_eq!(calls[0].arguments, r#"{"q":"rust"}"#);
    }

    #[test]
    fn parses_multiple_calls_preserving_order() {
        let input = br#"{"tool_calls":[
            {"type":"function","function":{"name":"a","arguments":"1"}},
            {"type":"function","function":{"name":"b","arguments":"2"}}
        ]}"#;
        let calls = parse_tool_calls(input);
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[1].name, "b");
        assert_eq!(calls[1].id, "call_1");
    }

    #[test]
    fn empty_tool_calls_array_yields_single_synthetic_error_call() {
        let calls = parse_tool_calls(br#"{"tool_calls":[]}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "_parse_error");
        assert_eq!(
            calls[0].error.as_deref(),
            Some("JSON parsed successfully but contains no tool calls")
        );
    }

    #[test]
    fn invalid_json_yields_single_synthetic_error_call() {
        let calls = parse_tool_calls(b"not json at all");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "_parse_error");
        assert!(calls[0].error.is_some());
        assert_eq!(calls[0].arguments, "not json at all");
    }

    #[test]
    fn entry_missing_name_becomes_synthetic_error_without_discarding_siblings() {
        let input = br#"{"tool_calls":[
            {"type":"function","function":{"arguments":"1"}},
            {"type":"function","function":{"name":"b","arguments":"2"}}
        ]}"#;
        let calls = parse_tool_calls(input);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "_parse_error");
        assert!(calls[0].error.is_some());
        assert_eq!(calls[1].name, "b");
        assert!(calls[1].error.is_none());
    }

    #[test]
    fn arguments_object_is_stringified() {
        let input = br#"{"tool_calls":[{"type":"function","function":{"name":"a","arguments":{"q":1}}}]}"#;
        let calls = parse_tool_calls(input);
        assert_eq!(calls[0].arguments, r#"{"q":1}"#);
    }

    proptest::proptest! {
        #[test]
        fn call_ids_are_sequential_and_count_matches_entries(n in 1usize..12) {
            let entries: Vec<String> = (0..n)
                .map(|i| format!(r#"{{"type":"function","function":{{"name":"t{i}","arguments":"{i}"}}}}"#))
                .collect();
            let input = format!(r#"{{"tool_calls":[{}]}}"#, entries.join(","));
            let calls = parse_tool_calls(input.as_bytes());
            prop_assert_eq!(calls.len(), n);
            for (i, call) in calls.iter().enumerate() {
                prop_assert_eq!(call.id.as_str(), format!("call_{i}").as_str());
                prop_assert!(call.error.is_none());
            }
        }
    }
}
