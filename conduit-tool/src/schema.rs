//! Provider-neutral tool schema and textual/JSON projections.

use serde_json::json;

use crate::tool::Tool;

/// A provider-neutral description of a tool's callable shape, used by
/// clients that need to inject tool definitions as structured JSON
/// rather than the textual block [`format_tools_as_openai`] produces.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&Tool> for ToolSchema {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.schema().clone(),
        }
    }
}

/// Project a tool list into OpenAI's `functions` shape:
/// `{"functions":[{"name","description","parameters"}, ...]}`.
#[must_use]
pub fn to_openai_json(tools: &[std::sync::Arc<Tool>]) -> serde_json::Value {
    let functions: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name(),
                "description": t.description(),
                "parameters": t.schema(),
            })
        })
        .collect();
    json!({ "functions": functions })
}

/// Project a tool list into Gemini's `function_declarations` shape.
#[must_use]
pub fn to_gemini_json(tools: &[std::sync::Arc<Tool>]) -> serde_json::Value {
    let declarations: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name(),
                "description": t.description(),
                "parameters": t.schema(),
            })
        })
        .collect();
    json!({ "function_declarations": declarations })
}

/// Project a tool list into Ollama's `tools` shape (OpenAI-compatible
/// function wrapper).
#[must_use]
pub fn to_ollama_json(tools: &[std::sync::Arc<Tool>]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.schema(),
                }
            })
        })
        .collect();
    json!({ "tools": entries })
}

/// Render a tool list as a human-readable header followed by an
/// OpenAI-style JSON block, for textual injection into a prompt.
///
/// Returns an empty string for an empty tool list.
#[must_use]
pub fn format_tools_as_openai(tools: &[std::sync::Arc<Tool>]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let body = to_openai_json(tools);
    format!(
        "Available functions:\n{}\n",
        serde_json::to_string_pretty(&body).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use std::sync::Arc;

    fn sample_tools() -> Vec<Arc<Tool>> {
        vec![Arc::new(Tool::simple("echo", "echoes input", |s: String| async move {
            Ok(s)
        }))]
    }

    #[test]
    fn empty_list_formats_to_empty_string() {
        assert_eq!(format_tools_as_openai(&[]), "");
    }

    #[test]
    fn non_empty_list_contains_header_and_function_name() {
        let rendered = format_tools_as_openai(&sample_tools());
        assert!(rendered.contains("echo"));
        assert!(rendered.contains("\"functions\""));
    }

    #[test]
    fn non_empty_list_starts_with_the_exact_header_and_ends_with_a_blank_line() {
        let rendered = format_tools_as_openai(&sample_tools());
        assert!(rendered.starts_with("Available functions:\n"));
        assert!(rendered.ends_with('\n'), "block should end with a trailing blank line");
    }

    #[test]
    fn gemini_projection_uses_function_declarations_key() {
        let value = to_gemini_json(&sample_tools());
        assert!(value.get("function_declarations").is_some());
    }

    #[test]
    fn ollama_projection_wraps_each_tool_with_type_function() {
        let value = to_ollama_json(&sample_tools());
        let arr = value["tools"].as_array().unwrap();
        assert_eq!(arr[0]["type"], "function");
    }
}
