//! Tool directive parsing: extracts a handoff request from free-form AI replies.
//!
//! The NagaAgent model asks for a tool by embedding a JSON object in its reply.
//! Two delimiters are recognized:
//!
//! 1. **Full-width sentinel**: the object body wrapped in `｛ … ｝`:
//!    ```text
//!    Let me look that up. ｛"service_name": "search", "query": "rust"｝
//!    ```
//!    The sentinel itself signals intent, so no `agentType` check applies.
//!
//! 2. **ASCII braces**: a plain JSON object in prose, accepted only when it
//!    carries both `agentType` and `service_name` and `agentType` is `"mcp"`:
//!    ```text
//!    Calling {"agentType": "mcp", "service_name": "calc", "a": 1} now.
//!    ```
//!
//! The parser never fails: malformed JSON is the same as "no tool requested".

use serde_json::{Map, Value};

use super::types::ToolDirective;

const SENTINEL_OPEN: char = '｛';
const SENTINEL_CLOSE: char = '｝';

/// The only `agentType` accepted on the ASCII-brace path.
const MCP_AGENT_TYPE: &str = "mcp";

/// Keys stripped from the directive object before it becomes `params`.
const RESERVED_KEYS: &[&str] = &["service_name", "agentType"];

/// Parse a tool directive out of an AI reply, if one is present.
pub fn parse_directive(text: &str) -> Option<ToolDirective> {
    if let Some(inner) = find_sentinel_block(text) {
        let json = format!("{{{}}}", inner.trim());
        let object = parse_object(&json)?;
        return directive_from_object(object);
    }

    let object = find_mcp_object(text)?;
    if object.get("agentType").and_then(Value::as_str) != Some(MCP_AGENT_TYPE) {
        tracing::debug!(
            agent_type = ?object.get("agentType"),
            "ignoring directive with non-mcp agentType"
        );
        return None;
    }
    directive_from_object(object)
}

/// Return the text between the first `｛` and the next `｝`.
fn find_sentinel_block(text: &str) -> Option<&str> {
    let open = text.find(SENTINEL_OPEN)?;
    let body_start = open + SENTINEL_OPEN.len_utf8();
    let close = text[body_start..].find(SENTINEL_CLOSE)?;
    Some(&text[body_start..body_start + close])
}

/// Find the first balanced `{ … }` object that has both directive keys.
///
/// Objects that fail to parse or lack either key are skipped, so unrelated
/// JSON embedded in prose does not shadow a later directive.
fn find_mcp_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    for (start, &b) in bytes.iter().enumerate() {
        if b != b'{' {
            continue;
        }
        let Some(end) = find_matching_brace(text, start) else {
            continue;
        };
        let Some(object) = parse_object(&text[start..=end]) else {
            continue;
        };
        if object.contains_key("agentType") && object.contains_key("service_name") {
            return Some(object);
        }
    }
    None
}

/// Find the `}` matching the `{` at byte offset `start`.
///
/// Braces inside JSON string literals are ignored, and backslash escapes
/// inside strings are honored.
fn find_matching_brace(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_object(json: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Map<String, Value>>(json) {
        Ok(object) => Some(object),
        Err(e) => {
            tracing::debug!(error = %e, "directive JSON did not parse");
            None
        }
    }
}

/// Build the directive from a parsed object; requires a non-empty `service_name`.
fn directive_from_object(mut object: Map<String, Value>) -> Option<ToolDirective> {
    let service_name = object
        .get("service_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?
        .to_string();

    for key in RESERVED_KEYS {
        object.remove(*key);
    }

    Some(ToolDirective {
        service_name,
        params: object,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
