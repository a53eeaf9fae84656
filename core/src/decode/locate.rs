//! Finding a JSON object inside free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::error::DecodeError;

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:json)?\s*\n?(.*?)\n?```").ok());

/// Locates and parses the JSON object embedded in `raw`.
///
/// Strategies, in order:
/// 1. The first fenced code block (```` ```json ... ``` ```` or a bare fence).
///    A fenced block that does not parse is an error; the scan does not fall
///    through to step 2.
/// 2. The first balanced `{ ... }` region that parses as JSON, skipping
///    braces inside string literals. Balanced regions that are not JSON,
///    such as the arguments of `\frac{a}{b}`, are passed over.
///
/// # Examples
///
/// ```
/// use gramtex_core::decode::extract_json_value;
///
/// let raw = "Sure!\n```json\n{\"is_valid\": true}\n```";
/// assert_eq!(extract_json_value(raw).unwrap()["is_valid"], true);
///
/// let bare = "verdict: {\"is_valid\": false} done";
/// assert_eq!(extract_json_value(bare).unwrap()["is_valid"], false);
/// ```
pub fn extract_json_value(raw: &str) -> Result<Value, DecodeError> {
    if let Some(block) = fenced_block(raw) {
        let value = serde_json::from_str::<Value>(block.trim())
            .map_err(|source| DecodeError::FencedBlock { source })?;
        return require_object(value);
    }

    let mut first_error = None;
    for candidate in balanced_objects(raw) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return require_object(value),
            Err(source) => {
                first_error.get_or_insert(source);
            }
        }
    }

    Err(first_error.map_or(DecodeError::NoJsonObject, |source| {
        DecodeError::BalancedObject { source }
    }))
}

fn require_object(value: Value) -> Result<Value, DecodeError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(DecodeError::NotAnObject)
    }
}

fn fenced_block(raw: &str) -> Option<&str> {
    let pattern = FENCED_BLOCK.as_ref()?;
    pattern
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Every `{ ... }` slice whose braces balance, in order of their opening brace.
///
/// Each `{` is tried as a start position, so neither unbalanced prose nor a
/// balanced non-JSON group before the real object hides it.
pub(crate) fn balanced_objects(raw: &str) -> impl Iterator<Item = &str> {
    raw.match_indices('{')
        .filter_map(|(start, _)| closing_brace(&raw[start..]).map(|end| &raw[start..=start + end]))
}

/// Byte offset of the brace closing the `{` at position 0 of `text`.
fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }

    None
}
