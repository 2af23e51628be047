use std::collections::BTreeMap;
use std::sync::LazyLock;

use dexa_models::reasoning::{ReasoningStep, IMPLICIT_THOUGHT};
use regex::Regex;
use tracing::debug;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`{3,}").expect("Invalid regex"));

/// Every `Action:` line and its value. `Action Input:` does not match.
static ACTION_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action:[ \t]*([^\n\r]*)").expect("Invalid regex"));

static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Thought:\s*(.*?)[\n\r]+\s*Action:\s*([^\n\r]+)[\n\r]+\s*Action Input:")
        .expect("Invalid regex")
});

static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Thought:(.*?)(?:Action:\s*None\s*)?Answer:(.*)$").expect("Invalid regex")
});

static ACTION_NONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Thought:(.*?)Action:\s*None\b\s*(.*)$").expect("Invalid regex")
});

static THOUGHT_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Thought:(.*)$").expect("Invalid regex"));

/// `key: value` pairs with single, double, or no quotes on either side.
static LOOSE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:"(\w+)"|'(\w+)'|(\w+))\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|([^,}\s][^,}]*))"#,
    )
    .expect("Invalid regex")
});

/// Classify one block of model output.
///
/// Priority: no `Thought:` means the whole text is the answer; an explicit
/// tool call wins over an answer; then `Answer:`; anything else is a parse
/// error. A bare `Action: None` without `Answer:` is not an answer.
pub fn parse(text: &str) -> ReasoningStep {
    if !text.contains("Thought:") {
        return ReasoningStep::answer(IMPLICIT_THOUGHT, text);
    }

    let cleaned = FENCE_RE.replace_all(text, "");

    if has_tool_call(&cleaned) {
        return parse_tool_call(&cleaned, text);
    }

    if cleaned.contains("Answer:") {
        return parse_answer(&cleaned, text);
    }

    ReasoningStep::parse_error(text, "found Thought but neither Action nor Answer")
}

fn is_none_sentinel(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("none")
}

fn has_tool_call(text: &str) -> bool {
    ACTION_LINE_RE
        .captures_iter(text)
        .any(|c| !is_none_sentinel(&c[1]))
}

fn parse_tool_call(cleaned: &str, raw: &str) -> ReasoningStep {
    let Some(caps) = TOOL_CALL_RE.captures(cleaned) else {
        return ReasoningStep::parse_error(
            raw,
            "expected Thought, Action and Action Input on consecutive lines",
        );
    };

    let thought = caps[1].trim().to_string();
    let action = caps[2].trim().to_string();
    let input_start = caps.get(0).map_or(cleaned.len(), |m| m.end());
    let rest = &cleaned[input_start..];

    let Some(object) = extract_first_object(rest) else {
        return ReasoningStep::parse_error(raw, "Action Input is not an object");
    };

    match decode_action_input(object) {
        Some(action_input) => ReasoningStep::Action {
            thought,
            action,
            action_input,
        },
        None => ReasoningStep::parse_error(
            raw,
            format!("could not decode Action Input: {object}"),
        ),
    }
}

fn parse_answer(cleaned: &str, raw: &str) -> ReasoningStep {
    if let Some(caps) = ANSWER_RE.captures(cleaned) {
        return ReasoningStep::answer(caps[1].trim(), caps[2].trim());
    }

    if let Some(caps) = ACTION_NONE_RE.captures(cleaned) {
        let thought = caps[1].trim();
        let answer = caps[2].trim();
        // Nothing after the sentinel: the thought is all the model said.
        let answer = if answer.is_empty() { thought } else { answer };
        return ReasoningStep::answer(thought, answer);
    }

    if let Some(caps) = THOUGHT_ONLY_RE.captures(cleaned) {
        let thought = caps[1].trim();
        return ReasoningStep::answer(thought, thought);
    }

    ReasoningStep::parse_error(raw, "could not locate the answer")
}

/// Strict JSON first, then the permissive key/value reading.
fn decode_action_input(object: &str) -> Option<BTreeMap<String, String>> {
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(object) {
        Ok(map) => Some(
            map.into_iter()
                .map(|(k, v)| (k, stringify_value(v)))
                .collect(),
        ),
        Err(e) => {
            debug!(error = %e, "Action Input is not strict JSON, trying permissive decode");
            let loose = decode_permissive(object);
            (!loose.is_empty()).then_some(loose)
        }
    }
}

fn stringify_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_permissive(object: &str) -> BTreeMap<String, String> {
    let inner = object
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(object);

    LOOSE_PAIR_RE
        .captures_iter(inner)
        .filter_map(|caps| {
            let key = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str();
            let value = caps
                .get(4)
                .or(caps.get(5))
                .or(caps.get(6))
                .map_or("", |m| m.as_str())
                .trim();
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Find the first balanced `{ ... }`, ignoring braces inside single- or double-quoted strings.
fn extract_first_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match (quote, ch) {
            (Some(_), '\\') => escape_next = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if depth > 0 => quote = Some(ch),
            (None, '{') => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            (None, '}') if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}
