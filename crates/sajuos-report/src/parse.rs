use serde_json::{Map, Value};

/// Parse a section body from raw LLM output.
///
/// Strips a surrounding markdown code fence, tries the whole text, then falls
/// back to the outermost `{...}` span. Only JSON objects are accepted.
pub fn parse_llm_output(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_code_fence(raw.trim());
    if text.is_empty() {
        return None;
    }

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&text) {
        return Some(obj);
    }

    let json_str = extract_json_object(&text)?;
    match serde_json::from_str::<Value>(json_str) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> String {
    if !text.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = text.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n")
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
