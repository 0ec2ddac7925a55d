//! Translation of raw model responses into one typed completion result.
//!
//! A structured call can come back as function-call arguments, as plain
//! JSON text, as JSON inside a markdown fence, or as JSON wrapped in an
//! envelope object. Everything here is pure so it can be tested without a
//! network call.

use serde_json::Value;

use lanechart_core::Document;

use crate::GenerateError;

/// What a completion call produced, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCompletion {
    pub text: Option<String>,
    /// Arguments of the first function/tool call, as sent by the provider.
    pub function_arguments: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Structured(Value),
}

/// Envelope keys a model sometimes wraps the document in.
const DOCUMENT_KEYS: [&str; 3] = ["document", "documentData", "chart"];

pub fn translate(raw: RawCompletion) -> Result<Completion, GenerateError> {
    if let Some(arguments) = raw.function_arguments.filter(|a| !a.trim().is_empty()) {
        return serde_json::from_str(&arguments)
            .map(Completion::Structured)
            .map_err(|e| GenerateError::Malformed(format!("function arguments: {e}")));
    }

    let text = raw.text.unwrap_or_default();
    let body = strip_fence(text.trim());
    if body.is_empty() {
        return Err(GenerateError::Empty);
    }

    if body.starts_with('{') {
        if let Some(value) = extract_json_object(body) {
            return Ok(Completion::Structured(value));
        }
    }
    Ok(Completion::Text(text.trim().to_string()))
}

/// Free-text process description from a completion.
pub fn description(completion: Completion) -> Result<String, GenerateError> {
    match completion {
        Completion::Text(text) => Ok(text),
        Completion::Structured(value) => match value.get("processDescription") {
            Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
            _ => Err(GenerateError::Malformed(
                "structured description has no processDescription".to_string(),
            )),
        },
    }
}

/// Chart document from a completion. Text is accepted when it carries a
/// JSON object somewhere inside it.
pub fn document(completion: Completion) -> Result<Document, GenerateError> {
    let value = match completion {
        Completion::Structured(value) => value,
        Completion::Text(text) => extract_json_object(&text).ok_or_else(|| {
            GenerateError::Malformed("response contains no JSON object".to_string())
        })?,
    };
    let value = unwrap_envelope(value);
    serde_json::from_value(value).map_err(|e| GenerateError::Malformed(format!("document: {e}")))
}

fn unwrap_envelope(value: Value) -> Value {
    if value.get("pages").is_some() {
        return value;
    }
    for key in DOCUMENT_KEYS {
        match value.get(key) {
            Some(inner) if inner.get("pages").is_some() => return inner.clone(),
            // JSON encoded as a string inside the envelope
            Some(Value::String(s)) => {
                if let Ok(inner) = serde_json::from_str::<Value>(s) {
                    if inner.get("pages").is_some() {
                        return inner;
                    }
                }
            }
            _ => {}
        }
    }
    value
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the span from the first `{` to the last `}` as a JSON object.
fn extract_json_object(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()
        .filter(Value::is_object)
}
