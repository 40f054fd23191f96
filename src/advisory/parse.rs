//! Extraction of the advisory JSON object from free-form LLM output.

use super::{AdvisoryError, AdvisoryMetrics};

/// Parse advisory metrics out of arbitrary surrounding text.
///
/// Takes the widest `{`..`}` span (first opening to last closing brace)
/// and JSON-decodes it. Models often wrap the object in prose or code
/// fences; the greedy span strips both.
pub fn parse_metrics(text: &str) -> Result<AdvisoryMetrics, AdvisoryError> {
    let json_str = extract_json_object(text).ok_or_else(|| {
        AdvisoryError::Malformed("no JSON object found in response".to_string())
    })?;

    serde_json::from_str(json_str).map_err(|e| AdvisoryError::Malformed(e.to_string()))
}

/// Extract the greedy JSON object substring from raw LLM output.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
