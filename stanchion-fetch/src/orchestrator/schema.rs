//! Shape validation for structured responses.
//!
//! A response is accepted when it parses as a JSON object, carries every
//! required top-level field with a non-null value, and every field declared
//! non-empty is an array with at least one element. Nothing is defaulted.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

use super::attempt::AttemptRecord;
use crate::error::ValidationError;

// ============================================================================
// Schema
// ============================================================================

/// The declared shape of a structured response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSchema {
    required: Vec<String>,
    non_empty: Vec<String>,
}

impl ResponseSchema {
    /// Creates a schema with no requirements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a top-level field.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.required.contains(&field) {
            self.required.push(field);
        }
        self
    }

    /// Requires a top-level field holding a non-empty array.
    pub fn require_non_empty(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self = self.require(field.clone());
        if !self.non_empty.contains(&field) {
            self.non_empty.push(field);
        }
        self
    }

    /// Required field names.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Field names that must be non-empty arrays.
    pub fn non_empty(&self) -> &[String] {
        &self.non_empty
    }

    /// Validates raw model output against this schema.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self, text: &str) -> Result<Map<String, Value>, ValidationError> {
        let object = extract_json(text)?;

        for field in &self.required {
            match object.get(field) {
                None | Some(Value::Null) => {
                    return Err(ValidationError::MissingField(field.clone()));
                }
                Some(_) => {}
            }
        }

        for field in &self.non_empty {
            match object.get(field) {
                Some(Value::Array(items)) if items.is_empty() => {
                    return Err(ValidationError::EmptyArray(field.clone()));
                }
                Some(Value::Array(_)) => {}
                _ => return Err(ValidationError::NotArray(field.clone())),
            }
        }

        Ok(object)
    }
}

/// Extracts the JSON object from model output.
///
/// The text is parsed as-is first. Failing that, the span from the first `{`
/// to the last `}` is tried, which unwraps code fences and surrounding prose.
///
/// # Errors
///
/// Returns [`ValidationError::NotJson`] if no object can be parsed, or
/// [`ValidationError::NotObject`] if the text is JSON but not an object.
pub fn extract_json(text: &str) -> Result<Map<String, Value>, ValidationError> {
    let trimmed = text.trim();

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(direct) => {
            let span = trimmed
                .find('{')
                .zip(trimmed.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &trimmed[start..=end]);
            match span {
                Some(span) => serde_json::from_str::<Value>(span)
                    .map_err(|e| ValidationError::NotJson(e.to_string()))?,
                None => return Err(ValidationError::NotJson(direct.to_string())),
            }
        }
    };

    match value {
        Value::Object(object) => Ok(object),
        _ => Err(ValidationError::NotObject),
    }
}

// ============================================================================
// Structured Response
// ============================================================================

/// A validated structured result.
#[derive(Debug, Clone)]
pub struct StructuredResponse {
    /// Backend that produced the result.
    pub backend_id: String,
    /// The validated object.
    pub value: Map<String, Value>,
    /// Failed attempts made before this result.
    pub failed_attempts: Vec<AttemptRecord>,
    /// Time spent across all attempts.
    pub elapsed: Duration,
}

impl StructuredResponse {
    /// Looks up a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }

    /// Deserialises the validated object into a caller type.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.value.clone()))
    }

    /// Total attempts made, including the successful one.
    pub fn attempt_count(&self) -> usize {
        self.failed_attempts.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ResponseSchema {
        ResponseSchema::new()
            .require("title")
            .require_non_empty("sections")
    }

    #[test]
    fn test_valid_response() {
        let object = schema()
            .validate(r#"{"title": "Sunscreen", "sections": ["intro"]}"#)
            .unwrap();
        assert_eq!(object["title"], "Sunscreen");
    }

    #[test]
    fn test_missing_and_null_fields() {
        assert_eq!(
            schema().validate(r#"{"sections": ["a"]}"#),
            Err(ValidationError::MissingField("title".to_string()))
        );
        assert_eq!(
            schema().validate(r#"{"title": null, "sections": ["a"]}"#),
            Err(ValidationError::MissingField("title".to_string()))
        );
    }

    #[test]
    fn test_non_empty_array_rules() {
        assert_eq!(
            schema().validate(r#"{"title": "x", "sections": []}"#),
            Err(ValidationError::EmptyArray("sections".to_string()))
        );
        assert_eq!(
            schema().validate(r#"{"title": "x", "sections": "intro"}"#),
            Err(ValidationError::NotArray("sections".to_string()))
        );
    }

    #[test]
    fn test_fenced_output_is_unwrapped() {
        let text = "Here you go:\n```json\n{\"title\": \"x\", \"sections\": [1]}\n```\n";
        assert!(schema().validate(text).is_ok());
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            extract_json("I cannot help with that."),
            Err(ValidationError::NotJson(_))
        ));
        assert_eq!(extract_json("[1, 2]"), Err(ValidationError::NotObject));
    }

    #[test]
    fn test_require_is_idempotent() {
        let schema = ResponseSchema::new()
            .require("a")
            .require("a")
            .require_non_empty("a");
        assert_eq!(schema.required(), ["a"]);
        assert_eq!(schema.non_empty(), ["a"]);
    }

    #[test]
    fn test_parse_typed() {
        #[derive(serde::Deserialize)]
        struct Outline {
            title: String,
            sections: Vec<String>,
        }

        let response = StructuredResponse {
            backend_id: "modelA".to_string(),
            value: schema()
                .validate(r#"{"title": "t", "sections": ["a", "b"]}"#)
                .unwrap(),
            failed_attempts: Vec::new(),
            elapsed: Duration::ZERO,
        };
        let outline: Outline = response.parse().unwrap();
        assert_eq!(outline.title, "t");
        assert_eq!(outline.sections.len(), 2);
        assert_eq!(response.attempt_count(), 1);
    }
}
