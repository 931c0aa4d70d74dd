//! Operation results and the response shape handed to front-ends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::intent::IntentType;

const GENERIC_FAILURE: &str = "operation failed";

/// Outcome of one dispatched intent. Built by a handler, never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Command lines executed (or, in dry-run, that would be executed)
    #[serde(default)]
    pub commands: Vec<String>,
    /// Remediation hints for the user
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Map::new(),
            error: None,
            duration: None,
            commands: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// A failed result. An empty error text becomes a generic one.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            error
        };
        Self {
            success: false,
            message: String::new(),
            data: Map::new(),
            error: Some(error),
            duration: None,
            commands: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn with_commands(mut self, commands: Vec<String>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    /// String values stored under `data.packages`
    pub fn packages(&self) -> Vec<&str> {
        self.data
            .get("packages")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// What a front-end renders or serializes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Response {
    pub fn from_result(result: &OperationResult) -> Self {
        Self {
            success: result.success,
            text: result.message.clone(),
            error: result.error.clone(),
            data: result.data.clone(),
            suggestions: result.suggestions.clone(),
            commands: result.commands.clone(),
            intent: None,
            duration: result.duration,
        }
    }

    pub fn with_intent(mut self, intent: IntentType) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Replace the display text (personality formatting)
    pub fn with_text(mut self, text: String) -> Self {
        self.text = text;
        self
    }

    pub fn into_result(self) -> OperationResult {
        OperationResult {
            success: self.success,
            message: self.text,
            data: self.data,
            error: self.error,
            duration: self.duration,
            commands: self.commands,
            suggestions: self.suggestions,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<&OperationResult> for Response {
    fn from(result: &OperationResult) -> Self {
        Self::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_never_empty() {
        let result = OperationResult::failure("   ");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("operation failed"));
    }

    #[test]
    fn test_packages_from_data() {
        let result = OperationResult::success("found")
            .with_data("packages", vec!["vim".to_string(), "emacs".to_string()]);
        assert_eq!(result.packages(), vec!["vim", "emacs"]);
        assert!(OperationResult::success("x").packages().is_empty());
    }

    #[test]
    fn test_response_json_omits_empty_error() {
        let response = Response::from_result(&OperationResult::success("ok"));
        let json = response.to_json();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
    }
}
