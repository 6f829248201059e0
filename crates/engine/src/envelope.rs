use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_HANDLER: &str = "handler.handler";
pub const DEFAULT_FUNCTION_NAME: &str = "unknown";
pub const DEFAULT_MEMORY_MB: u32 = 128;
pub const DEFAULT_TIMEOUT_SEC: u32 = 30;

/// One unit of work. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_handler")]
    pub handler: String,
    #[serde(default = "default_event")]
    pub event: Value,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_function_name")]
    pub function_name: String,
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u32,
}

impl Default for InvocationRequest {
    fn default() -> Self {
        Self {
            code: String::new(),
            handler: default_handler(),
            event: default_event(),
            env: BTreeMap::new(),
            function_name: default_function_name(),
            memory_mb: DEFAULT_MEMORY_MB,
            timeout_sec: DEFAULT_TIMEOUT_SEC,
        }
    }
}

impl InvocationRequest {
    pub fn new(code: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            handler: handler.into(),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event: Value) -> Self {
        self.event = event;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn default_handler() -> String {
    DEFAULT_HANDLER.to_string()
}

fn default_event() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_function_name() -> String {
    DEFAULT_FUNCTION_NAME.to_string()
}

fn default_memory_mb() -> u32 {
    DEFAULT_MEMORY_MB
}

fn default_timeout_sec() -> u32 {
    DEFAULT_TIMEOUT_SEC
}

/// Payload returned to the caller. The outcome lives in `statusCode`; the
/// transport itself always reports success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Failure {
        #[serde(rename = "statusCode")]
        status_code: u16,
        error: String,
        stack: String,
    },
    Success {
        #[serde(rename = "statusCode")]
        status_code: u16,
        body: Value,
    },
}

impl ResponseEnvelope {
    pub fn success(body: Value) -> Self {
        Self::Success {
            status_code: 200,
            body,
        }
    }

    pub fn failure(error: impl Into<String>, stack: impl Into<String>) -> Self {
        Self::Failure {
            status_code: 500,
            error: error.into(),
            stack: stack.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_request_takes_defaults() {
        let request = InvocationRequest::from_slice(b"{}").unwrap();
        assert_eq!(request, InvocationRequest::default());
        assert_eq!(request.handler, "handler.handler");
        assert_eq!(request.event, json!({}));
        assert_eq!(request.function_name, "unknown");
        assert_eq!((request.memory_mb, request.timeout_sec), (128, 30));
    }

    #[test]
    fn partial_request_keeps_given_fields() {
        let request = InvocationRequest::from_slice(
            br#"{"code":"x","event":[1],"env":{"A":"1"},"timeout_sec":5}"#,
        )
        .unwrap();
        assert_eq!(request.code, "x");
        assert_eq!(request.event, json!([1]));
        assert_eq!(request.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(request.timeout_sec, 5);
        assert_eq!(request.memory_mb, 128);
    }

    #[test]
    fn envelopes_serialize_with_status_code() {
        let ok = ResponseEnvelope::success(json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"statusCode": 200, "body": {"ok": true}})
        );

        let err = ResponseEnvelope::failure("boom", "Error: boom");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"statusCode": 500, "error": "boom", "stack": "Error: boom"})
        );
    }

    #[test]
    fn envelopes_parse_back_into_the_right_variant() {
        let value = json!({"statusCode": 500, "error": "boom", "stack": "trace"});
        let parsed: ResponseEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, ResponseEnvelope::failure("boom", "trace"));

        let value = json!({"statusCode": 200, "body": null});
        let parsed: ResponseEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, ResponseEnvelope::success(Value::Null));
    }
}
