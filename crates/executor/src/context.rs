use std::time::{Duration, Instant};

use nanoid::nanoid;
use serde::Serialize;

use crate::env::Environment;

pub const FUNCTION_VERSION: &str = "1";

const ID_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b',
    'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u',
    'v', 'w', 'x', 'y', 'z',
];

/// Read-only view of an invocation's identity and budget.
///
/// The remaining time is advisory: nothing here cancels a handler when the
/// budget runs out. Handlers that want to stop early poll
/// [`InvocationContext::remaining_time_millis`].
#[derive(Debug, Clone)]
pub struct InvocationContext {
    function_name: String,
    memory_limit_mb: u32,
    timeout_sec: u32,
    request_id: String,
    env: Environment,
    created_at: Instant,
}

impl InvocationContext {
    pub fn new(function_name: impl Into<String>, memory_limit_mb: u32, timeout_sec: u32) -> Self {
        Self {
            function_name: function_name.into(),
            memory_limit_mb,
            timeout_sec,
            request_id: nanoid!(21, &ID_ALPHABET),
            env: Environment::default(),
            created_at: Instant::now(),
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function_version(&self) -> &'static str {
        FUNCTION_VERSION
    }

    pub fn memory_limit_mb(&self) -> u32 {
        self.memory_limit_mb
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Milliseconds left in the budget, floored at zero.
    pub fn remaining_time_millis(&self) -> u64 {
        self.remaining_time_millis_at(Instant::now())
    }

    pub fn remaining_time_millis_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.created_at);
        Duration::from_secs(u64::from(self.timeout_sec))
            .saturating_sub(elapsed)
            .as_millis() as u64
    }

    /// Plain data handed to script handlers alongside the live remaining-time op.
    pub fn descriptor(&self) -> ContextDescriptor<'_> {
        ContextDescriptor {
            function_name: &self.function_name,
            function_version: FUNCTION_VERSION,
            memory_limit_in_mb: self.memory_limit_mb,
            timeout_sec: self.timeout_sec,
            request_id: &self.request_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDescriptor<'a> {
    pub function_name: &'a str,
    pub function_version: &'a str,
    #[serde(rename = "memoryLimitInMB")]
    pub memory_limit_in_mb: u32,
    pub timeout_sec: u32,
    pub request_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_counts_down_from_timeout() {
        let ctx = InvocationContext::new("fn", 128, 3);
        let start = ctx.created_at();
        assert_eq!(ctx.remaining_time_millis_at(start), 3_000);
        assert_eq!(
            ctx.remaining_time_millis_at(start + Duration::from_millis(1_250)),
            1_750
        );
    }

    #[test]
    fn remaining_time_truncates_sub_millisecond_parts() {
        let ctx = InvocationContext::new("fn", 128, 1);
        let start = ctx.created_at();
        let now = start + Duration::from_micros(400_700);
        assert_eq!(ctx.remaining_time_millis_at(now), 599);
    }

    #[test]
    fn remaining_time_floors_at_zero() {
        let ctx = InvocationContext::new("fn", 128, 2);
        let start = ctx.created_at();
        assert_eq!(ctx.remaining_time_millis_at(start + Duration::from_secs(2)), 0);
        assert_eq!(ctx.remaining_time_millis_at(start + Duration::from_secs(3600)), 0);
    }

    #[test]
    fn remaining_time_never_increases() {
        let ctx = InvocationContext::new("fn", 128, 1);
        let start = ctx.created_at();
        let mut previous = u64::MAX;
        for step in 0..30 {
            let remaining = ctx.remaining_time_millis_at(start + Duration::from_millis(step * 50));
            assert!(remaining <= previous);
            previous = remaining;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn zero_timeout_has_no_budget() {
        let ctx = InvocationContext::new("fn", 128, 0);
        assert_eq!(ctx.remaining_time_millis(), 0);
    }

    #[test]
    fn each_context_gets_its_own_request_id() {
        let a = InvocationContext::new("fn", 128, 30);
        let b = InvocationContext::new("fn", 128, 30);
        assert_eq!(a.request_id().len(), 21);
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.function_version(), "1");
    }

    #[test]
    fn descriptor_uses_script_field_names() {
        let ctx = InvocationContext::new("orders", 256, 10);
        let value = serde_json::to_value(ctx.descriptor()).unwrap();
        assert_eq!(value["functionName"], "orders");
        assert_eq!(value["functionVersion"], "1");
        assert_eq!(value["memoryLimitInMB"], 256);
        assert_eq!(value["timeoutSec"], 10);
    }
}
