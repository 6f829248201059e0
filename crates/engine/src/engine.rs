use std::time::Instant;

use serde_json::Value;

use executor::{
    Environment, ExecutorError, HandlerCache, InvocationContext, Resolver, dispatch,
};

use crate::envelope::InvocationRequest;
use crate::outcome::InvocationOutcome;

/// Owns the resolver, the handler cache and the accumulated environment.
///
/// `invoke` takes `&mut self`, so one engine runs exactly one invocation at a
/// time. Separate engines share nothing.
pub struct ExecutionEngine {
    resolver: Resolver,
    cache: HandlerCache,
    env: Environment,
    invocations: u64,
    failures: u64,
}

impl ExecutionEngine {
    /// Engine seeded with a snapshot of the process environment.
    pub fn new(resolver: Resolver) -> Self {
        Self::with_env(resolver, Environment::from_process())
    }

    pub fn with_env(resolver: Resolver, env: Environment) -> Self {
        Self {
            resolver,
            cache: HandlerCache::new(),
            env,
            invocations: 0,
            failures: 0,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn cache(&self) -> &HandlerCache {
        &self.cache
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn invoke(&mut self, request: InvocationRequest) -> InvocationOutcome {
        let started = Instant::now();
        let function_name = request.function_name.clone();
        let descriptor = request.handler.clone();
        self.invocations += 1;

        let mut cache_hit = None;
        let result = self.run(request, &mut cache_hit);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => tracing::info!(
                "invocation of {} ({}) completed in {:.2}ms, cache_hit: {}",
                function_name,
                descriptor,
                duration_ms,
                cache_hit.unwrap_or(false)
            ),
            Err(err) => {
                self.failures += 1;
                tracing::warn!(
                    "invocation of {} ({}) failed after {:.2}ms: {}: {}",
                    function_name,
                    descriptor,
                    duration_ms,
                    err.kind(),
                    err
                );
            }
        }
        InvocationOutcome::from(result)
    }

    fn run(
        &mut self,
        request: InvocationRequest,
        cache_hit: &mut Option<bool>,
    ) -> Result<Value, ExecutorError> {
        let applied = self.env.apply(&request.env);
        if applied > 0 {
            tracing::debug!("applied {} environment override(s)", applied);
        }
        self.resolver.prepare(&self.env)?;

        let (handler, hit) =
            self.cache
                .get_or_resolve(&request.code, &request.handler, &mut self.resolver)?;
        *cache_hit = Some(hit);

        let context = InvocationContext::new(
            request.function_name,
            request.memory_mb,
            request.timeout_sec,
        )
        .with_env(self.env.clone());
        tracing::debug!(
            "dispatching {} handler, request id {}",
            handler.kind(),
            context.request_id()
        );
        dispatch(handler, request.event, &context)
    }

    pub fn stats(&self) -> Value {
        serde_json::json!({
            "invocations": self.invocations,
            "failures": self.failures,
            "resolutions": self.resolver.resolutions(),
            "loader": self.resolver.loader_name(),
            "env_vars": self.env.len(),
            "cache": self.cache.stats(),
        })
    }
}
