use crate::error::ExecutorError;
use crate::handler::Handler;
use crate::resolver::Resolver;

struct CachedHandler {
    source: String,
    handler: Handler,
}

/// Single-slot memoization of the last resolved handler.
///
/// The slot is keyed on exact source text only. Any byte difference forces a
/// new resolution; a failed resolution leaves the previous slot in place.
/// Callers need `&mut self`, so the read-and-maybe-replace step is never
/// interleaved with another invocation.
#[derive(Default)]
pub struct HandlerCache {
    slot: Option<CachedHandler>,
    hits: u64,
    misses: u64,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve(
        &mut self,
        source: &str,
        descriptor: &str,
        resolver: &mut Resolver,
    ) -> Result<(&mut Handler, bool), ExecutorError> {
        let cache_hit = matches!(&self.slot, Some(cached) if cached.source == source);
        if cache_hit {
            self.hits += 1;
        } else {
            self.misses += 1;
            let handler = resolver.resolve(source, descriptor)?;
            if self.slot.is_some() {
                tracing::debug!("function source changed, replacing cached handler");
            }
            self.slot = Some(CachedHandler {
                source: source.to_string(),
                handler,
            });
        }

        match self.slot.as_mut() {
            Some(cached) => Ok((&mut cached.handler, cache_hit)),
            None => Err(ExecutorError::ModuleLoad(
                "handler cache is empty after resolution".to_string(),
            )),
        }
    }

    pub fn cached_source(&self) -> Option<&str> {
        self.slot.as_ref().map(|cached| cached.source.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn stats(&self) -> serde_json::Value {
        let total = self.hits + self.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };
        serde_json::json!({
            "cached": self.slot.is_some(),
            "cache_hits": self.hits,
            "cache_misses": self.misses,
            "cache_hit_rate": hit_rate,
        })
    }
}
