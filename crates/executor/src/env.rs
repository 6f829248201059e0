//! Environment view handed to function code.
//!
//! Overlays from invocation requests accumulate here instead of being written
//! into the process environment. Values persist for the lifetime of the owning
//! engine, so a variable set by one invocation stays visible to the next one.

use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Arc<BTreeMap<String, String>>,
}

impl Environment {
    /// Snapshot of the process environment at call time.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Arc::new(
                vars.into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    /// Merge an overlay; later values win.
    pub fn apply<'a, I>(&mut self, overlay: I) -> usize
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut applied = 0;
        for (key, value) in overlay {
            if self.get(key) == Some(value.as_str()) {
                continue;
            }
            Arc::make_mut(&mut self.vars).insert(key.clone(), value.clone());
            applied += 1;
        }
        applied
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overlay_values_win_and_persist() {
        let mut env = Environment::from_vars([("STAGE", "dev"), ("REGION", "eu")]);
        let overlay = HashMap::from([("STAGE".to_string(), "prod".to_string())]);
        assert_eq!(env.apply(&overlay), 1);
        assert_eq!(env.get("STAGE"), Some("prod"));
        assert_eq!(env.get("REGION"), Some("eu"));

        env.apply(&HashMap::<String, String>::new());
        assert_eq!(env.get("STAGE"), Some("prod"));
    }

    #[test]
    fn unchanged_values_are_not_counted() {
        let mut env = Environment::from_vars([("A", "1")]);
        let overlay = HashMap::from([("A".to_string(), "1".to_string())]);
        assert_eq!(env.apply(&overlay), 0);
    }

    #[test]
    fn clones_do_not_observe_later_overlays() {
        let mut env = Environment::default();
        let before = env.clone();
        env.apply(&HashMap::from([("K".to_string(), "v".to_string())]));
        assert!(before.is_empty());
        assert_eq!(env.len(), 1);
    }
}
