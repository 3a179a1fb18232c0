use std::collections::{BTreeMap, HashMap};

use crate::core::Value;

/// The in-memory side of a persistent collection.
///
/// Hydration writes rows through `set`; `persist_all` reads entries back out
/// through `entries`. Any keyed map can take part.
pub trait Collection {
    fn set(&mut self, key: String, value: Value);

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_>;
}

impl<S: std::hash::BuildHasher> Collection for HashMap<String, Value, S> {
    fn set(&mut self, key: String, value: Value) {
        self.insert(key, value);
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

impl Collection for BTreeMap<String, Value> {
    fn set(&mut self, key: String, value: Value) {
        self.insert(key, value);
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }
}
