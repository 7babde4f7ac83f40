use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Values handed to jobs by string key, alongside the component columns.
#[derive(Clone, Default)]
pub struct ExternalData {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ExternalData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.entries.insert(key.into(), Arc::new(value));
        self
    }

    /// Insert a value that is already shared.
    pub fn insert_shared(&mut self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.entries.get(key)
    }

    /// Typed lookup.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        Arc::clone(self.entries.get(key)?).downcast::<T>().ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ExternalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ExternalData").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_checks_the_stored_type() {
        let data = ExternalData::new().with("falloff", 23.0f32).with("name", String::from("cam"));
        assert_eq!(data.get_as::<f32>("falloff").as_deref(), Some(&23.0));
        assert!(data.get_as::<f64>("falloff").is_none());
        assert!(data.get_as::<f32>("missing").is_none());
        assert_eq!(format!("{data:?}"), r#"ExternalData { keys: ["falloff", "name"] }"#);
    }
}
