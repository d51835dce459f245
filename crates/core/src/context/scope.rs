use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// One level of the context chain. Reads fall through to the parent, writes
/// stay local.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    values: DashMap<String, Value>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub(crate) fn root() -> Self {
        Self::default()
    }

    pub(crate) fn child(parent: Arc<Scope>) -> Self {
        Self {
            values: DashMap::new(),
            parent: Some(parent),
        }
    }

    pub(crate) fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn parent(&self) -> Option<&Scope> {
        self.parent.as_deref()
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value.value().clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(key))
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains(key))
    }

    pub(crate) fn insert(&self, key: String, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Value> {
        self.values.remove(key).map(|(_, value)| value)
    }

    pub(crate) fn local_keys(&self) -> Vec<String> {
        self.values.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn child_reads_through_and_shadows() {
        let root = Arc::new(Scope::root());
        root.insert("shared".into(), json!(1));
        root.insert("shadowed".into(), json!("root"));

        let child = Scope::child(Arc::clone(&root));
        child.insert("shadowed".into(), json!("child"));

        assert_eq!(child.lookup("shared"), Some(json!(1)));
        assert_eq!(child.lookup("shadowed"), Some(json!("child")));
        assert_eq!(root.lookup("shadowed"), Some(json!("root")));
        assert!(child.contains("shared"));
        assert!(!child.is_root());
    }

    #[test]
    fn siblings_do_not_see_each_other() {
        let root = Arc::new(Scope::root());
        let left = Scope::child(Arc::clone(&root));
        let right = Scope::child(Arc::clone(&root));

        left.insert("only_left".into(), json!(true));

        assert!(right.lookup("only_left").is_none());
        assert!(root.lookup("only_left").is_none());
    }

    #[test]
    fn remove_only_touches_local_entries() {
        let root = Arc::new(Scope::root());
        root.insert("key".into(), json!("root"));
        let child = Scope::child(Arc::clone(&root));

        assert!(child.remove("key").is_none());
        assert_eq!(child.lookup("key"), Some(json!("root")));
    }
}
