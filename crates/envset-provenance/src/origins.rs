//! Path to origin lookup collected from parameter trees

use indexmap::IndexMap;

use envset_param::{ParamMap, ParamPath, ParamValue, Parameter};

use crate::comment::origin_to_comment;

/// Origins by full path, with a bare-key fallback.
///
/// Full paths use dots between keys and `[i]` for list items, as in
/// `services.api.ports[0]`. The fallback maps a bare key to the origin of
/// the first path ending in that key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginMap {
    by_path: IndexMap<String, String>,
    by_key: IndexMap<String, String>,
}

impl OriginMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the origin of every parameter in `params`
    #[must_use]
    pub fn collect(params: &ParamMap) -> Self {
        let mut origins = Self::new();
        for (key, param) in params {
            origins.visit(&ParamPath::single(key.as_str()), param);
        }
        origins
    }

    fn visit(&mut self, path: &ParamPath, param: &Parameter) {
        if let Some(origin) = param.origin().filter(|o| !o.is_empty()) {
            self.record(path, origin);
        }
        match &param.value {
            ParamValue::Mapping(map) => {
                for (key, child) in map {
                    self.visit(&path.child(key.as_str()), child);
                }
            }
            ParamValue::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.visit(&path.index(i), item);
                }
            }
            _ => {}
        }
    }

    /// Record `origin` for `path`
    pub fn record(&mut self, path: &ParamPath, origin: &str) {
        self.by_path.insert(path.to_string(), origin.to_string());
        if let Some(key) = path.leaf_key() {
            self.by_key
                .entry(key.to_string())
                .or_insert_with(|| origin.to_string());
        }
    }

    /// Origin at the exact `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// Origin at `path`, else the bare-key fallback for `key`
    #[must_use]
    pub fn lookup(&self, path: &str, key: &str) -> Option<&str> {
        self.get(path)
            .or_else(|| self.by_key.get(key).map(String::as_str))
    }

    /// Comment for the key at `path`, if any origin applies
    #[must_use]
    pub fn comment_for(&self, path: &str, key: &str) -> Option<String> {
        self.lookup(path, key).map(origin_to_comment)
    }

    /// Number of recorded paths
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Check if no origin was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
