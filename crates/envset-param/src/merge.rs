//! Scope merge map
//!
//! Overlay semantics used when stacking scope fragments
//! (tenant → cloud → namespace → application):
//!
//! - both sides are maps: merge key by key, narrower value wins per leaf and
//!   keys only present in the broader map survive
//! - anything else (including lists and container type mismatches): the
//!   narrower value replaces the broader one

use crate::parameter::{ParamMap, ParamValue, Parameter};

/// Merge `incoming` on top of `base`.
///
/// The merged container takes the incoming metadata; leaves keep their own.
#[must_use]
pub fn merge_parameter(base: Parameter, incoming: Parameter) -> Parameter {
    match (base, incoming) {
        (
            Parameter {
                value: ParamValue::Mapping(mut merged),
                origin: base_origin,
                processed: base_processed,
                ..
            },
            Parameter {
                value: ParamValue::Mapping(overlay),
                origin,
                secured,
                processed,
                parsed,
                valid,
            },
        ) => {
            merge_into(&mut merged, overlay);
            Parameter {
                value: ParamValue::Mapping(merged),
                origin: origin.or(base_origin),
                secured,
                processed: processed && base_processed,
                parsed,
                valid,
            }
        }
        (_, incoming) => incoming,
    }
}

fn merge_into(target: &mut ParamMap, overlay: ParamMap) {
    for (key, value) in overlay {
        match target.get_mut(&key) {
            Some(slot) => {
                let prior = std::mem::take(slot);
                *slot = merge_parameter(prior, value);
            }
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Ordered parameter map with overlay-write semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeMap {
    entries: ParamMap,
}

impl MergeMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing map without merging
    #[inline]
    #[must_use]
    pub fn from_map(entries: ParamMap) -> Self {
        Self { entries }
    }

    /// Overlay a single key
    pub fn overlay(&mut self, key: impl Into<String>, incoming: Parameter) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(slot) => {
                let prior = std::mem::take(slot);
                *slot = merge_parameter(prior, incoming);
            }
            None => {
                self.entries.insert(key, incoming);
            }
        }
    }

    /// Overlay every key of `layer`, in its order
    pub fn overlay_all(&mut self, layer: ParamMap) {
        merge_into(&mut self.entries, layer);
    }

    /// New map with `layer` overlaid; `self` is left untouched
    #[must_use]
    pub fn merged_with(&self, layer: &ParamMap) -> Self {
        let mut next = self.clone();
        next.overlay_all(layer.clone());
        next
    }

    /// Look up a key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.entries.get(key)
    }

    /// Check for a key
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key, keeping the order of the others
    pub fn remove(&mut self, key: &str) -> Option<Parameter> {
        self.entries.shift_remove(key)
    }

    /// Number of top-level keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Parameter)> {
        self.entries.iter()
    }

    /// Borrow the underlying map
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &ParamMap {
        &self.entries
    }

    /// Consume into the underlying map
    #[inline]
    #[must_use]
    pub fn into_map(self) -> ParamMap {
        self.entries
    }
}

impl From<ParamMap> for MergeMap {
    fn from(entries: ParamMap) -> Self {
        Self::from_map(entries)
    }
}

impl FromIterator<(String, Parameter)> for MergeMap {
    fn from_iter<I: IntoIterator<Item = (String, Parameter)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.overlay(key, value);
        }
        map
    }
}

impl IntoIterator for MergeMap {
    type Item = (String, Parameter);
    type IntoIter = indexmap::map::IntoIter<String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: &[(&str, Parameter)]) -> ParamMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn narrower_scalar_wins() {
        let mut merged = MergeMap::new();
        merged.overlay("A", Parameter::new("tenant"));
        merged.overlay("A", Parameter::new("namespace"));
        assert_eq!(merged.get("A").unwrap().as_str(), Some("namespace"));
    }

    #[test]
    fn maps_merge_per_leaf() {
        let broad = map(&[
            ("x", Parameter::new("1").with_origin("tenant")),
            ("y", Parameter::new("2").with_origin("tenant")),
        ]);
        let narrow = map(&[("y", Parameter::new("3").with_origin("namespace"))]);

        let mut merged = MergeMap::new();
        merged.overlay("M", Parameter::new(broad));
        merged.overlay("M", Parameter::new(narrow));

        let result = merged.get("M").unwrap().as_mapping().unwrap();
        assert_eq!(result["x"].as_str(), Some("1"));
        assert_eq!(result["x"].origin(), Some("tenant"));
        assert_eq!(result["y"].as_str(), Some("3"));
        assert_eq!(result["y"].origin(), Some("namespace"));
    }

    #[test]
    fn deep_maps_merge_at_every_depth() {
        let broad = map(&[(
            "l1",
            Parameter::new(map(&[(
                "l2",
                Parameter::new(map(&[
                    ("keep", Parameter::new("broad")),
                    ("over", Parameter::new("broad")),
                ])),
            )])),
        )]);
        let narrow = map(&[(
            "l1",
            Parameter::new(map(&[(
                "l2",
                Parameter::new(map(&[("over", Parameter::new("narrow"))])),
            )])),
        )]);

        let mut merged = MergeMap::new();
        merged.overlay_all(broad);
        merged.overlay_all(narrow);

        let l2 = merged.get("l1").unwrap().as_mapping().unwrap()["l2"]
            .as_mapping()
            .unwrap()
            .clone();
        assert_eq!(l2["keep"].as_str(), Some("broad"));
        assert_eq!(l2["over"].as_str(), Some("narrow"));
    }

    #[test]
    fn type_mismatch_replaces() {
        let mut merged = MergeMap::new();
        merged.overlay("M", Parameter::new(map(&[("x", Parameter::new("1"))])));
        merged.overlay("M", Parameter::new("scalar"));
        assert_eq!(merged.get("M").unwrap().as_str(), Some("scalar"));

        merged.overlay("M", Parameter::new(map(&[("y", Parameter::new("2"))])));
        let m = merged.get("M").unwrap().as_mapping().unwrap();
        assert_eq!(m.len(), 1);
        assert!(m.contains_key("y"));
    }

    #[test]
    fn lists_are_replaced_wholesale() {
        let mut merged = MergeMap::new();
        merged.overlay(
            "L",
            Parameter::new(vec![Parameter::new("a"), Parameter::new("b")]),
        );
        merged.overlay("L", Parameter::new(vec![Parameter::new("c")]));
        let items = merged.get("L").unwrap().value.as_sequence().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_str(), Some("c"));
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut merged = MergeMap::new();
        merged.overlay_all(map(&[("b", Parameter::new("1")), ("a", Parameter::new("2"))]));
        merged.overlay_all(map(&[("c", Parameter::new("3")), ("b", Parameter::new("4"))]));
        let keys: Vec<_> = merged.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn merged_with_is_pure() {
        let base = MergeMap::from_map(map(&[("a", Parameter::new("1"))]));
        let next = base.merged_with(&map(&[("a", Parameter::new("2"))]));
        assert_eq!(base.get("a").unwrap().as_str(), Some("1"));
        assert_eq!(next.get("a").unwrap().as_str(), Some("2"));
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut merged: MergeMap = vec![
            ("a".to_string(), Parameter::new("1")),
            ("b".to_string(), Parameter::new("2")),
            ("c".to_string(), Parameter::new("3")),
        ]
        .into_iter()
        .collect();
        assert!(merged.remove("b").is_some());
        let keys: Vec<_> = merged.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a".to_string(), "c".to_string()]);
    }
}
