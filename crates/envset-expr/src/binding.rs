//! Resolution context
//!
//! A [`Binding`] is the set of parameters visible to expressions during one
//! resolution call. It borrows the maps it reads from; nothing is copied or
//! pre-resolved.

use envset_param::{MergeMap, ParamMap, Parameter};

use crate::markers::{single_reference, MAX_NESTING};

/// Parameters available to expressions, with an optional fallback map
#[derive(Debug, Clone, Copy)]
pub struct Binding<'a> {
    scope: &'a ParamMap,
    fallback: Option<&'a ParamMap>,
}

impl<'a> Binding<'a> {
    /// Bind a single map
    #[inline]
    #[must_use]
    pub fn new(scope: &'a ParamMap) -> Self {
        Self {
            scope,
            fallback: None,
        }
    }

    /// Consult `fallback` for names missing from the scope map
    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: &'a ParamMap) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Direct lookup, without following references
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a Parameter> {
        self.scope
            .get(name)
            .or_else(|| self.fallback.and_then(|f| f.get(name)))
    }

    /// Check whether a name is bound
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lookup that follows values consisting of a single reference
    /// (`$OTHER`, `${OTHER}`, `<% OTHER %>`) to the value they point at.
    ///
    /// Chains are followed lazily and at most [`MAX_NESTING`] hops; a cycle
    /// yields the last string reached.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&'a Parameter> {
        self.get(name).map(|found| self.follow(found))
    }

    /// Follow single-reference strings starting at `param`
    #[must_use]
    pub fn follow(&self, param: &'a Parameter) -> &'a Parameter {
        let mut current = param;
        for _ in 0..MAX_NESTING {
            let next = current
                .as_str()
                .filter(|_| !current.processed)
                .and_then(|text| single_reference(text.trim()))
                .and_then(|name| self.get(name));
            match next {
                Some(target) if !std::ptr::eq(target, current) => current = target,
                _ => break,
            }
        }
        current
    }
}

impl<'a> From<&'a ParamMap> for Binding<'a> {
    fn from(scope: &'a ParamMap) -> Self {
        Self::new(scope)
    }
}

impl<'a> From<&'a MergeMap> for Binding<'a> {
    fn from(scope: &'a MergeMap) -> Self {
        Self::new(scope.as_map())
    }
}
