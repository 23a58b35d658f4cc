//! Secured/insecure partition and collision extraction

use envset_param::{ParamMap, ParamValue, Parameter};

use crate::keys::{is_entity, SERVICES};

/// Output stream a parameter map is assembled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Deployment values and credentials
    Deploy,
    /// Runtime (technical configuration) parameters
    Technical,
    /// Namespace cleanup parameters
    Cleanup,
    /// Pipeline and end-to-end test parameters
    E2e,
}

impl StreamKind {
    /// Entity subtrees of this stream are split leaf by leaf
    #[inline]
    #[must_use]
    pub fn splits_entities(self) -> bool {
        matches!(self, Self::Deploy)
    }
}

/// A pair of parameter maps, one per output file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamPair {
    /// Non-secured parameters
    pub parameters: ParamMap,
    /// Secured parameters
    pub credentials: ParamMap,
}

impl StreamPair {
    /// Create from both halves
    #[inline]
    #[must_use]
    pub fn new(parameters: ParamMap, credentials: ParamMap) -> Self {
        Self {
            parameters,
            credentials,
        }
    }

    /// Both halves are empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.credentials.is_empty()
    }
}

/// Split `params` by the `secured` flag.
///
/// Entity collections always stay in the non-secured half. For the
/// deployment stream their subtrees are split per leaf, so a secured
/// service value lands in the secured half under the same entity path.
/// Both halves come back in lexicographic key order.
#[must_use]
pub fn split_by_secure(params: &ParamMap, kind: StreamKind) -> StreamPair {
    let mut pair = StreamPair::default();
    for (key, param) in params {
        if is_entity(key) {
            if kind.splits_entities() {
                let (secured, insecure) = split_entity(param);
                pair.credentials.insert(key.clone(), secured);
                pair.parameters.insert(key.clone(), insecure);
            } else {
                pair.parameters.insert(key.clone(), param.clone());
            }
        } else if param.secured {
            pair.credentials.insert(key.clone(), param.clone());
        } else {
            pair.parameters.insert(key.clone(), param.clone());
        }
    }
    pair.parameters.sort_keys();
    pair.credentials.sort_keys();
    pair
}

/// Split one entity collection. Every member keeps an entry on both sides.
fn split_entity(entity: &Parameter) -> (Parameter, Parameter) {
    let Some(members) = entity.as_mapping() else {
        return if entity.secured {
            (entity.clone(), with_value(entity, ParamValue::Mapping(ParamMap::new())))
        } else {
            (with_value(entity, ParamValue::Mapping(ParamMap::new())), entity.clone())
        };
    };

    let mut secured = ParamMap::new();
    let mut insecure = ParamMap::new();
    for (name, member) in members {
        let (s, i) = match member.as_mapping() {
            Some(_) => {
                let (s, i) = split_tree(member);
                let empty = || with_value(member, ParamValue::Mapping(ParamMap::new()));
                (s.unwrap_or_else(empty), i.unwrap_or_else(empty))
            }
            None if member.secured => (
                member.clone(),
                with_value(member, ParamValue::Mapping(ParamMap::new())),
            ),
            None => (
                with_value(member, ParamValue::Mapping(ParamMap::new())),
                member.clone(),
            ),
        };
        secured.insert(name.clone(), s);
        insecure.insert(name.clone(), i);
    }
    (
        with_value(entity, ParamValue::Mapping(secured)),
        with_value(entity, ParamValue::Mapping(insecure)),
    )
}

/// Split below member level. Sides left without leaves are dropped.
fn split_tree(param: &Parameter) -> (Option<Parameter>, Option<Parameter>) {
    if param.secured {
        return (Some(param.clone()), None);
    }
    let Some(map) = param.as_mapping() else {
        return (None, Some(param.clone()));
    };
    if map.is_empty() {
        return (None, Some(param.clone()));
    }

    let mut secured = ParamMap::new();
    let mut insecure = ParamMap::new();
    for (key, child) in map {
        let (s, i) = split_tree(child);
        if let Some(s) = s {
            secured.insert(key.clone(), s);
        }
        if let Some(i) = i {
            insecure.insert(key.clone(), i);
        }
    }
    let side = |m: ParamMap| (!m.is_empty()).then(|| with_value(param, ParamValue::Mapping(m)));
    (side(secured), side(insecure))
}

fn with_value(param: &Parameter, value: ParamValue) -> Parameter {
    Parameter {
        value,
        ..param.clone()
    }
}

/// Remove top-level keys that shadow a service of the same name.
///
/// Returns the removed entries in their original order. Entity keys are
/// never treated as collisions.
pub fn extract_collisions(params: &mut ParamMap) -> ParamMap {
    let services: Vec<String> = params
        .get(SERVICES)
        .and_then(Parameter::as_mapping)
        .map(|services| services.keys().cloned().collect())
        .unwrap_or_default();

    let mut collisions = ParamMap::new();
    for name in services {
        if is_entity(&name) {
            continue;
        }
        if let Some(param) = params.shift_remove(&name) {
            tracing::debug!("parameter '{}' collides with service of the same name", name);
            collisions.insert(name, param);
        }
    }
    collisions
}
