//! Final output layout: entity members first, then the `global` group

use envset_param::{ParamMap, ParamValue, Parameter};

use crate::keys::{ENTITIES, GLOBAL};

/// Arrange one stream for output.
///
/// Entity collections are flattened in [`ENTITIES`] order into one map of
/// member name to member parameters (a later collection wins on a name
/// clash). Everything else becomes the `global` group, emitted after the
/// members. With `per_service` set, every member map also receives a copy
/// of the group under its own `global` key.
#[must_use]
pub fn arrange_final(mut params: ParamMap, per_service: bool) -> ParamMap {
    let mut members = ParamMap::new();
    for entity in ENTITIES {
        let Some(collection) = params.shift_remove(entity) else {
            continue;
        };
        match collection.into_mapping() {
            Some(entries) => members.extend(entries),
            None => tracing::debug!("entity '{}' is not a mapping, skipped", entity),
        }
    }
    members.sort_keys();

    params.sort_keys();
    let global = params;

    if per_service && !global.is_empty() {
        for member in members.values_mut() {
            if let ParamValue::Mapping(entries) = &mut member.value {
                entries.insert(GLOBAL.to_string(), Parameter::new(global.clone()));
            }
        }
    }

    let mut out = members;
    if !global.is_empty() {
        out.shift_remove(GLOBAL);
        out.insert(GLOBAL.to_string(), Parameter::new(global));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: Vec<(&str, Parameter)>) -> ParamMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn sample() -> ParamMap {
        let services = map(vec![
            ("zeta", Parameter::new(map(vec![("P", Parameter::new("z"))]))),
            ("alpha", Parameter::new(map(vec![("P", Parameter::new("a"))]))),
        ]);
        let frontends = map(vec![("ui", Parameter::new(ParamMap::new()))]);
        map(vec![
            ("B", Parameter::new("b")),
            ("services", Parameter::new(services)),
            ("A", Parameter::new("a")),
            ("frontends", Parameter::new(frontends)),
        ])
    }

    #[test]
    fn members_sorted_then_global() {
        let out = arrange_final(sample(), false);
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["alpha", "ui", "zeta", "global"]
        );
        let global = out["global"].as_mapping().unwrap();
        assert_eq!(global.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(!out["alpha"].as_mapping().unwrap().contains_key("global"));
    }

    #[test]
    fn per_service_members_get_global_sibling() {
        let out = arrange_final(sample(), true);
        let alpha = out["alpha"].as_mapping().unwrap();
        assert_eq!(alpha.keys().collect::<Vec<_>>(), vec!["P", "global"]);
        assert_eq!(alpha["global"], out["global"]);
    }

    #[test]
    fn no_global_group_without_globals() {
        let params = map(vec![(
            "services",
            Parameter::new(map(vec![("api", Parameter::new(ParamMap::new()))])),
        )]);
        let out = arrange_final(params, true);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["api"]);
    }
}
