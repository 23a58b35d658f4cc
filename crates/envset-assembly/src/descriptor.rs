//! Per-service parameters and deploy descriptor blocks
//!
//! Both are pulled out of the deployment stream before partitioning and
//! written to their own outputs.

use envset_param::{ParamMap, Parameter};

use crate::keys::{COMMON_DEPLOY_DESCRIPTOR, DEPLOY_DESCRIPTOR, GLOBAL, PER_SERVICE_PARAMETERS};

/// Remove the per-service block from `deploy`.
///
/// Returns the block in lexicographic order when it is a mapping. A null or
/// scalar block is dropped and yields `None`.
pub fn extract_per_service(deploy: &mut ParamMap) -> Option<ParamMap> {
    let mut block = deploy.shift_remove(PER_SERVICE_PARAMETERS)?.into_mapping()?;
    block.sort_keys();
    Some(block)
}

/// Remove the descriptor blocks from `deploy` and build the descriptor tree.
///
/// With `D` the component descriptor map and `C` the entries hoisted out of
/// every common block, the result is
///
/// ```text
/// global: { deployDescriptor: D }
/// deployDescriptor: D
/// <component>: { C..., deployDescriptor: D, global: { deployDescriptor: D } }
/// C...
/// ```
///
/// A missing or null common block yields an empty tree.
pub fn merge_deploy_descriptor(deploy: &mut ParamMap) -> ParamMap {
    let common = deploy.shift_remove(COMMON_DEPLOY_DESCRIPTOR);
    let descriptor = deploy.shift_remove(DEPLOY_DESCRIPTOR);

    let Some(common) = common.filter(|c| !c.value.is_null()) else {
        tracing::debug!("no common deploy descriptor, descriptor tree left empty");
        return ParamMap::new();
    };

    let mut components = descriptor
        .and_then(Parameter::into_mapping)
        .unwrap_or_default();
    components.sort_keys();

    let mut blocks = common.into_mapping().unwrap_or_default();
    blocks.sort_keys();
    let mut hoisted = ParamMap::new();
    for (_, block) in blocks {
        if let Some(entries) = block.into_mapping() {
            hoisted.extend(entries);
        }
    }

    let descriptor = Parameter::new(components.clone());
    let mut wrapper = ParamMap::new();
    wrapper.insert(DEPLOY_DESCRIPTOR.to_string(), descriptor.clone());
    let wrapper = Parameter::new(wrapper);

    let mut per_component = hoisted.clone();
    per_component.insert(DEPLOY_DESCRIPTOR.to_string(), descriptor.clone());
    per_component.insert(GLOBAL.to_string(), wrapper.clone());
    let per_component = Parameter::new(per_component);

    let mut tree = ParamMap::new();
    tree.insert(GLOBAL.to_string(), wrapper);
    tree.insert(DEPLOY_DESCRIPTOR.to_string(), descriptor);
    for name in components.keys() {
        tree.insert(name.clone(), per_component.clone());
    }
    tree.extend(hoisted);
    tree
}
