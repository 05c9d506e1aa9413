//! Partitioning of a group snapshot into desired and undesired instances.

use std::cmp::Ordering;

use crate::instance::InstanceDescription;
use crate::settings::{GroupSettings, LeaderSelfUpdatePolicy};

/// Result of classifying a snapshot against one set of group settings.
///
/// Both partitions keep the order of the input snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Instances matching the settings, or protected by self-override.
    pub desired: Vec<InstanceDescription>,

    /// Candidates for replacement.
    pub undesired: Vec<InstanceDescription>,
}

/// Returns true if the instance is the one this controller runs on.
///
/// Matches the native logical id first, then falls back to the logical id
/// tag for backends that have no native notion of logical ids.
pub fn is_self(instance: &InstanceDescription, settings: &GroupSettings) -> bool {
    let Some(self_id) = &settings.self_id else {
        return false;
    };

    if instance.logical_id.as_ref() == Some(self_id) {
        return true;
    }

    instance.tags.logical_id() == Some(self_id.as_str())
}

/// Returns true if the instance must never be destroyed under these settings.
pub fn is_protected(instance: &InstanceDescription, settings: &GroupSettings) -> bool {
    settings.policy == LeaderSelfUpdatePolicy::Never && is_self(instance, settings)
}

/// Returns true if the instance belongs in the desired partition.
pub fn is_desired(instance: &InstanceDescription, settings: &GroupSettings) -> bool {
    instance.tags.config_hash() == Some(settings.config.as_str()) || is_protected(instance, settings)
}

/// Split a snapshot into desired and undesired instances.
pub fn classify<I>(instances: I, settings: &GroupSettings) -> Classification
where
    I: IntoIterator<Item = InstanceDescription>,
{
    let mut classification = Classification::default();

    for instance in instances {
        if is_desired(&instance, settings) {
            classification.desired.push(instance);
        } else {
            classification.undesired.push(instance);
        }
    }

    classification
}

/// Sort instances into the order they should be destroyed in.
///
/// Instances are ordered by id, except that the self instance always sorts
/// last so the controller replaces its own node only after every other one.
pub fn destroy_order(instances: &mut [InstanceDescription], settings: &GroupSettings) {
    instances.sort_by(|a, b| compare_for_destroy(a, b, settings));
}

fn compare_for_destroy(
    a: &InstanceDescription,
    b: &InstanceDescription,
    settings: &GroupSettings,
) -> Ordering {
    is_self(a, settings)
        .cmp(&is_self(b, settings))
        .then_with(|| a.id.cmp(&b.id))
}
