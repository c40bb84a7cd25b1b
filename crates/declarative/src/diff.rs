//! Diff computation for resources

use crate::resource::{BoxedResource, Resource};
use crate::types::ResourceState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        Ok(Self::with_current(resource, current))
    }

    fn with_current(resource: &dyn Resource, current: ResourceState) -> Option<Self> {
        let desired = resource.desired_state();
        if current == desired {
            return None;
        }
        Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Modified { .. }, _) | (_, ResourceState::Modified { .. })
        ) || matches!(
            (&self.current, &self.desired),
            (
                ResourceState::Present { details: Some(_) },
                ResourceState::Present { details: Some(_) }
            )
        )
    }
}

/// Compute diffs for a list of resources
///
/// Returns only resources whose current state differs from the desired
/// state. A resource whose state cannot be read is reported with
/// [`ResourceState::Unknown`] so it is still applied and its error surfaces.
pub fn compute_diffs<'a>(resources: impl IntoIterator<Item = &'a BoxedResource>) -> Vec<ResourceDiff> {
    resources
        .into_iter()
        .filter_map(|r| {
            let current = r.current_state().unwrap_or_else(|e| {
                log::warn!("cannot read state of {}: {:#}", r.id(), e);
                ResourceState::Unknown
            });
            ResourceDiff::with_current(r.as_ref(), current)
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type, in type-name order
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<&str, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<&str, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.as_str())
            .or_default()
            .push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ApplyResult;

    #[derive(Debug)]
    struct Fixed {
        id: &'static str,
        current: Option<ResourceState>,
    }

    impl Resource for Fixed {
        fn id(&self) -> String {
            self.id.to_string()
        }
        fn description(&self) -> String {
            self.id.to_string()
        }
        fn resource_type(&self) -> &'static str {
            "file"
        }
        fn current_state(&self) -> anyhow::Result<ResourceState> {
            self.current
                .clone()
                .ok_or_else(|| anyhow::anyhow!("permission denied"))
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    #[test]
    fn test_compute_diffs() {
        let resources: Vec<BoxedResource> = vec![
            Box::new(Fixed {
                id: "same",
                current: Some(ResourceState::Present { details: None }),
            }),
            Box::new(Fixed {
                id: "missing",
                current: Some(ResourceState::Absent),
            }),
            Box::new(Fixed {
                id: "unreadable",
                current: None,
            }),
        ];

        let diffs = compute_diffs(&resources);
        let ids: Vec<&str> = diffs.iter().map(|d| d.resource_id.as_str()).collect();
        assert_eq!(ids, ["missing", "unreadable"]);
        assert!(diffs[0].is_addition());
        assert_eq!(diffs[1].current, ResourceState::Unknown);

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.modifications, 1);
        assert_eq!(group_by_type(&diffs)["file"].len(), 2);
    }
}
