//! Execution planner - builds resource execution plans

use crate::resource::{BoxedResource, Resource};

/// An execution plan with resources split by ordering constraints
///
/// The concurrent batch runs first on a thread pool; the sequential batch
/// runs afterwards, one resource at a time, in insertion order.
pub struct ExecutionPlan {
    /// Independent resources
    pub concurrent: Vec<BoxedResource>,
    /// Order-sensitive resources
    pub sequential: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            concurrent: Vec::new(),
            sequential: Vec::new(),
        }
    }

    /// Add a resource, classified by [`Resource::can_parallelize`]
    pub fn add(&mut self, resource: BoxedResource) {
        if resource.can_parallelize() {
            self.concurrent.push(resource);
        } else {
            self.sequential.push(resource);
        }
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            concurrent: self
                .concurrent
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
            sequential: self
                .sequential
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type:fragment", e.g. `links` or
    /// `file:/etc/qemu`.
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, fragment) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type, fragment))
            }
        }
    }

    /// All resources, concurrent batch first
    pub fn iter(&self) -> impl Iterator<Item = &BoxedResource> {
        self.concurrent.iter().chain(self.sequential.iter())
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.concurrent.len() + self.sequential.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.concurrent.is_empty() && self.sequential.is_empty()
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a target string like "type:fragment" into (type, fragment)
fn parse_target(target: &str) -> (Option<&str>, Option<&str>) {
    match target.split_once(':') {
        Some(("", fragment)) => (None, Some(fragment)),
        Some((kind, "")) => (Some(kind), None),
        Some((kind, fragment)) => (Some(kind), Some(fragment)),
        None => (Some(target), None),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, resource_type: Option<&str>, fragment: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "files" => resource.resource_type() == "file",
            "links" | "symlinks" => resource.resource_type().ends_with("link"),
            "seeds" => resource.resource_type() == "seed",
            "wrappers" => resource.resource_type() == "wrapper",
            _ => resource.resource_type() == rt || resource.resource_type().starts_with(rt),
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(f) = fragment
        && !resource.id().contains(f)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::{ApplyResult, ResourceState};

    #[derive(Debug)]
    struct Stub {
        id: &'static str,
        kind: &'static str,
        parallel: bool,
    }

    impl Resource for Stub {
        fn id(&self) -> String {
            self.id.to_string()
        }
        fn description(&self) -> String {
            self.id.to_string()
        }
        fn resource_type(&self) -> &'static str {
            self.kind
        }
        fn current_state(&self) -> anyhow::Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
        fn can_parallelize(&self) -> bool {
            self.parallel
        }
    }

    fn plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for (id, kind, parallel) in [
            ("/etc/qemu/bridge.conf", "file", true),
            ("/etc/systemd/system/sockets.target.wants/libvirtd.socket", "link", false),
            ("/run/libvirt/helpers/qemu-bridge-helper", "symlink", true),
            ("/run/wrappers/bin/qemu-bridge-helper", "wrapper", false),
        ] {
            plan.add(Box::new(Stub { id, kind, parallel }));
        }
        plan
    }

    #[test]
    fn test_classification() {
        let plan = plan();
        assert_eq!(plan.concurrent.len(), 2);
        assert_eq!(plan.sequential.len(), 2);
        assert_eq!(plan.sequential[0].resource_type(), "link");
        assert_eq!(plan.sequential[1].resource_type(), "wrapper");
        assert_eq!(plan.total_resources(), 4);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("files"), (Some("files"), None));
        assert_eq!(parse_target("file:/etc/qemu"), (Some("file"), Some("/etc/qemu")));
        assert_eq!(parse_target(":bridge"), (None, Some("bridge")));
    }

    #[test]
    fn test_filter_by_target() {
        let filtered = plan().filter_by_target(Some("links"));
        assert_eq!(filtered.total_resources(), 2);

        let filtered = plan().filter_by_target(Some(":bridge-helper"));
        assert_eq!(filtered.total_resources(), 2);

        let filtered = plan().filter_by_target(None);
        assert_eq!(filtered.total_resources(), 4);
    }
}
