//! Turn planned artifacts into filesystem resources

use declarative::ExecutionPlan;
use hostplan::layout::rooted;
use hostplan::{Artifact, ArtifactKind};
use std::path::Path;

use crate::resource::{ManagedFile, Symlink};

/// Build an execution plan that writes every artifact under `root`
///
/// Link targets stay host-absolute: an enablement link staged under a root
/// still points at the unit path the host will see.
pub fn plan(artifacts: &[Artifact], root: &Path) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new();
    for artifact in artifacts {
        let path = rooted(root, &artifact.path);
        match &artifact.kind {
            ArtifactKind::File {
                content,
                mode,
                overwrite,
            } => plan.add(Box::new(ManagedFile {
                mode: *mode,
                overwrite: *overwrite,
                ..ManagedFile::new(path, content.clone())
            })),
            ArtifactKind::Link { target } => {
                plan.add(Box::new(Symlink::enablement(target.clone(), path)))
            }
        }
    }
    log::debug!(
        "Planned {} files and links under {}",
        plan.total_resources(),
        root.display()
    );
    plan
}
