//! Execution engine - applies the concurrent batch on a thread pool, then
//! the sequential batch in order

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::planner::ExecutionPlan;
use crate::resource::{BoxedResource, Resource};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;

/// Execute a plan with the given options and callbacks
///
/// Nothing runs when no resource differs from its desired state. Otherwise
/// the confirm callback is asked once; a declined prompt counts every
/// pending change as skipped. A dry run stops after computing diffs.
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let total_changes = compute_diffs(plan.iter()).len();
    log::debug!(
        "{} of {} resources need changes",
        total_changes,
        plan.total_resources()
    );

    if total_changes == 0 {
        return Ok(ExecuteSummary {
            no_change: plan.total_resources(),
            ..Default::default()
        });
    }

    if opts.dry_run {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    if !confirm.confirm("Apply changes?")? {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    let mut summary = ExecuteSummary::default();

    if !plan.concurrent.is_empty() {
        progress.on_batch_start(plan.concurrent.len(), true);
        let results = execute_parallel(&plan.concurrent, opts.jobs, opts.verbose)?;
        for (id, result) in &results {
            progress.on_resource_complete(id, result);
            summary.add_result(id, result);
        }
        progress.on_batch_complete();
    }

    if !plan.sequential.is_empty() {
        progress.on_batch_start(plan.sequential.len(), false);
        for resource in &plan.sequential {
            let id = resource.id();
            progress.on_resource_start(&id, &resource.description());
            let result = apply_resource(resource.as_ref(), opts.verbose);
            progress.on_resource_complete(&id, &result);
            summary.add_result(&id, &result);
        }
        progress.on_batch_complete();
    }

    Ok(summary)
}

/// Execute resources in parallel using rayon
///
/// Results come back in input order.
fn execute_parallel(
    resources: &[BoxedResource],
    jobs: usize,
    verbose: bool,
) -> Result<Vec<(String, ApplyResult)>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    Ok(pool.install(|| {
        resources
            .par_iter()
            .map(|resource| (resource.id(), apply_resource(resource.as_ref(), verbose)))
            .collect()
    }))
}

/// Apply a single resource, turning errors into a failed result
fn apply_resource(resource: &dyn Resource, verbose: bool) -> ApplyResult {
    let mut ctx = ApplyContext::new(false, verbose);

    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => {
            log::debug!("{} failed: {:#}", resource.id(), e);
            ApplyResult::Failed {
                error: format!("{:#}", e),
            }
        }
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::types::ResourceState;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct TestResource {
        id: String,
        should_change: bool,
        fail: bool,
        parallel: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl TestResource {
        fn new(id: &str, should_change: bool, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                id: id.into(),
                should_change,
                fail: false,
                parallel: true,
                log: Arc::clone(log),
            }
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> Result<ResourceState> {
            if self.should_change {
                Ok(ResourceState::Absent)
            } else {
                Ok(ResourceState::Present { details: None })
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.log.lock().unwrap().push(self.id.clone());
            if self.fail {
                anyhow::bail!("boom");
            }
            if !self.should_change {
                return Ok(ApplyResult::NoChange);
            }
            if ctx.dry_run {
                return Ok(ApplyResult::Skipped {
                    reason: "Dry run".into(),
                });
            }
            Ok(ApplyResult::Created)
        }

        fn can_parallelize(&self) -> bool {
            self.parallel
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_execute_empty_plan() {
        let result = execute_simple(ExecutionPlan::new(), ExecuteOptions::default()).unwrap();
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_execute_no_changes() {
        let log = log();
        let mut plan = ExecutionPlan::new();
        plan.add(Box::new(TestResource::new("test1", false, &log)));

        let result = execute_simple(plan, ExecuteOptions::default()).unwrap();

        assert_eq!(result.no_change, 1);
        assert_eq!(result.total_changes(), 0);
        assert!(log.lock().unwrap().is_empty(), "nothing should be applied");
    }

    #[test]
    fn test_execute_with_changes() {
        let log = log();
        let mut plan = ExecutionPlan::new();
        plan.add(Box::new(TestResource::new("test1", true, &log)));
        plan.add(Box::new(TestResource::new("test2", false, &log)));

        let result = execute_simple(plan, ExecuteOptions::default()).unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.no_change, 1);
    }

    #[test]
    fn test_sequential_runs_after_concurrent_in_order() {
        let log = log();
        let mut plan = ExecutionPlan::new();
        for id in ["s1", "s2", "s3"] {
            let mut resource = TestResource::new(id, true, &log);
            resource.parallel = false;
            plan.add(Box::new(resource));
        }
        for id in ["c1", "c2"] {
            plan.add(Box::new(TestResource::new(id, true, &log)));
        }

        let result = execute_simple(plan, ExecuteOptions::default()).unwrap();
        assert_eq!(result.created, 5);

        let order = log.lock().unwrap().clone();
        assert_eq!(&order[2..], ["s1", "s2", "s3"]);
    }

    #[test]
    fn test_failure_is_recorded() {
        let log = log();
        let mut plan = ExecutionPlan::new();
        let mut bad = TestResource::new("bad", true, &log);
        bad.fail = true;
        plan.add(Box::new(bad));
        plan.add(Box::new(TestResource::new("good", true, &log)));

        let result = execute_simple(plan, ExecuteOptions::default()).unwrap();

        assert_eq!(result.failed, 1);
        assert_eq!(result.created, 1);
        assert_eq!(result.failures[0].resource_id, "bad");
        assert_eq!(result.failures[0].error, "boom");
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let log = log();
        let mut plan = ExecutionPlan::new();
        plan.add(Box::new(TestResource::new("test1", true, &log)));

        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = execute_simple(plan, opts).unwrap();

        assert_eq!(result.skipped, 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_declined_confirmation() {
        let log = log();
        let mut plan = ExecutionPlan::new();
        plan.add(Box::new(TestResource::new("test1", true, &log)));

        let result = execute(
            plan,
            ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert_eq!(result.skipped, 1);
        assert!(log.lock().unwrap().is_empty());

        let mut plan = ExecutionPlan::new();
        plan.add(Box::new(TestResource::new("test1", true, &log)));
        let result = execute(
            plan,
            ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(result.created, 1);
    }
}
