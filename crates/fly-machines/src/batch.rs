//! Fan-out of single-machine operations across many machines.

use std::collections::HashSet;
use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, warn};

use crate::identity::{AppRef, MachineIdentity};
use crate::lifecycle::LifecycleController;
use crate::{Error, Result};

/// Result of one member of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub machine_id: String,
    pub result: Result<()>,
}

/// Per-machine outcomes, in the order the ids were given.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn get(&self, machine_id: &str) -> Option<&Result<()>> {
        self.outcomes
            .iter()
            .find(|o| o.machine_id == machine_id)
            .map(|o| &o.result)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.machine_id.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.machine_id.as_str(), e)))
    }
}

/// Runs one operation per machine id concurrently and reports every result.
///
/// Members are independent: a failure never cancels or hides a sibling, and
/// the report is only returned once every member has finished. With
/// `max_concurrency` set, at most that many members are in flight at once.
#[derive(Clone)]
pub struct BatchCoordinator {
    controller: LifecycleController,
    max_concurrency: Option<usize>,
}

impl BatchCoordinator {
    pub fn new(controller: LifecycleController) -> Self {
        let max_concurrency = controller.config().max_concurrency;
        Self {
            controller,
            max_concurrency,
        }
    }

    /// Destroy `machine_ids` in `app`, or every machine in it when
    /// `discover_all` is set. Fails with [`Error::MissingIdentifiers`] when
    /// there is nothing to destroy.
    pub async fn destroy_all(
        &self,
        app: &AppRef,
        machine_ids: &[String],
        discover_all: bool,
    ) -> Result<BatchReport> {
        let ids = self.resolve_ids(app, machine_ids, discover_all).await?;
        let report = self
            .for_each(app, ids, |controller, machine| async move {
                controller.destroy(&machine, true).await
            })
            .await;

        info!(
            app = app.app_name(),
            total = report.outcomes.len(),
            failed = report.failed().count(),
            "destroy batch finished"
        );
        Ok(report)
    }

    /// Stop `machine_ids` in `app`, or every machine in it when `discover_all`
    /// is set. Same id resolution and per-member reporting as `destroy_all`.
    pub async fn stop_all(
        &self,
        app: &AppRef,
        machine_ids: &[String],
        discover_all: bool,
    ) -> Result<BatchReport> {
        let ids = self.resolve_ids(app, machine_ids, discover_all).await?;
        Ok(self
            .for_each(app, ids, |controller, machine| async move {
                controller.stop(&machine).await
            })
            .await)
    }

    /// Apply `op` to each id. Duplicate ids run once.
    pub async fn for_each<F, Fut>(
        &self,
        app: &AppRef,
        machine_ids: Vec<String>,
        op: F,
    ) -> BatchReport
    where
        F: Fn(LifecycleController, MachineIdentity) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut ids = machine_ids;
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));

        let limit = self.max_concurrency.unwrap_or(ids.len()).max(1);
        let op = &op;

        let outcomes: Vec<BatchOutcome> = stream::iter(ids)
            .map(|machine_id| {
                let machine = app.machine(machine_id.clone());
                let fut = op(self.controller.clone(), machine);
                async move {
                    let result = fut.await;
                    if let Err(e) = &result {
                        warn!(
                            app = app.app_name(),
                            machine_id = %machine_id,
                            error = %e,
                            "batch member failed"
                        );
                    }
                    BatchOutcome { machine_id, result }
                }
            })
            .buffered(limit)
            .collect()
            .await;

        BatchReport { outcomes }
    }

    async fn resolve_ids(
        &self,
        app: &AppRef,
        machine_ids: &[String],
        discover_all: bool,
    ) -> Result<Vec<String>> {
        let ids = if discover_all {
            self.controller.list_machine_ids(app).await?
        } else {
            machine_ids.to_vec()
        };

        if ids.is_empty() {
            return Err(Error::MissingIdentifiers {
                app: app.app_name().to_string(),
            });
        }
        Ok(ids)
    }
}
