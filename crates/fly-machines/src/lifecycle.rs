//! Single-machine lifecycle operations.
//!
//! Every operation re-reads the machine from the API when its current state
//! decides what to do next. Waits that follow a request the controller has
//! just issued reuse the instance id of the record already in hand; the
//! public [`LifecycleController::wait`] always fetches it first.

use std::sync::Arc;
use std::time::Duration;

use fly_api::{
    CreateMachineRequest, Machine, MachineConfig, MachineEvent, MachineState, StatusCode, Transport,
};
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::config::OrchestratorConfig;
use crate::identity::{AppRef, MachineIdentity};
use crate::poller::StatePoller;
use crate::record::MachineRecord;
use crate::{AppOp, Error, MachineOp, Result, check};

/// Options for [`LifecycleController::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub name: Option<String>,
    pub region: Option<String>,
    /// Wait for `started` before returning. Defaults to `true`.
    pub wait_for_started: bool,
}

impl CreateOptions {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.wait_for_started = false;
        self
    }
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            name: None,
            region: None,
            wait_for_started: true,
        }
    }
}

/// Executes create/start/stop/destroy/wait/clone against one machine.
///
/// Cheap to clone; clones share the transport. The controller holds no
/// per-machine state and never serializes concurrent calls against the same
/// machine: ordering between callers is whatever the API decides.
#[derive(Clone)]
pub struct LifecycleController {
    transport: Arc<dyn Transport>,
    poller: StatePoller,
    config: OrchestratorConfig,
    span: Option<Span>,
}

impl LifecycleController {
    pub fn new(transport: Arc<dyn Transport>, config: OrchestratorConfig) -> Self {
        Self {
            poller: StatePoller::new(transport.clone()),
            transport,
            config,
            span: None,
        }
    }

    /// Parent span for every operation's span. Without one, operations
    /// attach to the caller's current span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn parent_span(&self) -> Span {
        self.span.clone().unwrap_or_else(Span::current)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn inspect(&self, machine: &MachineIdentity) -> Result<MachineRecord> {
        let path = machine.path("")?;
        let resp = self.transport.get(&path, &[]).await?;
        let resp = check(resp, StatusCode::OK, |status, body| {
            Self::op_failed(MachineOp::Inspect, machine, status, body)
        })?;
        MachineRecord::from_machine(machine.app(), resp.json()?)
    }

    /// Machines in `app`, optionally restricted to `regions`.
    ///
    /// Machines reporting a state outside [`MachineState`] are left out with
    /// a warning rather than failing the whole listing.
    pub async fn list_machines(
        &self,
        app: &AppRef,
        regions: &[String],
    ) -> Result<Vec<MachineRecord>> {
        let mut records = Vec::new();
        for machine in self.fetch_machines(app).await? {
            let in_region = regions.is_empty()
                || machine.region.as_ref().is_some_and(|r| regions.contains(r));
            if !in_region {
                continue;
            }

            match MachineRecord::from_machine(app, machine) {
                Ok(record) => records.push(record),
                Err(Error::UnrecognizedState { machine_id, state }) => {
                    warn!(
                        app = app.app_name(),
                        machine_id = %machine_id,
                        state = %state,
                        "skipping machine in unrecognized state"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Ids of every machine in `app`, whatever state it reports.
    pub async fn list_machine_ids(&self, app: &AppRef) -> Result<Vec<String>> {
        self.fetch_machines(app)
            .await?
            .into_iter()
            .map(|machine| machine.id.ok_or(Error::IncompleteRecord("id")))
            .collect()
    }

    pub async fn events(&self, machine: &MachineIdentity) -> Result<Vec<MachineEvent>> {
        let resp = self.transport.get(&machine.path("/events")?, &[]).await?;
        let resp = check(resp, StatusCode::OK, |status, body| {
            Self::op_failed(MachineOp::Events, machine, status, body)
        })?;
        Ok(resp.json()?)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Create a machine in `machine`'s app. The identity must not carry an id.
    pub async fn create(
        &self,
        machine: &MachineIdentity,
        config: &MachineConfig,
        opts: CreateOptions,
    ) -> Result<MachineRecord> {
        if let Some(id) = machine.machine_id() {
            return Err(Error::IdentityConflict(id.to_string()));
        }

        let span = info_span!(
            parent: &self.parent_span(),
            "machine.create",
            app = machine.app_name()
        );
        async move {
            let req = CreateMachineRequest {
                name: opts.name,
                region: opts.region,
                config: serde_json::to_value(config)?,
            };
            let record = self.send_create(machine.app(), &req).await?;

            if opts.wait_for_started {
                self.poller
                    .wait(
                        &record.identity,
                        record.instance_id.as_deref(),
                        MachineState::Started,
                        self.config.default_wait_timeout,
                    )
                    .await?;
            }

            info!(machine_id = record.id(), region = ?record.region, "machine created");
            Ok(record)
        }
        .instrument(span)
        .await
    }

    pub async fn start(&self, machine: &MachineIdentity, wait_for_started: bool) -> Result<()> {
        let path = machine.path("/start")?;
        let span = info_span!(parent: &self.parent_span(), "machine.start", %machine);
        async move {
            let resp = self.transport.post(&path, None).await?;
            check(resp, StatusCode::OK, |status, body| {
                Self::op_failed(MachineOp::Start, machine, status, body)
            })?;
            debug!("start requested");

            if wait_for_started {
                self.wait_for(machine, MachineState::Started, self.config.default_wait_timeout)
                    .await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Stop the machine and wait for `stopped`. A machine that is already
    /// stopped costs one inspect and nothing else.
    pub async fn stop(&self, machine: &MachineIdentity) -> Result<()> {
        let span = info_span!(parent: &self.parent_span(), "machine.stop", %machine);
        async move {
            let record = self.inspect(machine).await?;
            self.stop_observed(&record).await
        }
        .instrument(span)
        .await
    }

    /// Destroy the machine, stopping it first unless it is already stopped.
    pub async fn destroy(
        &self,
        machine: &MachineIdentity,
        wait_for_destroyed: bool,
    ) -> Result<()> {
        let path = machine.path("")?;
        let span = info_span!(parent: &self.parent_span(), "machine.destroy", %machine);
        async move {
            let record = self.inspect(machine).await?;
            if record.state != MachineState::Stopped {
                self.stop_observed(&record).await?;
            }

            let resp = self.transport.delete(&path).await?;
            check(resp, StatusCode::OK, |status, body| {
                Self::op_failed(MachineOp::Destroy, machine, status, body)
            })?;
            info!(machine_id = record.id(), "machine deleted");

            if wait_for_destroyed {
                self.poller
                    .wait(
                        machine,
                        record.instance_id.as_deref(),
                        MachineState::Destroyed,
                        self.config.default_wait_timeout,
                    )
                    .await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Wait for `target_state`, given by its wire name. Unknown names fail
    /// with [`Error::InvalidStateName`] before any request is made.
    pub async fn wait(
        &self,
        machine: &MachineIdentity,
        target_state: &str,
        timeout: Duration,
    ) -> Result<()> {
        let target: MachineState = target_state.parse()?;
        self.wait_for(machine, target, timeout).await
    }

    pub async fn wait_for(
        &self,
        machine: &MachineIdentity,
        target: MachineState,
        timeout: Duration,
    ) -> Result<()> {
        machine.require_id()?;
        let record = self.inspect(machine).await?;
        self.poller
            .wait(machine, record.instance_id.as_deref(), target, timeout)
            .await
    }

    /// Create a new machine with the source's config, sent back exactly as
    /// the API returned it.
    ///
    /// `region` defaults to the source's region. Unlike [`Self::create`],
    /// this returns as soon as the API accepts the request.
    pub async fn clone_machine(
        &self,
        source: &MachineIdentity,
        name: Option<String>,
        region: Option<String>,
    ) -> Result<MachineRecord> {
        let span = info_span!(parent: &self.parent_span(), "machine.clone", %source);
        async move {
            let source_record = self.inspect(source).await?;
            let req = CreateMachineRequest {
                name,
                region: region.or(source_record.region),
                config: source_record.config,
            };
            let record = self.send_create(source.app(), &req).await?;
            info!(source_id = source.machine_id(), machine_id = record.id(), "machine cloned");
            Ok(record)
        }
        .instrument(span)
        .await
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn fetch_machines(&self, app: &AppRef) -> Result<Vec<Machine>> {
        let resp = self.transport.get(&app.machines_path(), &[]).await?;
        let resp = check(resp, StatusCode::OK, |status, body| Error::AppOperationFailed {
            op: AppOp::ListMachines,
            app: app.app_name().to_string(),
            status,
            body,
        })?;
        Ok(resp.json()?)
    }

    async fn send_create(&self, app: &AppRef, req: &CreateMachineRequest) -> Result<MachineRecord> {
        let body = serde_json::to_value(req)?;
        let resp = self.transport.post(&app.machines_path(), Some(&body)).await?;
        let resp = check(resp, StatusCode::OK, |status, body| Error::CreationFailed {
            app: app.app_name().to_string(),
            status,
            body,
        })?;
        MachineRecord::from_machine(app, resp.json()?)
    }

    async fn stop_observed(&self, record: &MachineRecord) -> Result<()> {
        if record.state == MachineState::Stopped {
            debug!(machine_id = record.id(), "machine already stopped");
            return Ok(());
        }

        let machine = &record.identity;
        let resp = self.transport.post(&machine.path("/stop")?, None).await?;
        check(resp, StatusCode::OK, |status, body| {
            Self::op_failed(MachineOp::Stop, machine, status, body)
        })?;
        debug!(machine_id = record.id(), from = %record.state, "stop requested");

        self.poller
            .wait(
                machine,
                record.instance_id.as_deref(),
                MachineState::Stopped,
                self.config.default_wait_timeout,
            )
            .await
    }

    fn op_failed(
        op: MachineOp,
        machine: &MachineIdentity,
        status: StatusCode,
        body: String,
    ) -> Error {
        Error::MachineOperationFailed {
            op,
            machine_id: machine.machine_id().unwrap_or_default().to_string(),
            status,
            body,
        }
    }
}
