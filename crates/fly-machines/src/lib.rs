//! Lifecycle orchestration for Fly.io Machines.
//!
//! Sequences multi-step remote operations (destroy = stop if needed, delete,
//! wait for `destroyed`), validates wait targets against [`MachineState`]
//! before any I/O, and fans single-machine operations out across many
//! machines. The remote API is the only source of truth for machine state:
//! nothing here caches records between calls.
//!
//! The HTTP side is the [`fly_api::Transport`] handed in by the caller; this
//! crate never reads the environment.

pub mod batch;
pub mod config;
pub mod identity;
pub mod lifecycle;
pub mod poller;
pub mod record;
pub mod scope;
pub mod sort;

#[cfg(test)]
mod testing;

use std::fmt;

use fly_api::{RawResponse, StatusCode};

pub use batch::{BatchCoordinator, BatchOutcome, BatchReport};
pub use config::OrchestratorConfig;
pub use fly_api::{MachineConfig, MachineState, UnknownMachineState};
pub use identity::{AppRef, MachineIdentity};
pub use lifecycle::{CreateOptions, LifecycleController};
pub use poller::StatePoller;
pub use record::MachineRecord;
pub use scope::{AppScope, Fly, OrgScope};
pub use sort::{AppSortKey, MachineSortKey};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("machine ids are assigned by the API; refusing to create with id {0}")]
    IdentityConflict(String),

    #[error("no machine ids to operate on in app {app}")]
    MissingIdentifiers { app: String },

    #[error("machine identity in app {app} carries no machine id")]
    MissingMachineId { app: String },

    #[error(transparent)]
    InvalidStateName(#[from] UnknownMachineState),

    #[error("machine {machine_id} reports unrecognized state \"{state}\"")]
    UnrecognizedState { machine_id: String, state: String },

    #[error("unknown sort key: {0}")]
    InvalidSortKey(String),

    #[error("creating machine in {app} returned {status}: {body}")]
    CreationFailed {
        app: String,
        status: StatusCode,
        body: String,
    },

    #[error("{op} machine {machine_id} returned {status}: {body}")]
    MachineOperationFailed {
        op: MachineOp,
        machine_id: String,
        status: StatusCode,
        body: String,
    },

    #[error("machine {machine_id} did not reach \"{target_state}\" ({status}): {body}")]
    TransitionFailed {
        machine_id: String,
        target_state: MachineState,
        status: StatusCode,
        body: String,
    },

    #[error("{op} app {app} returned {status}: {body}")]
    AppOperationFailed {
        op: AppOp,
        app: String,
        status: StatusCode,
        body: String,
    },

    #[error("listing apps in org {org} returned {status}: {body}")]
    ListAppsFailed {
        org: String,
        status: StatusCode,
        body: String,
    },

    #[error("machine payload is missing `{0}`")]
    IncompleteRecord(&'static str),

    #[error("fly api error: {0}")]
    Transport(#[from] fly_api::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Remote machine operations, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineOp {
    Inspect,
    Start,
    Stop,
    Destroy,
    Events,
}

impl MachineOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
            Self::Events => "events",
        }
    }
}

impl fmt::Display for MachineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote app operations, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOp {
    Create,
    Delete,
    Inspect,
    ListMachines,
}

impl fmt::Display for AppOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Inspect => "inspect",
            Self::ListMachines => "list machines of",
        })
    }
}

/// Pass `resp` through when it carries the endpoint's documented success code.
pub(crate) fn check(
    resp: RawResponse,
    expected: StatusCode,
    fail: impl FnOnce(StatusCode, String) -> Error,
) -> Result<RawResponse> {
    if resp.status != expected {
        return Err(fail(resp.status, resp.body));
    }
    Ok(resp)
}
