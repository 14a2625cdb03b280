use chrono::{DateTime, Utc};
use fly_api::{Machine, MachineState, UnknownMachineState};

use crate::identity::{AppRef, MachineIdentity};
use crate::{Error, Result};

/// Snapshot of a machine as returned by a single API call.
///
/// Built fresh from each response and never cached; re-fetch when the
/// current state matters.
#[derive(Debug, Clone)]
pub struct MachineRecord {
    pub identity: MachineIdentity,
    pub name: Option<String>,
    pub state: MachineState,
    pub instance_id: Option<String>,
    pub region: Option<String>,
    pub private_ip: Option<String>,
    /// Config as returned by the API, never re-encoded.
    pub config: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MachineRecord {
    pub(crate) fn from_machine(app: &AppRef, machine: Machine) -> Result<Self> {
        let id = machine.id.ok_or(Error::IncompleteRecord("id"))?;
        let state = machine.state.ok_or(Error::IncompleteRecord("state"))?;
        let state = state
            .parse::<MachineState>()
            .map_err(|UnknownMachineState(state)| Error::UnrecognizedState {
                machine_id: id.clone(),
                state,
            })?;

        Ok(Self {
            identity: app.machine(id),
            name: machine.name,
            state,
            instance_id: machine.instance_id,
            region: machine.region,
            private_ip: machine.private_ip,
            config: machine.config,
            created_at: machine.created_at,
            updated_at: machine.updated_at,
        })
    }

    pub fn id(&self) -> &str {
        self.identity.machine_id().unwrap_or_default()
    }
}
