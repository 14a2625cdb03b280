use std::sync::Arc;
use std::time::Duration;

use fly_api::{MachineState, StatusCode, Transport};
use tracing::{debug, info};

use crate::identity::MachineIdentity;
use crate::{Error, Result, check};

/// One bounded, server-side wait for a machine to reach a state.
///
/// Each call issues exactly one long-poll request; the API holds it open for
/// up to `timeout`. Any non-200 answer fails the attempt. The API uses the
/// same failure for "timed out" and "transition not possible", so both
/// surface as [`Error::TransitionFailed`] with the body attached.
#[derive(Clone)]
pub struct StatePoller {
    transport: Arc<dyn Transport>,
}

impl StatePoller {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `instance_id` is sent when known; it pins the wait to one instance of
    /// the machine across replacements.
    pub async fn wait(
        &self,
        machine: &MachineIdentity,
        instance_id: Option<&str>,
        target: MachineState,
        timeout: Duration,
    ) -> Result<()> {
        let path = machine.path("/wait")?;
        let machine_id = machine.require_id()?;

        let mut query = Vec::with_capacity(3);
        if let Some(instance_id) = instance_id {
            query.push(("instance_id", instance_id.to_string()));
        }
        query.push(("state", target.as_str().to_string()));
        query.push(("timeout", timeout.as_secs().to_string()));

        debug!(
            app = machine.app_name(),
            machine_id,
            state = %target,
            timeout_secs = timeout.as_secs(),
            "waiting for machine state"
        );

        let resp = self.transport.long_poll(&path, &query, timeout).await?;
        check(resp, StatusCode::OK, |status, body| Error::TransitionFailed {
            machine_id: machine_id.to_string(),
            target_state: target,
            status,
            body,
        })?;

        info!(app = machine.app_name(), machine_id, state = %target, "machine reached state");
        Ok(())
    }
}
