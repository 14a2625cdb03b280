use std::fmt;

use crate::{Error, Result};

/// An app within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppRef {
    org_slug: String,
    app_name: String,
}

impl AppRef {
    pub fn new(org_slug: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            org_slug: org_slug.into(),
            app_name: app_name.into(),
        }
    }

    pub fn org_slug(&self) -> &str {
        &self.org_slug
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Identity of an existing machine in this app.
    pub fn machine(&self, machine_id: impl Into<String>) -> MachineIdentity {
        MachineIdentity {
            app: self.clone(),
            machine_id: Some(machine_id.into()),
        }
    }

    /// Identity for a machine that has not been created yet.
    pub fn unassigned_machine(&self) -> MachineIdentity {
        MachineIdentity {
            app: self.clone(),
            machine_id: None,
        }
    }

    pub(crate) fn path(&self) -> String {
        format!("/apps/{}", self.app_name)
    }

    pub(crate) fn machines_path(&self) -> String {
        format!("/apps/{}/machines", self.app_name)
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org_slug, self.app_name)
    }
}

/// (organization, app, machine id) naming a remote machine.
///
/// The machine id is `None` until the API assigns one at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineIdentity {
    app: AppRef,
    machine_id: Option<String>,
}

impl MachineIdentity {
    pub fn new(
        org_slug: impl Into<String>,
        app_name: impl Into<String>,
        machine_id: Option<String>,
    ) -> Self {
        Self {
            app: AppRef::new(org_slug, app_name),
            machine_id,
        }
    }

    pub fn app(&self) -> &AppRef {
        &self.app
    }

    pub fn org_slug(&self) -> &str {
        self.app.org_slug()
    }

    pub fn app_name(&self) -> &str {
        self.app.app_name()
    }

    pub fn machine_id(&self) -> Option<&str> {
        self.machine_id.as_deref()
    }

    pub fn require_id(&self) -> Result<&str> {
        self.machine_id().ok_or_else(|| Error::MissingMachineId {
            app: self.app_name().to_string(),
        })
    }

    /// `/apps/{app}/machines/{id}{suffix}`.
    pub(crate) fn path(&self, suffix: &str) -> Result<String> {
        let id = self.require_id()?;
        Ok(format!("{}/{id}{suffix}", self.app.machines_path()))
    }
}

impl fmt::Display for MachineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.machine_id {
            Some(id) => write!(f, "{}/{id}", self.app),
            None => write!(f, "{}/<unassigned>", self.app),
        }
    }
}
