//! Sort keys for app and machine listings.
//!
//! Keys arriving as strings are parsed up front, so a bad key fails before
//! any request goes out.

use std::cmp::Ordering;
use std::str::FromStr;

use fly_api::App;

use crate::record::MachineRecord;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppSortKey {
    #[default]
    Name,
    MachineCount,
    Network,
}

impl AppSortKey {
    pub fn compare(&self, a: &App, b: &App) -> Ordering {
        match self {
            Self::Name => a.name.cmp(&b.name),
            Self::MachineCount => a.machine_count.cmp(&b.machine_count),
            Self::Network => a.network.cmp(&b.network),
        }
    }

    /// Stable sort, so ties keep the API's order.
    pub fn sort(&self, apps: &mut [App]) {
        apps.sort_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for AppSortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(Self::Name),
            "machine_count" => Ok(Self::MachineCount),
            "network" => Ok(Self::Network),
            other => Err(Error::InvalidSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MachineSortKey {
    #[default]
    Id,
    Name,
    Region,
    State,
    CreatedAt,
}

impl MachineSortKey {
    pub fn compare(&self, a: &MachineRecord, b: &MachineRecord) -> Ordering {
        match self {
            Self::Id => a.id().cmp(b.id()),
            Self::Name => a.name.cmp(&b.name),
            Self::Region => a.region.cmp(&b.region),
            Self::State => a.state.cmp(&b.state),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }

    pub fn sort(&self, machines: &mut [MachineRecord]) {
        machines.sort_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for MachineSortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "region" => Ok(Self::Region),
            "state" => Ok(Self::State),
            "created_at" => Ok(Self::CreatedAt),
            other => Err(Error::InvalidSortKey(other.to_string())),
        }
    }
}
