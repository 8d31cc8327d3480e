//! Compute-provider domain model and the in-memory stub provider.

pub mod stub;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use stub::{NodeReachable, StubComputeConfig, StubComputeService};

/// Lifecycle state of a compute node.
///
/// Freshly provisioned nodes start `Pending` and move to `Running` once
/// boot completes; teardown passes through `Pending` again before
/// `Terminated`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub description: String,
    pub os_family: String,
    pub os_version: String,
    pub location_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hardware {
    pub id: String,
    pub cores: u32,
    pub ram_mb: u32,
    pub disk_gb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Description of one compute instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub id: String,
    pub name: String,
    pub group: String,
    pub location_id: String,
    pub image_id: String,
    pub hardware_id: String,
    pub state: NodeState,
    pub public_addresses: Vec<String>,
    pub private_addresses: Vec<String>,
    pub credentials: LoginCredentials,
    pub created_at: DateTime<Utc>,
}

impl NodeMetadata {
    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running
    }
}
