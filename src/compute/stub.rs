use crate::compute::{Hardware, Image, Location, LoginCredentials, NodeMetadata, NodeState};
use crate::error::{CirrusError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Transition delays for the stub provider. The defaults model realistic
/// provisioning latency while keeping tests fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubComputeConfig {
    /// Pending -> Running after node creation or reboot.
    pub boot_delay_ms: u64,
    /// Pending -> Terminated after a destroy request.
    pub teardown_delay_ms: u64,
    /// Terminated -> removed from the registry.
    pub purge_delay_ms: u64,
}

impl Default for StubComputeConfig {
    fn default() -> Self {
        Self {
            boot_delay_ms: 50,
            teardown_delay_ms: 50,
            purge_delay_ms: 200,
        }
    }
}

/// In-memory fake of a compute provider.
///
/// Nodes live in a registry keyed by synthetic ids; lifecycle transitions
/// are applied by timer tasks that mutate the registry only under its
/// mutex, so callers polling `get_node` observe a consistent state at
/// every instant. A zero delay applies the transition synchronously.
pub struct StubComputeService {
    registry: Arc<Mutex<HashMap<String, NodeMetadata>>>,
    next_id: AtomicU64,
    config: StubComputeConfig,
    locations: Vec<Location>,
    images: Vec<Image>,
    hardware: Vec<Hardware>,
}

impl StubComputeService {
    pub fn new(config: StubComputeConfig) -> Self {
        let locations = vec![Location {
            id: "zone-1".to_string(),
            description: "Synthetic zone 1".to_string(),
        }];
        let images = vec![
            Image {
                id: "img-1".to_string(),
                description: "Synthetic Linux image".to_string(),
                os_family: "ubuntu".to_string(),
                os_version: "22.04".to_string(),
                location_id: "zone-1".to_string(),
            },
            Image {
                id: "img-2".to_string(),
                description: "Synthetic minimal image".to_string(),
                os_family: "alpine".to_string(),
                os_version: "3.19".to_string(),
                location_id: "zone-1".to_string(),
            },
        ];
        let hardware = vec![
            Hardware {
                id: "small".to_string(),
                cores: 1,
                ram_mb: 1024,
                disk_gb: 10,
            },
            Hardware {
                id: "medium".to_string(),
                cores: 2,
                ram_mb: 4096,
                disk_gb: 40,
            },
        ];

        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            config,
            locations,
            images,
            hardware,
        }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn hardware_profiles(&self) -> &[Hardware] {
        &self.hardware
    }

    /// Predicate handle for polling node reachability.
    pub fn reachable(&self) -> NodeReachable {
        NodeReachable {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Provision a node in `group`. The group is encoded into the node
    /// name; the node starts `Pending` and boots in the background.
    pub async fn create_node_in_group(&self, group: &str) -> Result<NodeMetadata> {
        let ordinal = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("node-{}", ordinal);
        let node = NodeMetadata {
            id: id.clone(),
            name: format!("{}-{}", group, ordinal),
            group: group.to_string(),
            location_id: self.locations[0].id.clone(),
            image_id: self.images[0].id.clone(),
            hardware_id: self.hardware[0].id.clone(),
            state: NodeState::Pending,
            public_addresses: vec![format!("144.175.1.{}", ordinal)],
            private_addresses: vec![format!("10.1.1.{}", ordinal)],
            credentials: LoginCredentials {
                username: "root".to_string(),
                password: format!("password{}", ordinal),
            },
            created_at: Utc::now(),
        };

        {
            let mut registry = self.registry.lock().await;
            registry.insert(id.clone(), node.clone());
        }
        tracing::debug!("Created node {} in group {}", id, group);

        self.schedule_transition(&id, NodeState::Running, self.config.boot_delay_ms)
            .await;
        Ok(node)
    }

    pub async fn get_node(&self, id: &str) -> Option<NodeMetadata> {
        let registry = self.registry.lock().await;
        registry.get(id).cloned()
    }

    pub async fn list_nodes(&self) -> Vec<NodeMetadata> {
        let registry = self.registry.lock().await;
        let mut nodes: Vec<NodeMetadata> = registry.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    pub async fn list_nodes_in_group(&self, group: &str) -> Vec<NodeMetadata> {
        self.list_nodes()
            .await
            .into_iter()
            .filter(|node| node.group == group)
            .collect()
    }

    /// Reboot: immediately back to `Pending`, then `Running` once the boot
    /// delay elapses.
    pub async fn reboot_node(&self, id: &str) -> Result<()> {
        self.require_node(id).await?;
        self.schedule_transition(id, NodeState::Pending, 0).await;
        self.schedule_transition(id, NodeState::Running, self.config.boot_delay_ms)
            .await;
        Ok(())
    }

    /// Destroy: immediately `Pending`, `Terminated` after the teardown
    /// delay, and removed from the registry after a further purge delay.
    pub async fn destroy_node(&self, id: &str) -> Result<()> {
        self.require_node(id).await?;
        self.schedule_transition(id, NodeState::Pending, 0).await;

        // Zero delays apply inline, same contract as schedule_transition.
        if self.config.teardown_delay_ms == 0 {
            self.schedule_transition(id, NodeState::Terminated, 0).await;
            self.schedule_purge(id, self.config.purge_delay_ms).await;
            return Ok(());
        }

        let registry = Arc::clone(&self.registry);
        let id = id.to_string();
        let teardown = Duration::from_millis(self.config.teardown_delay_ms);
        let purge = Duration::from_millis(self.config.purge_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(teardown).await;
            {
                let mut registry = registry.lock().await;
                if let Some(node) = registry.get_mut(&id) {
                    node.state = NodeState::Terminated;
                    tracing::debug!("Node {} terminated", id);
                }
            }
            tokio::time::sleep(purge).await;
            let mut registry = registry.lock().await;
            if registry.remove(&id).is_some() {
                tracing::debug!("Node {} purged from registry", id);
            }
        });
        Ok(())
    }

    async fn require_node(&self, id: &str) -> Result<()> {
        let registry = self.registry.lock().await;
        if registry.contains_key(id) {
            Ok(())
        } else {
            Err(CirrusError::Internal(format!("no such node: {}", id)))
        }
    }

    async fn schedule_purge(&self, id: &str, delay_ms: u64) {
        if delay_ms == 0 {
            let mut registry = self.registry.lock().await;
            if registry.remove(id).is_some() {
                tracing::debug!("Node {} purged from registry", id);
            }
            return;
        }

        let registry = Arc::clone(&self.registry);
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let mut registry = registry.lock().await;
            if registry.remove(&id).is_some() {
                tracing::debug!("Node {} purged from registry", id);
            }
        });
    }

    async fn schedule_transition(&self, id: &str, state: NodeState, delay_ms: u64) {
        if delay_ms == 0 {
            let mut registry = self.registry.lock().await;
            if let Some(node) = registry.get_mut(id) {
                node.state = state;
            }
            return;
        }

        let registry = Arc::clone(&self.registry);
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let mut registry = registry.lock().await;
            // The node may have been purged while the timer ran.
            if let Some(node) = registry.get_mut(&id) {
                tracing::debug!("Node {} -> {:?}", id, state);
                node.state = state;
            }
        });
    }
}

impl Default for StubComputeService {
    fn default() -> Self {
        Self::new(StubComputeConfig::default())
    }
}

/// Socket-reachability predicate over the stub registry: a public address
/// answers only while the node owning it is `Running`. Private addresses
/// never answer; the caller is outside the synthetic network.
#[derive(Clone)]
pub struct NodeReachable {
    registry: Arc<Mutex<HashMap<String, NodeMetadata>>>,
}

impl NodeReachable {
    pub async fn is_reachable(&self, address: &str) -> bool {
        let registry = self.registry.lock().await;
        registry.values().any(|node| {
            node.is_running() && node.public_addresses.iter().any(|a| a == address)
        })
    }

    /// Poll until `address` is reachable or the deadline passes.
    pub async fn wait_until_reachable(&self, address: &str, deadline: Duration) -> bool {
        let poll = Duration::from_millis(5);
        let result = tokio::time::timeout(deadline, async {
            while !self.is_reachable(address).await {
                tokio::time::sleep(poll).await;
            }
        })
        .await;
        result.is_ok()
    }
}
