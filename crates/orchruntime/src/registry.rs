use orchcore::{Agent, AgentState, RegistryError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Listing entry for a registered agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub state: AgentState,
}

struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    state: AgentState,
}

impl RegisteredAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            id: self.agent.id().to_string(),
            description: self.agent.description().to_string(),
            capabilities: self.agent.capabilities(),
            state: self.state,
        }
    }
}

/// Owns the agents available to workflow steps.
///
/// Registration, lookup and removal all go through one lock, so the registry
/// may be shared with engines that are executing runs. The lock is never held
/// while an agent hook runs.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, RegisteredAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Initialize `agent` and register it under its id.
    ///
    /// The id is reserved as `Uninitialized` while the agent initializes, so a
    /// duplicate is rejected without being initialized and lookups are not
    /// held up by a slow `initialize`. If initialization fails the
    /// reservation is dropped and nothing is registered.
    pub async fn register(&self, agent: Arc<dyn Agent>) -> Result<(), RegistryError> {
        let id = agent.id().to_string();
        {
            let mut agents = self.agents.write().await;
            if agents.contains_key(&id) {
                return Err(RegistryError::DuplicateAgent(id));
            }
            agents.insert(
                id.clone(),
                RegisteredAgent {
                    agent: Arc::clone(&agent),
                    state: AgentState::Uninitialized,
                },
            );
        }

        let initialized = agent.initialize().await;

        let mut agents = self.agents.write().await;
        match initialized {
            Ok(()) => {
                if let Some(entry) = agents.get_mut(&id) {
                    entry.state = AgentState::Ready;
                }
                tracing::info!("Registering agent: {}", id);
                Ok(())
            }
            Err(source) => {
                agents.remove(&id);
                tracing::warn!("Agent {} failed to initialize: {}", id, source);
                Err(RegistryError::InitializationFailed {
                    agent_id: id,
                    source,
                })
            }
        }
    }

    /// The ready agent registered under `id`.
    pub async fn get(&self, id: &str) -> Result<Arc<dyn Agent>, RegistryError> {
        self.agents
            .read()
            .await
            .get(id)
            .filter(|entry| entry.state == AgentState::Ready)
            .map(|entry| Arc::clone(&entry.agent))
            .ok_or_else(|| RegistryError::AgentNotFound(id.to_string()))
    }

    /// All ready agents, ordered by id.
    pub async fn get_all(&self) -> Vec<Arc<dyn Agent>> {
        let agents = self.agents.read().await;
        let mut all: Vec<_> = agents
            .values()
            .filter(|e| e.state == AgentState::Ready)
            .map(|e| Arc::clone(&e.agent))
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Every entry ordered by id, including agents still initializing.
    pub async fn descriptors(&self) -> Vec<AgentDescriptor> {
        let agents = self.agents.read().await;
        let mut all: Vec<_> = agents.values().map(RegisteredAgent::descriptor).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.agents
            .read()
            .await
            .get(id)
            .is_some_and(|e| e.state == AgentState::Ready)
    }

    pub async fn len(&self) -> usize {
        self.agents
            .read()
            .await
            .values()
            .filter(|e| e.state == AgentState::Ready)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run every ready agent's cleanup hook once and remove it.
    ///
    /// Returns the disposed agents; calling it again does nothing. Agents
    /// still initializing keep their reservation. A failing cleanup is logged
    /// and does not stop the sweep.
    pub async fn clear(&self) -> Vec<AgentDescriptor> {
        let mut drained: Vec<RegisteredAgent> = {
            let mut agents = self.agents.write().await;
            let ready: Vec<String> = agents
                .iter()
                .filter(|(_, e)| e.state == AgentState::Ready)
                .map(|(id, _)| id.clone())
                .collect();
            ready.iter().filter_map(|id| agents.remove(id)).collect()
        };
        drained.sort_by(|a, b| a.agent.id().cmp(b.agent.id()));

        let mut disposed = Vec::with_capacity(drained.len());
        for mut entry in drained {
            if let Err(e) = entry.agent.cleanup().await {
                tracing::warn!("Cleanup of agent {} failed: {}", entry.agent.id(), e);
            }
            entry.state = AgentState::Disposed;
            disposed.push(entry.descriptor());
        }

        if !disposed.is_empty() {
            tracing::info!("Disposed {} agents", disposed.len());
        }
        disposed
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
