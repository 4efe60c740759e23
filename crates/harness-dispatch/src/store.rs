//! Concurrency-safe registry of addressable entities.
//!
//! Clients live in a flat namespace keyed by the driver-supplied client id.
//! Invocation results live in one namespace per command name and are keyed by
//! their insertion index, so an address is derivable from
//! `(command, insertion order)` alone and is never reused.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use harness_sdk::SdkClient;
use tokio::sync::RwLock;

use crate::{Entity, Returned};

/// Address minted by the store and handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Client(String),
    Command { command: String, sequence: u64 },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(client_id) => write!(f, "client/{client_id}"),
            Self::Command { command, sequence } => write!(f, "command/{command}/{sequence}"),
        }
    }
}

/// Address as received from the driver; the id segment is not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Client(String),
    Command { command: String, id: String },
}

impl TargetRef {
    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(client_id) => write!(f, "client/{client_id}"),
            Self::Command { command, id } => write!(f, "command/{command}/{id}"),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    clients: HashMap<String, Arc<SdkClient>>,
    results: HashMap<String, Vec<Arc<Returned>>>,
}

/// Owns every live entity behind a single reader/writer lock.
#[derive(Debug, Default)]
pub struct EntityStore {
    state: RwLock<StoreState>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a client, returning the one it replaced.
    pub async fn register_client(
        &self,
        client_id: &str,
        client: Arc<SdkClient>,
    ) -> Option<Arc<SdkClient>> {
        self.state
            .write()
            .await
            .clients
            .insert(client_id.to_string(), client)
    }

    pub async fn remove_client(&self, client_id: &str) -> Option<Arc<SdkClient>> {
        self.state.write().await.clients.remove(client_id)
    }

    pub async fn client(&self, client_id: &str) -> Option<Arc<SdkClient>> {
        self.state.read().await.clients.get(client_id).cloned()
    }

    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    /// Resolves a driver-supplied address. Unknown namespaces, unknown ids and
    /// non-numeric result ids all resolve to `None`.
    pub async fn lookup(&self, target: &TargetRef) -> Option<Entity> {
        let state = self.state.read().await;
        match target {
            TargetRef::Client(client_id) => {
                state.clients.get(client_id).cloned().map(Entity::Client)
            }
            TargetRef::Command { command, id } => {
                let index = id.parse::<usize>().ok()?;
                state
                    .results
                    .get(command)?
                    .get(index)
                    .cloned()
                    .map(Entity::Result)
            }
        }
    }

    /// Sequence number the next result stored under `command` will receive.
    pub async fn next_sequence(&self, command: &str) -> u64 {
        self.state
            .read()
            .await
            .results
            .get(command)
            .map_or(0, |results| results.len() as u64)
    }

    /// Mints the next address under `command` and stores `result` there in one
    /// critical section.
    pub async fn record_result(&self, command: &str, result: Arc<Returned>) -> Location {
        let mut state = self.state.write().await;
        let results = state.results.entry(command.to_string()).or_default();
        let sequence = results.len() as u64;
        results.push(result);
        Location::Command {
            command: command.to_string(),
            sequence,
        }
    }
}
