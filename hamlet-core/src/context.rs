use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{Entity, EntityKind};

/// World or region a balance is partitioned by or displayed in.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(String);

impl Context {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DirectoryError {
    #[error("{kind} '{id}' is not registered")]
    NotRegistered { kind: EntityKind, id: String },
    #[error("federation '{0}' has no capital")]
    NoCapital(String),
}

/// Lookup service owned by the surrounding entity-management system.
pub trait EntityDirectory: Send + Sync {
    /// Identifier of the collective designated as the federation's capital.
    fn capital_of(&self, federation_id: &str) -> DirectoryResult<String>;

    /// Context a registered collective lives in.
    fn context_of(&self, collective_id: &str) -> DirectoryResult<Context>;

    /// Context of the connected instance of an individual, if any.
    fn live_context_of(&self, individual_id: &str) -> Option<Context>;

    /// The server's first world. Used whenever nothing more precise is known.
    fn primary_context(&self) -> Context;
}

/// Resolve the context for `entity`, falling back to the primary context
/// whenever the directory cannot answer. Never fails.
pub fn resolve_context(directory: &dyn EntityDirectory, entity: &Entity) -> Context {
    let resolved = match entity.kind() {
        EntityKind::Federation => directory
            .capital_of(entity.id())
            .and_then(|capital| directory.context_of(&capital)),
        EntityKind::Collective => directory.context_of(entity.id()),
        EntityKind::Individual => {
            return directory
                .live_context_of(entity.id())
                .unwrap_or_else(|| directory.primary_context());
        }
    };
    resolved.unwrap_or_else(|err| {
        debug!(entity = %entity, error = %err, "context lookup failed; using primary context");
        directory.primary_context()
    })
}

#[derive(Debug, Default)]
struct DirectoryState {
    collectives: HashMap<String, Context>,
    federations: HashMap<String, Option<String>>,
    connected: HashMap<String, Context>,
}

/// In-process [`EntityDirectory`] backed by hash maps.
#[derive(Debug)]
pub struct MemoryDirectory {
    primary: Context,
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new(primary: Context) -> Self {
        Self {
            primary,
            state: RwLock::new(DirectoryState::default()),
        }
    }

    pub fn register_collective(&self, id: impl Into<String>, context: Context) {
        self.state.write().collectives.insert(id.into(), context);
    }

    pub fn register_federation(&self, id: impl Into<String>, capital: Option<String>) {
        self.state.write().federations.insert(id.into(), capital);
    }

    pub fn connect(&self, individual: impl Into<String>, context: Context) {
        self.state.write().connected.insert(individual.into(), context);
    }

    pub fn disconnect(&self, individual: &str) {
        self.state.write().connected.remove(individual);
    }
}

impl EntityDirectory for MemoryDirectory {
    fn capital_of(&self, federation_id: &str) -> DirectoryResult<String> {
        match self.state.read().federations.get(federation_id) {
            Some(Some(capital)) => Ok(capital.clone()),
            Some(None) => Err(DirectoryError::NoCapital(federation_id.to_string())),
            None => Err(DirectoryError::NotRegistered {
                kind: EntityKind::Federation,
                id: federation_id.to_string(),
            }),
        }
    }

    fn context_of(&self, collective_id: &str) -> DirectoryResult<Context> {
        self.state
            .read()
            .collectives
            .get(collective_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotRegistered {
                kind: EntityKind::Collective,
                id: collective_id.to_string(),
            })
    }

    fn live_context_of(&self, individual_id: &str) -> Option<Context> {
        self.state.read().connected.get(individual_id).cloned()
    }

    fn primary_context(&self) -> Context {
        self.primary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> MemoryDirectory {
        let dir = MemoryDirectory::new(Context::new("world"));
        dir.register_collective("Riverside", Context::new("world_nether"));
        dir.register_federation("Atlantis", Some("Riverside".into()));
        dir.register_federation("Lemuria", None);
        dir
    }

    #[test]
    fn collective_uses_its_registered_context() {
        let dir = directory();
        let ctx = resolve_context(&dir, &Entity::collective("Riverside"));
        assert_eq!(ctx.as_str(), "world_nether");
    }

    #[test]
    fn federation_uses_its_capital_context() {
        let dir = directory();
        let ctx = resolve_context(&dir, &Entity::federation("Atlantis"));
        assert_eq!(ctx.as_str(), "world_nether");
    }

    #[test]
    fn unregistered_entities_fall_back_to_primary() {
        let dir = directory();
        assert_eq!(
            resolve_context(&dir, &Entity::collective("Nowhere")).as_str(),
            "world"
        );
        assert_eq!(
            resolve_context(&dir, &Entity::federation("Nowhere")).as_str(),
            "world"
        );
        assert_eq!(
            resolve_context(&dir, &Entity::federation("Lemuria")).as_str(),
            "world"
        );
    }

    #[test]
    fn federation_with_unregistered_capital_falls_back() {
        let dir = directory();
        dir.register_federation("Mu", Some("Ghosttown".into()));
        assert_eq!(
            resolve_context(&dir, &Entity::federation("Mu")).as_str(),
            "world"
        );
    }

    #[test]
    fn individual_follows_live_connection() {
        let dir = directory();
        let steve = Entity::individual("Steve");
        assert_eq!(resolve_context(&dir, &steve).as_str(), "world");
        dir.connect("Steve", Context::new("world_the_end"));
        assert_eq!(resolve_context(&dir, &steve).as_str(), "world_the_end");
        dir.disconnect("Steve");
        assert_eq!(resolve_context(&dir, &steve).as_str(), "world");
    }
}
