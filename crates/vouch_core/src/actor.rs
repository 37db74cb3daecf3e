//! Identity of whoever performs a write.

use serde::{Deserialize, Serialize};
use vouch_db::DbTimestamp;

/// The maker or checker behind an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Actor {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Actor {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An actor paired with the instant an operation started.
///
/// Taken once per top-level operation so every row written by that
/// operation carries the same time.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamp {
    pub actor: Actor,
    pub at: DbTimestamp,
}

impl Stamp {
    pub fn now(actor: &Actor) -> Self {
        Self {
            actor: actor.clone(),
            at: DbTimestamp::now(),
        }
    }

    pub fn at(actor: &Actor, at: DbTimestamp) -> Self {
        Self {
            actor: actor.clone(),
            at,
        }
    }
}
