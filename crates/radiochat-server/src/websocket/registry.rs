//! Who is online: users by identity, radios by connection.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use radiochat_auth::Identity;

use super::connection::{Connection, ConnectionId};
use super::protocol::Role;

#[derive(Default)]
struct Inner {
    users: HashMap<Identity, Arc<Connection>>,
    radios: BTreeMap<ConnectionId, Arc<Connection>>,
}

/// Shared set of registered connections.
///
/// A single lock guards both maps. It is held only for map manipulation;
/// callers copy out what they need and do I/O after it is released.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under its role.
    ///
    /// Returns the user session it superseded, if any. The caller closes it.
    pub fn register(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        match connection.role() {
            Role::User => self.register_user(connection),
            Role::Radio => {
                self.register_radio(connection);
                None
            }
        }
    }

    /// Make `connection` the live session for its identity.
    ///
    /// The replacement is atomic: the new entry is visible before the
    /// previous one is returned for teardown.
    pub fn register_user(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let id = connection.id();
        let identity = connection.identity().clone();
        let previous = self.inner.lock().users.insert(identity, connection);
        previous.filter(|prev| prev.id() != id)
    }

    /// Add a radio session. Radios may hold several sessions at once.
    pub fn register_radio(&self, connection: Arc<Connection>) {
        let _ = self.inner.lock().radios.insert(connection.id(), connection);
    }

    /// Remove `connection` if it is still registered. Idempotent.
    ///
    /// A user entry is only removed when it is this exact connection, so a
    /// superseded session's teardown never drops its successor.
    pub fn unregister(&self, connection: &Connection) -> bool {
        let mut inner = self.inner.lock();
        match connection.role() {
            Role::User => {
                let current = inner
                    .users
                    .get(connection.identity())
                    .is_some_and(|c| c.id() == connection.id());
                if current {
                    let _ = inner.users.remove(connection.identity());
                }
                current
            }
            Role::Radio => inner.radios.remove(&connection.id()).is_some(),
        }
    }

    /// Radios registered right now, in registration order.
    pub fn snapshot_radios(&self) -> Vec<Arc<Connection>> {
        self.inner.lock().radios.values().cloned().collect()
    }

    /// Live session for `identity`.
    pub fn lookup_user(&self, identity: &Identity) -> Option<Arc<Connection>> {
        self.inner.lock().users.get(identity).cloned()
    }

    /// Whether this exact connection is registered.
    pub fn contains(&self, connection: &Connection) -> bool {
        let inner = self.inner.lock();
        match connection.role() {
            Role::User => inner
                .users
                .get(connection.identity())
                .is_some_and(|c| c.id() == connection.id()),
            Role::Radio => inner.radios.contains_key(&connection.id()),
        }
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.inner.lock().users.len()
    }

    /// Number of registered radio sessions.
    pub fn radio_count(&self) -> usize {
        self.inner.lock().radios.len()
    }
}
