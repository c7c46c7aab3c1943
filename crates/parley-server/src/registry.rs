//! Online-presence registry: the process-wide name → user mapping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use parley_protocol::{reasons, UserInfo};
use tracing::debug;

use crate::websocket::connection::ClientConnection;

/// Why a registration attempt was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The connection is already bound to a name.
    #[error("{}", reasons::ALREADY_REGISTERED)]
    AlreadyRegistered,
    /// The frame carried no usable name.
    #[error("{}", reasons::NAME_EMPTY)]
    EmptyName,
    /// Another open connection already holds the name.
    #[error("{}", reasons::NAME_TAKEN)]
    NameTaken,
}

impl RegisterError {
    /// The wire reason for this refusal.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AlreadyRegistered => reasons::ALREADY_REGISTERED,
            Self::EmptyName => reasons::NAME_EMPTY,
            Self::NameTaken => reasons::NAME_TAKEN,
        }
    }
}

/// A successful registration: the new member plus the roster snapshot taken
/// inside the same critical section, ready to broadcast.
#[derive(Debug)]
pub struct Admission {
    /// The newly registered user.
    pub user: UserInfo,
    /// Everyone registered, in registration order, after the insert.
    pub users: Vec<UserInfo>,
}

/// One registered member: the public record plus the send handle of the
/// connection that owns the name.
struct Member {
    user: UserInfo,
    conn: Arc<ClientConnection>,
}

#[derive(Default)]
struct RosterInner {
    by_name: HashMap<String, Member>,
    /// Names in registration order, for deterministic `users` snapshots.
    order: Vec<String>,
}

/// Process-wide mapping from display name to online user.
///
/// All read-modify-write sequences (check-name-then-insert,
/// remove-then-snapshot) run under one `RwLock` write guard, so two
/// connections racing for the same name cannot both win and a disconnect
/// cannot interleave with a registration under the departing name.
#[derive(Default)]
pub struct Roster {
    inner: RwLock<RosterInner>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `name` for `conn` and bind it.
    ///
    /// The duplicate check, the insert, the binding, and the snapshot for
    /// the membership broadcast are one indivisible step relative to other
    /// roster mutations.
    pub fn register(
        &self,
        name: Option<&str>,
        conn: &Arc<ClientConnection>,
    ) -> Result<Admission, RegisterError> {
        if conn.is_registered() {
            return Err(RegisterError::AlreadyRegistered);
        }
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(RegisterError::EmptyName),
        };

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(name) {
            return Err(RegisterError::NameTaken);
        }
        let user = UserInfo::new(name);
        let _ = inner.by_name.insert(
            name.to_string(),
            Member {
                user: user.clone(),
                conn: Arc::clone(conn),
            },
        );
        inner.order.push(name.to_string());
        conn.bind_name(name.to_string());
        debug!(name, conn_id = %conn.id, "name registered");

        Ok(Admission {
            user,
            users: snapshot(&inner),
        })
    }

    /// Release `name` if it is still bound to connection `conn_id`, and
    /// return the post-removal snapshot for the membership broadcast.
    ///
    /// Returns `None` when the name is absent or held by a different
    /// connection — a stale disconnect cleanup can never evict a name a
    /// newcomer has since claimed.
    pub fn remove(&self, name: &str, conn_id: &str) -> Option<Vec<UserInfo>> {
        let mut inner = self.inner.write();
        if !inner
            .by_name
            .get(name)
            .is_some_and(|m| m.conn.id == conn_id)
        {
            return None;
        }
        if let Some(member) = inner.by_name.remove(name) {
            member.conn.clear_name();
        }
        inner.order.retain(|n| n != name);
        debug!(name, conn_id, "name released");
        Some(snapshot(&inner))
    }

    /// Point-in-time snapshot of the user list, in registration order.
    pub fn users(&self) -> Vec<UserInfo> {
        snapshot(&self.inner.read())
    }

    /// Point-in-time snapshot of registered send handles, for fan-out.
    pub fn members(&self) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|n| inner.by_name.get(n).map(|m| Arc::clone(&m.conn)))
            .collect()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    /// Whether nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_name.is_empty()
    }
}

fn snapshot(inner: &RosterInner) -> Vec<UserInfo> {
    inner
        .order
        .iter()
        .filter_map(|n| inner.by_name.get(n).map(|m| m.user.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_conn(id: &str) -> Arc<ClientConnection> {
        let (tx, rx) = mpsc::channel(32);
        // Keep the receiver alive so sends would succeed; tests here only
        // exercise the roster, not delivery.
        std::mem::forget(rx);
        Arc::new(ClientConnection::new(id.into(), tx))
    }

    #[test]
    fn register_binds_and_snapshots() {
        let roster = Roster::new();
        let conn = make_conn("c1");
        let admission = roster.register(Some("alice"), &conn).unwrap();
        assert_eq!(admission.user.name, "alice");
        assert_eq!(admission.users, vec![UserInfo::new("alice")]);
        assert_eq!(conn.user_name().as_deref(), Some("alice"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn register_empty_name_refused() {
        let roster = Roster::new();
        let conn = make_conn("c1");
        assert_eq!(
            roster.register(None, &conn).unwrap_err(),
            RegisterError::EmptyName
        );
        assert_eq!(
            roster.register(Some(""), &conn).unwrap_err(),
            RegisterError::EmptyName
        );
        assert!(roster.is_empty());
        assert!(conn.user_name().is_none());
    }

    #[test]
    fn register_duplicate_name_refused() {
        let roster = Roster::new();
        let first = make_conn("c1");
        let second = make_conn("c2");
        assert!(roster.register(Some("alice"), &first).is_ok());
        assert_eq!(
            roster.register(Some("alice"), &second).unwrap_err(),
            RegisterError::NameTaken
        );
        assert_eq!(roster.len(), 1);
        assert!(second.user_name().is_none());
    }

    #[test]
    fn register_twice_on_same_connection_refused() {
        let roster = Roster::new();
        let conn = make_conn("c1");
        assert!(roster.register(Some("alice"), &conn).is_ok());
        assert_eq!(
            roster.register(Some("alice2"), &conn).unwrap_err(),
            RegisterError::AlreadyRegistered
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn already_registered_wins_over_empty_name() {
        // Matches the precondition order: a registered connection sending a
        // nameless register frame gets "Already registered".
        let roster = Roster::new();
        let conn = make_conn("c1");
        assert!(roster.register(Some("alice"), &conn).is_ok());
        assert_eq!(
            roster.register(None, &conn).unwrap_err(),
            RegisterError::AlreadyRegistered
        );
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let roster = Roster::new();
        for (id, name) in [("c1", "carol"), ("c2", "alice"), ("c3", "bob")] {
            assert!(roster.register(Some(name), &make_conn(id)).is_ok());
        }
        let names: Vec<_> = roster.users().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn remove_returns_post_removal_snapshot() {
        let roster = Roster::new();
        let a = make_conn("c1");
        let b = make_conn("c2");
        assert!(roster.register(Some("alice"), &a).is_ok());
        assert!(roster.register(Some("bob"), &b).is_ok());

        let users = roster.remove("alice", "c1").unwrap();
        assert_eq!(users, vec![UserInfo::new("bob")]);
        assert!(a.user_name().is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn remove_unknown_name_is_none() {
        let roster = Roster::new();
        assert!(roster.remove("ghost", "c1").is_none());
    }

    #[test]
    fn stale_remove_cannot_evict_new_owner() {
        let roster = Roster::new();
        let old = make_conn("c1");
        let new = make_conn("c2");
        assert!(roster.register(Some("alice"), &old).is_ok());
        assert!(roster.remove("alice", "c1").is_some());
        assert!(roster.register(Some("alice"), &new).is_ok());

        // A second (stale) cleanup for the old connection must not touch
        // the newcomer's entry.
        assert!(roster.remove("alice", "c1").is_none());
        assert_eq!(roster.len(), 1);
        assert_eq!(new.user_name().as_deref(), Some("alice"));
    }

    #[test]
    fn reregistered_name_moves_to_end_of_order() {
        let roster = Roster::new();
        assert!(roster.register(Some("alice"), &make_conn("c1")).is_ok());
        assert!(roster.register(Some("bob"), &make_conn("c2")).is_ok());
        assert!(roster.remove("alice", "c1").is_some());
        assert!(roster.register(Some("alice"), &make_conn("c3")).is_ok());

        let names: Vec<_> = roster.users().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["bob", "alice"]);
    }

    #[test]
    fn members_matches_registration_order() {
        let roster = Roster::new();
        let a = make_conn("c1");
        let b = make_conn("c2");
        assert!(roster.register(Some("alice"), &a).is_ok());
        assert!(roster.register(Some("bob"), &b).is_ok());

        let ids: Vec<_> = roster.members().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn concurrent_registration_exactly_one_wins() {
        let roster = Arc::new(Roster::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let roster = Arc::clone(&roster);
            handles.push(std::thread::spawn(move || {
                let (tx, rx) = mpsc::channel(1);
                std::mem::forget(rx);
                let conn = Arc::new(ClientConnection::new(format!("c{i}"), tx));
                roster.register(Some("alice"), &conn).is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(roster.len(), 1);
    }
}
