//! Session Store: per-user named conversation sessions.
//!
//! Each user owns an ordered set of named sessions plus an active-session
//! pointer. All state sits behind one store-wide mutex, so every
//! read-modify-write (including turn resolution) is atomic. The lock is
//! never held across an `.await`.
//!
//! Placeholder session ids are 6-digit strings, unique across the store.
//! The remote service may replace them with its own ids via `update_id`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::task::JoinHandle;

use super::errors::SessionError;
use super::types::{ResolvedSession, Session, SessionView, DEFAULT_SESSION_NAME};

/// Number of distinct placeholder ids (`000000`..=`999999`).
const ID_SPACE: u64 = 1_000_000;

/// Time-seeded random draws before falling back to a linear probe.
const FAST_ATTEMPTS: usize = 16;

// ─── State ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UserSessions {
    /// Insertion order is the listing order.
    sessions: Vec<Session>,
    /// Name of the active session, if any.
    active: Option<String>,
}

impl UserSessions {
    fn position(&self, name: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.name == name)
    }

    fn active_index(&self) -> Option<usize> {
        self.active.as_deref().and_then(|name| self.position(name))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<String, UserSessions>,
    /// Ids held by live sessions (placeholders and server-assigned).
    issued_ids: HashSet<String>,
}

// ─── SessionStore ───────────────────────────────────────────────────────────

/// Process-wide session registry, shared via `Arc`.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: Mutex<StoreState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // No operation leaves the state half-updated on panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a named session for the user and make it active.
    ///
    /// The new session has no id until its first turn.
    pub fn create(&self, user_id: &str, name: &str) -> Result<Session, SessionError> {
        let mut state = self.lock();
        let user = state.users.entry(user_id.to_string()).or_default();

        if user.position(name).is_some() {
            return Err(SessionError::DuplicateName {
                name: name.to_string(),
            });
        }

        let session = Session::new(user_id, name, Utc::now());
        user.sessions.push(session.clone());
        user.active = Some(name.to_string());

        tracing::info!(user_id, session = name, "session created");
        Ok(session)
    }

    /// The user's active session, if one is set.
    pub fn get_active(&self, user_id: &str) -> Option<Session> {
        let state = self.lock();
        let user = state.users.get(user_id)?;
        user.active_index().map(|i| user.sessions[i].clone())
    }

    pub fn set_active(&self, user_id: &str, name: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        let user = state
            .users
            .get_mut(user_id)
            .filter(|u| u.position(name).is_some())
            .ok_or_else(|| SessionError::NotFound {
                name: name.to_string(),
            })?;

        user.active = Some(name.to_string());
        if let Some(session) = user.find_mut(name) {
            session.last_used_at = Utc::now();
        }
        Ok(())
    }

    /// Rename a session, keeping its id, list position and active status.
    ///
    /// Renaming a session to its current name succeeds without changes.
    pub fn rename(&self, user_id: &str, old: &str, new: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        let not_found = || SessionError::NotFound {
            name: old.to_string(),
        };
        let user = state.users.get_mut(user_id).ok_or_else(not_found)?;
        let index = user.position(old).ok_or_else(not_found)?;

        if old == new {
            return Ok(());
        }
        if user.position(new).is_some() {
            return Err(SessionError::DuplicateName {
                name: new.to_string(),
            });
        }

        user.sessions[index].name = new.to_string();
        if user.active.as_deref() == Some(old) {
            user.active = Some(new.to_string());
        }

        tracing::info!(user_id, from = old, to = new, "session renamed");
        Ok(())
    }

    /// Delete a session. Clears the active pointer if it referenced it.
    pub fn delete(&self, user_id: &str, name: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        let StoreState { users, issued_ids } = &mut *state;
        let not_found = || SessionError::NotFound {
            name: name.to_string(),
        };
        let user = users.get_mut(user_id).ok_or_else(not_found)?;
        let index = user.position(name).ok_or_else(not_found)?;

        let removed = user.sessions.remove(index);
        if let Some(id) = &removed.id {
            issued_ids.remove(id);
        }
        if user.active.as_deref() == Some(name) {
            user.active = None;
        }

        tracing::info!(user_id, session = name, "session deleted");
        Ok(())
    }

    /// Remove every session of the user. Returns how many were removed.
    pub fn clear(&self, user_id: &str) -> usize {
        let mut state = self.lock();
        let StoreState { users, issued_ids } = &mut *state;
        let Some(user) = users.remove(user_id) else {
            return 0;
        };

        for id in user.sessions.iter().filter_map(|s| s.id.as_ref()) {
            issued_ids.remove(id);
        }
        tracing::info!(user_id, removed = user.sessions.len(), "sessions cleared");
        user.sessions.len()
    }

    /// Overwrite a session's id and mark it as just used.
    pub fn update_id(&self, user_id: &str, name: &str, new_id: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        let StoreState { users, issued_ids } = &mut *state;
        let session = users
            .get_mut(user_id)
            .and_then(|u| u.find_mut(name))
            .ok_or_else(|| SessionError::NotFound {
                name: name.to_string(),
            })?;

        if let Some(old) = session.id.replace(new_id.to_string()) {
            if old != new_id {
                issued_ids.remove(&old);
            }
        }
        issued_ids.insert(new_id.to_string());
        session.last_used_at = Utc::now();
        Ok(())
    }

    /// The user's sessions in creation order.
    pub fn list(&self, user_id: &str) -> Vec<SessionView> {
        let state = self.lock();
        let Some(user) = state.users.get(user_id) else {
            return Vec::new();
        };

        user.sessions
            .iter()
            .map(|s| SessionView {
                name: s.name.clone(),
                id: s.id.clone(),
                created_at: s.created_at,
                last_used_at: s.last_used_at,
                active: user.active.as_deref() == Some(s.name.as_str()),
            })
            .collect()
    }

    /// Pick the session for a conversation turn, creating or activating one
    /// as needed, and make sure it has an id.
    ///
    /// - no sessions: create `"default"`, make it active
    /// - sessions but none active: activate the first one
    /// - otherwise: the active session
    pub fn resolve_for_turn(&self, user_id: &str) -> Result<ResolvedSession, SessionError> {
        let mut state = self.lock();
        let StoreState { users, issued_ids } = &mut *state;
        let user = users.entry(user_id.to_string()).or_default();

        if user.sessions.is_empty() {
            let id = allocate_placeholder(issued_ids, ID_SPACE)?;
            let mut session = Session::new(user_id, DEFAULT_SESSION_NAME, Utc::now());
            session.id = Some(id.clone());
            user.sessions.push(session);
            user.active = Some(DEFAULT_SESSION_NAME.to_string());

            tracing::info!(user_id, session_id = %id, "default session created");
            return Ok(ResolvedSession {
                name: DEFAULT_SESSION_NAME.to_string(),
                id,
                created: true,
            });
        }

        let index = match user.active_index() {
            Some(index) => index,
            None => {
                let first = user.sessions[0].name.clone();
                tracing::debug!(user_id, session = %first, "no active session, activating first");
                user.active = Some(first);
                0
            }
        };

        let session = &mut user.sessions[index];
        let id = match session.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let id = allocate_placeholder(issued_ids, ID_SPACE)?;
                session.id = Some(id.clone());
                id
            }
        };

        Ok(ResolvedSession {
            name: session.name.clone(),
            id,
            created: false,
        })
    }

    /// Remove sessions idle longer than `timeout`.
    pub fn cleanup_expired(&self, timeout: Duration) -> usize {
        self.cleanup_expired_at(Utc::now(), timeout)
    }

    /// `cleanup_expired` against an explicit clock. Idempotent.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return 0;
        };

        let mut state = self.lock();
        let StoreState { users, issued_ids } = &mut *state;
        let mut removed = 0;

        for (user_id, user) in users.iter_mut() {
            let before = user.sessions.len();
            user.sessions.retain(|s| {
                let expired = now - s.last_used_at > timeout;
                if expired {
                    if let Some(id) = &s.id {
                        issued_ids.remove(id);
                    }
                    tracing::debug!(user_id = %user_id, session = %s.name, "session expired");
                }
                !expired
            });
            removed += before - user.sessions.len();

            if user.active_index().is_none() {
                user.active = None;
            }
        }
        users.retain(|_, u| !u.sessions.is_empty());

        removed
    }

    #[cfg(test)]
    fn set_last_used(&self, user_id: &str, name: &str, at: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(session) = state.users.get_mut(user_id).and_then(|u| u.find_mut(name)) {
            session.last_used_at = at;
        }
    }
}

/// Run `cleanup_expired` every `interval` until the runtime shuts down.
pub fn spawn_expiry_sweep(
    store: Arc<SessionStore>,
    interval: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.cleanup_expired(timeout);
            if removed > 0 {
                tracing::info!(removed, "expired sessions swept");
            }
        }
    })
}

// ─── Placeholder ids ────────────────────────────────────────────────────────

/// Draw an unused placeholder id in `0..space` and record it as issued.
///
/// A few time-seeded random draws cover the common case. If they all
/// collide, a linear probe from a random start visits every value once, so
/// a free id is always found when one exists.
fn allocate_placeholder(issued: &mut HashSet<String>, space: u64) -> Result<String, SessionError> {
    let mut rng = rand::thread_rng();
    let millis = Utc::now().timestamp_millis().unsigned_abs();

    for _ in 0..FAST_ATTEMPTS {
        let candidate = format_placeholder(millis.wrapping_add(rng.gen_range(0..space)) % space);
        if issued.insert(candidate.clone()) {
            return Ok(candidate);
        }
    }

    let start = rng.gen_range(0..space);
    for offset in 0..space {
        let candidate = format_placeholder((start + offset) % space);
        if issued.insert(candidate.clone()) {
            return Ok(candidate);
        }
    }

    tracing::warn!(issued = issued.len(), "placeholder id space exhausted");
    Err(SessionError::IdSpaceExhausted)
}

fn format_placeholder(n: u64) -> String {
    format!("{n:06}")
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "console:alice";

    fn names(store: &SessionStore, user_id: &str) -> Vec<String> {
        store.list(user_id).into_iter().map(|v| v.name).collect()
    }

    #[test]
    fn test_first_turn_creates_default_session() {
        let store = SessionStore::new();
        let resolved = store.resolve_for_turn(USER).unwrap();

        assert!(resolved.created);
        assert_eq!(resolved.name, "default");
        assert_eq!(resolved.id.len(), 6);
        assert!(resolved.id.chars().all(|c| c.is_ascii_digit()));

        let listed = store.list(USER);
        assert_eq!(listed.len(), 1);
        assert!(listed[0].active);
        assert_eq!(listed[0].id.as_deref(), Some(resolved.id.as_str()));
    }

    #[test]
    fn test_second_turn_reuses_active_session() {
        let store = SessionStore::new();
        let first = store.resolve_for_turn(USER).unwrap();
        let second = store.resolve_for_turn(USER).unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list(USER).len(), 1);
    }

    #[test]
    fn test_concurrent_first_turns_create_one_default() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.resolve_for_turn(USER).unwrap())
            })
            .collect();

        let ids: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap().id).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.list(USER).len(), 1);
    }

    #[test]
    fn test_create_activates_and_rejects_duplicates() {
        let store = SessionStore::new();
        store.create(USER, "work").unwrap();
        store.create(USER, "play").unwrap();
        assert_eq!(store.get_active(USER).unwrap().name, "play");

        let err = store.create(USER, "work").unwrap_err();
        assert_eq!(err, SessionError::DuplicateName { name: "work".into() });
        assert_eq!(names(&store, USER), vec!["work", "play"]);
        assert_eq!(store.get_active(USER).unwrap().name, "play");
    }

    #[test]
    fn test_created_session_gets_id_on_first_turn() {
        let store = SessionStore::new();
        let created = store.create(USER, "work").unwrap();
        assert!(created.id.is_none());

        let resolved = store.resolve_for_turn(USER).unwrap();
        assert_eq!(resolved.name, "work");
        assert!(!resolved.created);
        assert_eq!(store.get_active(USER).unwrap().id, Some(resolved.id));
    }

    #[test]
    fn test_set_active_unknown_name() {
        let store = SessionStore::new();
        store.create(USER, "work").unwrap();
        assert_eq!(
            store.set_active(USER, "nope"),
            Err(SessionError::NotFound { name: "nope".into() })
        );
        assert_eq!(
            store.set_active("console:bob", "work"),
            Err(SessionError::NotFound { name: "work".into() })
        );
    }

    #[test]
    fn test_delete_active_clears_pointer_then_next_turn_activates_first() {
        let store = SessionStore::new();
        store.create(USER, "a").unwrap();
        store.create(USER, "b").unwrap();

        store.delete(USER, "b").unwrap();
        assert!(store.get_active(USER).is_none());

        let resolved = store.resolve_for_turn(USER).unwrap();
        assert_eq!(resolved.name, "a");
        assert!(!resolved.created);
        assert_eq!(store.get_active(USER).unwrap().name, "a");
    }

    #[test]
    fn test_delete_missing_session() {
        let store = SessionStore::new();
        assert!(matches!(
            store.delete(USER, "ghost"),
            Err(SessionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_active_preserves_pointer_and_id() {
        let store = SessionStore::new();
        store.create(USER, "first").unwrap();
        let resolved = store.resolve_for_turn(USER).unwrap();
        store.create(USER, "other").unwrap();
        store.set_active(USER, "first").unwrap();

        store.rename(USER, "first", "renamed").unwrap();

        let active = store.get_active(USER).unwrap();
        assert_eq!(active.name, "renamed");
        assert_eq!(active.id, Some(resolved.id));
        assert_eq!(names(&store, USER), vec!["renamed", "other"]);
    }

    #[test]
    fn test_rename_errors_and_same_name() {
        let store = SessionStore::new();
        store.create(USER, "a").unwrap();
        store.create(USER, "b").unwrap();

        assert_eq!(
            store.rename(USER, "missing", "c"),
            Err(SessionError::NotFound { name: "missing".into() })
        );
        assert_eq!(
            store.rename(USER, "a", "b"),
            Err(SessionError::DuplicateName { name: "b".into() })
        );
        assert_eq!(store.rename(USER, "a", "a"), Ok(()));
        assert_eq!(names(&store, USER), vec!["a", "b"]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = SessionStore::new();
        store.create(USER, "a").unwrap();
        store.create(USER, "b").unwrap();
        store.create("console:bob", "x").unwrap();

        assert_eq!(store.clear(USER), 2);
        assert!(store.list(USER).is_empty());
        assert!(store.get_active(USER).is_none());
        assert_eq!(store.clear(USER), 0);
        assert_eq!(names(&store, "console:bob"), vec!["x"]);
    }

    #[test]
    fn test_update_id_round_trip() {
        let store = SessionStore::new();
        let resolved = store.resolve_for_turn(USER).unwrap();

        store.update_id(USER, &resolved.name, "srv-abc").unwrap();
        assert_eq!(store.get_active(USER).unwrap().id.as_deref(), Some("srv-abc"));
        assert_eq!(store.resolve_for_turn(USER).unwrap().id, "srv-abc");

        store.update_id(USER, &resolved.name, "srv-def").unwrap();
        assert_eq!(store.get_active(USER).unwrap().id.as_deref(), Some("srv-def"));

        assert!(matches!(
            store.update_id(USER, "ghost", "x"),
            Err(SessionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_users_are_isolated() {
        let store = SessionStore::new();
        store.create(USER, "work").unwrap();
        store.create("console:bob", "work").unwrap();
        store.delete(USER, "work").unwrap();
        assert_eq!(names(&store, "console:bob"), vec!["work"]);
    }

    #[test]
    fn test_cleanup_removes_only_idle_sessions() {
        let store = SessionStore::new();
        let now = Utc::now();
        store.create(USER, "old").unwrap();
        store.create(USER, "fresh").unwrap();
        store.set_active(USER, "old").unwrap();
        store.set_last_used(USER, "old", now - chrono::Duration::hours(3));
        store.set_last_used(USER, "fresh", now - chrono::Duration::minutes(10));

        let removed = store.cleanup_expired_at(now, Duration::from_secs(2 * 60 * 60));
        assert_eq!(removed, 1);
        assert_eq!(names(&store, USER), vec!["fresh"]);
        assert!(store.get_active(USER).is_none());

        // Idempotent.
        assert_eq!(store.cleanup_expired_at(now, Duration::from_secs(2 * 60 * 60)), 0);
    }

    #[test]
    fn test_cleanup_drops_emptied_users() {
        let store = SessionStore::new();
        store.resolve_for_turn(USER).unwrap();
        let later = Utc::now() + chrono::Duration::hours(5);

        assert_eq!(store.cleanup_expired_at(later, Duration::from_secs(60)), 1);
        assert!(store.list(USER).is_empty());

        // Next turn starts over with a fresh default session.
        assert!(store.resolve_for_turn(USER).unwrap().created);
    }

    #[test]
    fn test_allocator_unique_and_zero_padded() {
        let mut issued = HashSet::new();
        for _ in 0..200 {
            let id = allocate_placeholder(&mut issued, ID_SPACE).unwrap();
            assert_eq!(id.len(), 6);
        }
        assert_eq!(issued.len(), 200);
    }

    #[test]
    fn test_allocator_probe_fills_small_space() {
        let mut issued = HashSet::new();
        for _ in 0..10 {
            allocate_placeholder(&mut issued, 10).unwrap();
        }
        let expected: HashSet<String> = (0..10).map(format_placeholder).collect();
        assert_eq!(issued, expected);
        assert_eq!(
            allocate_placeholder(&mut issued, 10),
            Err(SessionError::IdSpaceExhausted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sweep_task_runs() {
        let store = Arc::new(SessionStore::new());
        store.resolve_for_turn(USER).unwrap();
        store.set_last_used(USER, "default", Utc::now() - chrono::Duration::hours(3));

        let handle = spawn_expiry_sweep(
            Arc::clone(&store),
            Duration::from_secs(60),
            Duration::from_secs(2 * 60 * 60),
        );
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.list(USER).is_empty());
        handle.abort();
    }
}
