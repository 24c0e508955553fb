//!
//! gatehouse credential store
//! --------------------------
//! Durable records for the two principal classes: managers (full managers and
//! check bots) and teams. Each row holds a salted password digest and a
//! nullable current session token. The store exclusively owns this state;
//! everything above it only ever sees read-only copies.
//!
//! Key responsibilities:
//! - Exact-match lookups by name, id and token (token resolution is read-only).
//! - Atomic credential mutations with affected-row-count verification: a write
//!   that would touch zero rows (or collide on a token) fails as a unit and no
//!   partial state is ever observable.
//! - Snapshot persistence as JSON, written to a temp file and renamed into
//!   place so a crash never leaves a torn credential file.
//!
//! The write lock scopes each mutation: mutations are applied to a copy of the
//! tables, persisted, and only then swapped in, so a failed persist rolls the
//! whole operation back.

use std::{fs, path::{Path, PathBuf}};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("name already exists: {name}")]
    Duplicate { name: String },
    #[error("write affected {affected} rows, expected {expected}")]
    RowCount { expected: usize, affected: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Manager identity row. `token` is the single active session token; at most
/// one row across the table carries any given token value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerRow {
    pub id: u32,
    pub name: String,
    pub password_hash: String,
    pub token: Option<String>,
    pub is_check: bool,
    pub created_at: DateTime<Utc>,
}

/// Team identity row. Shape of ManagerRow without the role flag; every
/// authenticated team is uniformly team-role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRow {
    pub id: u32,
    pub name: String,
    pub password_hash: String,
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tables {
    next_manager_id: u32,
    next_team_id: u32,
    managers: Vec<ManagerRow>,
    teams: Vec<TeamRow>,
}

impl Default for Tables {
    fn default() -> Self {
        Self { next_manager_id: 1, next_team_id: 1, managers: Vec::new(), teams: Vec::new() }
    }
}

/// Thread-safe credential store. Readers take the shared lock; every mutation
/// runs as a single all-or-nothing unit under the exclusive lock.
pub struct CredentialStore {
    inner: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl CredentialStore {
    /// Open a store backed by a JSON snapshot file, loading it if present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Tables::default()
        };
        Ok(Self { inner: RwLock::new(tables), path: Some(path) })
    }

    /// Ephemeral store with no backing file. Used by tests and embedders that
    /// manage persistence themselves.
    pub fn in_memory() -> Self {
        Self { inner: RwLock::new(Tables::default()), path: None }
    }

    fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        let Some(path) = &self.path else { return Ok(()); };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(tables)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Run `f` against a copy of the tables; persist and swap in only on
    /// success. Any error leaves both memory and disk untouched.
    fn mutate<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut guard = self.inner.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    // ----- manager lookups (read-only) -----

    pub fn find_manager_by_name(&self, name: &str) -> Option<ManagerRow> {
        self.inner.read().managers.iter().find(|m| m.name == name).cloned()
    }

    pub fn find_manager_by_id(&self, id: u32) -> Option<ManagerRow> {
        self.inner.read().managers.iter().find(|m| m.id == id).cloned()
    }

    /// Exact-match token resolution. Empty tokens never match a row whose
    /// token is unset.
    pub fn find_manager_by_token(&self, token: &str) -> Option<ManagerRow> {
        if token.is_empty() { return None; }
        self.inner.read().managers.iter().find(|m| m.token.as_deref() == Some(token)).cloned()
    }

    pub fn list_managers(&self) -> Vec<ManagerRow> {
        self.inner.read().managers.clone()
    }

    pub fn manager_count(&self) -> usize {
        self.inner.read().managers.len()
    }

    // ----- manager mutations -----

    /// Insert a new manager with no active token. Fails on a duplicate name
    /// without touching the existing row.
    pub fn insert_manager(&self, name: &str, password_hash: &str, is_check: bool) -> Result<ManagerRow, StoreError> {
        self.mutate(|t| {
            if t.managers.iter().any(|m| m.name == name) {
                return Err(StoreError::Duplicate { name: name.to_string() });
            }
            let row = ManagerRow {
                id: t.next_manager_id,
                name: name.to_string(),
                password_hash: password_hash.to_string(),
                token: None,
                is_check,
                created_at: Utc::now(),
            };
            t.next_manager_id += 1;
            t.managers.push(row.clone());
            debug!(id = row.id, name = %row.name, is_check, "manager_insert");
            Ok(row)
        })
    }

    /// Atomically overwrite the token field of exactly one manager row,
    /// invalidating whatever token was there before. Zero matching rows fails
    /// the whole operation.
    pub fn replace_manager_token(&self, id: u32, token: Option<String>) -> Result<(), StoreError> {
        self.mutate(|t| {
            if let Some(new) = token.as_deref() {
                if t.managers.iter().any(|m| m.id != id && m.token.as_deref() == Some(new)) {
                    return Err(StoreError::RowCount { expected: 1, affected: 2 });
                }
            }
            let mut affected = 0;
            for m in t.managers.iter_mut().filter(|m| m.id == id) {
                m.token = token.clone();
                affected += 1;
            }
            if affected != 1 {
                return Err(StoreError::RowCount { expected: 1, affected });
            }
            debug!(id, set = token.is_some(), "manager_token_replace");
            Ok(())
        })
    }

    /// Clear the token of whichever manager row carries it. Returns whether a
    /// row was cleared; no match is not an error (idempotent logout).
    pub fn clear_manager_token(&self, token: &str) -> Result<bool, StoreError> {
        if token.is_empty() || self.find_manager_by_token(token).is_none() {
            return Ok(false);
        }
        self.mutate(|t| {
            let mut cleared = false;
            for m in t.managers.iter_mut() {
                if m.token.as_deref() == Some(token) {
                    m.token = None;
                    cleared = true;
                }
            }
            Ok(cleared)
        })
    }

    /// Overwrite the password digest of exactly one manager row.
    pub fn set_manager_password(&self, id: u32, password_hash: &str) -> Result<(), StoreError> {
        self.mutate(|t| {
            let mut affected = 0;
            for m in t.managers.iter_mut().filter(|m| m.id == id) {
                m.password_hash = password_hash.to_string();
                affected += 1;
            }
            if affected != 1 {
                return Err(StoreError::RowCount { expected: 1, affected });
            }
            Ok(())
        })
    }

    /// Hard-delete one manager row by id; zero affected rows fails.
    pub fn delete_manager(&self, id: u32) -> Result<(), StoreError> {
        self.mutate(|t| {
            let before = t.managers.len();
            t.managers.retain(|m| m.id != id);
            let affected = before - t.managers.len();
            if affected != 1 {
                return Err(StoreError::RowCount { expected: 1, affected });
            }
            debug!(id, "manager_delete");
            Ok(())
        })
    }

    // ----- team lookups (read-only) -----

    pub fn find_team_by_name(&self, name: &str) -> Option<TeamRow> {
        self.inner.read().teams.iter().find(|t| t.name == name).cloned()
    }

    pub fn find_team_by_id(&self, id: u32) -> Option<TeamRow> {
        self.inner.read().teams.iter().find(|t| t.id == id).cloned()
    }

    pub fn find_team_by_token(&self, token: &str) -> Option<TeamRow> {
        if token.is_empty() { return None; }
        self.inner.read().teams.iter().find(|t| t.token.as_deref() == Some(token)).cloned()
    }

    // ----- team mutations (login/logout belong to the core; row lifecycle is
    // driven by collaborator CRUD through these entry points) -----

    pub fn insert_team(&self, name: &str, password_hash: &str) -> Result<TeamRow, StoreError> {
        self.mutate(|t| {
            if t.teams.iter().any(|row| row.name == name) {
                return Err(StoreError::Duplicate { name: name.to_string() });
            }
            let row = TeamRow {
                id: t.next_team_id,
                name: name.to_string(),
                password_hash: password_hash.to_string(),
                token: None,
                created_at: Utc::now(),
            };
            t.next_team_id += 1;
            t.teams.push(row.clone());
            debug!(id = row.id, name = %row.name, "team_insert");
            Ok(row)
        })
    }

    pub fn replace_team_token(&self, id: u32, token: Option<String>) -> Result<(), StoreError> {
        self.mutate(|t| {
            if let Some(new) = token.as_deref() {
                if t.teams.iter().any(|row| row.id != id && row.token.as_deref() == Some(new)) {
                    return Err(StoreError::RowCount { expected: 1, affected: 2 });
                }
            }
            let mut affected = 0;
            for row in t.teams.iter_mut().filter(|row| row.id == id) {
                row.token = token.clone();
                affected += 1;
            }
            if affected != 1 {
                return Err(StoreError::RowCount { expected: 1, affected });
            }
            debug!(id, set = token.is_some(), "team_token_replace");
            Ok(())
        })
    }

    pub fn clear_team_token(&self, token: &str) -> Result<bool, StoreError> {
        if token.is_empty() || self.find_team_by_token(token).is_none() {
            return Ok(false);
        }
        self.mutate(|t| {
            let mut cleared = false;
            for row in t.teams.iter_mut() {
                if row.token.as_deref() == Some(token) {
                    row.token = None;
                    cleared = true;
                }
            }
            Ok(cleared)
        })
    }

    pub fn set_team_password(&self, id: u32, password_hash: &str) -> Result<(), StoreError> {
        self.mutate(|t| {
            let mut affected = 0;
            for row in t.teams.iter_mut().filter(|row| row.id == id) {
                row.password_hash = password_hash.to_string();
                affected += 1;
            }
            if affected != 1 {
                return Err(StoreError::RowCount { expected: 1, affected });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_monotonic_ids_and_rejects_duplicates() {
        let store = CredentialStore::in_memory();
        let a = store.insert_manager("alice", "phc-a", false).unwrap();
        let b = store.insert_manager("bob", "phc-b", true).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(b.is_check);

        let err = store.insert_manager("alice", "phc-other", false).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        // the existing row is untouched
        let row = store.find_manager_by_name("alice").unwrap();
        assert_eq!(row.password_hash, "phc-a");
        assert_eq!(row.token, None);
    }

    #[test]
    fn replace_token_requires_exactly_one_row() {
        let store = CredentialStore::in_memory();
        let m = store.insert_manager("alice", "phc", false).unwrap();
        store.replace_manager_token(m.id, Some("t1".into())).unwrap();
        assert_eq!(store.find_manager_by_token("t1").unwrap().id, m.id);

        // replacing invalidates the previous token
        store.replace_manager_token(m.id, Some("t2".into())).unwrap();
        assert!(store.find_manager_by_token("t1").is_none());
        assert!(store.find_manager_by_token("t2").is_some());

        // vanished principal: nothing is written
        let err = store.replace_manager_token(999, Some("t3".into())).unwrap_err();
        assert!(matches!(err, StoreError::RowCount { expected: 1, affected: 0 }));
        assert!(store.find_manager_by_token("t3").is_none());
    }

    #[test]
    fn token_collision_rolls_back() {
        let store = CredentialStore::in_memory();
        let a = store.insert_manager("alice", "phc", false).unwrap();
        let b = store.insert_manager("bob", "phc", false).unwrap();
        store.replace_manager_token(a.id, Some("shared".into())).unwrap();
        let err = store.replace_manager_token(b.id, Some("shared".into())).unwrap_err();
        assert!(matches!(err, StoreError::RowCount { .. }));
        // the colliding token still resolves to exactly the first owner
        assert_eq!(store.find_manager_by_token("shared").unwrap().id, a.id);
        assert_eq!(store.find_manager_by_id(b.id).unwrap().token, None);
    }

    #[test]
    fn clear_token_is_idempotent() {
        let store = CredentialStore::in_memory();
        let m = store.insert_manager("alice", "phc", false).unwrap();
        store.replace_manager_token(m.id, Some("t1".into())).unwrap();
        assert!(store.clear_manager_token("t1").unwrap());
        assert!(store.find_manager_by_token("t1").is_none());
        // clearing again, or clearing an empty/unknown token, is a no-op
        assert!(!store.clear_manager_token("t1").unwrap());
        assert!(!store.clear_manager_token("").unwrap());
        assert!(!store.clear_manager_token("never-issued").unwrap());
    }

    #[test]
    fn delete_missing_id_affects_nothing() {
        let store = CredentialStore::in_memory();
        let m = store.insert_manager("alice", "phc", false).unwrap();
        let err = store.delete_manager(999).unwrap_err();
        assert!(matches!(err, StoreError::RowCount { expected: 1, affected: 0 }));
        assert!(store.find_manager_by_id(m.id).is_some());

        store.delete_manager(m.id).unwrap();
        assert!(store.find_manager_by_id(m.id).is_none());
    }

    #[test]
    fn empty_token_never_resolves() {
        let store = CredentialStore::in_memory();
        store.insert_manager("alice", "phc", false).unwrap();
        // token column is unset; an empty bearer string must not match it
        assert!(store.find_manager_by_token("").is_none());
        store.insert_team("team1", "phc").unwrap();
        assert!(store.find_team_by_token("").is_none());
    }

    #[test]
    fn snapshot_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        {
            let store = CredentialStore::open(&path).unwrap();
            let m = store.insert_manager("alice", "phc", false).unwrap();
            store.replace_manager_token(m.id, Some("t1".into())).unwrap();
            store.insert_team("team1", "phc-t").unwrap();
        }
        let reopened = CredentialStore::open(&path).unwrap();
        assert_eq!(reopened.find_manager_by_token("t1").unwrap().name, "alice");
        assert_eq!(reopened.find_team_by_name("team1").unwrap().id, 1);
        // id counters survive the round trip
        let next = reopened.insert_manager("bob", "phc", false).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn team_token_lifecycle() {
        let store = CredentialStore::in_memory();
        let team = store.insert_team("team1", "phc").unwrap();
        store.replace_team_token(team.id, Some("tt".into())).unwrap();
        assert_eq!(store.find_team_by_token("tt").unwrap().name, "team1");
        assert!(store.clear_team_token("tt").unwrap());
        assert!(store.find_team_by_token("tt").is_none());

        let err = store.replace_team_token(999, Some("x".into())).unwrap_err();
        assert!(matches!(err, StoreError::RowCount { .. }));
    }
}
