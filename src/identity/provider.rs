//! Credential mutation operations: the transactional state machine per
//! principal (`no-session` <-> `active-session`) plus manager account
//! administration. Each operation is a single all-or-nothing store mutation;
//! the HTTP layer above is a thin shell around these functions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::{CredentialStore, StoreError};

use super::issuer::generate_token;

/// Wire view of a manager row. The password digest is deliberately absent;
/// the active token is visible to full managers for check-bot provisioning.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerInfo {
    #[serde(rename = "Id")]
    pub id: u32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IsCheck")]
    pub is_check: bool,
    #[serde(rename = "Token")]
    pub token: Option<String>,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a manager account.
#[derive(Debug, Clone)]
pub struct NewManager {
    pub name: String,
    pub password: String,
    pub is_check: bool,
}

/// Validate name+password and mint a fresh session token, atomically
/// replacing whatever token the manager held before. Unknown name and wrong
/// password fail identically so callers cannot enumerate accounts.
pub fn manager_login(store: &CredentialStore, name: &str, password: &str) -> AppResult<String> {
    let Some(row) = store.find_manager_by_name(name) else {
        return Err(AppError::manager_login_error());
    };
    if !security::verify_password(&row.password_hash, password) {
        return Err(AppError::manager_login_error());
    }
    let token = generate_token();
    store
        .replace_manager_token(row.id, Some(token.clone()))
        .map_err(|_| AppError::server("general.server_error"))?;
    info!(id = row.id, name = %row.name, "manager login");
    Ok(token)
}

/// Clear the session bound to `token`. An empty or unrecognized token is a
/// no-op success, so logout is idempotent.
pub fn manager_logout(store: &CredentialStore, token: &str) -> AppResult<()> {
    store
        .clear_manager_token(token)
        .map_err(|_| AppError::server("general.server_error"))?;
    Ok(())
}

pub fn team_login(store: &CredentialStore, name: &str, password: &str) -> AppResult<String> {
    let Some(row) = store.find_team_by_name(name) else {
        return Err(AppError::team_login_error());
    };
    if !security::verify_password(&row.password_hash, password) {
        return Err(AppError::team_login_error());
    }
    let token = generate_token();
    store
        .replace_team_token(row.id, Some(token.clone()))
        .map_err(|_| AppError::server("general.server_error"))?;
    info!(id = row.id, name = %row.name, "team login");
    Ok(token)
}

pub fn team_logout(store: &CredentialStore, token: &str) -> AppResult<()> {
    store
        .clear_team_token(token)
        .map_err(|_| AppError::server("general.server_error"))?;
    Ok(())
}

pub fn list_managers(store: &CredentialStore) -> Vec<ManagerInfo> {
    store
        .list_managers()
        .into_iter()
        .map(|row| ManagerInfo {
            id: row.id,
            name: row.name,
            is_check: row.is_check,
            token: row.token,
            created_at: row.created_at,
        })
        .collect()
}

/// Create a manager account with a freshly salted digest and no token; the
/// account must log in (or be refreshed) separately to obtain a session.
pub fn new_manager(store: &CredentialStore, req: &NewManager) -> AppResult<()> {
    let phc = security::hash_password(&req.password)
        .map_err(|_| AppError::server("manager.post_error"))?;
    match store.insert_manager(&req.name, &phc, req.is_check) {
        Ok(row) => {
            info!(id = row.id, name = %row.name, is_check = row.is_check, "manager created");
            Ok(())
        }
        Err(StoreError::Duplicate { .. }) => Err(AppError::Duplicate),
        Err(_) => Err(AppError::server("manager.post_error")),
    }
}

/// Mint and persist a new token for the target manager, invalidating any
/// prior one. This is how sessions are provisioned for check bots, which
/// cannot log in interactively.
pub fn refresh_manager_token(store: &CredentialStore, id: u32) -> AppResult<String> {
    let token = generate_token();
    store
        .replace_manager_token(id, Some(token.clone()))
        .map_err(|_| AppError::server("manager.update_token_fail"))?;
    info!(id, "manager token refreshed");
    Ok(token)
}

/// Replace the target manager's password with a random one and return the
/// plaintext exactly once; out-of-band delivery is the caller's problem.
pub fn reset_manager_password(store: &CredentialStore, id: u32) -> AppResult<String> {
    let password = security::random_password();
    let phc = security::hash_password(&password)
        .map_err(|_| AppError::server("manager.update_password_fail"))?;
    store
        .set_manager_password(id, &phc)
        .map_err(|_| AppError::server("manager.update_password_fail"))?;
    info!(id, "manager password reset");
    Ok(password)
}

pub fn delete_manager(store: &CredentialStore, id: u32) -> AppResult<()> {
    store
        .delete_manager(id)
        .map_err(|_| AppError::server("manager.delete_error"))?;
    info!(id, "manager deleted");
    Ok(())
}

/// First-run bootstrap: when the manager table is empty, create an `admin`
/// account with a random password and log the plaintext once so the operator
/// can log in.
pub fn ensure_bootstrap_admin(store: &CredentialStore) -> anyhow::Result<()> {
    if store.manager_count() > 0 {
        return Ok(());
    }
    let password = security::random_password();
    let phc = security::hash_password(&password)?;
    store.insert_manager("admin", &phc, false)?;
    tracing::warn!("no managers found, bootstrap admin created: name=admin password={}", password);
    Ok(())
}
