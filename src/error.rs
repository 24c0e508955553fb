//! Unified application error model and mapping helpers.
//! This module provides the common error enum used across the HTTP surface and
//! the credential mutation operations, along with the stable numeric wire
//! codes and localization keys each error carries.

use std::fmt::{Display, Formatter};

use crate::locales;
use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed JSON body or missing required field. 400/40000.
    Payload,
    /// Required query parameter absent. 400/40000.
    Query,
    /// Query parameter present but not an integer. 400/40000.
    MustBeNumber { key: &'static str },
    /// Name collision on create. 400/40001.
    Duplicate,
    /// Token present but resolving to no principal. 401/40100.
    Unauthorized,
    /// Full-manager route hit by a check-bot account. 401/40100.
    ManagerRequired,
    /// No Authorization header on a guarded route. 403/40300.
    NoAuth,
    /// Name/password pair rejected. 403/40300. The same variant covers both
    /// unknown name and wrong password so callers cannot enumerate accounts.
    Login { key: &'static str },
    /// Route does not exist. 404/40400.
    NotFound,
    /// A transactional write affected an unexpected number of rows. 500/50000.
    Server { key: &'static str },
}

impl AppError {
    pub fn must_be_number(key: &'static str) -> Self { AppError::MustBeNumber { key } }
    pub fn manager_login_error() -> Self { AppError::Login { key: "manager.login_error" } }
    pub fn team_login_error() -> Self { AppError::Login { key: "team.login_error" } }
    pub fn server(key: &'static str) -> Self { AppError::Server { key } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Payload | AppError::Query | AppError::MustBeNumber { .. } | AppError::Duplicate => 400,
            AppError::Unauthorized | AppError::ManagerRequired => 401,
            AppError::NoAuth | AppError::Login { .. } => 403,
            AppError::NotFound => 404,
            AppError::Server { .. } => 500,
        }
    }

    /// Stable machine-readable code carried in the response envelope.
    pub fn wire_code(&self) -> u32 {
        match self {
            AppError::Payload | AppError::Query | AppError::MustBeNumber { .. } => 40000,
            AppError::Duplicate => 40001,
            AppError::Unauthorized | AppError::ManagerRequired => 40100,
            AppError::NoAuth | AppError::Login { .. } => 40300,
            AppError::NotFound => 40400,
            AppError::Server { .. } => 50000,
        }
    }

    /// Localization category key for the display text.
    pub fn message_key(&self) -> &'static str {
        match self {
            AppError::Payload => "general.error_payload",
            AppError::Query => "general.error_query",
            AppError::MustBeNumber { .. } => "general.must_be_number",
            AppError::Duplicate => "manager.repeat",
            AppError::Unauthorized | AppError::NoAuth => "general.no_auth",
            AppError::ManagerRequired => "manager.manager_required",
            AppError::Login { key } => *key,
            AppError::NotFound => "general.not_found",
            AppError::Server { key } => *key,
        }
    }

    /// Localized human-readable message.
    pub fn message(&self, lang: &str) -> String {
        match self {
            AppError::MustBeNumber { key } => locales::t_with(lang, self.message_key(), &[("key", *key)]),
            _ => locales::t(lang, self.message_key()),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.wire_code(), self.message(locales::DEFAULT_LANG))
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => AppError::Duplicate,
            // Row-count mismatches and persistence failures both mean the
            // mutation was rolled back in full.
            StoreError::RowCount { .. } | StoreError::Io(_) | StoreError::Serde(_) => {
                AppError::Server { key: "general.server_error" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::Payload.http_status(), 400);
        assert_eq!(AppError::Query.http_status(), 400);
        assert_eq!(AppError::Duplicate.http_status(), 400);
        assert_eq!(AppError::Unauthorized.http_status(), 401);
        assert_eq!(AppError::ManagerRequired.http_status(), 401);
        assert_eq!(AppError::NoAuth.http_status(), 403);
        assert_eq!(AppError::manager_login_error().http_status(), 403);
        assert_eq!(AppError::NotFound.http_status(), 404);
        assert_eq!(AppError::server("general.server_error").http_status(), 500);
    }

    #[test]
    fn wire_code_mapping() {
        assert_eq!(AppError::Payload.wire_code(), 40000);
        assert_eq!(AppError::must_be_number("id").wire_code(), 40000);
        assert_eq!(AppError::Duplicate.wire_code(), 40001);
        assert_eq!(AppError::Unauthorized.wire_code(), 40100);
        assert_eq!(AppError::ManagerRequired.wire_code(), 40100);
        assert_eq!(AppError::NoAuth.wire_code(), 40300);
        assert_eq!(AppError::NotFound.wire_code(), 40400);
        assert_eq!(AppError::server("manager.delete_error").wire_code(), 50000);
    }

    #[test]
    fn parameterized_message() {
        let e = AppError::must_be_number("id");
        assert_eq!(e.message("en-US"), "id must be a number");
    }

    #[test]
    fn store_errors_map_to_conflict_or_server() {
        let dup: AppError = StoreError::Duplicate { name: "alice".into() }.into();
        assert_eq!(dup, AppError::Duplicate);
        let rc: AppError = StoreError::RowCount { expected: 1, affected: 0 }.into();
        assert_eq!(rc.wire_code(), 50000);
        assert_eq!(rc.http_status(), 500);
    }

    #[test]
    fn login_errors_are_uniform() {
        // Unknown name and wrong password share one variant, so code and
        // message are identical by construction.
        let a = AppError::manager_login_error();
        let b = AppError::manager_login_error();
        assert_eq!(a.wire_code(), b.wire_code());
        assert_eq!(a.message("en-US"), b.message("en-US"));
    }
}
