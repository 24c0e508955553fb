//! Central identity handling for gatehouse: the principal model, opaque token
//! issuance, per-request session resolution and the credential mutation
//! operations. Keep the public surface thin and split implementation across
//! sub-modules.

mod principal;
mod issuer;
mod resolver;
mod provider;

pub use principal::{Principal, PrincipalKind};
pub use issuer::generate_token;
pub use resolver::resolve;
pub use provider::{
    ManagerInfo, NewManager,
    manager_login, manager_logout, team_login, team_logout,
    list_managers, new_manager, refresh_manager_token,
    reset_manager_password, delete_manager,
    ensure_bootstrap_admin,
};
