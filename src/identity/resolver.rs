use crate::storage::CredentialStore;

use super::principal::{Principal, PrincipalKind};

/// Resolve a bearer token to its owning principal. Read-only and
/// side-effect-free: resolution never renews or touches the stored token, and
/// nothing is cached across requests — every call goes back to the store so a
/// replaced token stops resolving immediately.
pub fn resolve(store: &CredentialStore, token: &str, kind: PrincipalKind) -> Option<Principal> {
    if token.is_empty() {
        return None;
    }
    match kind {
        PrincipalKind::Team => store.find_team_by_token(token).map(|row| Principal {
            kind: PrincipalKind::Team,
            id: row.id,
            name: row.name,
            is_check: false,
        }),
        PrincipalKind::Manager => store.find_manager_by_token(token).map(|row| Principal {
            kind: PrincipalKind::Manager,
            id: row.id,
            name: row.name,
            is_check: row.is_check,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_against_the_matching_table_only() {
        let store = CredentialStore::in_memory();
        let m = store.insert_manager("alice", "phc", true).unwrap();
        store.replace_manager_token(m.id, Some("mt".into())).unwrap();
        let t = store.insert_team("team1", "phc").unwrap();
        store.replace_team_token(t.id, Some("tt".into())).unwrap();

        let p = resolve(&store, "mt", PrincipalKind::Manager).unwrap();
        assert_eq!((p.id, p.is_check), (m.id, true));
        // a manager token is not a team token and vice versa
        assert!(resolve(&store, "mt", PrincipalKind::Team).is_none());
        assert!(resolve(&store, "tt", PrincipalKind::Manager).is_none());
        assert_eq!(resolve(&store, "tt", PrincipalKind::Team).unwrap().name, "team1");
    }

    #[test]
    fn empty_and_unknown_tokens_resolve_to_nothing() {
        let store = CredentialStore::in_memory();
        store.insert_manager("alice", "phc", false).unwrap();
        assert!(resolve(&store, "", PrincipalKind::Manager).is_none());
        assert!(resolve(&store, "nope", PrincipalKind::Manager).is_none());
    }
}
