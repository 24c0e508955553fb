use serde::{Deserialize, Serialize};

/// Which credential table a token resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrincipalKind {
    Team,
    Manager,
}

/// An authenticated identity, recomputed from the credential store on every
/// request and held only as a request-scoped read-only copy. The check-bot
/// restriction is a capability flag on the one manager principal, not a
/// subtype: `is_check` is always false for teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub is_check: bool,
}

impl Principal {
    /// True for full managers only; check bots and teams are excluded.
    pub fn is_full_manager(&self) -> bool {
        self.kind == PrincipalKind::Manager && !self.is_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_manager_excludes_check_bots_and_teams() {
        let full = Principal { kind: PrincipalKind::Manager, id: 1, name: "a".into(), is_check: false };
        let bot = Principal { kind: PrincipalKind::Manager, id: 2, name: "b".into(), is_check: true };
        let team = Principal { kind: PrincipalKind::Team, id: 3, name: "t".into(), is_check: false };
        assert!(full.is_full_manager());
        assert!(!bot.is_full_manager());
        assert!(!team.is_full_manager());
    }
}
