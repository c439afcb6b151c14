//! Role membership synchronization
//!
//! Computes the difference between the users that should be members of a
//! database's owning role and the users that currently are, then closes the
//! gap one statement at a time: every revoke before any grant.

use dbward_rdbc::EngineAdapter;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::Result;

/// Membership changes needed to reach the desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantDiff {
    /// Current members that are no longer desired
    pub to_revoke: BTreeSet<String>,
    /// Desired members that are not members yet
    pub to_grant: BTreeSet<String>,
}

impl GrantDiff {
    /// Diff observed membership against the desired set
    pub fn compute(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_revoke: current.difference(desired).cloned().collect(),
            to_grant: desired.difference(current).cloned().collect(),
        }
    }

    /// Whether membership already matches
    pub fn is_empty(&self) -> bool {
        self.to_revoke.is_empty() && self.to_grant.is_empty()
    }

    /// Total number of statements the diff will issue
    pub fn len(&self) -> usize {
        self.to_revoke.len() + self.to_grant.len()
    }

    /// Membership after the diff is applied to `current`
    pub fn apply_to(&self, current: &BTreeSet<String>) -> BTreeSet<String> {
        current
            .difference(&self.to_revoke)
            .chain(self.to_grant.iter())
            .cloned()
            .collect()
    }
}

/// Bring the members of `role` in line with `desired`
///
/// Any single revoke or grant failure aborts the pass; the next pass
/// re-reads membership and picks up where this one stopped.
pub async fn sync_membership(
    engine: &dyn EngineAdapter,
    role: &str,
    desired: &BTreeSet<String>,
) -> Result<GrantDiff> {
    let current = engine.list_role_members(role).await?;
    let diff = GrantDiff::compute(&current, desired);

    if diff.is_empty() {
        debug!(role = %role, members = current.len(), "Role membership up to date");
        return Ok(diff);
    }

    for user in &diff.to_revoke {
        engine.revoke_membership(role, user).await?;
        info!(role = %role, user = %user, "Revoked membership");
    }

    for user in &diff.to_grant {
        engine
            .grant_membership(role, std::slice::from_ref(user))
            .await?;
        info!(role = %role, user = %user, "Granted membership");
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_add_user() {
        let current = set(&["x", "alice"]);
        let desired = set(&["x", "alice", "bob"]);
        let diff = GrantDiff::compute(&current, &desired);

        assert!(diff.to_revoke.is_empty());
        assert_eq!(diff.to_grant, set(&["bob"]));
    }

    #[test]
    fn test_diff_remove_user() {
        let current = set(&["x", "alice", "carol"]);
        let desired = set(&["x", "alice"]);
        let diff = GrantDiff::compute(&current, &desired);

        assert_eq!(diff.to_revoke, set(&["carol"]));
        assert!(diff.to_grant.is_empty());
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn test_diff_converged() {
        let members = set(&["x", "alice"]);
        assert!(GrantDiff::compute(&members, &members).is_empty());
    }

    #[test]
    fn test_diff_properties() {
        let cases = [
            (set(&[]), set(&["x"])),
            (set(&["a", "b", "c"]), set(&["x"])),
            (set(&["a", "x"]), set(&["b", "x"])),
            (set(&["a", "b"]), set(&["a", "b", "x"])),
        ];

        for (current, desired) in cases {
            let diff = GrantDiff::compute(&current, &desired);

            assert_eq!(diff.apply_to(&current), desired);
            assert!(diff.to_revoke.is_disjoint(&diff.to_grant));
            // Desired members are never revoked
            assert!(diff.to_revoke.is_disjoint(&desired));
        }
    }
}
