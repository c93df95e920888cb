//! Scope enforcement
//!
//! Kept apart from signature verification so a grant verified once can be
//! checked against different requirements at different call sites.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{GrantexTokenError, Result};

/// Check that every `required` scope is among `granted`
///
/// Matching is set membership; order and duplicates in `granted` are
/// irrelevant. An empty `required` always passes.
///
/// # Errors
///
/// [`GrantexTokenError::InsufficientScope`] naming every missing scope, in the
/// order the caller required them, each listed once.
pub fn enforce<G, R>(granted: &[G], required: &[R]) -> Result<()>
where
    G: AsRef<str>,
    R: AsRef<str>,
{
    if required.is_empty() {
        return Ok(());
    }

    let granted: HashSet<&str> = granted.iter().map(AsRef::as_ref).collect();
    let mut reported = HashSet::new();
    let missing: Vec<String> = required
        .iter()
        .map(AsRef::as_ref)
        .filter(|scope| !granted.contains(scope) && reported.insert(*scope))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        debug!(missing = ?missing, "Grant is missing required scopes");
        Err(GrantexTokenError::InsufficientScope { missing })
    }
}
