use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::access::{Access, DefaultPolicy};
use crate::action::Action;
use crate::entry::WILDCARD;
use crate::error::{Error, Result};

/// Joins the role and resource parts of a permission key.
pub const SEPARATOR: &str = "::";

/// Exported form of a matrix: permission key to action name to decision.
pub type PermissionSnapshot = BTreeMap<String, BTreeMap<String, bool>>;

type Decisions = BTreeMap<Action, bool>;

/// Builds the canonical key for a (role, resource) pair.
///
/// Empty ids stand for the wildcard.
///
/// # Example
///
/// ```
/// use treeacl::permission_key;
///
/// assert_eq!(permission_key("admin", "reports"), "admin::reports");
/// assert_eq!(permission_key("", ""), "*::*");
/// ```
pub fn permission_key(role: &str, resource: &str) -> String {
    format!("{}{SEPARATOR}{}", or_wildcard(role), or_wildcard(resource))
}

fn parse_action_name(name: &str) -> Option<Action> {
    let action = Action::from_name(name);
    (action != Action::All || name.eq_ignore_ascii_case(Action::All.as_str())).then_some(action)
}

fn or_wildcard(id: &str) -> &str {
    if id.is_empty() { WILDCARD } else { id }
}

/// Maps (role, resource) pairs to per-action allow/deny decisions.
///
/// A pair either holds a single `All` decision or any mix of specific action
/// decisions. Pairs without any decision are not stored. The pair
/// `(*, *)` holds the default policy.
///
/// The matrix knows nothing about hierarchies: each lookup only inspects the
/// exact pair it is given. Inheritance is resolved by [`Acl`](crate::Acl).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    perms: BTreeMap<String, Decisions>,
}

impl PermissionMatrix {
    /// Creates a matrix holding only the given default policy.
    pub fn new(policy: DefaultPolicy) -> Self {
        let mut matrix = Self::empty();
        matrix.set_default(policy);
        matrix
    }

    /// Creates a matrix without even a default policy.
    pub fn empty() -> Self {
        Self {
            perms: BTreeMap::new(),
        }
    }

    /// Replaces all decisions for the pair with a single `All` allow.
    pub fn allow(&mut self, role: &str, resource: &str) {
        self.set_all(role, resource, true);
    }

    /// Replaces all decisions for the pair with a single `All` deny.
    pub fn deny(&mut self, role: &str, resource: &str) {
        self.set_all(role, resource, false);
    }

    /// Records an allow for one action, keeping the pair's other decisions.
    pub fn allow_action(&mut self, role: &str, resource: &str, action: Action) {
        self.set_action(role, resource, action, true);
    }

    /// Records a deny for one action, keeping the pair's other decisions.
    pub fn deny_action(&mut self, role: &str, resource: &str, action: Action) {
        self.set_action(role, resource, action, false);
    }

    /// Checks whether the pair grants every action.
    ///
    /// - A single deny anywhere in the pair gives `Denied`.
    /// - An `All` allow, or allows for all four specific actions, gives
    ///   `Allowed`.
    /// - Anything else gives `Unset`.
    pub fn is_allowed(&self, role: &str, resource: &str) -> Access {
        let Some(decisions) = self.perms.get(&permission_key(role, resource)) else {
            return Access::Unset;
        };
        if decisions.values().any(|granted| !granted) {
            return Access::Denied;
        }
        if covers_everything(decisions) {
            Access::Allowed
        } else {
            Access::Unset
        }
    }

    /// Checks whether the pair refuses every action.
    ///
    /// The mirror image of [`is_allowed`](Self::is_allowed): a single allow
    /// anywhere gives `Allowed`, full deny coverage gives `Denied`. When only
    /// some actions are denied the answer is `Unset`, so this is not the
    /// negation of `is_allowed`.
    pub fn is_denied(&self, role: &str, resource: &str) -> Access {
        let Some(decisions) = self.perms.get(&permission_key(role, resource)) else {
            return Access::Unset;
        };
        if decisions.values().any(|granted| *granted) {
            return Access::Allowed;
        }
        if covers_everything(decisions) {
            Access::Denied
        } else {
            Access::Unset
        }
    }

    /// Checks a single action, falling back to the pair's `All` decision.
    pub fn is_allowed_action(&self, role: &str, resource: &str, action: Action) -> Access {
        self.perms
            .get(&permission_key(role, resource))
            .and_then(|decisions| decisions.get(&action).or_else(|| decisions.get(&Action::All)))
            .map_or(Access::Unset, |granted| Access::from_grant(*granted))
    }

    /// Checks whether a single action is refused.
    ///
    /// A single action is either allowed, denied or unset, so this gives the
    /// same answer as [`is_allowed_action`](Self::is_allowed_action).
    pub fn is_denied_action(&self, role: &str, resource: &str, action: Action) -> Access {
        self.is_allowed_action(role, resource, action)
    }

    /// Removes every decision for the pair.
    pub fn remove(&mut self, role: &str, resource: &str) -> Result<()> {
        let key = permission_key(role, resource);
        if self.perms.remove(&key).is_none() {
            return Err(Error::not_found(key));
        }
        debug!(%key, "removed permission");
        Ok(())
    }

    /// Removes the decision for one action.
    ///
    /// If the pair only has an `All` decision, it is split into the three
    /// other specific actions with the same value, so only `action` loses
    /// coverage. The pair disappears once it holds no decisions.
    pub fn remove_action(&mut self, role: &str, resource: &str, action: Action) -> Result<()> {
        let key = permission_key(role, resource);
        let Some(decisions) = self.perms.get_mut(&key) else {
            return Err(Error::not_found(key));
        };

        if decisions.remove(&action).is_none() {
            let Some(granted) = decisions.remove(&Action::All) else {
                return Err(Error::not_found(format!("{key} {action}")));
            };
            for other in Action::SPECIFIC.into_iter().filter(|a| *a != action) {
                decisions.insert(other, granted);
            }
        }

        if decisions.is_empty() {
            self.perms.remove(&key);
        }
        debug!(%key, %action, "removed action permission");
        Ok(())
    }

    /// Removes every pair whose role part is `role`, returning how many.
    pub fn remove_by_role(&mut self, role: &str) -> usize {
        let prefix = format!("{}{SEPARATOR}", or_wildcard(role));
        self.remove_where(|key| key.starts_with(&prefix))
    }

    /// Removes every pair whose resource part is `resource`, returning how many.
    pub fn remove_by_resource(&mut self, resource: &str) -> usize {
        let suffix = format!("{SEPARATOR}{}", or_wildcard(resource));
        self.remove_where(|key| key.ends_with(&suffix))
    }

    fn remove_where(&mut self, matches: impl Fn(&str) -> bool) -> usize {
        let before = self.perms.len();
        self.perms.retain(|key, _| !matches(key));
        let removed = before - self.perms.len();
        debug!(removed, "purged permissions");
        removed
    }

    /// Sets the `(*, *)` pair to allow everything.
    pub fn make_default_allow(&mut self) {
        self.set_default(DefaultPolicy::Allow);
    }

    /// Sets the `(*, *)` pair to deny everything.
    pub fn make_default_deny(&mut self) {
        self.set_default(DefaultPolicy::Deny);
    }

    /// Returns the policy stored in the `(*, *)` pair, if it is decisive.
    pub fn default_policy(&self) -> Option<DefaultPolicy> {
        match self.is_allowed(WILDCARD, WILDCARD) {
            Access::Allowed => Some(DefaultPolicy::Allow),
            Access::Denied => Some(DefaultPolicy::Deny),
            Access::Unset => None,
        }
    }

    fn set_default(&mut self, policy: DefaultPolicy) {
        debug!(?policy, "default policy set");
        self.set_all(WILDCARD, WILDCARD, policy == DefaultPolicy::Allow);
    }

    /// Returns `true` if the pair has any decision.
    pub fn contains(&self, role: &str, resource: &str) -> bool {
        self.perms.contains_key(&permission_key(role, resource))
    }

    /// Returns the decisions stored for the pair.
    pub fn decisions(&self, role: &str, resource: &str) -> Option<&BTreeMap<Action, bool>> {
        self.perms.get(&permission_key(role, resource))
    }

    /// Removes every pair, including the default policy.
    pub fn clear(&mut self) {
        self.perms.clear();
    }

    /// Returns the number of stored pairs.
    pub fn len(&self) -> usize {
        self.perms.len()
    }

    /// Returns `true` if no pair is stored.
    pub fn is_empty(&self) -> bool {
        self.perms.is_empty()
    }

    /// Returns an independent copy of all decisions.
    pub fn export(&self) -> PermissionSnapshot {
        self.perms
            .iter()
            .map(|(key, decisions)| {
                let named = decisions
                    .iter()
                    .map(|(action, granted)| (action.to_string(), *granted))
                    .collect();
                (key.clone(), named)
            })
            .collect()
    }

    /// Replaces all decisions with those in `snapshot`.
    ///
    /// Action names are matched case-insensitively and exported in upper
    /// case, so only upper-case snapshots round-trip unchanged. Unknown action
    /// names are skipped with a warning, and keys left without decisions are
    /// not stored. Refusing to overwrite a populated matrix is up to the
    /// caller.
    pub fn import(&mut self, snapshot: &PermissionSnapshot) {
        self.perms = snapshot
            .iter()
            .filter_map(|(key, named)| {
                let decisions: Decisions = named
                    .iter()
                    .filter_map(|(name, granted)| match parse_action_name(name) {
                        Some(action) => Some((action, *granted)),
                        None => {
                            warn!(%key, action = %name, "skipped unknown action in snapshot");
                            None
                        }
                    })
                    .collect();
                (!decisions.is_empty()).then(|| (key.clone(), decisions))
            })
            .collect();
        debug!(pairs = self.perms.len(), "imported permissions");
    }

    fn set_all(&mut self, role: &str, resource: &str, granted: bool) {
        let key = permission_key(role, resource);
        debug!(%key, granted, "set permission on all actions");
        self.perms.insert(key, BTreeMap::from([(Action::All, granted)]));
    }

    fn set_action(&mut self, role: &str, resource: &str, action: Action, granted: bool) {
        let key = permission_key(role, resource);
        debug!(%key, %action, granted, "set action permission");
        self.perms.entry(key).or_default().insert(action, granted);
    }
}

impl Default for PermissionMatrix {
    /// A matrix with the default-deny policy.
    fn default() -> Self {
        Self::new(DefaultPolicy::Deny)
    }
}

impl fmt::Display for PermissionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.perms.len())?;
        writeln!(f, "-------")?;
        for (i, (key, decisions)) in self.perms.iter().enumerate() {
            writeln!(f, "{}- {key}", i + 1)?;
            for (action, granted) in decisions {
                writeln!(f, "\t{action}\t{granted}")?;
            }
        }
        Ok(())
    }
}

/// `All` is present, or every specific action is.
fn covers_everything(decisions: &Decisions) -> bool {
    decisions.contains_key(&Action::All)
        || Action::SPECIFIC
            .iter()
            .all(|action| decisions.contains_key(action))
}
