#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The result of looking up a single (role, resource) pair.
///
/// `Unset` means the pair carries no decisive signal and the lookup should
/// continue toward the wildcard ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Access {
    /// Access is explicitly granted.
    Allowed,
    /// Access is explicitly refused.
    Denied,
    /// Nothing decisive was recorded.
    #[default]
    Unset,
}

impl Access {
    /// Returns `true` for `Allowed` and `Denied`.
    pub fn is_decisive(self) -> bool {
        !matches!(self, Access::Unset)
    }

    /// Maps an explicit boolean decision to `Allowed` or `Denied`.
    pub fn from_grant(granted: bool) -> Self {
        if granted {
            Access::Allowed
        } else {
            Access::Denied
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Allowed => f.write_str("allowed"),
            Access::Denied => f.write_str("denied"),
            Access::Unset => f.write_str("unset"),
        }
    }
}

/// The policy applied when no specific role or resource entry decides.
///
/// Stored as the permission for the (wildcard, wildcard) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DefaultPolicy {
    /// Everything not explicitly denied is allowed (blacklist).
    Allow,
    /// Everything not explicitly allowed is denied (whitelist).
    #[default]
    Deny,
}
