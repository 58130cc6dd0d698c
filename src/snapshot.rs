#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::matrix::PermissionSnapshot;
use crate::registry::RegistrySnapshot;

/// Everything needed to rebuild an [`Acl`](crate::Acl).
///
/// Produced by [`Acl::snapshot`](crate::Acl::snapshot) and consumed by
/// [`Acl::restore`](crate::Acl::restore). With the `serde` feature the
/// snapshot serializes as
///
/// ```json
/// {
///   "roles": { "staff": "", "editor": "staff" },
///   "resources": { "docs": "" },
///   "permissions": { "*::*": { "ALL": false }, "staff::docs": { "READ": true } }
/// }
/// ```
///
/// A missing section deserializes as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Snapshot {
    /// Role id to parent id, `""` for roots.
    pub roles: RegistrySnapshot,
    /// Resource id to parent id, `""` for roots.
    pub resources: RegistrySnapshot,
    /// Permission key to action name to decision.
    pub permissions: PermissionSnapshot,
}

impl Snapshot {
    /// Returns `true` if all three sections are empty.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.resources.is_empty() && self.permissions.is_empty()
    }
}
