//! Treeacl: an embeddable access control list built on two hierarchies.
//!
//! Roles and resources each live in their own forest. Permissions are stored
//! for (role, resource) pairs, either for every action at once or per action
//! (`Create`, `Read`, `Update`, `Delete`). A query walks up both forests and
//! the first pair with a decisive answer wins, so a child inherits from its
//! ancestors unless it is given its own permission.
//!
//! # Example
//!
//! ```
//! use treeacl::{Acl, Action, SimpleEntry};
//!
//! let staff = SimpleEntry::new("staff");
//! let intern = SimpleEntry::new("intern");
//! let wiki = SimpleEntry::new("wiki");
//!
//! let mut acl = Acl::new();
//! acl.add_role(&staff).unwrap();
//! acl.add_role_child(&intern, &staff).unwrap();
//!
//! // Staff may do anything with the wiki...
//! acl.allow(&staff, &wiki);
//! // ...but interns may not delete pages.
//! acl.deny_action(&intern, &wiki, Action::Delete);
//!
//! assert!(acl.is_allowed(Some(&staff), Some(&wiki)));
//! assert!(acl.is_allowed_action(Some(&intern), Some(&wiki), Action::Update));
//! assert!(acl.is_denied_action(Some(&intern), Some(&wiki), Action::Delete));
//!
//! // Nothing grants access to an unknown resource, so the default policy
//! // (deny) applies.
//! let payroll = SimpleEntry::new("payroll");
//! assert!(acl.is_denied(Some(&staff), Some(&payroll)));
//! ```

mod access;
mod action;
mod entry;
mod error;
mod registry;
mod matrix;
mod acl;
mod snapshot;

pub use access::{Access, DefaultPolicy};
pub use action::Action;
pub use entry::{Entry, RootEntry, SimpleEntry, WILDCARD};
pub use error::{Error, Result};
pub use registry::{Registry, RegistrySnapshot, format_path};
pub use matrix::{PermissionMatrix, PermissionSnapshot, SEPARATOR, permission_key};
pub use acl::{Acl, Explanation};
pub use snapshot::Snapshot;
