use std::fmt;

use tracing::{debug, trace};

use crate::access::{Access, DefaultPolicy};
use crate::action::Action;
use crate::entry::{Entry, RootEntry, WILDCARD};
use crate::error::{Error, Result};
use crate::matrix::{PermissionMatrix, PermissionSnapshot, permission_key};
use crate::registry::{Registry, RegistrySnapshot};
use crate::snapshot::Snapshot;

/// A role hierarchy, a resource hierarchy and the permissions between them.
///
/// Queries walk both hierarchies from the most specific entry up to the
/// wildcard. Role ancestry is the outer loop and resource ancestry the inner
/// one, so every resource ancestor is tried for a role before the next role
/// ancestor is considered. The first pair with a decisive answer wins; the
/// `(*, *)` default policy is therefore always consulted last.
///
/// # Example
///
/// ```
/// use treeacl::{Acl, SimpleEntry};
///
/// let staff = SimpleEntry::new("staff");
/// let editor = SimpleEntry::new("editor");
/// let docs = SimpleEntry::new("docs");
///
/// let mut acl = Acl::new();
/// acl.add_role(&staff).unwrap();
/// acl.add_role_child(&editor, &staff).unwrap();
/// acl.allow(&staff, &docs);
///
/// assert!(acl.is_allowed(Some(&editor), Some(&docs)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    roles: Registry,
    resources: Registry,
    permissions: PermissionMatrix,
}

/// Which stored pair decided a query.
///
/// `role` and `resource` are `None` when no pair gave a decisive answer, in
/// which case `access` is [`Access::Unset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    /// The decisive answer, or `Unset`.
    pub access: Access,
    /// Role part of the deciding pair.
    pub role: Option<String>,
    /// Resource part of the deciding pair.
    pub resource: Option<String>,
}

impl Explanation {
    fn unresolved() -> Self {
        Self {
            access: Access::Unset,
            role: None,
            resource: None,
        }
    }

    /// Returns the permission key of the deciding pair.
    pub fn key(&self) -> Option<String> {
        match (&self.role, &self.resource) {
            (Some(role), Some(resource)) => Some(permission_key(role, resource)),
            _ => None,
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => write!(f, "{} by {key}", self.access),
            None => write!(f, "{} (no matching permission)", self.access),
        }
    }
}

impl Default for Acl {
    fn default() -> Self {
        Self::new()
    }
}

impl Acl {
    /// Creates an ACL that denies everything not explicitly allowed.
    pub fn new() -> Self {
        Self::with_default(DefaultPolicy::Deny)
    }

    /// Creates an ACL with the given default policy.
    ///
    /// `DefaultPolicy::Allow` turns the ACL into a blacklist.
    pub fn with_default(policy: DefaultPolicy) -> Self {
        Self {
            roles: Registry::new(),
            resources: Registry::new(),
            permissions: PermissionMatrix::new(policy),
        }
    }

    /// Returns the role hierarchy.
    pub fn roles(&self) -> &Registry {
        &self.roles
    }

    /// Returns the resource hierarchy.
    pub fn resources(&self) -> &Registry {
        &self.resources
    }

    /// Returns the permission matrix.
    pub fn permissions(&self) -> &PermissionMatrix {
        &self.permissions
    }

    /// Registers a root role.
    pub fn add_role(&mut self, role: &dyn Entry) -> Result<()> {
        self.roles.insert(role.id())
    }

    /// Registers `role` under an already registered `parent`.
    pub fn add_role_child(&mut self, role: &dyn Entry, parent: &dyn Entry) -> Result<()> {
        self.roles.insert_child(role.id(), parent.id())
    }

    /// Registers a root resource.
    pub fn add_resource(&mut self, resource: &dyn Entry) -> Result<()> {
        self.resources.insert(resource.id())
    }

    /// Registers `resource` under an already registered `parent`.
    pub fn add_resource_child(&mut self, resource: &dyn Entry, parent: &dyn Entry) -> Result<()> {
        self.resources.insert_child(resource.id(), parent.id())
    }

    /// Allows every action of `role` on `resource`.
    ///
    /// Either entry is registered as a root if it is not known yet. This
    /// replaces any earlier decisions for the pair.
    pub fn allow(&mut self, role: &dyn Entry, resource: &dyn Entry) {
        self.register(role, resource);
        self.permissions.allow(role.id(), resource.id());
    }

    /// Denies every action of `role` on `resource`.
    pub fn deny(&mut self, role: &dyn Entry, resource: &dyn Entry) {
        self.register(role, resource);
        self.permissions.deny(role.id(), resource.id());
    }

    /// Allows one action, keeping the pair's other decisions.
    pub fn allow_action(&mut self, role: &dyn Entry, resource: &dyn Entry, action: Action) {
        self.register(role, resource);
        self.permissions.allow_action(role.id(), resource.id(), action);
    }

    /// Denies one action, keeping the pair's other decisions.
    pub fn deny_action(&mut self, role: &dyn Entry, resource: &dyn Entry, action: Action) {
        self.register(role, resource);
        self.permissions.deny_action(role.id(), resource.id(), action);
    }

    /// Allows `role` everything on every resource.
    pub fn allow_all_resource(&mut self, role: &dyn Entry) {
        self.allow(role, &RootEntry);
    }

    /// Denies `role` everything on every resource.
    pub fn deny_all_resource(&mut self, role: &dyn Entry) {
        self.deny(role, &RootEntry);
    }

    /// Allows every role everything on `resource`.
    pub fn allow_all_role(&mut self, resource: &dyn Entry) {
        self.allow(&RootEntry, resource);
    }

    /// Denies every role everything on `resource`.
    pub fn deny_all_role(&mut self, resource: &dyn Entry) {
        self.deny(&RootEntry, resource);
    }

    fn register(&mut self, role: &dyn Entry, resource: &dyn Entry) {
        ensure_registered(&mut self.roles, role);
        ensure_registered(&mut self.resources, resource);
    }

    /// Returns `true` if the nearest decisive pair allows every action.
    ///
    /// `None` stands for the wildcard. If no pair along either ancestry is
    /// decisive the answer is `false`.
    pub fn is_allowed(&self, role: Option<&dyn Entry>, resource: Option<&dyn Entry>) -> bool {
        let why = self.resolve(role, resource, |r, s| self.permissions.is_allowed(r, s));
        why.access == Access::Allowed
    }

    /// Returns `true` if the nearest decisive pair allows `action`.
    pub fn is_allowed_action(
        &self,
        role: Option<&dyn Entry>,
        resource: Option<&dyn Entry>,
        action: Action,
    ) -> bool {
        self.explain(role, resource, action).access == Access::Allowed
    }

    /// Returns `true` if the nearest decisive pair denies every action.
    ///
    /// A pair that allows anything is decisive here and answers `false`. An
    /// unresolved query also answers `false`, so `is_denied` is not the
    /// negation of [`is_allowed`](Self::is_allowed).
    pub fn is_denied(&self, role: Option<&dyn Entry>, resource: Option<&dyn Entry>) -> bool {
        let why = self.resolve(role, resource, |r, s| self.permissions.is_denied(r, s));
        why.access == Access::Denied
    }

    /// Returns `true` if the nearest decisive pair denies `action`.
    pub fn is_denied_action(
        &self,
        role: Option<&dyn Entry>,
        resource: Option<&dyn Entry>,
        action: Action,
    ) -> bool {
        let why = self.resolve(role, resource, |r, s| {
            self.permissions.is_denied_action(r, s, action)
        });
        why.access == Access::Denied
    }

    /// Resolves a single-action query and reports the deciding pair.
    ///
    /// # Example
    ///
    /// ```
    /// use treeacl::{Access, Acl, Action, SimpleEntry};
    ///
    /// let acl = Acl::new();
    /// let guest = SimpleEntry::new("guest");
    /// let why = acl.explain(Some(&guest), None, Action::Read);
    ///
    /// assert_eq!(why.access, Access::Denied);
    /// assert_eq!(why.key().as_deref(), Some("*::*"));
    /// ```
    pub fn explain(
        &self,
        role: Option<&dyn Entry>,
        resource: Option<&dyn Entry>,
        action: Action,
    ) -> Explanation {
        self.resolve(role, resource, |r, s| {
            self.permissions.is_allowed_action(r, s, action)
        })
    }

    fn resolve(
        &self,
        role: Option<&dyn Entry>,
        resource: Option<&dyn Entry>,
        lookup: impl Fn(&str, &str) -> Access,
    ) -> Explanation {
        let role_path = self.roles.ancestor_path(entry_id(role));
        let resource_path = self.resources.ancestor_path(entry_id(resource));

        for r in &role_path {
            for s in &resource_path {
                let access = lookup(r, s);
                trace!(role = %r, resource = %s, %access, "checked pair");
                if access.is_decisive() {
                    trace!(role = %r, resource = %s, %access, "resolved");
                    return Explanation {
                        access,
                        role: Some(r.clone()),
                        resource: Some(s.clone()),
                    };
                }
            }
        }

        debug!(
            role = %role_path[0],
            resource = %resource_path[0],
            "no decisive permission"
        );
        Explanation::unresolved()
    }

    /// Removes every decision for the exact pair. `None` means the wildcard.
    pub fn remove(&mut self, role: Option<&dyn Entry>, resource: Option<&dyn Entry>) -> Result<()> {
        self.permissions.remove(entry_id(role), entry_id(resource))
    }

    /// Removes one action decision for the exact pair.
    ///
    /// See [`PermissionMatrix::remove_action`] for how an `All` decision is
    /// split.
    pub fn remove_action(
        &mut self,
        role: Option<&dyn Entry>,
        resource: Option<&dyn Entry>,
        action: Action,
    ) -> Result<()> {
        self.permissions
            .remove_action(entry_id(role), entry_id(resource), action)
    }

    /// Unregisters a role and drops every permission naming it.
    ///
    /// With `cascade`, all descendants and their permissions go too.
    /// Otherwise the children move up to the role's parent and keep their
    /// permissions.
    pub fn remove_role(&mut self, role: Option<&dyn Entry>, cascade: bool) -> Result<()> {
        let role = role.ok_or(Error::NilEntry)?;
        let removed = self.roles.remove(role.id(), cascade)?;
        let purged: usize = removed
            .iter()
            .map(|id| self.permissions.remove_by_role(id))
            .sum();
        debug!(role = role.id(), cascade, purged, "removed role");
        Ok(())
    }

    /// Unregisters a resource and drops every permission naming it.
    pub fn remove_resource(&mut self, resource: Option<&dyn Entry>, cascade: bool) -> Result<()> {
        let resource = resource.ok_or(Error::NilEntry)?;
        let removed = self.resources.remove(resource.id(), cascade)?;
        let purged: usize = removed
            .iter()
            .map(|id| self.permissions.remove_by_resource(id))
            .sum();
        debug!(resource = resource.id(), cascade, purged, "removed resource");
        Ok(())
    }

    /// Sets the default policy to allow.
    pub fn make_default_allow(&mut self) {
        self.permissions.make_default_allow();
    }

    /// Sets the default policy to deny.
    pub fn make_default_deny(&mut self) {
        self.permissions.make_default_deny();
    }

    /// Returns the current default policy, if any.
    pub fn default_policy(&self) -> Option<DefaultPolicy> {
        self.permissions.default_policy()
    }

    /// Empties all three stores, including the default policy.
    ///
    /// Afterwards every query resolves to `false` until a policy or a
    /// permission is added.
    pub fn clear(&mut self) {
        self.roles.clear();
        self.resources.clear();
        self.permissions.clear();
        debug!("cleared acl");
    }

    /// Copies the role hierarchy.
    pub fn export_roles(&self) -> RegistrySnapshot {
        self.roles.export()
    }

    /// Copies the resource hierarchy.
    pub fn export_resources(&self) -> RegistrySnapshot {
        self.resources.export()
    }

    /// Copies the permission matrix.
    pub fn export_permissions(&self) -> PermissionSnapshot {
        self.permissions.export()
    }

    /// Loads a role hierarchy into an empty role registry.
    pub fn import_roles(&mut self, snapshot: &RegistrySnapshot) -> Result<()> {
        if !self.roles.is_empty() {
            return Err(Error::NonEmpty("roles"));
        }
        self.roles.import(snapshot);
        Ok(())
    }

    /// Loads a resource hierarchy into an empty resource registry.
    pub fn import_resources(&mut self, snapshot: &RegistrySnapshot) -> Result<()> {
        if !self.resources.is_empty() {
            return Err(Error::NonEmpty("resources"));
        }
        self.resources.import(snapshot);
        Ok(())
    }

    /// Loads permissions into an empty matrix.
    ///
    /// A fresh ACL is not empty: it holds the default policy. Call
    /// [`clear`](Self::clear) first.
    pub fn import_permissions(&mut self, snapshot: &PermissionSnapshot) -> Result<()> {
        if !self.permissions.is_empty() {
            return Err(Error::NonEmpty("permissions"));
        }
        self.permissions.import(snapshot);
        Ok(())
    }

    /// Copies all three stores at once.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            roles: self.export_roles(),
            resources: self.export_resources(),
            permissions: self.export_permissions(),
        }
    }

    /// Loads all three stores at once.
    ///
    /// Every store must be empty. Nothing is loaded unless all three are.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !self.roles.is_empty() {
            return Err(Error::NonEmpty("roles"));
        }
        if !self.resources.is_empty() {
            return Err(Error::NonEmpty("resources"));
        }
        if !self.permissions.is_empty() {
            return Err(Error::NonEmpty("permissions"));
        }
        self.roles.import(&snapshot.roles);
        self.resources.import(&snapshot.resources);
        self.permissions.import(&snapshot.permissions);
        Ok(())
    }

    /// Renders the role table, resource table and permission listing.
    pub fn visualize(&self) -> String {
        format!("{}\n{}\n{}\n", self.roles, self.resources, self.permissions)
    }

    /// Renders the role hierarchy as a tree, labelled through `loader`.
    pub fn visualize_roles(&self, loader: &dyn Entry) -> String {
        self.roles.display(loader)
    }

    /// Renders the resource hierarchy as a tree, labelled through `loader`.
    pub fn visualize_resources(&self, loader: &dyn Entry) -> String {
        self.resources.display(loader)
    }

    /// Renders the permission listing.
    pub fn visualize_permissions(&self) -> String {
        self.permissions.to_string()
    }
}

fn entry_id(entry: Option<&dyn Entry>) -> &str {
    entry.map_or(WILDCARD, |e| e.id())
}

fn ensure_registered(registry: &mut Registry, entry: &dyn Entry) {
    let id = entry.id();
    if id.is_empty() || id == WILDCARD {
        return;
    }
    if let Err(err) = registry.insert(id) {
        trace!(%err, "entry already registered");
    }
}
