use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::entry::{Entry, WILDCARD};
use crate::error::{Error, Result};

/// Exported form of a registry: id to parent id, with `""` for roots.
pub type RegistrySnapshot = BTreeMap<String, String>;

/// A forest of string-identified nodes, each with at most one parent.
///
/// An ACL keeps two independent registries, one for roles and one for
/// resources. A child can only be inserted under a parent that already
/// exists, so the hierarchy cannot contain cycles when built through this
/// API.
///
/// # Example
///
/// ```
/// use treeacl::Registry;
///
/// let mut roles = Registry::new();
/// roles.insert("staff").unwrap();
/// roles.insert_child("editor", "staff").unwrap();
///
/// assert_eq!(roles.ancestor_path("editor"), vec!["editor", "staff", "*"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    parents: BTreeMap<String, Option<String>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a root node.
    ///
    /// Fails with [`Error::DuplicateEntry`] if the id is already present.
    pub fn insert(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.parents.contains_key(&id) {
            return Err(Error::duplicate(id));
        }
        debug!(%id, "registered root entry");
        self.parents.insert(id, None);
        Ok(())
    }

    /// Inserts `id` as a child of `parent`.
    ///
    /// The duplicate check runs first: an existing `id` yields
    /// [`Error::DuplicateEntry`] even when `parent` is missing. A missing
    /// `parent` yields [`Error::EntryNotFound`].
    pub fn insert_child(&mut self, id: impl Into<String>, parent: &str) -> Result<()> {
        let id = id.into();
        if self.parents.contains_key(&id) {
            return Err(Error::duplicate(id));
        }
        if !self.parents.contains_key(parent) {
            return Err(Error::not_found(parent));
        }
        debug!(%id, %parent, "registered child entry");
        self.parents.insert(id, Some(parent.to_string()));
        Ok(())
    }

    /// Returns `true` if the id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Returns the parent of `id`, or `None` for roots and unknown ids.
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).and_then(|p| p.as_deref())
    }

    /// Returns `true` if any node has `id` as its parent.
    pub fn has_children(&self, id: &str) -> bool {
        self.parents.values().any(|p| p.as_deref() == Some(id))
    }

    /// Returns the direct children of `id` in id order.
    pub fn children(&self, id: &str) -> Vec<&str> {
        self.parents
            .iter()
            .filter(|(_, p)| p.as_deref() == Some(id))
            .map(|(child, _)| child.as_str())
            .collect()
    }

    /// Returns the root nodes in id order.
    pub fn roots(&self) -> Vec<&str> {
        self.parents
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Walks from `id` up to its root, ending with [`WILDCARD`].
    ///
    /// - An empty id (or the wildcard itself) yields just `["*"]`.
    /// - An unregistered id yields `[id, "*"]`: permissions may name entries
    ///   that were never added to the hierarchy.
    /// - Otherwise the result is `[id, parent, grandparent, ..., "*"]`.
    pub fn ancestor_path(&self, id: &str) -> Vec<String> {
        if id.is_empty() || id == WILDCARD {
            return vec![WILDCARD.to_string()];
        }

        let mut path = vec![id.to_string()];
        let mut current = id;
        // Imported snapshots are not checked for cycles; never walk more
        // steps than there are nodes.
        for _ in 0..self.parents.len() {
            match self.parent(current) {
                Some(parent) if self.contains(parent) => {
                    path.push(parent.to_string());
                    current = parent;
                }
                _ => break,
            }
        }
        path.push(WILDCARD.to_string());
        path
    }

    /// Removes `id` and returns every id that left the registry.
    ///
    /// If `id` has children they are either moved up to `id`'s parent
    /// (`cascade == false`) or removed along with all their descendants
    /// (`cascade == true`). `id` itself is always the last element of the
    /// returned list.
    pub fn remove(&mut self, id: &str, cascade: bool) -> Result<Vec<String>> {
        let Some(parent) = self.parents.get(id).cloned() else {
            return Err(Error::not_found(id));
        };

        let mut removed = Vec::new();
        if cascade {
            removed = self.descendants(id);
            for descendant in &removed {
                self.parents.remove(descendant);
            }
        } else {
            for slot in self.parents.values_mut() {
                if slot.as_deref() == Some(id) {
                    *slot = parent.clone();
                }
            }
        }

        self.parents.remove(id);
        removed.push(id.to_string());
        debug!(%id, cascade, removed = removed.len(), "removed entry");
        Ok(removed)
    }

    /// Removes every node.
    pub fn clear(&mut self) {
        self.parents.clear();
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns `true` if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns a copy of the id-to-parent mapping.
    pub fn export(&self) -> RegistrySnapshot {
        self.parents
            .iter()
            .map(|(id, parent)| (id.clone(), parent.clone().unwrap_or_default()))
            .collect()
    }

    /// Replaces the whole registry with `snapshot`.
    ///
    /// A parent of `""` or `"*"` marks a root. Refusing to overwrite a
    /// populated registry is up to the caller.
    pub fn import(&mut self, snapshot: &RegistrySnapshot) {
        self.parents = snapshot
            .iter()
            .map(|(id, parent)| {
                let parent = (!parent.is_empty() && parent != WILDCARD).then(|| parent.clone());
                (id.clone(), parent)
            })
            .collect();
        debug!(entries = self.parents.len(), "imported registry");
    }

    /// Renders the hierarchy as an indented list.
    ///
    /// Each node becomes a `- description` line, indented by one space per
    /// level. Descriptions come from `loader.retrieve(id)`; ids are used when
    /// the loader has no entry. Nodes whose parent is not registered are
    /// rendered as roots. Each node appears at most once.
    pub fn display(&self, loader: &dyn Entry) -> String {
        let mut out = String::new();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<(&str, usize)> = self
            .parents
            .iter()
            .filter(|(_, p)| p.as_deref().is_none_or(|p| !self.contains(p)))
            .rev()
            .map(|(id, _)| (id.as_str(), 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let label = loader
                .retrieve(id)
                .map(|entry| entry.description())
                .unwrap_or_else(|| id.to_string());
            out.push_str(&" ".repeat(depth));
            out.push_str("- ");
            out.push_str(&label);
            out.push('\n');

            let children = self.children(id);
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
        out
    }

    /// Collects all descendants of `id`, deepest first within each branch.
    ///
    /// `id` itself is never included, even when an imported cycle leads
    /// back to it.
    fn descendants(&self, id: &str) -> Vec<String> {
        let mut seen = BTreeSet::from([id]);
        let mut found = Vec::new();
        // (node, whether its children have been pushed)
        let mut stack: Vec<(&str, bool)> = self
            .children(id)
            .into_iter()
            .rev()
            .map(|child| (child, false))
            .collect();

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                found.push(node.to_string());
                continue;
            }
            if !seen.insert(node) {
                continue;
            }
            stack.push((node, true));
            stack.extend(
                self.children(node)
                    .into_iter()
                    .rev()
                    .filter(|child| !seen.contains(child))
                    .map(|child| (child, false)),
            );
        }
        found
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, parent) in &self.parents {
            let gap = if id.len() >= 8 { "\t - \t" } else { "\t\t - \t" };
            writeln!(f, "\t{id}{gap}{}", parent.as_deref().unwrap_or(WILDCARD))?;
        }
        Ok(())
    }
}

/// Renders an ancestor path as `- -> a -> b -> * <`.
pub fn format_path(path: &[String]) -> String {
    let mut out = String::from("-");
    for step in path {
        out.push_str(" -> ");
        out.push_str(step);
    }
    out.push_str(" <");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SimpleEntry;

    #[test]
    fn test_insert_and_remove() {
        let mut reg = Registry::new();
        assert!(reg.is_empty());

        reg.insert("res1").unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.insert("res1"), Err(Error::duplicate("res1")));
        assert_eq!(reg.len(), 1);

        reg.insert("res2").unwrap();
        assert_eq!(reg.len(), 2);

        let removed = reg.remove("res1", false).unwrap();
        assert_eq!(removed, vec!["res1"]);
        assert!(!reg.contains("res1"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_remove_missing() {
        let mut reg = Registry::new();
        assert_eq!(reg.remove("res1", false), Err(Error::not_found("res1")));
        assert_eq!(reg.remove("res1", true), Err(Error::not_found("res1")));
    }

    #[test]
    fn test_insert_child_missing_parent() {
        let mut reg = Registry::new();
        assert_eq!(reg.insert_child("res2", "res1"), Err(Error::not_found("res1")));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_insert_child_duplicate() {
        let mut reg = Registry::new();
        reg.insert("res1").unwrap();
        reg.insert_child("res1-a", "res1").unwrap();
        assert_eq!(
            reg.insert_child("res1-a", "res1"),
            Err(Error::duplicate("res1-a"))
        );
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_duplicate_checked_before_parent() {
        let mut reg = Registry::new();
        reg.insert("res1").unwrap();
        assert_eq!(
            reg.insert_child("res1", "missing"),
            Err(Error::duplicate("res1"))
        );
    }

    #[test]
    fn test_children() {
        let mut reg = Registry::new();
        reg.insert("res1").unwrap();
        assert!(!reg.has_children("res1"));
        reg.insert_child("res1-b", "res1").unwrap();
        reg.insert_child("res1-a", "res1").unwrap();
        assert!(reg.has_children("res1"));
        assert_eq!(reg.children("res1"), vec!["res1-a", "res1-b"]);
        assert_eq!(reg.parent("res1-a"), Some("res1"));
        assert_eq!(reg.parent("res1"), None);
        assert_eq!(reg.roots(), vec!["res1"]);
    }

    mod hierarchy {
        use super::*;

        fn populated() -> Registry {
            let mut reg = Registry::new();
            reg.insert("res1").unwrap();
            reg.insert("res2").unwrap();
            reg.insert_child("res1-a", "res1").unwrap();
            reg.insert_child("res1-b", "res1").unwrap();
            reg.insert_child("res2-a", "res2").unwrap();
            reg.insert_child("res1-b-1", "res1-b").unwrap();
            reg.insert_child("res2-a-1", "res2-a").unwrap();
            reg.insert_child("res2-a-1-i", "res2-a-1").unwrap();
            reg
        }

        #[test]
        fn test_cascade_removes_subtree() {
            let mut reg = populated();
            assert_eq!(reg.len(), 8);

            let removed = reg.remove("res2", true).unwrap();
            assert_eq!(removed.len(), 4);
            assert_eq!(removed.last().map(String::as_str), Some("res2"));
            for id in ["res2", "res2-a", "res2-a-1", "res2-a-1-i"] {
                assert!(removed.iter().any(|r| r == id));
                assert!(!reg.contains(id));
            }
            assert_eq!(reg.len(), 4);
        }

        #[test]
        fn test_non_cascade_reparents_children() {
            let mut reg = populated();
            reg.remove("res2", true).unwrap();

            let removed = reg.remove("res1-b", false).unwrap();
            assert_eq!(removed, vec!["res1-b"]);
            assert_eq!(reg.len(), 3);
            assert!(reg.contains("res1-b-1"));
            assert_eq!(reg.parent("res1-b-1"), Some("res1"));
            assert!(reg.has_children("res1"));
        }

        #[test]
        fn test_non_cascade_root_children_become_roots() {
            let mut reg = populated();
            reg.remove("res2", false).unwrap();
            assert_eq!(reg.parent("res2-a"), None);
            assert_eq!(reg.roots(), vec!["res1", "res2-a"]);
            assert_eq!(
                reg.ancestor_path("res2-a-1-i"),
                vec!["res2-a-1-i", "res2-a-1", "res2-a", "*"]
            );
        }

        #[test]
        fn test_removing_last_children() {
            let mut reg = populated();
            reg.remove("res2", true).unwrap();
            reg.remove("res1-b", false).unwrap();

            assert_eq!(reg.remove("res1-b-1", false).unwrap().len(), 1);
            assert_eq!(reg.remove("res1-a", true).unwrap().len(), 1);
            assert!(!reg.has_children("res1"));
            assert_eq!(reg.len(), 1);
        }

        #[test]
        fn test_display_tree() {
            let reg = populated();
            let loader = SimpleEntry::new("loader");
            let expected = "\
- res1
 - res1-a
 - res1-b
  - res1-b-1
- res2
 - res2-a
  - res2-a-1
   - res2-a-1-i
";
            assert_eq!(reg.display(&loader), expected);
        }
    }

    #[test]
    fn test_ancestor_path() {
        let mut reg = Registry::new();
        assert_eq!(reg.ancestor_path("RES1"), vec!["RES1", "*"]);
        assert_eq!(reg.ancestor_path(""), vec!["*"]);
        assert_eq!(reg.ancestor_path("*"), vec!["*"]);

        reg.insert("RES1").unwrap();
        assert_eq!(reg.ancestor_path("RES1").len(), 2);
        assert_eq!(reg.ancestor_path("").len(), 1);

        reg.insert("RES2").unwrap();
        reg.insert_child("RES1-1", "RES1").unwrap();
        reg.insert_child("RES1-2", "RES1").unwrap();
        assert_eq!(reg.ancestor_path("RES1").len(), 2);
        assert_eq!(reg.ancestor_path("RES1-1"), vec!["RES1-1", "RES1", "*"]);
        assert_eq!(reg.ancestor_path("RES1-2").len(), 3);

        reg.insert_child("RES1-1-1", "RES1-1").unwrap();
        let path = reg.ancestor_path("RES1-1-1");
        assert_eq!(path, vec!["RES1-1-1", "RES1-1", "RES1", "*"]);
        assert_eq!(format_path(&path), "- -> RES1-1-1 -> RES1-1 -> RES1 -> * <");
    }

    #[test]
    fn test_ancestor_path_survives_cyclic_import() {
        let mut reg = Registry::new();
        let snapshot: RegistrySnapshot = [("a", "b"), ("b", "a")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        reg.import(&snapshot);

        let path = reg.ancestor_path("a");
        assert_eq!(path.last().map(String::as_str), Some("*"));
        assert!(path.len() <= reg.len() + 2);
    }

    fn imported(pairs: &[(&str, &str)]) -> Registry {
        let snapshot: RegistrySnapshot = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut reg = Registry::new();
        reg.import(&snapshot);
        reg
    }

    #[test]
    fn test_cascade_remove_survives_cyclic_import() {
        let mut reg = imported(&[("a", "b"), ("b", "a")]);
        let removed = reg.remove("a", true).unwrap();
        assert_eq!(removed, vec!["b", "a"]);
        assert!(reg.is_empty());

        let mut reg = imported(&[("a", "a"), ("c", "")]);
        assert_eq!(reg.remove("a", true).unwrap(), vec!["a"]);
        assert_eq!(reg.roots(), vec!["c"]);
    }

    #[test]
    fn test_non_cascade_remove_on_cyclic_import() {
        let mut reg = imported(&[("a", "b"), ("b", "a")]);
        assert_eq!(reg.remove("a", false).unwrap(), vec!["a"]);
        assert_eq!(reg.ancestor_path("b").last().map(String::as_str), Some("*"));
    }

    #[test]
    fn test_display_skips_unreachable_cycles() {
        let reg = imported(&[("a", "b"), ("b", "a"), ("c", ""), ("d", "d")]);
        assert_eq!(reg.display(&SimpleEntry::new("loader")), "- c\n");
    }

    #[test]
    fn test_display_renders_orphans_as_roots() {
        let reg = imported(&[("b", "a"), ("c", "b"), ("d", "")]);
        assert_eq!(reg.roots(), vec!["d"]);
        assert_eq!(
            reg.display(&SimpleEntry::new("loader")),
            "- b\n - c\n- d\n"
        );
    }

    #[test]
    fn test_import_export() {
        let mut reg = Registry::new();
        assert!(reg.export().is_empty());

        let snapshot: RegistrySnapshot = [
            ("ROLE1", ""),
            ("ROLE2", ""),
            ("ROLE1-1", "ROLE1"),
            ("ROLE1-2-1", "ROLE1-2"),
            ("ROLE1-2", "ROLE1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        reg.import(&snapshot);
        assert_eq!(reg.len(), 5);
        assert_eq!(reg.export(), snapshot);
        assert_eq!(
            reg.ancestor_path("ROLE1-2-1"),
            vec!["ROLE1-2-1", "ROLE1-2", "ROLE1", "*"]
        );

        let mut exported = reg.export();
        exported.clear();
        assert_eq!(reg.len(), 5);
    }

    #[test]
    fn test_import_wildcard_parent_is_root() {
        let mut reg = Registry::new();
        let snapshot: RegistrySnapshot =
            [("guest".to_string(), "*".to_string())].into_iter().collect();
        reg.import(&snapshot);
        assert_eq!(reg.roots(), vec!["guest"]);
        assert_eq!(reg.export()["guest"], "");
    }

    #[test]
    fn test_display_table() {
        let mut reg = Registry::new();
        reg.insert("res1").unwrap();
        assert_eq!(reg.to_string(), "\tres1\t\t - \t*\n");

        reg.insert_child("long-child", "res1").unwrap();
        assert_eq!(
            reg.to_string(),
            "\tlong-child\t - \tres1\n\tres1\t\t - \t*\n"
        );
    }

    #[test]
    fn test_clear() {
        let mut reg = Registry::new();
        reg.insert("a").unwrap();
        reg.insert_child("b", "a").unwrap();
        reg.clear();
        assert!(reg.is_empty());
        assert!(!reg.contains("a"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Builds a registry from parent choices: node `i` hangs under node
        /// `choice % i` when `choice` is `Some`, else it is a root.
        fn build(shape: &[Option<usize>]) -> Registry {
            let mut reg = Registry::new();
            for (i, choice) in shape.iter().enumerate() {
                let id = format!("n{i}");
                match choice {
                    Some(c) if i > 0 => reg.insert_child(id, &format!("n{}", c % i)).unwrap(),
                    _ => reg.insert(id).unwrap(),
                }
            }
            reg
        }

        fn depth(reg: &Registry, id: &str) -> usize {
            let mut depth = 1;
            let mut current = id;
            while let Some(parent) = reg.parent(current) {
                depth += 1;
                current = parent;
            }
            depth
        }

        fn subtree_size(reg: &Registry, id: &str) -> usize {
            1 + reg
                .children(id)
                .into_iter()
                .map(|child| subtree_size(reg, child))
                .sum::<usize>()
        }

        proptest! {
            #[test]
            fn test_path_ends_with_wildcard(shape in prop::collection::vec(any::<Option<usize>>(), 1..24)) {
                let reg = build(&shape);
                for i in 0..shape.len() {
                    let id = format!("n{i}");
                    let path = reg.ancestor_path(&id);
                    prop_assert_eq!(path.last().map(String::as_str), Some(WILDCARD));
                    prop_assert_eq!(path.len(), depth(&reg, &id) + 1);
                }
            }

            #[test]
            fn test_cascade_removes_whole_subtree(
                shape in prop::collection::vec(any::<Option<usize>>(), 1..24),
                pick in any::<usize>(),
            ) {
                let mut reg = build(&shape);
                let id = format!("n{}", pick % shape.len());
                let before = reg.len();
                let expected = subtree_size(&reg, &id);

                let removed = reg.remove(&id, true).unwrap();
                prop_assert_eq!(removed.len(), expected);
                prop_assert_eq!(reg.len(), before - expected);
            }

            #[test]
            fn test_non_cascade_removes_one(
                shape in prop::collection::vec(any::<Option<usize>>(), 1..24),
                pick in any::<usize>(),
            ) {
                let mut reg = build(&shape);
                let id = format!("n{}", pick % shape.len());
                let parent = reg.parent(&id).map(str::to_string);
                let children: Vec<String> =
                    reg.children(&id).into_iter().map(str::to_string).collect();
                let before = reg.len();

                let removed = reg.remove(&id, false).unwrap();
                prop_assert_eq!(removed, vec![id.clone()]);
                prop_assert_eq!(reg.len(), before - 1);
                for child in &children {
                    prop_assert_eq!(reg.parent(child).map(str::to_string), parent.clone());
                }
            }
        }
    }
}
