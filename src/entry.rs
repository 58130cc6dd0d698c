/// The id that stands for "no specific role" or "no specific resource".
///
/// Real entries must never use this id.
pub const WILDCARD: &str = "*";

/// Something that can be placed in a role or resource hierarchy.
///
/// Only [`Entry::id`] takes part in access decisions. The other two methods
/// are used when rendering a hierarchy as a tree.
pub trait Entry {
    /// Returns the stable identifier of this entry.
    fn id(&self) -> &str;

    /// Returns a human-readable label. Defaults to the id.
    fn description(&self) -> String {
        self.id().to_string()
    }

    /// Looks up the entry with the given id, typically a child of this one.
    fn retrieve(&self, id: &str) -> Option<Box<dyn Entry>>;
}

/// An entry that is nothing but its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleEntry {
    id: String,
}

impl SimpleEntry {
    /// Creates an entry with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Entry for SimpleEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn retrieve(&self, id: &str) -> Option<Box<dyn Entry>> {
        Some(Box::new(SimpleEntry::new(id)))
    }
}

impl Entry for String {
    fn id(&self) -> &str {
        self
    }

    fn retrieve(&self, id: &str) -> Option<Box<dyn Entry>> {
        Some(Box::new(id.to_string()))
    }
}

/// The catch-all entry whose id is [`WILDCARD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RootEntry;

impl Entry for RootEntry {
    fn id(&self) -> &str {
        WILDCARD
    }

    fn description(&self) -> String {
        "ROOT".to_string()
    }

    fn retrieve(&self, _id: &str) -> Option<Box<dyn Entry>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_entry() {
        let entry = SimpleEntry::new("editor");
        assert_eq!(entry.id(), "editor");
        assert_eq!(entry.description(), "editor");

        let child = entry.retrieve("junior-editor").unwrap();
        assert_eq!(child.id(), "junior-editor");
    }

    #[test]
    fn test_root_entry() {
        assert_eq!(RootEntry.id(), WILDCARD);
        assert_eq!(RootEntry.description(), "ROOT");
        assert!(RootEntry.retrieve("anything").is_none());
    }

    #[test]
    fn test_string_entry() {
        let entry = String::from("docs");
        assert_eq!(entry.id(), "docs");
        assert_eq!(entry.retrieve("docs/api").unwrap().id(), "docs/api");
    }
}
