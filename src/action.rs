use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of access a permission applies to.
///
/// `All` stands for the four specific kinds at once. Each kind also has a
/// numeric code (`All` = 1 through `Delete` = 5) for callers that store
/// actions as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Action {
    /// Every action.
    All,
    /// Creating the resource.
    Create,
    /// Reading the resource.
    Read,
    /// Modifying the resource.
    Update,
    /// Removing the resource.
    Delete,
}

impl Action {
    /// The four specific actions, in code order.
    pub const SPECIFIC: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    /// Converts a numeric code to an action.
    ///
    /// Codes outside `1..=5` fall back to `All`.
    ///
    /// # Example
    ///
    /// ```
    /// use treeacl::Action;
    ///
    /// assert_eq!(Action::from_code(3), Action::Read);
    /// assert_eq!(Action::from_code(42), Action::All);
    /// ```
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Action::Create,
            3 => Action::Read,
            4 => Action::Update,
            5 => Action::Delete,
            _ => Action::All,
        }
    }

    /// Returns the numeric code of this action.
    pub fn code(self) -> i32 {
        match self {
            Action::All => 1,
            Action::Create => 2,
            Action::Read => 3,
            Action::Update => 4,
            Action::Delete => 5,
        }
    }

    /// Converts a snapshot name (case-insensitive) to an action.
    ///
    /// Unknown names fall back to `All`, like unknown codes do.
    pub fn from_name(name: &str) -> Self {
        Self::SPECIFIC
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(name))
            .unwrap_or(Action::All)
    }

    /// Returns the upper-case name used in snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::All => "ALL",
            Action::Create => "CREATE",
            Action::Read => "READ",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        }
    }

    /// Returns `true` for every action except `All`.
    pub fn is_specific(self) -> bool {
        self != Action::All
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<i32> for Action {
    fn from(code: i32) -> Self {
        Action::from_code(code)
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Action::from_name(s))
    }
}
