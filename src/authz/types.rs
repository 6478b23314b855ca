//! Authorization types
//!
//! Core value types shared by the compiler, the aggregator and the evaluator.

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Access rights granted by a rule entry
    ///
    /// Grants from several matching entries are combined with `|`; a
    /// guaranteed floor is computed with `&`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessLevel: u8 {
        /// Permission to read paths
        const READ = 0b01;
        /// Permission to modify paths
        const WRITE = 0b10;
        /// Read and write
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl AccessLevel {
    /// No access at all
    pub const NONE: Self = Self::empty();

    /// Parse the value side of a rule entry.
    ///
    /// `r` grants read, `w` grants write and whitespace is ignored. Any other
    /// character is returned as the error.
    pub fn parse_rights(value: &str) -> Result<Self, char> {
        let mut access = Self::NONE;
        for ch in value.chars() {
            match ch {
                'r' => access |= Self::READ,
                'w' => access |= Self::WRITE,
                c if c.is_whitespace() => {}
                c => return Err(c),
            }
        }
        Ok(access)
    }

    /// Check whether this level covers everything in `required`
    pub fn satisfies(self, required: AccessLevel) -> bool {
        self.contains(required)
    }

    /// Short form used by the command-line tool: `no`, `r`, `w` or `rw`
    pub fn as_str(&self) -> &'static str {
        if self.contains(Self::READ_WRITE) {
            "rw"
        } else if self.contains(Self::READ) {
            "r"
        } else if self.contains(Self::WRITE) {
            "w"
        } else {
            "no"
        }
    }

    /// Parse the short form produced by [`AccessLevel::as_str`]
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "no" | "none" => Some(Self::NONE),
            "r" => Some(Self::READ),
            "w" => Some(Self::WRITE),
            "rw" => Some(Self::READ_WRITE),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Guaranteed floor and best-case ceiling of an identity's access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rights {
    /// Access held on every path the summarised rules cover
    pub min_access: AccessLevel,
    /// Access held on at least one path
    pub max_access: AccessLevel,
}

impl Rights {
    /// Rights of an identity no rule applies to
    pub const NONE: Self = Self {
        min_access: AccessLevel::NONE,
        max_access: AccessLevel::NONE,
    };

    /// Starting point before any rule has been folded in
    pub(crate) const fn unset() -> Self {
        Self {
            min_access: AccessLevel::READ_WRITE,
            max_access: AccessLevel::NONE,
        }
    }

    /// Fold one rule's grant into this bucket
    pub(crate) fn fold(&mut self, access: AccessLevel) {
        self.min_access &= access;
        self.max_access |= access;
    }

    /// Merge another bucket into this one
    pub(crate) fn combine(&mut self, other: &Rights) {
        self.min_access &= other.min_access;
        self.max_access |= other.max_access;
    }
}

impl Default for Rights {
    fn default() -> Self {
        Self::NONE
    }
}

/// Repository a rule is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepoScope {
    /// Rule applies to every repository
    Any,
    /// Rule applies only to the named repository
    Named(Arc<str>),
}

impl RepoScope {
    /// Check whether a rule with this scope applies to `repo`.
    ///
    /// An empty `repo` means no repository was supplied; only `Any` matches it.
    pub fn applies_to(&self, repo: &str) -> bool {
        match self {
            RepoScope::Any => true,
            RepoScope::Named(name) => !repo.is_empty() && name.as_ref() == repo,
        }
    }

    /// Whether this scope names a concrete repository
    pub const fn is_specific(&self) -> bool {
        matches!(self, RepoScope::Named(_))
    }
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoScope::Any => write!(f, "*"),
            RepoScope::Named(name) => write!(f, "{name}"),
        }
    }
}

/// The target of a rule entry, decided once while parsing the option name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// `$anonymous`, or `~$authenticated`
    Anonymous,
    /// `$authenticated`, or `~$anonymous`
    Authenticated,
    /// A plain user name
    User(Arc<str>),
    /// `@name`
    Group(Arc<str>),
    /// `&name`
    Alias(Arc<str>),
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Anonymous => write!(f, "$anonymous"),
            EntryKind::Authenticated => write!(f, "$authenticated"),
            EntryKind::User(name) => write!(f, "{name}"),
            EntryKind::Group(name) => write!(f, "@{name}"),
            EntryKind::Alias(name) => write!(f, "&{name}"),
        }
    }
}
