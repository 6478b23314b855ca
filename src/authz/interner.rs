//! String interning for identifiers referenced by the model
//!
//! The builder is threaded through both compiler passes; once loading
//! succeeds it is frozen into a [`StringArena`] owned by the model, so every
//! distinct user, group or repository name is allocated once and shared.

use std::collections::HashSet;
use std::sync::Arc;

/// Mutable interner used while compiling
#[derive(Debug, Default)]
pub struct InternerBuilder {
    strings: HashSet<Arc<str>>,
}

impl InternerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared copy of `s`, allocating it on first use
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&interned));
        interned
    }

    /// Freeze into the immutable arena
    pub fn finish(self) -> StringArena {
        StringArena {
            strings: self.strings,
        }
    }
}

/// Immutable set of interned identifiers
#[derive(Debug, Default)]
pub struct StringArena {
    strings: HashSet<Arc<str>>,
}

impl StringArena {
    pub fn contains(&self, s: &str) -> bool {
        self.strings.contains(s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}
