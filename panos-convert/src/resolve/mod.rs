//! Group membership resolution.
//!
//! Groups may reference groups defined later in the same batch. Each batch is
//! resolved depth first through a [`Worklist`]: a member that names a pending
//! group resolves that group first, and a member that names a group still
//! being resolved is a membership cycle.
//!
//! - **address_groups**: drops unresolved members with a warning
//! - **service_groups**: drops the whole group with an error

pub mod address_groups;
pub mod service_groups;

use std::collections::{HashMap, HashSet};

/// Group entries of one batch keyed by source name.
pub struct Worklist<'g, T> {
    entries: HashMap<&'g str, &'g T>,
    in_progress: HashSet<String>,
    done: HashSet<String>,
}

impl<'g, T> Worklist<'g, T> {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'g str, &'g T)>,
    {
        Self {
            entries: entries.into_iter().collect(),
            in_progress: HashSet::new(),
            done: HashSet::new(),
        }
    }

    /// Entry that has not been started yet.
    pub fn pending(&self, name: &str) -> Option<&'g T> {
        if self.in_progress.contains(name) || self.done.contains(name) {
            return None;
        }
        self.entries.get(name).copied()
    }

    pub fn is_in_progress(&self, name: &str) -> bool {
        self.in_progress.contains(name)
    }

    /// Mark `name` as being resolved. Returns false when it already was.
    pub fn start(&mut self, name: &str) -> bool {
        if self.done.contains(name) {
            return false;
        }
        self.in_progress.insert(name.to_string())
    }

    pub fn finish(&mut self, name: &str) {
        self.in_progress.remove(name);
        self.done.insert(name.to_string());
    }
}
