//! Per-directory name table.
//!
//! Entries are kept in insertion order so listings are stable. Lookups are a
//! linear scan; directories in this filesystem stay small.

use super::types::Named;

/// Ordered collection of uniquely named entries.
#[derive(Debug)]
pub struct NameTable<T> {
    entries: Vec<T>,
}

impl<T> Default for NameTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Named> NameTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an entry by name.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Find an entry by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.iter_mut().find(|e| e.name() == name)
    }

    /// Check whether an entry with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append an entry.
    ///
    /// # Arguments
    /// * `entry` - Entry to append
    ///
    /// # Returns
    /// The entry back as `Err` if its name is already taken.
    pub fn insert(&mut self, entry: T) -> Result<(), T> {
        if self.contains(entry.name()) {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Detach an entry by name, preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let pos: usize = self.entries.iter().position(|e| e.name() == name)?;
        Some(self.entries.remove(pos))
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
