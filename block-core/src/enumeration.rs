//! Enumeration values (§4.4): a closed, ordered set of `(index, name)` pairs
//! used by `enum`-typed fields and by several attributes (e.g. the class
//! name lists returned by `*BLOCKS?`).
//!
//! Two flavours exist, matching the original's `enum_set` vs. a field's own
//! inline enum labels: `Enumeration::from_labels` builds a *static* table
//! fixed at field-creation time (used by enum-typed parameters), while
//! `Enumeration::dynamic` wraps an `IndexMap` that a class can grow at
//! runtime (used for bit/pos mux name lists, which gain entries as more
//! blocks are registered).

use indexmap::IndexMap;

use crate::error::{CoreError, Result};

/// An ordered, bidirectional index/name table.
#[derive(Debug, Clone)]
pub struct Enumeration {
    by_index: Vec<String>,
    by_name: IndexMap<String, usize>,
}

impl Enumeration {
    /// Builds a fixed table from `labels`, indexed by position. Rejects
    /// duplicate names, matching the original's validation of enum labels.
    pub fn from_labels(labels: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let mut by_index = Vec::new();
        let mut by_name = IndexMap::new();
        for label in labels {
            let label = label.into();
            if by_name.contains_key(&label) {
                return Err(CoreError::parse(format!(
                    "duplicate enumeration label '{}'",
                    label
                )));
            }
            by_name.insert(label.clone(), by_index.len());
            by_index.push(label);
        }
        Ok(Enumeration { by_index, by_name })
    }

    /// Starts an empty table that entries can be `push`ed onto later.
    pub fn dynamic() -> Self {
        Enumeration {
            by_index: Vec::new(),
            by_name: IndexMap::new(),
        }
    }

    /// Appends a new name, assigning it the next index. Returns the
    /// assigned index, or an error if the name is already present.
    pub fn push(&mut self, name: impl Into<String>) -> Result<usize> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(CoreError::parse(format!(
                "duplicate enumeration label '{}'",
                name
            )));
        }
        let index = self.by_index.len();
        self.by_name.insert(name.clone(), index);
        self.by_index.push(name);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn name_of(&self, index: usize) -> Result<&str> {
        self.by_index
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| CoreError::range(format!("enumeration index {} out of range", index)))
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::lookup(format!("no such enumeration value '{}'", name)))
    }

    /// Iterates `(index, name)` pairs in ascending index order, the order
    /// `*ENUMS?`-style attributes report them in.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.by_index.iter().enumerate().map(|(i, s)| (i, s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_both_directions() {
        let e = Enumeration::from_labels(["Zero", "One", "Two"]).unwrap();
        assert_eq!(e.name_of(1).unwrap(), "One");
        assert_eq!(e.index_of("Two").unwrap(), 2);
    }

    #[test]
    fn rejects_duplicate_labels() {
        assert!(Enumeration::from_labels(["A", "A"]).is_err());
    }

    #[test]
    fn dynamic_grows_in_order() {
        let mut e = Enumeration::dynamic();
        assert_eq!(e.push("first").unwrap(), 0);
        assert_eq!(e.push("second").unwrap(), 1);
        assert_eq!(e.index_of("second").unwrap(), 1);
        assert!(e.push("first").is_err());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let e = Enumeration::from_labels(["only"]).unwrap();
        assert!(e.name_of(5).is_err());
    }
}
