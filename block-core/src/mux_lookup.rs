//! Bidirectional name/index lookup for mux-typed fields (`bit_mux`,
//! `pos_mux`): each mux field's value is one of a shared, growing list of
//! source names (e.g. `TTLIN1.VAL`), addressed on the wire by name but
//! stored and compared internally by index, mirroring the original's
//! `enum_set` built up by `mux_lookup.c` as blocks are registered.

use crate::enumeration::Enumeration;
use crate::error::Result;

/// The shared index/name table backing one mux class family (bit or
/// position). Multiple `Class::BitMux`/`Class::PosMux` fields share a
/// single `MuxLookup`, so that a source registered by one field is visible
/// by name to every other mux field of the same family.
#[derive(Debug, Clone, Default)]
pub struct MuxLookup {
    table: Enumeration,
}

impl MuxLookup {
    pub fn new() -> Self {
        MuxLookup {
            table: Enumeration::dynamic(),
        }
    }

    /// Registers `name` as a selectable mux source, returning its index.
    /// Called once per output field as blocks are created; duplicate
    /// registration is a programming error in the database loader, not a
    /// runtime condition, so it is surfaced as an error rather than
    /// silently ignored.
    pub fn register(&mut self, name: impl Into<String>) -> Result<usize> {
        self.table.push(name)
    }

    pub fn name_of(&self, index: usize) -> Result<&str> {
        self.table.name_of(index)
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.table.index_of(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_resolves_by_name_and_index() {
        let mut mux = MuxLookup::new();
        let ttl_idx = mux.register("TTLIN1.VAL").unwrap();
        let lvds_idx = mux.register("LVDSIN1.VAL").unwrap();
        assert_eq!(mux.name_of(ttl_idx).unwrap(), "TTLIN1.VAL");
        assert_eq!(mux.index_of("LVDSIN1.VAL").unwrap(), lvds_idx);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let mux = MuxLookup::new();
        assert!(mux.index_of("NOPE.VAL").is_err());
    }
}
