//! The fixed set of change categories (§3) and the per-connection report
//! index array used by `ChangeTracker` (§4.8).

use bitflags::bitflags;

bitflags! {
    /// A selection of change categories, as requested by a `*CHANGES[.cat]?`
    /// command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CategorySet: u8 {
        const CONFIG   = 0b0000_0001;
        const BITS     = 0b0000_0010;
        const POSITION = 0b0000_0100;
        const READ     = 0b0000_1000;
        const ATTR     = 0b0001_0000;
        const TABLE    = 0b0010_0000;
    }
}

impl CategorySet {
    pub const ALL_ORDERED: [Category; 6] = [
        Category::Config,
        Category::Bits,
        Category::Position,
        Category::Read,
        Category::Attr,
        Category::Table,
    ];
}

/// A single change category. Every class declares which one of these it
/// reports updates under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Config,
    Bits,
    Position,
    Read,
    Attr,
    Table,
}

impl Category {
    pub fn as_set(self) -> CategorySet {
        match self {
            Category::Config => CategorySet::CONFIG,
            Category::Bits => CategorySet::BITS,
            Category::Position => CategorySet::POSITION,
            Category::Read => CategorySet::READ,
            Category::Attr => CategorySet::ATTR,
            Category::Table => CategorySet::TABLE,
        }
    }

    /// Parses the suffix of `*CHANGES.<name>?`, case-sensitive per the wire
    /// protocol's closed set of system commands.
    pub fn parse(name: &str) -> Option<Category> {
        match name {
            "CONFIG" => Some(Category::Config),
            "BITS" => Some(Category::Bits),
            "POSITION" => Some(Category::Position),
            "READ" => Some(Category::Read),
            "ATTR" => Some(Category::Attr),
            "TABLE" => Some(Category::Table),
            _ => None,
        }
    }
}

/// One change index per category, as tracked per-connection.
///
/// Indices for categories *not* selected by the current request are
/// reported as `u64::MAX` so nothing in them is considered "changed" this
/// round (§4.8 step 2).
#[derive(Debug, Clone, Copy)]
pub struct ReportIndex([u64; 6]);

impl ReportIndex {
    pub fn get(&self, category: Category) -> u64 {
        self.0[category as usize]
    }
}

/// Per-connection last-seen change index for each category, initialised to
/// zero (§4.8).
#[derive(Debug, Default)]
pub struct ConnectionChangeState {
    last_seen: [u64; 6],
}

impl ConnectionChangeState {
    pub fn new() -> Self {
        ConnectionChangeState { last_seen: [0; 6] }
    }

    /// Allocates a fresh clock tick, captures the current `last_seen[]` for
    /// the categories selected by `requested` into a `ReportIndex` (with
    /// unselected categories pinned to `u64::MAX`), advances `last_seen` for
    /// the requested categories to the new tick, and returns both.
    pub fn advance(&mut self, clock: &crate::ChangeClock, requested: CategorySet) -> (u64, ReportIndex) {
        let tick = clock.tick();
        let mut reported = [u64::MAX; 6];
        for (i, category) in CategorySet::ALL_ORDERED.into_iter().enumerate() {
            if requested.contains(category.as_set()) {
                reported[i] = self.last_seen[i];
                self.last_seen[i] = tick;
            }
        }
        (tick, ReportIndex(reported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeClock;

    #[test]
    fn unselected_categories_report_as_max() {
        let clock = ChangeClock::new();
        let mut state = ConnectionChangeState::new();
        let (_, reported) = state.advance(&clock, CategorySet::CONFIG);
        assert_eq!(reported.get(Category::Config), 0);
        assert_eq!(reported.get(Category::Bits), u64::MAX);
    }

    #[test]
    fn advancing_twice_moves_the_watermark() {
        let clock = ChangeClock::new();
        let mut state = ConnectionChangeState::new();
        let (first_tick, _) = state.advance(&clock, CategorySet::CONFIG);
        let (_, reported) = state.advance(&clock, CategorySet::CONFIG);
        assert_eq!(reported.get(Category::Config), first_tick);
    }
}
