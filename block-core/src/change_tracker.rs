//! The `*CHANGES` walk (§4.8): for a requested set of categories, visits
//! every block/field/instance and collects the ones that changed since this
//! connection's last report in that category.

use crate::change_category::{Category, CategorySet, ConnectionChangeState};
use crate::change_clock::ChangeClock;
use crate::class::GetValue;
use crate::registry::Registry;

/// One changed entry in a change report: a fully formatted `block<n>.field`
/// name plus either a value, "table changed" (no value), or a format
/// failure (rendered downstream as `(error)`, never dropped — §4.8).
pub enum ChangeEntry {
    Value { name: String, value: String },
    TableChanged { name: String },
    AttrValue { name: String, value: String },
    FormatError { name: String },
}

/// Per-connection tracking state plus the walk operation over a `Registry`.
#[derive(Default)]
pub struct ChangeTracker {
    state: ConnectionChangeState,
}

impl ChangeTracker {
    pub fn new() -> Self {
        ChangeTracker::default()
    }

    /// Runs the full walk described in §4.8 and returns every changed
    /// entry, in block/field/instance order. `requested` selects which
    /// categories are visited; `CategorySet::all()` requests everything.
    pub fn report(
        &mut self,
        registry: &Registry,
        clock: &ChangeClock,
        requested: CategorySet,
    ) -> Vec<ChangeEntry> {
        let (_, report_index) = self.state.advance(clock, requested);
        let mut out = Vec::new();

        for block in registry.blocks() {
            for field in block.fields() {
                let category = field.class().change_set_category();
                if requested.contains(category.as_set()) && category != Category::Table {
                    let report = report_index.get(category);
                    let mut changed = vec![false; block.count()];
                    field.class().change_set(report, &mut changed);
                    for (instance, was_changed) in changed.into_iter().enumerate() {
                        if !was_changed {
                            continue;
                        }
                        let name = block.format_name(instance, field.name(), None);
                        match field.class().get(instance) {
                            Ok(GetValue::One(value)) => out.push(ChangeEntry::Value { name, value }),
                            Ok(GetValue::Many(_)) => out.push(ChangeEntry::TableChanged { name }),
                            Err(_) => out.push(ChangeEntry::FormatError { name }),
                        }
                    }
                }

                if requested.contains(CategorySet::TABLE) && category == Category::Table {
                    let report = report_index.get(Category::Table);
                    let mut changed = vec![false; block.count()];
                    field.class().change_set(report, &mut changed);
                    for (instance, was_changed) in changed.into_iter().enumerate() {
                        if was_changed {
                            out.push(ChangeEntry::TableChanged {
                                name: block.format_name(instance, field.name(), None),
                            });
                        }
                    }
                }

                if requested.contains(CategorySet::ATTR) {
                    let report = report_index.get(Category::Attr);
                    for attr_name in field.attr_list() {
                        if let Ok(attr) = field.lookup_attr(attr_name) {
                            if attr.update_index() > report {
                                for instance in 0..block.count() {
                                    let name = block.format_name(instance, field.name(), Some(attr_name));
                                    match attr.format(instance) {
                                        Ok(value) => out.push(ChangeEntry::AttrValue { name, value }),
                                        Err(_) => out.push(ChangeEntry::FormatError { name }),
                                    }
                                }
                            }
                        } else {
                            // Class-level attributes (CAPTURE/CAPTURE_INDEX)
                            // bypass the generic Attribute table and are
                            // tracked per instance on the class itself.
                            for instance in 0..block.count() {
                                let Some(update_index) = field.class().attr_update_index(instance, attr_name)
                                else {
                                    continue;
                                };
                                if update_index <= report {
                                    continue;
                                }
                                let name = block.format_name(instance, field.name(), Some(attr_name));
                                match field.class().capture_get(instance, attr_name) {
                                    Ok(value) => out.push(ChangeEntry::AttrValue { name, value }),
                                    Err(_) => out.push(ChangeEntry::FormatError { name }),
                                }
                            }
                        }
                    }
                }
            }
        }

        out
    }

    /// Mirrors `report`'s walk but stops at the first change, without
    /// collecting anything (§4.8: `check_change_set`).
    pub fn has_any_change(&mut self, registry: &Registry, clock: &ChangeClock, requested: CategorySet) -> bool {
        !self.report(registry, clock, requested).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::registry::{Block, Field};
    use crate::types::Type;
    use block_hw::SimulatedHwBus;

    #[test]
    fn a_write_is_reported_exactly_once() {
        let mut registry = Registry::new();
        let mut block = Block::new("SEQ", 1, 0);
        let mut class = Class::param(1, Some(Type::Uint { bits: 8 }));
        class.set_register_offset(0, &[0]).unwrap();
        block.add_field(Field::new("ENABLE", 0, class)).unwrap();
        registry.create_block(block).unwrap();

        let clock = ChangeClock::new();
        let bus = SimulatedHwBus::new();
        let mut tracker = ChangeTracker::new();

        // Baseline report before any write should be empty.
        let baseline = tracker.report(&registry, &clock, CategorySet::CONFIG);
        assert!(baseline.is_empty());

        registry
            .lookup_block("SEQ")
            .unwrap()
            .field("ENABLE")
            .unwrap()
            .class()
            .put(0, "1", 0, &bus, &clock)
            .unwrap();

        let changes = tracker.report(&registry, &clock, CategorySet::CONFIG);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            ChangeEntry::Value { name, value } => {
                assert_eq!(name, "SEQ.ENABLE");
                assert_eq!(value, "1");
            }
            _ => panic!("expected a value change"),
        }

        // A second report with no intervening write sees nothing new.
        let again = tracker.report(&registry, &clock, CategorySet::CONFIG);
        assert!(again.is_empty());
    }

    #[test]
    fn a_capture_toggle_is_reported_under_attr() {
        use crate::capture::BitPosCapture;
        use std::sync::Arc;

        let mut registry = Registry::new();
        let mut block = Block::new("TTLIN", 1, 0);
        let capture = Arc::new(BitPosCapture::new());
        block
            .add_field(Field::new("VAL", 0, Class::bit_out(vec![0], capture.clone())))
            .unwrap();
        registry.create_block(block).unwrap();

        let clock = ChangeClock::new();
        let mut tracker = ChangeTracker::new();

        let baseline = tracker.report(&registry, &clock, CategorySet::ATTR);
        assert!(baseline.is_empty());

        registry
            .lookup_block("TTLIN")
            .unwrap()
            .field("VAL")
            .unwrap()
            .class()
            .capture_put(0, "CAPTURE", "1", &clock)
            .unwrap();

        // CAPTURE and CAPTURE_INDEX both derive from the same mask, so both
        // are reported as changed by the same toggle.
        let changes = tracker.report(&registry, &clock, CategorySet::ATTR);
        assert_eq!(changes.len(), 2);
        match &changes[0] {
            ChangeEntry::AttrValue { name, value } => {
                assert_eq!(name, "TTLIN.VAL.CAPTURE");
                assert_eq!(value, "1");
            }
            _ => panic!("expected an attr value change"),
        }
        match &changes[1] {
            ChangeEntry::AttrValue { name, value } => {
                assert_eq!(name, "TTLIN.VAL.CAPTURE_INDEX");
                assert_eq!(value, "0:0");
            }
            _ => panic!("expected an attr value change"),
        }
    }
}
