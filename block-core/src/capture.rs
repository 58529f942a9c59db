//! The shared bit/position capture bus (§3, §4.6), grounded directly in
//! the original's `capture.c`: a process-wide mirror of the hardware's
//! 1024-bit and 32-position buses, each entry's last-change index, the
//! capture mask that selects which entries are streamed out over the data
//! connection, and the derived capture-index ordinals.

use std::sync::Mutex;

use block_hw::{HwBus, BIT_BUS_COUNT, BIT_BUS_GROUPS, POS_BUS_COUNT};

use crate::change_clock::ChangeClock;

/// Sentinel capture-index value for an entry not currently selected for
/// capture.
pub const NOT_CAPTURED: i32 = -1;

struct BitState {
    value: [bool; BIT_BUS_COUNT],
    update_index: [u64; BIT_BUS_COUNT],
    capture_mask: [bool; BIT_BUS_COUNT],
    /// One ordinal per 32-bit group, not per bit (§4.6: "CAPTURE_INDEX ...
    /// for bit_out returns `<group_ordinal>:<bit_in_group>`").
    capture_index: [i32; BIT_BUS_GROUPS],
    /// Last tick at which this entry's CAPTURE/CAPTURE_INDEX attribute
    /// changed, so `*CHANGES.ATTR?` can see mask toggles (§4.5, §4.8).
    attr_update_index: [u64; BIT_BUS_COUNT],
}

struct PosState {
    value: [u32; POS_BUS_COUNT],
    update_index: [u64; POS_BUS_COUNT],
    capture_mask: [bool; POS_BUS_COUNT],
    capture_index: [i32; POS_BUS_COUNT],
    attr_update_index: [u64; POS_BUS_COUNT],
}

/// Encapsulates all process-global capture state behind one handle so tests
/// can instantiate independent instances rather than sharing hidden global
/// mutable state (Design Note, §9).
pub struct BitPosCapture {
    bits: Mutex<BitState>,
    positions: Mutex<PosState>,
}

impl BitPosCapture {
    pub fn new() -> Self {
        BitPosCapture {
            bits: Mutex::new(BitState {
                value: [false; BIT_BUS_COUNT],
                update_index: [0; BIT_BUS_COUNT],
                capture_mask: [false; BIT_BUS_COUNT],
                capture_index: [NOT_CAPTURED; BIT_BUS_GROUPS],
                attr_update_index: [0; BIT_BUS_COUNT],
            }),
            positions: Mutex::new(PosState {
                value: [0; POS_BUS_COUNT],
                update_index: [0; POS_BUS_COUNT],
                capture_mask: [false; POS_BUS_COUNT],
                capture_index: [NOT_CAPTURED; POS_BUS_COUNT],
                attr_update_index: [0; POS_BUS_COUNT],
            }),
        }
    }

    /// Pulls the latest bit/position values from `bus`, updating
    /// `update_index[i]` to `clock`'s current tick for every entry that
    /// changed and whose existing index is older (Invariant 3: never
    /// decreases).
    pub fn refresh(&self, bus: &dyn HwBus, clock: &ChangeClock) {
        let tick = clock.tick();
        let (values, changed) = bus.read_bits();
        let mut bits = self.bits.lock().unwrap();
        for i in 0..BIT_BUS_COUNT {
            bits.value[i] = values[i];
            if changed[i] && tick > bits.update_index[i] {
                bits.update_index[i] = tick;
            }
        }
        drop(bits);

        let (positions, changed) = bus.read_positions();
        let mut pos = self.positions.lock().unwrap();
        for i in 0..POS_BUS_COUNT {
            pos.value[i] = positions[i];
            if changed[i] && tick > pos.update_index[i] {
                pos.update_index[i] = tick;
            }
        }
    }

    pub fn bit_value(&self, index: usize) -> bool {
        self.bits.lock().unwrap().value[index]
    }

    pub fn position_value(&self, index: usize) -> u32 {
        self.positions.lock().unwrap().value[index]
    }

    pub fn bit_update_index(&self, index: usize) -> u64 {
        self.bits.lock().unwrap().update_index[index]
    }

    pub fn position_update_index(&self, index: usize) -> u64 {
        self.positions.lock().unwrap().update_index[index]
    }

    /// Toggles the capture mask bit for `index` and re-derives both
    /// capture-index tables (§4.6: "must be recomputed after every mask
    /// mutation"). Bumps the entry's attribute update index so the change
    /// is visible to `*CHANGES.ATTR?` (§4.5, §4.8).
    pub fn set_bit_captured(&self, index: usize, captured: bool, clock: &ChangeClock) {
        let mut bits = self.bits.lock().unwrap();
        if bits.capture_mask[index] != captured {
            bits.capture_mask[index] = captured;
            bits.attr_update_index[index] = clock.tick();
        }
        drop(bits);
        self.recompute_capture_index();
    }

    pub fn set_position_captured(&self, index: usize, captured: bool, clock: &ChangeClock) {
        let mut pos = self.positions.lock().unwrap();
        if pos.capture_mask[index] != captured {
            pos.capture_mask[index] = captured;
            pos.attr_update_index[index] = clock.tick();
        }
        drop(pos);
        self.recompute_capture_index();
    }

    pub fn is_bit_captured(&self, index: usize) -> bool {
        self.bits.lock().unwrap().capture_mask[index]
    }

    pub fn is_position_captured(&self, index: usize) -> bool {
        self.positions.lock().unwrap().capture_mask[index]
    }

    pub fn bit_attr_update_index(&self, index: usize) -> u64 {
        self.bits.lock().unwrap().attr_update_index[index]
    }

    pub fn position_attr_update_index(&self, index: usize) -> u64 {
        self.positions.lock().unwrap().attr_update_index[index]
    }

    /// Clears every capture mask bit (`*CAPTURE=`).
    pub fn reset_capture(&self, clock: &ChangeClock) {
        let tick = clock.tick();
        {
            let mut bits = self.bits.lock().unwrap();
            for i in 0..BIT_BUS_COUNT {
                if bits.capture_mask[i] {
                    bits.attr_update_index[i] = tick;
                }
            }
            bits.capture_mask = [false; BIT_BUS_COUNT];
        }
        {
            let mut pos = self.positions.lock().unwrap();
            for i in 0..POS_BUS_COUNT {
                if pos.capture_mask[i] {
                    pos.attr_update_index[i] = tick;
                }
            }
            pos.capture_mask = [false; POS_BUS_COUNT];
        }
        self.recompute_capture_index();
    }

    /// Returns `(group_ordinal, bit_in_group)` for a bit's group if
    /// captured, else `None`.
    pub fn bit_capture_index(&self, index: usize) -> Option<(i32, usize)> {
        let bits = self.bits.lock().unwrap();
        let group = index / 32;
        let bit_in_group = index % 32;
        let ordinal = bits.capture_index[group];
        if ordinal == NOT_CAPTURED {
            None
        } else {
            Some((ordinal, bit_in_group))
        }
    }

    pub fn position_capture_index(&self, index: usize) -> Option<i32> {
        let pos = self.positions.lock().unwrap();
        let ordinal = pos.capture_index[index];
        if ordinal == NOT_CAPTURED {
            None
        } else {
            Some(ordinal)
        }
    }

    /// The prefix-assignment algorithm from `capture.c`'s
    /// `update_capture_index`: positions first in index order, then
    /// non-zero bit groups in index order, each family assigning dense
    /// ordinals starting from 0.
    fn recompute_capture_index(&self) {
        let mut pos = self.positions.lock().unwrap();
        let mut bits = self.bits.lock().unwrap();

        let mut next = 0i32;
        for i in 0..POS_BUS_COUNT {
            pos.capture_index[i] = if pos.capture_mask[i] {
                let ordinal = next;
                next += 1;
                ordinal
            } else {
                NOT_CAPTURED
            };
        }
        for group in 0..BIT_BUS_GROUPS {
            let group_has_capture = (group * 32..group * 32 + 32).any(|i| bits.capture_mask[i]);
            bits.capture_index[group] = if group_has_capture {
                let ordinal = next;
                next += 1;
                ordinal
            } else {
                NOT_CAPTURED
            };
        }
    }

    /// Every captured position's name followed by `*BITS<g>` for each
    /// captured bit group, in capture-index order (`*CAPTURE?`).
    pub fn capture_list(&self, position_name: impl Fn(usize) -> Option<String>) -> Vec<String> {
        let pos = self.positions.lock().unwrap();
        let bits = self.bits.lock().unwrap();
        let mut entries: Vec<(i32, String)> = Vec::new();
        for i in 0..POS_BUS_COUNT {
            if pos.capture_mask[i] {
                if let Some(name) = position_name(i) {
                    entries.push((pos.capture_index[i], name));
                }
            }
        }
        for group in 0..BIT_BUS_GROUPS {
            if bits.capture_index[group] != NOT_CAPTURED {
                entries.push((bits.capture_index[group], format!("*BITS{}", group)));
            }
        }
        entries.sort_by_key(|(ordinal, _)| *ordinal);
        entries.into_iter().map(|(_, name)| name).collect()
    }
}

impl Default for BitPosCapture {
    fn default() -> Self {
        Self::new()
    }
}
