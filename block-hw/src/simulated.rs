use std::collections::HashMap;
use std::sync::Mutex;

use crate::HwBus;
use crate::Result;
use crate::BIT_BUS_COUNT;
use crate::POS_BUS_COUNT;

struct BitState {
    values: Vec<bool>,
    pending_changes: Vec<bool>,
}

struct PosState {
    values: Vec<u32>,
    pending_changes: Vec<bool>,
}

/// A software-backed stand-in for the FPGA register bus.
///
/// Registers are a plain address-keyed map; the bit and position buses are
/// `Vec`s guarded by their own mutex, matching the one-mutex-per-bus
/// discipline of the real bus mirrors. `set_bit`/`set_position` simulate an
/// external hardware transition and mark the entry as changed for the next
/// `read_bits`/`read_positions` poll.
pub struct SimulatedHwBus {
    registers: Mutex<HashMap<u64, u32>>,
    bits: Mutex<BitState>,
    positions: Mutex<PosState>,
}

impl SimulatedHwBus {
    pub fn new() -> Self {
        SimulatedHwBus {
            registers: Mutex::new(HashMap::new()),
            bits: Mutex::new(BitState {
                values: vec![false; BIT_BUS_COUNT],
                pending_changes: vec![false; BIT_BUS_COUNT],
            }),
            positions: Mutex::new(PosState {
                values: vec![0; POS_BUS_COUNT],
                pending_changes: vec![false; POS_BUS_COUNT],
            }),
        }
    }

    fn register_key(block_base: u32, offset: u32) -> u64 {
        ((block_base as u64) << 32) | offset as u64
    }

    /// Simulates a hardware-side bit transition, to be observed on the next
    /// `read_bits` call.
    pub fn set_bit(&self, index: usize, value: bool) {
        let mut bits = self.bits.lock().unwrap();
        if bits.values[index] != value {
            bits.values[index] = value;
            bits.pending_changes[index] = true;
        }
    }

    /// Simulates a hardware-side position transition, to be observed on the
    /// next `read_positions` call.
    pub fn set_position(&self, index: usize, value: u32) {
        let mut positions = self.positions.lock().unwrap();
        if positions.values[index] != value {
            positions.values[index] = value;
            positions.pending_changes[index] = true;
        }
    }
}

impl Default for SimulatedHwBus {
    fn default() -> Self {
        Self::new()
    }
}

impl HwBus for SimulatedHwBus {
    fn read_register(&self, block_base: u32, offset: u32) -> Result<u32> {
        let registers = self.registers.lock().unwrap();
        Ok(*registers
            .get(&Self::register_key(block_base, offset))
            .unwrap_or(&0))
    }

    fn write_register(&self, block_base: u32, offset: u32, value: u32) -> Result<()> {
        let mut registers = self.registers.lock().unwrap();
        registers.insert(Self::register_key(block_base, offset), value);
        Ok(())
    }

    fn read_bits(&self) -> (Vec<bool>, Vec<bool>) {
        let mut bits = self.bits.lock().unwrap();
        let changed = std::mem::replace(&mut bits.pending_changes, vec![false; BIT_BUS_COUNT]);
        (bits.values.clone(), changed)
    }

    fn read_positions(&self) -> (Vec<u32>, Vec<bool>) {
        let mut positions = self.positions.lock().unwrap();
        let changed =
            std::mem::replace(&mut positions.pending_changes, vec![false; POS_BUS_COUNT]);
        (positions.values.clone(), changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_round_trip() {
        let bus = SimulatedHwBus::new();
        bus.write_register(0x100, 4, 42).unwrap();
        assert_eq!(bus.read_register(0x100, 4).unwrap(), 42);
        assert_eq!(bus.read_register(0x100, 8).unwrap(), 0);
    }

    #[test]
    fn bit_changes_are_reported_once() {
        let bus = SimulatedHwBus::new();
        bus.set_bit(3, true);
        let (values, changed) = bus.read_bits();
        assert!(values[3]);
        assert!(changed[3]);

        let (_, changed_again) = bus.read_bits();
        assert!(!changed_again[3]);
    }

    #[test]
    fn position_changes_are_reported_once() {
        let bus = SimulatedHwBus::new();
        bus.set_position(5, 99);
        let (values, changed) = bus.read_positions();
        assert_eq!(values[5], 99);
        assert!(changed[5]);

        let (_, changed_again) = bus.read_positions();
        assert!(!changed_again[5]);
    }
}
