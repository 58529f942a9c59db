//! Field/block runtime: change tracking, the capture bus, mux lookups,
//! value types, and the class contract that ties them together. This
//! crate has no knowledge of the wire protocol or of any particular
//! `HwBus` implementation — it depends only on `block_hw`'s trait.

mod attribute;
mod capture;
mod change_category;
mod change_clock;
mod change_tracker;
mod class;
mod enumeration;
mod error;
mod mux_lookup;
mod registry;
mod table_sink;
mod types;

pub use attribute::Attribute;
pub use capture::BitPosCapture;
pub use change_category::{Category, CategorySet, ConnectionChangeState, ReportIndex};
pub use change_clock::ChangeClock;
pub use change_tracker::{ChangeEntry, ChangeTracker};
pub use class::{CaptureSubtype, Class, GetValue};
pub use enumeration::Enumeration;
pub use error::{CoreError, Result};
pub use mux_lookup::MuxLookup;
pub use registry::{Block, Field, Registry};
pub use table_sink::{CountingSink, DummySink, TableSink};
pub use types::{format_double, ScaledType, Type};

use std::sync::{Arc, Mutex};

use block_hw::HwBus;

/// Bundles the process-wide runtime state a running server needs: the
/// change clock, the capture bus, the two mux lookups, and the field/block
/// registry, plus the hardware bus they all talk through.
///
/// Grouped behind one handle (rather than left as free-standing globals)
/// so integration tests can build independent, isolated instances side by
/// side (Design Note §9).
pub struct Context {
    pub clock: ChangeClock,
    pub capture: Arc<BitPosCapture>,
    pub bit_mux: Arc<Mutex<MuxLookup>>,
    pub pos_mux: Arc<Mutex<MuxLookup>>,
    pub registry: Registry,
    pub bus: Arc<dyn HwBus>,
    /// `block<n>.field` name owning each bit-bus entry, for `*CAPTURE?`/
    /// `*CAPTURE.BITS<g>?` reporting. Populated by the database loader as
    /// `bit_out` fields are created.
    bit_names: Vec<Option<String>>,
    /// Analogous to `bit_names`, for the 32-entry position bus.
    position_names: Vec<Option<String>>,
}

impl Context {
    pub fn new(bus: Arc<dyn HwBus>) -> Self {
        Context {
            clock: ChangeClock::new(),
            capture: Arc::new(BitPosCapture::new()),
            bit_mux: Arc::new(Mutex::new(MuxLookup::new())),
            pos_mux: Arc::new(Mutex::new(MuxLookup::new())),
            registry: Registry::new(),
            bus,
            bit_names: vec![None; block_hw::BIT_BUS_COUNT],
            position_names: vec![None; block_hw::POS_BUS_COUNT],
        }
    }

    /// Records that bit-bus entry `index` is reported under `name`. Called
    /// by the database loader once per `bit_out` field instance.
    pub fn register_bit_name(&mut self, index: usize, name: impl Into<String>) {
        self.bit_names[index] = Some(name.into());
    }

    /// Records that position-bus entry `index` is reported under `name`.
    pub fn register_position_name(&mut self, index: usize, name: impl Into<String>) {
        self.position_names[index] = Some(name.into());
    }

    pub fn bit_name(&self, index: usize) -> Option<&str> {
        self.bit_names[index].as_deref()
    }

    pub fn position_name(&self, index: usize) -> Option<&str> {
        self.position_names[index].as_deref()
    }

    /// Refreshes every register-backed `read` field and the shared
    /// bit/position capture bus from hardware. Called before inspecting
    /// change sets for the `READ`, `BITS`, and `POSITION` categories
    /// (§4.8 step 3).
    pub fn refresh_all(&self) {
        self.capture.refresh(self.bus.as_ref(), &self.clock);
        for block in self.registry.blocks() {
            for field in block.fields() {
                let _ = field.class().refresh(block.base(), self.bus.as_ref(), &self.clock);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_hw::SimulatedHwBus;

    #[test]
    fn context_builds_with_simulated_bus() {
        let ctx = Context::new(Arc::new(SimulatedHwBus::new()));
        assert!(ctx.registry.block_list().is_empty());
        ctx.refresh_all();
    }
}
