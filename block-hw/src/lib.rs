//! The hardware register access layer.
//!
//! This crate states the interface the field/class runtime needs from the
//! underlying FPGA-style register bus (`HwBus`) and ships one concrete,
//! software-backed implementation (`SimulatedHwBus`) so the rest of the
//! repository is runnable and testable without real hardware attached.
//! Nothing here is part of the core's contract beyond the trait: the core
//! only ever holds `&dyn HwBus`.

mod simulated;

pub use simulated::SimulatedHwBus;

/// Number of bits carried on the shared bit bus.
pub const BIT_BUS_COUNT: usize = 1024;
/// Number of 32-bit groups the bit bus is organised into for capture.
pub const BIT_BUS_GROUPS: usize = BIT_BUS_COUNT / 32;
/// Number of positions carried on the shared position bus.
pub const POS_BUS_COUNT: usize = 32;

#[remain::sorted]
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum HwError {
    #[error("bit index {0} out of range")]
    BitIndexOutOfRange(usize),
    #[error("hardware register access failed: {0}")]
    RegisterAccessFailed(String),
}

pub type Result<T> = std::result::Result<T, HwError>;

/// Interface between the field/class runtime and the hardware register bus.
///
/// `read_bits`/`read_positions` are polled from a single refresh path (see
/// `block_core::capture::BitPosCapture::refresh`), so their "changed since
/// last call" vectors describe the interval since this `HwBus`'s previous
/// poll, not since any particular caller's previous poll.
pub trait HwBus: Send + Sync {
    /// Reads the current value of the register at `block_base + offset`.
    fn read_register(&self, block_base: u32, offset: u32) -> Result<u32>;

    /// Writes `value` to the register at `block_base + offset`.
    fn write_register(&self, block_base: u32, offset: u32, value: u32) -> Result<()>;

    /// Reads the full bit bus: current values, and which bits changed since
    /// this method was last called.
    fn read_bits(&self) -> (Vec<bool>, Vec<bool>);

    /// Reads the full position bus: current values, and which positions
    /// changed since this method was last called.
    fn read_positions(&self) -> (Vec<u32>, Vec<bool>);

    /// Pushes the current bit capture mask through to hardware. Not called
    /// by the core itself (see DESIGN.md); exists for a future data-capture
    /// "arm" path.
    fn write_bit_capture_mask(&self, _mask: &[u32]) {}

    /// Pushes the current position capture mask through to hardware. Not
    /// called by the core itself (see DESIGN.md).
    fn write_position_capture_mask(&self, _mask: u32) {}
}
