//! SID chip emulation
//!
//! Register map, revisions, the quirk engine and the emulation frontend are
//! always available. The analog model (op-amp solver, lookup tables,
//! integrators, filter stage) is behind the `emulator` feature.

pub mod emu;
pub mod pipeline;
pub mod quirks;
pub mod registers;
pub mod revision;

#[cfg(feature = "emulator")]
pub mod dac;
#[cfg(feature = "emulator")]
pub mod filter;
#[cfg(feature = "emulator")]
pub mod integrator;
#[cfg(feature = "emulator")]
pub mod model;
#[cfg(feature = "emulator")]
pub mod opamp;
#[cfg(feature = "emulator")]
pub mod spline;

pub use emu::SidEmu;
pub use pipeline::SidPipeline;
pub use quirks::{QuirkRules, QuirkState};
pub use registers::{ControlFlags, ModeFlags, Register, RegisterFile, RoutingFlags};
pub use revision::{ChipRevision, PhysicalParams};

#[cfg(feature = "emulator")]
pub use filter::Filter;
#[cfg(feature = "emulator")]
pub use model::FilterModel;
#[cfg(feature = "emulator")]
pub use pipeline::AnalogPipeline;
