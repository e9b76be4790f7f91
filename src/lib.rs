//! MOS 6581/8580 SID chip emulation core
//!
//! A cycle-accurate core for replaying recorded SID register streams. It covers
//! the two halves of the chip that decide what a register write sounds like:
//! the revision-specific quirk engine that rewrites bytes before they reach the
//! generators, and the nonlinear analog filter model that turns those bytes
//! into output levels.
//!
//! # Features
//! - Data-driven register quirk engine (voice muting, trigger waveforms,
//!   filter bypass, volume-digi muting, envelope-disable bookkeeping)
//! - Op-amp DC operating point solver and precomputed filter lookup tables
//! - Per-revision integrators (6581 VCR/snake model, 8580 switched capacitor)
//! - Scheduler-locked emulation frontend with an access clock
//! - Hardware-backed instances driven through an abstract vendor driver
//!
//! # Crate feature flags
//! - `emulator` (default): analog model, filter stage and `AnalogPipeline`
//! - `hardware` (default): hardware-backed `HardSid` instances
//!
//! # Backend Trait
//! The `SidBackend` trait allows the emulated chip and a hardware-backed chip
//! to be used interchangeably by the host.
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "emulator")]
//! # {
//! use sidemu::{AnalogPipeline, ChipRevision, SidBackend, SidEmu};
//!
//! let pipeline = AnalogPipeline::new(ChipRevision::Mos8580).unwrap();
//! let mut sid = SidEmu::new(ChipRevision::Mos8580, pipeline);
//! sid.set_trigger_waves(true);
//! sid.write(0x04, 0x41); // pulse + gate, forwarded as 0x21
//! sid.write(0x18, 0x0F);
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend; // Backend trait abstraction
pub mod config;
pub mod observer;
pub mod scheduler;
pub mod sid; // SID chip emulation (core)

#[cfg(feature = "hardware")]
pub mod hardware; // Hardware-backed SID instances

/// Error types for SID model construction and configuration
///
/// Register access never fails at runtime; everything here is raised while
/// building a revision's model or parsing configuration.
#[derive(thiserror::Error, Debug)]
pub enum SidError {
    /// Physical parameter set rejected before table construction
    #[error("Invalid physical parameters: {0}")]
    InvalidParameters(String),

    /// A computed voltage fell outside the op-amp operating range
    #[error("Voltage {value} V outside operating range [{vmin}, {vmax}]")]
    OutOfRange {
        /// Offending voltage
        value: f64,
        /// Lower bound of the operating range
        vmin: f64,
        /// Upper bound of the operating range
        vmax: f64,
    },

    /// The op-amp solver did not settle
    #[error("Op-amp solver did not converge (n = {n}, vin = {vin} V)")]
    NoConvergence {
        /// Effective resistor ratio
        n: f64,
        /// Input voltage
        vin: f64,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for model construction and configuration
pub type Result<T> = std::result::Result<T, SidError>;

// Public API exports
pub use backend::{ChipCore, SidBackend};
pub use config::EmulationConfig;
pub use observer::{WriteEvent, WriteObserver};
pub use scheduler::{
    EventClock, EventId, EventPhase, EventScheduler, SchedulerHandle, SchedulerLease,
};
pub use sid::{ChipRevision, QuirkState, Register, RegisterFile, SidEmu, SidPipeline};

#[cfg(feature = "emulator")]
pub use sid::{AnalogPipeline, FilterModel};

#[cfg(feature = "hardware")]
pub use hardware::{HardSid, HardSidBuilder, HardwareDriver};
