//! SID Register Definitions
//!
//! The chip decodes 5 address bits. Three voices own seven registers each
//! (0x00-0x14), four shared registers control filter and volume (0x15-0x18),
//! four registers are read-only (0x19-0x1C) and the rest are unused.

use std::fmt;

use bitflags::bitflags;

/// Number of addressable registers
pub const REGISTER_COUNT: usize = 32;

/// Number of voices
pub const VOICE_COUNT: usize = 3;

/// Registers per voice
pub const VOICE_STRIDE: u8 = 7;

/// SID Register Address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Voice frequency (low byte)
    FreqLo(u8),
    /// Voice frequency (high byte)
    FreqHi(u8),
    /// Voice pulse width (low byte)
    PwLo(u8),
    /// Voice pulse width (high nibble)
    PwHi(u8),
    /// Voice control (waveform, test, ring, sync, gate)
    Control(u8),
    /// Voice attack/decay
    AttackDecay(u8),
    /// Voice sustain/release
    SustainRelease(u8),
    /// Filter cutoff (low 3 bits) - 0x15
    FcLo,
    /// Filter cutoff (high 8 bits) - 0x16
    FcHi,
    /// Resonance and filter routing - 0x17
    ResFilt,
    /// Filter mode and master volume - 0x18
    ModeVol,
    /// Paddle X - 0x19
    PotX,
    /// Paddle Y - 0x1A
    PotY,
    /// Voice 3 oscillator output - 0x1B
    Osc3,
    /// Voice 3 envelope output - 0x1C
    Env3,
    /// Unmapped address (0x1D-0x1F)
    Unused(u8),
}

impl Register {
    /// Decode an address; only the low 5 bits are significant
    pub fn from_addr(addr: u8) -> Self {
        let addr = addr & 0x1f;
        match addr {
            0x00..=0x14 => {
                let voice = addr / VOICE_STRIDE;
                match addr % VOICE_STRIDE {
                    0 => Register::FreqLo(voice),
                    1 => Register::FreqHi(voice),
                    2 => Register::PwLo(voice),
                    3 => Register::PwHi(voice),
                    4 => Register::Control(voice),
                    5 => Register::AttackDecay(voice),
                    _ => Register::SustainRelease(voice),
                }
            }
            0x15 => Register::FcLo,
            0x16 => Register::FcHi,
            0x17 => Register::ResFilt,
            0x18 => Register::ModeVol,
            0x19 => Register::PotX,
            0x1A => Register::PotY,
            0x1B => Register::Osc3,
            0x1C => Register::Env3,
            other => Register::Unused(other),
        }
    }

    /// Get the register address value
    pub fn addr(&self) -> u8 {
        let voice_reg = |voice: u8, offset: u8| voice * VOICE_STRIDE + offset;
        match *self {
            Register::FreqLo(v) => voice_reg(v, 0),
            Register::FreqHi(v) => voice_reg(v, 1),
            Register::PwLo(v) => voice_reg(v, 2),
            Register::PwHi(v) => voice_reg(v, 3),
            Register::Control(v) => voice_reg(v, 4),
            Register::AttackDecay(v) => voice_reg(v, 5),
            Register::SustainRelease(v) => voice_reg(v, 6),
            Register::FcLo => 0x15,
            Register::FcHi => 0x16,
            Register::ResFilt => 0x17,
            Register::ModeVol => 0x18,
            Register::PotX => 0x19,
            Register::PotY => 0x1A,
            Register::Osc3 => 0x1B,
            Register::Env3 => 0x1C,
            Register::Unused(a) => a,
        }
    }

    /// Registers served by the chip rather than by the register file
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Register::PotX | Register::PotY | Register::Osc3 | Register::Env3
        )
    }

    /// Voice owning this register, if any
    pub fn voice(&self) -> Option<usize> {
        match *self {
            Register::FreqLo(v)
            | Register::FreqHi(v)
            | Register::PwLo(v)
            | Register::PwHi(v)
            | Register::Control(v)
            | Register::AttackDecay(v)
            | Register::SustainRelease(v) => Some(v as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.addr();
        match self {
            Register::FreqLo(v) => write!(f, "${addr:02X} (Voice {} Frequency Low)", v + 1),
            Register::FreqHi(v) => write!(f, "${addr:02X} (Voice {} Frequency High)", v + 1),
            Register::PwLo(v) => write!(f, "${addr:02X} (Voice {} Pulse Width Low)", v + 1),
            Register::PwHi(v) => write!(f, "${addr:02X} (Voice {} Pulse Width High)", v + 1),
            Register::Control(v) => write!(f, "${addr:02X} (Voice {} Control)", v + 1),
            Register::AttackDecay(v) => write!(f, "${addr:02X} (Voice {} Attack/Decay)", v + 1),
            Register::SustainRelease(v) => {
                write!(f, "${addr:02X} (Voice {} Sustain/Release)", v + 1)
            }
            Register::FcLo => write!(f, "$15 (Filter Cutoff Low)"),
            Register::FcHi => write!(f, "$16 (Filter Cutoff High)"),
            Register::ResFilt => write!(f, "$17 (Resonance/Routing)"),
            Register::ModeVol => write!(f, "$18 (Mode/Volume)"),
            Register::PotX => write!(f, "$19 (Paddle X)"),
            Register::PotY => write!(f, "$1A (Paddle Y)"),
            Register::Osc3 => write!(f, "$1B (Oscillator 3)"),
            Register::Env3 => write!(f, "$1C (Envelope 3)"),
            Register::Unused(_) => write!(f, "${addr:02X} (Unused)"),
        }
    }
}

bitflags! {
    /// Voice control register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        /// Envelope gate
        const GATE = 0x01;
        /// Hard sync with the previous voice
        const SYNC = 0x02;
        /// Ring modulation with the previous voice
        const RING = 0x04;
        /// Oscillator test/reset
        const TEST = 0x08;
        /// Triangle waveform
        const TRIANGLE = 0x10;
        /// Sawtooth waveform
        const SAWTOOTH = 0x20;
        /// Pulse waveform
        const PULSE = 0x40;
        /// Noise waveform
        const NOISE = 0x80;
    }
}

bitflags! {
    /// Filter routing bits of register 0x17 (high nibble is resonance)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RoutingFlags: u8 {
        /// Voice 1 through filter
        const FILT1 = 0x01;
        /// Voice 2 through filter
        const FILT2 = 0x02;
        /// Voice 3 through filter
        const FILT3 = 0x04;
        /// External input through filter
        const FILT_EXT = 0x08;
    }
}

bitflags! {
    /// Mode bits of register 0x18 (low nibble is volume)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u8 {
        /// Low-pass output
        const LP = 0x10;
        /// Band-pass output
        const BP = 0x20;
        /// High-pass output
        const HP = 0x40;
        /// Disconnect voice 3 when not filtered
        const VOICE3_OFF = 0x80;
    }
}

impl RoutingFlags {
    /// Routing bit for a voice (0-2)
    pub fn for_voice(voice: usize) -> Self {
        RoutingFlags::from_bits_truncate(1 << voice)
    }
}

/// Raw register file (32 bytes)
///
/// Holds the bytes exactly as the host wrote them. Quirk corrections never
/// land here.
#[derive(Debug, Clone, Copy)]
pub struct RegisterFile {
    /// Register values 0x00-0x1F
    pub registers: [u8; REGISTER_COUNT],
}

impl RegisterFile {
    /// Create a new register file with all values set to 0
    pub fn new() -> Self {
        RegisterFile {
            registers: [0; REGISTER_COUNT],
        }
    }

    /// Read a register value
    pub fn read(&self, addr: u8) -> u8 {
        self.registers[(addr & 0x1f) as usize]
    }

    /// Write a register value
    pub fn write(&mut self, addr: u8, value: u8) {
        self.registers[(addr & 0x1f) as usize] = value;
    }

    /// Clear all registers
    pub fn clear(&mut self) {
        self.registers = [0; REGISTER_COUNT];
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
