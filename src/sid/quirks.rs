//! Register quirk engine
//!
//! Every register write passes through [`apply`] before it reaches the
//! generators. Depending on the per-instance [`QuirkState`], the byte may be
//! rewritten to mute a voice, resolve an ambiguous combined waveform, bypass
//! the filter or silence volume-register digis.
//!
//! The corrections themselves are data. Each revision owns a [`QuirkRules`]
//! row describing what happens per register class; supporting a new revision
//! means adding a row, not another code path.

use log::trace;

use super::registers::{ControlFlags, Register, RoutingFlags, VOICE_COUNT};
use super::revision::ChipRevision;
use crate::config::EmulationConfig;

/// Primitive byte operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    /// `data & mask`
    And(u8),
    /// `data | mask`
    Or(u8),
    /// `data ^ mask`
    Xor(u8),
    /// Replace the byte
    Set(u8),
}

impl BitOp {
    /// Apply to a byte
    #[inline]
    pub fn apply(self, data: u8) -> u8 {
        match self {
            BitOp::And(mask) => data & mask,
            BitOp::Or(mask) => data | mask,
            BitOp::Xor(mask) => data ^ mask,
            BitOp::Set(value) => value,
        }
    }
}

/// Precondition of a conditional rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Any of the bits is set
    AnySet(u8),
    /// `data & mask == value`
    Masked {
        /// Bits to compare
        mask: u8,
        /// Expected value of those bits
        value: u8,
    },
}

impl Condition {
    /// Whether the byte satisfies the condition
    #[inline]
    pub fn matches(self, data: u8) -> bool {
        match self {
            Condition::AnySet(bits) => data & bits != 0,
            Condition::Masked { mask, value } => data & mask == value,
        }
    }
}

/// One step of the trigger-waveform substitution table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rewrite {
    /// When to rewrite
    pub when: Condition,
    /// How to rewrite
    pub op: BitOp,
}

/// Register classes the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    /// Voice control register of a voice
    VoiceControl(usize),
    /// Pulse-width register of a voice
    PulseWidth(usize),
    /// Resonance / routing
    ResFilt,
    /// Mode / volume
    ModeVol,
    /// Passed through untouched
    Other,
}

impl RegisterClass {
    /// Classify a register address
    pub fn of(addr: u8) -> Self {
        match Register::from_addr(addr) {
            Register::Control(v) => RegisterClass::VoiceControl(usize::from(v)),
            Register::PwLo(v) | Register::PwHi(v) => RegisterClass::PulseWidth(usize::from(v)),
            Register::ResFilt => RegisterClass::ResFilt,
            Register::ModeVol => RegisterClass::ModeVol,
            _ => RegisterClass::Other,
        }
    }
}

/// Correction table of one chip revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuirkRules {
    /// Revision the row belongs to
    pub revision: ChipRevision,
    /// Applied to a muted voice's control byte (gate off)
    pub mute_gate: BitOp,
    /// Trigger-waveform substitutions, applied in order
    pub trigger_waves: &'static [Rewrite],
    /// Pulse-width rewrite while trigger waveforms are active, if any
    pub trigger_pulse_width: Option<BitOp>,
    /// Resonance/routing byte while the filter is disabled
    pub filter_bypass: BitOp,
    /// Volume nibble override while volume digis are muted
    pub digi_mute: BitOp,
}

const GATE: u8 = ControlFlags::GATE.bits();
const TRIANGLE: u8 = ControlFlags::TRIANGLE.bits();
const SAWTOOTH: u8 = ControlFlags::SAWTOOTH.bits();
const PULSE: u8 = ControlFlags::PULSE.bits();
const WAVEFORMS: u8 = TRIANGLE | SAWTOOTH | PULSE | ControlFlags::NOISE.bits();

/// Trigger-waveform substitutions observed on both revisions
const TRIGGER_WAVES: [Rewrite; 3] = [
    // Sawtooth wins over triangle and pulse
    Rewrite {
        when: Condition::AnySet(SAWTOOTH),
        op: BitOp::And(!(TRIANGLE | PULSE)),
    },
    // Lone pulse reads back as sawtooth
    Rewrite {
        when: Condition::Masked {
            mask: WAVEFORMS,
            value: PULSE,
        },
        op: BitOp::Xor(PULSE | SAWTOOTH),
    },
    // Triangle + pulse collapses to triangle
    Rewrite {
        when: Condition::Masked {
            mask: TRIANGLE | PULSE,
            value: TRIANGLE | PULSE,
        },
        op: BitOp::And(!PULSE),
    },
];

static QUIRK_TABLE: [QuirkRules; 2] = [
    QuirkRules {
        revision: ChipRevision::Mos6581,
        mute_gate: BitOp::And(!GATE),
        trigger_waves: &TRIGGER_WAVES,
        trigger_pulse_width: None,
        filter_bypass: BitOp::Set(0x00),
        digi_mute: BitOp::Or(0x0f),
    },
    QuirkRules {
        revision: ChipRevision::Mos8580,
        mute_gate: BitOp::And(!GATE),
        trigger_waves: &TRIGGER_WAVES,
        trigger_pulse_width: None,
        filter_bypass: BitOp::Set(0x00),
        digi_mute: BitOp::Or(0x0f),
    },
];

impl QuirkRules {
    /// Rules for a revision
    pub fn for_revision(revision: ChipRevision) -> &'static QuirkRules {
        QUIRK_TABLE
            .iter()
            .find(|rules| rules.revision == revision)
            .unwrap_or(&QUIRK_TABLE[0])
    }

    /// Correct one byte of a register class, updating envelope bookkeeping
    pub fn correct(&self, class: RegisterClass, data: u8, state: &mut QuirkState) -> u8 {
        match class {
            RegisterClass::VoiceControl(voice) => {
                let mut data = data;
                if state.is_voice_muted(voice) {
                    // Keep the envelope running so the gate-off actually releases
                    state.env_disable = false;
                    data = self.mute_gate.apply(data);
                } else if state.envelope_disabled {
                    // Sticky until a muted voice is written
                    state.env_disable = true;
                }
                if state.trigger_waves(voice) {
                    // Each rule sees the result of the previous one
                    for rule in self.trigger_waves {
                        if rule.when.matches(data) {
                            data = rule.op.apply(data);
                        }
                    }
                }
                data
            }
            RegisterClass::PulseWidth(voice) => match self.trigger_pulse_width {
                Some(op) if state.trigger_waves(voice) => op.apply(data),
                _ => data,
            },
            RegisterClass::ResFilt => {
                if state.filter_disabled {
                    return self.filter_bypass.apply(data);
                }
                let blocked = state
                    .not_filtered
                    .iter()
                    .enumerate()
                    .filter(|(_, &blocked)| blocked)
                    .fold(RoutingFlags::empty(), |acc, (v, _)| acc | RoutingFlags::for_voice(v));
                data & !blocked.bits()
            }
            RegisterClass::ModeVol => {
                if state.is_voice_muted(3) {
                    self.digi_mute.apply(data)
                } else {
                    data
                }
            }
            RegisterClass::Other => data,
        }
    }
}

/// Per-instance quirk flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuirkState {
    muted: [bool; 4],
    filter_disabled: bool,
    trigger_waves: [bool; VOICE_COUNT],
    envelope_disabled: bool,
    kinks_disabled: bool,
    trigger_filter: bool,
    not_filtered: [bool; VOICE_COUNT],
    env_disable: bool,
}

impl QuirkState {
    /// All quirks off
    pub fn new() -> Self {
        Self::default()
    }

    /// Mute a voice (0-2) or volume digis (3); other indices are ignored
    pub fn set_voice_mute(&mut self, voice: usize, mute: bool) {
        if let Some(m) = self.muted.get_mut(voice) {
            *m = mute;
        }
    }

    /// Whether a voice (0-2) or volume digis (3) are muted
    pub fn is_voice_muted(&self, voice: usize) -> bool {
        self.muted.get(voice).copied().unwrap_or(false)
    }

    /// Enable or bypass the filter
    pub fn set_filter(&mut self, enable: bool) {
        self.filter_disabled = !enable;
    }

    /// Whether the filter is bypassed
    pub fn is_filter_disabled(&self) -> bool {
        self.filter_disabled
    }

    /// Allow (`true`) or block filter routing of one voice
    pub fn set_voice_filter(&mut self, voice: usize, filtered: bool) {
        if let Some(f) = self.not_filtered.get_mut(voice) {
            *f = !filtered;
        }
    }

    /// Whether a voice is blocked from the filter
    pub fn is_voice_unfiltered(&self, voice: usize) -> bool {
        self.not_filtered.get(voice).copied().unwrap_or(false)
    }

    /// Enable or disable envelopes
    pub fn set_envelope(&mut self, enable: bool) {
        self.envelope_disabled = !enable;
    }

    /// Whether envelopes are disabled
    pub fn is_envelope_disabled(&self) -> bool {
        self.envelope_disabled
    }

    /// Enable or disable the kinked cutoff DAC
    pub fn set_kinks(&mut self, enable: bool) {
        self.kinks_disabled = !enable;
    }

    /// Whether the kinked cutoff DAC is disabled
    pub fn is_kinks_disabled(&self) -> bool {
        self.kinks_disabled
    }

    /// Trigger-filter emulation switch
    ///
    /// Stored and reported to observers; no correction depends on it yet.
    pub fn set_trigger_filter(&mut self, enable: bool) {
        self.trigger_filter = enable;
    }

    /// Whether trigger-filter emulation is enabled
    pub fn is_trigger_filter_enabled(&self) -> bool {
        self.trigger_filter
    }

    /// Trigger-waveform emulation for all voices
    pub fn set_trigger_waves(&mut self, enable: bool) {
        self.trigger_waves = [enable; VOICE_COUNT];
    }

    /// Trigger-waveform emulation for one voice; other indices are ignored
    pub fn set_voice_trigger_waves(&mut self, voice: usize, enable: bool) {
        if let Some(t) = self.trigger_waves.get_mut(voice) {
            *t = enable;
        }
    }

    /// Whether trigger waveforms are emulated on a voice
    pub fn trigger_waves(&self, voice: usize) -> bool {
        self.trigger_waves.get(voice).copied().unwrap_or(false)
    }

    /// Whether trigger waveforms are emulated on any voice
    pub fn any_trigger_waves(&self) -> bool {
        self.trigger_waves.iter().any(|&t| t)
    }

    /// Envelope-disable state after the last voice control write
    pub fn env_disable(&self) -> bool {
        self.env_disable
    }
}

impl From<&EmulationConfig> for QuirkState {
    fn from(config: &EmulationConfig) -> Self {
        let mut state = QuirkState {
            muted: config.muted,
            trigger_waves: config.trigger_waves,
            ..QuirkState::default()
        };
        state.set_filter(config.filter);
        state.set_envelope(config.envelope);
        state.set_kinks(config.kinks);
        state.set_trigger_filter(config.trigger_filter);
        for (voice, &blocked) in config.not_filtered.iter().enumerate() {
            state.set_voice_filter(voice, !blocked);
        }
        state
    }
}

/// Result of intercepting one write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuirkOutcome {
    /// Byte to forward downstream
    pub corrected: u8,
    /// Trigger-waveform flag reported to observers
    pub trigger_waves: bool,
}

/// Correct a register write for the given revision
///
/// `addr` must already be masked to the register range.
pub fn apply(addr: u8, raw: u8, state: &mut QuirkState, revision: ChipRevision) -> QuirkOutcome {
    let class = RegisterClass::of(addr);
    let corrected = QuirkRules::for_revision(revision).correct(class, raw, state);

    if corrected != raw {
        trace!(
            "quirk {} {}: {raw:#04x} -> {corrected:#04x}",
            revision.name(),
            Register::from_addr(addr)
        );
    }

    let trigger_waves = match Register::from_addr(addr).voice() {
        Some(v) => state.trigger_waves(v),
        None => state.any_trigger_waves(),
    };

    QuirkOutcome {
        corrected,
        trigger_waves,
    }
}
