//! Emulation configuration
//!
//! Hosts usually keep quirk settings in a settings file. `EmulationConfig`
//! deserializes from JSON and becomes the construction-time defaults of a
//! chip instance; `reset` returns the instance to these values.

use serde::{Deserialize, Serialize};

use crate::sid::ChipRevision;
use crate::{Result, SidError};

/// Chip revision and quirk switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationConfig {
    /// Silicon revision to emulate
    pub revision: ChipRevision,
    /// Muted voices 0-2; index 3 mutes volume-register digis
    pub muted: [bool; 4],
    /// Filter enabled
    pub filter: bool,
    /// Voices blocked from the filter
    pub not_filtered: [bool; 3],
    /// Envelopes enabled
    pub envelope: bool,
    /// Kinked cutoff DAC enabled
    pub kinks: bool,
    /// Trigger-waveform emulation per voice
    pub trigger_waves: [bool; 3],
    /// Trigger-filter emulation
    pub trigger_filter: bool,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            revision: ChipRevision::default(),
            muted: [false; 4],
            filter: true,
            not_filtered: [false; 3],
            envelope: true,
            kinks: true,
            trigger_waves: [false; 3],
            trigger_filter: false,
        }
    }
}

impl EmulationConfig {
    /// Defaults for a revision
    pub fn for_revision(revision: ChipRevision) -> Self {
        Self {
            revision,
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EmulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject contradictory settings
    pub fn validate(&self) -> Result<()> {
        if !self.filter && self.not_filtered.iter().any(|&b| b) {
            return Err(SidError::Config(
                "per-voice filter routing set while the filter is disabled".into(),
            ));
        }
        Ok(())
    }
}
