//! Top-level configuration

use kf_analysis::AnalysisConfig;
use kf_synth::{MixConfig, SynthConfig};
use serde::{Deserialize, Serialize};

use crate::{KeyfallError, KeyfallResult};

/// Settings for every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyfallConfig {
    pub analysis: AnalysisConfig,
    pub synth: SynthConfig,
    pub mix: MixConfig,
    /// Render covers exactly as long as their source signal
    pub trim_to_signal: bool,
}

impl Default for KeyfallConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            synth: SynthConfig::default(),
            mix: MixConfig::default(),
            trim_to_signal: true,
        }
    }
}

impl KeyfallConfig {
    /// Parse JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> KeyfallResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> KeyfallResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_synth(mut self, synth: SynthConfig) -> Self {
        self.synth = synth;
        self
    }

    pub fn with_mix(mut self, mix: MixConfig) -> Self {
        self.mix = mix;
        self
    }

    pub fn validate(&self) -> KeyfallResult<()> {
        self.analysis.validate()?;
        self.synth.validate()?;
        self.mix.validate()?;
        if self.trim_to_signal && self.mix.target_duration.is_some() {
            return Err(KeyfallError::Config(
                "target duration conflicts with trim_to_signal".to_string(),
            ));
        }
        Ok(())
    }
}
