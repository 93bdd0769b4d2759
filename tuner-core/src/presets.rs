//! Instrument tuning presets.
//!
//! A preset is a named, ordered list of target notes. The registry parses and
//! checks every preset when it is built, so a typo in a preset file is
//! reported at startup instead of as a wrong match while tuning.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, TuningError};
use crate::tuning::{DEFAULT_REFERENCE_HZ, TuningConfiguration};

/// Built-in presets: (name, instrument, notes low to high).
const BUILTIN_PRESETS: [(&str, &str, &[&str]); 3] = [
    ("6-String Standard", "Guitar", &["E2", "A2", "D3", "G3", "B3", "E4"]),
    ("6-String Drop D", "Guitar", &["D2", "A2", "D3", "G3", "B3", "E4"]),
    ("4-String Bass", "Bass", &["E1", "A1", "D2", "G2"]),
];

pub const DEFAULT_PRESET: &str = "6-String Standard";

static BUILTIN: Lazy<PresetRegistry> = Lazy::new(|| {
    let mut registry = PresetRegistry::empty(DEFAULT_REFERENCE_HZ);
    for (name, instrument, notes) in BUILTIN_PRESETS {
        registry
            .insert(name, Some(instrument), notes)
            .unwrap_or_else(|e| panic!("built-in preset {name:?} is invalid: {e}"));
    }
    registry
});

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub instrument: Option<String>,
    pub configuration: TuningConfiguration,
}

impl Preset {
    /// Short label in the form "Guitar, 6-String Standard, Equal tempered".
    pub fn description(&self) -> String {
        match &self.instrument {
            Some(instrument) => format!("{}, {}, Equal tempered", instrument, self.name),
            None => format!("{}, Equal tempered", self.name),
        }
    }
}

/// Validated, ordered set of presets sharing one reference pitch.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetRegistry {
    reference_hz: f32,
    presets: Vec<Preset>,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl PresetRegistry {
    /// Registry holding only the built-in presets at A4 = 440 Hz.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn empty(reference_hz: f32) -> Self {
        Self {
            reference_hz,
            presets: Vec::new(),
        }
    }

    /// Parses a preset table of the form `{"name": ["E2", "A2", ...], ...}`.
    ///
    /// Presets are kept in name order.
    pub fn from_json(json: &str, reference_hz: f32) -> Result<Self> {
        let table: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut registry = Self::empty(reference_hz);
        for (name, notes) in &table {
            registry.insert(name, None, notes)?;
        }
        log::info!("loaded {} tuning presets", registry.len());
        Ok(registry)
    }

    pub fn from_file(path: impl AsRef<Path>, reference_hz: f32) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data, reference_hz)
    }

    /// Adds or replaces a preset after validating its notes.
    pub fn insert<S: AsRef<str>>(
        &mut self,
        name: &str,
        instrument: Option<&str>,
        notes: &[S],
    ) -> Result<()> {
        if notes.is_empty() {
            return Err(TuningError::EmptyPreset(name.to_string()));
        }
        let preset = Preset {
            name: name.to_string(),
            instrument: instrument.map(str::to_string),
            configuration: TuningConfiguration::new(self.reference_hz, notes)?,
        };
        match self.presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
        Ok(())
    }

    /// Adds every preset of `other`, replacing presets with the same name.
    pub fn merge(&mut self, other: PresetRegistry) -> Result<()> {
        for preset in other.presets {
            let notes: Vec<String> = preset
                .configuration
                .targets()
                .iter()
                .map(|t| t.note.to_string())
                .collect();
            self.insert(&preset.name, preset.instrument.as_deref(), &notes)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Preset> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| TuningError::UnknownPreset(name.to_string()))
    }

    /// Re-derives every preset against a new reference pitch.
    pub fn with_reference(&self, reference_hz: f32) -> Result<Self> {
        let presets = self
            .presets
            .iter()
            .map(|p| {
                Ok(Preset {
                    configuration: p.configuration.with_reference(reference_hz)?,
                    ..p.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            reference_hz,
            presets,
        })
    }

    pub fn reference_hz(&self) -> f32 {
        self.reference_hz
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
