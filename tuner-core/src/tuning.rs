//! # Musical Tuning Module
//!
//! Equal-temperament note math and target matching for string tuning.
//!
//! ## Features
//! - Note name parsing ("E2", "C#3", "Bb2") with validation at load time
//! - MIDI note numbers relative to a configurable A4 reference
//! - Nearest chromatic note and nearest configured target lookups
//! - Cent deviation calculations

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TuningError};

/// Chromatic pitch classes, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI number of A4, the note the reference frequency is given for.
pub const A4_MIDI: i32 = 69;

pub const DEFAULT_REFERENCE_HZ: f32 = 440.0;

/// Spellings accepted when parsing, mapped to their pitch-class index.
static PITCH_CLASS_MAP: Lazy<BTreeMap<&'static str, i32>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, i32> = NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i as i32))
        .collect();
    for (flat, index) in [
        ("Cb", -1),
        ("Db", 1),
        ("Eb", 3),
        ("E#", 5),
        ("Fb", 4),
        ("Gb", 6),
        ("Ab", 8),
        ("Bb", 10),
        ("B#", 12),
    ] {
        map.insert(flat, index);
    }
    map
});

/// Fractional MIDI note number of `freq` for the given A4 reference.
pub fn note_number(freq: f32, reference_hz: f32) -> f32 {
    12.0 * (freq / reference_hz).log2() + A4_MIDI as f32
}

/// Equal-tempered frequency of a MIDI note number.
pub fn midi_to_frequency(midi: i32, reference_hz: f32) -> f32 {
    reference_hz * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// A pitch class plus octave, stored as a MIDI note number.
///
/// Octaves follow scientific pitch notation: MIDI 60 is C4, 69 is A4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteName {
    midi: i32,
}

impl NoteName {
    pub fn from_midi(midi: i32) -> Self {
        Self { midi }
    }

    pub fn midi(&self) -> i32 {
        self.midi
    }

    /// Pitch class spelled with sharps, e.g. "C#".
    pub fn pitch_class(&self) -> &'static str {
        NOTE_NAMES[self.midi.rem_euclid(12) as usize]
    }

    pub fn octave(&self) -> i32 {
        self.midi.div_euclid(12) - 1
    }

    pub fn frequency(&self, reference_hz: f32) -> f32 {
        midi_to_frequency(self.midi, reference_hz)
    }

    /// Nearest chromatic note to `freq`.
    pub fn nearest(freq: f32, reference_hz: f32) -> Self {
        Self::from_midi(note_number(freq, reference_hz).round() as i32)
    }

    /// Notes `radius` semitones either side of this one, lowest first.
    pub fn neighbors(&self, radius: i32) -> Vec<NoteName> {
        (-radius..=radius)
            .map(|offset| NoteName::from_midi(self.midi + offset))
            .collect()
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl FromStr for NoteName {
    type Err = TuningError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TuningError::InvalidNoteName(s.to_string());
        let trimmed = s.trim();

        let split = trimmed
            .char_indices()
            .find(|&(i, c)| i > 0 && (c.is_ascii_digit() || c == '-'))
            .map(|(i, _)| i)
            .ok_or_else(invalid)?;
        let (class, octave) = trimmed.split_at(split);

        let index = *PITCH_CLASS_MAP.get(class).ok_or_else(invalid)?;
        let octave: i32 = octave.parse().map_err(|_| invalid())?;
        if !(-1..=9).contains(&octave) {
            return Err(invalid());
        }

        Ok(Self::from_midi(index + (octave + 1) * 12))
    }
}

impl Serialize for NoteName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NoteName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One configured target pitch, e.g. a guitar string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub note: NoteName,
    pub frequency_hz: f32,
}

/// Reference pitch plus the ordered targets to match against.
///
/// Always valid once constructed: the reference is finite and positive and
/// every target came from a parsed note name.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningConfiguration {
    reference_hz: f32,
    targets: Vec<Target>,
}

impl Default for TuningConfiguration {
    /// Chromatic mode at A4 = 440 Hz with no targets.
    fn default() -> Self {
        Self {
            reference_hz: DEFAULT_REFERENCE_HZ,
            targets: Vec::new(),
        }
    }
}

impl TuningConfiguration {
    /// Builds a configuration from note names.
    ///
    /// # Errors
    /// * `InvalidReference` - reference is not a finite positive frequency
    /// * `InvalidNoteName` - a name does not parse as pitch class + octave
    pub fn new<S: AsRef<str>>(reference_hz: f32, notes: &[S]) -> Result<Self> {
        let notes = notes
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<NoteName>>>()?;
        Self::from_notes(reference_hz, notes)
    }

    pub fn from_notes(reference_hz: f32, notes: Vec<NoteName>) -> Result<Self> {
        if !(reference_hz.is_finite() && reference_hz > 0.0) {
            return Err(TuningError::InvalidReference(reference_hz));
        }
        let targets = notes
            .into_iter()
            .map(|note| Target {
                note,
                frequency_hz: note.frequency(reference_hz),
            })
            .collect();
        Ok(Self {
            reference_hz,
            targets,
        })
    }

    pub fn reference_hz(&self) -> f32 {
        self.reference_hz
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Same targets re-derived against a new reference pitch.
    pub fn with_reference(&self, reference_hz: f32) -> Result<Self> {
        Self::from_notes(reference_hz, self.targets.iter().map(|t| t.note).collect())
    }
}

/// Result of matching one frequency against a configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub note: NoteName,
    /// Index into the configuration's targets, if any are configured.
    pub target_index: Option<usize>,
}

/// Finds the nearest chromatic note and nearest configured target.
pub fn match_frequency(freq: f32, config: &TuningConfiguration) -> Match {
    Match {
        note: NoteName::nearest(freq, config.reference_hz),
        target_index: nearest_target(freq, config.targets()),
    }
}

/// Index of the target closest to `freq` in absolute Hz.
///
/// On a tie the earlier target wins.
pub fn nearest_target(freq: f32, targets: &[Target]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, target) in targets.iter().enumerate() {
        let distance = (target.frequency_hz - freq).abs();
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GUITAR: [&str; 6] = ["E2", "A2", "D3", "G3", "B3", "E4"];

    #[test]
    fn parses_note_names() {
        assert_eq!("A4".parse::<NoteName>().unwrap().midi(), 69);
        assert_eq!("C4".parse::<NoteName>().unwrap().midi(), 60);
        assert_eq!("E2".parse::<NoteName>().unwrap().midi(), 40);
        assert_eq!("C#3".parse::<NoteName>().unwrap().midi(), 49);
        assert_eq!("Bb2".parse::<NoteName>().unwrap().midi(), 46);
        assert_eq!("C-1".parse::<NoteName>().unwrap().midi(), 0);
        assert_eq!(" D3 ".parse::<NoteName>().unwrap().midi(), 50);
    }

    #[test]
    fn rejects_malformed_note_names() {
        for bad in ["", "H2", "E", "2", "e2", "E#x", "Ex2", "E 2", "E10", "C##4"] {
            assert!(
                matches!(bad.parse::<NoteName>(), Err(TuningError::InvalidNoteName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn displays_with_sharps() {
        assert_eq!(NoteName::from_midi(69).to_string(), "A4");
        assert_eq!(NoteName::from_midi(46).to_string(), "A#2");
        assert_eq!(NoteName::from_midi(0).to_string(), "C-1");
        assert_eq!(NoteName::from_midi(-1).to_string(), "B-2");
    }

    #[test]
    fn derives_target_frequencies() {
        let config = TuningConfiguration::new(440.0, &GUITAR).unwrap();
        let freqs: Vec<f32> = config.targets().iter().map(|t| t.frequency_hz).collect();
        let expected = [82.41, 110.0, 146.83, 196.0, 246.94, 329.63];
        for (got, want) in freqs.iter().zip(expected) {
            assert_relative_eq!(*got, want, max_relative = 1e-4);
        }
    }

    #[test]
    fn matches_guitar_strings() {
        let config = TuningConfiguration::new(440.0, &GUITAR).unwrap();
        assert_eq!(match_frequency(82.41, &config).target_index, Some(0));
        assert_eq!(match_frequency(329.63, &config).target_index, Some(5));
        assert_eq!(match_frequency(150.0, &config).target_index, Some(2));

        let m = match_frequency(82.41, &config);
        assert_eq!(m.note.to_string(), "E2");
    }

    #[test]
    fn ties_pick_first_target() {
        let config = TuningConfiguration::new(440.0, &["A4", "A4"]).unwrap();
        assert_eq!(match_frequency(440.0, &config).target_index, Some(0));

        // Exactly between A2 (110) and A3 (220).
        let config = TuningConfiguration::new(440.0, &["A3", "A2"]).unwrap();
        assert_eq!(nearest_target(165.0, config.targets()), Some(0));
    }

    #[test]
    fn no_targets_means_chromatic() {
        let config = TuningConfiguration::default();
        let m = match_frequency(261.63, &config);
        assert_eq!(m.note.to_string(), "C4");
        assert_eq!(m.target_index, None);
    }

    #[test]
    fn reference_shifts_targets() {
        let config = TuningConfiguration::new(440.0, &["A4"]).unwrap();
        let shifted = config.with_reference(432.0).unwrap();
        assert_relative_eq!(shifted.targets()[0].frequency_hz, 432.0);
        assert!(matches!(
            config.with_reference(0.0),
            Err(TuningError::InvalidReference(_))
        ));
        assert!(TuningConfiguration::new(f32::NAN, &["A4"]).is_err());
    }

    #[test]
    fn neighbors_span_both_sides() {
        let labels: Vec<String> = NoteName::from_midi(69)
            .neighbors(2)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(labels, ["G4", "G#4", "A4", "A#4", "B4"]);
    }

    #[test]
    fn cents_deviation() {
        assert_relative_eq!(calculate_cents_deviation(880.0, 440.0), 1200.0);
        assert!(calculate_cents_deviation(439.0, 440.0) < 0.0);
    }
}
