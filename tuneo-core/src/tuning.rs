//! # Musical Tuning Module
//!
//! Note name and frequency conversions in twelve-tone equal temperament.
//!
//! ## Features
//! - Note names with sharps, parsing of sharps and flats ("C#3", "Bb2")
//! - Selectable reference pitch for A4 (440, 432 or 444 Hz)
//! - Nearest-note lookup restricted to octaves 0 to 8
//! - Cent deviation calculations

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TunerError;

/// Lowest octave the note tables represent.
pub const MIN_OCTAVE: i8 = 0;
/// Highest octave the note tables represent.
pub const MAX_OCTAVE: i8 = 8;

/// MIDI number of A4, the reference note.
const A4_MIDI: i32 = 69;

/// Pitch class of a note, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl NoteName {
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Semitones above C.
    pub fn semitone(self) -> i32 {
        self as i32
    }

    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted spellings for each pitch class, including flats.
static NAME_MAP: Lazy<BTreeMap<&'static str, NoteName>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, NoteName> =
        NoteName::ALL.iter().map(|&name| (name.as_str(), name)).collect();
    for (flat, name) in [
        ("Db", NoteName::CSharp),
        ("Eb", NoteName::DSharp),
        ("Gb", NoteName::FSharp),
        ("Ab", NoteName::GSharp),
        ("Bb", NoteName::ASharp),
    ] {
        map.insert(flat, name);
    }
    map
});

/// A note with its octave in scientific pitch notation (A4 = 440 Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub name: NoteName,
    pub octave: i8,
}

impl Note {
    pub const fn new(name: NoteName, octave: i8) -> Self {
        Self { name, octave }
    }

    pub fn midi(self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.name.semitone()
    }

    pub fn from_midi(midi: i32) -> Self {
        Self {
            name: NoteName::from_semitone(midi),
            octave: (midi.div_euclid(12) - 1) as i8,
        }
    }

    /// Same pitch class, ignoring octave.
    pub fn same_name(self, other: Note) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

impl FromStr for Note {
    type Err = TunerError;

    /// Parses notes like "E2", "C#3" or "Bb2".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| TunerError::UnknownNote(s.to_string()))?;
        let (name, octave) = s.split_at(split);

        let name = *NAME_MAP
            .get(name)
            .ok_or_else(|| TunerError::UnknownNote(s.to_string()))?;
        let octave: i8 = octave
            .parse()
            .map_err(|_| TunerError::UnknownNote(s.to_string()))?;

        Ok(Note { name, octave })
    }
}

/// Reference frequency of A4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningReference {
    #[serde(rename = "ref_440")]
    Ref440,
    #[serde(rename = "ref_432")]
    Ref432,
    #[serde(rename = "ref_444")]
    Ref444,
}

impl TuningReference {
    pub fn frequency(self) -> f32 {
        match self {
            TuningReference::Ref440 => 440.0,
            TuningReference::Ref432 => 432.0,
            TuningReference::Ref444 => 444.0,
        }
    }
}

/// Equal-tempered frequency of `note` for the given reference.
pub fn frequency_of(note: Note, reference: TuningReference) -> f32 {
    let semitones = (note.midi() - A4_MIDI) as f32;
    reference.frequency() * 2.0_f32.powf(semitones / 12.0)
}

/// Finds the closest note to a frequency.
///
/// # Returns
/// * `Some(note)` - Closest equal-tempered note
/// * `None` - Frequency is not positive or falls outside octaves 0 to 8
pub fn nearest_note(freq: f32, reference: TuningReference) -> Option<Note> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }

    let semitones = 12.0 * (freq / reference.frequency()).log2();
    let midi = A4_MIDI + semitones.round() as i32;
    let note = Note::from_midi(midi);

    (MIN_OCTAVE..=MAX_OCTAVE).contains(&note.octave).then_some(note)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_frequencies() {
        let a4 = Note::new(NoteName::A, 4);
        assert_eq!(frequency_of(a4, TuningReference::Ref440), 440.0);
        assert_eq!(frequency_of(a4, TuningReference::Ref432), 432.0);

        let a2 = Note::new(NoteName::A, 2);
        assert!((frequency_of(a2, TuningReference::Ref440) - 110.0).abs() < 1e-3);

        let e2 = Note::new(NoteName::E, 2);
        assert!((frequency_of(e2, TuningReference::Ref440) - 82.41).abs() < 0.01);
    }

    #[test]
    fn test_parse_notes() {
        assert_eq!("E2".parse::<Note>().unwrap(), Note::new(NoteName::E, 2));
        assert_eq!("C#3".parse::<Note>().unwrap(), Note::new(NoteName::CSharp, 3));
        assert_eq!("Bb2".parse::<Note>().unwrap(), Note::new(NoteName::ASharp, 2));
        assert!("H2".parse::<Note>().is_err());
        assert!("E".parse::<Note>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let note = Note::new(NoteName::GSharp, 3);
        assert_eq!(note.to_string(), "G#3");
        assert_eq!(note.to_string().parse::<Note>().unwrap(), note);
    }

    #[test]
    fn test_nearest_note() {
        let reference = TuningReference::Ref440;
        assert_eq!(nearest_note(110.0, reference), Some(Note::new(NoteName::A, 2)));
        assert_eq!(nearest_note(84.0, reference), Some(Note::new(NoteName::E, 2)));
        assert_eq!(nearest_note(466.16, reference), Some(Note::new(NoteName::ASharp, 4)));
        assert_eq!(nearest_note(-1.0, reference), None);
        assert_eq!(nearest_note(0.0, reference), None);
        assert_eq!(nearest_note(5.0, reference), None);
        assert_eq!(nearest_note(20_000.0, reference), None);
    }

    #[test]
    fn test_midi_round_trip() {
        for midi in 12..120 {
            assert_eq!(Note::from_midi(midi).midi(), midi);
        }
        assert_eq!(Note::from_midi(69), Note::new(NoteName::A, 4));
    }

    #[test]
    fn test_cents() {
        assert!(calculate_cents_deviation(440.0, 440.0).abs() < 1e-4);
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((calculate_cents_deviation(466.16, 440.0) - 100.0).abs() < 0.1);
    }
}
