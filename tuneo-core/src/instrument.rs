//! Instruments and the nearest-string lookup used by the note resolver.

use serde::{Deserialize, Serialize};

use crate::tuning::{self, Note, NoteName, TuningReference};

/// The nearest tunable target for a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringCandidate {
    pub note: Note,
    /// Target frequency in Hz.
    pub frequency: f32,
}

/// Maps a detected frequency to the closest target of an instrument.
pub trait NoteTable {
    /// Returns `None` when the frequency cannot be represented.
    fn nearest_string(&self, frequency: f32) -> Option<StringCandidate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Guitar,
    Chromatic,
}

/// Six-string guitar tuning presets, lowest string first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuitarTuning {
    Standard,
    DropD,
    DSharpStandard,
    DStandard,
    CSharpStandard,
    DropC,
    OpenE7,
    OpenEMinor7,
}

impl GuitarTuning {
    pub const ALL: [GuitarTuning; 8] = [
        GuitarTuning::Standard,
        GuitarTuning::DropD,
        GuitarTuning::DSharpStandard,
        GuitarTuning::DStandard,
        GuitarTuning::CSharpStandard,
        GuitarTuning::DropC,
        GuitarTuning::OpenE7,
        GuitarTuning::OpenEMinor7,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            GuitarTuning::Standard => "Standard",
            GuitarTuning::DropD => "Drop D",
            GuitarTuning::DSharpStandard => "D# Standard",
            GuitarTuning::DStandard => "D Standard",
            GuitarTuning::CSharpStandard => "C# Standard",
            GuitarTuning::DropC => "Drop C",
            GuitarTuning::OpenE7 => "Open E7",
            GuitarTuning::OpenEMinor7 => "Open E Minor7",
        }
    }

    pub fn notes(self) -> [Note; 6] {
        use NoteName::*;
        let n = Note::new;
        match self {
            GuitarTuning::Standard => [n(E, 2), n(A, 2), n(D, 3), n(G, 3), n(B, 3), n(E, 4)],
            GuitarTuning::DropD => [n(D, 2), n(A, 2), n(D, 3), n(G, 3), n(B, 3), n(E, 4)],
            GuitarTuning::DSharpStandard => [
                n(DSharp, 2),
                n(GSharp, 2),
                n(CSharp, 3),
                n(FSharp, 3),
                n(ASharp, 3),
                n(DSharp, 4),
            ],
            GuitarTuning::DStandard => [n(D, 2), n(G, 2), n(C, 3), n(F, 3), n(A, 3), n(D, 4)],
            GuitarTuning::CSharpStandard => [
                n(CSharp, 2),
                n(FSharp, 2),
                n(B, 2),
                n(E, 3),
                n(GSharp, 3),
                n(CSharp, 4),
            ],
            GuitarTuning::DropC => [n(C, 2), n(G, 2), n(C, 3), n(F, 3), n(A, 3), n(D, 4)],
            GuitarTuning::OpenE7 => [n(E, 2), n(B, 2), n(D, 3), n(GSharp, 3), n(B, 3), n(E, 4)],
            GuitarTuning::OpenEMinor7 => [n(E, 2), n(B, 2), n(D, 3), n(G, 3), n(B, 3), n(E, 4)],
        }
    }
}

/// An instrument the tuner can resolve notes for.
#[derive(Debug, Clone, PartialEq)]
pub enum Instrument {
    /// Fixed strings; every frequency resolves to one of them.
    Guitar {
        tuning: GuitarTuning,
        strings: Vec<StringCandidate>,
    },
    /// Any equal-tempered note.
    Chromatic { reference: TuningReference },
}

impl Instrument {
    pub fn new(kind: InstrumentKind, reference: TuningReference, tuning: GuitarTuning) -> Self {
        match kind {
            InstrumentKind::Guitar => Self::guitar(tuning, reference),
            InstrumentKind::Chromatic => Instrument::Chromatic { reference },
        }
    }

    pub fn guitar(tuning: GuitarTuning, reference: TuningReference) -> Self {
        let strings = tuning
            .notes()
            .iter()
            .map(|&note| StringCandidate {
                note,
                frequency: tuning::frequency_of(note, reference),
            })
            .collect();
        Instrument::Guitar { tuning, strings }
    }

    pub fn has_strings(&self) -> bool {
        matches!(self, Instrument::Guitar { .. })
    }

    /// Strings lowest first; empty for chromatic.
    pub fn strings(&self) -> &[StringCandidate] {
        match self {
            Instrument::Guitar { strings, .. } => strings,
            Instrument::Chromatic { .. } => &[],
        }
    }
}

impl NoteTable for Instrument {
    fn nearest_string(&self, frequency: f32) -> Option<StringCandidate> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }

        match self {
            // Distance is linear in Hz, not in semitones.
            Instrument::Guitar { strings, .. } => strings
                .iter()
                .min_by(|a, b| {
                    let diff_a = (a.frequency - frequency).abs();
                    let diff_b = (b.frequency - frequency).abs();
                    diff_a.total_cmp(&diff_b)
                })
                .copied(),
            Instrument::Chromatic { reference } => {
                let note = tuning::nearest_note(frequency, *reference)?;
                Some(StringCandidate {
                    note,
                    frequency: tuning::frequency_of(note, *reference),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guitar_nearest_string() {
        let guitar = Instrument::guitar(GuitarTuning::Standard, TuningReference::Ref440);
        let a2 = guitar.nearest_string(110.0).unwrap();
        assert_eq!(a2.note.to_string(), "A2");
        assert!((a2.frequency - 110.0).abs() < 1e-3);

        // Far above the top string still resolves to it.
        assert_eq!(guitar.nearest_string(1000.0).unwrap().note.to_string(), "E4");
        assert_eq!(guitar.nearest_string(85.0).unwrap().note.to_string(), "E2");
    }

    #[test]
    fn test_no_candidate_for_sentinel() {
        let guitar = Instrument::guitar(GuitarTuning::Standard, TuningReference::Ref440);
        assert_eq!(guitar.nearest_string(-1.0), None);
        assert_eq!(guitar.nearest_string(f32::NAN), None);

        let chromatic = Instrument::Chromatic { reference: TuningReference::Ref440 };
        assert_eq!(chromatic.nearest_string(0.0), None);
    }

    #[test]
    fn test_chromatic_nearest_note() {
        let chromatic = Instrument::Chromatic { reference: TuningReference::Ref440 };
        let c = chromatic.nearest_string(262.0).unwrap();
        assert_eq!(c.note.to_string(), "C4");
        assert!((c.frequency - 261.63).abs() < 0.01);
        assert!(!chromatic.has_strings());
        assert!(chromatic.strings().is_empty());
    }

    #[test]
    fn test_every_preset_has_six_ascending_strings() {
        for tuning in GuitarTuning::ALL {
            let guitar = Instrument::guitar(tuning, TuningReference::Ref440);
            let strings = guitar.strings();
            assert_eq!(strings.len(), 6, "{}", tuning.display_name());
            assert!(strings.windows(2).all(|w| w[0].frequency < w[1].frequency));
        }
    }

    #[test]
    fn test_reference_shifts_string_frequencies() {
        let guitar = Instrument::guitar(GuitarTuning::Standard, TuningReference::Ref432);
        let a2 = guitar.strings()[1];
        assert!((a2.frequency - 108.0).abs() < 1e-3);
    }
}
