//! Debounced resolution of pitches to the string or note being tuned.
//!
//! In automatic mode every estimate votes for its nearest string. The
//! current string only changes when the three most recent votes name the
//! same note, and a single disagreeing frame never clears it. In manual
//! mode the current string is chosen by the user and voting is bypassed.

use std::collections::VecDeque;

use tracing::debug;

use crate::instrument::{NoteTable, StringCandidate};

/// Number of agreeing votes needed to change the current string.
pub const VOTES_REQUIRED: usize = 3;

#[derive(Debug, Clone)]
pub struct NoteResolver {
    depth: usize,
    string_history: VecDeque<StringCandidate>,
    current: Option<StringCandidate>,
    manual: bool,
}

impl NoteResolver {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(VOTES_REQUIRED);
        Self {
            depth,
            string_history: VecDeque::with_capacity(depth + 1),
            current: None,
            manual: false,
        }
    }

    pub fn current_string(&self) -> Option<StringCandidate> {
        self.current
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Votes with `pitch` and returns the (possibly updated) current string.
    ///
    /// Pitches without a candidate in `table` cast no vote.
    pub fn observe<T: NoteTable + ?Sized>(&mut self, pitch: f32, table: &T) -> Option<StringCandidate> {
        if self.manual {
            return self.current;
        }

        let Some(candidate) = table.nearest_string(pitch) else {
            return self.current;
        };

        self.string_history.push_back(candidate);
        while self.string_history.len() > self.depth {
            self.string_history.pop_front();
        }

        if self.has_consensus() && self.current != Some(candidate) {
            debug!("Current string -> {} ({:.2} Hz)", candidate.note, candidate.frequency);
            self.current = Some(candidate);
        }
        self.current
    }

    fn has_consensus(&self) -> bool {
        if self.string_history.len() < VOTES_REQUIRED {
            return false;
        }
        let mut recent = self.string_history.iter().rev().take(VOTES_REQUIRED);
        let Some(newest) = recent.next() else {
            return false;
        };
        recent.all(|other| other.note.same_name(newest.note))
    }

    /// Fixes the current string (manual mode) or returns to voting with `None`.
    ///
    /// Leaving manual mode keeps the current string until new votes agree.
    pub fn set_manual(&mut self, string: Option<StringCandidate>) {
        match string {
            Some(string) => {
                if !self.manual {
                    self.string_history.clear();
                }
                self.manual = true;
                self.current = Some(string);
            }
            None => self.manual = false,
        }
    }

    pub fn clear(&mut self) {
        self.string_history.clear();
        self.current = None;
        self.manual = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{GuitarTuning, Instrument};
    use crate::tuning::{Note, TuningReference};

    fn guitar() -> Instrument {
        Instrument::guitar(GuitarTuning::Standard, TuningReference::Ref440)
    }

    fn note_of(resolver: &NoteResolver) -> Option<String> {
        resolver.current_string().map(|s| s.note.to_string())
    }

    #[test]
    fn test_three_votes_promote() {
        let mut resolver = NoteResolver::new(8);
        let guitar = guitar();

        resolver.observe(82.0, &guitar);
        resolver.observe(83.0, &guitar);
        assert_eq!(note_of(&resolver), None);

        resolver.observe(82.5, &guitar);
        assert_eq!(note_of(&resolver), Some("E2".to_string()));
    }

    #[test]
    fn test_disagreeing_frame_keeps_lock() {
        let mut resolver = NoteResolver::new(8);
        let guitar = guitar();
        for _ in 0..3 {
            resolver.observe(82.4, &guitar);
        }
        assert_eq!(note_of(&resolver), Some("E2".to_string()));

        resolver.observe(110.0, &guitar);
        resolver.observe(110.0, &guitar);
        resolver.observe(82.4, &guitar);
        assert_eq!(note_of(&resolver), Some("E2".to_string()));

        for _ in 0..3 {
            resolver.observe(110.0, &guitar);
        }
        assert_eq!(note_of(&resolver), Some("A2".to_string()));
    }

    #[test]
    fn test_misses_cast_no_vote() {
        let mut resolver = NoteResolver::new(8);
        let guitar = guitar();
        resolver.observe(110.0, &guitar);
        resolver.observe(-1.0, &guitar);
        resolver.observe(110.0, &guitar);
        resolver.observe(-1.0, &guitar);
        resolver.observe(110.0, &guitar);
        assert_eq!(note_of(&resolver), Some("A2".to_string()));
    }

    #[test]
    fn test_octaves_share_a_vote() {
        let mut resolver = NoteResolver::new(8);
        let guitar = guitar();
        // E2, E4, E2: same note name in different octaves.
        resolver.observe(82.4, &guitar);
        resolver.observe(329.6, &guitar);
        resolver.observe(82.4, &guitar);
        let current = resolver.current_string().unwrap();
        assert_eq!(current.note.to_string(), "E2");
    }

    #[test]
    fn test_manual_mode_ignores_votes() {
        let mut resolver = NoteResolver::new(8);
        let guitar = guitar();
        let d3 = guitar.strings()[2];
        resolver.set_manual(Some(d3));

        for _ in 0..10 {
            resolver.observe(110.0, &guitar);
        }
        assert!(resolver.is_manual());
        assert_eq!(resolver.current_string(), Some(d3));
    }

    #[test]
    fn test_leaving_manual_mode_keeps_string_until_new_consensus() {
        let mut resolver = NoteResolver::new(8);
        let guitar = guitar();
        let d3 = guitar.strings()[2];
        resolver.set_manual(Some(d3));
        resolver.set_manual(None);
        assert_eq!(resolver.current_string(), Some(d3));

        resolver.observe(110.0, &guitar);
        resolver.observe(110.0, &guitar);
        assert_eq!(resolver.current_string(), Some(d3));
        resolver.observe(110.0, &guitar);
        assert_eq!(resolver.current_string().map(|s| s.note), Some("A2".parse::<Note>().unwrap()));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut resolver = NoteResolver::new(3);
        let guitar = guitar();
        for _ in 0..3 {
            resolver.observe(110.0, &guitar);
        }
        resolver.clear();
        assert_eq!(resolver.current_string(), None);
        resolver.observe(110.0, &guitar);
        assert_eq!(resolver.current_string(), None);
    }
}
