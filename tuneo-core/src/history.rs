//! Bounded pitch / RMS / frame-id history used to look back a few frames.

use std::collections::VecDeque;

/// Identifier assigned to each captured frame, increasing by one per frame.
pub type FrameId = u64;

/// One processed frame as seen by the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub pitch: f32,
    pub rms: f32,
    pub frame_id: FrameId,
}

/// Three index-aligned bounded queues.
///
/// Entries are only ever appended as a complete (pitch, rms, id) triple, so
/// the queues can never drift out of alignment.
#[derive(Debug, Clone)]
pub struct HistoryTracks {
    depth: usize,
    pitch: VecDeque<f32>,
    rms: VecDeque<f32>,
    frame_id: VecDeque<FrameId>,
}

impl HistoryTracks {
    /// Smallest depth that still supports a 3-vote window.
    pub const MIN_DEPTH: usize = 3;

    /// Creates empty tracks; `depth` is raised to [`Self::MIN_DEPTH`] if smaller.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(Self::MIN_DEPTH);
        Self {
            depth,
            pitch: VecDeque::with_capacity(depth + 1),
            rms: VecDeque::with_capacity(depth + 1),
            frame_id: VecDeque::with_capacity(depth + 1),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.frame_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_id.is_empty()
    }

    /// Appends one processed frame, dropping the oldest once over depth.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.pitch.push_back(entry.pitch);
        self.rms.push_back(entry.rms);
        self.frame_id.push_back(entry.frame_id);

        while self.frame_id.len() > self.depth {
            self.pitch.pop_front();
            self.rms.pop_front();
            self.frame_id.pop_front();
        }
    }

    /// Pitch `back` steps from the newest entry (0 = newest).
    pub fn pitch(&self, back: usize) -> Option<f32> {
        nth_back(&self.pitch, back)
    }

    /// RMS `back` steps from the newest entry (0 = newest).
    pub fn rms(&self, back: usize) -> Option<f32> {
        nth_back(&self.rms, back)
    }

    pub fn last_frame_id(&self) -> Option<FrameId> {
        self.frame_id.back().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = HistoryEntry> + '_ {
        self.pitch
            .iter()
            .zip(&self.rms)
            .zip(&self.frame_id)
            .map(|((&pitch, &rms), &frame_id)| HistoryEntry { pitch, rms, frame_id })
    }

    pub fn clear(&mut self) {
        self.pitch.clear();
        self.rms.clear();
        self.frame_id.clear();
    }
}

fn nth_back<T: Copy>(queue: &VecDeque<T>, back: usize) -> Option<T> {
    queue.len().checked_sub(back + 1).and_then(|i| queue.get(i).copied())
}
