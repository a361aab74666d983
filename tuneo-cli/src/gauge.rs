//! # Tuning Gauge
//!
//! Text rendering of the published pipeline state: the locked note, the
//! detected pitch and a needle showing the normalized deviation.

use tuneo_core::PipelineState;

/// Number of characters on each side of the center mark.
const HALF_WIDTH: usize = 20;

/// Accuracy zone of the current pitch, by absolute cent deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    InTune,
    Close,
    Off,
}

impl Zone {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < 5.0 {
            Zone::InTune
        } else if cents.abs() < 20.0 {
            Zone::Close
        } else {
            Zone::Off
        }
    }

    fn label(self) -> &'static str {
        match self {
            Zone::InTune => "in tune",
            Zone::Close => "close",
            Zone::Off => "off",
        }
    }
}

/// Draws the needle for a deviation in (-1, 1).
pub fn needle(deviation: Option<f32>) -> String {
    let mut bar: Vec<char> = std::iter::repeat_n('-', 2 * HALF_WIDTH + 1).collect();
    bar[HALF_WIDTH] = '|';
    if let Some(d) = deviation {
        let offset = (d.clamp(-1.0, 1.0) * HALF_WIDTH as f32).round() as isize;
        let pos = (HALF_WIDTH as isize + offset) as usize;
        bar[pos] = '^';
    }
    bar.into_iter().collect()
}

/// One line describing a state.
pub fn render(state: &PipelineState) -> String {
    let note = state
        .current_string
        .map(|s| format!("{:<4}", s.note.to_string()))
        .unwrap_or_else(|| "--  ".to_string());
    let pitch = if state.has_pitch() {
        format!("{:7.2} Hz", state.pitch)
    } else {
        "   --- Hz".to_string()
    };
    let zone = state
        .cents
        .map(|c| format!("{:+6.1} cents ({})", c, Zone::from_cents(c).label()))
        .unwrap_or_default();

    format!("{} {} [{}] {}", note, pitch, needle(state.gauge_deviation), zone)
}
