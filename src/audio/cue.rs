//! Cue synthesis: short tone sequences rendered to mono `f32` PCM.
//!
//! Success is a rising two-tone chime; failure is a low descending buzz.
//! Every tone gets a short linear fade at both ends so playback does not
//! click.

use std::f32::consts::TAU;

use super::Cue;

/// Fade length at each end of a tone, in milliseconds.
const FADE_MS: u32 = 8;

// ---------------------------------------------------------------------------
// Tone
// ---------------------------------------------------------------------------

/// One segment of a cue. A frequency of `0.0` is a rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub duration_ms: u32,
    /// Add odd harmonics for a harsher, buzzing timbre.
    pub buzz: bool,
}

impl Tone {
    const fn sine(freq_hz: f32, duration_ms: u32) -> Self {
        Self {
            freq_hz,
            duration_ms,
            buzz: false,
        }
    }

    const fn buzz(freq_hz: f32, duration_ms: u32) -> Self {
        Self {
            freq_hz,
            duration_ms,
            buzz: true,
        }
    }

    const fn rest(duration_ms: u32) -> Self {
        Self::sine(0.0, duration_ms)
    }

    fn samples(&self, sample_rate: u32) -> usize {
        (u64::from(sample_rate) * u64::from(self.duration_ms) / 1000) as usize
    }
}

const SUCCESS: &[Tone] = &[Tone::sine(880.0, 120), Tone::rest(40), Tone::sine(1318.5, 200)];

const FAILURE: &[Tone] = &[Tone::buzz(330.0, 220), Tone::rest(60), Tone::buzz(220.0, 320)];

impl Cue {
    pub fn tones(self) -> &'static [Tone] {
        match self {
            Cue::Success => SUCCESS,
            Cue::Failure => FAILURE,
        }
    }

    /// Total length of the cue in milliseconds.
    pub fn duration_ms(self) -> u32 {
        self.tones().iter().map(|t| t.duration_ms).sum()
    }
}

// ---------------------------------------------------------------------------
// synthesize
// ---------------------------------------------------------------------------

/// Render `cue` at `sample_rate` with peak amplitude `volume` (clamped to
/// `[0.0, 1.0]`).
pub fn synthesize(cue: Cue, sample_rate: u32, volume: f32) -> Vec<f32> {
    let gain = volume.clamp(0.0, 1.0);
    let fade = (sample_rate * FADE_MS / 1000).max(1) as usize;
    let mut out = Vec::with_capacity(cue.tones().iter().map(|t| t.samples(sample_rate)).sum());

    for tone in cue.tones() {
        let n = tone.samples(sample_rate);
        if tone.freq_hz <= 0.0 {
            out.extend(std::iter::repeat(0.0).take(n));
            continue;
        }
        let step = TAU * tone.freq_hz / sample_rate as f32;
        for i in 0..n {
            let phase = step * i as f32;
            let mut s = phase.sin();
            if tone.buzz {
                s = (s + (3.0 * phase).sin() / 3.0 + (5.0 * phase).sin() / 5.0) / 1.2;
            }
            let envelope = (i.min(n - 1 - i) as f32 / fade as f32).min(1.0);
            out.push(s.clamp(-1.0, 1.0) * envelope * gain);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn length_matches_cue_duration() {
        for cue in [Cue::Success, Cue::Failure] {
            let samples = synthesize(cue, 48_000, 1.0);
            let expected = 48_000 * cue.duration_ms() as usize / 1000;
            assert_eq!(samples.len(), expected, "{cue:?}");
        }
    }

    #[test]
    fn success_rises_and_failure_falls() {
        let pitched = |cue: Cue| -> Vec<f32> {
            cue.tones()
                .iter()
                .filter(|t| t.freq_hz > 0.0)
                .map(|t| t.freq_hz)
                .collect()
        };
        let up = pitched(Cue::Success);
        let down = pitched(Cue::Failure);
        assert!(up.windows(2).all(|w| w[0] < w[1]));
        assert!(down.windows(2).all(|w| w[0] > w[1]));
        assert!(down[0] < up[0]);
    }

    #[test]
    fn volume_scales_peak_amplitude() {
        let full = peak(&synthesize(Cue::Success, 16_000, 1.0));
        let half = peak(&synthesize(Cue::Success, 16_000, 0.5));
        assert!(full > 0.9 && full <= 1.0, "full peak {full}");
        assert!((half - full * 0.5).abs() < 1e-3, "half peak {half}");
    }

    #[test]
    fn volume_is_clamped() {
        assert!(peak(&synthesize(Cue::Failure, 16_000, 4.0)) <= 1.0);
        assert_eq!(peak(&synthesize(Cue::Failure, 16_000, -1.0)), 0.0);
    }

    #[test]
    fn tones_fade_in_from_silence() {
        let samples = synthesize(Cue::Success, 48_000, 1.0);
        assert_eq!(samples[0], 0.0);
        assert!(samples[1].abs() < 0.01);
    }
}
