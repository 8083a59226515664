//! Probes: one fixed accumulator per instrumented code region
//!
//! The set of regions is closed and known at compile time, so a probe is
//! addressed by `ProbeId` and never by a runtime string or index.
//!
//! Every field of a `ProbeSlot` is an atomic so the slot can sit in shared
//! memory between the render thread (the only writer while a session runs)
//! and the shell (which resets before a session and reads after one).
//! Updates are plain relaxed load/store pairs rather than read-modify-write:
//! there is exactly one writer per slot, and a reader racing an in-progress
//! session only ever sees a slightly stale value.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use portable_atomic::AtomicF64;

/// Instrumented regions of the render path, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeId {
    /// One full `write` call from the audio driver, the block boundary probe
    Write,
    OneBlock,
    OneBlockClear,
    OneBlockVoice,
    OneBlockVoices,
    OneBlockReverb,
    OneBlockChorus,
    VoiceNote,
    VoiceRelease,
}

impl ProbeId {
    pub const COUNT: usize = 9;

    pub const ALL: [ProbeId; Self::COUNT] = [
        ProbeId::Write,
        ProbeId::OneBlock,
        ProbeId::OneBlockClear,
        ProbeId::OneBlockVoice,
        ProbeId::OneBlockVoices,
        ProbeId::OneBlockReverb,
        ProbeId::OneBlockChorus,
        ProbeId::VoiceNote,
        ProbeId::VoiceRelease,
    ];

    /// Slot index in the registry
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Fixed-width label used as the first report column.
    pub const fn description(self) -> &'static str {
        match self {
            ProbeId::Write => "synth_write_* ------------>",
            ProbeId::OneBlock => "synth_one_block ---------->",
            ProbeId::OneBlockClear => "synth_one_block:clear ---->",
            ProbeId::OneBlockVoice => "synth_one_block:one voice->",
            ProbeId::OneBlockVoices => "synth_one_block:all voices>",
            ProbeId::OneBlockReverb => "synth_one_block:reverb --->",
            ProbeId::OneBlockChorus => "synth_one_block:chorus --->",
            ProbeId::VoiceNote => "voice:note --------------->",
            ProbeId::VoiceRelease => "voice:release ------------>",
        }
    }

    /// Regions whose duration is bounded by one audio block.
    ///
    /// Only these have a meaningful cpu load; note and release durations
    /// span many blocks.
    pub const fn is_block_probe(self) -> bool {
        !matches!(self, ProbeId::VoiceNote | ProbeId::VoiceRelease)
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description().trim_end_matches(['-', '>', ' ']))
    }
}

/// Running aggregates for one probe.
#[derive(Debug)]
pub struct ProbeSlot {
    min: AtomicF64,
    max: AtomicF64,
    total: AtomicF64,
    count: AtomicU32,
    n_voices: AtomicU32,
    n_samples: AtomicU32,
}

impl ProbeSlot {
    pub fn new() -> Self {
        Self {
            min: AtomicF64::new(f64::INFINITY),
            max: AtomicF64::new(f64::NEG_INFINITY),
            total: AtomicF64::new(0.0),
            count: AtomicU32::new(0),
            n_voices: AtomicU32::new(0),
            n_samples: AtomicU32::new(0),
        }
    }

    /// Back to the empty state: min = +inf, max = -inf, everything else zero.
    pub fn reset(&self) {
        self.min.store(f64::INFINITY, Ordering::Relaxed);
        self.max.store(f64::NEG_INFINITY, Ordering::Relaxed);
        self.total.store(0.0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.n_voices.store(0, Ordering::Relaxed);
        self.n_samples.store(0, Ordering::Relaxed);
    }

    /// Fold one observed duration into the aggregates.
    ///
    /// Single writer only. O(1), no locks, no allocation.
    #[inline]
    pub fn observe(&self, delta: f64, voices: u32, samples: u32) {
        if delta < self.min.load(Ordering::Relaxed) {
            self.min.store(delta, Ordering::Relaxed);
        }
        if delta > self.max.load(Ordering::Relaxed) {
            self.max.store(delta, Ordering::Relaxed);
        }
        self.total
            .store(self.total.load(Ordering::Relaxed) + delta, Ordering::Relaxed);
        self.count.store(
            self.count.load(Ordering::Relaxed).wrapping_add(1),
            Ordering::Relaxed,
        );
        self.n_voices.store(
            self.n_voices.load(Ordering::Relaxed).wrapping_add(voices),
            Ordering::Relaxed,
        );
        self.n_samples.store(
            self.n_samples.load(Ordering::Relaxed).wrapping_add(samples),
            Ordering::Relaxed,
        );
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            min: self.min.load(Ordering::Relaxed),
            max: self.max.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            n_voices: self.n_voices.load(Ordering::Relaxed),
            n_samples: self.n_samples.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProbeSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a probe's aggregates. Durations in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSnapshot {
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub count: u32,
    pub n_voices: u32,
    pub n_samples: u32,
}

impl ProbeSnapshot {
    /// What a freshly reset slot reads as
    pub const EMPTY: ProbeSnapshot = ProbeSnapshot {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        total: 0.0,
        count: 0,
        n_voices: 0,
        n_samples: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean duration, `None` before the first observation
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / f64::from(self.count))
    }

    /// Mean number of voices per observation (integer division, like the counters)
    pub fn average_voices(&self) -> u32 {
        self.n_voices.checked_div(self.count).unwrap_or(0)
    }

    /// Percentage of real time spent in this probe.
    ///
    /// `n_samples` frames at `sample_rate` represent `n_samples / sample_rate`
    /// seconds of audio; the load is the share of that time consumed.
    pub fn cpu_load(&self, sample_rate: f64) -> f64 {
        if self.n_samples == 0 || sample_rate <= 0.0 {
            return 0.0;
        }
        let audio_micros = f64::from(self.n_samples) / sample_rate * 1_000_000.0;
        self.total / audio_micros * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_share_one_width() {
        let width = ProbeId::Write.description().len();
        assert_eq!(width, 27);
        for id in ProbeId::ALL {
            assert_eq!(id.description().len(), width, "{id:?}");
        }
    }

    #[test]
    fn test_indices_follow_report_order() {
        for (i, id) in ProbeId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_block_probes() {
        assert!(ProbeId::Write.is_block_probe());
        assert!(ProbeId::OneBlockChorus.is_block_probe());
        assert!(!ProbeId::VoiceNote.is_block_probe());
        assert!(!ProbeId::VoiceRelease.is_block_probe());
    }

    #[test]
    fn test_display_strips_arrow() {
        assert_eq!(ProbeId::OneBlockReverb.to_string(), "synth_one_block:reverb");
        assert_eq!(ProbeId::OneBlockVoices.to_string(), "synth_one_block:all voices");
    }

    #[test]
    fn test_new_slot_is_empty() {
        let snap = ProbeSlot::new().snapshot();
        assert_eq!(snap, ProbeSnapshot::EMPTY);
        assert!(snap.is_empty());
        assert_eq!(snap.min, f64::INFINITY);
        assert_eq!(snap.max, f64::NEG_INFINITY);
        assert_eq!(snap.average(), None);
    }

    #[test]
    fn test_observe_tracks_min_max_total() {
        let slot = ProbeSlot::new();
        let deltas = [12.0, 3.5, 40.25, 7.0, 3.5];
        for d in deltas {
            slot.observe(d, 1, 64);
        }

        let snap = slot.snapshot();
        assert_eq!(snap.count, 5);
        assert_eq!(snap.min, 3.5);
        assert_eq!(snap.max, 40.25);
        assert!((snap.total - deltas.iter().sum::<f64>()).abs() < 1e-9);
        assert!(snap.min <= snap.max);
        assert_eq!(snap.n_voices, 5);
        assert_eq!(snap.n_samples, 320);
    }

    #[test]
    fn test_single_observation_sets_both_bounds() {
        let slot = ProbeSlot::new();
        slot.observe(9.0, 0, 0);
        let snap = slot.snapshot();
        assert_eq!(snap.min, 9.0);
        assert_eq!(snap.max, 9.0);
        assert_eq!(snap.average(), Some(9.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let slot = ProbeSlot::new();
        slot.observe(5.0, 4, 128);
        slot.reset();
        assert_eq!(slot.snapshot(), ProbeSlot::new().snapshot());
    }

    #[test]
    fn test_cpu_load() {
        // 64 frames at 64 kHz = 1000 us of audio; 250 us spent = 25%
        let snap = ProbeSnapshot {
            min: 250.0,
            max: 250.0,
            total: 250.0,
            count: 1,
            n_voices: 0,
            n_samples: 64,
        };
        assert!((snap.cpu_load(64_000.0) - 25.0).abs() < 1e-9);

        let no_samples = ProbeSnapshot { n_samples: 0, ..snap };
        assert_eq!(no_samples.cpu_load(64_000.0), 0.0);
    }

    #[test]
    fn test_average_voices() {
        let snap = ProbeSnapshot {
            min: 1.0,
            max: 1.0,
            total: 3.0,
            count: 3,
            n_voices: 10,
            n_samples: 0,
        };
        assert_eq!(snap.average_voices(), 3);
    }
}
