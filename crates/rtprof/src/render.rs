//! Synthetic block renderer
//!
//! Stands in for a synthesizer's render loop so the profiling path can be
//! exercised end to end: every block is split into the same regions a real
//! synth has (clear, voices, reverb, chorus) and each region is bracketed
//! with `Instrument::record`. The DSP is deliberately trivial; what matters is
//! that the loop is allocation-free and the tick advances by the block size.
//!
//! Note-on / release events are generated every `note_period` blocks so the
//! multi-block `VoiceNote` and `VoiceRelease` probes get data too.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::probe::ProbeId;
use crate::profiler::Instrument;

/// Upper bound on simultaneously rendered voices
pub const MAX_VOICES: usize = 256;

/// Blocks between two note-on events
pub const DEFAULT_NOTE_PERIOD: u64 = 64;

/// Blocks the pacer may fall behind before it stops trying to catch up
const MAX_LAG_BLOCKS: u32 = 8;

pub struct RenderEngine<I: Instrument + ?Sized> {
    instrument: Arc<I>,
    dsp: Dsp,
    notes: NoteCycle,
    voices: Arc<AtomicU32>,
    tick: u64,
    blocks: u64,
}

impl<I: Instrument + ?Sized> RenderEngine<I> {
    pub fn new(instrument: Arc<I>, config: &rtprofconf::RenderConfig) -> Self {
        Self {
            instrument,
            dsp: Dsp::new(config.sample_rate.max(1) as f32, config.block_size.max(1) as usize),
            notes: NoteCycle::new(DEFAULT_NOTE_PERIOD),
            voices: Arc::new(AtomicU32::new(config.voices.min(MAX_VOICES as u32))),
            tick: 0,
            blocks: 0,
        }
    }

    pub fn with_note_period(mut self, blocks: u64) -> Self {
        self.notes = NoteCycle::new(blocks);
        self
    }

    /// Shared voice count; writes take effect at the next block.
    pub fn voices_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.voices)
    }

    pub fn block_size(&self) -> usize {
        self.dsp.buffer.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.dsp.sample_rate
    }

    /// Wall-clock length of one block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size() as f64 / f64::from(self.sample_rate()))
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Render one block and report it to the instrument.
    pub fn render_block(&mut self) -> &[f32] {
        let instrument = &*self.instrument;
        let dsp = &mut self.dsp;
        let samples = dsp.buffer.len() as u32;
        let voices = self.voices.load(Ordering::Relaxed).min(MAX_VOICES as u32);

        self.notes.step(self.blocks, instrument, voices);

        let block_start = instrument.reference();
        dsp.clear();
        let r = instrument.record(ProbeId::OneBlockClear, block_start, 0, samples);

        let voices_start = r;
        let mut r = r;
        for voice in 0..voices as usize {
            dsp.render_voice(voice);
            r = instrument.record(ProbeId::OneBlockVoice, r, 1, samples);
        }
        let r = instrument.record(ProbeId::OneBlockVoices, voices_start, voices, samples);

        dsp.reverb();
        let r = instrument.record(ProbeId::OneBlockReverb, r, voices, samples);

        dsp.chorus();
        instrument.record(ProbeId::OneBlockChorus, r, voices, samples);
        instrument.record(ProbeId::OneBlock, block_start, voices, samples);

        self.tick += u64::from(samples);
        self.blocks += 1;
        instrument.on_block_rendered(self.tick, block_start, voices, samples);

        &dsp.buffer
    }
}

/// Signal state of the renderer, preallocated at construction.
struct Dsp {
    sample_rate: f32,
    buffer: Vec<f32>,
    phases: Box<[f32; MAX_VOICES]>,
    reverb_state: f32,
    chorus_state: f32,
}

impl Dsp {
    fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate,
            buffer: vec![0.0; block_size],
            phases: Box::new([0.0; MAX_VOICES]),
            reverb_state: 0.0,
            chorus_state: 0.0,
        }
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }

    fn render_voice(&mut self, voice: usize) {
        // Voices spread over a few octaves above 110 Hz
        let freq = 110.0 * (1.0 + voice as f32 * 0.0625);
        let step = freq / self.sample_rate;
        let mut phase = self.phases[voice];
        for sample in self.buffer.iter_mut() {
            *sample += (phase * TAU).sin() * 0.05;
            phase += step;
            if phase >= 1.0 {
                phase -= 1.0;
            }
        }
        self.phases[voice] = phase;
    }

    fn reverb(&mut self) {
        let mut state = self.reverb_state;
        for sample in self.buffer.iter_mut() {
            state = state * 0.97 + *sample * 0.03;
            *sample += state * 0.3;
        }
        self.reverb_state = state;
    }

    fn chorus(&mut self) {
        let mut state = self.chorus_state;
        for sample in self.buffer.iter_mut() {
            let dry = *sample;
            *sample = dry * 0.7 + state * 0.3;
            state = dry;
        }
        self.chorus_state = state;
    }
}

/// Note-on / release timing for the multi-block voice probes.
struct NoteCycle {
    period: u64,
    /// Start of the sounding note, closed on release
    note_started: Option<f64>,
    /// Start of the release phase, closed at the next note-on
    release_started: Option<f64>,
}

impl NoteCycle {
    fn new(period: u64) -> Self {
        Self {
            period: period.max(2),
            note_started: None,
            release_started: None,
        }
    }

    fn step<I: Instrument + ?Sized>(&mut self, block: u64, instrument: &I, voices: u32) {
        let phase = block % self.period;
        if phase == 0 {
            if let Some(r) = self.release_started.take() {
                instrument.record(ProbeId::VoiceRelease, r, voices, 0);
            }
            self.note_started = Some(instrument.reference());
        } else if phase == self.period / 2 {
            if let Some(r) = self.note_started.take() {
                instrument.record(ProbeId::VoiceNote, r, voices, 0);
            }
            self.release_started = Some(instrument.reference());
        }
    }
}

/// Render engine running on its own thread, paced to real time.
pub struct RenderThread {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<u64>>,
}

impl RenderThread {
    pub fn spawn<I>(mut engine: RenderEngine<I>) -> std::io::Result<Self>
    where
        I: Instrument + ?Sized + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_thread = Arc::clone(&running);
        let block_duration = engine.block_duration();

        info!(
            "render thread starting: {} frames @ {} Hz ({:?} per block)",
            engine.block_size(),
            engine.sample_rate(),
            block_duration
        );

        let thread_handle = thread::Builder::new()
            .name("rtprof-render".to_string())
            .spawn(move || {
                let mut deadline = Instant::now();
                while running_for_thread.load(Ordering::Acquire) {
                    engine.render_block();

                    deadline += block_duration;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else if now - deadline > block_duration * MAX_LAG_BLOCKS {
                        // Too far behind to catch up, start pacing from here
                        deadline = now;
                    }
                }
                engine.blocks()
            })?;

        Ok(Self {
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop and join, returning the number of blocks rendered.
    pub fn stop(&mut self) -> u64 {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.thread_handle.take() else {
            return 0;
        };
        debug!("waiting for render thread to stop...");
        match handle.join() {
            Ok(blocks) => {
                info!("render thread stopped after {} blocks", blocks);
                blocks
            }
            Err(_) => {
                warn!("render thread panicked");
                0
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}
