//! Report formatting
//!
//! A `Report` is captured once from the registry after a session reaches
//! `Ready`; everything after capture works on the copy, so formatting never
//! races the render thread.
//!
//! Two layouts are available:
//!
//! - **Full**: one row per probe with data (voices, count, min/avg/max in
//!   microseconds, cpu load for block probes)
//! - **Load**: a single summary row of cpu loads plus an estimate of the
//!   maximum polyphony the renderer could sustain

use std::fmt;

use crate::error::ProfileError;
use crate::probe::{ProbeId, ProbeSnapshot};
use crate::registry::ProbeRegistry;

const RULE: &str =
    " ------------------------------------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintMode {
    /// Cpu load summary only
    #[default]
    Load,
    /// Every probe with min/avg/max durations
    Full,
}

impl TryFrom<u8> for PrintMode {
    type Error = ProfileError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PrintMode::Load),
            1 => Ok(PrintMode::Full),
            other => Err(ProfileError::InvalidArgument(format!(
                "print mode must be 0 (load) or 1 (full), got {other}"
            ))),
        }
    }
}

impl From<PrintMode> for u8 {
    fn from(mode: PrintMode) -> Self {
        match mode {
            PrintMode::Load => 0,
            PrintMode::Full => 1,
        }
    }
}

/// One report row: a probe that has at least one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportRow {
    pub probe: ProbeId,
    pub snapshot: ProbeSnapshot,
    /// Cpu load in percent, `None` for probes not bounded by a block
    pub load: Option<f64>,
}

impl ReportRow {
    pub fn average(&self) -> f64 {
        self.snapshot.average().unwrap_or(0.0)
    }
}

/// Cpu load summary derived from the block probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSummary {
    pub voices: u32,
    pub total: f64,
    pub all_voices: f64,
    pub reverb: f64,
    pub chorus: f64,
    pub one_voice: f64,
    /// `None` when the per-voice load could not be estimated
    pub max_voices: Option<u32>,
}

/// Snapshot of the registry plus the sample rate it was rendered at.
#[derive(Debug, Clone)]
pub struct Report {
    sample_rate: f64,
    probes: [(ProbeId, ProbeSnapshot); ProbeId::COUNT],
}

impl Report {
    pub fn capture(registry: &ProbeRegistry, sample_rate: f64) -> Self {
        Self {
            sample_rate,
            probes: registry.snapshots(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.probes.iter().all(|(_, snap)| snap.is_empty())
    }

    pub fn snapshot(&self, probe: ProbeId) -> ProbeSnapshot {
        self.probes[probe.index()].1
    }

    /// Probes with data, in report order. Empty probes are skipped.
    pub fn rows(&self) -> impl Iterator<Item = ReportRow> + '_ {
        self.probes
            .iter()
            .filter(|(_, snap)| !snap.is_empty())
            .map(|&(probe, snapshot)| ReportRow {
                probe,
                snapshot,
                load: probe
                    .is_block_probe()
                    .then(|| snapshot.cpu_load(self.sample_rate)),
            })
    }

    /// Load figures for the summary layout, `NoDataAvailable` before any block
    /// was recorded.
    pub fn load_summary(&self) -> Result<LoadSummary, ProfileError> {
        let write = self.snapshot(ProbeId::Write);
        if write.is_empty() {
            return Err(ProfileError::NoDataAvailable);
        }

        let voices_probe = self.snapshot(ProbeId::OneBlockVoices);
        let voices = voices_probe.average_voices();
        let load = |id: ProbeId| self.snapshot(id).cpu_load(self.sample_rate);

        let total = load(ProbeId::Write);
        let all_voices = load(ProbeId::OneBlockVoices);
        let reverb = load(ProbeId::OneBlockReverb);
        let chorus = load(ProbeId::OneBlockChorus);
        let one_voice = if voices > 0 {
            all_voices / f64::from(voices)
        } else {
            0.0
        };

        let max_voices = (one_voice > 0.0)
            .then(|| ((100.0 - reverb - chorus) / one_voice).max(0.0) as u32);

        Ok(LoadSummary {
            voices,
            total,
            all_voices,
            reverb,
            chorus,
            one_voice,
            max_voices,
        })
    }

    pub fn format(&self, mode: PrintMode) -> String {
        match mode {
            PrintMode::Full => self.to_string(),
            PrintMode::Load => self.format_load(),
        }
    }

    fn format_load(&self) -> String {
        LoadTable(self).to_string()
    }

    fn sample_period(&self) -> f64 {
        if self.sample_rate > 0.0 {
            1_000_000.0 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// Cpu load summary layout of a report.
struct LoadTable<'a>(&'a Report);

impl fmt::Display for LoadTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let Ok(summary) = report.load_summary() else {
            return writeln!(f, " No profiling data available.");
        };

        writeln!(
            f,
            " Cpu loads(%) (sr:{:6.0} Hz, sp:{:6.2} microsecond) and maximum voices",
            report.sample_rate,
            report.sample_period()
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            " nVoices| total(%)|voices(%)| reverb(%)| chorus(%)| voice(%)|estimated maxVoices"
        )?;
        writeln!(
            f,
            " -------|---------|---------|----------|----------|---------|-------------------"
        )?;
        write!(
            f,
            "{:>8}|{:>9.3}|{:>9.3}|{:>10.3}|{:>10.3}|{:>9.3}|",
            summary.voices,
            summary.total,
            summary.all_voices,
            summary.reverb,
            summary.chorus,
            summary.one_voice,
        )?;
        match summary.max_voices {
            Some(n) => writeln!(f, "{n:>19}"),
            None => writeln!(f, "{:>19}", "not available"),
        }
    }
}

/// Full per-probe table.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, " No profiling data available.");
        }

        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            " Duration(microsecond) and cpu loads(%) (sr:{:6.0} Hz, sp:{:6.2} microsecond)",
            self.sample_rate,
            self.sample_period()
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            " Code under profiling       |Voices|  Count|       Duration (microsecond)   |  Load(%)"
        )?;
        writeln!(
            f,
            "                            |   nbr|       |       min|       avg|       max|"
        )?;
        writeln!(
            f,
            " ---------------------------|------|-------|--------------------------------|----------"
        )?;

        for row in self.rows() {
            let snap = &row.snapshot;
            write!(
                f,
                " {}|{:>6}|{:>7}|{:>10.2}|{:>10.2}|{:>10.2}|",
                row.probe.description(),
                snap.average_voices(),
                snap.count,
                snap.min,
                row.average(),
                snap.max
            )?;
            match row.load {
                Some(load) => writeln!(f, "{load:>8.3}")?,
                None => writeln!(f)?,
            }
        }
        Ok(())
    }
}

/// Render the full table for an arbitrary set of probe snapshots.
///
/// Probes without observations are omitted; an all-empty input produces the
/// "no data" line instead of an empty table.
pub fn format_report(sample_rate: f64, probes: &[(ProbeId, ProbeSnapshot)]) -> String {
    let registry_order = ProbeId::ALL.map(|id| {
        probes
            .iter()
            .find(|(probe, _)| *probe == id)
            .map(|(_, snap)| (id, *snap))
            .unwrap_or((id, ProbeSnapshot::EMPTY))
    });
    Report {
        sample_rate,
        probes: registry_order,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_block(total: f64, voices: u32, samples: u32) -> ProbeRegistry {
        let registry = ProbeRegistry::new();
        registry.slot(ProbeId::Write).observe(total, voices, samples);
        registry.slot(ProbeId::OneBlock).observe(total * 0.9, voices, samples);
        registry
            .slot(ProbeId::OneBlockVoices)
            .observe(total * 0.5, voices, samples);
        registry
            .slot(ProbeId::OneBlockReverb)
            .observe(total * 0.2, 0, samples);
        registry
            .slot(ProbeId::OneBlockChorus)
            .observe(total * 0.1, 0, samples);
        registry
    }

    #[test]
    fn test_empty_report() {
        let report = Report::capture(&ProbeRegistry::new(), 44100.0);
        assert!(report.is_empty());
        assert_eq!(report.rows().count(), 0);
        assert!(report.to_string().contains("No profiling data"));
        assert!(report.format(PrintMode::Load).contains("No profiling data"));
        assert!(matches!(
            report.load_summary(),
            Err(ProfileError::NoDataAvailable)
        ));
    }

    #[test]
    fn test_rows_skip_empty_probes() {
        let registry = ProbeRegistry::new();
        registry.slot(ProbeId::OneBlockReverb).observe(5.0, 0, 64);
        let report = Report::capture(&registry, 44100.0);

        let rows: Vec<_> = report.rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].probe, ProbeId::OneBlockReverb);

        let text = report.to_string();
        assert!(text.contains(ProbeId::OneBlockReverb.description()));
        for id in ProbeId::ALL {
            if id != ProbeId::OneBlockReverb {
                assert!(!text.contains(id.description()), "{id:?} should be omitted");
            }
        }
    }

    #[test]
    fn test_note_probes_have_no_load_column() {
        let registry = ProbeRegistry::new();
        registry.slot(ProbeId::VoiceNote).observe(80.0, 1, 0);
        let report = Report::capture(&registry, 44100.0);

        let row = report.rows().next().unwrap();
        assert_eq!(row.load, None);
        let line = report
            .to_string()
            .lines()
            .find(|l| l.contains("voice:note"))
            .unwrap()
            .to_string();
        assert!(line.ends_with('|'));
    }

    #[test]
    fn test_full_row_values() {
        // 64 frames at 64 kHz = 1 ms of audio, 100 us spent = 10 %
        let registry = registry_with_block(100.0, 4, 64);
        let report = Report::capture(&registry, 64_000.0);
        let text = report.format(PrintMode::Full);

        let write_line = text
            .lines()
            .find(|l| l.contains("synth_write_*"))
            .unwrap();
        assert!(write_line.contains("100.00"), "{write_line}");
        assert!(write_line.contains("10.000"), "{write_line}");
        assert!(write_line.contains("|     4|"), "{write_line}");
    }

    #[test]
    fn test_load_summary_estimates_polyphony() {
        // Write = 10 %, voices = 5 % for 4 voices -> 1.25 % per voice
        // reverb 2 %, chorus 1 % -> (100 - 3) / 1.25 = 77.6 voices
        let registry = registry_with_block(100.0, 4, 64);
        let report = Report::capture(&registry, 64_000.0);

        let summary = report.load_summary().unwrap();
        assert_eq!(summary.voices, 4);
        assert!((summary.total - 10.0).abs() < 1e-9);
        assert!((summary.all_voices - 5.0).abs() < 1e-9);
        assert!((summary.one_voice - 1.25).abs() < 1e-9);
        assert_eq!(summary.max_voices, Some(77));

        let text = report.format(PrintMode::Load);
        assert!(text.contains("estimated maxVoices"));
        assert!(text.contains("77"));
    }

    #[test]
    fn test_load_layout_summary_row() {
        let registry = registry_with_block(100.0, 4, 64);
        let report = Report::capture(&registry, 64_000.0);

        let text = LoadTable(&report).to_string();
        assert_eq!(text, report.format(PrintMode::Load));

        let row = text.lines().last().unwrap();
        let cells: Vec<&str> = row.split('|').map(str::trim).collect();
        assert_eq!(
            cells,
            ["4", "10.000", "5.000", "2.000", "1.000", "1.250", "77"]
        );
    }

    #[test]
    fn test_load_without_voices_is_not_available() {
        let registry = registry_with_block(100.0, 0, 64);
        let report = Report::capture(&registry, 64_000.0);

        assert_eq!(report.load_summary().unwrap().max_voices, None);
        assert!(report.format(PrintMode::Load).contains("not available"));
    }

    #[test]
    fn test_format_report_free_function_omits_empty() {
        let mut busy = ProbeSnapshot::EMPTY;
        busy.count = 2;
        busy.total = 30.0;
        busy.min = 10.0;
        busy.max = 20.0;
        busy.n_samples = 128;

        let text = format_report(
            48000.0,
            &[
                (ProbeId::OneBlockChorus, busy),
                (ProbeId::OneBlockClear, ProbeSnapshot::EMPTY),
            ],
        );
        assert!(text.contains("synth_one_block:chorus"));
        assert!(!text.contains("synth_one_block:clear"));
        assert!(text.contains("15.00"));
    }

    #[test]
    fn test_print_mode_conversions() {
        assert_eq!(PrintMode::try_from(0).unwrap(), PrintMode::Load);
        assert_eq!(PrintMode::try_from(1).unwrap(), PrintMode::Full);
        assert!(PrintMode::try_from(2).is_err());
        assert_eq!(u8::from(PrintMode::Full), 1);
    }
}
