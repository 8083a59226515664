//! Profiling command shell
//!
//! The control-plane side of a measurement: it owns the lock gate for the
//! duration of a run, starts each measure, polls the session (and the
//! operator) until it completes or is canceled, and writes the reports.
//!
//! Commands:
//!
//! | command                           | effect                                  |
//! |-----------------------------------|-----------------------------------------|
//! | `prof_start [n_prof] [dur_ms]`    | run `n_prof` measures of `dur_ms` each  |
//! | `prof_set_print <0\|1>`           | 0 = cpu load summary, 1 = full table    |
//! | `prof_set_voices <n>`             | number of voices the renderer plays     |
//! | `prof_stop`                       | force the session back to stopped       |
//! | `prof_status`                     | session state and current settings      |
//! | `help`                            | list commands                           |
//! | `quit`                            | leave the shell                         |

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancelPoller;
use crate::clock::{Clock, MonotonicClock};
use crate::error::ProfileError;
use crate::profiler::Profiler;
use crate::report::PrintMode;
use crate::session::SessionStatus;

const HELP: &str = "\
prof_start [n_prof] [dur_ms]  Start n_prof measures of dur_ms each (ENTER cancels)
prof_set_print <0|1>          Report layout: 0 = cpu load summary, 1 = full table
prof_set_voices <n>           Number of voices the renderer plays
prof_stop                     Force the profiling session back to stopped
prof_status                   Show session state and settings
help                          Show this help
quit                          Leave the shell
";

/// Parameters of a profiling run.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellSettings {
    pub n_prof: u16,
    pub duration_ms: u32,
    pub print_mode: PrintMode,
    pub voices: u32,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            n_prof: rtprofconf::ProfilingConfig::DEFAULT_N_PROF,
            duration_ms: rtprofconf::ProfilingConfig::DEFAULT_DURATION_MS,
            print_mode: PrintMode::Load,
            voices: rtprofconf::RenderConfig::default().voices,
        }
    }
}

impl ShellSettings {
    pub fn from_config(config: &rtprofconf::RtProfConfig) -> Self {
        Self {
            n_prof: config.profiling.n_prof.max(1),
            duration_ms: config.profiling.duration_ms,
            print_mode: PrintMode::try_from(config.profiling.print_mode).unwrap_or_default(),
            voices: config.render.voices,
        }
    }
}

/// How a profiling run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasureOutcome {
    /// Measures that reached Ready and were reported
    pub completed: u16,
    /// True when the run was abandoned before all measures completed
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Start {
        n_prof: Option<u16>,
        duration_ms: Option<u32>,
    },
    SetPrint(PrintMode),
    SetVoices(u32),
    Stop,
    Status,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ProfileError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name {
            "prof_start" => {
                expect_at_most(name, &args, 2)?;
                let n_prof = args
                    .first()
                    .map(|s| parse_number::<u16>("n_prof", s))
                    .transpose()?;
                if n_prof == Some(0) {
                    return Err(ProfileError::InvalidArgument(
                        "n_prof must be at least 1".to_string(),
                    ));
                }
                let duration_ms = args
                    .get(1)
                    .map(|s| parse_number::<u32>("duration", s))
                    .transpose()?;
                ShellCommand::Start {
                    n_prof,
                    duration_ms,
                }
            }
            "prof_set_print" => {
                let raw = required_arg(name, &args)?;
                ShellCommand::SetPrint(PrintMode::try_from(parse_number::<u8>("print mode", raw)?)?)
            }
            "prof_set_voices" => {
                let raw = required_arg(name, &args)?;
                ShellCommand::SetVoices(parse_number("voices", raw)?)
            }
            "prof_stop" => ShellCommand::Stop,
            "prof_status" => ShellCommand::Status,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => {
                return Err(ProfileError::InvalidArgument(format!(
                    "unknown command '{other}' (try 'help')"
                )))
            }
        };
        Ok(Some(command))
    }
}

fn required_arg<'a>(command: &str, args: &[&'a str]) -> Result<&'a str, ProfileError> {
    expect_at_most(command, args, 1)?;
    args.first().copied().ok_or_else(|| {
        ProfileError::InvalidArgument(format!("{command} needs an argument"))
    })
}

fn expect_at_most(command: &str, args: &[&str], max: usize) -> Result<(), ProfileError> {
    if args.len() > max {
        return Err(ProfileError::InvalidArgument(format!(
            "{command} takes at most {max} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T, ProfileError> {
    raw.parse()
        .map_err(|_| ProfileError::InvalidArgument(format!("{what}: '{raw}' is not a valid number")))
}

/// What the caller should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlow {
    Continue,
    Quit,
}

pub struct ProfileShell<C: Clock = MonotonicClock> {
    profiler: Arc<Profiler<C>>,
    settings: ShellSettings,
    poll_interval: Duration,
    enabled: bool,
    /// Voice count of the renderer, when there is one to drive
    voices: Option<Arc<AtomicU32>>,
}

impl<C: Clock> ProfileShell<C> {
    pub fn new(profiler: Arc<Profiler<C>>, settings: ShellSettings) -> Self {
        Self {
            profiler,
            settings,
            poll_interval: Duration::from_millis(
                rtprofconf::ProfilingConfig::DEFAULT_POLL_INTERVAL_MS,
            ),
            enabled: true,
            voices: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Let `prof_set_voices` drive a renderer's voice count.
    pub fn with_voices(mut self, voices: Arc<AtomicU32>) -> Self {
        voices.store(self.settings.voices, Ordering::Relaxed);
        self.voices = Some(voices);
        self
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    pub fn profiler(&self) -> &Arc<Profiler<C>> {
        &self.profiler
    }

    /// Run `settings.n_prof` measures back to back.
    ///
    /// Holds the lock gate for the whole run; the guard releases it on every
    /// exit path, including errors from `out`.
    pub fn run_measures<P, W>(
        &self,
        settings: &ShellSettings,
        poller: &mut P,
        out: &mut W,
    ) -> Result<MeasureOutcome, ProfileError>
    where
        P: CancelPoller + ?Sized,
        W: Write + ?Sized,
    {
        if !self.enabled {
            return Err(ProfileError::Disabled);
        }
        let _gate = self.profiler.gate().try_lock()?;

        writeln!(
            out,
            " Number of measures(n_prof):{}, duration of one measure(dur):{}ms",
            settings.n_prof, settings.duration_ms
        )?;
        writeln!(out, " Profiling running, press <ENTER> to cancel")?;
        info!(
            "profiling {} measure(s) of {} ms",
            settings.n_prof, settings.duration_ms
        );

        let mut outcome = MeasureOutcome::default();
        for measure in 1..=settings.n_prof {
            let ended = self.measure_once(settings, measure, poller, out).inspect_err(|_| {
                self.profiler.stop();
            })?;

            match ended {
                SessionStatus::Ready => outcome.completed += 1,
                SessionStatus::Canceled => {
                    writeln!(out, " Profiling canceled")?;
                    outcome.canceled = true;
                    break;
                }
                other => {
                    writeln!(out, " Profiling stopped ({other})")?;
                    outcome.canceled = true;
                    break;
                }
            }
        }

        info!(
            completed = outcome.completed,
            canceled = outcome.canceled,
            "profiling run finished"
        );
        Ok(outcome)
    }

    /// One measure: start, poll until it leaves Started, report if Ready.
    /// Always leaves the session stopped.
    fn measure_once<P, W>(
        &self,
        settings: &ShellSettings,
        measure: u16,
        poller: &mut P,
        out: &mut W,
    ) -> Result<SessionStatus, ProfileError>
    where
        P: CancelPoller + ?Sized,
        W: Write + ?Sized,
    {
        self.profiler.start(settings.duration_ms, true)?;
        debug!("measure {} of {} started", measure, settings.n_prof);

        loop {
            if poller.cancel_pressed() {
                self.profiler.request_cancel();
            }

            match self.profiler.poll() {
                SessionStatus::Started => {
                    let remaining_ms = self.profiler.session().remaining_ticks() as f64 * 1000.0
                        / self.profiler.sample_rate();
                    write!(out, "\r Profiling: measure {measure}, remaining {remaining_ms:>6.0} ms")?;
                    out.flush()?;
                    thread::sleep(self.poll_interval);
                }
                SessionStatus::Ready => {
                    writeln!(out)?;
                    out.write_all(self.profiler.report_with(settings.print_mode).as_bytes())?;
                    self.profiler.stop();
                    return Ok(SessionStatus::Ready);
                }
                ended => {
                    writeln!(out)?;
                    self.profiler.stop();
                    return Ok(ended);
                }
            }
        }
    }

    /// Execute one parsed command, writing its output to `out`.
    pub fn execute<P, W>(
        &mut self,
        command: ShellCommand,
        poller: &mut P,
        out: &mut W,
    ) -> Result<ShellFlow, ProfileError>
    where
        P: CancelPoller + ?Sized,
        W: Write + ?Sized,
    {
        match command {
            ShellCommand::Start {
                n_prof,
                duration_ms,
            } => {
                if let Some(n) = n_prof {
                    self.settings.n_prof = n;
                }
                if let Some(ms) = duration_ms {
                    self.settings.duration_ms = ms;
                }
                let settings = self.settings.clone();
                self.run_measures(&settings, poller, out)?;
            }
            ShellCommand::SetPrint(mode) => {
                self.settings.print_mode = mode;
                writeln!(out, " print mode: {}", u8::from(mode))?;
            }
            ShellCommand::SetVoices(n) => {
                self.settings.voices = n;
                match &self.voices {
                    Some(voices) => voices.store(n, Ordering::Relaxed),
                    None => warn!("no renderer attached, voice count only recorded"),
                }
                writeln!(out, " voices: {n}")?;
            }
            ShellCommand::Stop => {
                // A run in progress owns the session until it releases the gate
                let _gate = self.profiler.gate().try_lock()?;
                let previous = self.profiler.stop();
                writeln!(out, " profiling stopped (was {previous})")?;
            }
            ShellCommand::Status => {
                self.write_status(out)?;
            }
            ShellCommand::Help => {
                out.write_all(HELP.as_bytes())?;
            }
            ShellCommand::Quit => return Ok(ShellFlow::Quit),
        }
        Ok(ShellFlow::Continue)
    }

    fn write_status<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProfileError> {
        let session = self.profiler.session();
        writeln!(
            out,
            " status: {}  busy: {}  tick: {}",
            session.status(),
            self.profiler.gate().is_held(),
            session.current_tick()
        )?;
        writeln!(
            out,
            " n_prof: {}  duration: {} ms  print mode: {}  voices: {}  enabled: {}",
            self.settings.n_prof,
            self.settings.duration_ms,
            u8::from(self.settings.print_mode),
            self.settings.voices,
            self.enabled
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{FlagCancel, NeverCancel};
    use crate::clock::ManualClock;
    use crate::profiler::Instrument;
    use std::sync::atomic::AtomicBool;

    fn shell() -> ProfileShell<ManualClock> {
        let profiler = Arc::new(Profiler::with_clock(48_000.0, ManualClock::new()));
        ProfileShell::new(profiler, ShellSettings::default())
            .with_poll_interval(Duration::from_millis(1))
    }

    /// Stand-in render thread: 64-frame blocks until told to stop.
    fn drive_blocks(
        profiler: Arc<Profiler<ManualClock>>,
        running: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut tick = 0u64;
            while running.load(Ordering::Relaxed) {
                let r = profiler.reference();
                profiler.clock().advance(100.0);
                tick += 64;
                profiler.on_block_rendered(tick, r, 2, 64);
                thread::sleep(Duration::from_micros(200));
            }
        })
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("   ").unwrap(), None);
        assert_eq!(
            ShellCommand::parse("prof_start 3 250").unwrap(),
            Some(ShellCommand::Start {
                n_prof: Some(3),
                duration_ms: Some(250)
            })
        );
        assert_eq!(
            ShellCommand::parse("prof_start").unwrap(),
            Some(ShellCommand::Start {
                n_prof: None,
                duration_ms: None
            })
        );
        assert_eq!(
            ShellCommand::parse("prof_set_print 1").unwrap(),
            Some(ShellCommand::SetPrint(PrintMode::Full))
        );
        assert_eq!(
            ShellCommand::parse("prof_set_voices 40").unwrap(),
            Some(ShellCommand::SetVoices(40))
        );
        assert_eq!(ShellCommand::parse("quit").unwrap(), Some(ShellCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "prof_start 0",
            "prof_start x",
            "prof_start 1 2 3",
            "prof_set_print 2",
            "prof_set_print",
            "prof_set_voices -1",
            "frobnicate",
        ] {
            let err = ShellCommand::parse(bad).unwrap_err();
            assert!(matches!(err, ProfileError::InvalidArgument(_)), "{bad}");
        }
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = rtprofconf::RtProfConfig::default();
        config.profiling.n_prof = 4;
        config.profiling.duration_ms = 120;
        config.profiling.print_mode = 1;
        config.render.voices = 7;

        let settings = ShellSettings::from_config(&config);
        assert_eq!(settings.n_prof, 4);
        assert_eq!(settings.duration_ms, 120);
        assert_eq!(settings.print_mode, PrintMode::Full);
        assert_eq!(settings.voices, 7);
    }

    #[test]
    fn test_busy_gate_rejects_run() {
        let shell = shell();
        let _held = shell.profiler().gate().try_lock().unwrap();

        let mut out = Vec::new();
        let err = shell
            .run_measures(&ShellSettings::default(), &mut NeverCancel, &mut out)
            .unwrap_err();
        assert!(matches!(err, ProfileError::SessionAlreadyActive));
        assert_eq!(shell.profiler().poll(), SessionStatus::Stopped);
    }

    #[test]
    fn test_disabled_shell() {
        let shell = shell().with_enabled(false);
        let err = shell
            .run_measures(&ShellSettings::default(), &mut NeverCancel, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ProfileError::Disabled));
    }

    #[test]
    fn test_cancel_abandons_run() {
        let shell = shell();
        let mut poller = FlagCancel::new();
        poller.handle().store(true, Ordering::Release);

        let settings = ShellSettings {
            n_prof: 3,
            duration_ms: 60_000,
            ..ShellSettings::default()
        };
        let mut out = Vec::new();
        let outcome = shell.run_measures(&settings, &mut poller, &mut out).unwrap();

        assert_eq!(
            outcome,
            MeasureOutcome {
                completed: 0,
                canceled: true
            }
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Profiling canceled"));
        assert_eq!(shell.profiler().poll(), SessionStatus::Stopped);
        assert!(!shell.profiler().gate().is_held());
    }

    #[test]
    fn test_measures_complete_and_report() {
        let shell = shell();
        let running = Arc::new(AtomicBool::new(true));
        let driver = drive_blocks(Arc::clone(shell.profiler()), Arc::clone(&running));

        let settings = ShellSettings {
            n_prof: 2,
            duration_ms: 5,
            print_mode: PrintMode::Full,
            voices: 2,
        };
        let mut out = Vec::new();
        let outcome = shell
            .run_measures(&settings, &mut NeverCancel, &mut out)
            .unwrap();

        running.store(false, Ordering::Relaxed);
        driver.join().unwrap();

        assert_eq!(outcome.completed, 2);
        assert!(!outcome.canceled);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("synth_write_*").count(), 2);
        assert!(!shell.profiler().gate().is_held());
    }

    #[test]
    fn test_execute_updates_settings() {
        let mut shell = shell();
        let voices = Arc::new(AtomicU32::new(0));
        shell = shell.with_voices(Arc::clone(&voices));
        let mut out = Vec::new();

        let flow = shell
            .execute(ShellCommand::SetVoices(12), &mut NeverCancel, &mut out)
            .unwrap();
        assert_eq!(flow, ShellFlow::Continue);
        assert_eq!(voices.load(Ordering::Relaxed), 12);

        shell
            .execute(ShellCommand::SetPrint(PrintMode::Full), &mut NeverCancel, &mut out)
            .unwrap();
        assert_eq!(shell.settings().print_mode, PrintMode::Full);

        shell
            .execute(ShellCommand::Status, &mut NeverCancel, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("status: stopped"));
        assert!(text.contains("voices: 12"));

        let flow = shell
            .execute(ShellCommand::Quit, &mut NeverCancel, &mut Vec::new())
            .unwrap();
        assert_eq!(flow, ShellFlow::Quit);
    }

    #[test]
    fn test_execute_stop_forces_stopped() {
        let mut shell = shell();
        shell.profiler().start_session(1_000, true).unwrap();

        let mut out = Vec::new();
        shell
            .execute(ShellCommand::Stop, &mut NeverCancel, &mut out)
            .unwrap();
        assert_eq!(shell.profiler().poll(), SessionStatus::Stopped);
        assert!(String::from_utf8(out).unwrap().contains("was started"));
        assert!(!shell.profiler().gate().is_held());
    }

    #[test]
    fn test_execute_stop_is_busy_while_gate_held() {
        let mut shell = shell();
        shell.profiler().start_session(1_000, true).unwrap();
        let profiler = std::sync::Arc::clone(shell.profiler());
        let _held = profiler.gate().try_lock().unwrap();

        let mut out = Vec::new();
        let err = shell
            .execute(ShellCommand::Stop, &mut NeverCancel, &mut out)
            .unwrap_err();
        assert!(matches!(err, ProfileError::SessionAlreadyActive));
        assert_eq!(shell.profiler().poll(), SessionStatus::Started);
        assert!(out.is_empty());
    }
}
