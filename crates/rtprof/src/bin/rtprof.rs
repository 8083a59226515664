//! rtprof demo host
//!
//! Runs a synthetic render thread instrumented with profiling probes and an
//! interactive profiling shell on stdin:
//! - `prof_start [n_prof] [dur_ms]` measures, ENTER cancels
//! - `prof_set_print`, `prof_set_voices`, `prof_status`, `prof_stop`
//!
//! Commands can also be given with `--command` for scripted runs.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rtprof::{
    spawn_stdin_reader, CancelPoller, Instrument, LineCancel, NeverCancel, NullInstrument,
    ProfileShell, Profiler, RenderEngine, RenderThread, ShellCommand, ShellFlow, ShellSettings,
};
use rtprofconf::RtProfConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Realtime profiling probes on a synthetic audio render thread
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, replacing ./rtprof.toml
    #[arg(short, long, env = "RTPROF_CONFIG")]
    config: Option<PathBuf>,

    /// Render sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Frames per rendered block
    #[arg(long)]
    block_size: Option<u32>,

    /// Voices the renderer starts with
    #[arg(long)]
    voices: Option<u32>,

    /// Install the no-op instrument instead of the profiler
    #[arg(long)]
    no_profiling: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Shell command to run instead of reading stdin (repeatable)
    #[arg(short = 'e', long = "command")]
    commands: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        RtProfConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(rate) = cli.sample_rate {
        config.render.sample_rate = rate;
    }
    if let Some(size) = cli.block_size {
        config.render.block_size = size;
    }
    if let Some(voices) = cli.voices {
        config.render.voices = voices;
    }
    if cli.no_profiling {
        config.profiling.enabled = false;
    }
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    init_tracing(&config.telemetry.log_level);
    info!("rtprof {} starting", env!("CARGO_PKG_VERSION"));

    let profiler = Arc::new(Profiler::from_config(&config.render));
    let instrument: Arc<dyn Instrument> = if config.profiling.enabled {
        Arc::clone(&profiler) as Arc<dyn Instrument>
    } else {
        info!("profiling disabled, render thread uses the null instrument");
        Arc::new(NullInstrument)
    };

    let engine = RenderEngine::new(instrument, &config.render);
    let voices = engine.voices_handle();
    let mut render = RenderThread::spawn(engine).context("Failed to start render thread")?;

    let mut shell = ProfileShell::new(Arc::clone(&profiler), ShellSettings::from_config(&config))
        .with_poll_interval(Duration::from_millis(config.profiling.poll_interval_ms))
        .with_enabled(config.profiling.enabled)
        .with_voices(voices);

    let mut out = io::stdout().lock();
    if cli.commands.is_empty() {
        let mut lines = spawn_stdin_reader().context("Failed to start stdin reader")?;
        writeln!(out, "rtprof shell, type 'help' for commands")?;
        prompt(&mut out)?;
        while let Some(line) = lines.blocking_recv() {
            let flow = run_line(&mut shell, &line, &mut LineCancel::new(&mut lines), &mut out)?;
            if flow == ShellFlow::Quit {
                break;
            }
            prompt(&mut out)?;
        }
    } else {
        for line in &cli.commands {
            if run_line(&mut shell, line, &mut NeverCancel, &mut out)? == ShellFlow::Quit {
                break;
            }
        }
    }

    render.stop();
    profiler.log_summary();
    info!("rtprof shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Parse and execute one line. Command errors are printed, not fatal.
fn run_line<P, W>(
    shell: &mut ProfileShell,
    line: &str,
    poller: &mut P,
    out: &mut W,
) -> Result<ShellFlow>
where
    P: CancelPoller + ?Sized,
    W: Write + ?Sized,
{
    let command = match ShellCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(ShellFlow::Continue),
        Err(e) => {
            writeln!(out, " {e}")?;
            return Ok(ShellFlow::Continue);
        }
    };

    match shell.execute(command, poller, out) {
        Ok(flow) => Ok(flow),
        Err(e) => {
            warn!("command '{}' failed: {}", line.trim(), e);
            writeln!(out, " {e}")?;
            Ok(ShellFlow::Continue)
        }
    }
}

fn prompt<W: Write + ?Sized>(out: &mut W) -> io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}
