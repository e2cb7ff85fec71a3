use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use laser_show_core::{
    AppConfig, DebugSink, FrameAnalyzer, FrameSink, Program, Scheduler, TickClock, WireSink,
};
use tracing_subscriber::EnvFilter;

fn main() -> laser_show_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Render {
            program,
            windows,
            start_tick,
            output,
        } => {
            let mut session = Session::open(&config, &program, start_tick, windows)?;
            let mut sink = DebugSink::new(open_output(output.as_deref())?, config.debug.field);
            session.drive(&mut sink)?;
            tracing::info!(lines = sink.lines_written(), "debug stream written");
            Ok(())
        }
        Commands::Pack {
            program,
            windows,
            output,
        } => {
            let mut session = Session::open(&config, &program, 0, windows)?;
            let out = open_output(Some(output.as_path()))?;
            let mut sink = WireSink::new(out, config.transport.batch_samples)?;
            session.drive(&mut sink)?;
            tracing::info!(
                batches = sink.batches_written(),
                bytes = sink.batches_written() * sink.batch_bytes() as u64,
                ?output,
                "wire stream written"
            );
            Ok(())
        }
        Commands::Inspect { program, windows } => run_inspect(&config, &program, windows),
    }
}

fn run_inspect(config: &AppConfig, program: &Path, windows: Option<u32>) -> laser_show_core::Result<()> {
    let mut session = Session::open(config, program, 0, windows)?;
    let mut analyzer = FrameAnalyzer::new();

    for _ in 0..session.windows {
        let frame = session.scheduler.next_window(&mut session.clock, session.window_len);
        let summary = analyzer.summarize(frame)?;
        tracing::info!(
            start_tick = summary.start_tick,
            x_range = ?summary.x_range,
            y_range = ?summary.y_range,
            x_hz = ?summary.dominant_x_hz,
            y_hz = ?summary.dominant_y_hz,
            lit = summary.lit_ticks,
            active = session.scheduler.pool().active_count(),
            "window"
        );
    }
    Ok(())
}

/// A loaded program plus the clock that walks it window by window.
struct Session {
    scheduler: Scheduler,
    clock: TickClock,
    window_len: u32,
    windows: u32,
}

impl Session {
    fn open(
        config: &AppConfig,
        path: &Path,
        start_tick: u32,
        windows: Option<u32>,
    ) -> laser_show_core::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let program = Program::parse(&text)?;
        let mut scheduler = Scheduler::from_config(&config.engine);
        let report = program.load_into(&mut scheduler)?;
        if !report.dropped().is_empty() {
            tracing::warn!(dropped = ?report.dropped(), "some declarations did not fit in the pool");
        }

        let window_len = config.engine.window_len;
        let windows = windows.unwrap_or_else(|| {
            let remaining = program.end_tick().saturating_sub(start_tick);
            remaining.div_ceil(window_len).max(1)
        });
        tracing::info!(?path, windows, window_len, start_tick, "starting session");

        Ok(Self {
            scheduler,
            clock: TickClock::starting_at(start_tick),
            window_len,
            windows,
        })
    }

    fn drive(&mut self, sink: &mut dyn FrameSink) -> laser_show_core::Result<()> {
        for _ in 0..self.windows {
            let frame = self.scheduler.next_window(&mut self.clock, self.window_len);
            sink.consume(frame)?;
        }
        sink.finish()
    }
}

fn open_output(path: Option<&Path>) -> laser_show_core::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Oscillator-driven laser show synthesiser", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesise a program and print one value per tick.
    Render {
        /// Instruction file to load.
        program: PathBuf,
        /// Number of windows to evaluate; defaults to the program length.
        #[arg(short, long)]
        windows: Option<u32>,
        /// Tick the first window starts at.
        #[arg(long, default_value_t = 0)]
        start_tick: u32,
        /// Destination file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Synthesise a program and write the packed serial stream.
    Pack {
        program: PathBuf,
        #[arg(short, long)]
        windows: Option<u32>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Synthesise a program and log a spectral summary of each window.
    Inspect {
        program: PathBuf,
        #[arg(short, long)]
        windows: Option<u32>,
    },
}
