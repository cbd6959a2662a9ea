use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use batmon::{load_config, raise_priority, validate_table, Config};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "batmon")]
#[command(about = "Smart battery monitor over a bit-banged SMBus", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run the protection loop (default)
    Monitor,
    /// Print the battery state once
    Report {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Read one word of any command code, without retry
    Read {
        /// Command code, e.g. 0x16 or 22
        #[arg(value_parser = parse_command)]
        command: u8,
    },
}

fn parse_command(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid command code {s:?}: {e}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("batmon v{}", env!("CARGO_PKG_VERSION"));

    validate_table().context("Invalid register table")?;

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.validate().context("Invalid configuration")?;

    if let Some(priority) = config.bus.realtime_priority {
        if let Err(e) = raise_priority(priority) {
            log::warn!("{e}; bus transfers will be corrupted more often");
        }
    }

    run(args.command.unwrap_or(Command::Monitor), &config).await
}

#[cfg(feature = "rpi")]
async fn run(command: Command, config: &Config) -> Result<()> {
    use batmon::{LogSink, Monitor, SmartBattery, SoftBus, SpinDelay};

    let (lines, host) = batmon::rpi::open(config).context("Failed to set up GPIO")?;
    let bus = SoftBus::new(lines, SpinDelay, config.bus.quarter_period());
    let mut battery = SmartBattery::new(bus, config.bus.address);

    match command {
        Command::Monitor => {
            let monitor =
                Monitor::new(battery, host, LogSink::default(), config.monitor.settings());
            let reason = monitor.run().await;
            log::info!("Monitor stopped: {reason}");
        }
        Command::Report { json } => {
            let Some(state) = battery.snapshot() else {
                bail!("The battery did not respond");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print!("{state}");
            }
        }
        Command::Read { command } => {
            let read = battery.read_raw(command);
            if !read.transfer.acked {
                log::warn!("Command 0x{command:02x} was not acknowledged");
            }
            println!("{read}");
        }
    }

    Ok(())
}

#[cfg(not(feature = "rpi"))]
async fn run(_command: Command, _config: &Config) -> Result<()> {
    bail!("Built without GPIO support, enable the `rpi` feature")
}

/// Initialize logging based on verbosity level; `RUST_LOG` overrides it
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args())
        })
        .init();
}
