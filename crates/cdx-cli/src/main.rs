//! 🚀 cdx-cli — the thin layer between a shell prompt and the pipeline.
//!
//! 📦 It parses arguments, loads config, wires up Ctrl-C, and then stands
//! well back while the library does the actual colliding-with-databases.
//! Management, basically, but honest about it. 🦆
//!
//! Two jobs, two subcommands:
//! - `run` — ingest collision-event files into the configured sink
//! - `generate` — manufacture a synthetic event file for testing the above
//!   (because real beam time is expensive and the RNG works weekends)

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cdx::event::ParticleKind;
use cdx::parser::HEADER_LINE;

/// 🎛️ The command line, as a struct. clap does the arguing with the user.
#[derive(Parser, Debug)]
#[command(name = "cdx-cli")]
#[command(about = "collidr — concurrent collision-event ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 💥 Run an ingestion: config + input files → filtered rows in the sink
    Run {
        /// 🔧 Path to a TOML config file (env vars CDX_* work too)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// 📂 Input files, appended to whatever the config lists
        inputs: Vec<PathBuf>,
    },
    /// 🎲 Generate a synthetic event file — header plus N well-formed lines
    Generate {
        /// 🔢 How many events to manufacture
        #[arg(short = 'n', long, default_value_t = 10_000)]
        events: u64,
        /// 📂 Where to write the file
        #[arg(short, long)]
        out: PathBuf,
        /// 🌱 RNG seed, for when "random" needs to mean "the same every time"
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// 🚀 main() — parse, dispatch, and translate failure into an exit code
/// that a shell script can actually trust.
///
/// 🔧 Steps:
/// 1. Init tracing (so whatever goes wrong, goes wrong on the record)
/// 2. Parse args (clap argues with the user so we don't have to)
/// 3. Dispatch the subcommand (the part we practiced)
/// 4. Handle errors (loudly, with the causes attached)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 tracing first — everything after this line happens on the record
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config, inputs } => run_pipeline(config.as_deref(), inputs).await,
        Command::Generate { events, out, seed } => generate_events(events, &out, seed),
    };

    // 💀 The failure path gets more engineering than the happy path,
    // because that's the one people meet at 3am
    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 walk the cause chain outward — the bottom layer is usually
        // -- the honest one
        let mut smells_like_a_dead_connection = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            // -- 🕵️ pattern-match the causes for network-shaped failure
            let cause_str = cause.to_string();
            if cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
                || cause_str.contains("password authentication")
                || cause_str.contains("pool timed out")
            {
                smells_like_a_dead_connection = true;
            }
        }

        // -- 📡 one targeted hint beats a stack of causes when the actual
        // -- fix is "start the database"
        if smells_like_a_dead_connection {
            error!(
                "🔧 hint: looks like the database isn't reachable. \
                Double-check that Postgres is actually running and the URL in your \
                config is right. On Docker setups, `docker ps` will tell you whether \
                the container is even alive, and `docker compose up -d` will fix it \
                when it isn't. The elephant may simply not be home. ☕"
            );
        }

        // 🗑️ non-zero exit, no ceremony — scripts downstream deserve a clean signal
        std::process::exit(1);
    }

    // ✅ clean run, clean exit — the report already said everything worth saying
    Ok(())
}

/// 💥 The `run` subcommand: load config, bolt on CLI inputs, wire Ctrl-C,
/// and hand the whole thing to the library. Print the report on the way out.
async fn run_pipeline(config_path: Option<&Path>, extra_inputs: Vec<PathBuf>) -> Result<()> {
    // 🔒 Check the config file exists up front — a missing file deserves its
    // own error, not a parse error wearing a disguise
    let config_file = match config_path {
        Some(path) => {
            let exists = path.try_exists().context(format!(
                "💀 Couldn't even check whether '{}' exists — usually a permissions problem, or a relative path that belongs to a different working directory. An absolute path removes the guesswork.",
                path.display()
            ))?;
            if !exists {
                anyhow::bail!(
                    "💀 Configuration file '{}' does not exist. We looked. Twice.",
                    path.display()
                );
            }
            Some(path)
        }
        None => None, // 💤 env-vars-only mode — the config travels light today
    };

    // 🔧 Load the config — the moment we learn whether the TOML is valid
    let mut app_config = cdx::app_config::load_config(config_file)
        .context("💀 Couldn't load the config. Open the file and look for the obvious thing first — it's the obvious thing more often than any of us would like.")?;

    // 📂 CLI-supplied inputs ride along after whatever the config listed
    app_config
        .inputs
        .extend(extra_inputs.iter().map(|p| p.display().to_string()));
    if app_config.inputs.is_empty() {
        warn!("⚠️ no input files configured or given — this will be a very short run");
    }

    // 🛑 Ctrl-C flips the run from drain to abort; workers still get their
    // grace period to flush residual batches before anyone gets aborted.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C — switching to the abort path, residual flushes in progress");
            ctrl_c_cancel.cancel();
        }
    });

    // 🚀 hand the whole thing to the library — from here on we're just
    // spectators with a signal handler
    let report = cdx::run_with_shutdown(app_config, cancel).await?;

    // 📊 the terminal report, for humans standing at the terminal
    println!("{report}");
    Ok(())
}

/// 🎲 The `generate` subcommand: one header, N well-formed lines, energies
/// straddling the default 50 GeV bar so ingests have something to filter.
///
/// Seeded runs are fully reproducible — same seed, same file, same
/// checksums, same arguments with your coworker about whose fixture is
/// canonical. (Yours. Pass `--seed 42`.)
fn generate_events(events: u64, out: &Path, seed: Option<u64>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let file = std::fs::File::create(out).context(format!(
        "💀 Could not create '{}'. The directory may not exist, or the disk has opinions.",
        out.display()
    ))?;
    let mut writer = std::io::BufWriter::new(file);

    writeln!(writer, "{HEADER_LINE}")?;

    let kinds = [
        ParticleKind::Electron,
        ParticleKind::Muon,
        ParticleKind::Proton,
    ];
    let base = Utc::now();
    for _ in 0..events {
        let id = Uuid::new_v4();
        // ⏰ scatter timestamps over the last 24 hours of pretend beam time
        let timestamp = base - chrono::Duration::seconds(rng.random_range(0..86_400));
        // ⚡ 0–120 GeV, uniform — roughly half will clear the default bar.
        // The filter deserves a workout, not a formality.
        let energy_gev: f64 = rng.random_range(0.0..120.0);
        let kind = kinds[rng.random_range(0..kinds.len())];
        let detected = rng.random_bool(0.85);

        writeln!(
            writer,
            "{},{},{:.3},{},{}",
            id,
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            energy_gev,
            kind.as_str(),
            detected
        )?;
    }
    writer.flush().context("💀 Final flush failed — the last few events are stuck in the pipe")?;

    info!(
        "🎲 wrote {} synthetic events to '{}' — may their energies be ever above threshold",
        events,
        out.display()
    );
    Ok(())
}
