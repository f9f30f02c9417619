use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use prehend_core::{
    Concrescence, EngineError, Profile, SeededEmbedder, TemplateFallback, TurnOptions, TurnOutcome,
};
use prehend_store::Store;

const DEFAULT_PROFILE: &str = include_str!("../profiles/default.toml");

#[derive(Parser)]
#[command(name = "prehend", about = "Concrescence engine: multi-organ convergence with gated emission")]
struct Cli {
    /// Profile TOML (engine settings, organs, meta-atoms); built-in profile if omitted
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one turn and print its emission
    Turn {
        /// Input text
        text: String,

        /// Print the emission as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one turn per non-empty line of a file, concurrently
    Batch {
        /// Input file, one turn per line
        file: PathBuf,

        /// Cancel turns still running after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// Validate a profile without running anything
    Check {
        /// Profile TOML to validate
        profile: PathBuf,
    },

    /// Show journaled turns, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Include the nexuses each turn formed
        #[arg(long)]
        nexuses: bool,
    },

    /// Show emission path statistics
    Stats,
}

fn data_dir() -> PathBuf {
    std::env::var("PREHEND_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".prehend")
        })
}

fn open_store() -> Result<Store> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    Store::open(&dir.join("journal.db")).context("failed to open turn journal")
}

fn read_profile(path: &Path) -> Result<Profile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    Profile::from_toml_str(&text).with_context(|| format!("invalid profile {}", path.display()))
}

fn load_engine(cli: &Cli) -> Result<Concrescence> {
    let profile = match &cli.profile {
        Some(path) => read_profile(path)?,
        None => Profile::from_toml_str(DEFAULT_PROFILE).context("invalid built-in profile")?,
    };
    profile.build().context("failed to build engine from profile")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Turn { text, json } => cmd_turn(&cli, text, *json).await,
        Commands::Batch { file, deadline_ms } => cmd_batch(&cli, file, *deadline_ms).await,
        Commands::Check { profile } => cmd_check(profile),
        Commands::History { limit, nexuses } => cmd_history(*limit, *nexuses),
        Commands::Stats => cmd_stats(),
    }
}

fn run_one(engine: &Concrescence, text: &str, options: &TurnOptions) -> Result<TurnOutcome, EngineError> {
    engine.process_text(
        text,
        &SeededEmbedder::default(),
        &TemplateFallback::default(),
        options,
    )
}

async fn cmd_turn(cli: &Cli, text: &str, json: bool) -> Result<()> {
    let engine = load_engine(cli)?;
    let input = text.to_string();
    let outcome = tokio::task::spawn_blocking(move || -> Result<TurnOutcome> {
        let outcome = run_one(&engine, &input, &TurnOptions::default()).context("turn failed")?;
        open_store()?
            .record_turn(&input, &outcome.emission, &outcome.report)
            .context("failed to journal turn")?;
        Ok(outcome)
    })
    .await
    .context("turn task panicked")??;

    let e = &outcome.emission;
    if json {
        println!("{}", serde_json::to_string_pretty(e)?);
    } else {
        println!("{}", e.text);
        println!(
            "path={} confidence={:.2} nexuses={} kairos={} cycles={}",
            e.path.as_str(),
            e.confidence,
            e.nexus_count,
            e.kairos_detected,
            e.convergence_cycles
        );
    }

    if cli.verbose {
        let r = &outcome.report;
        eprintln!(
            "--- termination={:?} satisfaction={:.3} energy={:.3} winner={} ---",
            r.termination,
            r.mean_satisfaction,
            r.mean_energy,
            r.winner.as_deref().unwrap_or("-"),
        );
        for v in &r.verdicts {
            match v.rejected_at {
                Some(gate) => eprintln!("    {}: rejected at {gate:?}", v.atom),
                None => eprintln!("    {}: passed", v.atom),
            }
        }
        if !r.excluded_organs.is_empty() {
            eprintln!("    excluded organs: {}", r.excluded_organs.join(", "));
        }
    }

    Ok(())
}

async fn cmd_batch(cli: &Cli, file: &Path, deadline_ms: Option<u64>) -> Result<()> {
    let engine = Arc::new(load_engine(cli)?);
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining turns");
            interrupt.cancel();
        }
    });

    let options = TurnOptions {
        cancel: Some(cancel),
        deadline: deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
    };

    let handles: Vec<_> = lines
        .iter()
        .map(|line| {
            let engine = Arc::clone(&engine);
            let options = options.clone();
            let line = line.clone();
            tokio::task::spawn_blocking(move || run_one(&engine, &line, &options))
        })
        .collect();

    let store = open_store()?;
    let mut failed = 0usize;
    for (i, (line, handle)) in lines.iter().zip(handles).enumerate() {
        match handle.await.context("turn task panicked")? {
            Ok(outcome) => {
                let e = &outcome.emission;
                store
                    .record_turn(line, e, &outcome.report)
                    .context("failed to journal turn")?;
                println!(
                    "{}\t{}\t{:.2}\t{}",
                    i + 1,
                    e.path.as_str(),
                    e.confidence,
                    e.text
                );
            }
            Err(err) => {
                failed += 1;
                println!("{}\terror\t-\t{err}", i + 1);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} turns failed", lines.len());
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let profile = read_profile(path)?;
    let engine = profile.build().context("profile failed validation")?;
    let summary = profile.summary();
    println!(
        "ok: {} organs, {} keywords, {} meta-atoms, max_cycles={}",
        summary.organs,
        summary.keywords,
        summary.meta_atoms,
        engine.config().max_cycles
    );
    Ok(())
}

fn cmd_history(limit: usize, nexuses: bool) -> Result<()> {
    let store = open_store()?;
    let turns = store.recent_turns(limit).context("failed to read journal")?;
    if turns.is_empty() {
        println!("(no turns journaled)");
        return Ok(());
    }

    for t in &turns {
        println!(
            "{}  {:<12} {:.2}  {} → {}",
            t.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            t.path.as_str(),
            t.confidence,
            t.input,
            t.text
        );
        if nexuses {
            for n in store.turn_nexuses(t.id).context("failed to read nexuses")? {
                let participants: Vec<&str> = n.participants.iter().map(String::as_str).collect();
                println!(
                    "    {} [{}] strength={:.3} agreement={:.3} {}",
                    n.atom,
                    participants.join(", "),
                    n.strength,
                    n.agreement,
                    if n.passed { "passed" } else { "rejected" }
                );
            }
        }
    }
    Ok(())
}

fn cmd_stats() -> Result<()> {
    let store = open_store()?;
    let counts = store.path_counts().context("failed to count turns")?;

    println!("turns:        {}", counts.total());
    println!("intersection: {}", counts.intersection);
    println!("fallback:     {}", counts.fallback);
    println!("kairos:       {}", counts.kairos);
    Ok(())
}
