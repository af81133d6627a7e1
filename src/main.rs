//! BDM Payoff CLI
//!
//! Runs the stage-2 payoff engine on a session file.
//!
//! # Usage
//!
//! ```bash
//! bdm-payoff resolve  --session session.toml --output report.json
//! bdm-payoff check    --session session.toml
//! bdm-payoff simulate --session session.toml --participants 10000
//! ```
//!
//! Environment:
//!   BDM_SESSION_PATH - Session file when `--session` is omitted
//!   RUST_LOG         - Log filter (default: bdm_payoff=info)
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Invalid session, rejected responses, or I/O error

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use statrs::statistics::Statistics;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bdm_payoff::elicitation::{
    filter_degenerate, validate_ce, EngineError, MechanismRng, Stage, Stage2Session,
};
use bdm_payoff::SessionFile;

#[derive(Parser, Debug)]
#[command(name = "bdm-payoff")]
#[command(about = "BDM certainty-equivalent payoff resolution")]
struct Args {
    /// Session file (TOML). Defaults to $BDM_SESSION_PATH, then session.toml
    #[arg(long, short, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one participant's stage 2 and report the final payment
    Resolve {
        /// Override the RNG seed from the session file
        #[arg(long)]
        seed: Option<u64>,

        /// Write the JSON report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Validate catalogs and responses without drawing anything
    Check,
    /// Estimate the payment distribution over many simulated participants
    Simulate {
        /// Number of simulated participants
        #[arg(long, short, default_value = "10000")]
        participants: u64,

        /// Base seed; participant i uses seed + i
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bdm_payoff=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let session = match &args.session {
        Some(path) => SessionFile::load(path)
            .with_context(|| format!("loading session {}", path.display()))?,
        None => SessionFile::from_env().context("loading session from environment")?,
    };

    match args.command {
        Commands::Resolve { seed, output } => resolve(&session, seed, output),
        Commands::Check => check(&session),
        Commands::Simulate { participants, seed } => simulate(&session, participants, seed),
    }
}

// =============================================================================
// RESOLVE
// =============================================================================

fn resolve(session: &SessionFile, seed: Option<u64>, output: Option<PathBuf>) -> Result<()> {
    let rng = MechanismRng::from_optional_seed(seed.or(session.engine.seed));
    let mut stage2 = session.start_session(rng)?;
    let outcome = stage2.finalize()?;

    info!(
        stage = outcome.final_payment.stage.number(),
        round = outcome.final_payment.round,
        today = outcome.final_payment.today,
        one_month = outcome.final_payment.one_month,
        method = %outcome.resolved.method,
        "Session resolved"
    );

    let report = stage2.report();
    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating report {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writer.flush()?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

// =============================================================================
// CHECK
// =============================================================================

fn check(session: &SessionFile) -> Result<()> {
    let catalog = session.catalog()?;
    let stage1 = session.stage1_result()?;

    let stage2 = catalog.stage2();
    let active = filter_degenerate(stage2.rounds());
    println!(
        "stage 1: {} rounds | stage 2: {} rounds, {} active {:?}",
        catalog.stage1().len(),
        stage2.len(),
        active.len(),
        active
    );

    let mut problems = 0usize;
    if stage1.paying_round == 0 || stage1.paying_round > catalog.stage1().len() {
        println!(
            "  stage 1: paying round {} outside {} rounds",
            stage1.paying_round,
            catalog.stage1().len()
        );
        problems += 1;
    }
    let mut answered: BTreeMap<usize, usize> = BTreeMap::new();
    for record in &session.stage2.responses {
        *answered.entry(record.round).or_default() += 1;
        if !active.contains(&record.round) {
            println!("  round {}: not an active round", record.round);
            problems += 1;
            continue;
        }
        let round = catalog.round(Stage::Two, record.round)?;
        if let Err(rejection) = validate_ce(round, record.ce) {
            println!("  round {}: ce {} rejected: {}", record.round, record.ce, rejection);
            problems += 1;
        }
    }
    for (round, count) in &answered {
        if *count > 1 {
            println!("  round {}: answered {} times", round, count);
            problems += 1;
        }
    }
    let missing: Vec<usize> = active
        .iter()
        .copied()
        .filter(|round| !answered.contains_key(round))
        .collect();
    if !missing.is_empty() {
        println!("  unanswered active rounds: {:?}", missing);
        problems += 1;
    }

    if problems > 0 {
        bail!("{} problem(s) found", problems);
    }
    println!("ok");
    Ok(())
}

// =============================================================================
// SIMULATE
// =============================================================================

struct SimulatedPayment {
    today: f64,
    one_month: f64,
    stage: Stage,
}

/// Run one simulated participant. Unanswered active rounds are filled with the
/// lottery's expected value (a risk-neutral participant).
fn simulate_participant(session: &SessionFile, seed: u64) -> Result<SimulatedPayment, EngineError> {
    let mut stage2: Stage2Session = session.start_session(MechanismRng::new(seed))?;
    while let Some(round) = stage2.next_round() {
        let lottery = stage2.catalog().round(Stage::Two, round)?;
        let ce = lottery.expected_value().clamp(lottery.low(), lottery.high());
        stage2.submit_ce(round, ce)?;
    }
    let payment = stage2.finalize()?.final_payment;
    Ok(SimulatedPayment {
        today: payment.today,
        one_month: payment.one_month,
        stage: payment.stage,
    })
}

fn simulate(session: &SessionFile, participants: u64, seed: Option<u64>) -> Result<()> {
    if participants == 0 {
        bail!("--participants must be positive");
    }
    let base_seed = seed
        .or(session.engine.seed)
        .unwrap_or_else(|| MechanismRng::from_os_seed().seed());
    info!(participants, base_seed, "Simulating participants");

    let payments: Vec<SimulatedPayment> = (0..participants)
        .into_par_iter()
        .map(|i| simulate_participant(session, base_seed.wrapping_add(i)))
        .collect::<Result<_, _>>()?;

    let today: Vec<f64> = payments.iter().map(|p| p.today).collect();
    let one_month: Vec<f64> = payments.iter().map(|p| p.one_month).collect();
    let stage2_share = payments.iter().filter(|p| p.stage == Stage::Two).count() as f64
        / payments.len() as f64;
    if stage2_share == 0.0 {
        warn!("Stage 2 never governed payment in this simulation");
    }

    println!("participants:      {}", payments.len());
    println!("base seed:         {}", base_seed);
    println!(
        "today:             mean {:.2}  sd {:.2}",
        today.iter().mean(),
        today.iter().std_dev()
    );
    println!(
        "one month:         mean {:.2}  sd {:.2}",
        one_month.iter().mean(),
        one_month.iter().std_dev()
    );
    println!("stage 2 governs:   {:.1}%", stage2_share * 100.0);
    Ok(())
}
