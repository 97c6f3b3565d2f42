//! Hashmatch CLI
//!
//! The `hashmatch` command runs matches and tournaments, signs and verifies
//! their artifact directories, and replays recorded logs.
//!
//! ## Commands
//!
//! - `match`: run one match and write its artifacts
//! - `tournament`: run a seeded tournament
//! - `sign-match` / `sign-tournament`: write Ed25519 receipts
//! - `verify-match` / `verify-tournament`: check receipts against the files on disk
//! - `replay`: fold a `match.jsonl` and print the reconstructed state
//! - `keygen`: create a signing key pair
//!
//! Exit codes: `0` success or pass, `1` verification failure or a match that
//! failed setup, `2` usage or I/O failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use hashmatch_core::events::{read_match_log, MatchReducer, Reducer};
use hashmatch_core::metrics::METRICS;
use hashmatch_core::receipt::{load_signing_key, write_key_pair, DEFAULT_ISSUER};
use hashmatch_core::runner::{failure_message, new_match_id, GatewayMode};
use hashmatch_core::scenarios::heist::HeistSceneReducer;
use hashmatch_core::telemetry::init_tracing;
use hashmatch_core::{
    run_match_request, run_tournament, sign_match_dir, sign_tournament_dir, verify_match_dir,
    verify_tournament_dir, ForfeitPolicy, GatewayConfig, MatchRequest, RuntimeConfig,
    TerminationReason, TournamentConfig, VerificationReport,
};

#[derive(Parser)]
#[command(name = "hashmatch")]
#[command(version = hashmatch_core::VERSION)]
#[command(about = "Reproducible, tamper-evident matches between agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GatewayArgs {
    /// Per-turn deadline in milliseconds
    #[arg(long, default_value_t = hashmatch_core::gateway::DEFAULT_DEADLINE_MS)]
    deadline_ms: u64,

    /// Largest accepted agent response body
    #[arg(long, default_value_t = hashmatch_core::gateway::DEFAULT_MAX_RESPONSE_BYTES)]
    max_response_bytes: usize,

    /// End the match once an agent times out this many turns in a row
    #[arg(long)]
    forfeit_after: Option<u32>,

    /// Also write gateway_transcript.jsonl
    #[arg(long)]
    transcript: bool,
}

impl GatewayArgs {
    fn config(&self) -> GatewayConfig {
        GatewayConfig {
            default_deadline_ms: self.deadline_ms,
            max_response_bytes: self.max_response_bytes,
        }
    }

    fn forfeit(&self) -> ForfeitPolicy {
        ForfeitPolicy {
            max_consecutive_timeouts: self.forfeit_after,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single match
    Match {
        /// Scenario key (numberGuess, resourceRivals, heist)
        #[arg(short, long)]
        scenario: String,

        /// Comma-separated agent keys, one per slot
        #[arg(short, long, value_delimiter = ',', required = true)]
        agents: Vec<String>,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Turn limit
        #[arg(long, default_value_t = 20)]
        turns: u32,

        /// Match id (default: random `m_…`)
        #[arg(long)]
        match_id: Option<String>,

        /// Artifact directory (default: <storage dir>/<match id>)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Remote agent URL; repeat once per agent to use the HTTP gateway
        #[arg(long = "agent-url")]
        agent_urls: Vec<String>,

        #[arg(long)]
        mode_key: Option<String>,

        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Run a seeded tournament
    Tournament {
        #[arg(short, long)]
        scenario: String,

        #[arg(short, long, value_delimiter = ',', required = true)]
        agents: Vec<String>,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(long, default_value_t = 1)]
        rounds: u32,

        #[arg(long, default_value_t = 20)]
        turns: u32,

        /// Matches run at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Tournament directory (default: <exhibition dir>/<tournament id>)
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long)]
        mode_key: Option<String>,

        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Sign a match directory
    SignMatch {
        dir: PathBuf,

        /// Private key file (hex seed)
        #[arg(short, long)]
        key: PathBuf,

        #[arg(long, default_value = DEFAULT_ISSUER)]
        issuer: String,
    },

    /// Sign every match in a tournament directory, then the tournament
    SignTournament {
        dir: PathBuf,

        #[arg(short, long)]
        key: PathBuf,

        #[arg(long, default_value = DEFAULT_ISSUER)]
        issuer: String,
    },

    /// Verify a signed match directory
    VerifyMatch { dir: PathBuf },

    /// Verify a signed tournament directory
    VerifyTournament { dir: PathBuf },

    /// Fold a match log and print the reconstructed state
    Replay {
        /// Path to match.jsonl
        log: PathBuf,

        /// Stop after this event index
        #[arg(long)]
        seek: Option<usize>,

        /// Print the typed Heist scene instead of the generic state
        #[arg(long)]
        heist: bool,
    },

    /// Generate an Ed25519 key pair (`<path>` and `<path>.pub`)
    Keygen { path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    load_env_files();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let code = match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    };
    METRICS.flush();
    code
}

/// `.env.local` first so it wins over `.env`; neither overrides the shell.
fn load_env_files() {
    for file in [".env.local", ".env"] {
        dotenvy::from_filename(file).ok();
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Match {
            scenario,
            agents,
            seed,
            turns,
            match_id,
            out,
            agent_urls,
            mode_key,
            gateway,
        } => {
            cmd_match(
                MatchRequest {
                    match_id,
                    gateway: if agent_urls.is_empty() {
                        GatewayMode::Local
                    } else {
                        GatewayMode::Http { agent_urls }
                    },
                    gateway_config: gateway.config(),
                    forfeit: gateway.forfeit(),
                    mode_key,
                    transcript: gateway.transcript,
                    ..MatchRequest::new(scenario, agents, seed, turns)
                },
                out,
            )
            .await
        }
        Commands::Tournament {
            scenario,
            agents,
            seed,
            rounds,
            turns,
            concurrency,
            out,
            mode_key,
            gateway,
        } => {
            let config = TournamentConfig {
                concurrency,
                gateway_config: gateway.config(),
                forfeit: gateway.forfeit(),
                mode_key,
                transcript: gateway.transcript,
                ..TournamentConfig::new(scenario, agents, seed, rounds, turns)
            };
            cmd_tournament(config, out).await
        }
        Commands::SignMatch { dir, key, issuer } => {
            let key = load_signing_key(&key).with_context(|| format!("loading key {}", key.display()))?;
            let receipt = sign_match_dir(&dir, &key, &issuer)
                .with_context(|| format!("signing {}", dir.display()))?;
            print_json(&receipt)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::SignTournament { dir, key, issuer } => {
            let key = load_signing_key(&key).with_context(|| format!("loading key {}", key.display()))?;
            let receipt = sign_tournament_dir(&dir, &key, &issuer)
                .with_context(|| format!("signing {}", dir.display()))?;
            print_json(&receipt.payload)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::VerifyMatch { dir } => report_exit(&verify_match_dir(&require_dir(&dir)?)),
        Commands::VerifyTournament { dir } => report_exit(&verify_tournament_dir(&require_dir(&dir)?)),
        Commands::Replay { log, seek, heist } => cmd_replay(&log, seek, heist),
        Commands::Keygen { path } => {
            let public = write_key_pair(&path).with_context(|| format!("writing {}", path.display()))?;
            println!("{public}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn runtime() -> Result<RuntimeConfig> {
    RuntimeConfig::from_env().context("reading runtime configuration")
}

async fn cmd_match(mut request: MatchRequest, out: Option<PathBuf>) -> Result<ExitCode> {
    let runtime = runtime()?;
    let match_id = request.match_id.clone().unwrap_or_else(new_match_id);
    request.out_dir = Some(out.unwrap_or_else(|| runtime.storage_dir.join(&match_id)));
    request.match_id = Some(match_id);

    let outcome = run_match_request(&request, &runtime).await.context("running match")?;
    if let Some(dir) = &request.out_dir {
        info!(dir = %dir.display(), "artifacts written");
    }
    match &outcome.summary {
        Some(summary) => print_json(summary)?,
        None => print_json(&outcome.result.scores)?,
    }

    if outcome.reason() == TerminationReason::SetupFailed {
        let message = failure_message(&outcome.result).unwrap_or_default();
        eprintln!("match setup failed: {message}");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_tournament(config: TournamentConfig, out: Option<PathBuf>) -> Result<ExitCode> {
    let runtime = runtime()?;
    let out = match out {
        Some(dir) => dir,
        None => runtime.exhibition_dir.join(config.tournament_id()?),
    };
    let result = run_tournament(&config, &runtime, Some(&out))
        .await
        .context("running tournament")?;
    info!(
        tournament_id = %result.tournament_id,
        dir = %out.display(),
        failed = result.failed_matches.len(),
        "tournament complete"
    );
    print_json(&result.standings)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_replay(log: &Path, seek: Option<usize>, heist: bool) -> Result<ExitCode> {
    let events = read_match_log(log).with_context(|| format!("reading {}", log.display()))?;
    let end = seek.map_or(events.len(), |k| (k + 1).min(events.len()));
    if heist {
        print_json(&HeistSceneReducer.fold(&events[..end]))?;
    } else {
        print_json(&MatchReducer.fold(&events[..end]))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn require_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    Ok(dir.to_path_buf())
}

fn report_exit(report: &VerificationReport) -> Result<ExitCode> {
    print_json(report)?;
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn match_args_parse() {
        let cli = Cli::try_parse_from([
            "hashmatch", "match", "-s", "numberGuess", "-a", "random,baseline", "--seed", "7",
            "--forfeit-after", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Match {
                agents, seed, gateway, ..
            } => {
                assert_eq!(agents, vec!["random", "baseline"]);
                assert_eq!(seed, 7);
                assert_eq!(gateway.forfeit().max_consecutive_timeouts, Some(3));
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn replay_folds_a_written_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.jsonl");
        let events = hashmatch_core::events::setup_failed_events("m-cli", "boom", None);
        std::fs::write(&path, hashmatch_core::events::to_jsonl(&events).unwrap()).unwrap();
        assert!(cmd_replay(&path, None, false).is_ok());
        assert!(cmd_replay(&path, Some(0), false).is_ok());
        assert!(cmd_replay(&dir.path().join("missing.jsonl"), None, false).is_err());
    }
}
