// src/main.rs

mod args;
mod config;
mod decision;
mod labels;
mod matching;
mod pipeline;
mod session;
mod store;
mod types;

use anyhow::{anyhow, Result};
use args::{Args, Command};
use clap::Parser;
use decision::{MatchDecisionEngine, UnavailableReason};
use labels::SignKey;
use matching::VectorCodec;
use session::{capture_vector, find_session_files, load_session, replay, SessionReport};
use std::io::Write;
use std::path::Path;
use store::{corpus, ReferenceStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::{Config, Hand};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("FINGERSPELL_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .init();

    info!("🤟 Fingerspelling matcher starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Sampling: N={} over {:.1}s, threshold={:.2}, countdown={} ticks, cool-down={} ticks",
        config.sampling.frames_per_sequence,
        config.sampling.target_duration_secs,
        config.matching.similarity_threshold,
        config.attempt.countdown_ticks,
        config.attempt.cooldown_ticks
    );

    let mut engine = MatchDecisionEngine::new(&config);

    let corpus_dir = Path::new(&config.corpus.dir);
    let mut store = ReferenceStore::new();
    match corpus::load_corpus(corpus_dir).await {
        Ok(records) => {
            store.load(records);
            if store.is_empty() {
                warn!("Reference corpus in {} is empty; every attempt will be refused", corpus_dir.display());
            }
        }
        Err(e) => {
            engine.mark_unavailable(UnavailableReason::StoreLoadFailed);
            error!("Failed to load reference corpus: {:#}", e);
            return Err(e);
        }
    }

    match args.command.unwrap_or(Command::Replay) {
        Command::Replay => run_replay(&config, &mut engine, &store).await?,
        Command::Average { hand, symbol } => {
            let key = SignKey::new(parse_hand(&hand)?, symbol.to_uppercase());
            let record = corpus::average_record(&store, engine.codec(), &key)?;
            corpus::save_record(corpus_dir, &record).await?;
        }
        Command::Capture { session, symbol } => {
            let recording = load_session(Path::new(&session)).await?;
            let key = SignKey::new(recording.hand, symbol.to_uppercase());
            let label = corpus::next_capture_label(&store, &key)?;
            let vector = capture_vector(&recording, &config.sampling, engine.codec())?;
            corpus::save_record(corpus_dir, &corpus::ReferenceRecord::new(&label, vector)).await?;
        }
        Command::Mirror { hand } => {
            let from = parse_hand(&hand)?;
            let codec: VectorCodec = *engine.codec();
            let records = corpus::mirrored_records(&store, &codec, from)?;
            info!(
                "Mirroring {} of {} entries from {} to {}",
                records.len(),
                store.len(),
                from,
                from.opposite()
            );
            for record in &records {
                corpus::save_record(corpus_dir, record).await?;
            }
        }
    }

    let summary = engine.metrics().summary();
    info!("\n========================================");
    info!("  Engine: {:?}", engine.state().kind());
    info!("  Attempts: {} ({} refused)", summary.attempts_started, summary.attempts_refused);
    info!("  ✅ Successes: {}", summary.successes);
    info!("  ❌ No match: {}", summary.no_match);
    info!("  🔀 Wrong sign: {}", summary.wrong_sign);
    info!(
        "  Frames: {} ({} with a hand, {:.1} fps)",
        summary.frames_seen, summary.frames_with_hand, summary.frames_per_sec
    );
    info!("========================================");
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

fn parse_hand(token: &str) -> Result<Hand> {
    Hand::parse(&token.to_uppercase()).ok_or_else(|| anyhow!("Unknown hand {:?}, expected RIGHT or LEFT", token))
}

async fn run_replay(config: &Config, engine: &mut MatchDecisionEngine, store: &ReferenceStore) -> Result<()> {
    let sessions = find_session_files(Path::new(&config.session.input_dir))?;
    if sessions.is_empty() {
        warn!("No sessions found in {}", config.session.input_dir);
        return Ok(());
    }

    for (idx, path) in sessions.iter().enumerate() {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("session")
            .to_string();
        info!("Replaying session {}/{}: {}", idx + 1, sessions.len(), path.display());

        let recording = match load_session(path).await {
            Ok(r) => r,
            Err(e) => {
                error!("{:#}", e);
                continue;
            }
        };

        match replay(&name, &recording, engine, store, &config.attempt) {
            Ok(report) => save_report(&report, &config.session.output_dir).await?,
            Err(e) => error!("Failed to replay {}: {:#}", name, e),
        }
    }
    Ok(())
}

async fn save_report(report: &SessionReport, output_dir: &str) -> Result<()> {
    let mut jsonl = String::new();
    for line in &report.lines {
        let json_line = serde_json::to_string(line)?;
        println!("{}", json_line);
        jsonl.push_str(&json_line);
        jsonl.push('\n');
    }
    std::io::stdout().flush()?;

    tokio::fs::create_dir_all(output_dir).await?;
    let path = Path::new(output_dir).join(format!("{}.jsonl", report.session));
    tokio::fs::write(&path, jsonl).await?;

    let summary_path = Path::new(output_dir).join(format!("{}.summary.json", report.session));
    tokio::fs::write(&summary_path, serde_json::to_string_pretty(report)?).await?;

    if report.completed {
        info!("💾 {} spelled \"{}\" → {}", report.session, report.word, path.display());
    } else {
        warn!("💾 {} did not finish \"{}\" → {}", report.session, report.word, path.display());
    }
    Ok(())
}
