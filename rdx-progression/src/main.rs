use anyhow::Result;
use colored::Colorize;
use progression::prelude::*;
use progression::time::format_countdown;
use progression::ENGINE_NAME;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load configuration from an optional path plus PROGRESSION__* variables.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ProgressionConfig::load(config_path.as_deref())?;
    let poll_interval = config.poll_interval();

    // 3. Open the store and load the engine. The mutex is the host's
    //    serialization point; the engine itself does no locking.
    let store = FileStore::open(&config.store_path)?;
    info!(path = %store.path().display(), "Opened progression store.");
    let mut engine = ProgressionEngine::new(config, store, Arc::new(SystemClock));
    spawn_event_listener(&engine);
    let report = engine.load();
    info!(
        "{} ready: {:?} record, {} hearts regenerated offline.",
        ENGINE_NAME.cyan(),
        report.source,
        report.hearts_regenerated
    );
    print_status(&engine);
    let engine = Arc::new(Mutex::new(engine));

    // 4. Poll on the host's cadence until Ctrl+C, then save.
    let mut interval = tokio::time::interval(poll_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut engine = engine.lock().await;
                if let Err(err) = engine.tick() {
                    error!("Tick failed: {}", err);
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("Shutdown signal received. Saving progression...");
    let mut engine = engine.lock().await;
    engine.save()?;
    print_status(&engine);
    Ok(())
}

/// Spawns a task that logs every event the engine publishes.
fn spawn_event_listener(engine: &ProgressionEngine) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ProgressionEvent::StreakChanged { kind, current, best } => {
                    info!("[EVENT] => {} is now {} (best {})", kind.label(), current, best)
                }
                other => info!("[EVENT] => {:?}", other),
            }
        }
    });
}

fn print_status(engine: &ProgressionEngine) {
    let hearts = format!("{}/{}", engine.hearts_remaining(), engine.max_hearts());
    let next = if engine.hearts_remaining() < engine.max_hearts() {
        format!(" (next in {})", format_countdown(engine.time_until_next_heart()))
    } else {
        String::new()
    };
    let boost = match engine.xp_boost_remaining() {
        Some(left) => format!(" boost {}", format_countdown(left)).yellow().to_string(),
        None => String::new(),
    };
    println!(
        "{} {}{} | {} {}{} | streak {} (best {}) | quiz {} | lesson {}",
        "hearts".red().bold(),
        hearts,
        next.dimmed(),
        "xp".green().bold(),
        engine.xp_balance(),
        boost,
        engine.current_login_streak(),
        engine.best_login_streak(),
        engine.current_quiz_streak(),
        engine.highest_unlocked_lesson(),
    );
}
