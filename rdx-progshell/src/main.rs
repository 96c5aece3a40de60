use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use colored::Colorize;
use progression::prelude::*;
use progression::time::format_countdown;
use progression::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-".repeat(64).dimmed());
    println!("{}", version_string);
    println!(
        "{}",
        "    Time is simulated: use 'advance' to move the clock.".dimmed()
    );
    println!("{}", "-".repeat(64).dimmed());
}

/// Command-line options: `--file <PATH>` persists to a file store,
/// `--config <PATH>` loads a TOML configuration.
struct ShellArgs {
    store_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl ShellArgs {
    fn parse() -> Result<Self> {
        let mut parsed = Self {
            store_file: None,
            config_file: None,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--file" => parsed.store_file = args.next().map(PathBuf::from),
                "--config" => parsed.config_file = args.next().map(PathBuf::from),
                other => bail!("Unknown argument '{}'. Usage: progshell [--file PATH] [--config PATH]", other),
            }
        }
        Ok(parsed)
    }
}

/// Spawns a task that prints engine events while the flag is set.
fn spawn_event_listener(engine: &ProgressionEngine, is_listening: Arc<AtomicBool>) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if is_listening.load(Ordering::Relaxed) {
                println!("<-- [EVENT] {:?}", event);
            }
        }
    });
}

/// Parses `90`, `90s`, `15m`, `2h` or `3d`. A leading `-` moves backward.
fn parse_duration(raw: &str) -> Option<Duration> {
    let (number, unit) = match raw.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&raw[..i], c),
        _ => (raw, 's'),
    };
    let value: i64 = number.parse().ok()?;
    match unit {
        's' => Duration::try_seconds(value),
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        _ => None,
    }
}

fn parse_arg<T: std::str::FromStr>(args: &[&str], index: usize) -> Option<T> {
    args.get(index).and_then(|s| s.parse().ok())
}

fn print_status(engine: &ProgressionEngine, clock: &ManualClock) {
    println!("  clock        {}", clock.now().to_rfc3339().dimmed());
    println!("  player       {}", engine.player_name().bold());
    let next = if engine.hearts_remaining() < engine.max_hearts() {
        format!(" (next in {})", format_countdown(engine.time_until_next_heart()))
    } else {
        String::new()
    };
    println!(
        "  hearts       {}/{}{}",
        engine.hearts_remaining().to_string().red().bold(),
        engine.max_hearts(),
        next
    );
    let boost = match engine.xp_boost_remaining() {
        Some(left) => format!(" (boost {} left)", format_countdown(left)),
        None => String::new(),
    };
    println!(
        "  xp           {}{}",
        engine.xp_balance().to_string().green().bold(),
        boost
    );
    println!(
        "  login streak {} (best {})",
        engine.current_login_streak(),
        engine.best_login_streak()
    );
    println!(
        "  quiz streak  {} (best {}){}",
        engine.current_quiz_streak(),
        engine.best_quiz_streak(),
        if engine.is_daily_quiz_available() { ", available today" } else { ", done today" }
    );
    println!("  lesson       {}", engine.highest_unlocked_lesson());
}

fn report<T>(result: Result<T, ProgressionError>, on_ok: impl FnOnce(T)) {
    match result {
        Ok(value) => on_ok(value),
        Err(err) => println!("{} {}", "Error:".red(), err),
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  status                - Shows hearts, XP, streaks and lessons.");
    println!("  spend [N]             - Spends N hearts (default 1).");
    println!("  grant <N>             - Grants N hearts.");
    println!("  refill [N]            - Refills hearts to N (default: full).");
    println!("  xp award <N>          - Awards N base XP.");
    println!("  xp spend <N>          - Spends N XP.");
    println!("  boost <DURATION>      - Activates an XP boost, e.g. 'boost 30m'.");
    println!("  buy heart|boost       - Buys a heart or an XP boost with XP.");
    println!("  login                 - Records today's login.");
    println!("  name <NAME>           - Renames the player.");
    println!("  quiz                  - Completes today's daily quiz.");
    println!("  unlock <ID>           - Unlocks lessons up to ID.");
    println!("  complete <ID>         - Completes lesson ID, unlocking the next.");
    println!("  advance <DURATION>    - Moves the clock: 90, 90s, 15m, 2h, 3d.");
    println!("  tick                  - Reconciles hearts and boost expiry.");
    println!("  save                  - Saves the record.");
    println!("  reset                 - Resets the record to defaults.");
    println!("  start|stop events     - Toggles printing of engine events.");
    println!("  exit                  - Saves and quits the shell.");
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = ShellArgs::parse()?;
    let config = ProgressionConfig::load(args.config_file.as_deref())?;
    let clock = Arc::new(ManualClock::starting_at(Utc::now()));

    let store: Box<dyn StateStore> = match &args.store_file {
        Some(path) => Box::new(FileStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };
    let mut engine = ProgressionEngine::new(config, store, clock.clone());

    let is_listening = Arc::new(AtomicBool::new(true));
    spawn_event_listener(&engine, is_listening.clone());

    let load = engine.load();
    info!("{} loaded: {:?}", ENGINE_NAME, load);
    // Let the listener drain the load events before the first prompt.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(MyHighlighter {}));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting progshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first() else {
            continue;
        };

        match *command {
            "status" => print_status(&engine, &clock),
            "spend" => {
                let n = parse_arg(&args, 1).unwrap_or(1);
                report(engine.spend_heart(n), |spend| {
                    println!("--> Spent {} heart(s), {} left.", spend.spent, spend.remaining);
                    if spend.out_of_hearts {
                        println!("{}", "--> Out of hearts! Wait for regeneration or buy one.".red());
                    }
                });
            }
            "grant" => match parse_arg(&args, 1) {
                Some(n) => report(engine.grant_hearts(n), |added| {
                    println!("--> Added {} heart(s).", added)
                }),
                None => println!("Usage: grant <N>"),
            },
            "refill" => report(engine.refill_hearts(parse_arg(&args, 1)), |added| {
                println!("--> Refilled {} heart(s).", added)
            }),
            "xp" => match (args.get(1).copied(), parse_arg::<u64>(&args, 2)) {
                (Some("award"), Some(n)) => report(engine.award_xp(n), |credited| {
                    println!("--> Credited {} XP.", credited)
                }),
                (Some("spend"), Some(n)) => report(engine.spend_xp(n), |balance| {
                    println!("--> Spent {} XP, {} left.", n, balance)
                }),
                _ => println!("Usage: xp award <N> | xp spend <N>"),
            },
            "boost" => match args.get(1).and_then(|raw| parse_duration(raw)) {
                Some(duration) => report(engine.activate_xp_boost(duration), |expires_at| {
                    println!("--> XP boost active until {}.", expires_at.to_rfc3339())
                }),
                None => println!("Usage: boost <DURATION>"),
            },
            "buy" => match args.get(1).copied() {
                Some("heart") => report(engine.buy_heart(), |hearts| {
                    println!(
                        "--> Bought a heart for {} XP. Hearts: {}.",
                        engine.config().economy.heart_price_xp,
                        hearts
                    )
                }),
                Some("boost") => report(engine.buy_xp_boost(), |expires_at| {
                    println!(
                        "--> Bought an XP boost for {} XP, active until {}.",
                        engine.config().economy.boost_price_xp,
                        expires_at.to_rfc3339()
                    )
                }),
                _ => println!("Usage: buy heart | buy boost"),
            },
            "login" => report(engine.record_login_if_new_day(), |transition| {
                println!(
                    "--> {:?}. {}: {}.",
                    transition,
                    StreakKind::Login.label(),
                    engine.current_login_streak()
                )
            }),
            "name" => {
                let name = args[1..].join(" ");
                report(engine.set_player_name(&name), |changed| {
                    if changed {
                        println!("--> Player is now '{}'.", engine.player_name());
                    } else {
                        println!("--> Name unchanged.");
                    }
                })
            }
            "quiz" => report(engine.record_daily_quiz_completion(), |reward| {
                println!(
                    "--> Quiz streak {}: +{} XP, +{} heart(s).",
                    reward.streak, reward.xp_awarded, reward.hearts_awarded
                )
            }),
            "unlock" | "complete" => match parse_arg::<u32>(&args, 1) {
                Some(id) => {
                    let result = if *command == "unlock" {
                        engine.unlock_lesson_if_higher(id)
                    } else {
                        engine.complete_lesson(id)
                    };
                    report(result, |moved| {
                        if moved {
                            println!("--> Highest lesson is now {}.", engine.highest_unlocked_lesson());
                        } else {
                            println!("--> Already unlocked.");
                        }
                    });
                }
                None => println!("Usage: {} <ID>", command),
            },
            "advance" => match args.get(1).and_then(|raw| parse_duration(raw)) {
                Some(delta) => {
                    clock.advance(delta);
                    println!("--> Clock is now {}.", clock.now().to_rfc3339());
                }
                None => println!("Usage: advance <DURATION>"),
            },
            "tick" => report(engine.tick(), |regenerated| {
                println!("--> {} heart(s) regenerated.", regenerated)
            }),
            "save" => report(engine.save(), |_| println!("--> Saved.")),
            "reset" => report(engine.reset(), |_| println!("--> Record reset to defaults.")),
            "start" | "stop" => {
                if let Some(&"events") = args.get(1) {
                    is_listening.store(*command == "start", Ordering::Relaxed);
                    println!("--> Event printing {}.", if *command == "start" { "on" } else { "off" });
                } else {
                    println!("Unknown '{}' command. Try '{} events'.", command, command);
                }
            }
            "help" => print_help(),
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line),
        }
        // Give the listener a moment so events print before the next prompt.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    if let Err(err) = engine.save() {
        println!("{} {}", "Error:".red(), err);
    }
    Ok(())
}
