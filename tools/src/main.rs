//! bot-runner: drives the economy bot engine over NDJSON on stdin/stdout.
//!
//! Usage:
//!   bot-runner --db data/econbot.db --config data/config.json --seed 42
//!   bot-runner --fixed-clock 2025-03-01T12:00:00
//!
//! Each input line is one request:
//!   {"type":"member","member":{"user_id":1,"display_name":"ana","role_ids":[]}}
//!   {"type":"message","author":{...},"content":"!balance"}
//!   {"type":"slash","author":{...},"command":{"cmd":"deposit","amount":"all"}}
//!   {"type":"tick","advance_secs":60}
//!   {"type":"status"}
//!   {"type":"quit"}
//! and gets exactly one output line back.

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use econbot_core::{
    clock::BotClock,
    command::BotCommand,
    config::{BotConfig, Secrets},
    engine::{BotEngine, Dispatched, EngineStatus},
    event::BotEvent,
    platform::{Member, Notice, RecordingPlatform},
    response::Reply,
    store::BotStore,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::time::Instant;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcRequest {
    Member {
        member: Member,
    },
    Message {
        author: Member,
        content: String,
    },
    Slash {
        author: Member,
        command: BotCommand,
    },
    Tick {
        #[serde(default)]
        advance_secs: Option<i64>,
    },
    Status,
    Quit,
}

#[derive(serde::Serialize)]
struct IpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<Reply>,
    notices: Vec<Notice>,
    events: Vec<BotEvent>,
}

/// What the old dashboard showed: liveness plus the engine's counters.
#[derive(serde::Serialize)]
struct StatusLine {
    running: bool,
    uptime_secs: u64,
    #[serde(flatten)]
    engine: EngineStatus,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = string_arg(&args, "--db").unwrap_or("data/econbot.db");
    let config_path = string_arg(&args, "--config").unwrap_or("data/config.json");
    let clock = match string_arg(&args, "--fixed-clock") {
        Some(at) => BotClock::fixed(NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S")?),
        None => BotClock::System,
    };

    let secrets = Secrets::from_env();
    log::info!("bot-runner: seed={seed} db={db} config={config_path} secrets={secrets:?}");

    let config = BotConfig::load(config_path)?;
    let store = if db == ":memory:" {
        BotStore::in_memory()?
    } else {
        BotStore::open(db)?
    };
    store.migrate()?;
    log::info!("bot-runner: migrated {}", store.path().unwrap_or(":memory:"));

    let mut engine = BotEngine::build(config, store, Box::new(RecordingPlatform::new()), clock, seed)?;
    run_ipc_loop(&mut engine, Instant::now())?;

    let status = engine.status()?;
    log::info!(
        "bot-runner: session {} closed ({} users, {} events)",
        status.session_id,
        status.users,
        status.events
    );
    Ok(())
}

fn run_ipc_loop(engine: &mut BotEngine, started: Instant) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        let line = match request {
            IpcRequest::Quit => break,
            IpcRequest::Status => serde_json::to_string(&StatusLine {
                running: true,
                uptime_secs: started.elapsed().as_secs(),
                engine: engine.status()?,
            })?,
            IpcRequest::Member { member } => {
                remember(engine, member);
                serde_json::json!({ "ok": true }).to_string()
            }
            IpcRequest::Message { author, content } => {
                remember(engine, author.clone());
                let handled = engine.on_message(&author, &content)?;
                respond(engine, handled)?
            }
            IpcRequest::Slash { author, command } => {
                remember(engine, author.clone());
                let handled = engine.dispatch(&author, &command)?;
                respond(engine, handled)?
            }
            IpcRequest::Tick { advance_secs } => {
                if let Some(secs) = advance_secs {
                    engine.clock.advance(Duration::seconds(secs));
                }
                let events = engine.run_timers()?;
                respond(engine, Dispatched { reply: None, events })?
            }
        };
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Members named in requests become known to the platform, so later
/// lookups (display names, roles of targets) resolve.
fn remember(engine: &mut BotEngine, member: Member) {
    if let Some(platform) = engine.recording_mut() {
        platform.add_member(member);
    }
}

fn respond(engine: &mut BotEngine, handled: Dispatched) -> Result<String> {
    let notices = engine
        .recording_mut()
        .map(RecordingPlatform::take_delivered)
        .unwrap_or_default();
    let response = IpcResponse { reply: handled.reply, notices, events: handled.events };
    Ok(serde_json::to_string(&response)?)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
