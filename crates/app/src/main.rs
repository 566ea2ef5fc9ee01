use std::fmt;

use exam_core::model::{SessionId, TestId};
use services::{AppServices, Clock, GatewayConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingTestId,
    MissingSessionId,
    InvalidDbUrl { raw: String },
    MissingBaseUrl,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingTestId => write!(f, "resumable requires a test id"),
            ArgsError::MissingSessionId => write!(f, "discard requires a session id"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingBaseUrl => {
                write!(f, "no gateway base URL (set EXAM_API_BASE_URL or pass --base-url)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- resumable <test-id> [--db <sqlite_url>] [--base-url <url>]");
    eprintln!("  cargo run -p app -- discard <session-id> [--db <sqlite_url>] [--base-url <url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:exam.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_API_BASE_URL, EXAM_API_TOKEN, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Resumable { test_id: TestId },
    Discard { session_id: SessionId },
}

struct Args {
    db_url: String,
    gateway: GatewayConfig,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>, command_name: &str) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut gateway = GatewayConfig::from_env();
        let mut target: Option<String> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--base-url" => {
                    let value = require_value(args, "--base-url")?;
                    gateway = Some(match gateway {
                        Some(config) => GatewayConfig {
                            base_url: value,
                            ..config
                        },
                        None => GatewayConfig::new(value),
                    });
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if target.is_none() => target = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match command_name {
            "resumable" => Command::Resumable {
                test_id: TestId::new(target.ok_or(ArgsError::MissingTestId)?),
            },
            "discard" => Command::Discard {
                session_id: SessionId::new(target.ok_or(ArgsError::MissingSessionId)?),
            },
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        };

        Ok(Self {
            db_url,
            gateway: gateway.ok_or(ArgsError::MissingBaseUrl)?,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let command_name = match argv.next() {
        Some(name) if name == "--help" || name == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(name) => name,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let parsed = Args::parse(&mut argv, &command_name).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup, keeping file handling in the binary
    // glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, parsed.gateway, Clock::default_clock()).await?;

    match parsed.command {
        Command::Resumable { test_id } => {
            info!(test_id = %test_id, "scanning for resumable sessions");
            match app.recovery().find_resumable(&test_id).await? {
                Some(found) => {
                    let title = found.session.title().unwrap_or("untitled test");
                    println!(
                        "resumable session {} ({title}): question {}/{}",
                        found.session.session_id(),
                        found.question_index + 1,
                        found.session.question_count()
                    );
                }
                None => println!("no resumable session for test {test_id}"),
            }
        }
        Command::Discard { session_id } => {
            app.recovery().discard(&session_id).await?;
            println!("discarded session {session_id}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
