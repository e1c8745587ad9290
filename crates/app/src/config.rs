use std::fmt;
use std::net::SocketAddr;

use chrono::Duration;

pub const DEFAULT_DB_URL: &str = "sqlite://market.sqlite3";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 24 * 60;
pub const DEV_JWT_SECRET: &str = "market-dev-secret-change-me";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidBind { raw: String },
    InvalidTokenTtl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
            ArgsError::InvalidBind { raw } => write!(f, "invalid bind address: {raw}"),
            ArgsError::InvalidTokenTtl { raw } => {
                write!(f, "invalid MARKET_TOKEN_TTL_MINUTES (expected minutes > 0): {raw}")
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

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  market [serve]  [--db <sqlite_url>] [--bind <addr:port>]");
    eprintln!("  market migrate  [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db   {DEFAULT_DB_URL}");
    eprintln!("  --bind {DEFAULT_BIND}");
    eprintln!();
    eprintln!("Environment (also read from .env):");
    eprintln!("  MARKET_DB_URL, MARKET_BIND, MARKET_JWT_SECRET, MARKET_TOKEN_TTL_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Migrate,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "serve" => Some(Self::Serve),
            "migrate" => Some(Self::Migrate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub bind: SocketAddr,
    pub jwt_secret: String,
    /// True when no secret was configured and `DEV_JWT_SECRET` is in use.
    pub dev_secret: bool,
    pub token_ttl: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Run(Command, Config),
}

/// Resolve the command line against the environment. Flags override
/// environment values, which override the built-in defaults.
///
/// # Errors
///
/// Returns `ArgsError` for unknown flags or unparseable values.
pub fn parse(
    args: impl IntoIterator<Item = String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Invocation, ArgsError> {
    let mut args = args.into_iter().peekable();

    // no subcommand, or leading flags, means serve
    let named = match args.peek() {
        Some(first) if !first.starts_with('-') => Some(
            Command::from_arg(first).ok_or_else(|| ArgsError::UnknownCommand(first.clone()))?,
        ),
        _ => None,
    };
    if named.is_some() {
        args.next();
    }
    let command = named.unwrap_or(Command::Serve);

    let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    let mut db_url = env("MARKET_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_owned());
    let mut bind_raw = env("MARKET_BIND").unwrap_or_else(|| DEFAULT_BIND.to_owned());

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                db_url = value;
            }
            "--bind" => bind_raw = require_value(&mut args, "--bind")?,
            "--help" | "-h" => return Ok(Invocation::Help),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    let bind = bind_raw
        .trim()
        .parse::<SocketAddr>()
        .map_err(|_| ArgsError::InvalidBind { raw: bind_raw })?;

    let token_ttl = match env("MARKET_TOKEN_TTL_MINUTES") {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(minutes) if minutes > 0 => Duration::minutes(minutes),
            _ => return Err(ArgsError::InvalidTokenTtl { raw }),
        },
        None => Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
    };

    let (jwt_secret, dev_secret) = match env("MARKET_JWT_SECRET") {
        Some(secret) => (secret, false),
        None => (DEV_JWT_SECRET.to_owned(), true),
    };

    Ok(Invocation::Run(
        command,
        Config {
            db_url: normalize_sqlite_url(&db_url),
            bind,
            jwt_secret,
            dev_secret,
            token_ttl,
        },
    ))
}

/// Turn a bare or relative `SQLite` path into an absolute `sqlite://` URL.
/// In-memory and `sqlite:file:` URLs pass through.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite:file:") {
        return trimmed.to_owned();
    }

    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_part, query) = match path_str.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_str, None),
    };

    let path = std::path::Path::new(path_part);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    match query {
        Some(query) => format!("sqlite://{}?{query}", absolute.display()),
        None => format!("sqlite://{}", absolute.display()),
    }
}

/// Directory that must exist before `SQLite` can create the database file.
pub fn sqlite_parent_dir(db_url: &str) -> Option<std::path::PathBuf> {
    let path = db_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    std::path::Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(std::path::Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    fn run(raw: &[&str], env: &[(&str, &str)]) -> Result<Invocation, ArgsError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        parse(args(raw), |key| env.get(key).cloned())
    }

    fn config(raw: &[&str], env: &[(&str, &str)]) -> (Command, Config) {
        match run(raw, env).unwrap() {
            Invocation::Run(command, config) => (command, config),
            Invocation::Help => panic!("expected a run invocation"),
        }
    }

    #[test]
    fn defaults_serve_with_dev_secret() {
        let (command, config) = config(&[], &[]);
        assert_eq!(command, Command::Serve);
        assert_eq!(config.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert!(config.db_url.starts_with("sqlite:///"));
        assert!(config.db_url.ends_with("market.sqlite3"));
        assert!(config.dev_secret);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.token_ttl, Duration::hours(24));
    }

    #[test]
    fn flags_override_environment() {
        let (command, config) = config(
            &["migrate", "--db", "sqlite:///tmp/flag.db", "--bind", "0.0.0.0:8080"],
            &[
                ("MARKET_DB_URL", "sqlite:///tmp/env.db"),
                ("MARKET_BIND", "127.0.0.1:9000"),
                ("MARKET_JWT_SECRET", "s3cret"),
                ("MARKET_TOKEN_TTL_MINUTES", "15"),
            ],
        );
        assert_eq!(command, Command::Migrate);
        assert_eq!(config.db_url, "sqlite:///tmp/flag.db");
        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(!config.dev_secret);
        assert_eq!(config.token_ttl, Duration::minutes(15));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            run(&["deploy"], &[]).unwrap_err(),
            ArgsError::UnknownCommand("deploy".into())
        );
        assert_eq!(
            run(&["--db"], &[]).unwrap_err(),
            ArgsError::MissingValue { flag: "--db" }
        );
        assert_eq!(
            run(&["--bind", "nowhere"], &[]).unwrap_err(),
            ArgsError::InvalidBind {
                raw: "nowhere".into()
            }
        );
        assert_eq!(
            run(&[], &[("MARKET_TOKEN_TTL_MINUTES", "0")]).unwrap_err(),
            ArgsError::InvalidTokenTtl { raw: "0".into() }
        );
        assert_eq!(run(&["serve", "--help"], &[]).unwrap(), Invocation::Help);
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:file:memdb_x?mode=memory&cache=shared"),
            "sqlite:file:memdb_x?mode=memory&cache=shared"
        );
        assert_eq!(normalize_sqlite_url("/var/lib/market.db"), "sqlite:///var/lib/market.db");
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/market.db?mode=rwc"),
            "sqlite:///var/lib/market.db?mode=rwc"
        );
        let relative = normalize_sqlite_url("sqlite:data/market.db");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("data/market.db"));
    }

    #[test]
    fn parent_dir_of_file_urls_only() {
        assert_eq!(
            sqlite_parent_dir("sqlite:///var/lib/market/app.db?mode=rwc"),
            Some(std::path::PathBuf::from("/var/lib/market"))
        );
        assert_eq!(sqlite_parent_dir("sqlite::memory:"), None);
    }
}
