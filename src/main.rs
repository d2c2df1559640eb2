//! Ringstore server entry point.

use ringstore::server::LogLevel;
use ringstore::server::config::parse_yes_no;
use ringstore::{Config, Server, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args)?;

    if cli.help {
        print_help();
        return Ok(());
    }
    if cli.version {
        println!("Ringstore version {VERSION}");
        return Ok(());
    }

    let mut config = match cli.config {
        Some(ref path) => Config::load_from_file(path)
            .map_err(|e| anyhow::anyhow!("loading {}: {e}", path.display()))?,
        None => Config::default(),
    };

    // Command line overrides the file.
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(loglevel) = cli.loglevel {
        config.loglevel = loglevel;
    }
    if let Some(databases) = cli.databases {
        config.databases = databases;
    }
    if let Some(appendonly) = cli.appendonly {
        config.appendonly = appendonly;
    }
    if let Some(dir) = cli.dir {
        config.dir = dir;
    }
    if let Some(self_addr) = cli.self_addr {
        config.self_addr = Some(self_addr);
    }
    if !cli.peers.is_empty() {
        config.peers = cli.peers;
    }
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.loglevel.as_filter()));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!(
        "Ringstore {} starting on {}:{}",
        VERSION, config.bind, config.port
    );

    let server = Arc::new(Server::new(config).await?);

    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received shutdown signal");
        signal_server.shutdown();
    });

    server.run().await?;
    Ok(())
}

/// CLI arguments
#[derive(Default)]
struct CliArgs {
    config: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
    loglevel: Option<LogLevel>,
    databases: Option<usize>,
    appendonly: Option<bool>,
    dir: Option<PathBuf>,
    self_addr: Option<String>,
    peers: Vec<String>,
    help: bool,
    version: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                cli.config = args.get(i).map(PathBuf::from);
            }
            "--port" | "-p" => {
                i += 1;
                cli.port = Some(parse_value(args.get(i), "--port")?);
            }
            "--bind" | "-b" => {
                i += 1;
                cli.bind = args.get(i).cloned();
            }
            "--loglevel" => {
                i += 1;
                let level = args.get(i).map(String::as_str).unwrap_or_default();
                cli.loglevel = Some(
                    LogLevel::parse(level)
                        .ok_or_else(|| anyhow::anyhow!("invalid --loglevel '{level}'"))?,
                );
            }
            "--databases" => {
                i += 1;
                cli.databases = Some(parse_value(args.get(i), "--databases")?);
            }
            "--appendonly" => {
                i += 1;
                let value = args.get(i).map(String::as_str).unwrap_or_default();
                cli.appendonly = Some(parse_yes_no(value).ok_or_else(|| {
                    anyhow::anyhow!("--appendonly expects yes or no, got '{value}'")
                })?);
            }
            "--dir" => {
                i += 1;
                cli.dir = args.get(i).map(PathBuf::from);
            }
            "--self" => {
                i += 1;
                cli.self_addr = args.get(i).cloned();
            }
            "--peers" => {
                i += 1;
                cli.peers = args
                    .get(i)
                    .map(|list| {
                        list.split(',')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
            }
            "--help" | "-h" => {
                cli.help = true;
            }
            "--version" | "-v" => {
                cli.version = true;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {arg}");
                cli.help = true;
            }
            other => anyhow::bail!("unexpected argument '{other}'"),
        }
        i += 1;
    }

    Ok(cli)
}

fn parse_value<T: std::str::FromStr>(value: Option<&String>, flag: &str) -> anyhow::Result<T> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("{flag} expects a number"))
}

fn print_help() {
    println!(
        r"Ringstore {VERSION} - an in-memory key-value store

USAGE:
    ringstore [OPTIONS]

OPTIONS:
    -c, --config <FILE>      Load configuration from file
    -p, --port <PORT>        Set the server port (default: 6379)
    -b, --bind <ADDR>        Set the bind address (default: 127.0.0.1)
        --loglevel <LEVEL>   Set log level (debug, verbose, notice, warning)
        --databases <NUM>    Set number of databases (default: 16)
        --appendonly <yes|no> Enable or disable AOF persistence
        --dir <DIR>          Set working directory for the AOF
        --self <ADDR>        This node's address as its peers dial it
        --peers <A,B,...>    Other cluster nodes; enables cluster mode
    -h, --help               Print this help message
    -v, --version            Print version information

CONFIGURATION FILE:
    Ringstore reads redis.conf style files: one `directive value` per line.

EXAMPLES:
    ringstore                                   Start with defaults
    ringstore --port 6380 --appendonly yes      AOF on port 6380
    ringstore --port 7001 --self 127.0.0.1:7001 --peers 127.0.0.1:7002

SIGNALS:
    SIGINT          Graceful shutdown
"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ringstore")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_appendonly_takes_a_value() {
        let cli = parse_args(&args(&["--appendonly", "no"])).unwrap();
        assert_eq!(cli.appendonly, Some(false));

        let cli = parse_args(&args(&["--appendonly", "yes", "--port", "7000"])).unwrap();
        assert_eq!(cli.appendonly, Some(true));
        assert_eq!(cli.port, Some(7000));

        assert_eq!(parse_args(&args(&[])).unwrap().appendonly, None);
    }

    #[test]
    fn test_bad_appendonly_value_is_rejected() {
        assert!(parse_args(&args(&["--appendonly", "maybe"])).is_err());
        assert!(parse_args(&args(&["--appendonly"])).is_err());
    }

    #[test]
    fn test_stray_argument_is_rejected() {
        assert!(parse_args(&args(&["--port", "7000", "extra"])).is_err());
    }

    #[test]
    fn test_peers_are_split_on_commas() {
        let cli = parse_args(&args(&["--self", "a:1", "--peers", "b:2, c:3,"])).unwrap();
        assert_eq!(cli.self_addr.as_deref(), Some("a:1"));
        assert_eq!(cli.peers, vec!["b:2".to_string(), "c:3".to_string()]);
    }
}
