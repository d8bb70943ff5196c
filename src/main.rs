use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info, warn};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use clusterscope::config::Config;
use clusterscope::monitor::{Monitor, Outcome};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clusterscope")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("clusterscope.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG, when set, is the whole filter. Otherwise every record reaches
    // the logger and the configured level gates them through `log::max_level`.
    let mut builder = env_logger::Builder::new();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.target(env_logger::Target::Pipe(target)).init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

/// Level from the config's `log_level`, falling back to info
fn configured_level(log_level: Option<&str>) -> LevelFilter {
    match log_level.map(str::parse::<LevelFilter>) {
        Some(Ok(level)) => level,
        Some(Err(_)) => {
            warn!("Unknown log_level {:?}, using info", log_level);
            LevelFilter::Info
        }
        None => LevelFilter::Info,
    }
}

/// RUST_LOG wins over the configured level
fn apply_log_level(config: &Config) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    log::set_max_level(configured_level(config.log_level.as_deref()));
}

fn print_outcome(outcome: &Outcome, show_digest: bool) {
    if show_digest {
        println!("{}", "Digest:".cyan().bold());
        println!("{}\n", outcome.digest);
    }
    println!("{}", outcome.summary);
    println!();
    if let Some(path) = &outcome.report_path {
        println!("{} {}", "Saved:".green(), path.display());
    }
    if let Some(warning) = &outcome.warning {
        println!("{} {}", "Warning:".yellow(), warning);
    }
}

async fn handle_status_command(monitor: &Monitor) -> Result<()> {
    info!("Collecting raw cluster status");
    let aggregate = monitor.cluster_status().await?;

    for (spec, result) in monitor.config().probes.cluster.iter().zip(aggregate.results.iter()) {
        println!("{}", format!("== {} ==", spec.display_title()).cyan().bold());
        if result.stdout.trim().is_empty() {
            println!("{}", "(no output)".dimmed());
        } else {
            println!("{}", result.stdout.trim_end());
        }
        if let Some(failure) = &result.exit_error {
            println!("{} {}", "Failed:".red(), failure);
        }
        if !result.stderr.trim().is_empty() {
            println!("{}", result.stderr.trim_end().red());
        }
        println!();
    }
    Ok(())
}

async fn handle_serve_command(monitor: Monitor, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let server = &monitor.config().server;
    let host = host.unwrap_or(&server.host);
    let port = port.unwrap_or(server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context(format!("Invalid listen address {}:{}", host, port))?;

    println!("{} http://{}", "Serving on".green(), addr);
    clusterscope::server::serve(monitor, addr).await.context("Server failed")?;
    Ok(())
}

async fn run_application(cli: &Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let monitor = Monitor::from_config(config)?;

    match &cli.command {
        Commands::Status => handle_status_command(&monitor).await,
        Commands::Analyze { show_digest } => {
            println!("{}", "Probing cluster...".cyan());
            let outcome = monitor.collect_cluster_snapshot().await?;
            print_outcome(&outcome, *show_digest || cli.is_verbose());
            Ok(())
        }
        Commands::Scan { show_digest } => {
            println!("{}", "Running vulnerability scan, this can take several minutes...".cyan());
            let outcome = monitor.collect_vulnerability_report().await?;
            print_outcome(&outcome, *show_digest || cli.is_verbose());
            Ok(())
        }
        Commands::Brute { show_digest } => {
            println!("{}", "Running brute-force test...".cyan());
            let outcome = monitor.collect_brute_force_attempt().await?;
            print_outcome(&outcome, *show_digest || cli.is_verbose());
            Ok(())
        }
        Commands::Serve { host, port } => handle_serve_command(monitor, host.as_deref(), *port).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    let log_file = setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(&config);

    info!("Starting with config from: {:?}", cli.config);
    if cli.is_verbose() {
        println!("Logs: {}", log_file.display());
    }

    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_level() {
        assert_eq!(configured_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(configured_level(Some("TRACE")), LevelFilter::Trace);
        assert_eq!(configured_level(Some("off")), LevelFilter::Off);
        assert_eq!(configured_level(Some("loud")), LevelFilter::Info);
        assert_eq!(configured_level(None), LevelFilter::Info);
    }
}
