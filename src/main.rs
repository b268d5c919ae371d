use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use warden::{
    AppState, build_app,
    config::WardenConfig,
    db::DirectorySnapshot,
    observability,
};

/// CLI arguments for the permission service
#[derive(Parser, Debug)]
#[command(version, about = "URI/method permission evaluation service", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Evaluate a single permission check and exit
    ///
    /// Exit status: 0 allowed, 1 denied, 2 error.
    Check {
        #[arg(long)]
        staff_id: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
    },
    /// Load the configuration and directory, print a summary and exit
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match args.command {
        Some(Command::Check {
            staff_id,
            method,
            path,
        }) => run_check(args.config, &staff_id, &method, &path).await,
        Some(Command::Validate) => run_validate(args.config),
        Some(Command::Serve) | None => run_server(args.config).await,
    }
}

fn load_config(path: Option<PathBuf>) -> Result<WardenConfig, String> {
    match path {
        Some(path) => WardenConfig::from_file(&path)
            .map_err(|e| format!("Failed to load config from {}: {e}", path.display())),
        None => Ok(WardenConfig::default()),
    }
}

async fn run_check(config: Option<PathBuf>, staff_id: &str, method: &str, path: &str) -> ExitCode {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let state = match AppState::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    match state.evaluator.evaluate(staff_id, method, path).await {
        Ok(decision) if decision.allowed => {
            println!(
                "allowed: {staff_id} {method} {path} (resource {})",
                decision.resource_id.as_deref().unwrap_or("-")
            );
            ExitCode::SUCCESS
        }
        Ok(decision) => {
            println!(
                "denied: {staff_id} {method} {path} ({})",
                decision
                    .reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "no reason".to_string())
            );
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run_validate(config: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match config.directory.load_snapshot() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: Failed to load directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    print_summary(&config, &snapshot);
    ExitCode::SUCCESS
}

fn print_summary(config: &WardenConfig, snapshot: &DirectorySnapshot) {
    let summary = snapshot.summary();
    println!("Configuration OK");
    println!("  listen:           {}", config.server.socket_addr());
    println!("  staff id header:  {}", config.authz.staff_id_header);
    match config.authz.lookup_timeout() {
        Some(timeout) => println!("  lookup timeout:   {timeout:?}"),
        None => println!("  lookup timeout:   disabled"),
    }
    match &config.directory.seed_file {
        Some(path) => println!("  directory:        {}", path.display()),
        None => println!("  directory:        (empty)"),
    }
    println!("  principals:       {}", summary.principals);
    println!("  roles:            {}", summary.roles);
    println!(
        "  resources:        {} ({} api)",
        summary.resources, summary.api_resources
    );
    println!(
        "  rules:            {} uri, {} ignored",
        summary.uri_rules, summary.inert_rules
    );
}

async fn run_server(config: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let addr = config.server.socket_addr();
    let state = match AppState::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            return ExitCode::FAILURE;
        }
    };

    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(address = %addr, "Permission service listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
