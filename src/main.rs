mod cli;
mod config;
mod error;
mod ledger;
mod migrate;
mod model;
mod providers;
mod query;
mod render;
mod resolve;

use std::process::ExitCode;

use cli::GlobalArgs;
use error::MigrationError;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    init_tracing(&invocation.global);

    match cli::run(invocation).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let retryable = e
                .chain()
                .filter_map(|cause| cause.downcast_ref::<MigrationError>())
                .any(MigrationError::is_retryable);
            if retryable {
                eprintln!("Progress is saved in the ledger; rerun the same command to resume.");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(global: &GlobalArgs) {
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over the flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if global.quiet {
        EnvFilter::new("error")
    } else {
        match global.verbose {
            0 => EnvFilter::new("warn,trello2gh=info"),
            1 => EnvFilter::new("info"),
            _ => EnvFilter::new("debug,hyper=info,reqwest=info"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
