//! Leasehold CLI
//!
//! Binary name: `leasehold`

use std::process;

use leasehold::cli::handlers::run_cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = run_cli().await;
    if code != 0 {
        #[allow(clippy::exit)]
        process::exit(code);
    }
}
