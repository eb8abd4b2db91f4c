//! axisdesc
//!
//! Loads a deployment descriptor, builds the description tree, applies
//! policy from the configuration down and prints the resulting engagement
//! state as JSON.
//!
//! Usage: `axisdesc-engine [descriptor.yaml]` (default `axisdesc.yaml`).
//! Logging is controlled by `RUST_LOG`.

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use axisdesc_core::error::Result;
use axisdesc_engine::config;
use axisdesc_engine::report::TreeReport;

fn run(path: &str) -> Result<String> {
    let cfg = config::load_from_file(path)?;
    let tree = config::build_tree(&cfg)?;
    tree.apply_policy(tree.root())?;
    TreeReport::collect(&tree)?.to_json()
}

fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "axisdesc.yaml".to_string());
    tracing::info!(%path, "loading descriptor");

    match run(&path) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "deployment failed");
            eprintln!("{}: {e}", e.code().as_str());
            ExitCode::FAILURE
        }
    }
}
