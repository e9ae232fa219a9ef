use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "remediation-orchestrator")]
#[command(about = "Multi-layer Kubernetes remediation orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display application version
    Version,

    /// Check cluster connectivity and RBAC before serving traffic
    Check,

    /// Start the HTTP + metrics servers and begin accepting incidents
    Serve,
}
