mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use remediation_orchestrator::config::Config;
use remediation_orchestrator::detector::DeploymentDetector;
use remediation_orchestrator::http::{self, AppState};
use remediation_orchestrator::inference::InferenceProxy;
use remediation_orchestrator::k8s::KubeFacade;
use remediation_orchestrator::metrics;
use remediation_orchestrator::metrics_provider::MetricFeatureProvider;
use remediation_orchestrator::orchestrator::{InMemoryStore, Orchestrator, OrchestratorConfig};
use remediation_orchestrator::remediators::helm::KubeHelmController;
use remediation_orchestrator::remediators::RemediatorRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Version => {
            println!("remediation-orchestrator {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Check => run_check(&config).await,
        Commands::Serve => run_serve(config).await,
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `kube-devops check`'s cluster-connectivity/RBAC diagnostic, generalized
/// from one ad hoc println-per-check script into the same startup gate
/// `run_serve` uses before it binds a socket.
async fn run_check(config: &Config) -> Result<()> {
    println!("Checking cluster connectivity...\n");

    print!("  Kubeconfig / in-cluster config ... ");
    let k8s = match KubeFacade::connect(
        config.kubeconfig.as_deref(),
        config.kubernetes_qps,
        config.kubernetes_burst,
    )
    .await
    {
        Ok(facade) => {
            println!("OK");
            facade
        }
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("cannot build kubernetes client: {e}");
        }
    };

    print!("  API server connectivity .......... ");
    match k8s.verify_connectivity().await {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("cannot reach cluster: {e}");
        }
    }

    print!("  Startup RBAC verification ........ ");
    match k8s.verify_startup_rbac().await {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("RBAC verification failed: {e}");
        }
    }

    println!("\nAll checks passed.");
    Ok(())
}

/// Binds the app + metrics servers and runs until `SIGINT`, mirroring
/// `commands::reconcile::run`'s `tokio::select!` against `signal::ctrl_c()`
/// but for a pair of Axum servers instead of one controller stream.
async fn run_serve(config: Config) -> Result<()> {
    metrics::init();

    let k8s = KubeFacade::connect(
        config.kubeconfig.as_deref(),
        config.kubernetes_qps,
        config.kubernetes_burst,
    )
    .await
    .context("failed to connect to kubernetes")?;

    k8s.verify_startup_rbac()
        .await
        .context("startup RBAC verification failed")?;
    info!("kubernetes_client_ready");

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("failed to build http client")?;

    let helm_controller = Arc::new(KubeHelmController::new(k8s.clone()));
    let remediators = Arc::new(RemediatorRegistry::standard(
        k8s.clone(),
        http_client,
        config.argocd_api_url.clone(),
        helm_controller,
    ));

    let inference = if config.enable_kserve_integration {
        Some(Arc::new(InferenceProxy::new(
            config.kserve_model_services.clone(),
            config.kserve_namespace.clone(),
            config.kserve_predictor_port,
            config.kserve_timeout,
        )))
    } else {
        None
    };

    let metrics_provider = config.prometheus_url.as_ref().map(|_| {
        Arc::new(MetricFeatureProvider::new(
            config.prometheus_url.clone(),
            config.http_timeout,
        ))
    });

    let detector = Arc::new(DeploymentDetector::new());
    let store = Arc::new(InMemoryStore::new());
    let orchestrator_config = OrchestratorConfig {
        fingerprint_policy: config.fingerprint_policy,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(Orchestrator::with_inference(
        store,
        k8s.clone(),
        detector,
        remediators,
        inference.clone(),
        orchestrator_config,
    ));

    let state = AppState {
        orchestrator,
        k8s,
        inference,
        metrics_provider,
        started_at: std::time::Instant::now(),
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let app_shutdown = shutdown_tx.subscribe();
    let metrics_shutdown = shutdown_tx.subscribe();
    let app_config = config.clone();
    let metrics_config = config.clone();

    let app_handle = tokio::spawn(async move { http::serve_app(state, &app_config, app_shutdown).await });
    let metrics_handle = tokio::spawn(async move { http::serve_metrics(&metrics_config, metrics_shutdown).await });

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(());

    match tokio::try_join!(flatten(app_handle), flatten(metrics_handle)) {
        Ok(_) => {
            info!("shutdown_complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "shutdown_error");
            Err(e)
        }
    }
}

async fn flatten(handle: tokio::task::JoinHandle<Result<()>>) -> Result<()> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(e.into()),
    }
}
