use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use workloadspread::store::KubeStore;
use workloadspread::structural::CoreValidator;
use workloadspread::webhook::{self, AdmissionState};

/// Serves the WorkloadSpread validating admission webhook.
///
/// Settings are read from `WORKLOAD_SPREAD_*` environment variables.
#[derive(Parser)]
struct Args {
    /// Overrides `WORKLOAD_SPREAD_BIND_ADDR`.
    #[arg(long)]
    bind_addr: Option<SocketAddr>,
}

#[derive(serde::Deserialize)]
struct Config {
    #[serde(default = "default_bind_addr")]
    bind_addr:               SocketAddr,
    cert_path:               PathBuf,
    key_path:                PathBuf,
    /// Location of the ConfigMap holding the custom workload whitelist.
    #[serde(default = "default_configuration_namespace")]
    configuration_namespace: String,
    #[serde(default = "default_configuration_name")]
    configuration_name:      String,
}

fn default_bind_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 9443)) }

fn default_configuration_namespace() -> String { "kruise-system".into() }

fn default_configuration_name() -> String { "kruise-configuration".into() }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    let config = ::config::Config::builder()
        .add_source(config::Environment::with_prefix("WORKLOAD_SPREAD"))
        .build()
        .context("construct config from env")?
        .try_deserialize::<Config>()
        .context("deserialize env to config")?;

    let bind_addr = args.bind_addr.unwrap_or(config.bind_addr);

    let client = kube::Client::try_default().await.context("init kube client")?;
    let store = Arc::new(KubeStore::new(client, config.configuration_namespace, config.configuration_name));
    let state = Arc::new(AdmissionState {
        store:      store.clone(),
        whitelist:  store,
        structural: Arc::new(CoreValidator),
    });

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .with_context(|| format!("load TLS certificate from {}", config.cert_path.display()))?;

    log::info!("serving WorkloadSpread admission on {bind_addr}");
    axum_server::bind_rustls(bind_addr, tls)
        .serve(webhook::router(state).into_make_service())
        .await
        .context("run webhook server")
}
