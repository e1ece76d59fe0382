//! Machine Master daemon: loads a `MachineMasterConfiguration`, builds the
//! devpath mapper and per-agent Redfish collectors from it, and serves the
//! aggregator behind the gRPC frontend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mmaster::aggregator::ResourceAggregator;
use mmaster::clock::SystemClock;
use mmaster::collector::ResourceCollector;
use mmaster::config::{MachineMasterConfiguration, RedfishBackendConfig};
use mmaster::devpath::GraphDevpathMapper;
use mmaster::frontend::{self, MachineMasterFrontend};
use mmaster::redfish::collector::RedfishSnapshotUpdater;
use mmaster::redfish::property::PropertyRegistry;
use mmaster::redfish::property_definitions::{
    PropertyCapacityBytes, PropertyMediaType, PropertyName, PropertyReadingCelsius, PropertyUpperThresholdCritical,
};
use mmaster::redfish::{build_topology, HttpRedfishClient, RedfishResourceCollector};

#[derive(Parser, Debug)]
#[command(name = "mmaster", about = "Aggregates per-agent resource inventories behind one streaming RPC interface")]
struct Args {
    /// Path to a YAML `MachineMasterConfiguration` file.
    #[arg(long)]
    config: PathBuf,
}

fn property_registry() -> PropertyRegistry {
    let mut registry = PropertyRegistry::new();
    registry.register::<PropertyName>();
    registry.register::<PropertyCapacityBytes>();
    registry.register::<PropertyMediaType>();
    registry.register::<PropertyReadingCelsius>();
    registry.register::<PropertyUpperThresholdCritical>();
    registry
}

/// Crawls `backend`'s Redfish topology and wraps it in a
/// `RedfishResourceCollector`, along with the HTTP client the periodic
/// rescrape task reuses to crawl it again later.
async fn build_collector(backend: &RedfishBackendConfig) -> (Arc<RedfishResourceCollector>, Arc<HttpRedfishClient>) {
    let client = Arc::new(HttpRedfishClient::new(backend.base_url.clone(), backend.fetch_timeout));
    let topology = build_topology(client.as_ref()).await;
    let store = mmaster::redfish::PropertyStore::new(property_registry(), client.clone(), Arc::new(SystemClock), topology);
    (
        Arc::new(RedfishResourceCollector::new(backend.agent.clone(), backend.os_type.clone(), store)),
        client,
    )
}

async fn run(config: MachineMasterConfiguration) -> anyhow::Result<()> {
    let mut mapper_config = config.build_mapper_config()?;

    let mut backends: HashMap<String, Arc<dyn ResourceCollector>> = HashMap::new();
    // (collector, client, poll_interval) per backend, kept concrete so the
    // rescrape task below can call `RedfishResourceCollector::rescrape`,
    // which isn't part of the type-erased `ResourceCollector` trait.
    let mut rescrape_tasks = Vec::new();
    for backend in &config.redfish_backends {
        tracing::info!(agent = %backend.agent, base_url = %backend.base_url, "crawling redfish backend");
        let (collector, client) = build_collector(backend).await;

        let updater = Arc::new(RedfishSnapshotUpdater::new());
        if let Some(entry) = mapper_config.agents.iter_mut().find(|a| a.name == backend.agent) {
            entry.updater = Box::new(updater.clone());
        }

        backends.insert(backend.agent.clone(), collector.clone() as Arc<dyn ResourceCollector>);
        rescrape_tasks.push((collector, client, updater, backend.poll_interval));
    }

    let mapper = Arc::new(GraphDevpathMapper::new(mapper_config)?);

    let aggregator = Arc::new(ResourceAggregator::new(mapper.clone(), backends));
    let frontend = MachineMasterFrontend::new(aggregator.clone());

    let rebuild_mapper = mapper.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            if let Err(e) = rebuild_mapper.rebuild(false) {
                tracing::warn!(error = %e, "devpath mapper rebuild failed");
            }
        }
    });

    for (collector, client, updater, poll_interval) in rescrape_tasks {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;
                if let Some(plugins) = collector.rescrape(client.as_ref()).await {
                    tracing::info!(plugin_count = plugins.len(), "redfish backend topology changed");
                    updater.report_change(plugins);
                }
            }
        });
    }

    frontend::serve(&config.frontend.grpc, frontend).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MachineMasterConfiguration::load(&args.config)?;
    let env_filter = config
        .log_level
        .as_deref()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::from_default_env().add_directive("info".parse().unwrap()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "machine master exited with an error");
        std::process::exit(1);
    }
    Ok(())
}
