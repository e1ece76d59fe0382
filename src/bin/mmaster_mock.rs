//! Standalone mock Machine Master daemon: serves the `MachineMasterService`
//! interface over a local Unix domain socket, answering every RPC from a
//! directory of canned fixtures. Carried over from
//! `ecclesia/mmaster/mock/main.cc`'s `--uds_path`/`--mocks_dir` flags.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use mmaster::mock::MockService;
use mmaster::proto::mmaster::machine_master_service_server::MachineMasterServiceServer;

#[derive(Parser, Debug)]
#[command(name = "mmaster-mock", about = "Mock Machine Master service backed by canned fixtures")]
struct Args {
    /// Path to a local unix domain socket where the service will run.
    #[arg(long)]
    uds_path: PathBuf,

    /// Path to a directory containing mock Query RPC response fixtures.
    #[arg(long)]
    mocks_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let service = MockService::load(&args.mocks_dir)?;

    if args.uds_path.exists() {
        std::fs::remove_file(&args.uds_path)?;
    }
    let listener = UnixListener::bind(&args.uds_path)?;
    let incoming = UnixListenerStream::new(listener);

    tracing::info!(path = %args.uds_path.display(), mocks_dir = %args.mocks_dir.display(), "mock machine master listening");

    Server::builder()
        .add_service(MachineMasterServiceServer::new(service))
        .serve_with_incoming(incoming)
        .await?;

    Ok(())
}
