//! Listening-endpoint selection (§4.9): a local Unix domain socket, a TCP
//! port on `[::]`, or both, mirroring the teacher-grounded
//! `AddToServerBuilder` from `ecclesia/mmaster/frontends/grpc/grpc.cc` —
//! register the same service against every configured listener.

use anyhow::Context;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::config::GrpcConfig;
use crate::proto::mmaster::machine_master_service_server::MachineMasterServiceServer;

use super::MachineMasterFrontend;

/// Binds `frontend` to every endpoint named in `config` and serves until
/// the first listener exits (normally never, since both run forever).
pub async fn serve(config: &GrpcConfig, frontend: MachineMasterFrontend) -> anyhow::Result<()> {
    if config.unix_domain.is_none() && config.network.is_none() {
        anyhow::bail!("frontend.grpc must configure at least one of unix_domain or network");
    }

    let mut handles = Vec::new();

    if let Some(unix_domain) = &config.unix_domain {
        let path = unix_domain.path.clone();
        if std::path::Path::new(&path).exists() {
            std::fs::remove_file(&path).with_context(|| format!("removing stale socket {path}"))?;
        }
        let listener = UnixListener::bind(&path).with_context(|| format!("binding unix domain socket {path}"))?;
        let incoming = UnixListenerStream::new(listener);
        let svc = MachineMasterServiceServer::new(frontend.clone());
        info!(path = %path, "listening on unix domain socket");
        handles.push(tokio::spawn(async move {
            Server::builder().add_service(svc).serve_with_incoming(incoming).await
        }));
    }

    if let Some(network) = &config.network {
        let addr = format!("[::]:{}", network.port).parse().context("parsing network listen address")?;
        let svc = MachineMasterServiceServer::new(frontend.clone());
        info!(port = network.port, "listening on tcp");
        handles.push(tokio::spawn(async move { Server::builder().add_service(svc).serve(addr).await }));
    }

    for handle in handles {
        handle.await.context("frontend listener task panicked")?.context("frontend listener exited with an error")?;
    }
    Ok(())
}
