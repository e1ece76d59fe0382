//! The gRPC service frontend (§4.9): a thin adapter that registers each
//! streaming RPC to the aggregator's generic `Enumerate`/`Query` entry
//! points. The frontend itself holds no state beyond a handle to the
//! aggregator.

mod transport;

pub use transport::serve;

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status as RpcStatus, Streaming};

use crate::aggregator::ResourceAggregator;
use crate::proto::mmaster::machine_master_service_server::MachineMasterService;
use crate::proto::mmaster::*;

/// Depth of the channel feeding each streaming RPC's response stream.
const STREAM_BUFFER: usize = 16;

#[derive(Clone)]
pub struct MachineMasterFrontend {
    aggregator: Arc<ResourceAggregator>,
}

impl MachineMasterFrontend {
    pub fn new(aggregator: Arc<ResourceAggregator>) -> Self {
        MachineMasterFrontend { aggregator }
    }
}

/// Generates one `Enumerate<R>`/`Query<R>` RPC method pair (plus their
/// associated streaming types) forwarding straight into the aggregator.
/// Every resource's RPC shape is identical at this layer, so the four
/// devpath-keyed resources and `OsDomain` all go through the same macro;
/// only `PowerDomain`'s mutation RPC is hand-written below.
macro_rules! resource_rpcs {
    (
        enumerate_rpc: $enumerate_rpc:ident, query_rpc: $query_rpc:ident,
        enumerate_stream: $enumerate_stream:ident, query_stream: $query_stream:ident,
        enum_resp_ty: $enum_resp_ty:ty, query_req_ty: $query_req_ty:ty, query_resp_ty: $query_resp_ty:ty,
        aggregator_enumerate: $aggregator_enumerate:ident, aggregator_query: $aggregator_query:ident,
    ) => {
        type $enumerate_stream = Pin<Box<dyn Stream<Item = Result<$enum_resp_ty, RpcStatus>> + Send + 'static>>;
        type $query_stream = Pin<Box<dyn Stream<Item = Result<$query_resp_ty, RpcStatus>> + Send + 'static>>;

        async fn $enumerate_rpc(&self, _request: Request<()>) -> Result<Response<Self::$enumerate_stream>, RpcStatus> {
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            let aggregator = self.aggregator.clone();
            tokio::spawn(async move {
                aggregator.$aggregator_enumerate(tx).await;
            });
            let stream = ReceiverStream::new(rx).map(Ok);
            Ok(Response::new(Box::pin(stream)))
        }

        async fn $query_rpc(
            &self,
            request: Request<Streaming<$query_req_ty>>,
        ) -> Result<Response<Self::$query_stream>, RpcStatus> {
            let mut inbound = request.into_inner();
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            let aggregator = self.aggregator.clone();
            tokio::spawn(async move {
                while let Ok(Some(request)) = inbound.message().await {
                    let response = aggregator.$aggregator_query(request).await;
                    if tx.send(Ok(response)).await.is_err() {
                        break;
                    }
                }
            });
            let stream = ReceiverStream::new(rx);
            Ok(Response::new(Box::pin(stream)))
        }
    };
}

#[tonic::async_trait]
impl MachineMasterService for MachineMasterFrontend {
    resource_rpcs! {
        enumerate_rpc: enumerate_os_domain, query_rpc: query_os_domain,
        enumerate_stream: EnumerateOsDomainStream, query_stream: QueryOsDomainStream,
        enum_resp_ty: EnumerateOsDomainResponse, query_req_ty: QueryOsDomainRequest, query_resp_ty: QueryOsDomainResponse,
        aggregator_enumerate: enumerate_os_domain, aggregator_query: query_os_domain,
    }

    resource_rpcs! {
        enumerate_rpc: enumerate_firmware, query_rpc: query_firmware,
        enumerate_stream: EnumerateFirmwareStream, query_stream: QueryFirmwareStream,
        enum_resp_ty: EnumerateFirmwareResponse, query_req_ty: QueryFirmwareRequest, query_resp_ty: QueryFirmwareResponse,
        aggregator_enumerate: enumerate_firmware, aggregator_query: query_firmware,
    }

    resource_rpcs! {
        enumerate_rpc: enumerate_storage, query_rpc: query_storage,
        enumerate_stream: EnumerateStorageStream, query_stream: QueryStorageStream,
        enum_resp_ty: EnumerateStorageResponse, query_req_ty: QueryStorageRequest, query_resp_ty: QueryStorageResponse,
        aggregator_enumerate: enumerate_storage, aggregator_query: query_storage,
    }

    resource_rpcs! {
        enumerate_rpc: enumerate_assembly, query_rpc: query_assembly,
        enumerate_stream: EnumerateAssemblyStream, query_stream: QueryAssemblyStream,
        enum_resp_ty: EnumerateAssemblyResponse, query_req_ty: QueryAssemblyRequest, query_resp_ty: QueryAssemblyResponse,
        aggregator_enumerate: enumerate_assembly, aggregator_query: query_assembly,
    }

    resource_rpcs! {
        enumerate_rpc: enumerate_sensor, query_rpc: query_sensor,
        enumerate_stream: EnumerateSensorStream, query_stream: QuerySensorStream,
        enum_resp_ty: EnumerateSensorResponse, query_req_ty: QuerySensorRequest, query_resp_ty: QuerySensorResponse,
        aggregator_enumerate: enumerate_sensor, aggregator_query: query_sensor,
    }

    /// Neither the aggregator nor the collector interface exposes a write
    /// path (§1's non-goals: "no write path beyond a defined mutation RPC
    /// shape"). The RPC shape exists on the wire; this binary doesn't wire
    /// it to anything yet.
    async fn mutate_power_domain_reset(
        &self,
        _request: Request<MutatePowerDomainResetRequest>,
    ) -> Result<Response<MutatePowerDomainResetResponse>, RpcStatus> {
        Err(RpcStatus::unimplemented(
            "PowerDomain reset has no collector-level implementation in this build",
        ))
    }
}
