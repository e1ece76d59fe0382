//! The mock service (§4.10): an alternate frontend, used by integration
//! tests and manual exploration, that answers every RPC from a directory of
//! canned `Query<R>Response` fixtures instead of a real collector fan-out.
//!
//! Grounded on `ecclesia/mmaster/mock/service.cc`'s `FindMockFiles` /
//! `LoadMockResponses` / `GenericResourceHandler`, carried over 1:1 in
//! structure. The original loads `*.textpb` files; prost has no textproto
//! reader, so this repo's fixtures are plain JSON instead (one object per
//! file, named `<Resource>.<n>.json`) — a supplement-in-idiom, not a
//! feature drop, per SPEC_FULL.md.

mod fixture;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status as RpcStatus, Streaming};
use tracing::warn;

use crate::mock::fixture::{AssemblyFixture, FirmwareFixture, OsDomainFixture, SensorFixture, StorageFixture};
use crate::proto::mmaster::machine_master_service_server::MachineMasterService;
use crate::proto::mmaster::*;

const STREAM_BUFFER: usize = 16;

/// Groups every `<Resource>.<n>.json` file in `mocks_dir` by `<Resource>`.
/// Files not matching that three-part, `json`-suffixed pattern are ignored.
fn find_mock_files(mocks_dir: &Path) -> std::io::Result<HashMap<String, Vec<PathBuf>>> {
    let mut filenames: HashMap<String, Vec<PathBuf>> = HashMap::new();
    for entry in std::fs::read_dir(mocks_dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() == 3 && parts[2] == "json" {
            filenames.entry(parts[0].to_string()).or_default().push(entry.path());
        }
    }
    Ok(filenames)
}

/// Loads every fixture file in `paths`, skipping (and logging) any that
/// fail to read or parse rather than aborting the whole load.
fn load_mock_responses<F, R>(paths: &[PathBuf]) -> Vec<R>
where
    F: DeserializeOwned,
    R: From<F>,
{
    let mut responses = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error reading mock fixture file");
                continue;
            }
        };
        match serde_json::from_str::<F>(&contents) {
            Ok(fixture) => responses.push(R::from(fixture)),
            Err(e) => warn!(path = %path.display(), error = %e, "error parsing mock fixture file"),
        }
    }
    responses
}

pub struct MockService {
    os_domain: Vec<QueryOsDomainResponse>,
    firmware: Vec<QueryFirmwareResponse>,
    storage: Vec<QueryStorageResponse>,
    assembly: Vec<QueryAssemblyResponse>,
    sensor: Vec<QuerySensorResponse>,
}

impl MockService {
    pub fn load(mocks_dir: &Path) -> std::io::Result<Self> {
        let files = find_mock_files(mocks_dir)?;
        let empty = Vec::new();
        Ok(MockService {
            os_domain: load_mock_responses::<OsDomainFixture, _>(files.get("OsDomain").unwrap_or(&empty)),
            firmware: load_mock_responses::<FirmwareFixture, _>(files.get("Firmware").unwrap_or(&empty)),
            storage: load_mock_responses::<StorageFixture, _>(files.get("Storage").unwrap_or(&empty)),
            assembly: load_mock_responses::<AssemblyFixture, _>(files.get("Assembly").unwrap_or(&empty)),
            sensor: load_mock_responses::<SensorFixture, _>(files.get("Sensor").unwrap_or(&empty)),
        })
    }
}

fn not_found_status() -> Status {
    Status {
        code: StatusCode::NotFound as i32,
        message: String::new(),
    }
}

/// Generates one `Enumerate<R>`/`Query<R>` RPC pair sourcing responses from
/// `self.$field` instead of a live collector fan-out. `Enumerate` serves up
/// the `id` of every loaded response; `Query` looks for a loaded response
/// whose `id` equals the request's (field-by-field, via the generated
/// messages' derived `PartialEq`), falling back to `NOT_FOUND`.
macro_rules! mock_resource_rpcs {
    (
        field: $field:ident,
        enumerate_rpc: $enumerate_rpc:ident, query_rpc: $query_rpc:ident,
        enumerate_stream: $enumerate_stream:ident, query_stream: $query_stream:ident,
        enum_resp_ty: $enum_resp_ty:ty, query_req_ty: $query_req_ty:ty, query_resp_ty: $query_resp_ty:ty,
    ) => {
        type $enumerate_stream = Pin<Box<dyn Stream<Item = Result<$enum_resp_ty, RpcStatus>> + Send + 'static>>;
        type $query_stream = Pin<Box<dyn Stream<Item = Result<$query_resp_ty, RpcStatus>> + Send + 'static>>;

        async fn $enumerate_rpc(&self, _request: Request<()>) -> Result<Response<Self::$enumerate_stream>, RpcStatus> {
            let ids: Vec<Result<$enum_resp_ty, RpcStatus>> =
                self.$field.iter().map(|r| Ok($enum_resp_ty { id: r.id.clone() })).collect();
            Ok(Response::new(futures::stream::iter(ids).boxed()))
        }

        async fn $query_rpc(
            &self,
            request: Request<Streaming<$query_req_ty>>,
        ) -> Result<Response<Self::$query_stream>, RpcStatus> {
            let mut inbound = request.into_inner();
            let responses = self.$field.clone();
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            tokio::spawn(async move {
                while let Ok(Some(request)) = inbound.message().await {
                    let response = match responses.iter().find(|r| r.id == request.id) {
                        Some(found) => found.clone(),
                        None => {
                            let mut response = <$query_resp_ty>::default();
                            response.id = request.id;
                            response.status = Some(not_found_status());
                            response
                        }
                    };
                    if tx.send(Ok(response)).await.is_err() {
                        break;
                    }
                }
            });
            Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
        }
    };
}

#[tonic::async_trait]
impl MachineMasterService for MockService {
    mock_resource_rpcs! {
        field: os_domain,
        enumerate_rpc: enumerate_os_domain, query_rpc: query_os_domain,
        enumerate_stream: EnumerateOsDomainStream, query_stream: QueryOsDomainStream,
        enum_resp_ty: EnumerateOsDomainResponse, query_req_ty: QueryOsDomainRequest, query_resp_ty: QueryOsDomainResponse,
    }

    mock_resource_rpcs! {
        field: firmware,
        enumerate_rpc: enumerate_firmware, query_rpc: query_firmware,
        enumerate_stream: EnumerateFirmwareStream, query_stream: QueryFirmwareStream,
        enum_resp_ty: EnumerateFirmwareResponse, query_req_ty: QueryFirmwareRequest, query_resp_ty: QueryFirmwareResponse,
    }

    mock_resource_rpcs! {
        field: storage,
        enumerate_rpc: enumerate_storage, query_rpc: query_storage,
        enumerate_stream: EnumerateStorageStream, query_stream: QueryStorageStream,
        enum_resp_ty: EnumerateStorageResponse, query_req_ty: QueryStorageRequest, query_resp_ty: QueryStorageResponse,
    }

    mock_resource_rpcs! {
        field: assembly,
        enumerate_rpc: enumerate_assembly, query_rpc: query_assembly,
        enumerate_stream: EnumerateAssemblyStream, query_stream: QueryAssemblyStream,
        enum_resp_ty: EnumerateAssemblyResponse, query_req_ty: QueryAssemblyRequest, query_resp_ty: QueryAssemblyResponse,
    }

    mock_resource_rpcs! {
        field: sensor,
        enumerate_rpc: enumerate_sensor, query_rpc: query_sensor,
        enumerate_stream: EnumerateSensorStream, query_stream: QuerySensorStream,
        enum_resp_ty: EnumerateSensorResponse, query_req_ty: QuerySensorRequest, query_resp_ty: QuerySensorResponse,
    }

    async fn mutate_power_domain_reset(
        &self,
        _request: Request<MutatePowerDomainResetRequest>,
    ) -> Result<Response<MutatePowerDomainResetResponse>, RpcStatus> {
        Err(RpcStatus::unimplemented("the mock service does not model PowerDomain reset"))
    }
}
