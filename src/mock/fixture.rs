//! JSON fixture shapes for the mock service (§4.10), and their conversion
//! into the generated `Query<Resource>Response` messages. A separate plain
//! struct per resource (rather than deriving `serde::Deserialize` directly
//! on the generated protobuf types) keeps the fixture format ordinary JSON
//! without requiring the generated messages to carry a serde derive of
//! their own.

use serde::Deserialize;

use crate::proto::mmaster::{
    AssemblyIdentifier, FirmwareIdentifier, OsDomainIdentifier, QueryAssemblyResponse, QueryFirmwareResponse,
    QueryOsDomainResponse, QuerySensorResponse, QueryStorageResponse, SensorIdentifier, Status, StatusCode,
    StorageIdentifier,
};

fn status_code(raw: &str) -> StatusCode {
    match raw {
        "NOT_FOUND" => StatusCode::NotFound,
        "DEADLINE_EXCEEDED" => StatusCode::DeadlineExceeded,
        "INTERNAL" => StatusCode::Internal,
        _ => StatusCode::Ok,
    }
}

fn status(raw: &str) -> Status {
    Status {
        code: status_code(raw) as i32,
        message: String::new(),
    }
}

fn default_status() -> String {
    "OK".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OsDomainFixture {
    pub name: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub os_type: String,
}

impl From<OsDomainFixture> for QueryOsDomainResponse {
    fn from(f: OsDomainFixture) -> Self {
        QueryOsDomainResponse {
            id: Some(OsDomainIdentifier { name: f.name }),
            status: Some(status(&f.status)),
            os_type: f.os_type,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FirmwareFixture {
    pub devpath: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub version: String,
}

impl From<FirmwareFixture> for QueryFirmwareResponse {
    fn from(f: FirmwareFixture) -> Self {
        QueryFirmwareResponse {
            id: Some(FirmwareIdentifier { devpath: f.devpath }),
            status: Some(status(&f.status)),
            version: f.version,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageFixture {
    pub devpath: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub capacity_bytes: i64,
    #[serde(default)]
    pub media_type: String,
}

impl From<StorageFixture> for QueryStorageResponse {
    fn from(f: StorageFixture) -> Self {
        QueryStorageResponse {
            id: Some(StorageIdentifier { devpath: f.devpath }),
            status: Some(status(&f.status)),
            capacity_bytes: f.capacity_bytes,
            media_type: f.media_type,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssemblyFixture {
    pub devpath: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub name: String,
}

impl From<AssemblyFixture> for QueryAssemblyResponse {
    fn from(f: AssemblyFixture) -> Self {
        QueryAssemblyResponse {
            id: Some(AssemblyIdentifier { devpath: f.devpath }),
            status: Some(status(&f.status)),
            name: f.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SensorFixture {
    pub devpath: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub reading_celsius: i32,
    #[serde(default)]
    pub upper_threshold_critical: i32,
}

impl From<SensorFixture> for QuerySensorResponse {
    fn from(f: SensorFixture) -> Self {
        QuerySensorResponse {
            id: Some(SensorIdentifier { devpath: f.devpath }),
            status: Some(status(&f.status)),
            reading_celsius: f.reading_celsius,
            upper_threshold_critical: f.upper_threshold_critical,
        }
    }
}
