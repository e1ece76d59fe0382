//! Generated protobuf/gRPC types, produced by `tonic_build` from
//! `proto/mmaster.proto` at build time. Everything under this module is
//! generated code; hand-written logic lives alongside it, never inside it.

pub mod mmaster {
    tonic::include_proto!("mmaster");
}
