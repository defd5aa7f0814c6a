//! Strongbox server library.
//!
//! The binary in `main.rs` is a thin wrapper; everything lives here so
//! integration tests can drive the same code paths.

pub mod auth;
pub mod config;
pub mod error;
pub mod grpc;
pub mod server;
pub mod services;
pub mod shutdown;
pub mod storage;

pub mod proto {
    pub mod v1 {
        tonic::include_proto!("strongbox.v1");
    }
}
