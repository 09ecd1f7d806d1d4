#![deny(unsafe_code)]

//! Library code shared by the `sensor-web` api and the `sensor-cli` admin tool. Everything here
//! is read-only: sensor records are written by the ingestion side of the platform and this crate
//! only ever queries them.

/// Constant values; defaults for optional configuration.
pub mod constants;

/// Configuration schemas shared by the binaries.
pub mod config;

/// Helpers for establishing our mongodb client.
pub mod mongo;

/// The persisted + wire representations of sensor records.
pub mod schema;

/// The record store abstraction, along with the mongo and in-memory implementations.
pub mod store;

/// The query service that sits between the web api and the record store.
pub mod query;

/// The web api.
pub mod api;
