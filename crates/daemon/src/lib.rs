//! PPG streaming daemon: the transport seam and the per-connection
//! service loop around the pipeline.

pub mod config;
pub mod connection;
pub mod transport;
