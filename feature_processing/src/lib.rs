pub mod aggregator;
pub mod config;
pub mod error;
pub mod explain;
pub mod headlines;
pub mod indicators;
pub mod misc;
pub mod sentiment;
pub mod server;
