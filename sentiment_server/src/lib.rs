pub mod config;
pub mod error;
pub mod lexicon;
pub mod server;
