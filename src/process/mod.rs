pub mod arg;
pub mod config;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod group;
pub mod interrupt;
pub mod output;
pub mod pipe;
pub mod state;
pub mod tokio;
