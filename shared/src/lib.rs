pub use anyhow::Error;

pub mod config;
pub mod key;
pub mod mqtt;

pub use config::Config;
pub use key::validate_pubkey;
