pub mod config;

pub use config::ExtractConfig;
