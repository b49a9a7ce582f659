pub mod core;
pub mod edgar;
pub mod error;
pub mod output;
pub mod pipeline;

// Re-exports
pub use crate::core::config::ExtractConfig;
pub use crate::edgar::client::{EdgarClient, RateLimiter};
pub use crate::edgar::report::StatementKind;
pub use crate::edgar::table::IndentMode;
pub use crate::output::manifest::{EntityManifest, FilingManifestEntry, StatementTable};
pub use crate::pipeline::extract_entity;
