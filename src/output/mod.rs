pub mod manifest;
pub mod paths;

pub use manifest::{EntityManifest, FilingManifestEntry, StatementTable};
pub use paths::resolve_under_root;
