// All core functionality is in platscan-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod discovery;
pub mod summary;

// Re-export core types for convenience
pub use platscan_core::*;

// Re-export CLI utilities
pub use discovery::{default_config_path, discover_files};
pub use summary::RunSummary;
