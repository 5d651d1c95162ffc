//! HyperClient - Main Library
//!
//! Re-exports the HTTP request pipeline and the reconnecting socket session,
//! plus the shared plumbing used by the binaries.
//!
//! ## Architecture
//!
//! - **hyperfetch**: request pipeline with caching, retry and interceptors (re-exported from workspace)
//! - **hypersockets**: reconnecting WebSocket session (re-exported from workspace)
//! - **bin_common**: config path resolution, combined settings and logging init for binaries
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use hyperclient::bin_common::{init_tracing, load_config_from_env, AppSettings, ConfigType};
//! ```

// Re-export workspace libraries for convenience
pub use hyperfetch;
pub use hypersockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod settings;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use settings::{AppSettings, AppSettingsError};
}
