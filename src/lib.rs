//! Library core for RustySheets.

// --- Modules ---
pub mod api;
pub mod audit;
pub mod config;
pub mod excel;
pub mod graph;
pub mod policy;
pub mod resolver;

// Re-export key types for convenience
pub mod prelude {
    // Config
    pub use crate::config::Settings;

    // Excel core
    pub use crate::excel::address::{AddressError, CellCoordinate, ParsedRange};
    pub use crate::excel::geometry::{contains, overlaps};

    // Graph
    pub use crate::graph::{GraphApi, GraphAuthConfig, GraphError, HttpGraphClient, TokenProvider};

    // Policy & resolution
    pub use crate::policy::{DecisionCode, RangePolicy, WriteDecision};
    pub use crate::resolver::NameResolver;

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
    pub use thiserror::Error;
}
