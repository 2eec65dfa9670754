pub mod config;
pub mod error;
pub mod layout;
pub mod navigation;
pub mod navigator;
pub mod store;
pub mod viewport;

pub use config::{
    BudgetConfig, ConfigError, EndpointConfig, LayoutConfig, NavigatorConfig, ViewportConfig,
};
pub use error::NavigatorError;
pub use layout::{LayoutResult, TreeLayouter};
pub use navigation::{ancestor_chain, resolve_query};
pub use navigator::{LoadSnapshot, Navigator, RootState, ToggleResult};
pub use store::{
    FetchOutcome, FetchPurpose, FetchTicket, IgnoreReason, Notice, RootSummary, StoreSnapshot,
    StoreStats, ToggleOutcome, TreeStateStore,
};
pub use viewport::{ViewTransform, ViewportController};
