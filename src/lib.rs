pub mod app;
pub mod config;
pub mod kubernetes;
pub mod provider;
pub mod resource;
pub mod tree;

pub use app::{AppError, FluxViewApp};
pub use config::AppConfig;
pub use provider::{ClusterFetcher, DataProvider, Fetcher, NamespaceCache, TreeEvent};
pub use resource::{Category, KindRegistry, Resource};
pub use tree::{Node, NodeId, Tree};
