//! Tree providers
//!
//! Each category (sources, workloads, clusters) has its own [`DataProvider`]
//! fed by a shared [`Fetcher`] and [`NamespaceCache`].

pub mod data;
pub mod fetch;
pub mod loading;
pub mod namespace;

pub use data::{ChangeOutcome, DataProvider, ProviderContext, ReloadOutcome, TreeChange, TreeEvent};
pub use fetch::{ClusterFetcher, FetchError, Fetcher};
pub use loading::{LoadState, ReloadScheduler};
pub use namespace::NamespaceCache;
