//! Kubernetes integration module
//!
//! Provides kubeconfig parsing and listing of Flux custom resources.

pub mod config;
pub mod client;

pub use config::{KubeConfig, KubeConfigError, KubeContext};
pub use client::{KubeClient, KubeClientError, KubeNamespace};
