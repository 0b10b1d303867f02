//! The container engine capability.
//!
//! The orchestrator only ever talks to a [`ContainerEngine`]. Production
//! uses [`crate::DockerCli`]; tests use [`crate::FakeEngine`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::error::NodeResult;

/// Boxed future alias for engine calls.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = NodeResult<T>> + Send + 'a>>;

/// A container as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
}

/// Publish `container_port/tcp` on `host_ip:host_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub host_ip: String,
    pub host_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub network: String,
    pub aliases: Vec<String>,
    pub ports: Vec<PortBinding>,
    pub mounts: Vec<Mount>,
}

/// Narrow view of a container engine.
pub trait ContainerEngine: Send + Sync {
    fn image_present<'a>(&'a self, image: &'a str) -> EngineFuture<'a, bool>;

    fn pull_image<'a>(&'a self, image: &'a str) -> EngineFuture<'a, ()>;

    fn network_present<'a>(&'a self, name: &'a str) -> EngineFuture<'a, bool>;

    fn create_network<'a>(&'a self, name: &'a str) -> EngineFuture<'a, ()>;

    /// All containers (running or not) whose name starts with `prefix`.
    fn list_containers<'a>(&'a self, prefix: &'a str) -> EngineFuture<'a, Vec<ContainerSummary>>;

    /// Create (but do not start) a container. Returns its id.
    fn create_container<'a>(&'a self, spec: &'a ContainerSpec) -> EngineFuture<'a, String>;

    fn start_container<'a>(&'a self, id: &'a str) -> EngineFuture<'a, ()>;

    fn remove_container<'a>(&'a self, id: &'a str, force: bool) -> EngineFuture<'a, ()>;
}
