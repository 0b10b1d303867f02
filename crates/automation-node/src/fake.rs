//! In-memory container engine for tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::{ContainerEngine, ContainerSpec, ContainerSummary, EngineFuture};
use crate::error::NodeError;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Debug, Default)]
struct EngineState {
    images: HashSet<String>,
    networks: HashSet<String>,
    containers: BTreeMap<String, FakeContainer>,
    next_id: u64,
    calls: Vec<String>,
}

/// Scriptable in-memory [`ContainerEngine`]. Every call is recorded.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_image(&self, image: &str) {
        self.lock().images.insert(image.to_string());
    }

    /// Containers currently known, keyed by id.
    pub fn containers(&self) -> Vec<FakeContainer> {
        self.lock().containers.values().cloned().collect()
    }

    pub fn container_named(&self, name: &str) -> Option<FakeContainer> {
        self.lock()
            .containers
            .values()
            .find(|c| c.spec.name == name)
            .cloned()
    }

    /// Simulate a container exiting.
    pub fn stop(&self, name: &str) {
        let mut state = self.lock();
        if let Some(c) = state.containers.values_mut().find(|c| c.spec.name == name) {
            c.running = false;
        }
    }

    /// Calls made so far, e.g. `"pull postgres:latest"`, `"create automation-bootstrap"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }
}

impl ContainerEngine for FakeEngine {
    fn image_present<'a>(&'a self, image: &'a str) -> EngineFuture<'a, bool> {
        Box::pin(async move { Ok(self.lock().images.contains(image)) })
    }

    fn pull_image<'a>(&'a self, image: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("pull {image}"));
            self.lock().images.insert(image.to_string());
            Ok(())
        })
    }

    fn network_present<'a>(&'a self, name: &'a str) -> EngineFuture<'a, bool> {
        Box::pin(async move { Ok(self.lock().networks.contains(name)) })
    }

    fn create_network<'a>(&'a self, name: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("network {name}"));
            self.lock().networks.insert(name.to_string());
            Ok(())
        })
    }

    fn list_containers<'a>(&'a self, prefix: &'a str) -> EngineFuture<'a, Vec<ContainerSummary>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .containers
                .values()
                .filter(|c| c.spec.name.starts_with(prefix))
                .map(|c| ContainerSummary {
                    id: c.id.clone(),
                    name: c.spec.name.clone(),
                    image: c.spec.image.clone(),
                    running: c.running,
                })
                .collect())
        })
    }

    fn create_container<'a>(&'a self, spec: &'a ContainerSpec) -> EngineFuture<'a, String> {
        Box::pin(async move {
            self.record(format!("create {}", spec.name));
            let mut state = self.lock();
            if state.containers.values().any(|c| c.spec.name == spec.name) {
                return Err(NodeError::Container(format!(
                    "container name {} already in use",
                    spec.name
                )));
            }
            if !spec.network.is_empty() && !state.networks.contains(&spec.network) {
                return Err(NodeError::Container(format!(
                    "network {} not found",
                    spec.network
                )));
            }
            state.next_id += 1;
            let id = format!("fake-{:04}", state.next_id);
            state.containers.insert(
                id.clone(),
                FakeContainer {
                    id: id.clone(),
                    spec: spec.clone(),
                    running: false,
                },
            );
            Ok(id)
        })
    }

    fn start_container<'a>(&'a self, id: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("start {id}"));
            match self.lock().containers.get_mut(id) {
                Some(c) => {
                    c.running = true;
                    Ok(())
                }
                None => Err(NodeError::Container(format!("no such container: {id}"))),
            }
        })
    }

    fn remove_container<'a>(&'a self, id: &'a str, force: bool) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("remove {id}"));
            let mut state = self.lock();
            match state.containers.get(id) {
                None => Err(NodeError::Container(format!("no such container: {id}"))),
                Some(c) if c.running && !force => Err(NodeError::Container(format!(
                    "container {id} is running"
                ))),
                Some(_) => {
                    state.containers.remove(id);
                    Ok(())
                }
            }
        })
    }
}
