//! [`ContainerEngine`] backed by the `docker` command-line client.

use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::engine::{ContainerEngine, ContainerSpec, ContainerSummary, EngineFuture};
use crate::error::{NodeError, NodeResult};

/// Shells out to `docker` (or any CLI-compatible binary such as `podman`).
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

struct Output {
    success: bool,
    stdout: String,
    stderr: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String]) -> NodeResult<Output> {
        debug!(binary = %self.binary, ?args, "container engine command");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NodeError::Container(format!("failed to run {}: {e}", self.binary)))?;
        Ok(Output {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run and require a zero exit status.
    async fn run_checked(&self, args: &[String]) -> NodeResult<String> {
        let output = self.run(args).await?;
        if !output.success {
            return Err(NodeError::Container(format!(
                "{} {} failed: {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or_default(),
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Arguments for `docker create`.
pub(crate) fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = strings(&["create", "--name", &spec.name]);
    if !spec.network.is_empty() {
        args.push("--network".to_string());
        args.push(spec.network.clone());
        for alias in &spec.aliases {
            args.push("--network-alias".to_string());
            args.push(alias.clone());
        }
    }
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(format!(
            "{}:{}:{}/tcp",
            port.host_ip, port.host_port, port.container_port
        ));
    }
    for mount in &spec.mounts {
        args.push("-v".to_string());
        let mode = if mount.read_only { ":ro" } else { "" };
        args.push(format!("{}:{}{mode}", mount.source.display(), mount.target));
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

#[derive(Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State")]
    state: String,
}

/// Parse `docker ps --format '{{json .}}'` output, keeping names that start
/// with `prefix`.
pub(crate) fn parse_ps(output: &str, prefix: &str) -> NodeResult<Vec<ContainerSummary>> {
    let mut containers = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let ps: PsLine = serde_json::from_str(line)
            .map_err(|e| NodeError::Container(format!("unexpected ps output: {e}")))?;
        // The engine's name filter is a substring match.
        let Some(name) = ps
            .names
            .split(',')
            .map(|n| n.trim_start_matches('/'))
            .find(|n| n.starts_with(prefix))
        else {
            continue;
        };
        containers.push(ContainerSummary {
            id: ps.id,
            name: name.to_string(),
            image: ps.image,
            running: ps.state == "running",
        });
    }
    Ok(containers)
}

impl ContainerEngine for DockerCli {
    fn image_present<'a>(&'a self, image: &'a str) -> EngineFuture<'a, bool> {
        Box::pin(async move {
            let output = self.run(&strings(&["image", "inspect", image])).await?;
            Ok(output.success)
        })
    }

    fn pull_image<'a>(&'a self, image: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.run_checked(&strings(&["pull", image])).await?;
            Ok(())
        })
    }

    fn network_present<'a>(&'a self, name: &'a str) -> EngineFuture<'a, bool> {
        Box::pin(async move {
            let stdout = self
                .run_checked(&strings(&["network", "ls", "--format", "{{.Name}}"]))
                .await?;
            Ok(stdout.lines().any(|line| line.trim() == name))
        })
    }

    fn create_network<'a>(&'a self, name: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.run_checked(&strings(&["network", "create", name])).await?;
            Ok(())
        })
    }

    fn list_containers<'a>(&'a self, prefix: &'a str) -> EngineFuture<'a, Vec<ContainerSummary>> {
        Box::pin(async move {
            let filter = format!("name={prefix}");
            let stdout = self
                .run_checked(&strings(&["ps", "-a", "--filter", &filter, "--format", "{{json .}}"]))
                .await?;
            parse_ps(&stdout, prefix)
        })
    }

    fn create_container<'a>(&'a self, spec: &'a ContainerSpec) -> EngineFuture<'a, String> {
        Box::pin(async move {
            let stdout = self.run_checked(&create_args(spec)).await?;
            Ok(stdout.trim().to_string())
        })
    }

    fn start_container<'a>(&'a self, id: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.run_checked(&strings(&["start", id])).await?;
            Ok(())
        })
    }

    fn remove_container<'a>(&'a self, id: &'a str, force: bool) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            let mut args = strings(&["rm"]);
            if force {
                args.push("-f".to_string());
            }
            args.push(id.to_string());
            self.run_checked(&args).await?;
            Ok(())
        })
    }
}
