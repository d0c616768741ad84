//! [`Cluster`](crate::Cluster) backed by the `kubectl` CLI.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use gv_core::NamespacedName;
use tokio::process::Command;
use tracing::debug;

use crate::cluster::{EndpointResolver, ManifestDeployer, ResourcePoller};
use crate::object::{ObjectRef, PodSelector};

const GATEWAY_ADDRESS_JSONPATH: &str = "jsonpath={.status.addresses[0].value}";
const POD_PHASE_JSONPATH: &str = "jsonpath={.items[*].status.phase}";

#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: PathBuf,
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            context: None,
            kubeconfig: None,
        }
    }

    /// Use `binary` when given, otherwise find `kubectl` on PATH.
    pub fn locate(binary: Option<&Path>) -> Result<Self> {
        let binary = match binary {
            Some(path) => path.to_path_buf(),
            None => which::which("kubectl").context("kubectl not found on PATH")?,
        };
        Ok(Self::new(binary))
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn global_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(kubeconfig.into());
        }
        if let Some(context) = &self.context {
            args.push("--context".into());
            args.push(context.into());
        }
        args
    }

    /// Run kubectl and return stdout; a non-zero exit is an error carrying stderr.
    async fn run(&self, args: Vec<OsString>) -> Result<String> {
        let rendered = render(&args);
        debug!(command = %rendered, "Running kubectl");

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.global_args())
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "kubectl {rendered} failed ({}): {}",
                output.status,
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ManifestDeployer for Kubectl {
    async fn apply(&self, manifests: &[PathBuf]) -> Result<()> {
        if manifests.is_empty() {
            return Ok(());
        }
        self.run(apply_args(manifests)).await.map(drop)
    }

    async fn delete(&self, manifests: &[PathBuf]) -> Result<()> {
        if manifests.is_empty() {
            return Ok(());
        }
        self.run(delete_args(manifests)).await.map(drop)
    }
}

#[async_trait]
impl ResourcePoller for Kubectl {
    async fn object_exists(&self, object: &ObjectRef) -> Result<bool> {
        let stdout = self.run(get_object_args(object)).await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn pod_phases(&self, selector: &PodSelector) -> Result<Vec<String>> {
        let stdout = self.run(pod_phase_args(selector)).await?;
        Ok(parse_phases(&stdout))
    }
}

#[async_trait]
impl EndpointResolver for Kubectl {
    async fn gateway_address(&self, name: &NamespacedName) -> Result<Option<String>> {
        let args = strings([
            "get",
            "gateway",
            name.name.as_str(),
            "-n",
            name.namespace.as_str(),
            "-o",
            GATEWAY_ADDRESS_JSONPATH,
        ]);
        let stdout = self.run(args).await?;
        Ok(parse_address(&stdout))
    }
}

fn strings<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<OsString> {
    parts.into_iter().map(OsString::from).collect()
}

fn with_files(mut args: Vec<OsString>, manifests: &[PathBuf]) -> Vec<OsString> {
    for manifest in manifests {
        args.push("-f".into());
        args.push(manifest.into());
    }
    args
}

pub(crate) fn apply_args(manifests: &[PathBuf]) -> Vec<OsString> {
    with_files(strings(["apply"]), manifests)
}

pub(crate) fn delete_args(manifests: &[PathBuf]) -> Vec<OsString> {
    with_files(strings(["delete", "--ignore-not-found=true"]), manifests)
}

pub(crate) fn get_object_args(object: &ObjectRef) -> Vec<OsString> {
    strings([
        "get",
        object.kind.as_str(),
        object.name.as_str(),
        "-n",
        object.namespace.as_str(),
        "-o",
        "name",
        "--ignore-not-found=true",
    ])
}

pub(crate) fn pod_phase_args(selector: &PodSelector) -> Vec<OsString> {
    strings([
        "get",
        "pods",
        "-n",
        selector.namespace.as_str(),
        "-l",
        selector.label_selector.as_str(),
        "-o",
        POD_PHASE_JSONPATH,
    ])
}

pub(crate) fn parse_phases(stdout: &str) -> Vec<String> {
    stdout.split_whitespace().map(str::to_string).collect()
}

pub(crate) fn parse_address(stdout: &str) -> Option<String> {
    let address = stdout.trim();
    (!address.is_empty()).then(|| address.to_string())
}

fn render(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "kubectl_tests.rs"]
mod tests;
