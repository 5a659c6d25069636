// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Workload descriptor and handle types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stagehand_k8s::{ContainerStatus, Pod, Probe, SecurityContext};

/// Declarative description of a pod to provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
	/// Empty in a descriptor file means the controller's namespace.
	#[serde(default)]
	pub namespace: String,
	pub name: String,
	#[serde(default)]
	pub labels: BTreeMap<String, String>,
	#[serde(default)]
	pub annotations: BTreeMap<String, String>,
	/// Service account to run as; empty leaves the namespace default.
	#[serde(default)]
	pub service_account: String,
	#[serde(default)]
	pub fs_group: Option<i64>,
	pub container: ContainerSpec,
	#[serde(default)]
	pub sidecars: Vec<ContainerSpec>,
}

impl WorkloadDescriptor {
	pub fn new(
		namespace: impl Into<String>,
		name: impl Into<String>,
		container: ContainerSpec,
	) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
			labels: BTreeMap::new(),
			annotations: BTreeMap::new(),
			service_account: String::new(),
			fs_group: None,
			container,
			sidecars: Vec::new(),
		}
	}

	pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.labels.insert(key.into(), value.into());
		self
	}

	pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.annotations.insert(key.into(), value.into());
		self
	}

	pub fn with_service_account(mut self, service_account: impl Into<String>) -> Self {
		self.service_account = service_account.into();
		self
	}

	pub fn with_fs_group(mut self, fs_group: i64) -> Self {
		self.fs_group = Some(fs_group);
		self
	}

	pub fn with_sidecar(mut self, sidecar: ContainerSpec) -> Self {
		self.sidecars.push(sidecar);
		self
	}

	/// Primary container followed by sidecars, in manifest order.
	pub fn containers(&self) -> impl Iterator<Item = &ContainerSpec> {
		std::iter::once(&self.container).chain(self.sidecars.iter())
	}
}

/// When the kubelet pulls the container image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
	Always,
	#[default]
	IfNotPresent,
	Never,
}

impl PullPolicy {
	pub fn as_str(&self) -> &'static str {
		match self {
			PullPolicy::Always => "Always",
			PullPolicy::IfNotPresent => "IfNotPresent",
			PullPolicy::Never => "Never",
		}
	}
}

/// Memory and CPU quantities, as Kubernetes quantity strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
	/// Memory request (e.g., "256Mi")
	pub memory_request: String,
	/// Memory limit (e.g., "1Gi")
	pub memory_limit: String,
	/// CPU request (e.g., "500m")
	pub cpu_request: String,
}

impl Default for ResourceSpec {
	fn default() -> Self {
		Self {
			memory_request: "128Mi".to_string(),
			memory_limit: "512Mi".to_string(),
			cpu_request: "100m".to_string(),
		}
	}
}

/// One container of a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
	pub name: String,
	pub image: String,
	#[serde(default)]
	pub image_pull_policy: PullPolicy,
	#[serde(default)]
	pub command: Vec<String>,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	/// Persistent volumes, seeded from the image content at their paths.
	#[serde(default)]
	pub volumes: Vec<Volume>,
	/// Files mounted from the container's config map.
	#[serde(default)]
	pub files: Vec<File>,
	#[serde(default)]
	pub resources: ResourceSpec,
	#[serde(default)]
	pub liveness_probe: Option<Probe>,
	#[serde(default)]
	pub readiness_probe: Option<Probe>,
	#[serde(default)]
	pub startup_probe: Option<Probe>,
	#[serde(default)]
	pub security_context: Option<SecurityContext>,
}

impl ContainerSpec {
	pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			image: image.into(),
			image_pull_policy: PullPolicy::default(),
			command: Vec::new(),
			args: Vec::new(),
			env: BTreeMap::new(),
			volumes: Vec::new(),
			files: Vec::new(),
			resources: ResourceSpec::default(),
			liveness_probe: None,
			readiness_probe: None,
			startup_probe: None,
			security_context: None,
		}
	}

	pub fn with_command<I, S>(mut self, command: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.command = command.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	pub fn with_volume(mut self, volume: Volume) -> Self {
		self.volumes.push(volume);
		self
	}

	pub fn with_file(mut self, file: File) -> Self {
		self.files.push(file);
		self
	}

	pub fn with_resources(mut self, resources: ResourceSpec) -> Self {
		self.resources = resources;
		self
	}

	pub fn with_pull_policy(mut self, policy: PullPolicy) -> Self {
		self.image_pull_policy = policy;
		self
	}
}

/// A persistent volume mounted at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
	pub path: String,
	/// Kubernetes quantity (e.g., "1Gi")
	pub size: String,
	/// Numeric uid and gid that staged content is handed to.
	pub owner: i64,
}

impl Volume {
	pub fn new(path: impl Into<String>, size: impl Into<String>, owner: i64) -> Self {
		Self {
			path: path.into(),
			size: size.into(),
			owner,
		}
	}
}

/// A file delivered into the container at `dest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
	/// Path of the file's content on the submitting side.
	pub source: String,
	pub dest: String,
}

impl File {
	pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			dest: dest.into(),
		}
	}
}

/// Pod phase as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadPhase {
	/// Pod accepted, containers not yet running
	Pending,
	Running,
	Succeeded,
	Failed,
	/// Pod has a deletion timestamp
	Terminating,
	Unknown,
}

impl WorkloadPhase {
	pub fn from_pod(pod: &Pod) -> Self {
		if pod.metadata.deletion_timestamp.is_some() {
			return WorkloadPhase::Terminating;
		}

		match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
			Some("Pending") => WorkloadPhase::Pending,
			Some("Running") => WorkloadPhase::Running,
			Some("Succeeded") => WorkloadPhase::Succeeded,
			Some("Failed") => WorkloadPhase::Failed,
			_ => WorkloadPhase::Unknown,
		}
	}
}

/// Snapshot of a pod as returned by the cluster.
///
/// Not cached: every operation that returns one re-reads the pod.
#[derive(Debug, Clone, Serialize)]
pub struct Workload {
	pub name: String,
	pub namespace: String,
	pub uid: Option<String>,
	pub phase: WorkloadPhase,
	pub container_statuses: Vec<ContainerStatus>,
}

impl Workload {
	pub fn from_pod(pod: &Pod) -> Self {
		Self {
			name: pod.metadata.name.clone().unwrap_or_default(),
			namespace: pod.metadata.namespace.clone().unwrap_or_default(),
			uid: pod.metadata.uid.clone(),
			phase: WorkloadPhase::from_pod(pod),
			container_statuses: pod
				.status
				.as_ref()
				.and_then(|s| s.container_statuses.clone())
				.unwrap_or_default(),
		}
	}

	/// True iff every reported container status is ready. A pod that
	/// reports no statuses yet counts as ready.
	pub fn all_containers_ready(&self) -> bool {
		self.container_statuses.iter().all(|s| s.ready)
	}
}

/// Output of a command that completed cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
}

impl ExecResult {
	pub fn stdout_lossy(&self) -> String {
		String::from_utf8_lossy(&self.stdout).into_owned()
	}
}

/// Lifecycle of a [`crate::WorkloadController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
	Active,
	/// One-way; every operation fails with `ClientTerminated`.
	Terminated,
}
