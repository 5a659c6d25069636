// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Workload error types.

use std::path::PathBuf;
use std::time::Duration;

use stagehand_k8s::K8sError;

/// Descriptor or argument rejected before any call to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	#[error("Invalid {kind} name {value:?}: {reason}")]
	InvalidName {
		kind: &'static str,
		value: String,
		reason: String,
	},

	#[error("Invalid label {key:?}={value:?}: {reason}")]
	InvalidLabel {
		key: String,
		value: String,
		reason: String,
	},

	#[error("Invalid port {port}: must be between 1 and 65535")]
	InvalidPort { port: u32 },

	#[error("Command must not be empty")]
	EmptyCommand,

	#[error("{field} must not be empty")]
	EmptyField { field: String },

	#[error("Invalid resource quantity for {field}: {value:?}")]
	InvalidResourceQuantity { field: String, value: String },

	#[error("Volume size for {path} must be greater than zero (got {size})")]
	NonPositiveVolumeSize { path: String, size: String },

	#[error("Memory request {request} exceeds memory limit {limit} for container {container}")]
	MemoryRequestExceedsLimit {
		container: String,
		request: String,
		limit: String,
	},

	#[error("Workload namespace {descriptor} does not match controller namespace {controller}")]
	NamespaceMismatch {
		descriptor: String,
		controller: String,
	},

	#[error("Container name {name} is used more than once")]
	DuplicateContainerName { name: String },
}

/// Errors that can occur during workload operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
	/// The controller has been terminated and accepts no further work
	#[error("Workload controller has been terminated")]
	ClientTerminated,

	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Read-style lookup found nothing
	#[error("{kind} not found: {name}")]
	NotFound { kind: &'static str, name: String },

	/// Create rejected because the name is taken
	#[error("Workload already exists: {name}")]
	AlreadyExists { name: String },

	#[error("Failed to create workload {name}: {source}")]
	Create {
		name: String,
		#[source]
		source: K8sError,
	},

	#[error("Failed to get workload {name}: {source}")]
	Get {
		name: String,
		#[source]
		source: K8sError,
	},

	#[error("Failed to delete workload {name}: {source}")]
	Delete {
		name: String,
		#[source]
		source: K8sError,
	},

	#[error("Failed waiting for workload {name} to be deleted: {source}")]
	WaitingForDeletion {
		name: String,
		#[source]
		source: Box<WorkloadError>,
	},

	/// Exec transport failure or non-zero exit
	#[error("Failed to execute command in {workload}/{container}: {source} (stdout: {stdout:?}, stderr: {stderr:?})")]
	Exec {
		workload: String,
		container: String,
		stdout: String,
		stderr: String,
		#[source]
		source: K8sError,
	},

	/// Clean exit but the command wrote to stderr
	#[error("Command in {workload}/{container} wrote to stderr (stdout: {stdout:?}, stderr: {stderr:?})")]
	CommandFailed {
		workload: String,
		container: String,
		stdout: String,
		stderr: String,
	},

	#[error("Failed to forward ports for workload {name}: {source}")]
	PortForward {
		name: String,
		#[source]
		source: K8sError,
	},

	#[error("Timed out after {timeout:?} waiting for tunnel {local_port}->{name}:{remote_port}")]
	TunnelTimeout {
		name: String,
		local_port: u16,
		remote_port: u16,
		timeout: Duration,
	},

	#[error("{operation} cancelled for workload {name}")]
	Cancelled {
		operation: &'static str,
		name: String,
	},
}

impl WorkloadError {
	/// Whether this error reports that the workload does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, WorkloadError::NotFound { .. })
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, WorkloadError::Cancelled { .. })
	}
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}
