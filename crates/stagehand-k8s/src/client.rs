// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{ExecProcess, ForwardedStream, Pod};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the pod operations needed by the workload
/// controller.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create a new pod in the specified namespace.
	///
	/// Returns `K8sError::AlreadyExists` when a pod with the same name exists.
	async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sError>;

	/// Get a specific pod by name from the specified namespace.
	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError>;

	/// Delete a pod by name from the specified namespace.
	///
	/// `None` leaves the grace period to the platform default.
	async fn delete_pod(
		&self,
		name: &str,
		namespace: &str,
		grace_period_seconds: Option<u32>,
	) -> Result<(), K8sError>;

	/// Run a command in a container without stdin or a TTY.
	///
	/// Stdout and stderr are delivered on separate streams; the status future
	/// resolves once the remote process has exited.
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		command: &[String],
	) -> Result<ExecProcess, K8sError>;

	/// Open one forwarded connection to `port` on the pod.
	async fn port_forward(
		&self,
		name: &str,
		namespace: &str,
		port: u16,
	) -> Result<ForwardedStream, K8sError>;
}
