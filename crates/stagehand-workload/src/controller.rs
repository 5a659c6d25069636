// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pod lifecycle: deploy, replace, delete and readiness.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stagehand_k8s::{K8sClient, K8sError, Pod};
use tokio_util::sync::CancellationToken;

use crate::config::WorkloadConfig;
use crate::error::WorkloadError;
use crate::manifest::build_pod;
use crate::retry::{PollError, RetryPolicy};
use crate::types::{ClientState, Workload, WorkloadDescriptor};
use crate::validation::{validate_descriptor, validate_name};

/// Manages workloads in a single namespace.
///
/// Holds no cached pod state; every read goes to the cluster.
pub struct WorkloadController {
	client: Arc<dyn K8sClient>,
	config: WorkloadConfig,
	terminated: AtomicBool,
	shutdown: CancellationToken,
}

impl WorkloadController {
	/// Create a new controller with the given K8s client and configuration.
	pub fn new(client: Arc<dyn K8sClient>, config: WorkloadConfig) -> Self {
		Self {
			client,
			config,
			terminated: AtomicBool::new(false),
			shutdown: CancellationToken::new(),
		}
	}

	/// Get the namespace this controller operates in.
	pub fn namespace(&self) -> &str {
		&self.config.namespace
	}

	pub fn config(&self) -> &WorkloadConfig {
		&self.config
	}

	pub fn state(&self) -> ClientState {
		if self.terminated.load(Ordering::SeqCst) {
			ClientState::Terminated
		} else {
			ClientState::Active
		}
	}

	/// Stop accepting work and shut down running tunnels. Idempotent.
	pub fn terminate(&self) {
		if !self.terminated.swap(true, Ordering::SeqCst) {
			tracing::info!(namespace = %self.config.namespace, "terminating workload controller");
		}
		self.shutdown.cancel();
	}

	pub(crate) fn ensure_active(&self) -> Result<(), WorkloadError> {
		match self.state() {
			ClientState::Active => Ok(()),
			ClientState::Terminated => Err(WorkloadError::ClientTerminated),
		}
	}

	pub(crate) fn client(&self) -> &Arc<dyn K8sClient> {
		&self.client
	}

	pub(crate) fn shutdown_token(&self) -> &CancellationToken {
		&self.shutdown
	}

	/// Validate, build and create the pod for `descriptor`.
	///
	/// A name collision is reported as [`WorkloadError::AlreadyExists`]; use
	/// [`replace`](Self::replace) for upsert behaviour.
	pub async fn deploy(
		&self,
		descriptor: &WorkloadDescriptor,
		with_seeding: bool,
		cancel: &CancellationToken,
	) -> Result<Workload, WorkloadError> {
		self.ensure_active()?;
		validate_descriptor(descriptor, self.namespace())?;
		self.create(descriptor, with_seeding, cancel).await
	}

	/// Delete any existing pod of the same name, wait until it is gone, then
	/// deploy a fresh one.
	///
	/// The new pod has no staging container: its volumes were seeded by the
	/// first deployment.
	pub async fn replace(
		&self,
		descriptor: &WorkloadDescriptor,
		grace_period_seconds: Option<u32>,
		cancel: &CancellationToken,
	) -> Result<Workload, WorkloadError> {
		self.ensure_active()?;
		validate_descriptor(descriptor, self.namespace())?;

		let name = &descriptor.name;
		self.delete(name, grace_period_seconds, cancel).await?;

		self
			.wait_for_absence(name, cancel)
			.await
			.map_err(|e| match e {
				e @ (WorkloadError::Cancelled { .. } | WorkloadError::ClientTerminated) => e,
				other => WorkloadError::WaitingForDeletion {
					name: name.clone(),
					source: Box::new(other),
				},
			})?;

		let workload = self.create(descriptor, false, cancel).await?;
		tracing::info!(name = %name, namespace = %self.namespace(), "replaced workload");
		Ok(workload)
	}

	/// [`replace`](Self::replace) with the platform's default grace period.
	pub async fn replace_default(
		&self,
		descriptor: &WorkloadDescriptor,
		cancel: &CancellationToken,
	) -> Result<Workload, WorkloadError> {
		self.replace(descriptor, None, cancel).await
	}

	/// Delete the pod `name`. Absence is not an error.
	///
	/// `None` leaves the grace period to the platform default.
	pub async fn delete(
		&self,
		name: &str,
		grace_period_seconds: Option<u32>,
		cancel: &CancellationToken,
	) -> Result<(), WorkloadError> {
		self.ensure_active()?;
		validate_name("workload", name)?;

		match self.fetch_pod(name, "delete", cancel).await {
			Ok(_) => {}
			Err(e) if e.is_not_found() => {
				tracing::debug!(name = %name, "workload already absent");
				return Ok(());
			}
			Err(e) => return Err(e),
		}

		let namespace = self.namespace();
		let result = race(
			cancel,
			"delete",
			name,
			self.client.delete_pod(name, namespace, grace_period_seconds),
		)
		.await?;

		match result {
			Ok(()) => {
				tracing::info!(name = %name, namespace = %namespace, "deleted workload");
				Ok(())
			}
			// Gone between the lookup and the delete
			Err(e) if e.is_not_found() => Ok(()),
			Err(source) => Err(WorkloadError::Delete {
				name: name.to_string(),
				source,
			}),
		}
	}

	/// [`delete`](Self::delete) with the platform's default grace period.
	pub async fn delete_default(
		&self,
		name: &str,
		cancel: &CancellationToken,
	) -> Result<(), WorkloadError> {
		self.delete(name, None, cancel).await
	}

	/// Whether every reported container status of the pod is ready.
	///
	/// Holds vacuously when no statuses are reported. A missing pod is an
	/// error, not `false`.
	pub async fn is_running(
		&self,
		name: &str,
		cancel: &CancellationToken,
	) -> Result<bool, WorkloadError> {
		let workload = self.get(name, cancel).await?;
		Ok(workload.all_containers_ready())
	}

	/// Read the current state of the pod `name`.
	pub async fn get(
		&self,
		name: &str,
		cancel: &CancellationToken,
	) -> Result<Workload, WorkloadError> {
		self.ensure_active()?;
		validate_name("workload", name)?;
		let pod = self.fetch_pod(name, "get", cancel).await?;
		Ok(Workload::from_pod(&pod))
	}

	async fn create(
		&self,
		descriptor: &WorkloadDescriptor,
		with_seeding: bool,
		cancel: &CancellationToken,
	) -> Result<Workload, WorkloadError> {
		let name = &descriptor.name;
		let pod = build_pod(descriptor, with_seeding)?;

		tracing::info!(
			name = %name,
			namespace = %self.namespace(),
			seeding = with_seeding,
			"creating workload pod"
		);

		let created = race(
			cancel,
			"deploy",
			name,
			self.client.create_pod(self.namespace(), pod),
		)
		.await?
		.map_err(|e| match e {
			K8sError::AlreadyExists { .. } => WorkloadError::AlreadyExists { name: name.clone() },
			source => WorkloadError::Create {
				name: name.clone(),
				source,
			},
		})?;

		Ok(Workload::from_pod(&created))
	}

	/// Poll until the pod `name` no longer exists.
	async fn wait_for_absence(
		&self,
		name: &str,
		cancel: &CancellationToken,
	) -> Result<(), WorkloadError> {
		let policy = RetryPolicy::fixed(self.config.retry_interval());

		let result = policy
			.poll_until(cancel, || async {
				if self.state() == ClientState::Terminated {
					return Err(WorkloadError::ClientTerminated);
				}
				match self.client.get_pod(name, self.namespace()).await {
					Ok(_) => {
						tracing::trace!(name = %name, "waiting for workload to be deleted");
						Ok(None)
					}
					Err(e) if e.is_not_found() => Ok(Some(())),
					Err(source) => Err(WorkloadError::Get {
						name: name.to_string(),
						source,
					}),
				}
			})
			.await;

		match result {
			Ok(()) => Ok(()),
			Err(PollError::Cancelled) => Err(WorkloadError::Cancelled {
				operation: "replace",
				name: name.to_string(),
			}),
			Err(PollError::Failed(e)) => Err(e),
		}
	}

	/// Fetch the pod, separating absence from other failures.
	pub(crate) async fn fetch_pod(
		&self,
		name: &str,
		operation: &'static str,
		cancel: &CancellationToken,
	) -> Result<Pod, WorkloadError> {
		race(
			cancel,
			operation,
			name,
			self.client.get_pod(name, self.namespace()),
		)
		.await?
		.map_err(|e| match e {
			e if e.is_not_found() => WorkloadError::NotFound {
				kind: "workload",
				name: name.to_string(),
			},
			source => WorkloadError::Get {
				name: name.to_string(),
				source,
			},
		})
	}
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn race<T>(
	cancel: &CancellationToken,
	operation: &'static str,
	name: &str,
	fut: impl Future<Output = T>,
) -> Result<T, WorkloadError> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(WorkloadError::Cancelled {
			operation,
			name: name.to_string(),
		}),
		out = fut => Ok(out),
	}
}
