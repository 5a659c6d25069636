// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Non-interactive command execution inside a running container.

use stagehand_k8s::{ExecProcess, ExecStatus, K8sError};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::controller::{race, WorkloadController};
use crate::error::WorkloadError;
use crate::types::ExecResult;
use crate::validation::{validate_command, validate_name};

impl WorkloadController {
	/// Run `command` in `container` of the pod `workload` and capture its output.
	///
	/// Succeeds only when the transport reports success and stderr is empty;
	/// any stderr output is treated as failure regardless of exit status.
	/// Cancelling drops the stream.
	pub async fn exec(
		&self,
		workload: &str,
		container: &str,
		command: &[String],
		cancel: &CancellationToken,
	) -> Result<ExecResult, WorkloadError> {
		self.ensure_active()?;
		validate_name("workload", workload)?;
		validate_name("container", container)?;
		validate_command(command)?;

		self.fetch_pod(workload, "exec", cancel).await?;

		tracing::debug!(
			name = %workload,
			container = %container,
			command = ?command,
			"executing command"
		);

		let process = race(
			cancel,
			"exec",
			workload,
			self
				.client()
				.exec(workload, self.namespace(), container, command),
		)
		.await?
		.map_err(|source| match source {
			K8sError::PodNotFound { .. } => WorkloadError::NotFound {
				kind: "workload",
				name: workload.to_string(),
			},
			source => exec_error(workload, container, &[], &[], source),
		})?;

		let ExecProcess {
			mut stdout,
			mut stderr,
			status,
		} = process;

		let mut out = Vec::new();
		let mut err = Vec::new();

		let drained = race(cancel, "exec", workload, async {
			tokio::try_join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err))?;
			Ok::<_, std::io::Error>(status.await)
		})
		.await?;

		let status = match drained {
			Ok(status) => status,
			Err(e) => {
				return Err(exec_error(
					workload,
					container,
					&out,
					&err,
					K8sError::ExecError {
						message: format!("reading output: {e}"),
					},
				));
			}
		};

		match status {
			ExecStatus::Failure { reason, message } => {
				tracing::debug!(name = %workload, container = %container, %reason, "command failed");
				Err(exec_error(
					workload,
					container,
					&out,
					&err,
					K8sError::ExecError {
						message: format!("{reason}: {message}"),
					},
				))
			}
			ExecStatus::Success if !err.is_empty() => Err(WorkloadError::CommandFailed {
				workload: workload.to_string(),
				container: container.to_string(),
				stdout: String::from_utf8_lossy(&out).into_owned(),
				stderr: String::from_utf8_lossy(&err).into_owned(),
			}),
			ExecStatus::Success => Ok(ExecResult {
				stdout: out,
				stderr: err,
			}),
		}
	}
}

fn exec_error(
	workload: &str,
	container: &str,
	stdout: &[u8],
	stderr: &[u8],
	source: K8sError,
) -> WorkloadError {
	WorkloadError::Exec {
		workload: workload.to_string(),
		container: container.to_string(),
		stdout: String::from_utf8_lossy(stdout).into_owned(),
		stderr: String::from_utf8_lossy(stderr).into_owned(),
		source,
	}
}
