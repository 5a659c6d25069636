// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::pin::Pin;

use futures::future::BoxFuture;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use tokio::io::{AsyncRead, AsyncWrite};

pub use k8s_openapi::api::core::v1::{
	ConfigMapVolumeSource, Container, ContainerStatus, EnvVar, PersistentVolumeClaimVolumeSource,
	Pod, PodSecurityContext, PodSpec, PodStatus, Probe, ResourceRequirements, SecurityContext,
	Volume, VolumeMount,
};
pub use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Outcome of a remote command as reported by the exec transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
	/// The process exited with status zero.
	Success,
	/// The process failed or the transport reported an error.
	Failure { reason: String, message: String },
}

/// Reason reported when the exec stream ends without a `Status` object.
pub const STREAM_CLOSED_REASON: &str = "StreamClosed";

impl ExecStatus {
	/// Interpret the `Status` object sent on the exec error channel.
	pub fn from_status(status: Status) -> Self {
		if status.status.as_deref() == Some("Success") {
			return ExecStatus::Success;
		}

		ExecStatus::Failure {
			reason: status.reason.unwrap_or_else(|| "Unknown".to_string()),
			message: status.message.unwrap_or_default(),
		}
	}

	/// The stream closed before the API server sent a verdict. The command's
	/// outcome is unknown, so this is a failure.
	pub fn stream_closed(message: impl Into<String>) -> Self {
		ExecStatus::Failure {
			reason: STREAM_CLOSED_REASON.to_string(),
			message: message.into(),
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self, ExecStatus::Success)
	}
}

/// Output streams and final status of a non-interactive exec session.
pub struct ExecProcess {
	pub stdout: Pin<Box<dyn AsyncRead + Send>>,
	pub stderr: Pin<Box<dyn AsyncRead + Send>>,
	pub status: BoxFuture<'static, ExecStatus>,
}

/// Byte stream usable on both ends of a tunnel.
pub trait TunnelIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TunnelIo for T {}

/// One bidirectional connection to a pod port through the port-forward
/// sub-resource.
pub type ForwardedStream = Box<dyn TunnelIo>;
