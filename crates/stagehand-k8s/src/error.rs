// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("Pod not found: {name}")]
	PodNotFound { name: String },

	#[error("Pod already exists: {name}")]
	AlreadyExists { name: String },

	#[error("Operation timed out")]
	Timeout,

	#[error("Exec error: {message}")]
	ExecError { message: String },

	#[error("Port forward error: {message}")]
	PortForwardError { message: String },
}

impl K8sError {
	/// Whether this error reports that the pod does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, K8sError::PodNotFound { .. })
	}

	/// Map a kube error for a named pod, keeping 404 and 409 distinguishable.
	pub(crate) fn for_pod(name: &str, err: kube::Error) -> Self {
		match err {
			kube::Error::Api(ref resp) if resp.code == 404 => K8sError::PodNotFound { name: name.into() },
			kube::Error::Api(ref resp) if resp.code == 409 => K8sError::AlreadyExists { name: name.into() },
			e => e.into(),
		}
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}
