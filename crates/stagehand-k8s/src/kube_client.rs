// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
	api::{Api, AttachParams, DeleteParams, PostParams},
	Client,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{ExecProcess, ExecStatus, ForwardedStream, TunnelIo};

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	/// Wrap an already configured kube client.
	pub fn from_client(client: Client) -> Self {
		Self { client }
	}

	fn pods(&self, namespace: &str) -> Api<Pod> {
		Api::namespaced(self.client.clone(), namespace)
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, pod), fields(name = ?pod.metadata.name))]
	async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sError> {
		let name = pod.metadata.name.clone().unwrap_or_default();
		self
			.pods(namespace)
			.create(&PostParams::default(), &pod)
			.await
			.map_err(|e| K8sError::for_pod(&name, e))
	}

	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError> {
		self
			.pods(namespace)
			.get(name)
			.await
			.map_err(|e| K8sError::for_pod(name, e))
	}

	#[instrument(skip(self))]
	async fn delete_pod(
		&self,
		name: &str,
		namespace: &str,
		grace_period_seconds: Option<u32>,
	) -> Result<(), K8sError> {
		let dp = DeleteParams {
			grace_period_seconds,
			..Default::default()
		};
		match self.pods(namespace).delete(name, &dp).await {
			Ok(_) => Ok(()),
			Err(e) => Err(K8sError::for_pod(name, e)),
		}
	}

	#[instrument(skip(self))]
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		command: &[String],
	) -> Result<ExecProcess, K8sError> {
		let ap = AttachParams::default()
			.container(container)
			.stdin(false)
			.stdout(true)
			.stderr(true)
			.tty(false);

		let mut attached = self
			.pods(namespace)
			.exec(name, command.to_vec(), &ap)
			.await
			.map_err(|e| match e {
				kube::Error::Api(ref err) if err.code == 404 => K8sError::PodNotFound { name: name.into() },
				_ => K8sError::ExecError {
					message: e.to_string(),
				},
			})?;

		let stdout = attached.stdout().ok_or_else(|| K8sError::ExecError {
			message: "stdout not available".into(),
		})?;
		let stderr = attached.stderr().ok_or_else(|| K8sError::ExecError {
			message: "stderr not available".into(),
		})?;
		let status = attached.take_status().ok_or_else(|| K8sError::ExecError {
			message: "status channel not available".into(),
		})?;

		// The status channel only closes empty when the stream task ended
		// early; its join result carries the transport error.
		let status = async move {
			match status.await {
				Some(status) => ExecStatus::from_status(status),
				None => match attached.join().await {
					Ok(()) => ExecStatus::stream_closed("exec stream closed without a status"),
					Err(e) => ExecStatus::stream_closed(e.to_string()),
				},
			}
		};

		Ok(ExecProcess {
			stdout: Box::pin(stdout),
			stderr: Box::pin(stderr),
			status: status.boxed(),
		})
	}

	#[instrument(skip(self))]
	async fn port_forward(
		&self,
		name: &str,
		namespace: &str,
		port: u16,
	) -> Result<ForwardedStream, K8sError> {
		let mut forwarder = self
			.pods(namespace)
			.portforward(name, &[port])
			.await
			.map_err(|e| match e {
				kube::Error::Api(ref err) if err.code == 404 => K8sError::PodNotFound { name: name.into() },
				_ => K8sError::PortForwardError {
					message: e.to_string(),
				},
			})?;

		let stream = forwarder
			.take_stream(port)
			.ok_or_else(|| K8sError::PortForwardError {
				message: format!("no stream for port {port}"),
			})?;

		debug!(port, "port forward stream established");
		Ok(Box::new(PortForwardStream {
			stream: Box::new(stream),
			forwarder,
		}))
	}
}

/// Keeps the kube forwarder task alive for as long as its stream is in use,
/// and aborts it once the stream is dropped.
struct PortForwardStream {
	stream: Box<dyn TunnelIo>,
	forwarder: kube::api::Portforwarder,
}

impl Drop for PortForwardStream {
	fn drop(&mut self) {
		self.forwarder.abort();
	}
}

impl AsyncRead for PortForwardStream {
	fn poll_read(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		Pin::new(&mut self.stream).poll_read(cx, buf)
	}
}

impl AsyncWrite for PortForwardStream {
	fn poll_write(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		Pin::new(&mut self.stream).poll_write(cx, buf)
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.stream).poll_flush(cx)
	}

	fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.stream).poll_shutdown(cx)
	}
}
