// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local port tunnels into running pods.
//!
//! Each tunnel is served by one background task. The task binds the local
//! listener, dials the pod's port-forward sub-resource and reports readiness
//! over a oneshot channel. The caller races that report against a timeout
//! and its cancellation token; whichever branch loses, the task is told to
//! stop through its own token and never stays blocked on a dial.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use stagehand_k8s::{ForwardedStream, K8sClient, K8sError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::controller::WorkloadController;
use crate::error::WorkloadError;
use crate::validation::{validate_name, validate_port};

/// The stream dialed during setup is only reused this soon after dialing;
/// an idle port-forward stream may have been closed by the cluster.
const PENDING_STREAM_MAX_AGE: Duration = Duration::from_secs(30);

/// A running tunnel from `127.0.0.1:<local_port>` to a pod port.
///
/// Dropping the handle leaves the tunnel running; it ends when the token it
/// was opened with is cancelled, on [`stop`](Self::stop), or when the
/// controller is terminated.
#[derive(Debug)]
pub struct PortTunnel {
	workload: String,
	local_port: u16,
	remote_port: u16,
	stop: CancellationToken,
	task: JoinHandle<()>,
}

impl PortTunnel {
	pub fn workload(&self) -> &str {
		&self.workload
	}

	pub fn local_port(&self) -> u16 {
		self.local_port
	}

	pub fn remote_port(&self) -> u16 {
		self.remote_port
	}

	pub fn local_addr(&self) -> SocketAddr {
		SocketAddr::from((Ipv4Addr::LOCALHOST, self.local_port))
	}

	/// Ask the forwarding task to stop. Open connections are dropped.
	pub fn stop(&self) {
		self.stop.cancel();
	}

	/// Stop the tunnel and wait for the forwarding task to exit.
	pub async fn close(self) {
		self.stop.cancel();
		if let Err(e) = self.task.await {
			if e.is_panic() {
				tracing::error!(name = %self.workload, "tunnel task panicked");
			}
		}
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}

struct Forwarder {
	client: Arc<dyn K8sClient>,
	namespace: String,
	workload: String,
	local_port: u16,
	remote_port: u16,
	stop: CancellationToken,
	shutdown: CancellationToken,
}

impl WorkloadController {
	/// Open a tunnel from `127.0.0.1:<local_port>` to `remote_port` on the pod
	/// `workload`, waiting until it is ready.
	///
	/// Fails with [`WorkloadError::TunnelTimeout`] when the forwarder is not
	/// ready within twice the base retry wait.
	pub async fn open_tunnel(
		&self,
		workload: &str,
		local_port: u16,
		remote_port: u16,
		cancel: &CancellationToken,
	) -> Result<PortTunnel, WorkloadError> {
		self.ensure_active()?;
		validate_name("workload", workload)?;
		let local_port = validate_port(local_port.into())?;
		let remote_port = validate_port(remote_port.into())?;

		self.fetch_pod(workload, "open_tunnel", cancel).await?;

		let stop = cancel.child_token();
		let (ready_tx, ready_rx) = oneshot::channel();
		let forwarder = Forwarder {
			client: self.client().clone(),
			namespace: self.namespace().to_string(),
			workload: workload.to_string(),
			local_port,
			remote_port,
			stop: stop.clone(),
			shutdown: self.shutdown_token().clone(),
		};
		let task = tokio::spawn(forwarder.run(ready_tx));

		let timeout = self.config().tunnel_timeout();
		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(WorkloadError::Cancelled {
				operation: "open_tunnel",
				name: workload.to_string(),
			}),
			signal = ready_rx => match signal {
				Ok(result) => result,
				Err(_) if self.shutdown_token().is_cancelled() => Err(WorkloadError::ClientTerminated),
				Err(_) => Err(WorkloadError::PortForward {
					name: workload.to_string(),
					source: K8sError::PortForwardError {
						message: "forwarder exited before becoming ready".to_string(),
					},
				}),
			},
			_ = tokio::time::sleep(timeout) => Err(WorkloadError::TunnelTimeout {
				name: workload.to_string(),
				local_port,
				remote_port,
				timeout,
			}),
		};

		match outcome {
			Ok(()) => {
				tracing::debug!(
					name = %workload,
					local_port,
					remote_port,
					"port tunnel ready"
				);
				Ok(PortTunnel {
					workload: workload.to_string(),
					local_port,
					remote_port,
					stop,
					task,
				})
			}
			Err(e) => {
				stop.cancel();
				tracing::warn!(name = %workload, local_port, remote_port, error = %e, "port tunnel failed");
				Err(e)
			}
		}
	}
}

impl Forwarder {
	async fn run(self, ready: oneshot::Sender<Result<(), WorkloadError>>) {
		let setup = tokio::select! {
			biased;
			_ = self.halted() => {
				tracing::debug!(name = %self.workload, "tunnel stopped before ready");
				return;
			}
			setup = self.setup() => setup,
		};

		let (listener, first) = match setup {
			Ok(parts) => parts,
			Err(e) => {
				let _ = ready.send(Err(e));
				return;
			}
		};

		if ready.send(Ok(())).is_err() {
			// Caller gave up between setup and signalling
			return;
		}

		self.serve(listener, first).await;
		tracing::debug!(name = %self.workload, local_port = self.local_port, "tunnel closed");
	}

	async fn setup(&self) -> Result<(TcpListener, ForwardedStream), WorkloadError> {
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, self.local_port))
			.await
			.map_err(|e| self.error(format!("binding 127.0.0.1:{}: {e}", self.local_port)))?;

		let stream = self.dial().await?;
		Ok((listener, stream))
	}

	async fn dial(&self) -> Result<ForwardedStream, WorkloadError> {
		self
			.client
			.port_forward(&self.workload, &self.namespace, self.remote_port)
			.await
			.map_err(|source| WorkloadError::PortForward {
				name: self.workload.clone(),
				source,
			})
	}

	/// Accept local connections until stopped. The first connection reuses
	/// the stream dialed during setup unless it has gone stale; later ones
	/// dial their own.
	async fn serve(&self, listener: TcpListener, first: ForwardedStream) {
		let mut pending = Some((first, Instant::now()));
		let mut connections = JoinSet::new();

		loop {
			tokio::select! {
				biased;
				_ = self.halted() => break,
				Some(joined) = connections.join_next(), if !connections.is_empty() => {
					if let Err(e) = joined {
						if e.is_panic() {
							tracing::error!(name = %self.workload, "tunnel connection panicked");
						}
					}
				}
				accepted = listener.accept() => {
					let (socket, peer) = match accepted {
						Ok(conn) => conn,
						Err(e) => {
							tracing::warn!(name = %self.workload, error = %e, "accept failed");
							continue;
						}
					};

					let upstream = match take_fresh(&mut pending, PENDING_STREAM_MAX_AGE) {
						Some(stream) => stream,
						None => {
							let dialed = tokio::select! {
								biased;
								_ = self.halted() => break,
								dialed = self.dial() => dialed,
							};
							match dialed {
								Ok(stream) => stream,
								Err(e) => {
									tracing::warn!(name = %self.workload, %peer, error = %e, "port forward dial failed");
									continue;
								}
							}
						}
					};

					tracing::debug!(name = %self.workload, %peer, "tunnel connection opened");
					connections.spawn(bridge(socket, upstream, self.workload.clone(), peer));
				}
			}
		}
		// Dropping the set aborts any open connections
	}

	async fn halted(&self) {
		tokio::select! {
			_ = self.stop.cancelled() => {}
			_ = self.shutdown.cancelled() => {}
		}
	}

	fn error(&self, message: String) -> WorkloadError {
		WorkloadError::PortForward {
			name: self.workload.clone(),
			source: K8sError::PortForwardError { message },
		}
	}
}

/// Take the pending stream if it was dialed within `max_age`. A stale stream
/// is dropped either way.
fn take_fresh(
	pending: &mut Option<(ForwardedStream, Instant)>,
	max_age: Duration,
) -> Option<ForwardedStream> {
	pending
		.take()
		.filter(|(_, dialed_at)| dialed_at.elapsed() < max_age)
		.map(|(stream, _)| stream)
}

async fn bridge(mut socket: TcpStream, mut upstream: ForwardedStream, workload: String, peer: SocketAddr) {
	match tokio::io::copy_bidirectional(&mut socket, &mut upstream).await {
		Ok((sent, received)) => {
			tracing::debug!(name = %workload, %peer, sent, received, "tunnel connection closed");
		}
		Err(e) => {
			tracing::debug!(name = %workload, %peer, error = %e, "tunnel connection ended with error");
		}
	}
}
