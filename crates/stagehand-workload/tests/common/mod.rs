// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use stagehand_k8s::{
	ContainerStatus, ExecProcess, ExecStatus, ForwardedStream, K8sClient, K8sError, Pod, PodStatus,
};
use stagehand_workload::{ContainerSpec, WorkloadConfig, WorkloadController, WorkloadDescriptor};
use tokio::io::{duplex, DuplexStream};

pub const NAMESPACE: &str = "test";

/// What `exec` hands back.
pub enum ExecScript {
	Output {
		stdout: Vec<u8>,
		stderr: Vec<u8>,
		status: ExecStatus,
	},
	/// Streams that never close.
	Hang,
	Fail(K8sError),
}

/// What `port_forward` does.
pub enum ForwardMode {
	/// Each stream echoes back whatever it receives.
	Echo,
	Fail(String),
	/// Never resolves; records when the pending call is dropped.
	Hang,
}

pub struct MockK8sClient {
	pods: Mutex<HashMap<String, Pod>>,
	/// Remaining `get_pod` calls that still see a deleted pod.
	lingering: Mutex<HashMap<String, u32>>,
	linger_polls: AtomicU32,
	calls: Mutex<Vec<String>>,
	created: Mutex<Vec<Pod>>,
	deletes: Mutex<Vec<(String, Option<u32>)>>,
	exec_script: Mutex<Option<ExecScript>>,
	exec_calls: Mutex<Vec<(String, String, Vec<String>)>>,
	held_writers: Mutex<Vec<DuplexStream>>,
	forward_mode: Mutex<ForwardMode>,
	forward_calls: AtomicU32,
	pending_forward_dropped: Arc<AtomicBool>,
	uid_counter: AtomicU32,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self {
			pods: Mutex::new(HashMap::new()),
			lingering: Mutex::new(HashMap::new()),
			linger_polls: AtomicU32::new(0),
			calls: Mutex::new(Vec::new()),
			created: Mutex::new(Vec::new()),
			deletes: Mutex::new(Vec::new()),
			exec_script: Mutex::new(None),
			exec_calls: Mutex::new(Vec::new()),
			held_writers: Mutex::new(Vec::new()),
			forward_mode: Mutex::new(ForwardMode::Echo),
			forward_calls: AtomicU32::new(0),
			pending_forward_dropped: Arc::new(AtomicBool::new(false)),
			uid_counter: AtomicU32::new(0),
		}
	}

	/// Deleted pods stay visible for this many `get_pod` calls.
	pub fn with_linger_polls(self, polls: u32) -> Self {
		self.linger_polls.store(polls, Ordering::SeqCst);
		self
	}

	pub fn insert_pod(&self, name: &str, ready: &[bool]) {
		let statuses = ready
			.iter()
			.enumerate()
			.map(|(i, r)| ContainerStatus {
				name: format!("c{i}"),
				ready: *r,
				..Default::default()
			})
			.collect();

		let pod = Pod {
			metadata: stagehand_k8s::ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some(NAMESPACE.to_string()),
				uid: Some(format!("existing-{name}")),
				..Default::default()
			},
			status: Some(PodStatus {
				phase: Some("Running".to_string()),
				container_statuses: Some(statuses),
				..Default::default()
			}),
			..Default::default()
		};
		self.pods.lock().unwrap().insert(name.to_string(), pod);
	}

	pub fn has_pod(&self, name: &str) -> bool {
		self.pods.lock().unwrap().contains_key(name)
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap().clone()
	}

	pub fn created(&self) -> Vec<Pod> {
		self.created.lock().unwrap().clone()
	}

	pub fn deletes(&self) -> Vec<(String, Option<u32>)> {
		self.deletes.lock().unwrap().clone()
	}

	pub fn script_exec(&self, script: ExecScript) {
		*self.exec_script.lock().unwrap() = Some(script);
	}

	pub fn exec_calls(&self) -> Vec<(String, String, Vec<String>)> {
		self.exec_calls.lock().unwrap().clone()
	}

	pub fn set_forward_mode(&self, mode: ForwardMode) {
		*self.forward_mode.lock().unwrap() = mode;
	}

	pub fn forward_calls(&self) -> u32 {
		self.forward_calls.load(Ordering::SeqCst)
	}

	pub fn pending_forward_dropped(&self) -> bool {
		self.pending_forward_dropped.load(Ordering::SeqCst)
	}

	fn record(&self, call: String) {
		self.calls.lock().unwrap().push(call);
	}
}

fn scripted_reader(data: &[u8]) -> tokio_test::io::Mock {
	let mut builder = tokio_test::io::Builder::new();
	if !data.is_empty() {
		builder.read(data);
	}
	builder.build()
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
	fn drop(&mut self) {
		self.0.store(true, Ordering::SeqCst);
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_pod(&self, _namespace: &str, mut pod: Pod) -> Result<Pod, K8sError> {
		let name = pod.metadata.name.clone().unwrap_or_default();
		self.record(format!("create:{name}"));

		let mut pods = self.pods.lock().unwrap();
		if pods.contains_key(&name) {
			return Err(K8sError::AlreadyExists { name });
		}

		let n = self.uid_counter.fetch_add(1, Ordering::SeqCst);
		pod.metadata.uid = Some(format!("uid-{n}"));
		pod.status = Some(PodStatus {
			phase: Some("Pending".to_string()),
			..Default::default()
		});
		pods.insert(name, pod.clone());
		self.created.lock().unwrap().push(pod.clone());
		Ok(pod)
	}

	async fn get_pod(&self, name: &str, _namespace: &str) -> Result<Pod, K8sError> {
		self.record(format!("get:{name}"));

		let mut lingering = self.lingering.lock().unwrap();
		let mut pods = self.pods.lock().unwrap();
		if let Some(remaining) = lingering.get_mut(name) {
			if *remaining == 0 {
				lingering.remove(name);
				pods.remove(name);
			} else {
				*remaining -= 1;
			}
		}

		pods
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::PodNotFound {
				name: name.to_string(),
			})
	}

	async fn delete_pod(
		&self,
		name: &str,
		_namespace: &str,
		grace_period_seconds: Option<u32>,
	) -> Result<(), K8sError> {
		self.record(format!("delete:{name}"));
		self
			.deletes
			.lock()
			.unwrap()
			.push((name.to_string(), grace_period_seconds));

		let mut pods = self.pods.lock().unwrap();
		if !pods.contains_key(name) {
			return Err(K8sError::PodNotFound {
				name: name.to_string(),
			});
		}

		let polls = self.linger_polls.load(Ordering::SeqCst);
		if polls == 0 {
			pods.remove(name);
		} else {
			self
				.lingering
				.lock()
				.unwrap()
				.insert(name.to_string(), polls);
		}
		Ok(())
	}

	async fn exec(
		&self,
		name: &str,
		_namespace: &str,
		container: &str,
		command: &[String],
	) -> Result<ExecProcess, K8sError> {
		self.record(format!("exec:{name}"));
		self
			.exec_calls
			.lock()
			.unwrap()
			.push((name.to_string(), container.to_string(), command.to_vec()));

		let script = self.exec_script.lock().unwrap().take().unwrap_or(ExecScript::Output {
			stdout: Vec::new(),
			stderr: Vec::new(),
			status: ExecStatus::Success,
		});

		match script {
			ExecScript::Output {
				stdout,
				stderr,
				status,
			} => {
				Ok(ExecProcess {
					stdout: Box::pin(scripted_reader(&stdout)),
					stderr: Box::pin(scripted_reader(&stderr)),
					status: async move { status }.boxed(),
				})
			}
			ExecScript::Hang => {
				let (stdout, stdout_writer) = duplex(64);
				let (stderr, stderr_writer) = duplex(64);
				let mut held = self.held_writers.lock().unwrap();
				held.push(stdout_writer);
				held.push(stderr_writer);
				Ok(ExecProcess {
					stdout: Box::pin(stdout),
					stderr: Box::pin(stderr),
					status: futures::future::pending().boxed(),
				})
			}
			ExecScript::Fail(e) => Err(e),
		}
	}

	async fn port_forward(
		&self,
		name: &str,
		_namespace: &str,
		_port: u16,
	) -> Result<ForwardedStream, K8sError> {
		self.record(format!("forward:{name}"));
		self.forward_calls.fetch_add(1, Ordering::SeqCst);

		let hang = {
			let mode = self.forward_mode.lock().unwrap();
			match &*mode {
				ForwardMode::Echo => false,
				ForwardMode::Fail(message) => {
					return Err(K8sError::PortForwardError {
						message: message.clone(),
					});
				}
				ForwardMode::Hang => true,
			}
		};

		if hang {
			let _guard = DropFlag(self.pending_forward_dropped.clone());
			return futures::future::pending().await;
		}

		let (client, server) = duplex(64 * 1024);
		tokio::spawn(async move {
			let (mut reader, mut writer) = tokio::io::split(server);
			let _ = tokio::io::copy(&mut reader, &mut writer).await;
		});
		Ok(Box::new(client))
	}
}

pub fn test_config() -> WorkloadConfig {
	WorkloadConfig {
		namespace: NAMESPACE.to_string(),
		retry_interval_ms: 10,
		wait_retry_ms: 50,
		log_level: "debug".to_string(),
	}
}

pub fn controller(client: Arc<MockK8sClient>) -> WorkloadController {
	WorkloadController::new(client, test_config())
}

pub fn descriptor(name: &str) -> WorkloadDescriptor {
	WorkloadDescriptor::new(
		NAMESPACE,
		name,
		ContainerSpec::new("validator", "ghcr.io/example/validator:v1")
			.with_volume(stagehand_workload::Volume::new("/data", "1Gi", 1000))
			.with_file(stagehand_workload::File::new("/tmp/cfg.toml", "/data/cfg.toml")),
	)
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

/// Poll `condition` for up to a second.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
	for _ in 0..100 {
		if condition() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	condition()
}
