// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{controller, ExecScript, MockK8sClient};
use stagehand_k8s::{ExecStatus, K8sError, STREAM_CLOSED_REASON};
use stagehand_workload::{ValidationError, WorkloadError};
use tokio_util::sync::CancellationToken;

fn cmd(parts: &[&str]) -> Vec<String> {
	parts.iter().map(|s| s.to_string()).collect()
}

fn running_pod() -> Arc<MockK8sClient> {
	let client = Arc::new(MockK8sClient::new());
	client.insert_pod("validator-0", &[true]);
	client
}

#[tokio::test]
async fn clean_exit_captures_stdout() {
	let client = running_pod();
	client.script_exec(ExecScript::Output {
		stdout: b"block height 42\n".to_vec(),
		stderr: Vec::new(),
		status: ExecStatus::Success,
	});
	let c = controller(client.clone());

	let result = c
		.exec(
			"validator-0",
			"validator",
			&cmd(&["validator", "status"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap();

	assert_eq!(result.stdout_lossy(), "block height 42\n");
	assert!(result.stderr.is_empty());
	assert_eq!(
		client.exec_calls(),
		vec![(
			"validator-0".to_string(),
			"validator".to_string(),
			cmd(&["validator", "status"])
		)]
	);
}

#[tokio::test]
async fn stderr_output_fails_even_on_clean_exit() {
	let client = running_pod();
	client.script_exec(ExecScript::Output {
		stdout: b"partial".to_vec(),
		stderr: b"warning: deprecated flag".to_vec(),
		status: ExecStatus::Success,
	});
	let c = controller(client);

	let err = c
		.exec(
			"validator-0",
			"validator",
			&cmd(&["validator", "--old"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();

	match err {
		WorkloadError::CommandFailed {
			workload,
			container,
			stdout,
			stderr,
		} => {
			assert_eq!(workload, "validator-0");
			assert_eq!(container, "validator");
			assert_eq!(stdout, "partial");
			assert_eq!(stderr, "warning: deprecated flag");
		}
		other => panic!("expected CommandFailed, got {other:?}"),
	}
}

#[tokio::test]
async fn non_zero_exit_carries_both_buffers() {
	let client = running_pod();
	client.script_exec(ExecScript::Output {
		stdout: b"starting".to_vec(),
		stderr: b"fatal: no such file".to_vec(),
		status: ExecStatus::Failure {
			reason: "NonZeroExitCode".to_string(),
			message: "command terminated with non-zero exit code: exit status 2".to_string(),
		},
	});
	let c = controller(client);

	let err = c
		.exec(
			"validator-0",
			"validator",
			&cmd(&["cat", "/missing"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();

	match err {
		WorkloadError::Exec {
			stdout,
			stderr,
			source: K8sError::ExecError { message },
			..
		} => {
			assert_eq!(stdout, "starting");
			assert_eq!(stderr, "fatal: no such file");
			assert!(message.starts_with("NonZeroExitCode"));
		}
		other => panic!("expected Exec error, got {other:?}"),
	}
}

#[tokio::test]
async fn stream_closed_without_status_keeps_partial_output() {
	let client = running_pod();
	client.script_exec(ExecScript::Output {
		stdout: b"syncing blocks 1..".to_vec(),
		stderr: Vec::new(),
		status: ExecStatus::stream_closed("error receiving websocket message"),
	});
	let c = controller(client);

	let err = c
		.exec(
			"validator-0",
			"validator",
			&cmd(&["validator", "sync"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();

	match err {
		WorkloadError::Exec {
			stdout,
			stderr,
			source: K8sError::ExecError { message },
			..
		} => {
			assert_eq!(stdout, "syncing blocks 1..");
			assert!(stderr.is_empty());
			assert!(message.starts_with(STREAM_CLOSED_REASON));
			assert!(message.contains("websocket"));
		}
		other => panic!("expected Exec error, got {other:?}"),
	}
}

#[tokio::test]
async fn stream_open_failure_is_an_exec_error() {
	let client = running_pod();
	client.script_exec(ExecScript::Fail(K8sError::ExecError {
		message: "upgrade refused".to_string(),
	}));
	let c = controller(client);

	let err = c
		.exec(
			"validator-0",
			"validator",
			&cmd(&["true"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();

	assert!(matches!(err, WorkloadError::Exec { .. }));
}

#[tokio::test]
async fn empty_command_is_rejected_before_any_call() {
	let client = running_pod();
	let c = controller(client.clone());

	let err = c
		.exec("validator-0", "validator", &[], &CancellationToken::new())
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		WorkloadError::Validation(ValidationError::EmptyCommand)
	));
	assert!(client.calls().is_empty());
}

#[tokio::test]
async fn missing_workload_is_not_found() {
	let client = Arc::new(MockK8sClient::new());
	let c = controller(client.clone());

	let err = c
		.exec(
			"ghost",
			"validator",
			&cmd(&["true"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();

	assert!(err.is_not_found());
	assert!(client.exec_calls().is_empty());
}

#[tokio::test]
async fn cancellation_stops_the_stream_read() {
	let client = running_pod();
	client.script_exec(ExecScript::Hang);
	let c = controller(client);
	let cancel = CancellationToken::new();

	let trigger = cancel.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(50)).await;
		trigger.cancel();
	});

	let err = tokio::time::timeout(
		Duration::from_secs(2),
		c.exec("validator-0", "validator", &cmd(&["sleep", "infinity"]), &cancel),
	)
	.await
	.expect("exec should observe cancellation")
	.unwrap_err();

	assert!(matches!(
		err,
		WorkloadError::Cancelled {
			operation: "exec",
			..
		}
	));
}
