// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stagehand_k8s::KubeClient;
use stagehand_workload::{load_config_with_overrides, WorkloadConfigLayer, WorkloadController};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod version;

use commands::{
	CliContext, DeleteArgs, DeployArgs, ExecArgs, ForwardArgs, ReplaceArgs, StatusArgs,
};

/// Stagehand - short-lived Kubernetes workloads for test harnesses.
#[derive(Parser, Debug)]
#[command(
	name = "stagehand",
	about = "Provision and operate short-lived test workloads",
	version
)]
struct Args {
	/// Configuration file (TOML)
	#[arg(long, global = true, env = "STAGEHAND_CONFIG")]
	config: Option<PathBuf>,

	/// Namespace to operate in, overriding config and environment
	#[arg(long, global = true)]
	namespace: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create a workload from a descriptor file
	Deploy(DeployArgs),
	/// Delete and recreate a workload, keeping its volumes
	Replace(ReplaceArgs),
	/// Delete a workload
	Delete(DeleteArgs),
	/// Print a workload's phase and readiness as JSON
	Status(StatusArgs),
	/// Run a command in a workload container
	Exec(ExecArgs),
	/// Forward a local port to a workload port until interrupted
	Forward(ForwardArgs),
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let overrides = WorkloadConfigLayer {
		namespace: args.namespace.clone(),
		..Default::default()
	};
	let config = load_config_with_overrides(args.config.as_deref(), overrides)
		.context("failed to load configuration")?;

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.log_level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	tracing::debug!(
		namespace = %config.namespace,
		retry_interval_ms = config.retry_interval_ms,
		wait_retry_ms = config.wait_retry_ms,
		"configuration loaded"
	);

	let client = KubeClient::new()
		.await
		.context("failed to connect to the Kubernetes cluster")?;
	let controller = Arc::new(WorkloadController::new(Arc::new(client), config));
	let cancel = CancellationToken::new();

	{
		let controller = Arc::clone(&controller);
		let cancel = cancel.clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("interrupt received, shutting down");
				cancel.cancel();
				controller.terminate();
			}
		});
	}

	let ctx = CliContext { controller, cancel };

	match args.command {
		Command::Deploy(args) => commands::deploy::handle_deploy(args, &ctx).await,
		Command::Replace(args) => commands::deploy::handle_replace(args, &ctx).await,
		Command::Delete(args) => commands::delete::handle_delete(args, &ctx).await,
		Command::Status(args) => commands::status::handle_status(args, &ctx).await,
		Command::Exec(args) => commands::exec::handle_exec(args, &ctx).await,
		Command::Forward(args) => commands::forward::handle_forward(args, &ctx).await,
		Command::Version => Ok(()),
	}
}
