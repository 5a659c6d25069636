// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::Args;
use tracing::instrument;

use super::{read_descriptor, CliContext};

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
	/// Workload descriptor (TOML)
	pub descriptor: PathBuf,

	/// Stage files and seed volumes before the workload starts
	#[arg(long)]
	pub seed: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ReplaceArgs {
	/// Workload descriptor (TOML)
	pub descriptor: PathBuf,

	/// Seconds the old pod gets to shut down
	#[arg(long)]
	pub grace_period: Option<u32>,
}

#[instrument(skip(ctx))]
pub async fn handle_deploy(args: DeployArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let descriptor = read_descriptor(&args.descriptor, ctx.controller.namespace())?;
	let workload = ctx
		.controller
		.deploy(&descriptor, args.seed, &ctx.cancel)
		.await?;

	println!(
		"deployed {}/{} ({})",
		workload.namespace,
		workload.name,
		workload.uid.as_deref().unwrap_or("-")
	);
	Ok(())
}

#[instrument(skip(ctx))]
pub async fn handle_replace(args: ReplaceArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let descriptor = read_descriptor(&args.descriptor, ctx.controller.namespace())?;
	let workload = ctx
		.controller
		.replace(&descriptor, args.grace_period, &ctx.cancel)
		.await?;

	println!(
		"replaced {}/{} ({})",
		workload.namespace,
		workload.name,
		workload.uid.as_deref().unwrap_or("-")
	);
	Ok(())
}
