// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use tracing::instrument;

use super::CliContext;

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
	/// Workload name
	pub name: String,

	/// Seconds the pod gets to shut down; cluster default when omitted
	#[arg(long)]
	pub grace_period: Option<u32>,
}

#[instrument(skip(ctx))]
pub async fn handle_delete(args: DeleteArgs, ctx: &CliContext) -> anyhow::Result<()> {
	ctx
		.controller
		.delete(&args.name, args.grace_period, &ctx.cancel)
		.await?;
	println!("deleted {}/{}", ctx.controller.namespace(), args.name);
	Ok(())
}
