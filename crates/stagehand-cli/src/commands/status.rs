// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use serde::Serialize;
use stagehand_workload::Workload;
use tracing::instrument;

use super::CliContext;

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
	/// Workload name
	pub name: String,
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
	#[serde(flatten)]
	workload: &'a Workload,
	running: bool,
}

#[instrument(skip(ctx))]
pub async fn handle_status(args: StatusArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let workload = ctx.controller.get(&args.name, &ctx.cancel).await?;
	println!("{}", render(&workload)?);
	Ok(())
}

fn render(workload: &Workload) -> serde_json::Result<String> {
	serde_json::to_string_pretty(&StatusReport {
		workload,
		running: workload.all_containers_ready(),
	})
}
