// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;

use clap::Args;
use stagehand_workload::WorkloadError;
use tracing::instrument;

use super::CliContext;

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
	/// Workload name
	pub name: String,

	/// Container to run the command in
	#[arg(long, short = 'c')]
	pub container: String,

	/// Command and arguments, after `--`
	#[arg(last = true, required = true)]
	pub command: Vec<String>,
}

#[instrument(skip(ctx))]
pub async fn handle_exec(args: ExecArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let outcome = ctx
		.controller
		.exec(&args.name, &args.container, &args.command, &ctx.cancel)
		.await;

	match outcome {
		Ok(result) => {
			std::io::stdout().write_all(&result.stdout)?;
			std::io::stderr().write_all(&result.stderr)?;
			Ok(())
		}
		Err(e) => {
			// Captured output is part of the failure report
			if let WorkloadError::CommandFailed { stdout, stderr, .. }
			| WorkloadError::Exec { stdout, stderr, .. } = &e
			{
				print!("{stdout}");
				eprint!("{stderr}");
			}
			Err(e.into())
		}
	}
}
