// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use tracing::{info, instrument};

use super::CliContext;

#[derive(Debug, Clone, Args)]
pub struct ForwardArgs {
	/// Workload name
	pub name: String,

	/// Port pair as LOCAL:REMOTE
	#[arg(value_parser = parse_port_pair)]
	pub ports: (u16, u16),
}

fn parse_port_pair(s: &str) -> Result<(u16, u16), String> {
	let (local, remote) = s
		.split_once(':')
		.ok_or_else(|| format!("expected LOCAL:REMOTE, got '{s}'"))?;
	let port = |p: &str| {
		p.parse::<u16>()
			.map_err(|_| format!("invalid port '{p}' in '{s}'"))
	};
	Ok((port(local)?, port(remote)?))
}

#[instrument(skip(ctx))]
pub async fn handle_forward(args: ForwardArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let (local_port, remote_port) = args.ports;
	let tunnel = ctx
		.controller
		.open_tunnel(&args.name, local_port, remote_port, &ctx.cancel)
		.await?;

	println!(
		"forwarding {} -> {}:{}",
		tunnel.local_addr(),
		tunnel.workload(),
		tunnel.remote_port()
	);
	println!("Press Ctrl+C to stop the tunnel...");

	ctx.cancel.cancelled().await;
	tunnel.close().await;
	info!(name = %args.name, local_port, remote_port, "tunnel stopped");
	Ok(())
}
