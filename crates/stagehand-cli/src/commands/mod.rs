// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use stagehand_workload::{WorkloadController, WorkloadDescriptor};
use tokio_util::sync::CancellationToken;

pub mod delete;
pub mod deploy;
pub mod exec;
pub mod forward;
pub mod status;

pub use delete::DeleteArgs;
pub use deploy::{DeployArgs, ReplaceArgs};
pub use exec::ExecArgs;
pub use forward::ForwardArgs;
pub use status::StatusArgs;

pub struct CliContext {
	pub controller: Arc<WorkloadController>,
	/// Cancelled on Ctrl+C.
	pub cancel: CancellationToken,
}

/// Read a descriptor file, defaulting its namespace to `namespace`.
pub fn read_descriptor(path: &Path, namespace: &str) -> anyhow::Result<WorkloadDescriptor> {
	let contents = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read descriptor {}", path.display()))?;
	let mut descriptor: WorkloadDescriptor = toml::from_str(&contents)
		.with_context(|| format!("failed to parse descriptor {}", path.display()))?;

	if descriptor.namespace.is_empty() {
		descriptor.namespace = namespace.to_string();
	}
	Ok(descriptor)
}
