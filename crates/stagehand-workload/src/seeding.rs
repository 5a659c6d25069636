// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Data seeding for persistent volumes.
//!
//! A freshly bound volume is empty, and mounting it at a path hides whatever
//! the image shipped there. Before the main containers start, a staging
//! (init) container mounts the volume at [`STAGING_ROOT`] instead, where the
//! image content is still visible at the original paths, and copies that
//! content across.
//!
//! The planner is pure: it turns a container's volumes and files into the
//! mount layout of both containers and an ordered list of [`StagingStep`]s,
//! which is rendered to a single `sh -c` script.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use stagehand_k8s::VolumeMount;

use crate::types::{File, Volume};

/// Where the staging container mounts the volume.
pub const STAGING_ROOT: &str = "/stagehand";

/// Suffix of the config-map backed pod volume holding a container's files.
pub const CONFIG_VOLUME_SUFFIX: &str = "-config";

/// One discrete operation of the staging script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingStep {
	/// `set -xe`
	EnableTrace,
	MakeDir(String),
	CopyFile { from: String, to: String },
	/// Copy existing content of `source` into `mirror`, then hand it to `owner`.
	/// Skipped at runtime when `source` is missing or empty.
	SeedVolume {
		source: String,
		mirror: String,
		owner: i64,
	},
}

impl fmt::Display for StagingStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StagingStep::EnableTrace => f.write_str("set -xe"),
			StagingStep::MakeDir(dir) => write!(f, "mkdir -p {}", quote(dir)),
			StagingStep::CopyFile { from, to } => write!(f, "cp {} {}", quote(from), quote(to)),
			StagingStep::SeedVolume {
				source,
				mirror,
				owner,
			} => {
				let contents = quote(&format!("{source}/.")).into_owned();
				let source = quote(source);
				let mirror = quote(mirror);
				write!(
					f,
					"if [ -d {source} ] && [ \"$(ls -A {source})\" ]; then mkdir -p {mirror} && cp -r {contents} {mirror} && chown -R {owner}:{owner} {mirror}; fi"
				)
			}
		}
	}
}

/// The derived staging work for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingPlan {
	/// Parent directories under the staging root, each listed once.
	pub directories: Vec<String>,
	pub file_copies: Vec<(String, String)>,
	pub volume_copies: Vec<(String, String, i64)>,
}

/// Everything the manifest builder needs to wire up seeding for a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedingLayout {
	pub container_mounts: Vec<VolumeMount>,
	pub staging_mounts: Vec<VolumeMount>,
	pub staging_command: Vec<String>,
	pub plan: StagingPlan,
	pub steps: Vec<StagingStep>,
}

impl SeedingLayout {
	/// Whether a staging container has anything to mount.
	pub fn needs_staging(&self) -> bool {
		!self.staging_mounts.is_empty()
	}
}

/// Plan mounts and the staging script for `container_name`.
pub fn plan_seeding(container_name: &str, volumes: &[Volume], files: &[File]) -> SeedingLayout {
	let config_volume = format!("{container_name}{CONFIG_VOLUME_SUFFIX}");

	let mut container_mounts: Vec<VolumeMount> = volumes
		.iter()
		.map(|volume| VolumeMount {
			name: container_name.to_string(),
			mount_path: volume.path.clone(),
			sub_path: Some(volume.path.trim_start_matches('/').to_string()),
			..Default::default()
		})
		.collect();

	container_mounts.extend(
		files
			.iter()
			.enumerate()
			.filter(|(_, file)| !is_covered(&file.dest, volumes))
			.map(|(n, file)| file_mount(&config_volume, n, file)),
	);

	if volumes.is_empty() && files.is_empty() {
		return SeedingLayout {
			container_mounts,
			..Default::default()
		};
	}

	let mut staging_mounts = vec![VolumeMount {
		name: container_name.to_string(),
		mount_path: STAGING_ROOT.to_string(),
		..Default::default()
	}];
	staging_mounts.extend(
		files
			.iter()
			.enumerate()
			.map(|(n, file)| file_mount(&config_volume, n, file)),
	);

	let plan = build_plan(volumes, files);
	let steps = plan_steps(&plan);
	let script = render_script(&steps);
	tracing::debug!(container = %container_name, command = %script, "staging command");

	SeedingLayout {
		container_mounts,
		staging_mounts,
		staging_command: vec!["sh".to_string(), "-c".to_string(), script],
		plan,
		steps,
	}
}

/// Whether a file lands inside one of the volumes, so the volume copy carries it.
pub fn is_covered(dest: &str, volumes: &[Volume]) -> bool {
	volumes.iter().any(|volume| {
		let root = volume.path.trim_end_matches('/');
		root.is_empty()
			|| dest == root
			|| dest
				.strip_prefix(root)
				.is_some_and(|rest| rest.starts_with('/'))
	})
}

fn file_mount(config_volume: &str, n: usize, file: &File) -> VolumeMount {
	VolumeMount {
		name: config_volume.to_string(),
		mount_path: file.dest.clone(),
		sub_path: Some(n.to_string()),
		..Default::default()
	}
}

fn build_plan(volumes: &[Volume], files: &[File]) -> StagingPlan {
	let mut plan = StagingPlan::default();
	let mut seen = BTreeSet::new();

	for file in files.iter().filter(|f| !is_covered(&f.dest, volumes)) {
		let parent = Path::new(&file.dest)
			.parent()
			.map(|p| p.to_string_lossy().into_owned())
			.unwrap_or_default();
		let staged_parent = staged(&parent);
		if seen.insert(staged_parent.clone()) {
			plan.directories.push(staged_parent);
		}
		plan
			.file_copies
			.push((file.dest.clone(), staged(&file.dest)));
	}

	for volume in volumes {
		plan
			.volume_copies
			.push((volume.path.clone(), staged(&volume.path), volume.owner));
	}

	plan
}

fn plan_steps(plan: &StagingPlan) -> Vec<StagingStep> {
	let mut steps = vec![
		StagingStep::EnableTrace,
		StagingStep::MakeDir(STAGING_ROOT.to_string()),
	];

	// Directories come first so every copy target exists regardless of order.
	steps.extend(plan.directories.iter().cloned().map(StagingStep::MakeDir));
	steps.extend(
		plan
			.file_copies
			.iter()
			.map(|(from, to)| StagingStep::CopyFile {
				from: from.clone(),
				to: to.clone(),
			}),
	);
	steps.extend(
		plan
			.volume_copies
			.iter()
			.map(|(source, mirror, owner)| StagingStep::SeedVolume {
				source: source.clone(),
				mirror: mirror.clone(),
				owner: *owner,
			}),
	);
	steps
}

/// Join steps into one script; any failing step aborts the rest.
pub fn render_script(steps: &[StagingStep]) -> String {
	steps
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(" && ")
}

/// Path of `path` under the staging root.
fn staged(path: &str) -> String {
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() {
		return STAGING_ROOT.to_string();
	}
	if trimmed.starts_with('/') {
		format!("{STAGING_ROOT}{trimmed}")
	} else {
		format!("{STAGING_ROOT}/{trimmed}")
	}
}

fn quote(s: &str) -> Cow<'_, str> {
	shell_escape::unix::escape(Cow::Borrowed(s))
}
