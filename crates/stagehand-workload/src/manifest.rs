// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Translation of a [`WorkloadDescriptor`] into a Kubernetes `Pod`.

use std::collections::BTreeMap;

use stagehand_k8s::{
	ConfigMapVolumeSource, Container, EnvVar, ObjectMeta, PersistentVolumeClaimVolumeSource, Pod,
	PodSecurityContext, PodSpec, Quantity, ResourceRequirements, SecurityContext, Volume,
};

use crate::error::ValidationError;
use crate::seeding::{plan_seeding, SeedingLayout, CONFIG_VOLUME_SUFFIX};
use crate::types::{ContainerSpec, ResourceSpec, WorkloadDescriptor};
use crate::validation::parse_quantity;

/// Suffix of the staging container's name.
pub const INIT_CONTAINER_SUFFIX: &str = "-init";

/// Mode of files mounted from a config map, usable by any user in the container.
pub const CONFIG_FILE_MODE: i32 = 0o777;

/// The staging container runs as root so it can `chown` seeded content.
const STAGING_USER: i64 = 0;

/// Build the pod for `descriptor`.
///
/// With `seeding_requested`, a primary container that declares volumes gets a
/// staging init container that copies image content into them first.
pub fn build_pod(
	descriptor: &WorkloadDescriptor,
	seeding_requested: bool,
) -> Result<Pod, ValidationError> {
	let primary = &descriptor.container;
	let primary_layout = plan_seeding(&primary.name, &primary.volumes, &primary.files);

	let init_containers = if seeding_requested && !primary.volumes.is_empty() {
		Some(vec![build_staging_container(primary, &primary_layout)])
	} else {
		None
	};

	let mut containers = vec![build_container(primary, &primary_layout)?];
	let mut volumes = build_pod_volumes(primary);

	for sidecar in &descriptor.sidecars {
		let layout = plan_seeding(&sidecar.name, &sidecar.volumes, &sidecar.files);
		containers.push(build_container(sidecar, &layout)?);
		volumes.extend(build_pod_volumes(sidecar));
	}

	let pod = Pod {
		metadata: ObjectMeta {
			name: Some(descriptor.name.clone()),
			namespace: Some(descriptor.namespace.clone()),
			labels: non_empty_map(&descriptor.labels),
			annotations: non_empty_map(&descriptor.annotations),
			..Default::default()
		},
		spec: Some(PodSpec {
			service_account_name: if descriptor.service_account.is_empty() {
				None
			} else {
				Some(descriptor.service_account.clone())
			},
			security_context: Some(PodSecurityContext {
				fs_group: descriptor.fs_group,
				..Default::default()
			}),
			init_containers,
			containers,
			volumes: non_empty(volumes),
			..Default::default()
		}),
		status: None,
	};

	tracing::debug!(
		name = %descriptor.name,
		namespace = %descriptor.namespace,
		seeding = seeding_requested,
		"prepared pod"
	);

	Ok(pod)
}

fn build_container(spec: &ContainerSpec, layout: &SeedingLayout) -> Result<Container, ValidationError> {
	Ok(Container {
		name: spec.name.clone(),
		image: Some(spec.image.clone()),
		image_pull_policy: Some(spec.image_pull_policy.as_str().to_string()),
		command: non_empty(spec.command.clone()),
		args: non_empty(spec.args.clone()),
		env: non_empty(build_env(&spec.env)),
		volume_mounts: non_empty(layout.container_mounts.clone()),
		resources: Some(build_resources(&spec.name, &spec.resources)?),
		liveness_probe: spec.liveness_probe.clone(),
		readiness_probe: spec.readiness_probe.clone(),
		startup_probe: spec.startup_probe.clone(),
		security_context: spec.security_context.clone(),
		..Default::default()
	})
}

fn build_staging_container(spec: &ContainerSpec, layout: &SeedingLayout) -> Container {
	Container {
		name: format!("{}{INIT_CONTAINER_SUFFIX}", spec.name),
		image: Some(spec.image.clone()),
		security_context: Some(SecurityContext {
			run_as_user: Some(STAGING_USER),
			..Default::default()
		}),
		command: Some(layout.staging_command.clone()),
		volume_mounts: Some(layout.staging_mounts.clone()),
		..Default::default()
	}
}

fn build_env(env: &BTreeMap<String, String>) -> Vec<EnvVar> {
	env
		.iter()
		.map(|(k, v)| EnvVar {
			name: k.clone(),
			value: Some(v.clone()),
			value_from: None,
		})
		.collect()
}

fn build_resources(
	container: &str,
	resources: &ResourceSpec,
) -> Result<ResourceRequirements, ValidationError> {
	let memory_request = parse_quantity(
		&format!("{container}.resources.memory_request"),
		&resources.memory_request,
	)?;
	let memory_limit = parse_quantity(
		&format!("{container}.resources.memory_limit"),
		&resources.memory_limit,
	)?;
	let cpu_request = parse_quantity(
		&format!("{container}.resources.cpu_request"),
		&resources.cpu_request,
	)?;

	let requests: BTreeMap<String, Quantity> = [
		("memory".to_string(), memory_request.to_quantity()),
		("cpu".to_string(), cpu_request.to_quantity()),
	]
	.into();
	let limits: BTreeMap<String, Quantity> =
		[("memory".to_string(), memory_limit.to_quantity())].into();

	Ok(ResourceRequirements {
		requests: Some(requests),
		limits: Some(limits),
		..Default::default()
	})
}

/// Pod volumes backing a container's mounts: its claim, then its config map.
fn build_pod_volumes(spec: &ContainerSpec) -> Vec<Volume> {
	let mut volumes = Vec::new();

	if !spec.volumes.is_empty() {
		volumes.push(Volume {
			name: spec.name.clone(),
			persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
				claim_name: spec.name.clone(),
				read_only: None,
			}),
			..Default::default()
		});
	}

	if !spec.files.is_empty() {
		volumes.push(Volume {
			name: format!("{}{CONFIG_VOLUME_SUFFIX}", spec.name),
			config_map: Some(ConfigMapVolumeSource {
				name: spec.name.clone(),
				default_mode: Some(CONFIG_FILE_MODE),
				..Default::default()
			}),
			..Default::default()
		});
	}

	volumes
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
	if items.is_empty() {
		None
	} else {
		Some(items)
	}
}

fn non_empty_map(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
	if map.is_empty() {
		None
	} else {
		Some(map.clone())
	}
}
