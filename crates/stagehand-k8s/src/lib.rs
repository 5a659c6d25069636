// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for Stagehand workload provisioning.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - Stream types for exec sessions and port forwarding

mod client;
mod error;
mod kube_client;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
pub use types::{
	ConfigMapVolumeSource, Container, ContainerStatus, EnvVar, ExecProcess, ExecStatus,
	ForwardedStream, ObjectMeta, PersistentVolumeClaimVolumeSource, Pod, PodSecurityContext,
	PodSpec, PodStatus, Probe, Quantity, ResourceRequirements, SecurityContext, TunnelIo, Volume,
	VolumeMount, STREAM_CLOSED_REASON,
};
