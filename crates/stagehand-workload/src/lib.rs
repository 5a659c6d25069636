// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Short-lived workload provisioning for Stagehand.
//!
//! This crate turns declarative workload descriptors into Kubernetes pods and
//! operates them on behalf of a test harness.
//!
//! # Architecture
//!
//! The controller sits between the harness (or the `stagehand` CLI) and the
//! Kubernetes client (stagehand-k8s), implementing:
//!
//! - Manifest building, including the data-seeding staging container
//! - Pod lifecycle: deploy, replace, delete, readiness
//! - Command execution with captured output
//! - Supervised local port tunnels

pub mod config;
pub mod controller;
pub mod error;
mod exec;
pub mod manifest;
pub mod quantity;
pub mod retry;
pub mod seeding;
pub mod tunnel;
pub mod types;
pub mod validation;

pub use config::{load_config, load_config_with_overrides, WorkloadConfig, WorkloadConfigLayer};
pub use controller::WorkloadController;
pub use error::{ConfigError, ValidationError, WorkloadError};
pub use manifest::build_pod;
pub use quantity::ResourceQuantity;
pub use retry::RetryPolicy;
pub use seeding::{plan_seeding, SeedingLayout, StagingPlan, StagingStep, STAGING_ROOT};
pub use tunnel::PortTunnel;
pub use types::{
	ClientState, ContainerSpec, ExecResult, File, PullPolicy, ResourceSpec, Volume, Workload,
	WorkloadDescriptor, WorkloadPhase,
};
