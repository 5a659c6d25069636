// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Controller configuration: defaults, TOML file and environment layers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::validation::validate_name;

pub const DEFAULT_NAMESPACE: &str = "stagehand";
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;
pub const DEFAULT_WAIT_RETRY_MS: u64 = 5000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	CommandLine = 60,
}

/// Workload configuration layer (for merging).
///
/// All fields are optional to support layered configuration from
/// multiple sources (defaults, files, environment).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadConfigLayer {
	pub namespace: Option<String>,
	/// Poll interval while waiting for a deleted pod to disappear
	pub retry_interval_ms: Option<u64>,
	/// Base wait; tunnels time out after twice this
	pub wait_retry_ms: Option<u64>,
	pub log_level: Option<String>,
}

impl WorkloadConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: WorkloadConfigLayer) {
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.retry_interval_ms.is_some() {
			self.retry_interval_ms = other.retry_interval_ms;
		}
		if other.wait_retry_ms.is_some() {
			self.wait_retry_ms = other.wait_retry_ms;
		}
		if other.log_level.is_some() {
			self.log_level = other.log_level;
		}
	}

	/// Resolves this layer into a runtime configuration.
	pub fn resolve(self) -> Result<WorkloadConfig, ConfigError> {
		let namespace = self
			.namespace
			.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
		validate_name("namespace", &namespace).map_err(|e| ConfigError::InvalidValue {
			key: "namespace".to_string(),
			message: e.to_string(),
		})?;

		let retry_interval_ms = positive(
			"retry_interval_ms",
			self.retry_interval_ms.unwrap_or(DEFAULT_RETRY_INTERVAL_MS),
		)?;
		let wait_retry_ms = positive(
			"wait_retry_ms",
			self.wait_retry_ms.unwrap_or(DEFAULT_WAIT_RETRY_MS),
		)?;

		Ok(WorkloadConfig {
			namespace,
			retry_interval_ms,
			wait_retry_ms,
			log_level: self
				.log_level
				.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
		})
	}
}

fn positive(key: &str, value: u64) -> Result<u64, ConfigError> {
	if value == 0 {
		return Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: "must be greater than zero".to_string(),
		});
	}
	Ok(value)
}

/// Workload configuration (runtime, resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
	pub namespace: String,
	pub retry_interval_ms: u64,
	pub wait_retry_ms: u64,
	pub log_level: String,
}

impl WorkloadConfig {
	pub fn retry_interval(&self) -> Duration {
		Duration::from_millis(self.retry_interval_ms)
	}

	pub fn wait_retry(&self) -> Duration {
		Duration::from_millis(self.wait_retry_ms)
	}

	/// How long `open_tunnel` waits for the forwarder to become ready.
	pub fn tunnel_timeout(&self) -> Duration {
		self.wait_retry() * 2
	}
}

impl Default for WorkloadConfig {
	fn default() -> Self {
		Self {
			namespace: DEFAULT_NAMESPACE.to_string(),
			retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
			wait_retry_ms: DEFAULT_WAIT_RETRY_MS,
			log_level: DEFAULT_LOG_LEVEL.to_string(),
		}
	}
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WorkloadConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WorkloadConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WorkloadConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WorkloadConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WorkloadConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WorkloadConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: STAGEHAND_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WorkloadConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_lookup(|name| std::env::var(name).ok())
	}
}

fn layer_from_lookup(
	lookup: impl Fn(&str) -> Option<String>,
) -> Result<WorkloadConfigLayer, ConfigError> {
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());
	let u64_var = |name: &str| -> Result<Option<u64>, ConfigError> {
		match var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	};

	Ok(WorkloadConfigLayer {
		namespace: var("STAGEHAND_NAMESPACE"),
		retry_interval_ms: u64_var("STAGEHAND_RETRY_INTERVAL_MS")?,
		wait_retry_ms: u64_var("STAGEHAND_WAIT_RETRY_MS")?,
		log_level: var("STAGEHAND_LOG_LEVEL"),
	})
}

/// Explicit values from the command line.
pub struct OverrideSource(pub WorkloadConfigLayer);

impl ConfigSource for OverrideSource {
	fn name(&self) -> &'static str {
		"overrides"
	}

	fn precedence(&self) -> Precedence {
		Precedence::CommandLine
	}

	fn load(&self) -> Result<WorkloadConfigLayer, ConfigError> {
		Ok(self.0.clone())
	}
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<WorkloadConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WorkloadConfigLayer::default();
	for source in &sources {
		trace!(source = source.name(), "applying config source");
		merged.merge(source.load()?);
	}
	merged.resolve()
}

/// Load configuration from defaults, the optional TOML file and the environment.
pub fn load_config(path: Option<&Path>) -> Result<WorkloadConfig, ConfigError> {
	load_config_with_overrides(path, WorkloadConfigLayer::default())
}

/// Like [`load_config`], with `overrides` applied above every other source.
pub fn load_config_with_overrides(
	path: Option<&Path>,
	overrides: WorkloadConfigLayer,
) -> Result<WorkloadConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource)];
	if let Some(path) = path {
		sources.push(Box::new(TomlSource::new(path)));
	}
	sources.push(Box::new(EnvSource));
	sources.push(Box::new(OverrideSource(overrides)));
	load_from_sources(sources)
}

#[cfg(test)]
mod tests {
	use super::*;

	mod workload_config_layer {
		use super::*;

		#[test]
		fn merge_preserves_base_when_overlay_is_none() {
			let mut base = WorkloadConfigLayer {
				namespace: Some("custom-ns".to_string()),
				retry_interval_ms: Some(250),
				..Default::default()
			};

			base.merge(WorkloadConfigLayer::default());
			assert_eq!(base.namespace, Some("custom-ns".to_string()));
			assert_eq!(base.retry_interval_ms, Some(250));
		}

		#[test]
		fn merge_individual_fields() {
			let mut base = WorkloadConfigLayer {
				namespace: Some("base-ns".to_string()),
				wait_retry_ms: Some(1000),
				..Default::default()
			};
			let overlay = WorkloadConfigLayer {
				namespace: Some("overlay-ns".to_string()),
				log_level: Some("debug".to_string()),
				..Default::default()
			};

			base.merge(overlay);
			assert_eq!(base.namespace, Some("overlay-ns".to_string()));
			assert_eq!(base.wait_retry_ms, Some(1000));
			assert_eq!(base.log_level, Some("debug".to_string()));
		}
	}

	mod resolve {
		use super::*;

		#[test]
		fn resolve_uses_defaults() {
			let config = WorkloadConfigLayer::default().resolve().unwrap();
			assert_eq!(config, WorkloadConfig::default());
			assert_eq!(config.namespace, "stagehand");
			assert_eq!(config.retry_interval(), Duration::from_millis(100));
			assert_eq!(config.wait_retry(), Duration::from_secs(5));
			assert_eq!(config.tunnel_timeout(), Duration::from_secs(10));
		}

		#[test]
		fn resolve_rejects_zero_intervals() {
			let layer = WorkloadConfigLayer {
				retry_interval_ms: Some(0),
				..Default::default()
			};
			assert!(matches!(
				layer.resolve(),
				Err(ConfigError::InvalidValue { key, .. }) if key == "retry_interval_ms"
			));
		}

		#[test]
		fn resolve_rejects_invalid_namespace() {
			let layer = WorkloadConfigLayer {
				namespace: Some("Not_Valid".to_string()),
				..Default::default()
			};
			assert!(matches!(
				layer.resolve(),
				Err(ConfigError::InvalidValue { key, .. }) if key == "namespace"
			));
		}
	}

	mod sources {
		use super::*;
		use std::collections::HashMap;
		use std::io::Write;

		fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
			let vars: HashMap<String, String> = vars
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect();
			move |name| vars.get(name).cloned()
		}

		struct FixedSource(Precedence, WorkloadConfigLayer);

		impl ConfigSource for FixedSource {
			fn name(&self) -> &'static str {
				"fixed"
			}

			fn precedence(&self) -> Precedence {
				self.0
			}

			fn load(&self) -> Result<WorkloadConfigLayer, ConfigError> {
				Ok(self.1.clone())
			}
		}

		#[test]
		fn env_lookup_reads_all_fields() {
			let layer = layer_from_lookup(lookup(&[
				("STAGEHAND_NAMESPACE", "ci"),
				("STAGEHAND_RETRY_INTERVAL_MS", "50"),
				("STAGEHAND_WAIT_RETRY_MS", "2000"),
				("STAGEHAND_LOG_LEVEL", "trace"),
			]))
			.unwrap();

			assert_eq!(layer.namespace.as_deref(), Some("ci"));
			assert_eq!(layer.retry_interval_ms, Some(50));
			assert_eq!(layer.wait_retry_ms, Some(2000));
			assert_eq!(layer.log_level.as_deref(), Some("trace"));
		}

		#[test]
		fn env_lookup_ignores_empty_values() {
			let layer = layer_from_lookup(lookup(&[("STAGEHAND_NAMESPACE", "")])).unwrap();
			assert_eq!(layer.namespace, None);
		}

		#[test]
		fn env_lookup_rejects_non_numeric() {
			let err = layer_from_lookup(lookup(&[("STAGEHAND_WAIT_RETRY_MS", "soon")])).unwrap_err();
			assert!(matches!(
				err,
				ConfigError::InvalidValue { key, .. } if key == "STAGEHAND_WAIT_RETRY_MS"
			));
		}

		#[test]
		fn toml_source_parses_file() {
			let mut file = tempfile::NamedTempFile::new().unwrap();
			writeln!(file, "namespace = \"from-file\"\nwait_retry_ms = 750").unwrap();

			let layer = TomlSource::new(file.path()).load().unwrap();
			assert_eq!(layer.namespace.as_deref(), Some("from-file"));
			assert_eq!(layer.wait_retry_ms, Some(750));
			assert_eq!(layer.retry_interval_ms, None);
		}

		#[test]
		fn toml_source_missing_file_is_empty() {
			let dir = tempfile::tempdir().unwrap();
			let layer = TomlSource::new(dir.path().join("absent.toml"))
				.load()
				.unwrap();
			assert_eq!(layer, WorkloadConfigLayer::default());
		}

		#[test]
		fn toml_source_reports_parse_errors() {
			let mut file = tempfile::NamedTempFile::new().unwrap();
			writeln!(file, "wait_retry_ms = \"not a number\"").unwrap();

			assert!(matches!(
				TomlSource::new(file.path()).load(),
				Err(ConfigError::TomlParse { .. })
			));
		}

		#[test]
		fn higher_precedence_wins_regardless_of_order() {
			let sources: Vec<Box<dyn ConfigSource>> = vec![
				Box::new(FixedSource(
					Precedence::Environment,
					WorkloadConfigLayer {
						namespace: Some("from-env".to_string()),
						..Default::default()
					},
				)),
				Box::new(FixedSource(
					Precedence::ConfigFile,
					WorkloadConfigLayer {
						namespace: Some("from-file".to_string()),
						wait_retry_ms: Some(300),
						..Default::default()
					},
				)),
				Box::new(DefaultsSource),
			];

			let config = load_from_sources(sources).unwrap();
			assert_eq!(config.namespace, "from-env");
			assert_eq!(config.wait_retry_ms, 300);
			assert_eq!(config.retry_interval_ms, DEFAULT_RETRY_INTERVAL_MS);
		}

		#[test]
		fn overrides_beat_the_environment() {
			let sources: Vec<Box<dyn ConfigSource>> = vec![
				Box::new(OverrideSource(WorkloadConfigLayer {
					namespace: Some("from-flag".to_string()),
					..Default::default()
				})),
				Box::new(FixedSource(
					Precedence::Environment,
					WorkloadConfigLayer {
						namespace: Some("from-env".to_string()),
						log_level: Some("warn".to_string()),
						..Default::default()
					},
				)),
				Box::new(DefaultsSource),
			];

			let config = load_from_sources(sources).unwrap();
			assert_eq!(config.namespace, "from-flag");
			assert_eq!(config.log_level, "warn");
		}

		#[test]
		fn invalid_override_is_rejected() {
			let sources: Vec<Box<dyn ConfigSource>> = vec![
				Box::new(DefaultsSource),
				Box::new(OverrideSource(WorkloadConfigLayer {
					namespace: Some("Bad Namespace".to_string()),
					..Default::default()
				})),
			];

			assert!(matches!(
				load_from_sources(sources),
				Err(ConfigError::InvalidValue { key, .. }) if key == "namespace"
			));
		}
	}
}
