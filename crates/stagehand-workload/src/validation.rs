// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Checks applied before any request reaches the cluster.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::quantity::ResourceQuantity;
use crate::types::{ContainerSpec, WorkloadDescriptor};

/// Maximum length of a DNS-1123 label and of a label name or value.
pub const MAX_NAME_LENGTH: usize = 63;

/// Maximum length of the DNS subdomain prefix of a label key.
const MAX_PREFIX_LENGTH: usize = 253;

/// Check a resource name against the DNS-1123 label grammar.
///
/// Names must:
/// - Be 63 characters or less
/// - Contain only lowercase alphanumerics and dashes
/// - Begin and end with an alphanumeric character
pub fn validate_name(kind: &'static str, value: &str) -> Result<(), ValidationError> {
	let invalid = |reason: &str| ValidationError::InvalidName {
		kind,
		value: value.to_string(),
		reason: reason.to_string(),
	};

	if value.is_empty() {
		return Err(invalid("must not be empty"));
	}
	if value.len() > MAX_NAME_LENGTH {
		return Err(invalid("must be 63 characters or less"));
	}
	if !value
		.bytes()
		.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
	{
		return Err(invalid(
			"must contain only lowercase alphanumeric characters or '-'",
		));
	}
	if !starts_and_ends_alphanumeric(value) {
		return Err(invalid("must start and end with an alphanumeric character"));
	}
	Ok(())
}

/// Check a label key and value.
///
/// The key is an optional DNS subdomain prefix and `/`, followed by a name of
/// up to 63 characters from `[-_.A-Za-z0-9]`. The value follows the same
/// rules as the name part but may be empty.
pub fn validate_label(key: &str, value: &str) -> Result<(), ValidationError> {
	let invalid = |reason: String| ValidationError::InvalidLabel {
		key: key.to_string(),
		value: value.to_string(),
		reason,
	};

	let name = match key.split_once('/') {
		Some((prefix, name)) => {
			if prefix.is_empty() || prefix.len() > MAX_PREFIX_LENGTH {
				return Err(invalid(format!(
					"key prefix must be 1 to {MAX_PREFIX_LENGTH} characters"
				)));
			}
			if !prefix
				.bytes()
				.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
				|| !starts_and_ends_alphanumeric(prefix)
			{
				return Err(invalid("key prefix must be a DNS subdomain".to_string()));
			}
			name
		}
		None => key,
	};

	if name.is_empty() {
		return Err(invalid("key name must not be empty".to_string()));
	}
	check_label_segment(name).map_err(|reason| invalid(format!("key name {reason}")))?;

	if !value.is_empty() {
		check_label_segment(value).map_err(|reason| invalid(format!("value {reason}")))?;
	}
	Ok(())
}

/// Check that `port` is a usable TCP port and narrow it.
pub fn validate_port(port: u32) -> Result<u16, ValidationError> {
	match u16::try_from(port) {
		Ok(p) if p != 0 => Ok(p),
		_ => Err(ValidationError::InvalidPort { port }),
	}
}

pub fn validate_command(command: &[String]) -> Result<(), ValidationError> {
	if command.is_empty() {
		return Err(ValidationError::EmptyCommand);
	}
	Ok(())
}

/// Parse a quantity, naming `field` in the error.
pub fn parse_quantity(field: &str, value: &str) -> Result<ResourceQuantity, ValidationError> {
	value
		.parse()
		.map_err(|_| ValidationError::InvalidResourceQuantity {
			field: field.to_string(),
			value: value.to_string(),
		})
}

/// Validate a whole descriptor for deployment into `namespace`.
pub fn validate_descriptor(
	descriptor: &WorkloadDescriptor,
	namespace: &str,
) -> Result<(), ValidationError> {
	validate_name("workload", &descriptor.name)?;
	validate_name("namespace", &descriptor.namespace)?;

	if descriptor.namespace != namespace {
		return Err(ValidationError::NamespaceMismatch {
			descriptor: descriptor.namespace.clone(),
			controller: namespace.to_string(),
		});
	}

	for (key, value) in &descriptor.labels {
		validate_label(key, value)?;
	}

	let mut seen = HashSet::new();
	for container in descriptor.containers() {
		validate_container(container)?;
		if !seen.insert(container.name.as_str()) {
			return Err(ValidationError::DuplicateContainerName {
				name: container.name.clone(),
			});
		}
	}
	Ok(())
}

fn validate_container(container: &ContainerSpec) -> Result<(), ValidationError> {
	let name = &container.name;
	validate_name("container", name)?;

	if container.image.trim().is_empty() {
		return Err(empty_field(format!("{name}.image")));
	}

	for (i, volume) in container.volumes.iter().enumerate() {
		if volume.path.is_empty() {
			return Err(empty_field(format!("{name}.volumes[{i}].path")));
		}
		let size = parse_quantity(&format!("{name}.volumes[{i}].size"), &volume.size)?;
		if !size.is_positive() {
			return Err(ValidationError::NonPositiveVolumeSize {
				path: volume.path.clone(),
				size: volume.size.clone(),
			});
		}
	}

	for (i, file) in container.files.iter().enumerate() {
		if file.source.is_empty() {
			return Err(empty_field(format!("{name}.files[{i}].source")));
		}
		if file.dest.is_empty() {
			return Err(empty_field(format!("{name}.files[{i}].dest")));
		}
	}

	let resources = &container.resources;
	if resources.cpu_request.trim().is_empty() {
		return Err(empty_field(format!("{name}.resources.cpu_request")));
	}
	parse_quantity(
		&format!("{name}.resources.cpu_request"),
		&resources.cpu_request,
	)?;
	let request = parse_quantity(
		&format!("{name}.resources.memory_request"),
		&resources.memory_request,
	)?;
	let limit = parse_quantity(
		&format!("{name}.resources.memory_limit"),
		&resources.memory_limit,
	)?;
	if request.value() > limit.value() {
		return Err(ValidationError::MemoryRequestExceedsLimit {
			container: name.clone(),
			request: request.to_string(),
			limit: limit.to_string(),
		});
	}

	Ok(())
}

fn empty_field(field: String) -> ValidationError {
	ValidationError::EmptyField { field }
}

fn starts_and_ends_alphanumeric(s: &str) -> bool {
	let bytes = s.as_bytes();
	matches!(bytes.first(), Some(b) if b.is_ascii_alphanumeric())
		&& matches!(bytes.last(), Some(b) if b.is_ascii_alphanumeric())
}

fn check_label_segment(s: &str) -> Result<(), &'static str> {
	if s.len() > MAX_NAME_LENGTH {
		return Err("must be 63 characters or less");
	}
	if !s
		.bytes()
		.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
	{
		return Err("must contain only alphanumerics, '-', '_' or '.'");
	}
	if !starts_and_ends_alphanumeric(s) {
		return Err("must start and end with an alphanumeric character");
	}
	Ok(())
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn generated_dns_labels_are_valid(name in "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?") {
			prop_assert!(validate_name("workload", &name).is_ok());
		}

		#[test]
		fn uppercase_names_are_rejected(name in "[a-z0-9]{0,10}[A-Z][a-z0-9]{0,10}") {
			prop_assert!(validate_name("workload", &name).is_err());
		}

		#[test]
		fn generated_label_values_are_valid(value in "([A-Za-z0-9]([-_.A-Za-z0-9]{0,61}[A-Za-z0-9])?)?") {
			prop_assert!(validate_label("app", &value).is_ok());
		}

		#[test]
		fn ports_in_range_are_accepted(port in 1u32..=65535) {
			prop_assert_eq!(validate_port(port).unwrap() as u32, port);
		}

		#[test]
		fn ports_out_of_range_are_rejected(port in 65536u32..) {
			prop_assert!(validate_port(port).is_err());
		}
	}
}
