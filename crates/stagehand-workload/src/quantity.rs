// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubernetes resource quantities.
//!
//! `k8s-openapi` models a quantity as an opaque string, so malformed values
//! would only be rejected by the API server. Parsing here catches them before
//! any request is made and gives a numeric value for comparisons such as
//! memory request against memory limit.

use std::fmt;
use std::str::FromStr;

use stagehand_k8s::Quantity;

const BINARY_SUFFIXES: &[(&str, f64)] = &[
	("Ki", 1024.0),
	("Mi", 1_048_576.0),
	("Gi", 1_073_741_824.0),
	("Ti", 1_099_511_627_776.0),
	("Pi", 1_125_899_906_842_624.0),
	("Ei", 1_152_921_504_606_846_976.0),
];

const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
	("n", 1e-9),
	("u", 1e-6),
	("m", 1e-3),
	("", 1.0),
	("k", 1e3),
	("M", 1e6),
	("G", 1e9),
	("T", 1e12),
	("P", 1e15),
	("E", 1e18),
];

/// The input did not follow the quantity grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quantity {0:?}")]
pub struct QuantityError(pub String);

/// A parsed resource quantity such as `512Mi`, `250m` or `1e3`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceQuantity {
	raw: String,
	value: f64,
}

impl ResourceQuantity {
	/// The text as given, which is what ends up in the manifest.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Value in base units (bytes for memory, cores for CPU).
	pub fn value(&self) -> f64 {
		self.value
	}

	pub fn is_positive(&self) -> bool {
		self.value > 0.0
	}

	pub fn to_quantity(&self) -> Quantity {
		Quantity(self.raw.clone())
	}
}

impl fmt::Display for ResourceQuantity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl FromStr for ResourceQuantity {
	type Err = QuantityError;

	fn from_str(input: &str) -> Result<Self, Self::Err> {
		let invalid = || QuantityError(input.to_string());

		let (number, suffix) = split_number(input).ok_or_else(invalid)?;
		let number: f64 = normalize_number(number).parse().map_err(|_| invalid())?;
		let multiplier = suffix_multiplier(suffix).ok_or_else(invalid)?;

		Ok(Self {
			raw: input.to_string(),
			value: number * multiplier,
		})
	}
}

/// Split `input` into its signed decimal number and the remaining suffix.
fn split_number(input: &str) -> Option<(&str, &str)> {
	let bytes = input.as_bytes();
	let mut end = 0;

	if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
		end += 1;
	}

	let mut digits = 0;
	let mut seen_dot = false;
	while end < bytes.len() {
		match bytes[end] {
			b'0'..=b'9' => digits += 1,
			b'.' if !seen_dot => seen_dot = true,
			_ => break,
		}
		end += 1;
	}

	if digits == 0 {
		return None;
	}
	Some((&input[..end], &input[end..]))
}

fn normalize_number(number: &str) -> String {
	let mut normalized = number.replace("+.", "+0.").replace("-.", "-0.");
	if normalized.starts_with('.') {
		normalized.insert(0, '0');
	}
	if normalized.ends_with('.') {
		normalized.push('0');
	}
	normalized
}

fn suffix_multiplier(suffix: &str) -> Option<f64> {
	if let Some((_, m)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
		return Some(*m);
	}
	if let Some((_, m)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
		return Some(*m);
	}

	// Decimal exponent form: e3, E-2, e+6
	let exponent = suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))?;
	let unsigned = exponent.trim_start_matches(['+', '-']);
	if unsigned.is_empty()
		|| exponent.len() - unsigned.len() > 1
		|| !unsigned.bytes().all(|b| b.is_ascii_digit())
	{
		return None;
	}
	let exponent: i32 = exponent.parse().ok()?;
	Some(10f64.powi(exponent))
}
