// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixed-interval polling that gives up promptly on cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why [`RetryPolicy::poll_until`] stopped without a result.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError<E> {
	Cancelled,
	Failed(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	interval: Duration,
}

impl RetryPolicy {
	pub fn fixed(interval: Duration) -> Self {
		Self { interval }
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Run `check` until it yields `Some`, sleeping `interval` between attempts.
	///
	/// The first attempt runs immediately. Both the check and the sleep race
	/// `cancel`, so cancellation is observed without waiting for the next tick.
	pub async fn poll_until<T, E, F, Fut>(
		&self,
		cancel: &CancellationToken,
		mut check: F,
	) -> Result<T, PollError<E>>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<Option<T>, E>>,
	{
		loop {
			if cancel.is_cancelled() {
				return Err(PollError::Cancelled);
			}

			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(PollError::Cancelled),
				outcome = check() => outcome,
			};

			match outcome {
				Ok(Some(value)) => return Ok(value),
				Ok(None) => {}
				Err(e) => return Err(PollError::Failed(e)),
			}

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(PollError::Cancelled),
				_ = tokio::time::sleep(self.interval) => {}
			}
		}
	}
}
