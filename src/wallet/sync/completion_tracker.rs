//! Per-height completion tracking for one synchronization window.
//!
//! Every batch registers itself against each height of its window before its explorer request
//! is sent, and reports back once per height when its answer has been merged. A height is
//! complete when the last registered batch reports back. Exactly one caller observes that
//! transition, which is what makes "persist each height exactly once" hold regardless of the
//! order in which batches resolve.
//!
//! Each height is an independent state machine packed in an `AtomicU64`:
//! `Pending(count) -> Finalizing -> Finalized`, advanced by compare-and-swap.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

const FINALIZING: u64 = u64::MAX - 1;
const FINALIZED: u64 = u64::MAX;

/// Observable state of one height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightState {
	/// Number of registered batches that have not reported back yet.
	Pending(u64),
	/// The last batch reported back; the block is being flushed.
	Finalizing,
	/// The block has been handed to storage.
	Finalized,
}

impl HeightState {
	fn decode(raw: u64) -> Self {
		match raw {
			FINALIZED => HeightState::Finalized,
			FINALIZING => HeightState::Finalizing,
			count => HeightState::Pending(count),
		}
	}
}

/// Reference counts of in-flight batches for every height of `[from, to]`.
#[derive(Debug)]
pub struct CompletionTracker {
	from: u32,
	heights: Vec<AtomicU64>,
}

impl CompletionTracker {
	/// Tracker for the inclusive window `[from, to]`. An inverted window tracks nothing.
	pub fn new(from: u32, to: u32) -> Self {
		let len = if to < from {
			0
		} else {
			(to - from) as usize + 1
		};
		Self {
			from,
			heights: (0..len).map(|_| AtomicU64::new(0)).collect(),
		}
	}

	fn slot(&self, height: u32) -> Option<&AtomicU64> {
		height
			.checked_sub(self.from)
			.and_then(|offset| self.heights.get(offset as usize))
	}

	/// Register one more in-flight batch on every height of `[from, to]`.
	///
	/// Heights already finalizing or finalized, and heights outside the window, are left alone.
	pub fn add_batch(&self, from: u32, to: u32) {
		if to < from {
			return;
		}
		for height in from..=to {
			let Some(slot) = self.slot(height) else {
				warn!("Batch registered on height {} outside of tracked window", height);
				continue;
			};
			let registered = slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
				if raw >= FINALIZING {
					None
				} else {
					Some(raw + 1)
				}
			});
			if registered.is_err() {
				warn!("Batch registered on already finalized height {}", height);
			}
		}
	}

	/// Report that one batch is done with `height`.
	///
	/// Returns `true` for exactly one caller: the one whose report brings the count to zero.
	/// Every later report for that height is a no-op returning `false`.
	pub fn finish_batch(&self, height: u32) -> bool {
		let Some(slot) = self.slot(height) else {
			return false;
		};
		match slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| match raw {
			0 | FINALIZING | FINALIZED => None,
			1 => Some(FINALIZING),
			count => Some(count - 1),
		}) {
			Ok(previous) => previous == 1,
			Err(0) => {
				warn!("Height {} reported finished without a registered batch", height);
				false
			}
			Err(_) => false,
		}
	}

	/// Move a height won through [`finish_batch`](Self::finish_batch) to `Finalized`.
	pub fn mark_finalized(&self, height: u32) {
		if let Some(slot) = self.slot(height) {
			let _ = slot.compare_exchange(FINALIZING, FINALIZED, Ordering::AcqRel, Ordering::Acquire);
		}
	}

	pub fn state(&self, height: u32) -> Option<HeightState> {
		self.slot(height)
			.map(|slot| HeightState::decode(slot.load(Ordering::Acquire)))
	}

	/// Whether every batch registered on `height` has reported back.
	pub fn is_complete(&self, height: u32) -> bool {
		matches!(
			self.state(height),
			Some(HeightState::Finalizing | HeightState::Finalized)
		)
	}

	/// Heights of the window that never completed.
	pub fn unfinalized_heights(&self) -> Vec<u32> {
		(0..self.heights.len() as u32)
			.map(|offset| self.from + offset)
			.filter(|height| !self.is_complete(*height))
			.collect()
	}
}
