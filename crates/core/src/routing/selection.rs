//! Weighted random selection over percentage allocations.
//!
//! Selection is split into a pure walk ([`select_weighted`]) and a pluggable
//! [`DrawSource`], so the percentage stage is deterministic under test.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::rule::PercentageAllocation;

/// Produces a uniform draw in `[0, upper)`.
pub trait DrawSource: Send + Sync {
    fn draw(&self, upper: f64) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngDraw;

impl DrawSource for ThreadRngDraw {
    fn draw(&self, upper: f64) -> f64 {
        if !(upper.is_finite() && upper > 0.0) {
            return 0.0;
        }
        rand::thread_rng().gen_range(0.0..upper)
    }
}

/// Reproducible draws from a fixed seed.
pub struct SeededDraw {
    rng: Mutex<StdRng>,
}

impl SeededDraw {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl DrawSource for SeededDraw {
    fn draw(&self, upper: f64) -> f64 {
        if !(upper.is_finite() && upper > 0.0) {
            return 0.0;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0.0..upper),
            Err(poisoned) => poisoned.into_inner().gen_range(0.0..upper),
        }
    }
}

/// Always returns the same value, regardless of `upper`.
#[derive(Clone, Copy, Debug)]
pub struct FixedDraw(pub f64);

impl DrawSource for FixedDraw {
    fn draw(&self, _upper: f64) -> f64 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedPick<'a> {
    pub allocation: &'a PercentageAllocation,
    pub index: usize,
    /// Running sum at the selected allocation.
    pub cumulative: f64,
    /// Set when no allocation satisfied `draw <= cumulative` and the last one was taken.
    pub fallback: bool,
}

/// Walks `allocations` in order, accumulating percentages, and returns the
/// first allocation whose running sum reaches `draw`. When the draw lies past
/// the final running sum the last allocation is returned with `fallback` set.
/// Returns `None` only for an empty slice.
pub fn select_weighted(
    allocations: &[PercentageAllocation],
    draw: f64,
) -> Option<WeightedPick<'_>> {
    let mut cumulative = 0.0;
    for (index, allocation) in allocations.iter().enumerate() {
        cumulative += allocation.percentage;
        if draw <= cumulative {
            return Some(WeightedPick { allocation, index, cumulative, fallback: false });
        }
    }

    let index = allocations.len().checked_sub(1)?;
    Some(WeightedPick { allocation: &allocations[index], index, cumulative, fallback: true })
}

/// Sum of percentages, accumulated in the same order as [`select_weighted`].
pub fn total_weight(allocations: &[PercentageAllocation]) -> f64 {
    allocations.iter().fold(0.0, |sum, allocation| sum + allocation.percentage)
}
