//! Demand inputs — pollable sources of a demand value per task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::DemandResult;

/// Boxed future returned by [`DemandInput::get_demand`].
pub type DemandFuture<'a> = Pin<Box<dyn Future<Output = DemandResult<i32>> + Send + 'a>>;

/// A source of demand readings, polled once per cycle.
///
/// An error means "no change this cycle"; callers keep their last value.
pub trait DemandInput: Send + Sync + fmt::Debug {
    fn get_demand<'a>(&'a mut self, identifier: &'a str) -> DemandFuture<'a>;
}

/// Random walk: each poll moves by up to `delta` in either direction,
/// clamped to `[0, maximum]`.
#[derive(Debug)]
pub struct RandomDemand {
    current: i32,
    delta: i32,
    maximum: i32,
    rng: StdRng,
}

impl RandomDemand {
    /// Random walk seeded from OS entropy.
    pub fn new(delta: i32, maximum: i32) -> Self {
        Self::with_rng(delta, maximum, StdRng::from_entropy())
    }

    /// Deterministic random walk for tests and replays.
    pub fn seeded(delta: i32, maximum: i32, seed: u64) -> Self {
        Self::with_rng(delta, maximum, StdRng::seed_from_u64(seed))
    }

    fn with_rng(delta: i32, maximum: i32, rng: StdRng) -> Self {
        Self {
            current: 0,
            delta: delta.max(0),
            maximum: maximum.max(0),
            rng,
        }
    }

    /// The last generated value.
    pub fn current(&self) -> i32 {
        self.current
    }

    fn step(&mut self) -> i32 {
        let r = self.rng.gen_range(-self.delta..=self.delta);
        self.current = (self.current + r).clamp(0, self.maximum);
        self.current
    }
}

impl DemandInput for RandomDemand {
    // The identifier is ignored: every task polling this input walks its own value.
    fn get_demand<'a>(&'a mut self, identifier: &'a str) -> DemandFuture<'a> {
        Box::pin(async move {
            let value = self.step();
            debug!(task = %identifier, demand = value, "random demand");
            Ok(value)
        })
    }
}
