//! Edge pricing.

use std::num::NonZeroU32;
use std::sync::Arc;

use crate::graph::Edge;

/// Assigns a strictly positive cost to each edge.
pub trait Metric: Send + Sync {
    /// Cost of traversing `edge`.
    fn cost(&self, edge: &Edge) -> NonZeroU32;
}

/// Every edge costs one: shortest path means fewest hops.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformMetric;

impl Metric for UniformMetric {
    fn cost(&self, _edge: &Edge) -> NonZeroU32 {
        NonZeroU32::MIN
    }
}

impl<T: Metric + ?Sized> Metric for Arc<T> {
    fn cost(&self, edge: &Edge) -> NonZeroU32 {
        (**self).cost(edge)
    }
}

impl<T: Metric + ?Sized> Metric for Box<T> {
    fn cost(&self, edge: &Edge) -> NonZeroU32 {
        (**self).cost(edge)
    }
}
