//! Client-side contract for quantized, fragmented gradient exchange against
//! a shared aggregation map.
//!
//! The map itself (locking, in-kernel packet aggregation) is native-owned
//! and injected behind the `AggregationMap` capability; this crate only
//! drives the per-step push/pull cycle and the fixed-point conversions.

pub mod error;
pub mod map;
pub mod quantize;
pub mod strategy;

pub use error::AggregatorError;
pub use map::{AggregationMap, MockAggregationMap, SpinPolicy};
pub use quantize::{dequantize, quantize, quantize_into};
pub use strategy::{AggregationStrategy, InNetworkStrategy};
