use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Shared training parameters distributed to every agent alongside its
/// topology record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// Number of enabled worker nodes, also the all-reduce world size.
    pub worker_num: u32,
    pub learning_rate: f32,
    /// Model selection key understood by the training processes.
    pub model_type: String,
    /// Fixed-point quantization scale factor.
    pub scale_factor: f32,
    /// Length of one native gradient slot, in `i32` elements.
    pub gradient_size: usize,
    /// Number of `i32` elements per transmitted fragment.
    pub fragment_size: usize,
    /// Broadcast address used by the native datapath.
    pub dummy_ip: Ipv4Addr,
    /// UDP port the native aggregation traffic runs on.
    pub port: u16,
}

impl TrainParams {
    /// Total length of the fixed-point exchange buffer, in `i32` elements.
    pub fn exchange_len(&self) -> usize {
        self.fragment_size * self.gradient_size
    }
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            worker_num: 1,
            learning_rate: 0.01,
            model_type: "convnet".to_string(),
            scale_factor: 1_000_000.0,
            gradient_size: 256,
            fragment_size: 64,
            dummy_ip: Ipv4Addr::new(10, 0, 0, 255),
            port: 4000,
        }
    }
}
