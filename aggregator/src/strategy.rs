use comms::specs::LocalConfig;
use log::debug;

use crate::error::Result;
use crate::map::AggregationMap;
use crate::quantize::{dequantize, quantize_into};

/// Per-run gradient aggregation seam.
///
/// One concrete strategy is selected at process start and fixed for the
/// run; the `torch_ddp`/`torch_tcp` all-reduce variants live in external
/// backend processes and only exist here as launch selections, so the
/// in-process implementation is the in-network path.
pub trait AggregationStrategy {
    /// One-time initialization before the first training step.
    fn setup(&mut self) -> Result<()>;

    /// Drives one push/pull cycle for `step`, replacing `grads` with the
    /// fleet-averaged gradient. Must be invoked after the backward pass and
    /// before the optimizer step, exactly once per step, by a single thread.
    fn aggregate(&mut self, step: u32, grads: &mut [f32]) -> Result<()>;

    /// Releases resources owned by the strategy.
    fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Quantized in-network aggregation through the shared map.
pub struct InNetworkStrategy<M: AggregationMap> {
    map: M,
    local_id: u32,
    world_size: u32,
    scale: f32,
    exchange_len: usize,
    /// Reused fixed-point buffer, no per-step allocations.
    buf: Vec<i32>,
}

impl<M: AggregationMap> InNetworkStrategy<M> {
    /// Builds the strategy from the agent's persisted configuration.
    ///
    /// # Arguments
    /// * `map` - The shared aggregation map capability.
    /// * `cfg` - The local config record holding rank and train parameters.
    pub fn new(map: M, cfg: &LocalConfig) -> Self {
        let exchange_len = cfg.params.exchange_len();

        Self {
            map,
            local_id: cfg.record.id,
            world_size: cfg.params.worker_num,
            scale: cfg.params.scale_factor,
            exchange_len,
            buf: Vec::with_capacity(exchange_len),
        }
    }
}

impl<M: AggregationMap> AggregationStrategy for InNetworkStrategy<M> {
    fn setup(&mut self) -> Result<()> {
        self.map.acquire(self.local_id, 0)
    }

    fn aggregate(&mut self, step: u32, grads: &mut [f32]) -> Result<()> {
        debug!(step = step, rank = self.local_id; "aggregating gradients");

        quantize_into(&mut self.buf, grads, self.scale, self.exchange_len);
        self.map.send_fragments(step, &self.buf)?;

        let global = self.map.poll_until_ready(step)?;
        dequantize(global, self.scale, self.world_size, grads);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::thread;

    use comms::specs::{NodeDesc, NodeRecord, TrainParams};

    use super::*;
    use crate::error::AggregatorError;
    use crate::map::MockAggregationMap;

    const SCALE: f32 = 1000.0;

    fn config(rank: u32, world: u32) -> LocalConfig {
        LocalConfig {
            record: NodeRecord::solitary(NodeDesc {
                id: rank,
                addr: Ipv4Addr::new(10, 0, 0, rank as u8 + 1),
                mac: format!("02:00:00:00:00:{rank:02x}"),
            }),
            params: TrainParams {
                worker_num: world,
                scale_factor: SCALE,
                gradient_size: 4,
                fragment_size: 2,
                ..TrainParams::default()
            },
        }
    }

    #[test]
    fn single_node_aggregate_is_identity_up_to_truncation() {
        let mut fleet = MockAggregationMap::fleet(1, 4, 2);
        let mut strategy = InNetworkStrategy::new(fleet.pop().unwrap(), &config(0, 1));
        strategy.setup().unwrap();

        let mut grads = [0.5, -0.25, 0.125, 0.0];
        strategy.aggregate(0, &mut grads).unwrap();

        for (got, want) in grads.iter().zip([0.5, -0.25, 0.125, 0.0]) {
            assert!((got - want).abs() <= 1.0 / SCALE);
        }
    }

    #[test]
    fn three_ranks_converge_to_the_average_across_steps() {
        const WORLD: u32 = 3;
        const STEPS: u32 = 4;

        let fleet = MockAggregationMap::fleet(WORLD, 4, 2);

        let handles: Vec<_> = fleet
            .into_iter()
            .enumerate()
            .map(|(rank, map)| {
                thread::spawn(move || {
                    let mut strategy =
                        InNetworkStrategy::new(map, &config(rank as u32, WORLD));
                    strategy.setup().unwrap();

                    // Rank r contributes r+1+step everywhere; the average at
                    // step s is 2+s. Ranks run free, no step barrier between
                    // them beyond the aggregation itself.
                    (0..STEPS)
                        .map(|step| {
                            let mut grads = [rank as f32 + 1.0 + step as f32; 3];
                            strategy.aggregate(step, &mut grads).unwrap();
                            grads
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for (step, grads) in handle.join().unwrap().into_iter().enumerate() {
                let want = 2.0 + step as f32;
                for got in grads {
                    assert!((got - want).abs() <= 1.0 / SCALE, "step {step}: got {got}");
                }
            }
        }
    }

    #[test]
    fn setup_failure_is_fatal_before_any_step() {
        struct BrokenMap;

        impl AggregationMap for BrokenMap {
            fn acquire(&mut self, _local_id: u32, _step: u32) -> Result<()> {
                Err(AggregatorError::MapInit {
                    detail: "interface unavailable".to_string(),
                })
            }

            fn send_fragments(&mut self, _step: u32, _local: &[i32]) -> Result<()> {
                unreachable!("setup must fail first")
            }

            fn poll_until_ready(&mut self, _step: u32) -> Result<&[i32]> {
                unreachable!("setup must fail first")
            }
        }

        let mut strategy = InNetworkStrategy::new(BrokenMap, &config(0, 1));
        assert!(matches!(
            strategy.setup(),
            Err(AggregatorError::MapInit { .. })
        ));
    }
}
