//! The shared aggregation map capability and an in-memory stand-in.
//!
//! The real map lives in native memory and is mutated by the in-kernel
//! datapath; clients may only write the local-gradient region and read the
//! global-gradient region for the current iteration. The synchronization
//! fields (lock, completion vector) are exclusively native-owned.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{AggregatorError, Result};

/// Bound for the busy-poll loop in [`AggregationMap::poll_until_ready`].
///
/// The default is unbounded, matching the native layer which defines no
/// timeout at this level; a bounded policy turns exhaustion into
/// [`AggregatorError::PollTimeout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinPolicy {
    pub max_spins: Option<u64>,
}

impl SpinPolicy {
    /// A policy that gives up after `max_spins` poll iterations.
    pub fn bounded(max_spins: u64) -> Self {
        Self {
            max_spins: Some(max_spins),
        }
    }
}

/// Injected capability over the per-node shared aggregation map.
///
/// One instance per local node; buffer lengths are fixed at configuration
/// time and never resized.
pub trait AggregationMap: Send {
    /// Binds this client to the map for the given starting step.
    ///
    /// # Errors
    /// Returns `AggregatorError::MapInit` when the device or interface is
    /// unavailable; fatal before any training step runs.
    fn acquire(&mut self, local_id: u32, step: u32) -> Result<()>;

    /// Hands the fixed-point buffer to the map for fragmentation and
    /// in-tree aggregation. Blocks only until the local enqueue completes,
    /// not until the tree-wide aggregation finishes.
    fn send_fragments(&mut self, step: u32, local: &[i32]) -> Result<()>;

    /// Busy-polls until the entry for `step` is marked complete by the
    /// native layer, then returns the globally-aggregated buffer view.
    ///
    /// This is a spin-wait with no scheduler suspension point; callers must
    /// budget CPU accordingly.
    fn poll_until_ready(&mut self, step: u32) -> Result<&[i32]>;
}

/// Fixed layout of the shared map, mirrored by the in-memory mock.
#[derive(Debug)]
struct MapState {
    /// Native-owned lock flag; never touched by clients.
    #[allow(dead_code)]
    locked: bool,
    /// Per-rank completion-check vector, length = worker count.
    completion: Vec<bool>,
    /// Set when the local node is the tree root.
    #[allow(dead_code)]
    leader: bool,
    /// Iteration currently being accumulated.
    iter: u32,
    #[allow(dead_code)]
    child_count: u32,
    /// Locally-aggregated gradients, written by pushers.
    local_grads: Vec<i32>,
    /// Globally-aggregated gradients of the last completed iteration.
    ///
    /// Kept readable while the next iteration accumulates, so a slower
    /// rank can still pull a step it contributed to.
    global_grads: Vec<i32>,
    /// Iteration `global_grads` holds, `None` until the first completes.
    published: Option<u32>,
}

/// In-memory `AggregationMap` reproducing the push/pull contract without
/// the native datapath, for tests and single-host runs.
///
/// Every client created by [`MockAggregationMap::fleet`] shares one map;
/// pushes are summed across ranks and the step completes once all ranks
/// contributed, exactly like the in-tree aggregation converging at the root.
pub struct MockAggregationMap {
    shared: Arc<Mutex<MapState>>,
    worker_num: u32,
    fragment_size: usize,
    exchange_len: usize,
    policy: SpinPolicy,
    rank: Option<u32>,
    pulled: Vec<i32>,
}

impl MockAggregationMap {
    /// Creates one client per rank, all bound to the same shared map.
    pub fn fleet(worker_num: u32, gradient_size: usize, fragment_size: usize) -> Vec<Self> {
        let exchange_len = fragment_size * gradient_size;
        let shared = Arc::new(Mutex::new(MapState {
            locked: false,
            completion: vec![false; worker_num as usize],
            leader: false,
            iter: 0,
            child_count: 0,
            local_grads: vec![0; exchange_len],
            global_grads: vec![0; exchange_len],
            published: None,
        }));

        (0..worker_num)
            .map(|_| Self {
                shared: Arc::clone(&shared),
                worker_num,
                fragment_size,
                exchange_len,
                policy: SpinPolicy::default(),
                rank: None,
                pulled: vec![0; exchange_len],
            })
            .collect()
    }

    /// Replaces the spin policy of this client.
    pub fn with_policy(mut self, policy: SpinPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn bound_rank(&self) -> Result<u32> {
        self.rank.ok_or_else(|| AggregatorError::MapInit {
            detail: "client used before acquire".to_string(),
        })
    }
}

impl AggregationMap for MockAggregationMap {
    fn acquire(&mut self, local_id: u32, step: u32) -> Result<()> {
        if local_id >= self.worker_num {
            return Err(AggregatorError::MapInit {
                detail: format!(
                    "rank {local_id} out of range for {} workers",
                    self.worker_num
                ),
            });
        }

        let mut state = self.shared.lock();
        if state.iter < step {
            state.iter = step;
        }
        if local_id == 0 {
            state.leader = true;
        }

        self.rank = Some(local_id);
        Ok(())
    }

    fn send_fragments(&mut self, step: u32, local: &[i32]) -> Result<()> {
        let rank = self.bound_rank()?;

        if local.len() != self.exchange_len {
            return Err(AggregatorError::ShapeMismatch {
                what: "local gradients",
                got: local.len(),
                expected: self.exchange_len,
            });
        }

        let mut state = self.shared.lock();

        // First pusher of a new iteration resets the accumulation state.
        // The published buffer of the previous iteration stays readable so
        // slower ranks can still pull it.
        if state.iter != step {
            if step < state.iter {
                return Err(AggregatorError::IterationDrift {
                    step,
                    iter: state.iter,
                });
            }
            state.iter = step;
            state.completion.fill(false);
            state.local_grads.fill(0);
        }

        // The native layer receives each fragment as a raw packet payload;
        // model that boundary by carrying the bytes through an owned buffer.
        for (index, fragment) in local.chunks(self.fragment_size).enumerate() {
            let payload: Vec<u8> = bytemuck::cast_slice(fragment).to_vec();
            let values: Vec<i32> = bytemuck::pod_collect_to_vec(&payload);

            let base = index * self.fragment_size;
            for (offset, value) in values.iter().enumerate() {
                let slot = &mut state.local_grads[base + offset];
                *slot = slot.wrapping_add(*value);
            }
        }

        state.completion[rank as usize] = true;

        if state.completion.iter().all(|done| *done) {
            let sum = state.local_grads.clone();
            state.global_grads.copy_from_slice(&sum);
            state.published = Some(state.iter);
        }

        Ok(())
    }

    fn poll_until_ready(&mut self, step: u32) -> Result<&[i32]> {
        self.bound_rank()?;

        let mut spins: u64 = 0;
        loop {
            {
                let state = self.shared.lock();
                if state.published == Some(step) {
                    self.pulled.copy_from_slice(&state.global_grads);
                    return Ok(&self.pulled);
                }
                // Only the latest completed iteration stays readable; a
                // rank further behind has lost its buffer.
                if state.iter > step {
                    return Err(AggregatorError::IterationDrift {
                        step,
                        iter: state.iter,
                    });
                }
            }

            spins += 1;
            if let Some(max) = self.policy.max_spins
                && spins >= max
            {
                return Err(AggregatorError::PollTimeout { step, spins });
            }

            std::hint::spin_loop();
        }
    }
}
