//! Node pool bookkeeping: concurrency caps and FIFO backpressure queues.
//!
//! The engine does not own a real network transport for worker nodes (that
//! is `buildmux-proto`'s concern); this module only tracks the scheduling
//! facts the multiplexer needs to decide *where* a sub-request should run:
//! how saturated each node is, and which configurations it already knows
//! about.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use buildmux_core::ConfigurationId;

use crate::error::{Error, Result};

/// Identifies one build node (the central node or a worker).
pub type NodeId = u32;

struct NodeState {
    max_cpu_count: usize,
    active: usize,
    known_configurations: HashSet<ConfigurationId>,
    queue: VecDeque<u64>,
    /// Extra cores granted to an in-flight request beyond the implicit one
    /// it already holds while active, keyed by `global_request_id`.
    core_grants: HashMap<u64, usize>,
}

/// Tracks registered nodes' concurrency limits, in-flight counts, and
/// pending FIFO queues.
#[derive(Default)]
pub struct NodePool {
    nodes: Mutex<std::collections::HashMap<NodeId, NodeState>>,
}

impl NodePool {
    /// An empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with the given concurrency cap. Re-registering an
    /// existing id resets its cap but preserves its known configurations.
    pub fn register(&self, node_id: NodeId, max_cpu_count: usize) {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        nodes
            .entry(node_id)
            .and_modify(|state| state.max_cpu_count = max_cpu_count)
            .or_insert_with(|| NodeState {
                max_cpu_count,
                active: 0,
                known_configurations: HashSet::new(),
                queue: VecDeque::new(),
                core_grants: HashMap::new(),
            });
    }

    /// Record that `node_id` already holds (or will hold) `configuration`,
    /// so later routing decisions can pin related sub-requests to it.
    pub fn record_known_configuration(&self, node_id: NodeId, configuration: ConfigurationId) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = nodes.get_mut(&node_id).ok_or(Error::UnknownNode { node_id })?;
        state.known_configurations.insert(configuration);
        Ok(())
    }

    /// Pick a node to run `configuration` on: pinned to any registered node
    /// that already knows the configuration, otherwise the least-loaded
    /// node by `active + queue length`.
    #[must_use]
    pub fn choose_node(&self, configuration: ConfigurationId) -> Option<NodeId> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some((&pinned, _)) = nodes
            .iter()
            .find(|(_, state)| state.known_configurations.contains(&configuration))
        {
            return Some(pinned);
        }
        nodes
            .iter()
            .min_by_key(|(_, state)| state.active + state.queue.len())
            .map(|(&id, _)| id)
    }

    /// Try to reserve a concurrency slot on `node_id`. Returns `true` if
    /// the request may dispatch immediately, `false` if the node is
    /// saturated and the caller must queue instead.
    pub fn try_reserve(&self, node_id: NodeId) -> Result<bool> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = nodes.get_mut(&node_id).ok_or(Error::UnknownNode { node_id })?;
        if state.active < state.max_cpu_count {
            state.active += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Push `global_request_id` onto `node_id`'s FIFO backpressure queue.
    pub fn enqueue(&self, node_id: NodeId, global_request_id: u64) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = nodes.get_mut(&node_id).ok_or(Error::UnknownNode { node_id })?;
        state.queue.push_back(global_request_id);
        Ok(())
    }

    /// Release a concurrency slot on `node_id` and pop the next queued
    /// request, if any, reserving the freed slot for it in the same step.
    pub fn release_and_pop(&self, node_id: NodeId) -> Result<Option<u64>> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = nodes.get_mut(&node_id).ok_or(Error::UnknownNode { node_id })?;
        state.active = state.active.saturating_sub(1);
        if let Some(next) = state.queue.pop_front() {
            state.active += 1;
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }

    /// Request up to `amount` additional CPU cores on `node_id` for
    /// `global_request_id`, beyond the implicit one it already holds while
    /// active. Returns the total cores now held (implicit plus granted
    /// extras) — always `>= 1`, since the implicit core is never withheld
    /// even when the node has no further capacity to grant.
    pub fn request_cores(&self, node_id: NodeId, global_request_id: u64, amount: u32) -> Result<u32> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = nodes.get_mut(&node_id).ok_or(Error::UnknownNode { node_id })?;
        let already_granted: usize = state.core_grants.values().sum();
        let available = state.max_cpu_count.saturating_sub(state.active + already_granted);
        let extra = (amount as usize).min(available);
        *state.core_grants.entry(global_request_id).or_insert(0) += extra;
        Ok(u32::try_from(extra + 1).unwrap_or(u32::MAX))
    }

    /// Release up to `amount` previously granted extra cores held by
    /// `global_request_id` on `node_id`, making them available to other
    /// requests on the same node.
    pub fn release_cores(&self, node_id: NodeId, global_request_id: u64, amount: u32) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = nodes.get_mut(&node_id).ok_or(Error::UnknownNode { node_id })?;
        if let Some(grant) = state.core_grants.get_mut(&global_request_id) {
            *grant = grant.saturating_sub(amount as usize);
        }
        Ok(())
    }

    /// Reclaim every core grant still outstanding for `global_request_id`
    /// on `node_id`. Called once its Request Builder completes, so a task
    /// that forgot to `release_cores` cannot leak capacity.
    pub fn reclaim_cores(&self, node_id: NodeId, global_request_id: u64) {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(state) = nodes.get_mut(&node_id) {
            state.core_grants.remove(&global_request_id);
        }
    }

    /// Current active count and queue length for a node, for diagnostics
    /// and tests.
    #[must_use]
    pub fn load(&self, node_id: NodeId) -> Option<(usize, usize)> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        nodes.get(&node_id).map(|state| (state.active, state.queue.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturated_node_queues_instead_of_reserving() {
        let pool = NodePool::new();
        pool.register(1, 1);
        assert!(pool.try_reserve(1).unwrap());
        assert!(!pool.try_reserve(1).unwrap());
        pool.enqueue(1, 42).unwrap();
        assert_eq!(pool.load(1), Some((1, 1)));
    }

    #[test]
    fn release_and_pop_reserves_the_freed_slot_for_the_queued_item() {
        let pool = NodePool::new();
        pool.register(1, 1);
        assert!(pool.try_reserve(1).unwrap());
        pool.enqueue(1, 42).unwrap();
        let popped = pool.release_and_pop(1).unwrap();
        assert_eq!(popped, Some(42));
        assert_eq!(pool.load(1), Some((1, 0)));
    }

    #[test]
    fn release_with_empty_queue_just_frees_the_slot() {
        let pool = NodePool::new();
        pool.register(1, 2);
        pool.try_reserve(1).unwrap();
        pool.try_reserve(1).unwrap();
        assert_eq!(pool.release_and_pop(1).unwrap(), None);
        assert_eq!(pool.load(1), Some((1, 0)));
    }

    #[test]
    fn choose_node_pins_to_a_node_that_already_knows_the_configuration() {
        let pool = NodePool::new();
        pool.register(1, 4);
        pool.register(2, 4);
        pool.record_known_configuration(2, ConfigurationId::new(7)).unwrap();
        assert_eq!(pool.choose_node(ConfigurationId::new(7)), Some(2));
    }

    #[test]
    fn choose_node_picks_least_loaded_when_no_pin_applies() {
        let pool = NodePool::new();
        pool.register(1, 4);
        pool.register(2, 4);
        pool.try_reserve(1).unwrap();
        assert_eq!(pool.choose_node(ConfigurationId::new(99)), Some(2));
    }

    #[test]
    fn operations_on_an_unknown_node_are_reported() {
        let pool = NodePool::new();
        assert!(matches!(pool.try_reserve(1), Err(Error::UnknownNode { node_id: 1 })));
    }

    #[test]
    fn request_cores_never_returns_zero_even_when_saturated() {
        let pool = NodePool::new();
        pool.register(1, 2);
        pool.try_reserve(1).unwrap();
        pool.try_reserve(1).unwrap();
        assert_eq!(pool.request_cores(1, 100, 4).unwrap(), 1);
    }

    #[test]
    fn request_cores_grants_up_to_remaining_capacity() {
        let pool = NodePool::new();
        pool.register(1, 4);
        pool.try_reserve(1).unwrap();
        assert_eq!(pool.request_cores(1, 100, 2).unwrap(), 3);
        assert_eq!(pool.request_cores(1, 101, 2).unwrap(), 1);
    }

    #[test]
    fn release_cores_frees_capacity_for_other_requests() {
        let pool = NodePool::new();
        pool.register(1, 4);
        pool.try_reserve(1).unwrap();
        assert_eq!(pool.request_cores(1, 100, 3).unwrap(), 4);
        pool.release_cores(1, 100, 3).unwrap();
        assert_eq!(pool.request_cores(1, 101, 3).unwrap(), 4);
    }

    #[test]
    fn reclaim_cores_recovers_grants_a_finished_request_never_released() {
        let pool = NodePool::new();
        pool.register(1, 4);
        pool.try_reserve(1).unwrap();
        pool.request_cores(1, 100, 3).unwrap();
        pool.reclaim_cores(1, 100);
        assert_eq!(pool.request_cores(1, 101, 3).unwrap(), 4);
    }
}
