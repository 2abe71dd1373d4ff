//! Ancestry tracking for circular-dependency detection.
//!
//! The engine walks `parent_global_request_id -> ... -> root` for every
//! active request; a sub-request that names a `(configuration, target)`
//! pair already on that chain is a cycle, and the request builder unwinds
//! it as a failing, `circular_dependency = true` target result instead of
//! dispatching it.

use buildmux_core::ConfigurationId;

/// One link of the active-request chain: the configuration and target a
/// request is building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// The configuration this link builds against.
    pub configuration_id: ConfigurationId,
    /// The target name this link builds, compared case-insensitively.
    pub target: String,
}

impl ChainLink {
    fn matches(&self, configuration_id: ConfigurationId, target: &str) -> bool {
        self.configuration_id == configuration_id && self.target.eq_ignore_ascii_case(target)
    }
}

/// The chain of requests from the submission root down to the currently
/// active request.
#[derive(Debug, Clone, Default)]
pub struct RequestChain {
    links: Vec<ChainLink>,
}

impl RequestChain {
    /// An empty chain, for a fresh top-level request.
    #[must_use]
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Whether `(configuration_id, target)` already appears on this chain.
    #[must_use]
    pub fn contains(&self, configuration_id: ConfigurationId, target: &str) -> bool {
        self.links.iter().any(|link| link.matches(configuration_id, target))
    }

    /// Return a new chain extending `self` with one more link, for handing
    /// to a dispatched sub-request.
    #[must_use]
    pub fn extended(&self, configuration_id: ConfigurationId, target: impl Into<String>) -> Self {
        let mut links = self.links.clone();
        links.push(ChainLink {
            configuration_id,
            target: target.into(),
        });
        Self { links }
    }

    /// Number of links on the chain (the root request has zero).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_contains_nothing() {
        let chain = RequestChain::new();
        assert!(!chain.contains(ConfigurationId::new(1), "Build"));
    }

    #[test]
    fn extended_chain_detects_the_same_configuration_and_target() {
        let chain = RequestChain::new().extended(ConfigurationId::new(1), "Build");
        assert!(chain.contains(ConfigurationId::new(1), "build"));
        assert!(!chain.contains(ConfigurationId::new(1), "Clean"));
        assert!(!chain.contains(ConfigurationId::new(2), "Build"));
    }

    #[test]
    fn extending_does_not_mutate_the_original_chain() {
        let root = RequestChain::new();
        let child = root.extended(ConfigurationId::new(1), "Build");
        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn a_three_link_cycle_is_detected_at_the_fourth_hop() {
        let chain = RequestChain::new()
            .extended(ConfigurationId::new(1), "A")
            .extended(ConfigurationId::new(2), "B")
            .extended(ConfigurationId::new(3), "C");
        assert!(chain.contains(ConfigurationId::new(1), "A"));
        assert!(!chain.contains(ConfigurationId::new(4), "D"));
    }
}
