//! The request engine: multiplexes active request builders and routes
//! their traffic, per spec §4.4.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildmux_config_cache::ConfigCache;
use buildmux_core::error::{BuildException, ErrorKind};
use buildmux_core::request::BuildRequest;
use buildmux_core::result::{ActionCode, BuildResult, TargetResult, TargetResultCode, WorkUnitResult};
use buildmux_core::target_builder::{SubRequest, TargetBuilder, TargetBuilderOutcome};
use buildmux_core::ConfigurationId;
use buildmux_results_cache::{ResultsCache, SatisfyResponse};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cancellation::{race_against_cancellation, synthesize_cancelled_result, DEFAULT_CANCELLATION_BOUND};
use crate::chain::RequestChain;
use crate::error::{Error, Result};
use crate::ids::{GlobalRequestIdGenerator, SubmissionIdGenerator};
use crate::node::{NodeId, NodePool};

type Completion = watch::Receiver<Option<BuildResult>>;

struct PendingDispatch {
    request: BuildRequest,
    chain: RequestChain,
    cancellation: CancellationToken,
}

/// Holds the pool of active request builders and routes packets between
/// them, the config/results caches, and the node pool.
pub struct RequestEngine {
    config_cache: Arc<ConfigCache>,
    results_cache: Arc<ResultsCache>,
    target_builder: Arc<dyn TargetBuilder>,
    nodes: NodePool,
    global_ids: GlobalRequestIdGenerator,
    submission_ids: SubmissionIdGenerator,
    node_request_ids: GlobalRequestIdGenerator,
    cancellation_bound: Duration,
    senders: Mutex<HashMap<u64, watch::Sender<Option<BuildResult>>>>,
    receivers: Mutex<HashMap<u64, Completion>>,
    coalesce: Mutex<HashMap<(u64, ConfigurationId, Vec<String>), u64>>,
    pending: Mutex<HashMap<u64, PendingDispatch>>,
    submission_cancellation: Mutex<HashMap<u64, CancellationToken>>,
}

impl RequestEngine {
    /// Construct an engine over the given caches and external target
    /// builder. Callers must [`Self::register_node`] at least one node
    /// before submitting work.
    #[must_use]
    pub fn new(
        config_cache: Arc<ConfigCache>,
        results_cache: Arc<ResultsCache>,
        target_builder: Arc<dyn TargetBuilder>,
    ) -> Self {
        Self {
            config_cache,
            results_cache,
            target_builder,
            nodes: NodePool::new(),
            global_ids: GlobalRequestIdGenerator::new(),
            submission_ids: SubmissionIdGenerator::new(),
            node_request_ids: GlobalRequestIdGenerator::new(),
            cancellation_bound: DEFAULT_CANCELLATION_BOUND,
            senders: Mutex::new(HashMap::new()),
            receivers: Mutex::new(HashMap::new()),
            coalesce: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            submission_cancellation: Mutex::new(HashMap::new()),
        }
    }

    /// Override the cooperative-cancellation bound, primarily for tests.
    #[must_use]
    pub fn with_cancellation_bound(mut self, bound: Duration) -> Self {
        self.cancellation_bound = bound;
        self
    }

    /// Register a node with the given maximum concurrent builder count.
    pub fn register_node(&self, node_id: NodeId, max_cpu_count: usize) {
        self.nodes.register(node_id, max_cpu_count);
    }

    /// Grant additional CPU cores to an active request beyond the implicit
    /// one it already holds, per spec §5's shared-resource policy. Returns
    /// the total cores now held, which is always `>= 1`.
    pub fn request_cores(&self, node_id: NodeId, global_request_id: u64, amount: u32) -> Result<u32> {
        self.nodes.request_cores(node_id, global_request_id, amount)
    }

    /// Give back previously granted cores so other requests on the same
    /// node can use them.
    pub fn release_cores(&self, node_id: NodeId, global_request_id: u64, amount: u32) -> Result<()> {
        self.nodes.release_cores(node_id, global_request_id, amount)
    }

    /// The shared configuration cache, for the request builder to resolve a
    /// request's configuration.
    pub(crate) fn config_cache(&self) -> &Arc<ConfigCache> {
        &self.config_cache
    }

    /// The external target builder every request is driven through.
    pub(crate) fn target_builder(&self) -> &Arc<dyn TargetBuilder> {
        &self.target_builder
    }

    /// The cooperative-cancellation bound builders are raced against.
    pub(crate) fn cancellation_bound(&self) -> Duration {
        self.cancellation_bound
    }

    fn register_completion(&self, id: u64) -> Completion {
        let (tx, rx) = watch::channel(None);
        self.senders.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(id, tx);
        self.receivers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, rx.clone());
        rx
    }

    fn receiver_for(&self, id: u64) -> Option<Completion> {
        self.receivers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&id).cloned()
    }

    fn complete_global(&self, id: u64, result: BuildResult) {
        if let Some(tx) = self.senders.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&id) {
            let _ = tx.send(Some(result));
        }
    }

    fn take_pending(&self, id: u64) -> Option<PendingDispatch> {
        self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&id)
    }

    /// Submit a top-level build request; returns its freshly assigned
    /// `global_request_id`. Await its result with [`Self::await_result`].
    pub async fn submit(engine: &Arc<Self>, mut request: BuildRequest) -> Result<u64> {
        let submission_id = engine.submission_ids.next();
        request.submission_id = submission_id;
        let global_request_id = engine.global_ids.next();
        request.global_request_id = Some(global_request_id);
        request.node_request_id = engine.node_request_ids.next();
        engine.register_completion(global_request_id);

        let cancellation = CancellationToken::new();
        engine
            .submission_cancellation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(submission_id, cancellation.clone());

        let node_id = engine
            .nodes
            .choose_node(request.configuration_id)
            .ok_or(Error::NoNodesRegistered)?;
        engine.nodes.record_known_configuration(node_id, request.configuration_id)?;
        Self::dispatch_on_node(engine, node_id, request, RequestChain::new(), cancellation)?;
        Ok(global_request_id)
    }

    /// Await the final result for a previously submitted (or dispatched)
    /// `global_request_id`.
    pub async fn await_result(&self, global_request_id: u64) -> Result<BuildResult> {
        let Some(mut rx) = self.receiver_for(global_request_id) else {
            return Err(Error::UnknownSubmission { submission_id: global_request_id });
        };
        loop {
            if let Some(result) = rx.borrow().clone() {
                return Ok(result);
            }
            if rx.changed().await.is_err() {
                return Err(Error::UnknownSubmission { submission_id: global_request_id });
            }
        }
    }

    /// Trigger cooperative cancellation for every request under
    /// `submission_id`.
    pub fn cancel_submission(&self, submission_id: u64) {
        if let Some(token) = self
            .submission_cancellation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&submission_id)
        {
            token.cancel();
        }
    }

    fn dispatch_on_node(
        engine: &Arc<Self>,
        node_id: NodeId,
        request: BuildRequest,
        chain: RequestChain,
        cancellation: CancellationToken,
    ) -> Result<()> {
        let global_id = request
            .global_request_id
            .ok_or_else(|| buildmux_core::Error::internal("dispatch requires an assigned global_request_id"))?;
        if engine.nodes.try_reserve(node_id)? {
            Self::spawn_builder(engine, node_id, request, chain, cancellation);
        } else {
            engine
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(global_id, PendingDispatch { request, chain, cancellation });
            engine.nodes.enqueue(node_id, global_id)?;
        }
        Ok(())
    }

    fn spawn_builder(
        engine: &Arc<Self>,
        node_id: NodeId,
        request: BuildRequest,
        chain: RequestChain,
        cancellation: CancellationToken,
    ) {
        let spawned_engine = Arc::clone(engine);
        tokio::spawn(async move {
            let result =
                crate::builder::run_request(Arc::clone(&spawned_engine), request.clone(), chain, cancellation).await;
            Self::complete_dispatch(&spawned_engine, node_id, &request, result);
        });
    }

    fn complete_dispatch(engine: &Arc<Self>, node_id: NodeId, request: &BuildRequest, result: BuildResult) {
        if let Err(error) = engine.results_cache.add(result.clone()) {
            tracing::error!(target: "buildmux::engine", %error, "failed to deposit result into results cache");
        }
        if let Some(id) = request.global_request_id {
            engine.nodes.reclaim_cores(node_id, id);
            engine.complete_global(id, result);
        }
        if let Ok(Some(next_id)) = engine.nodes.release_and_pop(node_id) {
            if let Some(pending) = engine.take_pending(next_id) {
                Self::spawn_builder(engine, node_id, pending.request, pending.chain, pending.cancellation);
            }
        }
    }

    pub(crate) async fn dispatch_subrequests(
        engine: &Arc<Self>,
        parent: &BuildRequest,
        chain: &RequestChain,
        cancellation: &CancellationToken,
        subrequests: Vec<SubRequest>,
    ) -> Result<()> {
        let mut waits: Vec<Pin<Box<dyn Future<Output = ()> + Send>>> = Vec::new();

        for subrequest in subrequests {
            let child_config_id = engine.config_cache.intern(subrequest.configuration);

            let mut child_chain = chain.clone();
            let mut cyclic_targets = Vec::new();
            let mut remaining_targets = Vec::new();
            for target in &subrequest.targets {
                if chain.contains(child_config_id, target) {
                    cyclic_targets.push(target.clone());
                } else {
                    remaining_targets.push(target.clone());
                }
                child_chain = child_chain.extended(child_config_id, target.clone());
            }

            if !cyclic_targets.is_empty() {
                let mut circular_result =
                    BuildResult::new(child_config_id, parent.submission_id, parent.node_request_id);
                circular_result.circular_dependency = true;
                for target in &cyclic_targets {
                    circular_result.set_target(
                        target.clone(),
                        TargetResult {
                            work_unit_result: WorkUnitResult {
                                result_code: TargetResultCode::Failure,
                                action_code: ActionCode::Stop,
                                exception: None,
                            },
                            items: Vec::new(),
                        },
                    );
                }
                engine.results_cache.add(circular_result)?;
            }

            if remaining_targets.is_empty() {
                continue;
            }

            let mut coalesce_key_targets = remaining_targets.clone();
            coalesce_key_targets.sort();
            let coalesce_key = (parent.submission_id, child_config_id, coalesce_key_targets);

            let existing_id = {
                let coalesce = engine.coalesce.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                coalesce.get(&coalesce_key).copied()
            };

            let receiver = if let Some(existing_id) = existing_id {
                engine
                    .receiver_for(existing_id)
                    .ok_or_else(|| buildmux_core::Error::internal("coalesced request has no completion channel"))?
            } else {
                let mut child = BuildRequest::new_top_level(
                    parent.submission_id,
                    engine.node_request_ids.next(),
                    child_config_id,
                    remaining_targets.clone(),
                );
                child.parent_global_request_id = parent.global_request_id;
                let child_global_id = engine.global_ids.next();
                child.global_request_id = Some(child_global_id);

                engine
                    .coalesce
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .insert(coalesce_key, child_global_id);
                let receiver = engine.register_completion(child_global_id);

                match engine.results_cache.satisfy_request(&child, &[], &remaining_targets, true) {
                    SatisfyResponse::Satisfied(result) => {
                        engine.complete_global(child_global_id, result);
                    }
                    SatisfyResponse::NotSatisfied => {
                        let node_id = engine
                            .nodes
                            .choose_node(child_config_id)
                            .ok_or(Error::NoNodesRegistered)?;
                        engine.nodes.record_known_configuration(node_id, child_config_id)?;
                        Self::dispatch_on_node(engine, node_id, child, child_chain.clone(), cancellation.clone())?;
                    }
                }
                receiver
            };

            waits.push(Box::pin(await_completion(receiver)));
        }

        futures::future::join_all(waits).await;
        Ok(())
    }
}

async fn await_completion(mut rx: Completion) {
    loop {
        if rx.borrow().is_some() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use buildmux_core::{BuildRequestConfiguration, GlobalProperties};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A target builder that completes every request with `Success` on its
    /// first invocation, unless the request names a target called
    /// `"Suspend"`, in which case it yields one sub-request for `"Leaf"`
    /// against a fixed sibling configuration and completes only once the
    /// results cache already has that leaf's result.
    struct ScriptedBuilder {
        results: Arc<ResultsCache>,
        invocations: AtomicUsize,
    }

    #[async_trait]
    impl TargetBuilder for ScriptedBuilder {
        async fn build(
            &self,
            configuration: &BuildRequestConfiguration,
            request: &BuildRequest,
            _cancellation: &CancellationToken,
        ) -> TargetBuilderOutcome {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if request.wants_target("Suspend") {
                if self
                    .results
                    .get_result_for_configuration(ConfigurationId::new(999))
                    .and_then(|r| r.target("Leaf").cloned())
                    .is_some()
                {
                    let mut result = BuildResult::new(
                        request.configuration_id,
                        request.submission_id,
                        request.node_request_id,
                    );
                    result.set_target("Suspend", TargetResult::success());
                    return TargetBuilderOutcome::Complete(result);
                }
                return TargetBuilderOutcome::Suspended(vec![SubRequest {
                    configuration: BuildRequestConfiguration::new(
                        "/leaf.proj",
                        GlobalProperties::new(),
                        "Current",
                    ),
                    targets: vec!["Leaf".to_string()],
                }]);
            }

            let mut result =
                BuildResult::new(request.configuration_id, request.submission_id, request.node_request_id);
            for target in &configuration_targets(configuration, request) {
                result.set_target(target.clone(), TargetResult::success());
            }
            TargetBuilderOutcome::Complete(result)
        }
    }

    fn configuration_targets(_configuration: &BuildRequestConfiguration, request: &BuildRequest) -> Vec<String> {
        request.targets.clone()
    }

    fn build_engine(builder: Arc<ScriptedBuilder>) -> (Arc<RequestEngine>, Arc<ConfigCache>, Arc<ResultsCache>) {
        let config_cache = Arc::new(ConfigCache::new());
        let results_cache = builder.results.clone();
        let engine = Arc::new(RequestEngine::new(config_cache.clone(), results_cache.clone(), builder));
        engine.register_node(1, 4);
        (engine, config_cache, results_cache)
    }

    #[tokio::test]
    async fn a_simple_request_completes_successfully() {
        let results = Arc::new(ResultsCache::new());
        let builder = Arc::new(ScriptedBuilder { results: results.clone(), invocations: AtomicUsize::new(0) });
        let (engine, config_cache, _results) = build_engine(builder);

        let config_id = config_cache.intern(BuildRequestConfiguration::new(
            "/app.proj",
            GlobalProperties::new(),
            "Current",
        ));
        let request = BuildRequest::new_top_level(0, 0, config_id, vec!["Build".to_string()]);
        let id = RequestEngine::submit(&engine, request).await.unwrap();
        let result = engine.await_result(id).await.unwrap();
        assert_eq!(result.overall_result(), TargetResultCode::Success);
        assert!(result.target("Build").is_some());
    }

    #[tokio::test]
    async fn a_suspended_request_resumes_once_its_subrequest_is_cached() {
        let results = Arc::new(ResultsCache::new());
        let builder = Arc::new(ScriptedBuilder { results: results.clone(), invocations: AtomicUsize::new(0) });
        let (engine, config_cache, _results) = build_engine(builder);

        let config_id = config_cache.intern(BuildRequestConfiguration::new(
            "/app.proj",
            GlobalProperties::new(),
            "Current",
        ));
        let request = BuildRequest::new_top_level(0, 0, config_id, vec!["Suspend".to_string()]);
        let id = RequestEngine::submit(&engine, request).await.unwrap();
        let result = engine.await_result(id).await.unwrap();
        assert_eq!(result.overall_result(), TargetResultCode::Success);
        assert!(result.target("Suspend").is_some());

        let leaf_config = config_cache.intern(BuildRequestConfiguration::new(
            "/leaf.proj",
            GlobalProperties::new(),
            "Current",
        ));
        assert!(results.get_result_for_configuration(leaf_config).unwrap().target("Leaf").is_some());
    }

    #[test]
    fn request_cores_and_release_cores_round_trip_through_the_engine() {
        let results = Arc::new(ResultsCache::new());
        let builder = Arc::new(ScriptedBuilder { results, invocations: AtomicUsize::new(0) });
        let (engine, _config_cache, _results) = build_engine(builder);

        assert_eq!(engine.request_cores(1, 42, 3).unwrap(), 4);
        engine.release_cores(1, 42, 3).unwrap();
        assert_eq!(engine.request_cores(1, 99, 3).unwrap(), 4);
    }

    #[tokio::test]
    async fn submitting_without_a_registered_node_fails() {
        let results = Arc::new(ResultsCache::new());
        let builder = Arc::new(ScriptedBuilder { results: results.clone(), invocations: AtomicUsize::new(0) });
        let config_cache = Arc::new(ConfigCache::new());
        let engine = Arc::new(RequestEngine::new(config_cache.clone(), results.clone(), builder));

        let config_id = config_cache.intern(BuildRequestConfiguration::new(
            "/app.proj",
            GlobalProperties::new(),
            "Current",
        ));
        let request = BuildRequest::new_top_level(0, 0, config_id, vec!["Build".to_string()]);
        assert!(RequestEngine::submit(&engine, request).await.is_err());
    }

    #[tokio::test]
    async fn a_direct_self_cycle_is_reported_as_circular_dependency() {
        let results = Arc::new(ResultsCache::new());

        // On its first invocation, suspends on a sub-request that names its
        // own (configuration, target) pair; once the engine has unwound
        // that as a circular dependency, the second invocation observes the
        // cached `circular_dependency` marker and completes as a failure,
        // exactly as a real target builder would after consulting the
        // results cache on resume.
        struct CyclicBuilder {
            results: Arc<ResultsCache>,
        }
        #[async_trait]
        impl TargetBuilder for CyclicBuilder {
            async fn build(
                &self,
                _configuration: &BuildRequestConfiguration,
                request: &BuildRequest,
                _cancellation: &CancellationToken,
            ) -> TargetBuilderOutcome {
                if let Some(cached) = self.results.get_result_for_configuration(request.configuration_id) {
                    if cached.circular_dependency {
                        let mut result = BuildResult::new(
                            request.configuration_id,
                            request.submission_id,
                            request.node_request_id,
                        );
                        result.circular_dependency = true;
                        result.set_target(
                            "Loop",
                            TargetResult {
                                work_unit_result: WorkUnitResult {
                                    result_code: TargetResultCode::Failure,
                                    action_code: ActionCode::Stop,
                                    exception: None,
                                },
                                items: Vec::new(),
                            },
                        );
                        return TargetBuilderOutcome::Complete(result);
                    }
                }
                TargetBuilderOutcome::Suspended(vec![SubRequest {
                    configuration: BuildRequestConfiguration::new(
                        "/app.proj",
                        GlobalProperties::new(),
                        "Current",
                    ),
                    targets: vec!["Loop".to_string()],
                }])
            }
        }

        let config_cache = Arc::new(ConfigCache::new());
        let builder = Arc::new(CyclicBuilder { results: results.clone() });
        let engine = Arc::new(RequestEngine::new(config_cache.clone(), results.clone(), builder));
        engine.register_node(1, 4);

        let config_id = config_cache.intern(BuildRequestConfiguration::new(
            "/app.proj",
            GlobalProperties::new(),
            "Current",
        ));
        let request = BuildRequest::new_top_level(0, 0, config_id, vec!["Loop".to_string()]);
        let id = RequestEngine::submit(&engine, request).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), engine.await_result(id))
            .await
            .expect("circular dependency should resolve promptly")
            .unwrap();
        assert!(result.circular_dependency);
        assert_eq!(result.overall_result(), TargetResultCode::Failure);
    }
}
