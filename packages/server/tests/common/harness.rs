//! Test harness for driving the materials pipeline against a scripted crawler.
//!
//! Each test gets its own in-memory store and event bus. Jobs are processed
//! synchronously through [`TestHarness::run_next_job`], so assertions never
//! race the worker.

use std::time::Duration;

use futures::StreamExt;
use materials_core::domains::materials::{
    MaterialsEvent, MaterialsJobData, MaterialsPipeline, MaterialsService,
};
use materials_core::kernel::jobs::JobWorkerConfig;
use materials_core::kernel::{MockCrawler, TestDependencies};
use mediacrawler_client::Platform;
use std::sync::Arc;
use test_context::AsyncTestContext;
use tokio_util::sync::CancellationToken;

/// Test harness wrapping a pipeline built on mock dependencies.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let response = ctx.service().search(query).await.unwrap();
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub deps: TestDependencies,
    pub pipeline: MaterialsPipeline,
    pub shutdown: CancellationToken,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new(MockCrawler::new())
    }

    async fn teardown(self) {
        self.shutdown.cancel();
    }
}

impl TestHarness {
    pub fn new(crawler: MockCrawler) -> Self {
        Self::from_deps(TestDependencies::with_crawler(crawler))
    }

    pub fn from_deps(deps: TestDependencies) -> Self {
        // Uses try_init() to avoid panicking if already initialized.
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let pipeline = MaterialsPipeline::with_worker_config(
            &deps.server_deps(),
            JobWorkerConfig {
                idle_interval: Duration::from_millis(10),
                ..JobWorkerConfig::with_worker_id("test-worker")
            },
        );

        Self {
            deps,
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn service(&self) -> Arc<MaterialsService> {
        self.pipeline.service.clone()
    }

    pub fn crawler(&self) -> &MockCrawler {
        &self.deps.crawler
    }

    /// Claim and process one job. Returns whether a job was available.
    pub async fn run_next_job(&self) -> bool {
        self.pipeline
            .worker
            .run_once(&self.shutdown)
            .await
            .expect("Failed to claim job")
    }

    /// Run `job_id` to completion and return every event it published from
    /// the moment of subscription, ending with its terminal event.
    pub async fn run_and_collect(&self, job_id: &str) -> Vec<MaterialsEvent> {
        let events = self.service().subscribe(job_id).await;
        assert!(self.run_next_job().await, "no job was queued");
        tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
            .await
            .expect("job never published a terminal event")
    }
}

/// Payload for a queued xhs search.
pub fn xhs_job(keywords: &str) -> MaterialsJobData {
    MaterialsJobData {
        org_id: "org_1".to_string(),
        platform: Platform::Xhs,
        keywords: keywords.to_string(),
        start_page: 1,
        page_limit: None,
        query_hash: None,
        started_at: None,
        consumed_paths: Vec::new(),
    }
}

/// Event names in publish order.
pub fn event_names(events: &[MaterialsEvent]) -> Vec<&'static str> {
    events.iter().map(|event| event.payload.name()).collect()
}
