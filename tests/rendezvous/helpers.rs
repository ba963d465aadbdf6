use simcomm::{ActorId, CommRegistry, DataType, Group, SimcommConfig, Tensor};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; `RUST_LOG=simcomm=trace` shows
/// every arrival.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn actor_ids(world_size: u32) -> Vec<ActorId> {
    (0..world_size as u64).map(|i| ActorId(1000 + i)).collect()
}

/// Driver-side group plus one participant handle per rank, all sharing a
/// fresh registry.
pub fn local_group(world_size: u32, config: SimcommConfig) -> (Arc<Group>, Vec<Arc<Group>>) {
    init_tracing();
    let driver = Group::new(
        actor_ids(world_size),
        Arc::new(CommRegistry::new()),
        config,
    );
    let participants = (0..world_size)
        .map(|rank| Arc::new(driver.with_rank(rank).unwrap()))
        .collect();
    (Arc::new(driver), participants)
}

/// Config that turns an accidental hang into a test failure.
pub fn test_config() -> SimcommConfig {
    SimcommConfig::with_timeout(Duration::from_secs(10))
}

pub fn alloc(shape: &[usize], dtype: DataType) -> Tensor {
    Tensor::zeros(shape, dtype)
}

/// Run `f` concurrently for every participant and return the results in
/// rank order.
pub async fn run_on<F, Fut, T>(groups: Vec<Arc<Group>>, f: F) -> Vec<T>
where
    F: Fn(Arc<Group>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = groups
        .into_iter()
        .map(|g| {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f(g).await })
        })
        .collect();
    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect()
}

/// Helper: run a group operation across `world_size` fresh participants.
pub async fn run_group<F, Fut, T>(world_size: u32, f: F) -> Vec<T>
where
    F: Fn(Arc<Group>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (_driver, groups) = local_group(world_size, test_config());
    run_on(groups, f).await
}
