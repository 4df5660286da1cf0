use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Drives every item through `worker` with at most `limit` invocations
/// in flight at once. Results come back aligned with the input order,
/// and a failing worker never aborts its siblings; nothing is observable
/// until every item has settled.
pub async fn run_with_limit<T, R, E, F, Fut>(
    items: Vec<T>,
    limit: usize,
    worker: F,
) -> Vec<Result<R, E>>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    if items.is_empty() {
        return Vec::new();
    }
    let limiter = Arc::new(Semaphore::new(limit.max(1)));
    let worker = &worker;
    let tasks = items.into_iter().enumerate().map(|(index, item)| {
        let limiter = Arc::clone(&limiter);
        async move {
            // The semaphore is owned here and never closed, so acquire
            // cannot fail in practice.
            let _permit = limiter.acquire_owned().await.ok();
            worker(index, item).await
        }
    });
    join_all(tasks).await
}
