use std::future::Future;

use futures::{stream, StreamExt};

/// Runs `task` for every item with at most `limit` futures in flight.
/// Results come back in input order, each task keeps its own result so one
/// failure does not stop the others.
pub async fn bounded_fan_out<I, T, F, Fut, R>(items: I, limit: usize, task: F) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(task)
        .buffered(limit.max(1))
        .collect()
        .await
}
