//! Helpers for collecting walk streams in tests.

use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Collect up to `limit` items from a stream, stopping early when it ends.
pub async fn collect_stream<S, T, E>(mut stream: Pin<&mut S>, limit: usize) -> Vec<Result<T, E>>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    let mut items = Vec::new();
    while items.len() < limit
        && let Some(item) = stream.next().await
    {
        items.push(item);
    }
    items
}
