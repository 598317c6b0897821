//! Bounded concurrent task runner.
//!
//! All item futures of a stage are multiplexed on the calling task through
//! `buffer_unordered`, which admits at most `limit` of them at a time. Results
//! are yielded in completion order with a running completed count. A failing
//! or panicking item becomes a [`TaskFailure`] in its own slot and never
//! affects its siblings.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::stream::{self, Stream, StreamExt};
use futures_util::FutureExt;

/// Why an item produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub message: String,
}

impl TaskFailure {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("task panicked: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("task panicked: {}", s)
        } else {
            "task panicked".to_string()
        };
        Self { message }
    }
}

impl From<anyhow::Error> for TaskFailure {
    fn from(e: anyhow::Error) -> Self {
        Self { message: format!("{:#}", e) }
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// One finished item.
#[derive(Debug)]
pub struct Completion<R> {
    /// Position of the item in the input.
    pub index: usize,
    /// Items finished so far, this one included (1-based, strictly increasing).
    pub completed: usize,
    pub total: usize,
    pub result: Result<R, TaskFailure>,
}

impl<R> Completion<R> {
    /// `[completed/total]` progress marker.
    pub fn progress(&self) -> String {
        format!("[{}/{}]", self.completed, self.total)
    }
}

/// Run `op` over `items` with at most `limit` operations in flight.
///
/// Items are admitted in input order. A `limit` of zero is treated as one.
pub fn run_bounded<'a, T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    op: F,
) -> impl Stream<Item = Completion<R>> + 'a
where
    T: 'a,
    R: 'a,
    F: Fn(T) -> Fut + 'a,
    Fut: Future<Output = anyhow::Result<R>> + 'a,
{
    let total = items.len();
    stream::iter(items.into_iter().enumerate())
        .map(move |(index, item)| {
            let fut = op(item);
            async move {
                let result = match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(r)) => Ok(r),
                    Ok(Err(e)) => Err(TaskFailure::from(e)),
                    Err(payload) => Err(TaskFailure::from_panic(payload)),
                };
                (index, result)
            }
        })
        .buffer_unordered(limit.max(1))
        .enumerate()
        .map(move |(n, (index, result))| Completion {
            index,
            completed: n + 1,
            total,
            result,
        })
}

/// Drain a runner stream, returning every completion sorted by input index.
pub async fn collect_in_order<R>(stream: impl Stream<Item = Completion<R>>) -> Vec<Completion<R>> {
    let mut all: Vec<Completion<R>> = stream.collect().await;
    all.sort_by_key(|c| c.index);
    all
}
