use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Mutex;

use crate::command::Command;
use crate::flow::{BatchItem, Finish, Flow, Resume, Step, Yielded};

type Log<V, E> = Mutex<Vec<Command<V, E>>>;

/// Combine a dynamic, data-dependent sequence of commands into one.
///
/// The factory produces a fresh [`Flow`] for each execute. The composite
/// drives the flow step by step: yielded commands are executed and their
/// results threaded back in, yielded batches fan out concurrently, plain
/// values pass through untouched. Each step fully completes before the next
/// begins.
///
/// When a step fails, its error is injected into the flow at the suspension
/// point. A flow that recovers keeps the composite alive; one that re-raises
/// makes the composite fail with the original error after compensating all
/// completed steps, most recently completed first. Rollback is best-effort:
/// an error from one compensating action aborts the remaining walk.
#[must_use]
pub fn sequential<V, E, F, G>(mut factory: F) -> Command<V, E>
where
    V: Clone + Send + 'static,
    E: Send + 'static,
    F: FnMut() -> G + Send + 'static,
    G: Flow<V, E> + Send + 'static,
{
    let log: Arc<Log<V, E>> = Arc::new(Mutex::new(Vec::new()));
    let undo_log = Arc::clone(&log);
    Command::undoable(
        move || {
            let flow = factory();
            let log = Arc::clone(&log);
            async move { drive(flow, &log).await }
        },
        move |_result| {
            let log = Arc::clone(&undo_log);
            async move { rollback(&log).await }
        },
    )
}

/// Run one flow to completion, recording completed commands in the log.
async fn drive<V, E, G>(mut flow: G, log: &Log<V, E>) -> Result<V, E>
where
    V: Clone + Send + 'static,
    E: Send + 'static,
    G: Flow<V, E>,
{
    log.lock().await.clear();

    let mut input = Resume::Start;
    loop {
        input = match flow.resume(input)? {
            Step::Yield(Yielded::Value(value)) => Resume::Value(value),
            Step::Yield(Yielded::Command(mut cmd)) => match cmd.execute().await {
                Ok(value) => {
                    log.lock().await.push(cmd);
                    Resume::Value(value)
                }
                Err(err) => {
                    tracing::debug!("step failed, injecting the error into the flow");
                    Resume::Error(err)
                }
            },
            Step::Yield(Yielded::Batch(items)) => match run_batch(items, log).await {
                Ok(values) => Resume::Values(values),
                Err(err) => {
                    tracing::debug!("batch step failed, injecting the error into the flow");
                    Resume::Error(err)
                }
            },
            Step::Done(Finish::Value(value)) => return Ok(value),
            Step::Done(Finish::Command(mut cmd)) => {
                // The flow already finished, so there is no suspension point
                // left to inject a failure into.
                let value = cmd.execute().await?;
                log.lock().await.push(cmd);
                return Ok(value);
            }
        };
    }
}

/// Fan a batch out concurrently. Command items land in the log as they
/// complete; value items pass through into their result positions.
async fn run_batch<V, E>(items: Vec<BatchItem<V, E>>, log: &Log<V, E>) -> Result<Vec<V>, E>
where
    V: Clone + Send + 'static,
    E: Send + 'static,
{
    let mut slots: Vec<Option<V>> = Vec::with_capacity(items.len());
    let mut in_flight = FuturesUnordered::new();
    for (index, item) in items.into_iter().enumerate() {
        match item {
            BatchItem::Value(value) => slots.push(Some(value)),
            BatchItem::Command(mut cmd) => {
                slots.push(None);
                in_flight.push(async move {
                    match cmd.execute().await {
                        Ok(value) => Ok((index, cmd, value)),
                        Err(err) => Err(err),
                    }
                });
            }
        }
    }

    while let Some(completed) = in_flight.next().await {
        // First failure wins; remaining results are never computed.
        let (index, cmd, value) = completed?;
        tracing::trace!(index, "batch item completed");
        log.lock().await.push(cmd);
        slots[index] = Some(value);
    }
    drop(in_flight);

    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("every batch slot filled on success"))
        .collect())
}

/// Compensate logged commands, most recently completed first.
async fn rollback<V, E>(log: &Log<V, E>) -> Result<(), E>
where
    V: Clone + Send + 'static,
    E: Send + 'static,
{
    let mut guard = log.lock().await;
    tracing::debug!(completed = guard.len(), "rolling back completed steps");

    for cmd in guard.iter_mut().rev() {
        if cmd.is_undoable() {
            cmd.undo().await?;
        }
    }
    Ok(())
}
