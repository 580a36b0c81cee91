use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Mutex;

use crate::command::Command;

/// Combine a fixed list of independent commands into one.
///
/// The composite's execute runs every sub-command concurrently and, on full
/// success, produces their results in input order regardless of which
/// finished first. Each sub-command is recorded in a rollback log as it
/// completes; if any sub-command fails, the composite fails with that error
/// and compensates the already-completed ones, most recently completed
/// first. The failed sub-command has already compensated itself by then, so
/// nested composites compensate in layers.
///
/// Rollback is best-effort: an error from one compensating action aborts
/// the remaining walk.
///
/// An empty list executes trivially with an empty result.
#[must_use]
pub fn parallel<T, E>(cmds: impl IntoIterator<Item = Command<T, E>>) -> Command<Vec<T>, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    let state = Arc::new(Mutex::new(State {
        cmds: cmds.into_iter().collect(),
        log: Vec::new(),
    }));
    let undo_state = Arc::clone(&state);
    Command::undoable(
        move || {
            let state = Arc::clone(&state);
            async move { run_all(&state).await }
        },
        move |_results| {
            let state = Arc::clone(&undo_state);
            async move { rollback(&state).await }
        },
    )
}

struct State<T, E> {
    cmds: Vec<Command<T, E>>,
    // Indexes into `cmds`, pushed as each sub-command completes. Walked in
    // reverse for rollback, so compensation runs most recently completed
    // first, never in input order.
    log: Vec<usize>,
}

async fn run_all<T, E>(state: &Mutex<State<T, E>>) -> Result<Vec<T>, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    let mut guard = state.lock().await;
    let State { cmds, log } = &mut *guard;
    log.clear();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(cmds.len()).collect();
    let mut in_flight: FuturesUnordered<_> = cmds
        .iter_mut()
        .enumerate()
        .map(|(index, cmd)| async move { cmd.execute().await.map(|value| (index, value)) })
        .collect();

    while let Some(completed) = in_flight.next().await {
        // The first failure surfaces as-is; sub-commands that already
        // completed stay in the log and remain undoable.
        let (index, value) = completed?;
        tracing::trace!(index, "sub-command completed");
        log.push(index);
        slots[index] = Some(value);
    }
    drop(in_flight);

    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("every sub-command completed on success"))
        .collect())
}

async fn rollback<T, E>(state: &Mutex<State<T, E>>) -> Result<(), E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    let mut guard = state.lock().await;
    let State { cmds, log } = &mut *guard;
    tracing::debug!(completed = log.len(), "rolling back completed sub-commands");

    for &index in log.iter().rev() {
        if cmds[index].is_undoable() {
            cmds[index].undo().await?;
        }
    }
    Ok(())
}
