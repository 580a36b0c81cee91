use crate::command::Command;

/// A resumable sequence of steps driven by [`sequential`](crate::sequential()).
///
/// A flow is the explicit state-machine rendition of a step generator: the
/// orchestrator repeatedly calls [`resume`](Flow::resume), handing in the
/// outcome of the previous step, and the flow answers with the next step or
/// with its final value. Between two resumptions the flow holds whatever
/// locals it needs.
///
/// `Flow` is implemented for any `FnMut(Resume) -> Result<Step, E>` closure,
/// so a stateful closure can serve as a flow without a named type:
///
/// ```
/// use undoable::{Command, Resume, Step, Finish, Yielded, sequential, invoke};
///
/// # futures::executor::block_on(async {
/// let mut total = sequential(|| {
///     let mut stage = 0;
///     move |input: Resume<i32, String>| {
///         stage += 1;
///         match stage {
///             1 => Ok(Step::Yield(Yielded::Command(Command::new(|| async { Ok(40) })))),
///             _ => Ok(Step::Done(Finish::Value(input.single()? + 2))),
///         }
///     }
/// });
/// assert_eq!(invoke(&mut total).await?, 42);
/// # Ok::<_, String>(())
/// # }).expect("flow runs to completion");
/// ```
pub trait Flow<V, E> {
    /// Advance the flow by one step.
    ///
    /// The first call receives [`Resume::Start`]; every later call receives
    /// the previous step's outcome, including [`Resume::Error`] when that
    /// step failed. A flow recovers from an injected error by returning
    /// another [`Step`]; returning `Err` re-raises it.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the flow; the orchestrator's execute fails
    /// with it after rolling back completed steps.
    fn resume(&mut self, input: Resume<V, E>) -> Result<Step<V, E>, E>;
}

impl<V, E, F> Flow<V, E> for F
where
    F: FnMut(Resume<V, E>) -> Result<Step<V, E>, E>,
{
    fn resume(&mut self, input: Resume<V, E>) -> Result<Step<V, E>, E> {
        self(input)
    }
}

/// What the orchestrator hands a flow on each resumption.
#[derive(Debug)]
pub enum Resume<V, E> {
    /// First resumption; no step has produced anything yet.
    Start,
    /// The previous step's value: a command result or a passed-through value.
    Value(V),
    /// A batch step's results, positionally mirroring the yielded batch.
    Values(Vec<V>),
    /// The previous step failed; the error is injected at the suspension
    /// point for the flow to recover from or re-raise.
    Error(E),
}

impl<V, E> Resume<V, E> {
    /// The threaded single value, re-raising an injected error.
    ///
    /// # Errors
    ///
    /// Returns the injected error when the previous step failed.
    ///
    /// # Panics
    ///
    /// Panics when no single value was threaded, i.e. on [`Resume::Start`]
    /// or on batch results.
    pub fn single(self) -> Result<V, E> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(err) => Err(err),
            Self::Start => panic!("no value threaded before the first yield"),
            Self::Values(_) => panic!("batch results where a single value was expected"),
        }
    }

    /// The threaded batch results, re-raising an injected error.
    ///
    /// # Errors
    ///
    /// Returns the injected error when the previous batch failed.
    ///
    /// # Panics
    ///
    /// Panics when the previous step was not a batch.
    pub fn batch(self) -> Result<Vec<V>, E> {
        match self {
            Self::Values(values) => Ok(values),
            Self::Error(err) => Err(err),
            Self::Start => panic!("no batch threaded before the first yield"),
            Self::Value(_) => panic!("single value where batch results were expected"),
        }
    }
}

/// A flow's answer to one resumption.
pub enum Step<V, E> {
    /// The flow suspended, yielding work or a value to thread through.
    Yield(Yielded<V, E>),
    /// The flow finished.
    Done(Finish<V, E>),
}

/// What a suspended flow yielded.
///
/// The typed union that keeps commands apart from plain values; plain values
/// pass through the orchestrator untouched.
pub enum Yielded<V, E> {
    /// One command to execute before the next resumption.
    Command(Command<V, E>),
    /// Several items to handle at once; command items run concurrently.
    Batch(Vec<BatchItem<V, E>>),
    /// A plain value, threaded back unchanged.
    Value(V),
}

/// One element of a batch step.
pub enum BatchItem<V, E> {
    /// Executed concurrently with the batch's other commands.
    Command(Command<V, E>),
    /// Passed through into the matching result position unchanged.
    Value(V),
}

/// A finished flow's final word.
///
/// A flow may finish with a last command still to run; its result then
/// becomes the orchestrator's result.
pub enum Finish<V, E> {
    /// Execute this command; its result is the final value.
    Command(Command<V, E>),
    /// The final value itself.
    Value(V),
}
