use futures::FutureExt;
use futures::future::BoxFuture;

type ExecuteFn<T, E> = Box<dyn FnMut() -> BoxFuture<'static, Result<T, E>> + Send>;
type UndoFn<T, E> = Box<dyn FnMut(Option<T>) -> BoxFuture<'static, Result<(), E>> + Send>;

/// One asynchronous unit of work together with its result slot and an
/// optional compensating action.
///
/// A command starts with an empty result. Executing it runs the wrapped
/// closure, awaits it, and stores the produced value; the value stays
/// available for the compensating action, which receives it when the command
/// is undone.
///
/// Commands are closed under composition: [`parallel`](crate::parallel()) and
/// [`sequential`](crate::sequential()) both return ordinary `Command` values,
/// so composites nest arbitrarily.
pub struct Command<T, E> {
    result: Option<T>,
    execute: ExecuteFn<T, E>,
    undo: Option<UndoFn<T, E>>,
}

impl<T, E> Command<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Create a command without a compensating action.
    #[must_use]
    pub fn new<F, Fut>(mut execute: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            result: None,
            execute: Box::new(move || execute().boxed()),
            undo: None,
        }
    }

    /// Create a command with a compensating action.
    ///
    /// The undo closure receives the command's current result: the value the
    /// execute closure produced, or `None` if it never succeeded.
    #[must_use]
    pub fn undoable<F, Fut, U, UFut>(execute: F, mut undo: U) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        U: FnMut(Option<T>) -> UFut + Send + 'static,
        UFut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let mut cmd = Self::new(execute);
        cmd.undo = Some(Box::new(move |result| undo(result).boxed()));
        cmd
    }

    /// Run the command's unit of work and store its value in the result slot.
    ///
    /// The library invokes each command at most once; re-executing an
    /// already-executed command is unsupported.
    ///
    /// # Errors
    ///
    /// If the unit of work fails, the command first runs its own compensating
    /// action (when present) and then returns the original error. An error
    /// from the compensating action itself is not suppressed and surfaces in
    /// place of the original one.
    pub async fn execute(&mut self) -> Result<T, E> {
        match (self.execute)().await {
            Ok(value) => {
                self.result = Some(value.clone());
                Ok(value)
            }
            Err(err) => {
                if let Some(undo) = self.undo.as_mut() {
                    tracing::debug!("command failed, running its compensating action");
                    undo(self.result.clone()).await?;
                }
                Err(err)
            }
        }
    }

    /// Run the compensating action with the current result.
    ///
    /// A no-op for commands constructed without one.
    ///
    /// # Errors
    ///
    /// Propagates any error from the compensating action unchanged.
    pub async fn undo(&mut self) -> Result<(), E> {
        match self.undo.as_mut() {
            Some(undo) => undo(self.result.clone()).await,
            None => Ok(()),
        }
    }

    /// Whether this command carries a compensating action.
    #[must_use]
    pub fn is_undoable(&self) -> bool {
        self.undo.is_some()
    }

    /// The value produced by the last successful execute, if any.
    #[must_use]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }
}

/// Execute a command and hand back its result.
///
/// # Errors
///
/// Errors from the command's execute path propagate unchanged.
pub async fn invoke<T, E>(cmd: &mut Command<T, E>) -> Result<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    cmd.execute().await
}
