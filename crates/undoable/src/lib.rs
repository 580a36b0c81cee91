//! Composable asynchronous commands with automatic compensation on failure.
//!
//! This crate provides a small saga-style orchestration primitive: wrap units
//! of work as [`Command`] values carrying an optional compensating action,
//! then compose them — [`parallel()`] over a fixed list run concurrently, or
//! [`sequential()`] over a [`Flow`] that decides each step from the results of
//! the previous ones. If any step fails, everything already completed is
//! compensated in reverse completion order before the original error
//! surfaces. Composition is closed: both composers return ordinary commands,
//! so composites nest.
//!
//! ```
//! use undoable::{Command, invoke, parallel};
//!
//! # futures::executor::block_on(async {
//! let reserve = Command::undoable(
//!     || async { Ok::<_, String>(10) },
//!     |_seats| async { Ok(()) },
//! );
//! let charge = Command::undoable(
//!     || async { Ok::<_, String>(250) },
//!     |_amount| async { Ok(()) },
//! );
//!
//! let mut booking = parallel(vec![reserve, charge]);
//! assert_eq!(invoke(&mut booking).await?, vec![10, 250]);
//! # Ok::<_, String>(())
//! # }).expect("booking succeeds");
//! ```
//!
//! Errors are never wrapped or swallowed: a failed composite surfaces the
//! original error value of the step that failed. Rollback is best-effort and
//! non-atomic; a failing compensating action aborts the remaining walk.

mod command;
mod flow;
mod parallel;
mod sequential;

pub use command::{Command, invoke};
pub use flow::{BatchItem, Finish, Flow, Resume, Step, Yielded};
pub use parallel::parallel;
pub use sequential::sequential;
