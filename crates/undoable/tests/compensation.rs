//! Integration tests for rollback behavior on failure.

use std::sync::Arc;
use std::sync::Mutex;

use undoable::{BatchItem, Command, Finish, Resume, Step, Yielded, sequential};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: impl Into<String>) {
    journal.lock().expect("journal").push(entry.into());
}

fn tracked(name: &'static str, journal: &Journal) -> Command<i32, TestError> {
    let exec_journal = Arc::clone(journal);
    let undo_journal = Arc::clone(journal);
    Command::undoable(
        move || {
            let journal = Arc::clone(&exec_journal);
            async move {
                record(&journal, format!("exec {name}"));
                Ok(1)
            }
        },
        move |_result| {
            let journal = Arc::clone(&undo_journal);
            async move {
                record(&journal, format!("undo {name}"));
                Ok(())
            }
        },
    )
}

fn failing(name: &'static str, journal: &Journal) -> Command<i32, TestError> {
    let exec_journal = Arc::clone(journal);
    let undo_journal = Arc::clone(journal);
    Command::undoable(
        move || {
            let journal = Arc::clone(&exec_journal);
            async move {
                record(&journal, format!("exec {name}"));
                Err(TestError(format!("{name} failed")))
            }
        },
        move |_result| {
            let journal = Arc::clone(&undo_journal);
            async move {
                record(&journal, format!("undo {name}"));
                Ok(())
            }
        },
    )
}

#[tokio::test]
async fn third_of_four_steps_failing_rolls_back_the_first_two() {
    let journal: Journal = Arc::default();

    let flow_journal = Arc::clone(&journal);
    let mut composed = sequential(move || {
        let journal = Arc::clone(&flow_journal);
        let mut stage = 0;
        move |input: Resume<i32, TestError>| {
            stage += 1;
            match stage {
                1 => Ok(Step::Yield(Yielded::Command(tracked("c1", &journal)))),
                2 => {
                    input.single()?;
                    Ok(Step::Yield(Yielded::Command(tracked("c2", &journal))))
                }
                3 => {
                    input.single()?;
                    Ok(Step::Yield(Yielded::Command(failing("c3", &journal))))
                }
                4 => {
                    input.single()?;
                    Ok(Step::Yield(Yielded::Command(tracked("c4", &journal))))
                }
                _ => Ok(Step::Done(Finish::Value(input.single()?))),
            }
        }
    });

    let err = composed.execute().await.expect_err("composite should fail");
    assert_eq!(err, TestError("c3 failed".into()));

    // c3 compensated itself, then the rollback walked completed steps in
    // reverse completion order. c4 never ran.
    assert_eq!(
        *journal.lock().expect("journal"),
        vec![
            "exec c1", "exec c2", "exec c3", "undo c3", "undo c2", "undo c1",
        ]
    );
}

#[tokio::test]
async fn failing_compensation_aborts_the_remaining_rollback() {
    let journal: Journal = Arc::default();

    let bad_undo_journal = Arc::clone(&journal);
    let flow_journal = Arc::clone(&journal);
    let mut composed = sequential(move || {
        let journal = Arc::clone(&flow_journal);
        let bad_undo_journal = Arc::clone(&bad_undo_journal);
        let mut stage = 0;
        move |input: Resume<i32, TestError>| {
            stage += 1;
            match stage {
                1 => Ok(Step::Yield(Yielded::Command(tracked("c1", &journal)))),
                2 => {
                    input.single()?;
                    let exec_journal = Arc::clone(&bad_undo_journal);
                    let cmd = Command::undoable(
                        move || {
                            let journal = Arc::clone(&exec_journal);
                            async move {
                                record(&journal, "exec c2");
                                Ok(2)
                            }
                        },
                        |_result| async { Err(TestError("c2 undo failed".into())) },
                    );
                    Ok(Step::Yield(Yielded::Command(cmd)))
                }
                3 => {
                    input.single()?;
                    Ok(Step::Yield(Yielded::Command(failing("c3", &journal))))
                }
                _ => Ok(Step::Done(Finish::Value(input.single()?))),
            }
        }
    });

    let err = composed.execute().await.expect_err("composite should fail");

    // Rollback is best-effort and non-atomic: c2's compensation rejected,
    // which aborted the walk before c1 and surfaced in place of c3's error.
    assert_eq!(err, TestError("c2 undo failed".into()));
    assert_eq!(
        *journal.lock().expect("journal"),
        vec!["exec c1", "exec c2", "exec c3", "undo c3"]
    );
}

#[tokio::test]
async fn first_step_failure_requires_no_rollback() {
    let journal: Journal = Arc::default();

    let flow_journal = Arc::clone(&journal);
    let mut composed = sequential(move || {
        let journal = Arc::clone(&flow_journal);
        let mut stage = 0;
        move |input: Resume<i32, TestError>| {
            stage += 1;
            match stage {
                1 => Ok(Step::Yield(Yielded::Command(failing("c1", &journal)))),
                _ => Ok(Step::Done(Finish::Value(input.single()?))),
            }
        }
    });

    let err = composed.execute().await.expect_err("composite should fail");
    assert_eq!(err, TestError("c1 failed".into()));
    assert_eq!(
        *journal.lock().expect("journal"),
        vec!["exec c1", "undo c1"]
    );
}

#[tokio::test]
async fn batch_failure_compensates_completed_batch_siblings() {
    let journal: Journal = Arc::default();

    let flow_journal = Arc::clone(&journal);
    let mut composed = sequential(move || {
        let journal = Arc::clone(&flow_journal);
        let mut stage = 0;
        move |input: Resume<i32, TestError>| {
            stage += 1;
            match stage {
                1 => {
                    let slow_journal = Arc::clone(&journal);
                    let slow_failing = Command::new(move || {
                        let journal = Arc::clone(&slow_journal);
                        async move {
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            record(&journal, "exec bad");
                            Err(TestError("bad failed".into()))
                        }
                    });
                    Ok(Step::Yield(Yielded::Batch(vec![
                        BatchItem::Command(tracked("a", &journal)),
                        BatchItem::Command(tracked("b", &journal)),
                        BatchItem::Command(slow_failing),
                    ])))
                }
                _ => Ok(Step::Done(Finish::Value(input.single()?))),
            }
        }
    });

    let err = composed.execute().await.expect_err("composite should fail");
    assert_eq!(err, TestError("bad failed".into()));

    // a and b completed before the batch failed, so both were compensated.
    let journal = journal.lock().expect("journal");
    assert_eq!(journal.iter().filter(|e| *e == "undo a").count(), 1);
    assert_eq!(journal.iter().filter(|e| *e == "undo b").count(), 1);
}
