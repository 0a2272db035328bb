//! Bounded retry with feedback
//!
//! Each attempt gets an input string. The first attempt gets `first_input`;
//! every later attempt gets whatever `feedback` builds from the previous
//! attempt's rejection. Attempts resolve to `Ok(Ok(value))` (done),
//! `Ok(Err(rejection))` (retry if attempts remain) or `Err(fatal)` (stop
//! immediately, nothing retried).

use std::future::Future;

/// How a bounded retry ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_rejection: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Run `attempt` up to `max_attempts` times (at least once).
///
/// `attempt` receives the input for this try and its 1-based number.
pub async fn with_feedback<T, E, X, A, Fut, F>(
    first_input: String,
    max_attempts: u32,
    mut attempt: A,
    mut feedback: F,
) -> Result<RetryOutcome<T, E>, X>
where
    A: FnMut(String, u32) -> Fut,
    Fut: Future<Output = Result<Result<T, E>, X>>,
    F: FnMut(&E) -> String,
{
    let max_attempts = max_attempts.max(1);
    let mut input = first_input;
    let mut number = 1;

    loop {
        match attempt(input, number).await? {
            Ok(value) => {
                return Ok(RetryOutcome::Succeeded {
                    value,
                    attempts: number,
                });
            }
            Err(rejection) if number >= max_attempts => {
                return Ok(RetryOutcome::Exhausted {
                    last_rejection: rejection,
                    attempts: number,
                });
            }
            Err(rejection) => {
                input = feedback(&rejection);
                number += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;

    type Attempt = Result<Result<u32, String>, &'static str>;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let calls = RefCell::new(Vec::new());
        let outcome = with_feedback(
            "start".to_string(),
            3,
            |input, n| {
                calls.borrow_mut().push((input, n));
                async { Attempt::Ok(Ok(7)) }
            },
            |_e: &String| unreachable!("no feedback after success"),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RetryOutcome::Succeeded {
                value: 7,
                attempts: 1
            }
        );
        assert_eq!(calls.into_inner(), vec![("start".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_feedback_feeds_next_attempt() {
        let inputs = RefCell::new(Vec::new());
        let outcome = with_feedback(
            "start".to_string(),
            3,
            |input, n| {
                inputs.borrow_mut().push(input);
                async move {
                    if n < 3 {
                        Attempt::Ok(Err(format!("bad{n}")))
                    } else {
                        Attempt::Ok(Ok(n))
                    }
                }
            },
            |e: &String| format!("fix {e}"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.attempts(), 3);
        assert_eq!(inputs.into_inner(), vec!["start", "fix bad1", "fix bad2"]);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_last_rejection() {
        let outcome = with_feedback(
            String::new(),
            2,
            |_input, n| async move { Attempt::Ok(Err(format!("bad{n}"))) },
            |e: &String| e.clone(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_rejection: "bad2".to_string(),
                attempts: 2
            }
        );
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let calls = RefCell::new(0);
        let result = with_feedback(
            String::new(),
            5,
            |_input, _n| {
                *calls.borrow_mut() += 1;
                async { Attempt::Err("transport down") }
            },
            |e: &String| e.clone(),
        )
        .await;

        assert_eq!(result, Err("transport down"));
        assert_eq!(calls.into_inner(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let outcome = with_feedback(
            String::new(),
            0,
            |_input, _n| async { Attempt::Ok(Err("bad".to_string())) },
            |e: &String| e.clone(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.attempts(), 1);
    }

    proptest! {
        #[test]
        fn prop_attempt_count_is_bounded(max in 1u32..8, succeed_on in 1u32..12) {
            let calls = RefCell::new(0u32);
            let outcome = block_on(with_feedback(
                String::new(),
                max,
                |_input, n| {
                    *calls.borrow_mut() += 1;
                    async move {
                        if n == succeed_on { Attempt::Ok(Ok(n)) } else { Attempt::Ok(Err(String::new())) }
                    }
                },
                |e: &String| e.clone(),
            ))
            .unwrap();

            let calls = calls.into_inner();
            prop_assert_eq!(calls, succeed_on.min(max));
            prop_assert_eq!(outcome.attempts(), calls);
            prop_assert_eq!(
                matches!(outcome, RetryOutcome::Succeeded { .. }),
                succeed_on <= max
            );
        }
    }
}
