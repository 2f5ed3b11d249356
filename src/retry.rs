// ABOUTME: Bounded, unconditional retry for flaky daemon calls.
// ABOUTME: No backoff; every error is retried until the budget runs out.

use std::future::Future;
use tracing::{debug, warn};

/// Why a retried operation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The budget was zero and the only attempt failed.
    #[error(transparent)]
    Failed(E),

    #[error("retry budget of {budget} exhausted: {last}")]
    Exhausted {
        budget: u32,
        #[source]
        last: E,
    },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// The last error the operation returned.
    pub fn into_last(self) -> E {
        match self {
            RetryError::Failed(e) | RetryError::Exhausted { last: e, .. } => e,
        }
    }

    pub fn last(&self) -> &E {
        match self {
            RetryError::Failed(e) | RetryError::Exhausted { last: e, .. } => e,
        }
    }
}

/// Run `op` until it succeeds or the retry budget is spent.
///
/// With a budget of 0 the first error is returned as [`RetryError::Failed`].
/// Otherwise the attempt counter starts at 0 and is bumped after each
/// failure; once a failure is observed with the counter already past the
/// budget the call gives up. An operation that never succeeds is therefore
/// invoked `budget + 2` times.
pub async fn retry<T, E, F, Fut>(label: &str, budget: u32, mut op: F) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(op = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if budget == 0 => return Err(RetryError::Failed(e)),
            Err(e) if attempt > budget => {
                warn!(op = label, budget, error = %e, "retry budget exhausted");
                return Err(RetryError::Exhausted { budget, last: e });
            }
            Err(e) => {
                attempt += 1;
                warn!(op = label, attempt, budget, error = %e, "attempt failed, retrying");
            }
        }
    }
}
