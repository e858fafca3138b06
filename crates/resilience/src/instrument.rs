//! Explicit duration logging for wrapped operations.
//!
//! Instrumentation is plain higher-order composition: wrap the future, log
//! how long it took. No attribute machinery.

use std::future::Future;
use std::time::Instant;

/// Run `operation` and log its wall-clock duration under `name`.
pub async fn timed<F, T>(name: &str, operation: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let output = operation.await;
    log::debug!("{name} completed in {:?}", start.elapsed());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_the_result_through() {
        let value = timed("addition", async { 2 + 2 }).await;
        assert_eq!(value, 4);
    }
}
