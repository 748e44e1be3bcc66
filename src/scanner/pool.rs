//! Chunked executor: bounded concurrency with a fixed pause between chunks

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Runs work in fixed-size chunks.
///
/// Items within a chunk run concurrently; the next chunk starts only after
/// every item of the current one has finished, followed by `chunk_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedExecutor {
    chunk_size: usize,
    chunk_delay: Duration,
}

impl ChunkedExecutor {
    /// `chunk_size` of zero is treated as one
    pub fn new(chunk_size: usize, chunk_delay: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_delay,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_delay(&self) -> Duration {
        self.chunk_delay
    }

    /// Number of chunks needed for `items` inputs
    pub fn chunk_count(&self, items: usize) -> usize {
        (items + self.chunk_size - 1) / self.chunk_size
    }

    /// Apply `task` to every item; output order matches input order
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, mut task: F) -> Vec<T>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = T>,
    {
        let total_chunks = self.chunk_count(items.len());
        let mut results = Vec::with_capacity(items.len());
        let mut items = items.into_iter().peekable();
        let mut chunk_index = 0;

        while items.peek().is_some() {
            if chunk_index > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }

            let chunk: Vec<Fut> = items.by_ref().take(self.chunk_size).map(&mut task).collect();
            log::debug!("Running chunk {}/{} ({} items)", chunk_index + 1, total_chunks, chunk.len());
            results.extend(join_all(chunk).await);
            chunk_index += 1;
        }

        results
    }
}

impl Default for ChunkedExecutor {
    fn default() -> Self {
        Self::new(20, Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_chunk_count() {
        let executor = ChunkedExecutor::new(20, Duration::ZERO);
        assert_eq!(executor.chunk_count(0), 0);
        assert_eq!(executor.chunk_count(20), 1);
        assert_eq!(executor.chunk_count(21), 2);
        assert_eq!(ChunkedExecutor::new(0, Duration::ZERO).chunk_size(), 1);
    }

    #[test]
    fn test_results_keep_input_order() {
        let executor = ChunkedExecutor::new(3, Duration::ZERO);
        let results = tokio_test::block_on(executor.run((0..10u64).collect(), |i| async move {
            // Later items finish first inside a chunk
            tokio::time::sleep(Duration::from_millis(10 - i)).await;
            i * 2
        }));
        assert_eq!(results, (0..10u64).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_chunk_size() {
        let executor = ChunkedExecutor::new(4, Duration::ZERO);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        executor
            .run((0..17).collect(), |_: i32| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_chunk_barrier() {
        // Every item of chunk N must finish before any item of chunk N+1 starts
        let executor = ChunkedExecutor::new(2, Duration::ZERO);
        let finished = Arc::new(AtomicUsize::new(0));

        let seen_at_start = executor
            .run((0..6usize).collect(), |i| {
                let finished = finished.clone();
                async move {
                    let before = finished.load(Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(if i % 2 == 0 { 15 } else { 1 })).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    (i, before)
                }
            })
            .await;

        for (i, before) in seen_at_start {
            assert_eq!(before, (i / 2) * 2, "item {} started early", i);
        }
    }

    #[tokio::test]
    async fn test_delay_between_chunks() {
        let executor = ChunkedExecutor::new(2, Duration::from_millis(50));
        let start = Instant::now();
        executor.run((0..6).collect(), |i: i32| async move { i }).await;

        // Three chunks, two pauses, no pause after the last chunk
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150 + 200));
    }
}
