//! Fixed-size batching with bounded look-ahead.
//!
//! A [`BatchPipeline`] moves its items to a producer thread that cuts them into batches of
//! `batch_size`, assembles each batch with a caller-supplied closure, and hands the results
//! over a bounded channel. At most `prefetch` assembled batches wait for the consumer.
//!
//! ```ignore
//! let pipeline = BatchPipeline::inference(100);
//! for frames in pipeline.run(stream.frames, |frames| frames) {
//!     // 100, 100, ..., then the remainder
//! }
//! ```

use std::{
    sync::mpsc::{self, Receiver},
    thread::{self, JoinHandle},
};

/// Default number of batches prepared ahead of the consumer.
pub const DEFAULT_PREFETCH: usize = 2;

/// Default number of frames per batch during video inference.
pub const DEFAULT_INFERENCE_BATCH_SIZE: usize = 100;

/// Number of batches of `batch_size` needed for `items` items, the last possibly partial.
pub const fn num_batches(items: usize, batch_size: usize) -> usize {
    items.div_ceil(if batch_size == 0 { 1 } else { batch_size })
}

/// Order-preserving batching of in-memory items, such as the frames of one video.
///
/// Training splits are batched by burn's data loader instead; see
/// [`dataloaders`](crate::loader::dataloaders).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPipeline {
    batch_size: usize,
    prefetch: usize,
}

impl BatchPipeline {
    /// A pipeline yielding batches of `batch_size` items in input order.
    pub fn inference(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            prefetch: DEFAULT_PREFETCH,
        }
    }

    /// Sets the number of batches prepared ahead of the consumer.
    pub const fn with_prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Items per batch; always at least one.
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches prepared ahead of the consumer.
    pub const fn prefetch(&self) -> usize {
        self.prefetch
    }

    /// Number of batches a run over `items` items yields.
    pub const fn num_batches(&self, items: usize) -> usize {
        num_batches(items, self.batch_size)
    }

    /// Batches `items` on a producer thread, passing every batch through `assemble`.
    ///
    /// Batches are yielded in input order. Dropping the returned iterator early stops the
    /// producer.
    pub fn run<T, U, F>(&self, items: Vec<T>, mut assemble: F) -> Prefetch<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: FnMut(Vec<T>) -> U + Send + 'static,
    {
        let remaining = self.num_batches(items.len());
        let batch_size = self.batch_size;
        let (sender, receiver) = mpsc::sync_channel(self.prefetch);

        tracing::debug!(
            items = items.len(),
            batches = remaining,
            batch_size,
            prefetch = self.prefetch,
            "starting batch pipeline"
        );

        let handle = thread::spawn(move || {
            let mut items = items.into_iter();
            for index in 0usize.. {
                let batch: Vec<T> = items.by_ref().take(batch_size).collect();
                if batch.is_empty() {
                    break;
                }
                let len = batch.len();
                // Receiver dropped: the consumer stopped early.
                if sender.send(assemble(batch)).is_err() {
                    break;
                }
                tracing::trace!(batch = index, len, "batch queued");
            }
        });

        Prefetch {
            receiver: Some(receiver),
            handle: Some(handle),
            remaining,
        }
    }
}

/// Iterator over batches assembled ahead of time by a [`BatchPipeline`].
pub struct Prefetch<U> {
    receiver: Option<Receiver<U>>,
    handle: Option<JoinHandle<()>>,
    remaining: usize,
}

impl<U> Prefetch<U> {
    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    }
}

impl<U> Iterator for Prefetch<U> {
    type Item = U;

    fn next(&mut self) -> Option<U> {
        let receiver = self.receiver.as_ref()?;
        match receiver.recv() {
            Ok(batch) => {
                self.remaining = self.remaining.saturating_sub(1);
                Some(batch)
            }
            Err(_) => {
                // Producer finished or panicked.
                self.remaining = 0;
                self.receiver = None;
                self.join();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<U> Drop for Prefetch<U> {
    fn drop(&mut self) {
        // Closing the channel first makes a blocked producer give up.
        self.receiver = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("batch producer panicked after the consumer stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;

    #[test]
    fn batches_preserve_order_and_keep_partial_tail() {
        let pipeline = BatchPipeline::inference(100);

        let batches: Vec<Vec<usize>> = pipeline.run((0..257).collect(), |batch| batch).collect();

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, [100, 100, 57]);
        let flattened: Vec<usize> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, (0..257).collect::<Vec<_>>());
    }

    #[test]
    fn num_batches_rounds_up() {
        assert_eq!(num_batches(257, 100), 3);
        assert_eq!(num_batches(200, 100), 2);
        assert_eq!(num_batches(0, 100), 0);
        assert_eq!(BatchPipeline::inference(32).num_batches(10000), 313);
    }

    #[test]
    fn size_hint_counts_down() {
        let mut batches = BatchPipeline::inference(4).run((0..10).collect::<Vec<u8>>(), |b| b);

        assert_eq!(batches.size_hint(), (3, Some(3)));
        batches.next();
        assert_eq!(batches.size_hint(), (2, Some(2)));
    }

    #[test]
    fn assemble_runs_once_per_batch() {
        let sums: Vec<u32> = BatchPipeline::inference(3)
            .with_prefetch(0)
            .run(vec![1, 2, 3, 4, 5], |batch: Vec<u32>| batch.iter().sum())
            .collect();

        assert_eq!(sums, [6, 9]);
    }

    #[test]
    fn dropping_early_stops_the_producer() {
        let mut batches = BatchPipeline::inference(1)
            .with_prefetch(1)
            .run((0..10_000).collect::<Vec<u32>>(), |batch| batch);

        assert_eq!(batches.next(), Some(vec![0]));
        drop(batches);
    }

    #[test]
    fn zero_batch_size_is_raised_to_one() {
        let pipeline = BatchPipeline::inference(0);

        assert_eq!(pipeline.batch_size(), 1);
        assert_eq!(pipeline.run(vec!['a', 'b'], |b| b).count(), 2);
    }

    fn assembled_after_pause(prefetch: usize) -> usize {
        let assembled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&assembled);
        let mut batches = BatchPipeline::inference(1)
            .with_prefetch(prefetch)
            .run((0..1000).collect::<Vec<u32>>(), move |batch| {
                counter.fetch_add(1, Ordering::SeqCst);
                batch
            });

        assert_eq!(batches.next(), Some(vec![0]));
        thread::sleep(Duration::from_millis(200));
        assembled.load(Ordering::SeqCst)
    }

    #[test]
    fn look_ahead_is_bounded_by_prefetch() {
        // One batch consumed, `prefetch` queued and one blocked in `send`.
        for prefetch in [0, 1, 4] {
            let assembled = assembled_after_pause(prefetch);
            assert!(
                assembled <= prefetch + 2,
                "prefetch {prefetch}: {assembled} batches assembled"
            );
            assert!(assembled >= 1);
        }
    }

    #[test]
    fn dropping_after_producer_panic_does_not_panic() {
        let mut batches = BatchPipeline::inference(1)
            .with_prefetch(0)
            .run(vec![1u32, 2, 3], |batch| {
                assert!(batch[0] < 2, "bad batch");
                batch
            });

        assert_eq!(batches.next(), Some(vec![1]));
        thread::sleep(Duration::from_millis(50));
        drop(batches);
    }
}
