// s3-offload/src/output/progress.rs
use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress notifications: one `start`, one `advance` per item, one `finish`.
pub trait ProgressObserver: Send {
    fn start(&mut self, len: Option<u64>);

    fn advance(&mut self);

    fn finish(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn start(&mut self, _len: Option<u64>) {}

    fn advance(&mut self) {}

    fn finish(&mut self) {}
}

/// Draws a bar when the length is known and a spinner otherwise.
#[derive(Debug, Default)]
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl ProgressObserver for IndicatifProgress {
    fn start(&mut self, len: Option<u64>) {
        let bar = match len {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}]")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            ),
            None => ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} {pos} [{elapsed_precise}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            ),
        };
        self.bar = Some(bar);
    }

    fn advance(&mut self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

/// Handle for one tracked sequence. Finishes its observer when dropped.
pub struct Progress {
    observer: Box<dyn ProgressObserver>,
    finished: bool,
}

impl Progress {
    pub(crate) fn start(mut observer: Box<dyn ProgressObserver>, len: Option<u64>) -> Self {
        observer.start(len);
        Self {
            observer,
            finished: false,
        }
    }

    pub fn advance(&mut self) {
        self.observer.advance();
    }

    pub fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.observer.finish();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Iterator adapter that reports each yielded item to a [`Progress`].
pub struct TrackProgress<I> {
    inner: I,
    progress: Progress,
}

impl<I> TrackProgress<I> {
    pub(crate) fn new(inner: I, progress: Progress) -> Self {
        Self { inner, progress }
    }
}

impl<I: Iterator> Iterator for TrackProgress<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(item) => {
                self.progress.advance();
                Some(item)
            }
            None => {
                self.progress.finish();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
