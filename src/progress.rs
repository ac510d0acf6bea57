//! Optional progress reporting for long batch loops.
//!
//! With the `progress-bars` feature this draws an indicatif bar on stderr;
//! without it every method is a no-op.

#[cfg(feature = "progress-bars")]
use indicatif::{ProgressBar, ProgressStyle};

/// Progress over a known number of units. Safe to update from worker threads.
pub(crate) struct Progress {
    #[cfg(feature = "progress-bars")]
    bar: ProgressBar,
}

impl Progress {
    pub(crate) fn new(_len: usize, _message: &str) -> Self {
        #[cfg(feature = "progress-bars")]
        {
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            let bar = ProgressBar::new(_len as u64)
                .with_style(style)
                .with_message(_message.to_string());
            Self { bar }
        }

        #[cfg(not(feature = "progress-bars"))]
        Self {}
    }

    pub(crate) fn inc(&self) {
        #[cfg(feature = "progress-bars")]
        self.bar.inc(1);
    }

    pub(crate) fn finish(&self) {
        #[cfg(feature = "progress-bars")]
        self.bar.finish_and_clear();
    }
}
