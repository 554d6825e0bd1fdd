use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Delay before the next pass when the previous one ran into a rate limit.
pub const RETRY_COOLDOWN: Duration = Duration::from_secs(10);

pub const MIN_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolicy {
    /// One pass over every repository, then stop.
    Once,
    /// Passes until cancelled.
    Forever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
}

impl Backoff {
    pub fn delay(&self) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    pub retry: Backoff,
    pub show_countdown: bool,
}

impl Schedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            retry: Backoff::Fixed(RETRY_COOLDOWN),
            show_countdown: false,
        }
    }

    pub fn with_countdown(mut self, show: bool) -> Self {
        self.show_countdown = show;
        self
    }

    /// Sleeps for `duration` unless `cancel` fires first. Returns `false`
    /// when cancelled.
    pub async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        let countdown = self.show_countdown.then(|| Countdown::start(duration));

        let completed = tokio::select! {
            _ = sleep(duration) => true,
            _ = cancel.cancelled() => false,
            _ = tick(countdown.as_ref()) => true,
        };

        if let Some(countdown) = countdown {
            countdown.finish();
        }
        completed
    }
}

async fn tick(countdown: Option<&Countdown>) {
    match countdown {
        Some(countdown) => countdown.run().await,
        None => std::future::pending().await,
    }
}

/// Seconds-remaining spinner shown between passes.
struct Countdown {
    bar: ProgressBar,
    total: Duration,
}

impl Countdown {
    fn start(total: Duration) -> Self {
        let bar = ProgressBar::new(total.as_secs());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} next check in {msg} [{bar:30.cyan/blue}]")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(format!("{}s", total.as_secs()));
        Self { bar, total }
    }

    /// Updates once per second; never completes on its own before the sleep
    /// it accompanies.
    async fn run(&self) {
        let mut elapsed = 0;
        loop {
            sleep(Duration::from_secs(1)).await;
            elapsed += 1;
            let left = self.total.as_secs().saturating_sub(elapsed);
            self.bar.set_position(elapsed.min(self.total.as_secs()));
            self.bar.set_message(format!("{}s", left));
            if left == 0 {
                std::future::pending::<()>().await;
            }
        }
    }

    fn finish(self) {
        self.bar.finish_and_clear();
    }
}
