use std::io::Write;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Completion estimate for a generation call, scaled by payload size.
pub fn estimate_for_payload(line_count: usize) -> Duration {
    Duration::from_secs((15 + line_count as u64 / 5).max(20))
}

/// Cosmetic spinner running concurrently with a blocking call. Purely
/// observational: it shares no state with the pipeline, and
/// [`ProgressTicker::finish`] stops and joins it so no background
/// activity outlives the call it decorates.
pub struct ProgressTicker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(estimate: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut frame = 0usize;

            loop {
                if *stopped.borrow() {
                    break;
                }

                let elapsed = started.elapsed().as_secs();
                let total = estimate.as_secs().max(1);
                let percent = ((elapsed * 100) / total).min(99);
                let remaining = total.saturating_sub(elapsed);

                eprint!(
                    "\r  {} {}% | ETC: {}s remaining... ",
                    FRAMES[frame % FRAMES.len()],
                    percent,
                    remaining
                );
                let _ = std::io::stderr().flush();
                frame += 1;

                tokio::select! {
                    _ = stopped.changed() => {}
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }

            eprint!("\r{}\r", " ".repeat(60));
            let _ = std::io::stderr().flush();
        });

        Self { stop, handle }
    }

    /// Stops the spinner and waits for it to clear its line. A panicked
    /// or delayed ticker never affects the caller's result.
    pub async fn finish(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}
