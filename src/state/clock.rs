use std::{future::Future, time::Duration};

use tokio::{sync::watch, time::sleep};

/// Single-shot deadline clock armed once per question.
///
/// The armed callback runs exactly once when the deadline elapses, unless the
/// clock is cancelled first. Cancellation is level-triggered through a watch
/// channel, so calling [`QuestionClock::cancel`] repeatedly or after expiry is
/// a no-op, and dropping the handle cancels a still-pending deadline as well.
///
/// The clock itself does not guarantee exactly-once question resolution; the
/// session's `resolved` flag does. The callback must therefore re-check
/// session state under the session lock.
#[derive(Debug)]
pub struct QuestionClock {
    cancel: watch::Sender<bool>,
}

impl QuestionClock {
    /// Start a deadline of `delay`, invoking `on_expire` when it elapses.
    pub fn arm<F>(delay: Duration, on_expire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => on_expire.await,
                _ = cancelled(&mut cancel_rx) => {}
            }
        });

        Self { cancel: cancel_tx }
    }

    /// Prevent a still-pending deadline from firing.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Resolve once the clock is cancelled, either explicitly or because the
/// handle was dropped.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counting_clock(delay_secs: u64) -> (QuestionClock, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let clock = QuestionClock::arm(Duration::from_secs(delay_secs), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        (clock, fired)
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn fires_exactly_once_after_the_deadline() {
        let (_clock, fired) = counting_clock(30);

        sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cancel_prevents_the_callback() {
        let (clock, fired) = counting_clock(30);

        clock.cancel();
        sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cancel_is_idempotent_and_safe_after_expiry() {
        let (clock, fired) = counting_clock(1);

        sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        clock.cancel();
        clock.cancel();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn dropping_the_handle_cancels_the_deadline() {
        let (clock, fired) = counting_clock(30);

        drop(clock);
        sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
