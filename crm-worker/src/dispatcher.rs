/// Background delivery of account notifications.
///
/// Request handlers hand a [`Notification`] to a [`NotificationDispatcher`] and
/// move on: [`NotificationDispatcher::dispatch`] never waits on delivery and
/// never reports delivery failure. A single worker task drains the queue and
/// runs each delivery on its own tokio task, capped by a semaphore.
///
/// Each delivery attempt is bounded by `send_timeout`. Retryable failures back
/// off exponentially up to `max_attempts`; the final failure is logged and the
/// notification dropped.
///
/// # Shutdown
///
/// The worker stops taking new notifications when the shutdown token is
/// cancelled or when every dispatcher clone has been dropped. Notifications
/// already queued are still delivered, and the join handle resolves once the
/// last delivery has finished.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use crm_worker::dispatcher::{DispatcherConfig, NotificationDispatcher};
/// use crm_worker::mailer::LogMailer;
/// use crm_worker::notification::{LinkBuilder, Notification};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let shutdown = CancellationToken::new();
/// let (dispatcher, worker) = NotificationDispatcher::spawn(
///     Arc::new(LogMailer::new()),
///     LinkBuilder::new("http://localhost:8000"),
///     DispatcherConfig::default(),
///     shutdown.clone(),
/// );
///
/// dispatcher.dispatch(Notification::Verification {
///     to: "ada@example.com".into(),
///     token: "abc".into(),
/// });
///
/// shutdown.cancel();
/// worker.await.ok();
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mailer::{MailError, Mailer};
use crate::notification::{LinkBuilder, Notification, OutgoingEmail};

/// Longest pause between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Notifications buffered before new ones are dropped
    pub queue_capacity: usize,
    /// Deliveries in flight at once
    pub max_concurrent: usize,
    /// Upper bound on a single attempt
    pub send_timeout: Duration,
    /// Attempts per notification, including the first
    pub max_attempts: u32,
    /// Pause after the first failed attempt; doubles each time
    pub initial_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_concurrent: 8,
            send_timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

impl DispatcherConfig {
    /// Pause after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }
}

/// How a single notification ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32 },
}

/// Cheap, cloneable handle onto the delivery queue.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Starts the delivery worker and returns a handle to feed it.
    pub fn spawn(
        mailer: Arc<dyn Mailer>,
        links: LinkBuilder,
        config: DispatcherConfig,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        info!(
            mailer = mailer.name(),
            max_attempts = config.max_attempts,
            send_timeout_ms = config.send_timeout.as_millis() as u64,
            "Starting notification dispatcher"
        );

        let worker = tokio::spawn(run(rx, mailer, links, config, shutdown));
        (Self { tx }, worker)
    }

    /// Queues `notification` without waiting.
    ///
    /// Returns `false` if it was dropped because the queue is full or the
    /// worker has stopped. Callers are not expected to act on this.
    pub fn dispatch(&self, notification: Notification) -> bool {
        let kind = notification.kind();
        match self.tx.try_send(notification) {
            Ok(()) => {
                debug!(kind, "Notification queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(kind, to = %n.recipient(), "Notification queue full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(kind, to = %n.recipient(), "Notification dispatcher stopped, dropping");
                false
            }
        }
    }

    pub fn send_verification(&self, email: &str, token: &str) -> bool {
        self.dispatch(Notification::Verification {
            to: email.to_string(),
            token: token.to_string(),
        })
    }

    pub fn send_password_reset(&self, email: &str, token: &str) -> bool {
        self.dispatch(Notification::PasswordReset {
            to: email.to_string(),
            token: token.to_string(),
        })
    }
}

async fn run(
    mut rx: mpsc::Receiver<Notification>,
    mailer: Arc<dyn Mailer>,
    links: LinkBuilder,
    config: DispatcherConfig,
    shutdown: CancellationToken,
) {
    let limiter = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let mut in_flight = JoinSet::new();
    let mut held = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Notification dispatcher shutting down");
                break;
            }

            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = result {
                    error!(error = %e, "Delivery task panicked");
                }
            }

            next = rx.recv() => {
                let Some(notification) = next else {
                    debug!("All dispatcher handles dropped");
                    break;
                };

                // Waiting for a free slot must not hide a shutdown request.
                let permit = tokio::select! {
                    permit = limiter.clone().acquire_owned() => permit.ok(),
                    _ = shutdown.cancelled() => None,
                };
                let Some(permit) = permit else {
                    info!("Notification dispatcher shutting down");
                    held = Some(notification);
                    break;
                };

                spawn_delivery(&mut in_flight, permit, notification, &mailer, &links, &config);
            }
        }
    }

    // Stop intake, then deliver whatever was accepted before the stop.
    rx.close();
    let mut flushed = 0usize;
    loop {
        let notification = match held.take() {
            Some(n) => n,
            None => match rx.recv().await {
                Some(n) => n,
                None => break,
            },
        };
        let Ok(permit) = limiter.clone().acquire_owned().await else {
            break;
        };
        spawn_delivery(&mut in_flight, permit, notification, &mailer, &links, &config);
        flushed += 1;
    }
    if flushed > 0 {
        info!(flushed, "Delivering notifications queued before shutdown");
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Delivery task panicked");
        }
    }

    info!("Notification dispatcher stopped");
}

fn spawn_delivery(
    in_flight: &mut JoinSet<()>,
    permit: OwnedSemaphorePermit,
    notification: Notification,
    mailer: &Arc<dyn Mailer>,
    links: &LinkBuilder,
    config: &DispatcherConfig,
) {
    let email = notification.render(links);
    let mailer = mailer.clone();
    let config = config.clone();
    in_flight.spawn(async move {
        let _permit = permit;
        deliver(mailer.as_ref(), &email, &config).await;
    });
}

/// Sends `email` with per-attempt timeout and exponential backoff.
///
/// Never returns an error: the outcome is logged and reported for callers that
/// care (tests).
pub async fn deliver(
    mailer: &dyn Mailer,
    email: &OutgoingEmail,
    config: &DispatcherConfig,
) -> DeliveryOutcome {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match timeout(config.send_timeout, mailer.send(email)).await {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(config.send_timeout)),
        };

        match result {
            Ok(()) => {
                info!(%email, attempt, "Email delivered");
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.backoff_for(attempt);
                warn!(
                    %email,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Email delivery failed, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => {
                error!(%email, attempt, error = %e, "Email delivery failed, giving up");
                return DeliveryOutcome::Failed { attempts: attempt };
            }
        }
    }
}
