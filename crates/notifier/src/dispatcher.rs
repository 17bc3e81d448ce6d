//! Bulk notification dispatcher.
//!
//! Every recipient gets one attempt per [`Channel`]. Attempts run as separate
//! tasks bounded by a shared semaphore; each one converts its own error,
//! timeout or panic into a failed outcome so nothing escapes to sibling
//! attempts. `dispatch` returns once all attempts have resolved.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::NotifierError;
use crate::provider::MessagingProvider;
use crate::report::{AttemptOutcome, Channel, ChannelOutcome, DispatchReport, RecipientReport};

/// A phone contact point in local format (digits only, no country code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub mobile: String,
}

impl Recipient {
    pub fn new(mobile: impl Into<String>) -> Self {
        Self {
            mobile: mobile.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Prefixed to every local number, e.g. `+91`
    pub country_code: String,
    /// Sender address for the SMS channel
    pub sms_from: String,
    /// Sender address for the WhatsApp channel
    pub whatsapp_from: String,
    /// Ceiling on attempts in flight at once
    pub max_concurrency: usize,
    /// Upper bound on a single provider call
    pub attempt_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            country_code: "+91".to_string(),
            sms_from: String::new(),
            whatsapp_from: String::new(),
            max_concurrency: 16,
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

pub struct Dispatcher {
    provider: Arc<dyn MessagingProvider>,
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn MessagingProvider>, config: DispatcherConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            provider,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Send `body` to every recipient over both channels.
    ///
    /// Rejects an empty recipient list or a blank body before any provider
    /// call. Otherwise always returns a report with one entry per recipient and
    /// one outcome per channel, however many attempts failed.
    #[instrument(skip(self, recipients, body), fields(recipients = recipients.len()))]
    pub async fn dispatch(
        &self,
        recipients: &[Recipient],
        body: &str,
    ) -> Result<DispatchReport, NotifierError> {
        if recipients.is_empty() {
            return Err(NotifierError::NoRecipients);
        }
        if body.trim().is_empty() {
            return Err(NotifierError::EmptyBody);
        }

        let start = Instant::now();
        let body: Arc<str> = Arc::from(body);

        info!(
            max_concurrency = self.config.max_concurrency,
            "Starting bulk dispatch"
        );

        // One slot per recipient; `Err` slots never reach the provider.
        let mut slots = Vec::with_capacity(recipients.len());
        let mut handles = Vec::with_capacity(recipients.len() * Channel::ALL.len());

        for recipient in recipients {
            let mobile = recipient.mobile.trim().to_string();
            let address = format!("{}{}", self.config.country_code, mobile);

            match Self::validate_mobile(&mobile) {
                Ok(()) => {
                    for channel in Channel::ALL {
                        handles.push(self.spawn_attempt(channel, &address, &body));
                    }
                    slots.push((mobile, address, Ok(())));
                }
                Err(e) => {
                    warn!(mobile = %mobile, error = %e, "Skipping recipient");
                    slots.push((mobile, address, Err(e.to_string())));
                }
            }
        }

        let mut results = join_all(handles).await.into_iter();

        let recipients: Vec<RecipientReport> = slots
            .into_iter()
            .map(|(mobile, address, validity)| {
                let outcomes = Channel::ALL
                    .into_iter()
                    .map(|channel| {
                        let outcome = match &validity {
                            Ok(()) => match results.next() {
                                Some(Ok(outcome)) => outcome,
                                Some(Err(join_error)) => AttemptOutcome::Failed {
                                    reason: NotifierError::Aborted(join_error.to_string())
                                        .to_string(),
                                },
                                None => AttemptOutcome::Failed {
                                    reason: "attempt result missing".to_string(),
                                },
                            },
                            Err(reason) => AttemptOutcome::Failed {
                                reason: reason.clone(),
                            },
                        };
                        ChannelOutcome { channel, outcome }
                    })
                    .collect();

                RecipientReport {
                    mobile,
                    address,
                    outcomes,
                }
            })
            .collect();

        let report = DispatchReport::from_recipients(recipients);

        info!(
            delivered = report.delivered,
            failed = report.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bulk dispatch complete"
        );

        Ok(report)
    }

    fn validate_mobile(mobile: &str) -> Result<(), NotifierError> {
        if mobile.is_empty() || !mobile.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NotifierError::InvalidMobile(mobile.to_string()));
        }
        Ok(())
    }

    fn sender(&self, channel: Channel) -> String {
        match channel {
            Channel::Sms => self.config.sms_from.clone(),
            Channel::WhatsApp => channel.address(&self.config.whatsapp_from),
        }
    }

    fn spawn_attempt(
        &self,
        channel: Channel,
        number: &str,
        body: &Arc<str>,
    ) -> JoinHandle<AttemptOutcome> {
        let provider = Arc::clone(&self.provider);
        let permits = Arc::clone(&self.permits);
        let from = self.sender(channel);
        let to = channel.address(number);
        let body = Arc::clone(body);
        let timeout = self.config.attempt_timeout;

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return AttemptOutcome::Failed {
                        reason: NotifierError::Aborted(e.to_string()).to_string(),
                    };
                }
            };

            let result = match tokio::time::timeout(timeout, provider.send(&from, &to, &body)).await
            {
                Ok(result) => result,
                Err(_) => Err(NotifierError::Timeout(timeout)),
            };

            match result {
                Ok(message_id) => {
                    debug!(channel = %channel, to = %to, message_id = %message_id, "Message sent");
                    AttemptOutcome::Delivered { message_id }
                }
                Err(e) => {
                    warn!(channel = %channel, to = %to, error = %e, "Delivery attempt failed");
                    AttemptOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Provider stub: fails for listed `to` addresses, optionally sleeps, and
    /// tracks call counts and peak concurrency.
    #[derive(Default)]
    struct ScriptedProvider {
        fail_for: HashSet<String>,
        panic_for: HashSet<String>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl ScriptedProvider {
        fn failing(addresses: &[&str]) -> Self {
            Self {
                fail_for: addresses.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            }
        }

        fn delayed(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MessagingProvider for ScriptedProvider {
        async fn send(&self, _from: &str, to: &str, _body: &str) -> Result<String, NotifierError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic_for.contains(to) {
                panic!("provider blew up for {}", to);
            }
            if self.fail_for.contains(to) {
                return Err(NotifierError::Provider {
                    status: 400,
                    message: format!("rejected {}", to),
                });
            }
            Ok(format!("S-{}", n))
        }
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            sms_from: "+15005550006".to_string(),
            whatsapp_from: "+14155238886".to_string(),
            max_concurrency: 64,
            ..Default::default()
        }
    }

    fn recipients(n: usize) -> Vec<Recipient> {
        (0..n)
            .map(|i| Recipient::new(format!("90000{:05}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_every_recipient_gets_both_channels() {
        let provider = Arc::new(ScriptedProvider::default());
        let dispatcher = Dispatcher::new(provider.clone(), config());

        let report = dispatcher.dispatch(&recipients(7), "hello").await.unwrap();

        assert_eq!(report.total_recipients, 7);
        assert_eq!(report.recipients.len(), 7);
        assert_eq!(report.attempts(), 14);
        assert_eq!(report.delivered, 14);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 14);
        for entry in &report.recipients {
            let channels: Vec<_> = entry.outcomes.iter().map(|o| o.channel).collect();
            assert_eq!(channels, vec![Channel::Sms, Channel::WhatsApp]);
            assert!(entry.address.starts_with("+91"));
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_input_without_calls() {
        let provider = Arc::new(ScriptedProvider::default());
        let dispatcher = Dispatcher::new(provider.clone(), config());

        let result = dispatcher.dispatch(&[], "hello").await;
        assert!(matches!(result, Err(NotifierError::NoRecipients)));

        let result = dispatcher
            .dispatch(&[Recipient::new("9999999999")], "")
            .await;
        assert!(matches!(result, Err(NotifierError::EmptyBody)));

        let result = dispatcher
            .dispatch(&[Recipient::new("9999999999")], "   \n")
            .await;
        assert!(matches!(result, Err(NotifierError::EmptyBody)));

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_total_failure_still_returns_report() {
        let dispatcher = Dispatcher::new(Arc::new(crate::DisabledProvider), config());

        let report = dispatcher.dispatch(&recipients(5), "hello").await.unwrap();

        assert_eq!(report.total_recipients, 5);
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 10);
        assert!(
            report
                .failures()
                .all(|(_, _, reason)| reason == "messaging provider not configured")
        );
    }

    #[tokio::test]
    async fn test_weekend_sale_scenario() {
        let provider = Arc::new(ScriptedProvider::failing(&["whatsapp:+919000000002"]));
        let dispatcher = Dispatcher::new(provider, config());

        let report = dispatcher
            .dispatch(
                &[Recipient::new("9000000001"), Recipient::new("9000000002")],
                "Sale this weekend",
            )
            .await
            .unwrap();

        assert_eq!(report.attempts(), 4);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);

        let first = &report.recipients[0];
        assert!(first.outcome(Channel::Sms).unwrap().is_delivered());
        assert!(first.outcome(Channel::WhatsApp).unwrap().is_delivered());

        let second = &report.recipients[1];
        assert_eq!(second.mobile, "9000000002");
        match second.outcome(Channel::Sms).unwrap() {
            AttemptOutcome::Delivered { message_id } => assert!(message_id.starts_with("S-")),
            other => panic!("expected delivery, got {:?}", other),
        }
        assert!(!second.outcome(Channel::WhatsApp).unwrap().is_delivered());

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "9000000002");
        assert_eq!(failures[0].1, Channel::WhatsApp);
    }

    #[tokio::test]
    async fn test_attempts_run_concurrently() {
        let delay = Duration::from_millis(200);
        let provider = Arc::new(ScriptedProvider::delayed(delay));
        let dispatcher = Dispatcher::new(provider, config());

        let start = Instant::now();
        let report = dispatcher.dispatch(&recipients(20), "hello").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(report.delivered, 40);
        // Sequential delivery would take 40 × 200ms.
        assert!(elapsed < delay * 4, "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let provider = Arc::new(ScriptedProvider::delayed(Duration::from_millis(20)));
        let dispatcher = Dispatcher::new(
            provider.clone(),
            DispatcherConfig {
                max_concurrency: 3,
                ..config()
            },
        );

        let report = dispatcher.dispatch(&recipients(10), "hello").await.unwrap();

        assert_eq!(report.delivered, 20);
        assert!(provider.peak_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_slow_attempts_time_out() {
        let provider = Arc::new(ScriptedProvider::delayed(Duration::from_millis(500)));
        let dispatcher = Dispatcher::new(
            provider,
            DispatcherConfig {
                attempt_timeout: Duration::from_millis(50),
                ..config()
            },
        );

        let report = dispatcher.dispatch(&recipients(2), "hello").await.unwrap();

        assert_eq!(report.failed, 4);
        assert!(report.failures().all(|(_, _, reason)| reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_invalid_mobile_fails_without_aborting_batch() {
        let provider = Arc::new(ScriptedProvider::default());
        let dispatcher = Dispatcher::new(provider.clone(), config());

        let report = dispatcher
            .dispatch(
                &[
                    Recipient::new("9000000001"),
                    Recipient::new("90-000"),
                    Recipient::new(" 9000000003 "),
                ],
                "hello",
            )
            .await
            .unwrap();

        assert_eq!(report.total_recipients, 3);
        assert_eq!(report.delivered, 4);
        assert_eq!(report.failed, 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);

        let bad = &report.recipients[1];
        assert!(bad.outcomes.iter().all(|o| !o.outcome.is_delivered()));
        assert_eq!(report.recipients[2].mobile, "9000000003");
    }

    #[tokio::test]
    async fn test_panicking_attempt_is_isolated() {
        let provider = Arc::new(ScriptedProvider {
            panic_for: ["+919000000001".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(provider, config());

        let report = dispatcher
            .dispatch(
                &[Recipient::new("9000000001"), Recipient::new("9000000002")],
                "hello",
            )
            .await
            .unwrap();

        assert_eq!(report.delivered, 3);
        match report.recipients[0].outcome(Channel::Sms).unwrap() {
            AttemptOutcome::Failed { reason } => assert!(reason.starts_with("attempt aborted")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(
            report.recipients[0]
                .outcome(Channel::WhatsApp)
                .unwrap()
                .is_delivered()
        );
    }

    #[tokio::test]
    async fn test_whatsapp_sender_gets_prefix() {
        struct RecordingProvider(std::sync::Mutex<Vec<(String, String)>>);

        #[async_trait]
        impl MessagingProvider for RecordingProvider {
            async fn send(&self, from: &str, to: &str, _body: &str) -> Result<String, NotifierError> {
                self.0
                    .lock()
                    .unwrap()
                    .push((from.to_string(), to.to_string()));
                Ok("SM1".to_string())
            }
        }

        let provider = Arc::new(RecordingProvider(std::sync::Mutex::new(Vec::new())));
        let dispatcher = Dispatcher::new(provider.clone(), config());
        dispatcher
            .dispatch(&[Recipient::new("9000000001")], "hello")
            .await
            .unwrap();

        let mut sent = provider.0.lock().unwrap().clone();
        sent.sort();
        assert_eq!(
            sent,
            vec![
                ("+15005550006".to_string(), "+919000000001".to_string()),
                (
                    "whatsapp:+14155238886".to_string(),
                    "whatsapp:+919000000001".to_string()
                ),
            ]
        );
    }
}
