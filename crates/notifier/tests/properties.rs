//! Property tests for the bulk dispatcher.
//!
//! Failures are injected per `(recipient, channel)` at random; every
//! recipient's outcomes must reflect exactly its own injected failures.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;

use crm_notifier::{
    Channel, Dispatcher, DispatcherConfig, MessagingProvider, NotifierError, Recipient,
};

struct InjectedFailures {
    fail_for: HashSet<String>,
}

#[async_trait]
impl MessagingProvider for InjectedFailures {
    async fn send(&self, _from: &str, to: &str, _body: &str) -> Result<String, NotifierError> {
        tokio::task::yield_now().await;
        if self.fail_for.contains(to) {
            Err(NotifierError::Provider {
                status: 503,
                message: "injected".to_string(),
            })
        } else {
            Ok(format!("id-{}", to))
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn failures_never_cross_recipients(
        flags in prop::collection::vec((any::<bool>(), any::<bool>()), 1..40),
        ceiling in 1usize..32,
    ) {
        let recipients: Vec<Recipient> = (0..flags.len())
            .map(|i| Recipient::new(format!("98{:08}", i)))
            .collect();

        let mut fail_for = HashSet::new();
        for (recipient, (sms_fails, whatsapp_fails)) in recipients.iter().zip(&flags) {
            let number = format!("+91{}", recipient.mobile);
            if *sms_fails {
                fail_for.insert(Channel::Sms.address(&number));
            }
            if *whatsapp_fails {
                fail_for.insert(Channel::WhatsApp.address(&number));
            }
        }

        let dispatcher = Dispatcher::new(
            Arc::new(InjectedFailures { fail_for }),
            DispatcherConfig {
                max_concurrency: ceiling,
                ..Default::default()
            },
        );

        let report = runtime()
            .block_on(dispatcher.dispatch(&recipients, "property check"))
            .unwrap();

        prop_assert_eq!(report.total_recipients, flags.len());
        prop_assert_eq!(report.attempts(), flags.len() * 2);

        for ((entry, recipient), (sms_fails, whatsapp_fails)) in
            report.recipients.iter().zip(&recipients).zip(&flags)
        {
            prop_assert_eq!(&entry.mobile, &recipient.mobile);
            prop_assert_eq!(entry.outcomes.len(), 2);
            prop_assert_eq!(
                entry.outcome(Channel::Sms).unwrap().is_delivered(),
                !*sms_fails
            );
            prop_assert_eq!(
                entry.outcome(Channel::WhatsApp).unwrap().is_delivered(),
                !*whatsapp_fails
            );
        }

        let expected_failures = flags
            .iter()
            .map(|(a, b)| usize::from(*a) + usize::from(*b))
            .sum::<usize>();
        prop_assert_eq!(report.failed, expected_failures);
    }
}
