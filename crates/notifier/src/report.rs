//! Dispatch report types.

use serde::{Deserialize, Serialize};

/// One of the two delivery paths attempted for every recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    WhatsApp,
}

impl Channel {
    /// Channels in the order they appear in each recipient's report entry.
    pub const ALL: [Channel; 2] = [Channel::Sms, Channel::WhatsApp];

    /// Provider address for a fully-qualified number on this channel.
    ///
    /// WhatsApp addresses carry a `whatsapp:` namespace prefix; an address that
    /// already has it is returned unchanged.
    pub fn address(self, number: &str) -> String {
        match self {
            Channel::Sms => number.to_string(),
            Channel::WhatsApp if number.starts_with("whatsapp:") => number.to_string(),
            Channel::WhatsApp => format!("whatsapp:{}", number),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::WhatsApp => write!(f, "whatsapp"),
        }
    }
}

/// Result of a single channel attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum AttemptOutcome {
    Delivered { message_id: String },
    Failed { reason: String },
}

impl AttemptOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, AttemptOutcome::Delivered { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Per-recipient slice of the report: always one outcome per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientReport {
    pub mobile: String,
    /// Number with country code, as sent to the provider
    pub address: String,
    pub outcomes: Vec<ChannelOutcome>,
}

impl RecipientReport {
    pub fn outcome(&self, channel: Channel) -> Option<&AttemptOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.channel == channel)
            .map(|o| &o.outcome)
    }
}

/// Aggregated outcome of one bulk send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub total_recipients: usize,
    pub delivered: usize,
    pub failed: usize,
    pub recipients: Vec<RecipientReport>,
}

impl DispatchReport {
    pub fn from_recipients(recipients: Vec<RecipientReport>) -> Self {
        let (delivered, failed) = recipients
            .iter()
            .flat_map(|r| r.outcomes.iter())
            .fold((0, 0), |(ok, err), o| {
                if o.outcome.is_delivered() {
                    (ok + 1, err)
                } else {
                    (ok, err + 1)
                }
            });

        Self {
            total_recipients: recipients.len(),
            delivered,
            failed,
            recipients,
        }
    }

    /// Total number of channel attempts recorded.
    pub fn attempts(&self) -> usize {
        self.delivered + self.failed
    }

    /// Failed `(mobile, channel, reason)` triples, for operator follow-up.
    pub fn failures(&self) -> impl Iterator<Item = (&str, Channel, &str)> {
        self.recipients.iter().flat_map(|r| {
            r.outcomes.iter().filter_map(move |o| match &o.outcome {
                AttemptOutcome::Failed { reason } => {
                    Some((r.mobile.as_str(), o.channel, reason.as_str()))
                }
                AttemptOutcome::Delivered { .. } => None,
            })
        })
    }
}
