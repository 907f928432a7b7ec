use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Incomplete,
    PastDue,
    Canceled,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        };
        write!(f, "{}", status)
    }
}

impl SubscriptionStatus {
    /// Maps provider statuses onto the local set. Unknown values count as canceled.
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" | "trialing" => SubscriptionStatus::Active,
            "incomplete" => SubscriptionStatus::Incomplete,
            "past_due" | "unpaid" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Canceled,
        }
    }

    /// A user with a subscription in one of these states counts as subscribed.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }
}
