use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    #[default]
    Yearly,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Yearly => "yearly",
        }
    }

    /// Only an exact `monthly` selects monthly billing; anything else bills yearly.
    pub fn from_input(value: Option<&str>) -> Self {
        match value {
            Some("monthly") => BillingPeriod::Monthly,
            _ => BillingPeriod::Yearly,
        }
    }

    pub fn from_str(value: &str) -> Self {
        Self::from_input(Some(value))
    }
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
