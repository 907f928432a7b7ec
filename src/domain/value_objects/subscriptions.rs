use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::plans::PlanDto;

#[derive(Debug, Serialize)]
pub struct CurrentPlanDto {
    pub col: u8,
    pub plans: Vec<PlanDto>,
    pub current_plan: Option<PlanDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub subscription_processor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: Uuid,
    pub payment_method: Option<String>,
}

/// Query string sent back by the 3-D Secure challenge page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreeDSecureResult {
    pub success: Option<String>,
    pub message: Option<String>,
}

impl ThreeDSecureResult {
    pub fn succeeded(&self) -> bool {
        self.success.as_deref() == Some("true")
    }
}

/// Short status text returned after a mutation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlashMessage {
    pub status: String,
}

impl FlashMessage {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}
