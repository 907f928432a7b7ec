use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::usecases::{
        current_plan::CurrentPlanError, plan_catalog::PlanCatalogError,
        subscriptions::SubscriptionError,
    },
    domain::value_objects::plans::ValidationErrors,
    payments::gateway::PaymentIntentRef,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<PaymentIntentRef>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            errors: None,
            payment_intent: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{message}")]
    PaymentRequired {
        message: String,
        payment_intent: Option<PaymentIntentRef>,
    },

    #[error("The given data was invalid.")]
    Validation(ValidationErrors),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn rejected(status: StatusCode, message: String) -> Self {
        AppError::Rejected { status, message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new(StatusCode::UNAUTHORIZED, message),
            ),
            AppError::Rejected { status, message } => (status, ErrorResponse::new(status, message)),
            AppError::PaymentRequired {
                message,
                payment_intent,
            } => {
                let status = StatusCode::PAYMENT_REQUIRED;
                let mut body = ErrorResponse::new(status, message);
                body.payment_intent = payment_intent;
                (status, body)
            }
            AppError::Validation(errors) => {
                let status = StatusCode::UNPROCESSABLE_ENTITY;
                let mut body = ErrorResponse::new(status, "The given data was invalid.");
                body.errors = Some(errors);
                (status, body)
            }
            AppError::Internal(_) => {
                // Internal detail stays in the logs.
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, ErrorResponse::new(status, "Internal server error"))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<PlanCatalogError> for AppError {
    fn from(err: PlanCatalogError) -> Self {
        match err {
            PlanCatalogError::Validation(errors) => AppError::Validation(errors),
            PlanCatalogError::Internal(inner) => AppError::Internal(inner),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

impl From<CurrentPlanError> for AppError {
    fn from(err: CurrentPlanError) -> Self {
        match err {
            CurrentPlanError::Internal(inner) => AppError::Internal(inner),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        let message = err.to_string();
        match err {
            SubscriptionError::Internal(inner) => AppError::Internal(inner),
            SubscriptionError::PaymentFailed {
                payment_intent: Some(intent),
                ..
            }
            | SubscriptionError::PaymentActionRequired {
                payment_intent: Some(intent),
                ..
            }
            | SubscriptionError::PaymentIncomplete {
                payment_intent: Some(intent),
                ..
            } => AppError::PaymentRequired {
                message,
                payment_intent: Some(intent),
            },
            other => AppError::rejected(other.status_code(), message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::authorization::AccessError;

    #[test]
    fn access_errors_keep_their_message_and_status() {
        let err = AppError::from(PlanCatalogError::Access(AccessError::Forbidden));

        match err {
            AppError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(message, "Unauthorized action.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let response =
            AppError::from(SubscriptionError::Internal(anyhow::anyhow!("db down"))).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn payment_errors_carry_the_prefixed_message() {
        let err = AppError::from(SubscriptionError::PaymentActionRequired {
            message: "Confirm the payment.".to_string(),
            payment_intent: None,
        });

        assert_eq!(err.to_string(), "Payment action required: Confirm the payment.");
    }

    #[tokio::test]
    async fn pending_payments_expose_the_intent_for_the_challenge() {
        let response = AppError::from(SubscriptionError::PaymentActionRequired {
            message: "Confirm the payment.".to_string(),
            payment_intent: Some(PaymentIntentRef {
                id: "pi_1".to_string(),
                client_secret: Some("pi_1_secret".to_string()),
            }),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload["message"], "Payment action required: Confirm the payment.");
        assert_eq!(payload["payment_intent"]["id"], "pi_1");
        assert_eq!(payload["payment_intent"]["client_secret"], "pi_1_secret");
    }
}
