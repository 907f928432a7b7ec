use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    domain::{
        entities::users::UserEntity,
        value_objects::enums::subscription_statuses::SubscriptionStatus,
    },
    payments::gateway::{
        PaymentIntentRef, PendingPayment, PendingPaymentKind, ProcessorError, ProcessorEvent,
        ProcessorResult, ProcessorSubscription, SubscriptionGateway,
    },
};

type HmacSha256 = Hmac<Sha256>;

/// Webhook timestamps older than this are rejected.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

const PAYMENT_METHOD_REQUIRED: &str =
    "The payment attempt failed because of an invalid payment method.";
const REQUIRES_ACTION: &str =
    "The payment attempt failed because additional action is required before it can be completed.";
const INCOMPLETE: &str = "The payment attempt is incomplete.";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    #[serde(default)]
    items: StripeSubscriptionItems,
    latest_invoice: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct StripeSubscriptionItems {
    data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionItem {
    id: String,
    price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
}

impl StripeSubscription {
    fn price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    fn payment_intent(&self) -> Option<&serde_json::Value> {
        self.latest_invoice
            .as_ref()
            .and_then(|invoice| invoice.get("payment_intent"))
            .filter(|intent| intent.is_object())
    }

    /// Classifies the first payment of an `incomplete` subscription.
    fn pending_payment(&self) -> Option<PendingPayment> {
        if self.status != "incomplete" {
            return None;
        }

        let intent = self.payment_intent();
        let intent_status = intent
            .and_then(|intent| intent.get("status"))
            .and_then(|status| status.as_str());
        let payment_intent = intent.and_then(|intent| {
            let id = intent.get("id").and_then(|id| id.as_str())?;
            Some(PaymentIntentRef {
                id: id.to_string(),
                client_secret: intent
                    .get("client_secret")
                    .and_then(|secret| secret.as_str())
                    .map(str::to_string),
            })
        });

        let (kind, message) = match intent_status {
            Some("requires_action") => (PendingPaymentKind::ActionRequired, REQUIRES_ACTION),
            Some("requires_payment_method") => (
                PendingPaymentKind::Failed,
                intent
                    .and_then(|intent| intent.pointer("/last_payment_error/message"))
                    .and_then(|message| message.as_str())
                    .unwrap_or(PAYMENT_METHOD_REQUIRED),
            ),
            _ => (PendingPaymentKind::Incomplete, INCOMPLETE),
        };

        Some(PendingPayment {
            kind,
            message: message.to_string(),
            payment_intent,
        })
    }

    fn into_outcome(self, requested_price: &str) -> ProcessorSubscription {
        let pending_payment = self.pending_payment();
        let price_id = self
            .price_id()
            .map(str::to_string)
            .unwrap_or_else(|| requested_price.to_string());

        ProcessorSubscription {
            status: SubscriptionStatus::from_str(&self.status),
            id: self.id,
            price_id,
            pending_payment,
        }
    }
}

impl StripeClient {
    pub fn new(api_base: String, secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> ProcessorResult<reqwest::Response> {
        let resp = self
            .http
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;

        Self::ensure_success(resp, context).await
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> ProcessorResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        Err(Self::classify_error(status, details, context))
    }

    fn classify_error(
        status: StatusCode,
        details: Option<StripeErrorDetails>,
        context: &str,
    ) -> ProcessorError {
        let is_card_error = details
            .as_ref()
            .and_then(|d| d.type_.as_deref())
            .is_some_and(|type_| type_ == "card_error");
        let message = details
            .and_then(|d| d.message)
            .unwrap_or_else(|| format!("Stripe API request failed: {context} (status {status})"));

        if status == StatusCode::PAYMENT_REQUIRED || is_card_error {
            ProcessorError::PaymentFailure(message)
        } else {
            ProcessorError::InvalidRequest(message)
        }
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> ProcessorResult<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_id)))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        Ok(resp.json().await?)
    }

    fn verify_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> ProcessorResult<ProcessorEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| ProcessorError::InvalidSignature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(ProcessorError::InvalidSignature("missing v1 signature".to_string()));
        }

        let issued_at: i64 = timestamp
            .parse()
            .map_err(|_| ProcessorError::InvalidSignature("malformed timestamp".to_string()))?;
        if (now - issued_at).abs() > WEBHOOK_TOLERANCE_SECS {
            return Err(ProcessorError::InvalidSignature(
                "timestamp outside the tolerance zone".to_string(),
            ));
        }

        let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + payload.len());
        signed_payload.extend_from_slice(timestamp.as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(payload);

        let matched = signatures.iter().any(|signature| {
            let Ok(provided) = hex::decode(signature) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
                return false;
            };
            mac.update(&signed_payload);
            mac.verify_slice(&provided).is_ok()
        });

        if !matched {
            return Err(ProcessorError::InvalidSignature(
                "no matching v1 signature".to_string(),
            ));
        }

        serde_json::from_slice(payload)
            .map_err(|err| ProcessorError::InvalidSignature(format!("malformed event: {err}")))
    }
}

#[async_trait]
impl SubscriptionGateway for StripeClient {
    fn provider_name(&self) -> String {
        "stripe".to_string()
    }

    async fn validate_user(&self, _user: &UserEntity) -> ProcessorResult<()> {
        Ok(())
    }

    async fn create_setup_intent(&self, user: &UserEntity) -> ProcessorResult<String> {
        // https://stripe.com/docs/api/setup_intents/create
        let mut body = vec![("usage".to_string(), "off_session".to_string())];
        if let Some(customer) = user.provider_customer_id.as_ref() {
            body.push(("customer".to_string(), customer.clone()));
        }

        let resp = self
            .post_form("/v1/setup_intents", &body, "create setup intent")
            .await?;

        #[derive(Deserialize)]
        struct SetupIntentResp {
            client_secret: Option<String>,
        }

        let parsed: SetupIntentResp = resp.json().await?;
        parsed.client_secret.ok_or_else(|| {
            ProcessorError::Transport(anyhow::anyhow!("Stripe setup intent secret is missing"))
        })
    }

    async fn create_customer(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> ProcessorResult<String> {
        // https://stripe.com/docs/api/customers/create
        let mut body = vec![("metadata[user_id]".to_string(), user_id.to_string())];
        if let Some(email) = email {
            body.push(("email".to_string(), email));
        }

        let resp = self
            .post_form("/v1/customers", &body, "create customer")
            .await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        info!(%user_id, customer_id = %parsed.id, "stripe: customer created");
        Ok(parsed.id)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        payment_method: Option<String>,
        metadata: HashMap<String, String>,
    ) -> ProcessorResult<ProcessorSubscription> {
        if let Some(payment_method) = payment_method.as_ref() {
            // https://stripe.com/docs/api/payment_methods/attach
            let body = vec![("customer".to_string(), customer_id.to_string())];
            self.post_form(
                &format!("/v1/payment_methods/{}/attach", payment_method),
                &body,
                "attach payment method",
            )
            .await?;
        }

        // https://stripe.com/docs/api/subscriptions/create
        let mut body: Vec<(String, String)> = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            ("payment_behavior".to_string(), "allow_incomplete".to_string()),
            (
                "expand[0]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];

        if let Some(payment_method) = payment_method {
            body.push(("default_payment_method".to_string(), payment_method));
        }

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .post_form("/v1/subscriptions", &body, "create subscription")
            .await?;
        let subscription: StripeSubscription = resp.json().await?;

        Ok(subscription.into_outcome(price_id))
    }

    async fn swap_subscription(
        &self,
        provider_subscription_id: &str,
        price_id: &str,
    ) -> ProcessorResult<ProcessorSubscription> {
        let current = self.retrieve_subscription(provider_subscription_id).await?;
        let item_id = current
            .items
            .data
            .first()
            .map(|item| item.id.clone())
            .ok_or_else(|| {
                ProcessorError::InvalidRequest(format!(
                    "subscription {} has no items to swap",
                    provider_subscription_id
                ))
            })?;

        // https://stripe.com/docs/billing/subscriptions/upgrade-downgrade
        let body: Vec<(String, String)> = vec![
            ("items[0][id]".to_string(), item_id),
            ("items[0][price]".to_string(), price_id.to_string()),
            (
                "proration_behavior".to_string(),
                "create_prorations".to_string(),
            ),
            ("payment_behavior".to_string(), "allow_incomplete".to_string()),
            (
                "expand[0]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];

        let resp = self
            .post_form(
                &format!("/v1/subscriptions/{}", provider_subscription_id),
                &body,
                "swap subscription",
            )
            .await?;
        let subscription: StripeSubscription = resp.json().await?;

        Ok(subscription.into_outcome(price_id))
    }

    async fn cancel_now(&self, provider_subscription_id: &str) -> ProcessorResult<()> {
        // https://stripe.com/docs/api/subscriptions/cancel
        let resp = self
            .http
            .delete(self.url(&format!(
                "/v1/subscriptions/{}",
                provider_subscription_id
            )))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        Self::ensure_success(resp, "cancel subscription").await?;

        Ok(())
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> ProcessorResult<ProcessorEvent> {
        self.verify_signature_at(payload, signature, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server) -> StripeClient {
        StripeClient::new(server.url(), "sk_test".to_string(), "whsec_test".to_string())
    }

    fn sign(secret: &str, timestamp: i64, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[tokio::test]
    async fn create_subscription_returns_active_subscription() {
        let mut server = mockito::Server::new_async().await;
        let attach = server
            .mock("POST", "/v1/payment_methods/pm_card/attach")
            .match_header("authorization", "Bearer sk_test")
            .with_status(200)
            .with_body(json!({ "id": "pm_card" }).to_string())
            .create_async()
            .await;
        let create = server
            .mock("POST", "/v1/subscriptions")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("customer".into(), "cus_1".into()),
                Matcher::UrlEncoded("items[0][price]".into(), "price_pro".into()),
                Matcher::UrlEncoded("default_payment_method".into(), "pm_card".into()),
                Matcher::UrlEncoded("metadata[plan_id]".into(), "plan-1".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "id": "sub_1",
                    "status": "active",
                    "items": { "data": [{ "id": "si_1", "price": { "id": "price_pro" } }] }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let metadata = HashMap::from([("plan_id".to_string(), "plan-1".to_string())]);
        let subscription = client(&server)
            .create_subscription("cus_1", "price_pro", Some("pm_card".to_string()), metadata)
            .await
            .unwrap();

        attach.assert_async().await;
        create.assert_async().await;
        assert_eq!(
            subscription,
            ProcessorSubscription {
                id: "sub_1".to_string(),
                status: SubscriptionStatus::Active,
                price_id: "price_pro".to_string(),
                pending_payment: None,
            }
        );
    }

    async fn create_incomplete(payment_intent: serde_json::Value) -> ProcessorSubscription {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/subscriptions")
            .with_status(200)
            .with_body(
                json!({
                    "id": "sub_1",
                    "status": "incomplete",
                    "items": { "data": [{ "id": "si_1", "price": { "id": "price_pro" } }] },
                    "latest_invoice": { "payment_intent": payment_intent }
                })
                .to_string(),
            )
            .create_async()
            .await;

        client(&server)
            .create_subscription("cus_1", "price_pro", None, HashMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn incomplete_subscription_requiring_action_keeps_the_intent() {
        let subscription = create_incomplete(json!({
            "id": "pi_1",
            "status": "requires_action",
            "client_secret": "pi_1_secret"
        }))
        .await;

        assert_eq!(subscription.id, "sub_1");
        assert_eq!(subscription.status, SubscriptionStatus::Incomplete);
        assert_eq!(
            subscription.pending_payment,
            Some(PendingPayment {
                kind: PendingPaymentKind::ActionRequired,
                message: REQUIRES_ACTION.to_string(),
                payment_intent: Some(PaymentIntentRef {
                    id: "pi_1".to_string(),
                    client_secret: Some("pi_1_secret".to_string()),
                }),
            })
        );
    }

    #[tokio::test]
    async fn rejected_payment_method_is_a_failed_payment() {
        let subscription = create_incomplete(json!({
            "id": "pi_1",
            "status": "requires_payment_method",
            "last_payment_error": { "message": "Your card has insufficient funds." }
        }))
        .await;

        let pending = subscription.pending_payment.unwrap();
        assert_eq!(pending.kind, PendingPaymentKind::Failed);
        assert_eq!(pending.message, "Your card has insufficient funds.");
    }

    #[tokio::test]
    async fn other_incomplete_states_are_incomplete_payments() {
        let subscription = create_incomplete(json!({ "id": "pi_1", "status": "processing" })).await;

        let pending = subscription.pending_payment.unwrap();
        assert_eq!(pending.kind, PendingPaymentKind::Incomplete);
        assert_eq!(pending.message, INCOMPLETE);
    }

    #[tokio::test]
    async fn card_errors_are_payment_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/subscriptions")
            .with_status(402)
            .with_body(
                json!({
                    "error": { "type": "card_error", "message": "Your card was declined." }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = client(&server)
            .create_subscription("cus_1", "price_pro", None, HashMap::new())
            .await
            .unwrap_err();

        match err {
            ProcessorError::PaymentFailure(message) => {
                assert_eq!(message, "Your card was declined.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_price_is_an_invalid_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/subscriptions")
            .with_status(400)
            .with_body(
                json!({
                    "error": {
                        "type": "invalid_request_error",
                        "message": "No such price: 'price_missing'"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = client(&server)
            .create_subscription("cus_1", "price_missing", None, HashMap::new())
            .await
            .unwrap_err();

        match err {
            ProcessorError::InvalidRequest(message) => {
                assert_eq!(message, "No such price: 'price_missing'")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn swap_updates_the_first_item() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/subscriptions/sub_1")
            .with_status(200)
            .with_body(
                json!({
                    "id": "sub_1",
                    "status": "active",
                    "items": { "data": [{ "id": "si_1", "price": { "id": "price_basic" } }] }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let update = server
            .mock("POST", "/v1/subscriptions/sub_1")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("items[0][id]".into(), "si_1".into()),
                Matcher::UrlEncoded("items[0][price]".into(), "price_pro".into()),
                Matcher::UrlEncoded("proration_behavior".into(), "create_prorations".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "id": "sub_1",
                    "status": "active",
                    "items": { "data": [{ "id": "si_1", "price": { "id": "price_pro" } }] }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let subscription = client(&server)
            .swap_subscription("sub_1", "price_pro")
            .await
            .unwrap();

        update.assert_async().await;
        assert_eq!(subscription.price_id, "price_pro");
    }

    #[tokio::test]
    async fn cancel_now_deletes_the_subscription() {
        let mut server = mockito::Server::new_async().await;
        let cancel = server
            .mock("DELETE", "/v1/subscriptions/sub_1")
            .with_status(200)
            .with_body(json!({ "id": "sub_1", "status": "canceled" }).to_string())
            .create_async()
            .await;

        client(&server).cancel_now("sub_1").await.unwrap();

        cancel.assert_async().await;
    }

    #[test]
    fn accepts_valid_webhook_signature() {
        let server_client =
            StripeClient::new("http://unused".into(), "sk".into(), "whsec_test".into());
        let payload = json!({
            "id": "evt_1",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_1" } }
        })
        .to_string();
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign("whsec_test", now, &payload));

        let event = server_client
            .verify_signature_at(payload.as_bytes(), &header, now)
            .unwrap();

        assert_eq!(event.type_, "customer.subscription.deleted");
    }

    #[test]
    fn rejects_tampered_or_stale_webhooks() {
        let server_client =
            StripeClient::new("http://unused".into(), "sk".into(), "whsec_test".into());
        let payload = r#"{"type":"invoice.payment_failed","data":{"object":{}}}"#;
        let now = 1_700_000_000;

        let wrong_secret = format!("t={},v1={}", now, sign("other", now, payload));
        assert!(matches!(
            server_client.verify_signature_at(payload.as_bytes(), &wrong_secret, now),
            Err(ProcessorError::InvalidSignature(_))
        ));

        let stale = format!("t={},v1={}", now, sign("whsec_test", now, payload));
        assert!(matches!(
            server_client.verify_signature_at(payload.as_bytes(), &stale, now + 3600),
            Err(ProcessorError::InvalidSignature(_))
        ));
    }
}
