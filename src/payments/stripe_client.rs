use std::collections::HashMap;

use anyhow::Result;
use axum::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::application::usecases::billing::StripeGateway;

type HmacSha256 = Hmac<Sha256>;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePrice>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

impl StripeSubscriptionObject {
    /// Period start, falling back to the first item when the top-level
    /// field is absent.
    pub fn period_start(&self) -> Option<DateTime<Utc>> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_end)
            })
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn price_id(&self) -> Option<String> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.clone())
    }

    pub fn canceled_at_utc(&self) -> Option<DateTime<Utc>> {
        self.canceled_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoiceObject {
    pub id: Option<String>,
    pub subscription: Option<String>,
    pub payment_intent: Option<String>,
    pub amount_paid: Option<i64>,
    pub amount_due: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub last_finalization_error: Option<StripeInvoiceError>,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoiceError {
    pub message: Option<String>,
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
    param: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
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

        let (stripe_error_type, stripe_error_code, stripe_error_param, stripe_error_message, stripe_decline_code) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (
                        details.type_,
                        details.code,
                        details.param,
                        details.message,
                        details.decline_code,
                    )
                }
                Err(_) => (None, None, None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            stripe_decline_code = ?stripe_decline_code,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_subscription(event: &StripeEvent) -> Option<StripeSubscriptionObject> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_invoice(event: &StripeEvent) -> Option<StripeInvoiceObject> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

#[async_trait]
impl StripeGateway for StripeClient {
    /// Creates a Stripe customer tagged with our user id.
    async fn create_customer(&self, email: Option<String>, user_id: Uuid) -> Result<String> {
        // https://stripe.com/docs/api/customers/create
        let mut body = vec![("metadata[user_id]".to_string(), user_id.to_string())];
        if let Some(email) = email {
            body.push(("email".to_string(), email));
        }

        let resp = self
            .http
            .post("https://api.stripe.com/v1/customers")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Creates a subscription-mode Checkout Session and returns its URL.
    async fn create_checkout_session(
        &self,
        price_id: String,
        customer_id: String,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        // https://stripe.com/docs/payments/checkout
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("customer".to_string(), customer_id),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .http
            .post("https://api.stripe.com/v1/checkout/sessions")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))
    }

    /// Marks a Stripe subscription to cancel at period end. Local state is
    /// only updated when the resulting webhook arrives.
    async fn cancel_at_period_end(&self, stripe_subscription_id: String) -> Result<()> {
        // https://stripe.com/docs/api/subscriptions/update
        let body = [("cancel_at_period_end", "true".to_string())];
        let resp = self
            .http
            .post(format!(
                "https://api.stripe.com/v1/subscriptions/{}",
                stripe_subscription_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        Self::ensure_success(resp, "cancel subscription").await?;

        Ok(())
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    fn verify_webhook_signature(
        &self,
        payload: Vec<u8>,
        signature_header: String,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in stripe-signature"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(&payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(&payload)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client() -> StripeClient {
        StripeClient::new(
            "sk_test_123".to_string(),
            "whsec_test".to_string(),
            "https://app.example.com/billing/success".to_string(),
            "https://app.example.com/billing/cancel".to_string(),
        )
    }

    fn sign(payload: &str, timestamp: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let client = sample_client();
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let signature = sign(payload, "1700000000", "whsec_test");
        let header = format!("t=1700000000,v1={}", signature);

        let event = client
            .verify_webhook_signature(payload.as_bytes().to_vec(), header)
            .unwrap();

        assert_eq!(event.id, "evt_1");
        assert_eq!(event.type_, "invoice.paid");
    }

    #[test]
    fn rejects_tampered_payload() {
        let client = sample_client();
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let signature = sign(payload, "1700000000", "whsec_test");
        let header = format!("t=1700000000,v1={}", signature);

        let tampered = payload.replace("invoice.paid", "invoice.voided");
        let result = client.verify_webhook_signature(tampered.as_bytes().to_vec(), header);

        assert!(result.is_err());
    }

    #[test]
    fn rejects_signature_from_wrong_secret() {
        let client = sample_client();
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let signature = sign(payload, "1700000000", "whsec_other");
        let header = format!("t=1700000000,v1={}", signature);

        let result = client.verify_webhook_signature(payload.as_bytes().to_vec(), header);

        assert!(result.is_err());
    }

    #[test]
    fn rejects_header_without_v1_part() {
        let client = sample_client();
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;

        let result =
            client.verify_webhook_signature(payload.as_bytes().to_vec(), "t=1700000000".to_string());

        assert!(result.is_err());
    }

    #[test]
    fn subscription_period_falls_back_to_first_item() {
        let object = serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "items": {
                "data": [{
                    "price": {"id": "price_pro"},
                    "current_period_start": 1700000000,
                    "current_period_end": 1702592000
                }]
            }
        });

        let subscription: StripeSubscriptionObject = serde_json::from_value(object).unwrap();

        assert!(subscription.period_start().is_some());
        assert!(subscription.period_end().is_some());
        assert_eq!(subscription.price_id().as_deref(), Some("price_pro"));
    }
}
