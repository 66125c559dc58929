//! Payment processor REST client (Stripe-compatible, form-encoded).
//!
//! Only the calls this service makes are modelled: creating a subscription
//! checkout session and toggling cancel-at-period-end on a subscription.

use serde::Deserialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Subset of the processor's subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: PriceRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRef {
    pub id: String,
}

impl ProcessorSubscription {
    /// Price of the first line item, used to recover the plan.
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

/// Inputs for a subscription checkout.
pub struct CheckoutParams<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub customer_id: Option<&'a str>,
    pub plan_id: &'a str,
    pub price_id: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

impl PaymentClient {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Option<Self> {
        let api_key = config.payment_api_key.clone()?;
        Some(Self {
            http,
            base_url: config.payment_api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn create_checkout_session(
        &self,
        params: CheckoutParams<'_>,
    ) -> Result<CheckoutSession, AppError> {
        let user_id = params.user_id.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "subscription"),
            ("line_items[0][price]", params.price_id),
            ("line_items[0][quantity]", "1"),
            ("client_reference_id", user_id.as_str()),
            ("success_url", params.success_url.as_str()),
            ("cancel_url", params.cancel_url.as_str()),
            ("metadata[user_id]", user_id.as_str()),
            ("metadata[plan]", params.plan_id),
            ("subscription_data[metadata][user_id]", user_id.as_str()),
            ("subscription_data[metadata][plan]", params.plan_id),
        ];
        match params.customer_id {
            Some(customer) => form.push(("customer", customer)),
            None => form.push(("customer_email", params.email)),
        }

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("checkout request failed: {e}")))?;

        read_json(response).await
    }

    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProcessorSubscription, AppError> {
        let response = self
            .http
            .get(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("subscription lookup failed: {e}")))?;

        read_json(response).await
    }

    /// Set or clear cancel-at-period-end and return the updated subscription.
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<ProcessorSubscription, AppError> {
        let response = self
            .http
            .post(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .bearer_auth(&self.api_key)
            .form(&[(
                "cancel_at_period_end",
                if cancel { "true" } else { "false" },
            )])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("subscription update failed: {e}")))?;

        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream(format!(
            "payment processor responded {status}: {body}"
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Upstream(format!("payment processor returned invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_object_parses_sparse_payload() {
        let sub: ProcessorSubscription = serde_json::from_str(
            r#"{"id":"sub_1","status":"active","metadata":{"plan":"pro"}}"#,
        )
        .unwrap();
        assert_eq!(sub.id, "sub_1");
        assert!(!sub.cancel_at_period_end);
        assert_eq!(sub.metadata.get("plan").map(String::as_str), Some("pro"));
        assert!(sub.current_period_end.is_none());
        assert!(sub.price_id().is_none());
    }

    #[test]
    fn price_comes_from_first_item() {
        let sub: ProcessorSubscription = serde_json::from_str(
            r#"{"id":"sub_1","status":"active","items":{"data":[{"price":{"id":"price_max"}}]}}"#,
        )
        .unwrap();
        assert_eq!(sub.price_id(), Some("price_max"));
    }
}
