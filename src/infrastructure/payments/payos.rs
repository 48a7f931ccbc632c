//! PayOS payment-link gateway.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::signing::{hmac_sha256_hex, raw_query, verify_sha256_hex};
use super::{
    field, invalid_signature, required_field, signing_failed, with_query_param, CheckoutRequest,
    PaymentGateway, WebhookEvent,
};
use crate::config::PayOsSettings;
use crate::domain::PaymentProvider;
use crate::shared::error::AppError;

/// PayOS rejects longer descriptions.
const MAX_DESCRIPTION_LEN: usize = 25;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkRequest<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    cancel_url: &'a str,
    return_url: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct CreateLinkResponse {
    code: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    data: Option<CreateLinkData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkData {
    checkout_url: String,
}

pub struct PayOsGateway {
    http: reqwest::Client,
    settings: PayOsSettings,
}

impl PayOsGateway {
    pub fn new(http: reqwest::Client, settings: PayOsSettings) -> Self {
        Self { http, settings }
    }

    async fn create_link(
        &self,
        body: &CreateLinkRequest<'_>,
    ) -> Result<Option<String>, reqwest::Error> {
        let response: CreateLinkResponse = self
            .http
            .post(format!("{}/v2/checkout/create", self.settings.api_url.trim_end_matches('/')))
            .header("x-client-id", &self.settings.client_id)
            .header("x-api-key", &self.settings.api_key)
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match (response.code.as_str(), response.data) {
            ("00", Some(data)) => Ok(Some(data.checkout_url)),
            (code, _) => {
                warn!(
                    code,
                    desc = response.desc.as_deref().unwrap_or_default(),
                    "PayOS rejected payment link"
                );
                Ok(None)
            }
        }
    }
}

/// PayOS signs webhook `data` as sorted `key=value` pairs; null becomes empty.
fn webhook_signing_string(data: &serde_json::Map<String, Value>) -> String {
    let pairs: BTreeMap<String, String> = data
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();
    raw_query(&pairs)
}

#[async_trait]
impl PaymentGateway for PayOsGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Payos
    }

    async fn checkout_url(&self, request: &CheckoutRequest) -> Result<String, AppError> {
        let s = &self.settings;
        if !s.is_configured() {
            return Err(AppError::BadRequest("PayOS is not configured".to_string()));
        }

        let order_code: i64 = request
            .provider_ref
            .parse()
            .map_err(|_| AppError::Internal("PayOS order code must be numeric".to_string()))?;
        let description: String = request.order_no.chars().take(MAX_DESCRIPTION_LEN).collect();

        let data = format!(
            "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
            request.amount, request.return_url, description, order_code, request.return_url
        );
        let body = CreateLinkRequest {
            order_code,
            amount: request.amount,
            description: &description,
            cancel_url: &request.return_url,
            return_url: &request.return_url,
            signature: hmac_sha256_hex(&s.checksum_key, &data).ok_or_else(signing_failed)?,
        };

        let fallback = || {
            with_query_param(&request.return_url, "payos_txn", &request.intent_id.to_string())
        };
        match self.create_link(&body).await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Ok(fallback()),
            Err(e) => {
                warn!(error = %e, "PayOS payment link creation failed");
                Ok(fallback())
            }
        }
    }

    fn parse_webhook(&self, payload: &Value) -> Result<WebhookEvent, AppError> {
        let data = payload
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::BadRequest("PayOS webhook has no data".to_string()))?;

        if !self.settings.checksum_key.is_empty() {
            let signature = required_field(payload, "signature")?;
            let signed = webhook_signing_string(data);
            if !verify_sha256_hex(&self.settings.checksum_key, &signed, &signature) {
                return Err(invalid_signature());
            }
        }

        let data = Value::Object(data.clone());
        Ok(WebhookEvent {
            provider_ref: required_field(&data, "orderCode")?,
            success: field(payload, "code").as_deref() == Some("00"),
            transaction_ref: field(&data, "reference"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    fn settings(api_url: String) -> PayOsSettings {
        PayOsSettings {
            client_id: "client".to_string(),
            api_key: "key".to_string(),
            checksum_key: "CHECKSUM".to_string(),
            api_url,
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            intent_id: Uuid::now_v7(),
            provider_ref: "1712345678901".to_string(),
            amount: 300_000,
            order_no: "ATL-1712345678901-ABCD".to_string(),
            return_url: "https://shop.vn/return".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_payment_link_with_credentials() {
        let server = MockServer::start_async().await;
        let expected_signature = hmac_sha256_hex(
            "CHECKSUM",
            "amount=300000&cancelUrl=https://shop.vn/return&description=ATL-1712345678901-ABCD&orderCode=1712345678901&returnUrl=https://shop.vn/return",
        )
        .unwrap();
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/checkout/create")
                    .header("x-client-id", "client")
                    .header("x-api-key", "key")
                    .json_body_partial(
                        json!({"orderCode": 1712345678901i64, "amount": 300000, "signature": expected_signature})
                            .to_string(),
                    );
                then.status(200).json_body(json!({
                    "code": "00",
                    "desc": "success",
                    "data": {"checkoutUrl": "https://pay.payos.vn/web/abc"}
                }));
            })
            .await;

        let gateway = PayOsGateway::new(reqwest::Client::new(), settings(server.base_url()));
        let url = gateway.checkout_url(&request()).await.unwrap();

        create.assert_async().await;
        assert_eq!(url, "https://pay.payos.vn/web/abc");
    }

    #[tokio::test]
    async fn falls_back_to_return_url_on_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(500).body("oops");
            })
            .await;

        let request = request();
        let gateway = PayOsGateway::new(reqwest::Client::new(), settings(server.base_url()));
        let url = gateway.checkout_url(&request).await.unwrap();
        assert_eq!(url, format!("https://shop.vn/return?payos_txn={}", request.intent_id));
    }

    #[test]
    fn verifies_webhook_data_signature() {
        let data = json!({
            "orderCode": 1712345678901i64,
            "amount": 300000,
            "description": "ATL-1712345678901-ABCD",
            "reference": "FT2401",
            "counterAccountName": null,
        });
        let signature = hmac_sha256_hex(
            "CHECKSUM",
            "amount=300000&counterAccountName=&description=ATL-1712345678901-ABCD&orderCode=1712345678901&reference=FT2401",
        )
        .unwrap();
        let payload = json!({"code": "00", "desc": "success", "data": data, "signature": signature});

        let gateway = PayOsGateway::new(reqwest::Client::new(), settings(String::new()));
        let event = gateway.parse_webhook(&payload).unwrap();
        assert_eq!(
            event,
            WebhookEvent {
                provider_ref: "1712345678901".to_string(),
                success: true,
                transaction_ref: Some("FT2401".to_string()),
            }
        );

        let mut tampered = payload.clone();
        tampered["data"]["amount"] = json!(1);
        assert!(gateway.parse_webhook(&tampered).is_err());
    }
}
