//! MoMo wallet gateway (`payWithATM` capture flow).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::signing::{hmac_sha256_hex, verify_sha256_hex};
use super::{
    field, invalid_signature, required_field, signing_failed, with_query_param, CheckoutRequest,
    PaymentGateway, WebhookEvent,
};
use crate::config::MomoSettings;
use crate::domain::PaymentProvider;
use crate::shared::error::AppError;

const REQUEST_TYPE: &str = "payWithATM";

/// Fields covered by the IPN signature, in signing order.
const IPN_SIGNED_FIELDS: [&str; 13] = [
    "accessKey",
    "amount",
    "extraData",
    "message",
    "orderId",
    "orderInfo",
    "orderType",
    "partnerCode",
    "payType",
    "requestId",
    "responseTime",
    "resultCode",
    "transId",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest<'a> {
    partner_code: &'a str,
    access_key: &'a str,
    request_id: String,
    amount: i64,
    order_id: &'a str,
    order_info: String,
    redirect_url: &'a str,
    ipn_url: &'a str,
    extra_data: &'a str,
    request_type: &'a str,
    signature: String,
    lang: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentResponse {
    result_code: i64,
    #[serde(default)]
    pay_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct MomoGateway {
    http: reqwest::Client,
    settings: MomoSettings,
}

impl MomoGateway {
    pub fn new(http: reqwest::Client, settings: MomoSettings) -> Self {
        Self { http, settings }
    }

    async fn request_pay_url(
        &self,
        request: &CreatePaymentRequest<'_>,
    ) -> Result<Option<String>, reqwest::Error> {
        let response: CreatePaymentResponse = self
            .http
            .post(&self.settings.endpoint)
            .json(request)
            .send()
            .await?
            .json()
            .await?;

        if response.result_code == 0 {
            return Ok(response.pay_url);
        }
        warn!(
            result_code = response.result_code,
            message = response.message.as_deref().unwrap_or_default(),
            "MoMo rejected payment creation"
        );
        Ok(None)
    }
}

#[async_trait]
impl PaymentGateway for MomoGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Momo
    }

    async fn checkout_url(&self, request: &CheckoutRequest) -> Result<String, AppError> {
        let s = &self.settings;
        if !s.is_configured() {
            return Err(AppError::BadRequest("MoMo is not configured".to_string()));
        }

        let request_id = request.intent_id.simple().to_string();
        let order_info = format!("Thanh toan don hang {}", request.order_no);
        let raw_signature = format!(
            "accessKey={}&amount={}&extraData=&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
            s.access_key,
            request.amount,
            s.ipn_url,
            request.provider_ref,
            order_info,
            s.partner_code,
            request.return_url,
            request_id,
            REQUEST_TYPE,
        );
        let signature = hmac_sha256_hex(&s.secret_key, &raw_signature).ok_or_else(signing_failed)?;

        let body = CreatePaymentRequest {
            partner_code: &s.partner_code,
            access_key: &s.access_key,
            request_id,
            amount: request.amount,
            order_id: &request.provider_ref,
            order_info,
            redirect_url: &request.return_url,
            ipn_url: &s.ipn_url,
            extra_data: "",
            request_type: REQUEST_TYPE,
            signature,
            lang: "vi",
        };

        match self.request_pay_url(&body).await {
            Ok(Some(pay_url)) => Ok(pay_url),
            Ok(None) => Ok(with_query_param(&request.return_url, "error", "momo_creation_failed")),
            Err(e) => {
                warn!(error = %e, "MoMo payment creation failed");
                Ok(with_query_param(&request.return_url, "error", "momo_creation_failed"))
            }
        }
    }

    fn parse_webhook(&self, payload: &Value) -> Result<WebhookEvent, AppError> {
        if !self.settings.secret_key.is_empty() {
            let raw = IPN_SIGNED_FIELDS
                .iter()
                .map(|key| match *key {
                    "accessKey" => format!("accessKey={}", self.settings.access_key),
                    _ => format!("{}={}", key, field(payload, key).unwrap_or_default()),
                })
                .collect::<Vec<_>>()
                .join("&");
            let signature = required_field(payload, "signature")?;
            if !verify_sha256_hex(&self.settings.secret_key, &raw, &signature) {
                return Err(invalid_signature());
            }
        }

        Ok(WebhookEvent {
            provider_ref: required_field(payload, "orderId")?,
            success: field(payload, "resultCode").as_deref() == Some("0"),
            transaction_ref: field(payload, "transId"),
        })
    }
}
