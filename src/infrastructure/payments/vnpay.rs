//! VNPay redirect gateway (API version 2.1.0).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;

use super::signing::{encoded_query, hmac_sha512_hex, verify_sha512_hex};
use super::{
    field, invalid_signature, required_field, signing_failed, CheckoutRequest, PaymentGateway,
    WebhookEvent,
};
use crate::config::VnPaySettings;
use crate::domain::PaymentProvider;
use crate::shared::error::AppError;

const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
/// VNPay timestamps are Vietnam local time.
const VN_OFFSET_SECS: i32 = 7 * 3600;

pub struct VnPayGateway {
    settings: VnPaySettings,
}

impl VnPayGateway {
    pub fn new(settings: VnPaySettings) -> Self {
        Self { settings }
    }

    fn create_date(now: DateTime<Utc>) -> String {
        match FixedOffset::east_opt(VN_OFFSET_SECS) {
            Some(offset) => now.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string(),
            None => now.format("%Y%m%d%H%M%S").to_string(),
        }
    }

    fn params(&self, request: &CheckoutRequest, now: DateTime<Utc>) -> BTreeMap<String, String> {
        [
            ("vnp_Amount", (request.amount * 100).to_string()),
            ("vnp_Command", "pay".to_string()),
            ("vnp_CreateDate", Self::create_date(now)),
            ("vnp_CurrCode", "VND".to_string()),
            ("vnp_Locale", "vn".to_string()),
            ("vnp_OrderInfo", format!("Thanh toan don hang {}", request.order_no)),
            ("vnp_ReturnUrl", request.return_url.clone()),
            ("vnp_TmnCode", self.settings.tmn_code.clone()),
            ("vnp_TxnRef", request.provider_ref.clone()),
            ("vnp_Version", "2.1.0".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[async_trait]
impl PaymentGateway for VnPayGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Vnpay
    }

    async fn checkout_url(&self, request: &CheckoutRequest) -> Result<String, AppError> {
        if !self.settings.is_configured() {
            return Err(AppError::BadRequest("VNPay is not configured".to_string()));
        }

        let query = encoded_query(&self.params(request, Utc::now()));
        let hash = hmac_sha512_hex(&self.settings.hash_secret, &query).ok_or_else(signing_failed)?;
        Ok(format!("{}?{}&{}={}", self.settings.pay_url, query, SECURE_HASH, hash))
    }

    fn parse_webhook(&self, payload: &Value) -> Result<WebhookEvent, AppError> {
        let object = payload
            .as_object()
            .ok_or_else(|| AppError::BadRequest("VNPay payload must be an object".to_string()))?;

        if !self.settings.hash_secret.is_empty() {
            let signed: BTreeMap<String, String> = object
                .keys()
                .filter(|k| k.starts_with("vnp_") && *k != SECURE_HASH && *k != SECURE_HASH_TYPE)
                .filter_map(|k| field(payload, k).map(|v| (k.clone(), v)))
                .collect();
            let signature = required_field(payload, SECURE_HASH)?;
            if !verify_sha512_hex(&self.settings.hash_secret, &encoded_query(&signed), &signature) {
                return Err(invalid_signature());
            }
        }

        let response_ok = field(payload, "vnp_ResponseCode").as_deref() == Some("00");
        let status_ok = field(payload, "vnp_TransactionStatus")
            .map(|s| s == "00")
            .unwrap_or(true);

        Ok(WebhookEvent {
            provider_ref: required_field(payload, "vnp_TxnRef")?,
            success: response_ok && status_ok,
            transaction_ref: field(payload, "vnp_TransactionNo"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn gateway(secret: &str) -> VnPayGateway {
        VnPayGateway::new(VnPaySettings {
            tmn_code: "ATL00001".to_string(),
            hash_secret: secret.to_string(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        })
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            intent_id: Uuid::now_v7(),
            provider_ref: "abc123".to_string(),
            amount: 1_550_000,
            order_no: "ATL-1-ABCD".to_string(),
            return_url: "https://shop.vn/payment/return".to_string(),
        }
    }

    #[test]
    fn create_date_is_vietnam_time() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 20, 5, 9).unwrap();
        assert_eq!(VnPayGateway::create_date(now), "20260302030509");
    }

    #[tokio::test]
    async fn checkout_url_is_signed_over_sorted_params() {
        let gateway = gateway("SECRET");
        let url = gateway.checkout_url(&request()).await.unwrap();

        let (base, query) = url.split_once('?').unwrap();
        assert_eq!(base, "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html");
        let (signed, hash) = query.rsplit_once("&vnp_SecureHash=").unwrap();
        assert!(signed.starts_with("vnp_Amount=155000000&vnp_Command=pay&"));
        assert!(signed.contains("vnp_OrderInfo=Thanh+toan+don+hang+ATL-1-ABCD"));
        assert!(signed.contains("vnp_TxnRef=abc123&vnp_Version=2.1.0"));
        assert!(verify_sha512_hex("SECRET", signed, hash));
    }

    #[tokio::test]
    async fn refuses_to_build_urls_without_credentials() {
        let result = gateway("").checkout_url(&request()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    fn signed_callback(secret: &str, response_code: &str) -> Value {
        let params: BTreeMap<String, String> = [
            ("vnp_Amount", "155000000"),
            ("vnp_ResponseCode", response_code),
            ("vnp_TmnCode", "ATL00001"),
            ("vnp_TransactionNo", "14123456"),
            ("vnp_TransactionStatus", response_code),
            ("vnp_TxnRef", "abc123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let hash = hmac_sha512_hex(secret, &encoded_query(&params)).unwrap();

        let mut payload = serde_json::to_value(&params).unwrap();
        payload[SECURE_HASH] = json!(hash);
        payload[SECURE_HASH_TYPE] = json!("HmacSHA512");
        payload
    }

    #[test]
    fn accepts_signed_success_callback() {
        let event = gateway("SECRET").parse_webhook(&signed_callback("SECRET", "00")).unwrap();
        assert_eq!(
            event,
            WebhookEvent {
                provider_ref: "abc123".to_string(),
                success: true,
                transaction_ref: Some("14123456".to_string()),
            }
        );
    }

    #[test]
    fn failure_codes_are_not_success() {
        let event = gateway("SECRET").parse_webhook(&signed_callback("SECRET", "24")).unwrap();
        assert!(!event.success);
    }

    #[test]
    fn rejects_tampered_callback() {
        let mut payload = signed_callback("SECRET", "00");
        payload["vnp_Amount"] = json!("100");
        assert!(gateway("SECRET").parse_webhook(&payload).is_err());
    }

    #[test]
    fn skips_verification_without_secret() {
        let payload = json!({"vnp_TxnRef": "abc123", "vnp_ResponseCode": "00"});
        let event = gateway("").parse_webhook(&payload).unwrap();
        assert!(event.success);
        assert_eq!(event.transaction_ref, None);
    }
}
