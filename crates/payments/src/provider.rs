//! Checkout provider contract and the Mercado Pago client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{PaymentError, PaymentStatus, Result};

pub const MERCADO_PAGO_API_URL: &str = "https://api.mercadopago.com";

/// Redirect targets handed to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// The premium item sold at checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub title: String,
    pub unit_price: f64,
    pub currency_id: String,
}

impl Default for CheckoutItem {
    fn default() -> Self {
        Self {
            title: "VoxPromo Premium".to_string(),
            unit_price: 29.90,
            currency_id: "BRL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub payer_email: String,
    pub back_urls: BackUrls,
}

/// A created checkout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub checkout_id: String,
    /// Where the browser must be sent to pay
    pub redirect_url: String,
}

/// One answer from the status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentStatusReport {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub approved_at: Option<DateTime<Utc>>,
}

/// External checkout provider
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<Checkout>;

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatusReport>;
}

#[derive(Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: Value,
    status: PaymentStatus,
    #[serde(default)]
    date_approved: Option<DateTime<Utc>>,
}

/// Mercado Pago クライアント
pub struct MercadoPagoClient {
    base_url: String,
    access_token: String,
    item: CheckoutItem,
    http_client: Client,
}

impl MercadoPagoClient {
    pub fn new(access_token: &str, http_client: Client) -> Self {
        Self {
            base_url: MERCADO_PAGO_API_URL.to_string(),
            access_token: access_token.to_string(),
            item: CheckoutItem::default(),
            http_client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_item(mut self, item: CheckoutItem) -> Self {
        self.item = item;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| PaymentError::UrlError(url::ParseError::EmptyHost))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn error_text(response: reqwest::Response) -> String {
        let status = response.status();
        match response.text().await {
            Ok(body) if !body.is_empty() => format!("{}: {}", status, body),
            _ => status.to_string(),
        }
    }
}

#[async_trait]
impl CheckoutProvider for MercadoPagoClient {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<Checkout> {
        let url = self.endpoint(&["checkout", "preferences"])?;
        let body = json!({
            "items": [{
                "title": self.item.title,
                "quantity": 1,
                "unit_price": self.item.unit_price,
                "currency_id": self.item.currency_id,
            }],
            "payer": { "email": request.payer_email },
            "back_urls": request.back_urls,
            "auto_return": "approved",
        });

        log::debug!("Creating checkout preference at {}", url);
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = Self::error_text(response).await;
            log::error!("Checkout preference creation failed: {}", error_text);
            return Err(PaymentError::InitiationFailed(error_text));
        }

        let preference = response.json::<PreferenceResponse>().await?;
        log::info!("Created checkout preference {}", preference.id);
        Ok(Checkout {
            checkout_id: preference.id,
            redirect_url: preference.init_point,
        })
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatusReport> {
        let url = self.endpoint(&["v1", "payments", payment_id])?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = Self::error_text(response).await;
            log::error!("Status check for payment {} failed: {}", payment_id, error_text);
            return Err(PaymentError::StatusError(error_text));
        }

        let payment = response.json::<PaymentResponse>().await?;
        let reported_id = match payment.id {
            Value::String(id) => id,
            Value::Number(id) => id.to_string(),
            _ => payment_id.to_string(),
        };
        log::debug!("Payment {} reported as {}", reported_id, payment.status);

        Ok(PaymentStatusReport {
            payment_id: reported_id,
            status: payment.status,
            approved_at: payment.date_approved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn back_urls() -> BackUrls {
        BackUrls {
            success: "https://voxpromo.example/premium-confirmado".to_string(),
            failure: "https://voxpromo.example/erro-pagamento".to_string(),
            pending: "https://voxpromo.example/pagamento-pendente".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_checkout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/checkout/preferences"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "payer": { "email": "ana@example.com" },
                "auto_return": "approved",
                "back_urls": { "pending": "https://voxpromo.example/pagamento-pendente" },
                "items": [{ "quantity": 1, "currency_id": "BRL" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pref-1",
                "init_point": "https://mp.example/checkout?pref_id=pref-1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = MercadoPagoClient::new("test-token", Client::new())
            .with_base_url(&mock_server.uri());
        let checkout = client
            .create_checkout(&CheckoutRequest {
                payer_email: "ana@example.com".to_string(),
                back_urls: back_urls(),
            })
            .await
            .unwrap();

        assert_eq!(checkout.checkout_id, "pref-1");
        assert_eq!(
            checkout.redirect_url,
            "https://mp.example/checkout?pref_id=pref-1"
        );
    }

    #[tokio::test]
    async fn test_create_checkout_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/checkout/preferences"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid items"))
            .mount(&mock_server)
            .await;

        let client =
            MercadoPagoClient::new("test-token", Client::new()).with_base_url(&mock_server.uri());
        let err = client
            .create_checkout(&CheckoutRequest {
                payer_email: "ana@example.com".to_string(),
                back_urls: back_urls(),
            })
            .await
            .unwrap_err();

        match err {
            PaymentError::InitiationFailed(msg) => assert!(msg.contains("invalid items")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_payment_status_with_numeric_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payments/123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 123,
                "status": "approved",
                "date_approved": "2024-01-01T00:00:00.000-03:00"
            })))
            .mount(&mock_server)
            .await;

        let client =
            MercadoPagoClient::new("test-token", Client::new()).with_base_url(&mock_server.uri());
        let report = client.payment_status("123").await.unwrap();

        assert_eq!(report.payment_id, "123");
        assert_eq!(report.status, PaymentStatus::Approved);
        assert_eq!(
            report.approved_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_payment_status_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payments/999"))
            .respond_with(ResponseTemplate::new(404).set_body_string("payment not found"))
            .mount(&mock_server)
            .await;

        let client =
            MercadoPagoClient::new("test-token", Client::new()).with_base_url(&mock_server.uri());
        let err = client.payment_status("999").await.unwrap_err();

        assert!(matches!(err, PaymentError::StatusError(_)));
    }
}
