//! Order gateway over the broker's REST order API.
//!
//! Status updates reach the engine through a polling pump: the broker's
//! update feed is drained on a short interval and each row is forwarded as
//! an `OrderEvent`. Transport framing is owned entirely by this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broker_core::{GatewayError, OrderEvent, OrderGateway, OrderSpec, OrderStatus};
use common::ExponentialBackoff;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::{ApiCredentials, RequestSigner};
use crate::http::{HttpClient, RestError};

/// Interval between update-feed polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Response from POST /orders/v1/place.
#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    #[serde(rename = "orderId")]
    order_id: String,
}

/// Response from DELETE /orders/v1/{id}.
#[derive(Debug, Deserialize)]
struct CancelOrderResponse {
    cancelled: bool,
}

/// One row of the status/update feed.
#[derive(Debug, Deserialize)]
struct OrderStatusRow {
    #[serde(rename = "orderId")]
    order_id: String,
    status: String,
    #[serde(rename = "fillPrice", default)]
    fill_price: Option<String>,
    #[serde(rename = "filledQty", default)]
    filled_qty: u32,
    #[serde(rename = "timestamp")]
    timestamp_ms: i64,
}

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    orders: Vec<OrderStatusRow>,
}

/// Response from GET /orders/v1/updates.
#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    events: Vec<OrderStatusRow>,
    cursor: i64,
}

fn parse_event(row: OrderStatusRow) -> Option<OrderEvent> {
    let status = OrderStatus::from_api_str(&row.status)?;
    let fill_price = row.fill_price.and_then(|p| p.parse::<Decimal>().ok());

    Some(OrderEvent {
        order_id: row.order_id,
        status,
        fill_price,
        filled_quantity: row.filled_qty,
        timestamp_ms: row.timestamp_ms,
    })
}

/// Map transport errors for order-management calls.
///
/// A 4xx on placement is the broker declining the order.
fn map_order_error(err: RestError) -> GatewayError {
    match err {
        RestError::Unauthorized => GatewayError::Unauthorized,
        RestError::Timeout => GatewayError::Timeout,
        RestError::Connection(msg) => GatewayError::Unavailable(msg),
        RestError::RateLimited { retry_after_ms } => {
            GatewayError::Unavailable(format!("rate limited for {}ms", retry_after_ms))
        }
        RestError::Http { status: 404, message: _ } => GatewayError::OrderNotFound {
            order_id: String::new(),
        },
        RestError::Http { status, message } if (400..500).contains(&status) => {
            GatewayError::Rejected { reason: message }
        }
        RestError::Http { status, message } => {
            GatewayError::Unavailable(format!("HTTP {}: {}", status, message))
        }
        RestError::Parse(msg) | RestError::RequestBuild(msg) => GatewayError::Unavailable(msg),
    }
}

/// Order gateway backed by the broker's REST order API.
pub struct RestOrderGateway {
    http: Arc<HttpClient>,
    credentials: ApiCredentials,
}

impl RestOrderGateway {
    /// Create a gateway against the given base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, credentials: ApiCredentials) -> Result<Self, GatewayError> {
        let http = HttpClient::with_default_timeout(base_url).map_err(map_order_error)?;
        Ok(Self {
            http: Arc::new(http),
            credentials,
        })
    }

    fn now_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn signed_query(&self, params: &[(&str, &str)]) -> String {
        RequestSigner::new(&self.credentials).sign_params(params, Self::now_ms())
    }

    fn auth_headers(&self) -> [(&str, &str); 1] {
        [("X-API-KEY", self.credentials.api_key())]
    }
}

#[async_trait]
impl OrderGateway for RestOrderGateway {
    async fn place_order(&self, spec: &OrderSpec) -> Result<String, GatewayError> {
        let quantity = spec.quantity.to_string();
        let price = spec.price.map(|p| p.to_string());

        let mut params: Vec<(&str, &str)> = vec![
            ("symbol", spec.instrument.as_str()),
            ("side", spec.side.as_api_str()),
            ("type", spec.kind.as_api_str()),
            ("quantity", quantity.as_str()),
            ("tag", spec.tag.as_str()),
        ];
        if let Some(price) = price.as_deref() {
            params.push(("price", price));
        }

        let query = self.signed_query(&params);
        let headers = self.auth_headers();

        tracing::info!(
            instrument = %spec.instrument,
            side = ?spec.side,
            kind = ?spec.kind,
            quantity = spec.quantity,
            price = ?spec.price,
            "placing order"
        );

        let response: PlaceOrderResponse = self
            .http
            .post("/orders/v1/place", Some(&query), Some(&headers))
            .await
            .map_err(map_order_error)?;

        tracing::info!(order_id = %response.order_id, "order placed");
        Ok(response.order_id)
    }

    async fn modify_order(
        &self,
        order_id: &str,
        new_price: Decimal,
    ) -> Result<String, GatewayError> {
        let price = new_price.to_string();
        let params = [("price", price.as_str())];
        let query = self.signed_query(&params);
        let headers = self.auth_headers();
        let path = format!("/orders/v1/{}", order_id);

        let response: PlaceOrderResponse = self
            .http
            .put(&path, Some(&query), Some(&headers))
            .await
            .map_err(|err| match map_order_error(err) {
                GatewayError::OrderNotFound { .. } => GatewayError::OrderNotFound {
                    order_id: order_id.to_string(),
                },
                other => other,
            })?;

        tracing::info!(order_id = %response.order_id, price = %new_price, "order modified");
        Ok(response.order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool, GatewayError> {
        let query = self.signed_query(&[]);
        let headers = self.auth_headers();
        let path = format!("/orders/v1/{}", order_id);

        let response: CancelOrderResponse = self
            .http
            .delete(&path, Some(&query), Some(&headers))
            .await
            .map_err(|err| match map_order_error(err) {
                GatewayError::OrderNotFound { .. } => GatewayError::OrderNotFound {
                    order_id: order_id.to_string(),
                },
                other => other,
            })?;

        tracing::info!(order_id = %order_id, cancelled = response.cancelled, "cancel requested");
        Ok(response.cancelled)
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<OrderEvent>, GatewayError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let http = self.http.clone();
        let credentials = self.credentials.clone();

        tokio::spawn(async move {
            let mut cursor: i64 = 0;
            let mut backoff = ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(60),
                0.1,
            );

            loop {
                let cursor_str = cursor.to_string();
                let params = [("since", cursor_str.as_str())];
                let query = RequestSigner::new(&credentials)
                    .sign_params(&params, Self::now_ms());
                let headers = [("X-API-KEY", credentials.api_key())];

                match http
                    .get::<UpdatesResponse>("/orders/v1/updates", Some(&query), Some(&headers))
                    .await
                {
                    Ok(response) => {
                        backoff.reset();
                        cursor = response.cursor;
                        for row in response.events {
                            let Some(event) = parse_event(row) else {
                                continue;
                            };
                            if tx.send(event).await.is_err() {
                                // Receiver dropped: pump no longer needed.
                                return;
                            }
                        }
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                    Err(RestError::Unauthorized) => {
                        tracing::warn!("update feed unauthorized; stopping pump");
                        return;
                    }
                    Err(err) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "update feed poll failed"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }

                if tx.is_closed() {
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn recover_order_statuses(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<OrderEvent>, GatewayError> {
        let ids = order_ids.join(",");
        let params = [("ids", ids.as_str())];
        let query = self.signed_query(&params);
        let headers = self.auth_headers();

        let response: OrderStatusResponse = self
            .http
            .get("/orders/v1/status", Some(&query), Some(&headers))
            .await
            .map_err(map_order_error)?;

        Ok(response.orders.into_iter().filter_map(parse_event).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_event_known_status() {
        let row = OrderStatusRow {
            order_id: "ord-1".into(),
            status: "FILLED".into(),
            fill_price: Some("100.75".into()),
            filled_qty: 75,
            timestamp_ms: 1_000,
        };

        let event = parse_event(row).unwrap();
        assert_eq!(event.status, OrderStatus::Filled);
        assert_eq!(event.fill_price, Some(dec!(100.75)));
        assert_eq!(event.filled_quantity, 75);
    }

    #[test]
    fn test_parse_event_unknown_status_is_dropped() {
        let row = OrderStatusRow {
            order_id: "ord-1".into(),
            status: "SOMETHING_NEW".into(),
            fill_price: None,
            filled_qty: 0,
            timestamp_ms: 1_000,
        };
        assert!(parse_event(row).is_none());
    }

    #[test]
    fn test_deserialize_updates_response() {
        let json = r#"{
            "events": [
                {"orderId": "ord-1", "status": "OPEN", "timestamp": 1000},
                {"orderId": "ord-1", "status": "FILLED", "fillPrice": "100.75", "filledQty": 75, "timestamp": 2000}
            ],
            "cursor": 17
        }"#;

        let response: UpdatesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.events.len(), 2);
        assert_eq!(response.cursor, 17);
    }

    #[test]
    fn test_order_error_mapping() {
        assert!(matches!(
            map_order_error(RestError::Unauthorized),
            GatewayError::Unauthorized
        ));
        assert!(matches!(
            map_order_error(RestError::Http {
                status: 422,
                message: "insufficient margin".into()
            }),
            GatewayError::Rejected { reason } if reason == "insufficient margin"
        ));
        assert!(matches!(
            map_order_error(RestError::Http {
                status: 404,
                message: String::new()
            }),
            GatewayError::OrderNotFound { .. }
        ));
        assert!(matches!(
            map_order_error(RestError::Http {
                status: 503,
                message: String::new()
            }),
            GatewayError::Unavailable(_)
        ));
    }
}
