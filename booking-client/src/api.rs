use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use shared::{ReservationId, Scope};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::CancelBody;

const HOST_RESERVATIONS_PATH: &str = "host-reservations/";
const USER_RESERVATIONS_PATH: &str = "user-reservations/";
const LISTINGS_PATH: &str = "listings/";

/// The Remote Booking API as seen by this client. Injected into the
/// synchronizer so tests can substitute a fake.
///
/// List calls return raw records; each one is decoded separately so a single
/// malformed record cannot fail a whole load.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_reservations(&self, scope: Scope) -> Result<Vec<Value>, ApiError>;
    async fn cancel_reservation(&self, id: &ReservationId) -> Result<(), ApiError>;
    async fn list_listings(&self) -> Result<Vec<Value>, ApiError>;
}

#[async_trait]
impl<T: BookingApi + ?Sized> BookingApi for Arc<T> {
    async fn list_reservations(&self, scope: Scope) -> Result<Vec<Value>, ApiError> {
        (**self).list_reservations(scope).await
    }

    async fn cancel_reservation(&self, id: &ReservationId) -> Result<(), ApiError> {
        (**self).cancel_reservation(id).await
    }

    async fn list_listings(&self) -> Result<Vec<Value>, ApiError> {
        (**self).list_listings().await
    }
}

pub struct HttpBookingApi {
    client: Client,
    config: ApiConfig,
    host_reservations_url: Url,
    user_reservations_url: Url,
    listings_url: Url,
}

impl HttpBookingApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            host_reservations_url: config.endpoint(HOST_RESERVATIONS_PATH)?,
            user_reservations_url: config.endpoint(USER_RESERVATIONS_PATH)?,
            listings_url: config.endpoint(LISTINGS_PATH)?,
            config,
        })
    }

    fn cancel_url(&self, id: &ReservationId) -> Result<Url, ApiError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidEndpoint(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(["reservations", id.as_str(), "cancel", ""]);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Booking API request timed out: {}", e);
            }
            ApiError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn list_reservations(&self, scope: Scope) -> Result<Vec<Value>, ApiError> {
        let url = match scope {
            Scope::Host => &self.host_reservations_url,
            Scope::Guest => &self.user_reservations_url,
        };
        debug!("GET {} ({} scope)", url, scope);

        let response = self.send(self.client.get(url.clone())).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn cancel_reservation(&self, id: &ReservationId) -> Result<(), ApiError> {
        let url = self.cancel_url(id)?;
        debug!("PATCH {}", url);

        self.send(self.client.patch(url).json(&CancelBody::new())).await?;
        Ok(())
    }

    async fn list_listings(&self) -> Result<Vec<Value>, ApiError> {
        debug!("GET {}", self.listings_url);

        let response = self.send(self.client.get(self.listings_url.clone())).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }
}
