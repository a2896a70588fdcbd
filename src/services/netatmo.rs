// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Netatmo API client.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization-code exchange and token refresh
//! - Measurement fetching (`getmeasure`)
//! - Rate limit and rejected-token detection

use crate::config::Config;
use crate::error::AppError;
use crate::models::{MeasureRequest, MeasureResponse, TokenResponse};
use serde::Deserialize;

/// Scopes requested for every authorization.
pub const NETATMO_SCOPE: &str = "read_station read_thermostat";

/// Netatmo API client.
#[derive(Clone)]
pub struct NetatmoClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl NetatmoClient {
    /// Create a client from application config.
    ///
    /// Every request is bounded by `config.http_timeout`.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.netatmo_api_url.trim_end_matches('/').to_string(),
            client_id: config.netatmo_client_id.clone(),
            client_secret: config.netatmo_client_secret.clone(),
            redirect_uri: config.netatmo_redirect_uri.clone(),
        })
    }

    /// Authorization URL the user is redirected to, bound to `state`.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/oauth2/authorize?\
             client_id={}&\
             redirect_uri={}&\
             scope={}&\
             state={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(NETATMO_SCOPE),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", NETATMO_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| AppError::from_transport("Token exchange failed", e))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token. The response carries a rotated refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::from_transport("Token refresh request failed", e))?;

        self.check_response_json(response).await
    }

    /// Fetch one measurement series.
    pub async fn get_measure(
        &self,
        access_token: &str,
        request: &MeasureRequest,
    ) -> Result<MeasureResponse, AppError> {
        let date_begin = request.date_begin.to_string();
        let date_end = request.date_end.to_string();
        let response = self
            .http
            .get(format!("{}/api/getmeasure", self.base_url))
            .query(&[
                ("access_token", access_token),
                ("device_id", request.source.device_id.as_str()),
                ("module_id", request.source.module_id.as_str()),
                ("scale", request.scale.as_str()),
                ("type", request.kind.measure_types()),
                ("date_begin", date_begin.as_str()),
                ("date_end", date_end.as_str()),
                ("optimize", "false"),
                ("real_time", "true"),
            ])
            .send()
            .await
            .map_err(|e| AppError::from_transport("Measure request failed", e))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Netatmo rate limit hit (429)");
                return Err(AppError::NetworkFailure(
                    AppError::NETATMO_RATE_LIMIT.to_string(),
                ));
            }

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AppError::NetworkFailure(format!(
                    "{}: {}",
                    AppError::NETATMO_TOKEN_ERROR,
                    body
                )));
            }

            return Err(AppError::NetworkFailure(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::from_transport("JSON parse error", e))
    }
}
