// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::EngineConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &EngineConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// GET a URL with basic auth and return the body text, whatever the status.
pub async fn get_text_with_auth(
    client: &reqwest::Client,
    url: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let response = client
        .get(url)
        .basic_auth(username, Some(password))
        .send()
        .await
        .map_err(|e| AppError::fetch(url, e))?;
    log::debug!("HTTP {} - {}", response.status().as_u16(), url);
    response.text().await.map_err(|e| AppError::fetch(url, e))
}
