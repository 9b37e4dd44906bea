//! Random birthday GIFs from the Giphy search API.

use crate::config::GifConfig;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GifError {
    #[error("gif search is not configured")]
    NotConfigured,

    #[error("gif search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gif search returned no results")]
    NoResults,
}

#[async_trait]
pub trait GifProvider: Send + Sync {
    /// URL of one GIF picked at random from the birthday search results.
    async fn random_birthday_gif(&self) -> Result<String, GifError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<GifObject>,
}

#[derive(Debug, Deserialize)]
struct GifObject {
    images: Images,
}

#[derive(Debug, Deserialize)]
struct Images {
    original: Rendition,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: Option<String>,
}

fn pick_url(response: SearchResponse) -> Result<String, GifError> {
    let urls: Vec<String> = response
        .data
        .into_iter()
        .filter_map(|gif| gif.images.original.url)
        .filter(|url| !url.is_empty())
        .collect();
    urls.choose(&mut rand::thread_rng())
        .cloned()
        .ok_or(GifError::NoResults)
}

pub struct GiphyClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    query: String,
    limit: u32,
    rating: String,
}

impl GiphyClient {
    pub fn new(config: &GifConfig) -> Result<Self, GifError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            query: config.query.clone(),
            limit: config.limit,
            rating: config.rating.clone(),
        })
    }
}

#[async_trait]
impl GifProvider for GiphyClient {
    async fn random_birthday_gif(&self) -> Result<String, GifError> {
        let api_key = self.api_key.as_deref().ok_or(GifError::NotConfigured)?;
        let limit = self.limit.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("api_key", api_key),
                ("q", self.query.as_str()),
                ("limit", limit.as_str()),
                ("rating", self.rating.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;
        pick_url(response)
    }
}
