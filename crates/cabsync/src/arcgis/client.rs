//! HTTP client for an ArcGIS portal and geometry service

use async_trait::async_trait;
use cabsync_common::types::{ProjectedPoint, SourcePoint, Wkid};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::arcgis::{endpoints, types::*};
use crate::config::ArcGisConfig;
use crate::error::{Result, SyncError};
use crate::remote::{Feature, FeatureLayer, FeatureSource, ProjectionService};

/// Layer index of the cabinet layer within its feature service
pub const CABINET_LAYER: u32 = 0;

/// Minutes a generated token stays valid
pub const TOKEN_EXPIRATION_MINUTES: u32 = 60;

/// Authenticated access to the cabinet layer and the geometry service
pub struct ArcGisClient {
    client: Client,
    config: ArcGisConfig,
    token: Option<String>,
}

impl ArcGisClient {
    /// Create an unauthenticated client
    ///
    /// Tokens are generated with `client=referer`, so every request carries
    /// the portal URL as its `Referer`.
    pub fn new(config: ArcGisConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.portal_url)
                .map_err(|_| SyncError::config("ARCGIS_PORTAL_URL is not a valid header value"))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            token: None,
        })
    }

    /// Use an existing token instead of signing in
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Sign in to the portal with the configured named user
    pub async fn authenticate(&mut self) -> Result<()> {
        let url = endpoints::token_url(&self.config.portal_url);
        let expiration = TOKEN_EXPIRATION_MINUTES.to_string();

        let form = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("client", "referer"),
            ("referer", self.config.portal_url.as_str()),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ];

        let body: Value = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let response: TokenResponse = parse_response(body)?;
        self.token = Some(response.token);

        info!(
            portal = %self.config.portal_url,
            user = %self.config.username,
            "Connected to ArcGIS"
        );
        Ok(())
    }

    /// Query parameters shared by every request
    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("f", "json".to_string())];
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }
        params
    }

    async fn get_json(&self, url: &str, extra: &[(&'static str, String)]) -> Result<Value> {
        let mut params = self.base_params();
        params.extend_from_slice(extra);

        let body = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }

    /// Resolve the feature service URL of a catalog item
    async fn service_url(&self, item_id: &str) -> Result<String> {
        let not_found = |reason: String| SyncError::LayerNotFound {
            item_id: item_id.to_string(),
            reason,
        };

        let url = endpoints::item_url(&self.config.portal_url, item_id);
        let body = self.get_json(&url, &[]).await?;
        let item: ItemResponse = parse_response(body).map_err(|e| not_found(e.to_string()))?;

        item.url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| not_found("item has no service URL".to_string()))
    }

    async fn query_page(&self, layer: &FeatureLayer, offset: usize) -> Result<QueryResponse> {
        let url = endpoints::query_url(&layer.url);
        let params = [
            ("where", "1=1".to_string()),
            ("outFields", "*".to_string()),
            ("returnGeometry", "true".to_string()),
            ("resultOffset", offset.to_string()),
        ];
        let body = self.get_json(&url, &params).await?;
        parse_response(body)
    }
}

#[async_trait]
impl FeatureSource for ArcGisClient {
    async fn open_layer(&self, item_id: &str) -> Result<FeatureLayer> {
        let service_url = self.service_url(item_id).await?;
        let url = endpoints::layer_url(&service_url, CABINET_LAYER);

        let body = self.get_json(&url, &[]).await?;
        let info: LayerInfo = parse_response(body)?;
        let spatial_reference = info.wkid();

        info!(layer = %url, wkid = ?spatial_reference.map(|w| w.0), "Opened cabinet layer");
        Ok(FeatureLayer {
            url,
            spatial_reference,
        })
    }

    async fn query_features(&self, layer: &FeatureLayer) -> Result<Vec<Feature>> {
        let mut features = Vec::new();

        loop {
            let page = self.query_page(layer, features.len()).await?;
            let count = page.features.len();
            features.extend(page.features);
            debug!(page = count, total = features.len(), "Fetched feature page");

            if !page.exceeded_transfer_limit || count == 0 {
                break;
            }
        }

        Ok(features)
    }
}

#[async_trait]
impl ProjectionService for ArcGisClient {
    async fn project(
        &self,
        points: &[SourcePoint],
        from: Wkid,
        to: Wkid,
    ) -> Result<Vec<ProjectedPoint>> {
        let url = endpoints::project_url(&self.config.geometry_url);
        let geometries = serde_json::to_string(&PointCollection::new(points))?;

        let mut form = self.base_params();
        form.push(("geometries", geometries));
        form.push(("inSR", from.to_string()));
        form.push(("outSR", to.to_string()));

        let body: Value = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let response: ProjectResponse = parse_response(body)?;
        Ok(response.into_points())
    }
}
