use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::config::Config;
use crate::decoder::{decode_document, decode_sse};
use crate::error::{CoreResult, RecallError};
use crate::http_client::{HttpClient, RequestCtx, ResponseBody};
use crate::model::{GenerateRequest, NewPresentation, OrderUpdate, Presentation, SlideUpdate};
use crate::service::PresentationService;
use crate::stream::BoxStreamEv;
use crate::telemetry::{KEY_LATENCY_MS, KEY_PRESENTATION_ID, KEY_SLIDE_ID};

/// HTTP client for the RecallAI backend.
#[derive(Debug, Clone)]
pub struct RecallApi {
    http: HttpClient,
    base: String,
    data_prefix: String,
    idle_timeout: Option<Duration>,
}

impl RecallApi {
    pub fn new(http: HttpClient, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            data_prefix: crate::decoder::DATA_PREFIX.to_string(),
            idle_timeout: None,
        }
    }

    /// Build from config, reading the bearer token from `api.token_env` if set.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        cfg.validate()?;
        let mut http = HttpClient::from_cfg(&cfg.http)?;
        match std::env::var(&cfg.api.token_env) {
            Ok(token) if !token.trim().is_empty() => {
                http = http.with_bearer(SecretString::new(token.into()));
            }
            _ => debug!(env = %cfg.api.token_env, "no bearer token configured"),
        }
        Ok(Self::new(http, cfg.base_url()).with_stream(&cfg.stream.data_prefix, cfg.stream.idle_timeout()))
    }

    pub fn with_stream(mut self, data_prefix: &str, idle_timeout: Option<Duration>) -> Self {
        self.data_prefix = data_prefix.to_string();
        self.idle_timeout = idle_timeout;
        self
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        RecallApi::new(
            HttpClient::new_default()
                .unwrap()
                .with_bearer(SecretString::new("test-token".into())),
            server_base,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Base URL plus one percent-encoded path segment per element, so ids can carry `/`, `#` or `?`.
    fn endpoint(&self, segments: &[&str]) -> CoreResult<String> {
        let mut url = reqwest::Url::parse(&self.base)
            .map_err(|e| RecallError::Validation(format!("bad base url `{}`: {e}", self.base)))?;
        url.path_segments_mut()
            .map_err(|_| RecallError::Validation(format!("base url `{}` cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    pub async fn list_presentations(&self) -> CoreResult<Vec<Presentation>> {
        let (list, _lat) = self
            .http
            .send_json::<(), Vec<Presentation>>(Method::GET, &self.url("/presentations"), None, &RequestCtx::default())
            .await?;
        Ok(list)
    }

    pub async fn get_presentation(&self, id: &str) -> CoreResult<Presentation> {
        let (p, _lat) = self
            .http
            .send_json::<(), Presentation>(
                Method::GET,
                &self.endpoint(&["presentations", id])?,
                None,
                &RequestCtx::default(),
            )
            .await?;
        Ok(p)
    }

    pub async fn create_presentation(&self, body: &NewPresentation) -> CoreResult<Presentation> {
        let (p, _lat) = self
            .http
            .send_json::<_, Presentation>(Method::POST, &self.url("/presentations"), Some(body), &RequestCtx::default())
            .await?;
        Ok(p)
    }

    pub async fn delete_presentation(&self, id: &str) -> CoreResult<()> {
        self.http
            .send_unit::<()>(
                Method::DELETE,
                &self.endpoint(&["presentations", id])?,
                None,
                &RequestCtx::default(),
            )
            .await?;
        info!({ KEY_PRESENTATION_ID } = id, "presentation deleted");
        Ok(())
    }
}

#[async_trait]
impl PresentationService for RecallApi {
    fn name(&self) -> &str {
        "recall-api"
    }

    async fn generate(&self, req: GenerateRequest) -> CoreResult<BoxStreamEv> {
        let body = self
            .http
            .post_sse(&self.url("/chat/generate"), &req, self.idle_timeout, &RequestCtx::default())
            .await?;
        Ok(match body {
            ResponseBody::Lines(lines) => decode_sse(lines, self.data_prefix.clone()),
            ResponseBody::Document(text) => {
                debug!("generation answered with a single json document");
                futures::stream::iter(decode_document(&self.data_prefix, &text)).boxed()
            }
        })
    }

    async fn update_slide(&self, slide_id: &str, content: &str) -> CoreResult<()> {
        let body = SlideUpdate { content: content.to_string() };
        let latency = self
            .http
            .send_unit(
                Method::PUT,
                &self.endpoint(&["chat", "slides", slide_id])?,
                Some(&body),
                &RequestCtx::default(),
            )
            .await?;
        debug!({ KEY_SLIDE_ID } = slide_id, { KEY_LATENCY_MS } = latency, "slide update confirmed");
        Ok(())
    }

    async fn confirm_order(&self, presentation_id: Option<&str>, order: &[String]) -> CoreResult<()> {
        // Unsaved decks have nowhere to store order.
        let Some(id) = presentation_id else {
            return Ok(());
        };
        let body = OrderUpdate { slide_order: order.to_vec() };
        self.http
            .send_unit(
                Method::PUT,
                &self.endpoint(&["presentations", id])?,
                Some(&body),
                &RequestCtx::default(),
            )
            .await?;
        debug!({ KEY_PRESENTATION_ID } = id, "slide order confirmed");
        Ok(())
    }
}
