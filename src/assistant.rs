//! Send pipeline: capture → build request → POST → stream the answer.
//! Every failure is caught in `ask` and rendered as an inline error on the output
//! surface. Nothing is retried and the request has no timeout.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Instant;

use crate::capture::{ScreenSources, capture_primary_screen};
use crate::chat::{ChatRequest, build_request, completions_url};
use crate::error::AssistError;
use crate::output::OutputSurface;
use crate::settings::Settings;
use crate::stream::{StreamSummary, read_stream};
use crate::window::WindowHost;

pub struct Assistant<W, S> {
    client: Client,
    window: W,
    sources: S,
}

impl<W: WindowHost, S: ScreenSources> Assistant<W, S> {
    pub fn new(window: W, sources: S) -> Result<Self> {
        let client = Client::builder().build().context("Failed to create HTTP client")?;
        Ok(Self::with_client(client, window, sources))
    }

    pub fn with_client(client: Client, window: W, sources: S) -> Self {
        Self { client, window, sources }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    /// Clears the output, captures the screen and streams the model's answer into
    /// `output`. Returns `None` when the request failed; the error is already on
    /// the output by then.
    pub async fn ask<O>(
        &self,
        user_text: &str,
        settings: &Settings,
        output: &mut O,
    ) -> Option<StreamSummary>
    where
        O: OutputSurface + ?Sized,
    {
        let start = Instant::now();
        output.clear();

        match self.try_ask(user_text, settings, output).await {
            Ok(summary) => {
                log::info!(
                    "Answer complete: {} events ({} skipped), {} chars in {:.1}s",
                    summary.events,
                    summary.skipped,
                    summary.chars,
                    start.elapsed().as_secs_f64()
                );
                Some(summary)
            }
            Err(e) => {
                log::error!("{e}");
                output.append_error(&e.to_string());
                None
            }
        }
    }

    async fn try_ask<O>(
        &self,
        user_text: &str,
        settings: &Settings,
        output: &mut O,
    ) -> Result<StreamSummary, AssistError>
    where
        O: OutputSurface + ?Sized,
    {
        let image = capture_primary_screen(&self.window, &self.sources)?;
        let request = build_request(user_text, &image, settings);

        let mut response = self.send(settings, &request).await?;

        output.begin_answer();
        read_stream(&mut response, output).await
    }

    async fn send(
        &self,
        settings: &Settings,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, AssistError> {
        let url = completions_url(&settings.api_host);
        log::debug!("POST {url} (model {})", request.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistError::HttpStatus { status, body });
        }

        Ok(response)
    }
}
