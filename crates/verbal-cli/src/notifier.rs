//! Webhook delivery of status changes.

use std::time::Duration;

use anyhow::Context as _;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;
use verbal_core::{
  minute::{Minute, MinuteStatus},
  notify::{NoopNotifier, NotifyError, StatusNotifier},
};

use crate::settings::NotifierSettings;

/// Body POSTed for every status change.
#[derive(Debug, Serialize)]
pub struct StatusEvent<'a> {
  pub minute_id:   Uuid,
  pub num:         &'a str,
  pub adherent_id: Uuid,
  pub status:      MinuteStatus,
}

impl<'a> StatusEvent<'a> {
  pub fn new(minute: &'a Minute, status: MinuteStatus) -> Self {
    Self {
      minute_id: minute.minute_id,
      num: &minute.num,
      adherent_id: minute.adherent_id,
      status,
    }
  }
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WebhookNotifier {
  client: Client,
  url:    String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, url: url.into() })
  }
}

impl StatusNotifier for WebhookNotifier {
  async fn status_changed<'a>(
    &'a self,
    minute: &'a Minute,
    status: MinuteStatus,
  ) -> Result<(), NotifyError> {
    let resp = self
      .client
      .post(&self.url)
      .json(&StatusEvent::new(minute, status))
      .send()
      .await
      .map_err(|e| NotifyError::Transport(e.to_string()))?;

    if !resp.status().is_success() {
      return Err(NotifyError::Rejected(format!("{} returned {}", self.url, resp.status())));
    }
    tracing::debug!(minute_id = %minute.minute_id, ?status, "webhook delivered");
    Ok(())
  }
}

/// The notifier chosen by configuration.
#[derive(Clone)]
pub enum Notifier {
  Noop(NoopNotifier),
  Webhook(WebhookNotifier),
}

impl Notifier {
  pub fn from_settings(settings: &NotifierSettings) -> anyhow::Result<Self> {
    match &settings.webhook_url {
      Some(url) => Ok(Self::Webhook(WebhookNotifier::new(
        url.clone(),
        Duration::from_secs(settings.timeout_secs),
      )?)),
      None => Ok(Self::Noop(NoopNotifier)),
    }
  }
}

impl StatusNotifier for Notifier {
  async fn status_changed<'a>(
    &'a self,
    minute: &'a Minute,
    status: MinuteStatus,
  ) -> Result<(), NotifyError> {
    match self {
      Self::Noop(n) => n.status_changed(minute, status).await,
      Self::Webhook(n) => n.status_changed(minute, status).await,
    }
  }
}
