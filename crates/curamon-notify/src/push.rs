use crate::{AlarmNotifier, NotifyError};
use async_trait::async_trait;
use curamon_storage::CatalogSource;
use std::sync::Arc;

/// Default push gateway endpoint (FCM legacy send API).
pub const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Push-notification channel.
///
/// Resolves the alarmed channel's display names through the catalog and
/// posts a data message to the configured gateway. Delivery is best-effort;
/// the caller decides what to do with errors.
pub struct PushNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    catalog: Arc<dyn CatalogSource>,
}

impl PushNotifier {
    pub fn new(endpoint: &str, api_key: &str, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            catalog,
        }
    }
}

#[async_trait]
impl AlarmNotifier for PushNotifier {
    async fn send_alarm(&self, channel_id: i64, formatted_value: &str) -> Result<(), NotifyError> {
        let channel_display = self
            .catalog
            .channel_display(channel_id)?
            .ok_or(NotifyError::UnknownChannel { channel_id })?;

        let body = serde_json::json!({
            "data": {
                "type": "sensor_range_alarm",
                "site_name": channel_display.site_name,
                "sensor_name": channel_display.sensor_name,
                "channel_name": channel_display.channel_name,
                "value": formatted_value,
            },
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(
                channel_id,
                status = status.as_u16(),
                "Push gateway rejected alarm notification"
            );
            return Err(NotifyError::Status {
                code: status.as_u16(),
            });
        }

        tracing::info!(
            channel_id,
            site = %channel_display.site_name,
            sensor = %channel_display.sensor_name,
            channel = %channel_display.channel_name,
            value = %formatted_value,
            "Alarm notification sent"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "push"
    }
}

/// No-op channel used when no push API key is configured.
pub struct DisabledNotifier;

#[async_trait]
impl AlarmNotifier for DisabledNotifier {
    async fn send_alarm(&self, channel_id: i64, formatted_value: &str) -> Result<(), NotifyError> {
        tracing::warn!(
            channel_id,
            value = %formatted_value,
            "Push notifications disabled, skipping alarm notification"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
