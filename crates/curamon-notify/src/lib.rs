//! Alarm notification delivery.
//!
//! The alarm manager invokes [`AlarmNotifier`] fire-and-forget: delivery
//! failures are logged by the caller and never roll back an alarm
//! transition. The built-in [`push::PushNotifier`] sends an FCM-style data
//! message; [`push::DisabledNotifier`] is the fallback when no push key is
//! configured.

pub mod error;
pub mod push;

use async_trait::async_trait;
pub use error::NotifyError;

/// Downstream alarm notification channel.
#[async_trait]
pub trait AlarmNotifier: Send + Sync {
    /// Delivers an alarm for the given catalog channel with the measured
    /// value already formatted for display.
    async fn send_alarm(&self, channel_id: i64, formatted_value: &str) -> Result<(), NotifyError>;

    /// Returns the channel type name (e.g., `"push"`).
    fn name(&self) -> &str;
}
