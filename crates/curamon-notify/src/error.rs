/// Errors that can occur while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The HTTP request to the push gateway failed outright.
    #[error("Notify: transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The push gateway answered with a non-success status code.
    #[error("Notify: gateway returned HTTP {code}")]
    Status { code: u16 },

    /// The alarmed channel no longer exists in the catalog.
    #[error("Notify: channel {channel_id} not found in catalog")]
    UnknownChannel { channel_id: i64 },

    /// Catalog lookup failed while resolving display names.
    #[error("Notify: catalog lookup failed: {0}")]
    Catalog(#[from] anyhow::Error),
}
