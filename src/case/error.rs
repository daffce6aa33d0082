use thiserror::Error;

/// Everything that can go wrong with a single case lookup.
///
/// All variants are recoverable: the caller shows the message inline and the
/// user may try again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
  #[error("Please enter a receipt number")]
  EmptyReceipt,

  #[error("Invalid format. Should be 3 letters + 10 digits (e.g., IOE0934989946)")]
  InvalidReceipt(String),

  #[error("Not authenticated. Please log in to USCIS and refresh your session cookie, then try again.")]
  NotAuthenticated,

  #[error("Failed to fetch: HTTP {status}. Make sure your USCIS session is still valid.")]
  Http { status: u16 },

  #[error("Failed to fetch: {0}. Make sure your USCIS session is still valid.")]
  Transport(String),

  #[error("A lookup is already in progress")]
  InFlight,

  #[error("No data returned for this case")]
  NoData,

  #[error("Failed to save case history: {0}")]
  Storage(String),
}

impl LookupError {
  /// Whether this error means the session is no longer authenticated
  pub fn is_auth(&self) -> bool {
    matches!(self, LookupError::NotAuthenticated)
  }
}
