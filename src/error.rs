//! Error types for the AzureRM provider core.

use thiserror::Error;

/// Errors that can occur while expanding identities or mutating workflows.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// User configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists and must be imported before it can be managed.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// A remote document did not have the expected shape.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The remote API failed; the message is propagated unchanged.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Invalid request from the caller, such as a malformed resource ID.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::InvalidState(msg) => msg,
            Self::Upstream(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Whether this error means the remote resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Prefix the message with `context`, keeping the variant.
    ///
    /// Serialization errors carry no message of their own and become
    /// [`ProviderError::InvalidState`].
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            Self::NotFound(msg) => Self::NotFound(wrap(msg)),
            Self::Validation(msg) => Self::Validation(wrap(msg)),
            Self::Configuration(msg) => Self::Configuration(wrap(msg)),
            Self::Serialization(err) => Self::InvalidState(wrap(err.to_string())),
            Self::AlreadyExists(msg) => Self::AlreadyExists(wrap(msg)),
            Self::InvalidState(msg) => Self::InvalidState(wrap(msg)),
            Self::Upstream(msg) => Self::Upstream(wrap(msg)),
            Self::DeadlineExceeded(msg) => Self::DeadlineExceeded(wrap(msg)),
            Self::InvalidRequest(msg) => Self::InvalidRequest(wrap(msg)),
        }
    }

    /// Build the "import as existing" signal for a resource that is already
    /// present remotely but absent from state.
    ///
    /// # Examples
    ///
    /// ```
    /// use azurerm_provider_core::ProviderError;
    ///
    /// let err = ProviderError::import_as_exists("azurerm_logic_app_action_custom", "/x/actions/a");
    /// assert!(err.message().contains("needs to be imported"));
    /// ```
    pub fn import_as_exists(resource_name: &str, id: impl AsRef<str>) -> Self {
        Self::AlreadyExists(format!(
            "A resource with the ID {:?} already exists - to be managed via Terraform this \
             resource needs to be imported into the State. Please see the resource \
             documentation for {:?} for more information.",
            id.as_ref(),
            resource_name
        ))
    }
}
