//! Provider configuration.
//!
//! The configuration arrives as JSON from the plugin host. Timeouts accept
//! integer seconds or human-readable durations:
//!
//! ```
//! use azurerm_provider_core::config::ProviderConfig;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let config = ProviderConfig::from_value(json!({
//!     "subscription_id": "00000000-0000-0000-0000-000000000000",
//!     "timeouts": {"update": "45m", "read": 120}
//! }))
//! .unwrap();
//!
//! assert_eq!(config.timeouts.update, Duration::from_secs(45 * 60));
//! assert_eq!(config.timeouts.read, Duration::from_secs(120));
//! assert_eq!(config.timeouts.create, Duration::from_secs(30 * 60));
//! ```

use std::fmt;
use std::time::Duration;

use serde::de::{Error as SerdeError, Unexpected, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::ProviderError;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, StringValidator,
};
use crate::validation::validate;

/// Top-level provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Subscription all resource IDs are scoped to.
    pub subscription_id: String,
    /// Tenant used for authentication, if not the subscription's home tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Per-operation deadlines.
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    /// Validate the raw configuration against [`ProviderConfig::schema`] and
    /// deserialize it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        let diagnostics = validate(&Self::schema(), &value);
        if let Some(first) = diagnostics.first() {
            let message = match &first.detail {
                Some(detail) => format!("{}: {}", first.summary, detail),
                None => first.summary.clone(),
            };
            return Err(ProviderError::Configuration(message));
        }

        let config: Self = serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        debug!(subscription_id = %config.subscription_id, timeouts = ?config.timeouts, "parsed provider configuration");
        Ok(config)
    }

    /// The declarative description of the configuration.
    pub fn schema() -> Schema {
        let timeout = || Attribute::new(AttributeType::Dynamic, AttributeFlags::optional());

        Schema::v0()
            .with_attribute(
                "subscription_id",
                Attribute::required_string()
                    .with_description("The Subscription ID which should be used.")
                    .with_validator(StringValidator::NotEmpty),
            )
            .with_attribute(
                "tenant_id",
                Attribute::optional_string().with_validator(StringValidator::NotEmpty),
            )
            .with_block(
                "timeouts",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("create", timeout())
                        .with_attribute("read", timeout())
                        .with_attribute("update", timeout())
                        .with_attribute("delete", timeout()),
                ),
            )
    }
}

/// Deadlines for remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Timeouts {
    /// Deadline for creating a resource.
    #[serde(default = "Timeouts::default_create", deserialize_with = "duration")]
    pub create: Duration,
    /// Deadline for reading a resource.
    #[serde(default = "Timeouts::default_read", deserialize_with = "duration")]
    pub read: Duration,
    /// Deadline for updating a resource.
    #[serde(default = "Timeouts::default_update", deserialize_with = "duration")]
    pub update: Duration,
    /// Deadline for deleting a resource.
    #[serde(default = "Timeouts::default_delete", deserialize_with = "duration")]
    pub delete: Duration,
}

impl Timeouts {
    fn default_create() -> Duration {
        Duration::from_secs(30 * 60)
    }

    fn default_read() -> Duration {
        Duration::from_secs(5 * 60)
    }

    fn default_update() -> Duration {
        Duration::from_secs(30 * 60)
    }

    fn default_delete() -> Duration {
        Duration::from_secs(30 * 60)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Self::default_create(),
            read: Self::default_read(),
            update: Self::default_update(),
            delete: Self::default_delete(),
        }
    }
}

// Accepts either integer seconds or a humantime string such as "1h30m".
fn duration<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct V;

    impl Visitor<'_> for V {
        type Value = Duration;

        fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            fmt.write_str("a duration in seconds or a string such as \"30m\"")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Duration, E>
        where
            E: SerdeError,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Duration, E>
        where
            E: SerdeError,
        {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_str<E>(self, v: &str) -> Result<Duration, E>
        where
            E: SerdeError,
        {
            humantime::parse_duration(v).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_any(V)
}
