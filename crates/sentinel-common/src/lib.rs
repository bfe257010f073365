//! # sentinel-common
//!
//! Shared types for the Sentinel Signal MCP server: process settings
//! resolved from the environment, the persisted credential record, and
//! the in-memory result of credential resolution.
//!
//! ## Example
//!
//! ```
//! use sentinel_common::Settings;
//!
//! let settings = Settings::new(
//!     "https://sentinelsignal.io/",
//!     "https://sentinel-signal-token-service-prod.fly.dev",
//! )?
//! .with_no_trial(true);
//!
//! // Trailing slashes are stripped during normalization.
//! assert_eq!(settings.api_base_url, "https://sentinelsignal.io");
//! # Ok::<(), sentinel_common::SettingsError>(())
//! ```

/// Persisted credential record and per-call resolution result.
pub mod credentials;
/// Process settings resolved once from environment variables.
pub mod settings;

pub use credentials::{CredentialRecord, CredentialSource, ResolvedCredentials};
pub use settings::{Settings, SettingsError};
