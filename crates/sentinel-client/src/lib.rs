//! # sentinel-client
//!
//! Client library for the Sentinel Signal scoring API.
//!
//! This crate owns the two stateful concerns of the MCP server: deciding
//! which credential each outbound call uses (static key, cached trial key,
//! or a freshly minted one) and translating upstream HTTP failures into a
//! stable, actionable error contract.
//!
//! ## Example
//!
//! ```no_run
//! use sentinel_client::SentinelClient;
//! use sentinel_common::Settings;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::from_env()?;
//! let client = SentinelClient::new(settings)?;
//!
//! let limits = client.get_limits().await?;
//! println!("plan limits: {limits}");
//! # Ok(())
//! # }
//! ```

/// Sentinel API client: the four remote operations.
pub mod client;
/// Error taxonomy: credential resolution and classified API errors.
pub mod error;
/// Credential resolution: static key, disk cache, or trial mint.
pub mod resolver;
/// Credential file persistence.
pub mod store;
/// Trial key minting against the token-issuing service.
pub mod trial;

pub use client::SentinelClient;
pub use error::{ApiError, ClientError, CredentialError, ErrorAction};
pub use resolver::CredentialResolver;
pub use trial::{HttpTrialIssuer, TrialIssuer};
