//! Credential resolution.
//!
//! Decides, for every outbound call, which credential to use: the static
//! environment key, the cached trial record, or a freshly minted trial
//! key. The resolve-or-mint sequence is serialized behind a mutex owned
//! by the resolver so concurrent cold starts produce exactly one mint and
//! one credential-file write.

use std::sync::Arc;

use tokio::sync::Mutex;

use sentinel_common::{CredentialSource, ResolvedCredentials, Settings};

use crate::error::CredentialError;
use crate::store;
use crate::trial::TrialIssuer;

/// Resolves a usable API key for each call.
pub struct CredentialResolver {
    issuer: Arc<dyn TrialIssuer>,
    /// Serializes the resolve-or-mint sequence across concurrent callers.
    resolve_lock: Mutex<()>,
}

impl CredentialResolver {
    /// Creates a resolver minting through the given issuer.
    #[must_use]
    pub fn new(issuer: Arc<dyn TrialIssuer>) -> Self {
        Self {
            issuer,
            resolve_lock: Mutex::new(()),
        }
    }

    /// Resolves credentials, short-circuiting on the first usable source:
    ///
    /// 1. A non-blank static key returns immediately with provenance
    ///    `env`; this path touches neither disk nor network.
    /// 2. A cached record with a usable key, unexpired, and minted for
    ///    the current base URLs returns with provenance `cache`.
    /// 3. Otherwise a trial key is minted, persisted, and returned with
    ///    provenance `trial` — unless auto-trial is disabled.
    ///
    /// Steps 2 and 3 run under the resolver's lock.
    ///
    /// # Errors
    ///
    /// Returns an error when auto-trial is disabled and no other source
    /// applies, when minting fails, or when the minted record cannot be
    /// persisted.
    pub async fn resolve(
        &self,
        settings: &Settings,
    ) -> Result<ResolvedCredentials, CredentialError> {
        if let Some(api_key) = settings.static_api_key() {
            log::debug!("using statically configured API key");
            return Ok(ResolvedCredentials::from_env_key(api_key, settings));
        }

        let _guard = self.resolve_lock.lock().await;

        if let Some(record) = store::load(&settings.credentials_path) {
            if record.has_usable_key()
                && !record.is_expired()
                && record.bases_match(&settings.api_base_url, &settings.token_base_url)
            {
                log::debug!("using cached trial credential");
                return Ok(ResolvedCredentials::from_record(
                    &record,
                    CredentialSource::Cache,
                ));
            }
            log::debug!("cached credential unusable, falling through to mint");
        }

        if settings.no_trial {
            return Err(CredentialError::TrialDisabled);
        }

        let record = self.issuer.mint(settings).await?;
        store::save(&settings.credentials_path, &record).map_err(|source| {
            CredentialError::CacheWrite {
                path: settings.credentials_path.clone(),
                source,
            }
        })?;
        log::info!(
            "minted trial credential, cached at {}",
            settings.credentials_path.display()
        );

        Ok(ResolvedCredentials::from_record(
            &record,
            CredentialSource::Trial,
        ))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use sentinel_common::CredentialRecord;

    use super::*;

    /// Issuer that counts mint calls and hands out a fixed record.
    struct FakeIssuer {
        calls: AtomicUsize,
        api_key: String,
    }

    impl FakeIssuer {
        fn new(api_key: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                api_key: api_key.to_string(),
            })
        }

        fn mint_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TrialIssuer for FakeIssuer {
        async fn mint(&self, settings: &Settings) -> Result<CredentialRecord, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so a concurrent resolver task can reach the lock.
            tokio::task::yield_now().await;
            let mut record = CredentialRecord::new(self.api_key.clone());
            record.expires_at = Some("2099-01-01T00:00:00Z".to_string());
            record.stamp_bases(settings);
            Ok(record)
        }
    }

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings::new(
            "https://sentinelsignal.io",
            "https://sentinel-signal-token-service-prod.fly.dev",
        )
        .unwrap()
        .with_credentials_path(dir.path().join("credentials.json"))
    }

    fn cached_record(settings: &Settings, api_key: &str) -> CredentialRecord {
        let mut record = CredentialRecord::new(api_key);
        record.expires_at = Some(
            (Utc::now() + Duration::days(2)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        );
        record.stamp_bases(settings);
        record
    }

    #[tokio::test]
    async fn test_env_key_wins_and_never_touches_the_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir).with_api_key("ss_env_key");
        let issuer = FakeIssuer::new("ss_trial_unused");
        let resolver = CredentialResolver::new(issuer.clone());

        let resolved = resolver.resolve(&settings).await.unwrap();

        assert_eq!(resolved.api_key(), "ss_env_key");
        assert_eq!(resolved.source, CredentialSource::Env);
        assert_eq!(issuer.mint_count(), 0);
        assert!(!settings.credentials_path.exists());
    }

    #[tokio::test]
    async fn test_valid_cache_short_circuits_the_issuer() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        store::save(
            &settings.credentials_path,
            &cached_record(&settings, "ss_trial_cached"),
        )
        .unwrap();

        let issuer = FakeIssuer::new("ss_trial_unused");
        let resolver = CredentialResolver::new(issuer.clone());
        let resolved = resolver.resolve(&settings).await.unwrap();

        assert_eq!(resolved.api_key(), "ss_trial_cached");
        assert_eq!(resolved.source, CredentialSource::Cache);
        assert_eq!(issuer.mint_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_cache_falls_through_to_mint() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let mut record = cached_record(&settings, "ss_trial_stale");
        record.expires_at = Some(
            (Utc::now() - Duration::days(1)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        );
        store::save(&settings.credentials_path, &record).unwrap();

        let issuer = FakeIssuer::new("ss_trial_fresh");
        let resolver = CredentialResolver::new(issuer.clone());
        let resolved = resolver.resolve(&settings).await.unwrap();

        assert_eq!(resolved.api_key(), "ss_trial_fresh");
        assert_eq!(resolved.source, CredentialSource::Trial);
        assert_eq!(issuer.mint_count(), 1);
    }

    #[tokio::test]
    async fn test_base_mismatch_invalidates_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let mut record = cached_record(&settings, "ss_trial_staging");
        record.api_base_url = Some("https://staging.sentinelsignal.io".to_string());
        store::save(&settings.credentials_path, &record).unwrap();

        let issuer = FakeIssuer::new("ss_trial_prod");
        let resolver = CredentialResolver::new(issuer.clone());
        let resolved = resolver.resolve(&settings).await.unwrap();

        assert_eq!(resolved.source, CredentialSource::Trial);
        assert_eq!(issuer.mint_count(), 1);

        // The stale record is overwritten with the newly minted one.
        let persisted = store::load(&settings.credentials_path).unwrap();
        assert_eq!(persisted.api_key, "ss_trial_prod");
        assert_eq!(persisted.api_base_url.as_deref(), Some(settings.api_base_url.as_str()));
    }

    #[tokio::test]
    async fn test_blank_cached_key_falls_through_to_mint() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        store::save(&settings.credentials_path, &cached_record(&settings, "   ")).unwrap();

        let issuer = FakeIssuer::new("ss_trial_fresh");
        let resolver = CredentialResolver::new(issuer.clone());
        let resolved = resolver.resolve(&settings).await.unwrap();

        assert_eq!(resolved.source, CredentialSource::Trial);
        assert_eq!(issuer.mint_count(), 1);
    }

    #[tokio::test]
    async fn test_no_trial_fails_instead_of_minting() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir).with_no_trial(true);
        let issuer = FakeIssuer::new("ss_trial_unused");
        let resolver = CredentialResolver::new(issuer.clone());

        let err = resolver.resolve(&settings).await.unwrap_err();

        assert!(matches!(err, CredentialError::TrialDisabled));
        assert_eq!(issuer.mint_count(), 0);
        assert!(!settings.credentials_path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_cold_starts_mint_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let issuer = FakeIssuer::new("ss_trial_once");
        let resolver = Arc::new(CredentialResolver::new(issuer.clone()));

        let first = {
            let resolver = Arc::clone(&resolver);
            let settings = settings.clone();
            tokio::spawn(async move { resolver.resolve(&settings).await })
        };
        let second = {
            let resolver = Arc::clone(&resolver);
            let settings = settings.clone();
            tokio::spawn(async move { resolver.resolve(&settings).await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(issuer.mint_count(), 1);
        assert_eq!(first.api_key(), "ss_trial_once");
        assert_eq!(second.api_key(), "ss_trial_once");

        // One caller minted; the other read the freshly written cache.
        let sources = [first.source, second.source];
        assert!(sources.contains(&CredentialSource::Trial));

        let persisted = store::load(&settings.credentials_path).unwrap();
        assert_eq!(persisted.api_key, "ss_trial_once");
    }
}
