//! Cache-aside group membership validation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use groupguard_cache::TtlCache;
use groupguard_core::error::Result;
use groupguard_core::traits::GroupMembershipProvider;
use groupguard_core::types::{AccessToken, Entry, MembershipCheck};

use crate::config::ValidatorConfig;
use crate::stats::{ValidatorStats, ValidatorStatsSnapshot};

/// Result of one upstream fetch, shared by every caller that waited on it.
#[derive(Clone, Debug)]
struct FetchOutcome {
    /// Allowed groups the fetch was issued with
    allowed_groups: Vec<String>,
    check: MembershipCheck,
}

type SharedFetch = Shared<BoxFuture<'static, Result<FetchOutcome>>>;

/// A fetch is only shared between callers presenting the same credential.
type InFlightKey = (String, AccessToken);
type InFlight = Mutex<HashMap<InFlightKey, SharedFetch>>;

/// Removes the in-flight marker once the caller that created it is done,
/// including when that caller is cancelled mid-fetch.
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    key: InFlightKey,
    fetch: SharedFetch,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(&self.key)
            .is_some_and(|current| current.ptr_eq(&self.fetch))
        {
            in_flight.remove(&self.key);
        }
    }
}

/// Validates group membership through a TTL cache in front of an upstream
/// provider.
///
/// # Flow
/// 1. Look the user up in the cache
/// 2. Miss: ask the provider for a full fetch and cache the membership it
///    returns (best effort)
/// 3. Hit: ask the provider to decide using the cached membership
///
/// Concurrent misses for one user and one access token share a single
/// upstream fetch. Callers with a different token always reach the provider
/// with their own credential.
pub struct MembershipValidator {
    provider: Arc<dyn GroupMembershipProvider>,
    cache: TtlCache,
    in_flight: InFlight,
    stats: Arc<ValidatorStats>,
}

impl MembershipValidator {
    /// Creates a validator whose cache entries live for `ttl`.
    pub fn new(provider: Arc<dyn GroupMembershipProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            cache: TtlCache::new(ttl),
            in_flight: Mutex::new(HashMap::new()),
            stats: Arc::new(ValidatorStats::default()),
        }
    }

    /// Creates a validator from configuration.
    pub fn with_config(provider: Arc<dyn GroupMembershipProvider>, config: &ValidatorConfig) -> Self {
        Self::new(provider, config.ttl())
    }

    /// Returns which of `allowed_groups` the user belongs to.
    ///
    /// # Errors
    ///
    /// Any upstream error, unchanged. Failing to cache a fetched membership is
    /// logged and counted but never returned.
    #[instrument(skip(self, token), fields(provider = self.provider.name()))]
    pub async fn validate(
        &self,
        email: &str,
        allowed_groups: &[String],
        token: &AccessToken,
    ) -> Result<Vec<String>> {
        if let Some(cached) = self.cache.get(&[email]).into_iter().next() {
            self.stats.record_hit();
            debug!(groups = cached.values.len(), "Group cache hit");
            return self
                .check_with_prior(email, allowed_groups, token, &cached.values)
                .await;
        }

        self.stats.record_miss();
        debug!("Group cache miss");
        self.fetch_coalesced(email, allowed_groups, token).await
    }

    /// Drops the cached membership of `email`, forcing the next validation
    /// to fetch it again.
    pub fn invalidate(&self, email: &str) {
        self.cache.purge(&[email]);
    }

    /// Returns the underlying cache.
    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Returns the upstream provider's name.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Returns validator counters.
    pub fn stats(&self) -> ValidatorStatsSnapshot {
        self.stats.snapshot()
    }

    async fn check_with_prior(
        &self,
        email: &str,
        allowed_groups: &[String],
        token: &AccessToken,
        prior_membership: &[String],
    ) -> Result<Vec<String>> {
        let check = self
            .provider
            .check_membership(email, allowed_groups, token, prior_membership)
            .await
            .map_err(|err| {
                self.stats.record_upstream_error();
                warn!(provider = self.provider.name(), error = %err, "Upstream membership check failed");
                err
            })?;

        Ok(check.valid_groups)
    }

    async fn fetch_coalesced(
        &self,
        email: &str,
        allowed_groups: &[String],
        token: &AccessToken,
    ) -> Result<Vec<String>> {
        let key: InFlightKey = (email.to_string(), token.clone());
        let (fetch, guard) = {
            let mut in_flight = self.in_flight.lock();
            if let Some(existing) = in_flight.get(&key).cloned() {
                (existing, None)
            } else {
                let fetch = self.start_fetch(email, allowed_groups, token);
                in_flight.insert(key.clone(), fetch.clone());
                let guard = InFlightGuard {
                    in_flight: &self.in_flight,
                    key,
                    fetch: fetch.clone(),
                };
                (fetch, Some(guard))
            }
        };

        if guard.is_none() {
            self.stats.record_coalesced();
            debug!("Joining in-flight membership fetch");
        }

        let outcome = fetch.await;
        drop(guard);
        let outcome = outcome?;

        if outcome.allowed_groups == allowed_groups {
            return Ok(outcome.check.valid_groups);
        }

        // Someone else's fetch answered a different question; reuse the
        // membership it brought back.
        self.stats.record_follow_up();
        if outcome.check.membership.is_empty() {
            let check = fetch_and_store(
                self.provider.as_ref(),
                &self.cache,
                &self.stats,
                email,
                allowed_groups,
                token,
            )
            .await?;
            return Ok(check.valid_groups);
        }

        self.check_with_prior(email, allowed_groups, token, &outcome.check.membership)
            .await
    }

    fn start_fetch(&self, email: &str, allowed_groups: &[String], token: &AccessToken) -> SharedFetch {
        let provider = Arc::clone(&self.provider);
        let cache = self.cache.clone();
        let stats = Arc::clone(&self.stats);
        let email = email.to_string();
        let allowed_groups = allowed_groups.to_vec();
        let token = token.clone();

        async move {
            let check = fetch_and_store(
                provider.as_ref(),
                &cache,
                &stats,
                &email,
                &allowed_groups,
                &token,
            )
            .await?;

            Ok(FetchOutcome {
                allowed_groups,
                check,
            })
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for MembershipValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipValidator")
            .field("provider", &self.provider.name())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Full upstream fetch followed by a best-effort cache write.
async fn fetch_and_store(
    provider: &dyn GroupMembershipProvider,
    cache: &TtlCache,
    stats: &ValidatorStats,
    email: &str,
    allowed_groups: &[String],
    token: &AccessToken,
) -> Result<MembershipCheck> {
    let check = provider
        .check_membership(email, allowed_groups, token, &[])
        .await
        .map_err(|err| {
            stats.record_upstream_error();
            warn!(provider = provider.name(), error = %err, "Upstream membership fetch failed");
            err
        })?;

    if !check.membership.is_empty() {
        let entry = Entry::new(email, check.membership.clone());
        if let Err(err) = cache.set(vec![entry]) {
            stats.record_cache_write_failure();
            warn!(email, error = %err, "Unable to save group membership to cache");
        }
    }

    Ok(check)
}
