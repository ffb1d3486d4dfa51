//! The exposure scanner: cache lookups, concurrent fan-out and merge.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use peat_cache::EphemeralCache;
use peat_core::constants::{QUICK_SCAN_BREACH_LIMIT, QUICK_SCAN_SHOWN_BREACHES};
use peat_core::error::{PeatError, Result};
use peat_core::narrative::{fallback_narrative, high_exposure_narrative, NarrativeContext};
use peat_core::traits::{BreachLookup, NarrativeGenerator, RegistrationProbe, UsernamePresenceProbe};
use peat_core::types::{
    sort_breaches, Identity, RiskSummary, ScanKey, ScanResult, ServiceRegistration, SourceOutcome,
    UsernameHit,
};
use peat_store::DurableCache;

use crate::{ClearSummary, ScanRequest, ScannerConfig, ScannerStats};

/// The external capabilities a scan fans out to.
#[derive(Clone)]
pub struct Adapters {
    /// Breach lookup (HIBP)
    pub breach: Arc<dyn BreachLookup>,
    /// Service registration probe (holehe)
    pub registration: Arc<dyn RegistrationProbe>,
    /// Username presence probe (sherlock)
    pub presence: Arc<dyn UsernamePresenceProbe>,
    /// Narrative generator
    pub narrator: Arc<dyn NarrativeGenerator>,
}

/// Resolves identities to scan results through both cache tiers.
///
/// Only validation failures are returned as errors. Any source failure or
/// timeout degrades that source to empty data, and cache tiers never fail a
/// scan.
pub struct ExposureScanner {
    adapters: Adapters,
    ephemeral: Arc<EphemeralCache>,
    durable: Option<DurableCache>,
    config: ScannerConfig,
}

impl ExposureScanner {
    /// Creates a scanner without a durable tier.
    pub fn new(adapters: Adapters, ephemeral: Arc<EphemeralCache>) -> Self {
        Self {
            adapters,
            ephemeral,
            durable: None,
            config: ScannerConfig::default(),
        }
    }

    /// Adds the durable tier.
    pub fn with_durable(mut self, durable: DurableCache) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Overrides the configuration.
    pub fn with_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// The ephemeral tier, shared with the background sweeper.
    pub fn ephemeral(&self) -> &Arc<EphemeralCache> {
        &self.ephemeral
    }

    /// Returns true if a durable tier is configured.
    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Resolves an identity, consulting the caches unless `force_refresh`.
    pub async fn resolve(&self, identity: Identity, force_refresh: bool) -> Result<ScanResult> {
        self.resolve_request(ScanRequest::new(identity).force_refresh(force_refresh))
            .await
    }

    /// Resolves a full scan request.
    ///
    /// Caches are written only once every lookup has settled, so dropping the
    /// returned future leaves both tiers untouched.
    #[instrument(skip(self, request), fields(kind = %request.identity.kind(), force = request.force_refresh))]
    pub async fn resolve_request(&self, request: ScanRequest) -> Result<ScanResult> {
        let presence_override = request.validated_presence_usernames()?;
        let identity = request.identity;
        identity.validate()?;
        let key = ScanKey::derive(&identity)
            .ok_or_else(|| PeatError::ValidationError("identity has no cache key".into()))?;

        if !request.force_refresh {
            if let Some(hit) = self.ephemeral.get_by_key(&key) {
                debug!(scan_key = %key, "served from ephemeral cache");
                return Ok(hit);
            }

            if let Some(durable) = &self.durable {
                if let Some(hit) = durable.read(&identity).await {
                    debug!(scan_key = %key, "served from durable cache");
                    self.ephemeral.put(&identity, &hit);
                    return Ok(hit);
                }
            }
        }

        let result = self.scan(&identity, presence_override).await;

        if result.is_cache_worthy() {
            self.ephemeral.put(&identity, &result);
            if let Some(durable) = &self.durable {
                if identity.as_email().is_some() {
                    durable
                        .write(&identity, &result, &RiskSummary::from_result(&result))
                        .await;
                }
            }
        } else {
            debug!(scan_key = %key, "result not cached: no findings");
        }

        Ok(result)
    }

    /// Runs a fresh scan against every relevant source.
    async fn scan(&self, identity: &Identity, presence_override: Option<Vec<String>>) -> ScanResult {
        let started = Instant::now();
        let timeout = self.config.source_timeout;
        let mut result = ScanResult::new(identity);

        match identity {
            Identity::Usernames(names) => {
                let (presence, presence_ms) =
                    guarded("sherlock", timeout, self.adapters.presence.probe(names)).await;

                result.meta.sources.sherlock = presence.is_success();
                result.meta.timing.presence_ms = presence_ms;
                result.meta.partial = !presence.is_success();
                result.username_hits = dedupe_hits(presence.into_value());
            }
            Identity::Email(email) => {
                let presence_names = presence_override.unwrap_or_else(|| identity.presence_usernames());

                let ((breaches, breach_ms), (registrations, registration_ms), (presence, presence_ms)) = tokio::join!(
                    guarded("hibp", timeout, self.adapters.breach.lookup(email)),
                    guarded("holehe", timeout, self.adapters.registration.probe(email)),
                    guarded("sherlock", timeout, self.adapters.presence.probe(&presence_names)),
                );

                result.meta.sources.hibp = breaches.is_success();
                result.meta.sources.holehe = registrations.is_success();
                result.meta.sources.sherlock = presence.is_success();
                result.meta.partial =
                    !(breaches.is_success() && registrations.is_success() && presence.is_success());
                result.meta.timing.breach_ms = breach_ms;
                result.meta.timing.registration_ms = registration_ms;
                result.meta.timing.presence_ms = presence_ms;

                result.breaches = breaches.into_value();
                sort_breaches(&mut result.breaches);
                (result.registrations, result.rate_limited) =
                    split_registrations(registrations.into_value());
                result.username_hits = dedupe_hits(presence.into_value());
                result.usernames = presence_names;
            }
        }

        self.attach_narrative(identity, &mut result).await;
        result.meta.timing.total_ms = elapsed_ms(started);

        info!(
            kind = %identity.kind(),
            breaches = result.breaches.len(),
            registrations = result.registrations.len(),
            hits = result.username_hits.len(),
            partial = result.meta.partial,
            total_ms = result.meta.timing.total_ms,
            "scan complete"
        );
        result
    }

    /// Runs a quick email scan: breach lookup and registration probe only.
    ///
    /// Neither cache tier is read or written. A breach history longer than
    /// [`QUICK_SCAN_BREACH_LIMIT`] is cut to the
    /// [`QUICK_SCAN_SHOWN_BREACHES`] most recent entries and the result is
    /// marked partial, with a fixed report instead of a generated one.
    #[instrument(skip(self, identity))]
    pub async fn quick_scan(&self, identity: Identity) -> Result<ScanResult> {
        identity.validate()?;
        let Identity::Email(email) = &identity else {
            return Err(PeatError::ValidationError(
                "quick scan requires an email address".into(),
            ));
        };

        let started = Instant::now();
        let timeout = self.config.source_timeout;
        let mut result = ScanResult::new(&identity);

        let ((breaches, breach_ms), (registrations, registration_ms)) = tokio::join!(
            guarded("hibp", timeout, self.adapters.breach.lookup(email)),
            guarded("holehe", timeout, self.adapters.registration.probe(email)),
        );

        result.meta.sources.hibp = breaches.is_success();
        result.meta.sources.holehe = registrations.is_success();
        result.meta.partial = !(breaches.is_success() && registrations.is_success());
        result.meta.timing.breach_ms = breach_ms;
        result.meta.timing.registration_ms = registration_ms;

        result.breaches = breaches.into_value();
        sort_breaches(&mut result.breaches);
        (result.registrations, result.rate_limited) = split_registrations(registrations.into_value());

        let total = result.breaches.len();
        if total > QUICK_SCAN_BREACH_LIMIT {
            warn!(total, shown = QUICK_SCAN_SHOWN_BREACHES, "breach count above quick scan limit, truncating");
            result.breaches.truncate(QUICK_SCAN_SHOWN_BREACHES);
            result.meta.partial = true;
            result.meta.breach_count_truncated = true;
            result.meta.total_breaches = Some(total);
            result.narrative = high_exposure_narrative(email, total, result.breaches.len());
        } else {
            self.attach_narrative(&identity, &mut result).await;
        }
        result.meta.timing.total_ms = elapsed_ms(started);

        info!(
            breaches = result.breaches.len(),
            registrations = result.registrations.len(),
            truncated = result.meta.breach_count_truncated,
            partial = result.meta.partial,
            total_ms = result.meta.timing.total_ms,
            "quick scan complete"
        );
        Ok(result)
    }

    /// Generates the narrative for a merged result and records its timing.
    async fn attach_narrative(&self, identity: &Identity, result: &mut ScanResult) {
        let context = NarrativeContext::new(
            identity.label(),
            identity.kind(),
            result.breaches.clone(),
            result.registrations.clone(),
            result.username_hits.clone(),
        )
        .with_rate_limited(result.rate_limited.clone());

        let started = Instant::now();
        let (narrative, generated) = self.narrate(&context).await;
        result.narrative = narrative;
        result.meta.sources.narrative = generated;
        result.meta.timing.narrative_ms = elapsed_ms(started);
    }

    /// Generates the narrative, falling back to the built-in summary.
    ///
    /// Returns the text and whether the generator produced it.
    async fn narrate(&self, context: &NarrativeContext) -> (String, bool) {
        let timeout = self.config.narrative_timeout;
        match tokio::time::timeout(timeout, self.adapters.narrator.generate(context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => (text, true),
            Ok(Ok(_)) => {
                warn!("narrative generator returned empty text, using fallback");
                (fallback_narrative(context), false)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "narrative generation failed, using fallback");
                (fallback_narrative(context), false)
            }
            Err(_) => {
                warn!(seconds = timeout.as_secs(), "narrative generation timed out, using fallback");
                (fallback_narrative(context), false)
            }
        }
    }

    /// Snapshot of both cache tiers.
    pub async fn stats(&self) -> ScannerStats {
        let durable = match &self.durable {
            Some(durable) => Some(durable.stats().await),
            None => None,
        };
        ScannerStats {
            ephemeral: self.ephemeral.stats(),
            durable,
        }
    }

    /// Empties the ephemeral tier, and the durable tier when asked.
    ///
    /// A durable failure is reported in the summary rather than returned.
    pub async fn clear(&self, include_durable: bool) -> ClearSummary {
        let mut summary = ClearSummary {
            ephemeral_cleared: self.ephemeral.clear(),
            ..ClearSummary::default()
        };

        if include_durable {
            if let Some(durable) = &self.durable {
                match durable.clear().await {
                    Ok(removed) => summary.durable_cleared = Some(removed),
                    Err(e) => {
                        warn!(error = %e, "failed to clear durable cache");
                        summary.durable_error = Some(e.to_string());
                    }
                }
            }
        }

        info!(
            ephemeral = summary.ephemeral_cleared,
            durable = ?summary.durable_cleared,
            "caches cleared"
        );
        summary
    }
}

/// Runs one lookup under a timeout, classifying its outcome.
async fn guarded<T>(
    source: &'static str,
    timeout: Duration,
    lookup: impl Future<Output = Result<Vec<T>>>,
) -> (SourceOutcome<Vec<T>>, u64) {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => SourceOutcome::from_lookup(result),
        Err(_) => SourceOutcome::from_lookup(Err(PeatError::SourceTimeout {
            source_name: source.into(),
            seconds: timeout.as_secs(),
        })),
    };

    if let Some(reason) = outcome.degradation_reason() {
        warn!(source, reason, "source degraded");
    }
    (outcome, elapsed_ms(started))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Splits probe output into confirmed and rate-limited service names.
///
/// A service reported both ways counts as confirmed.
fn split_registrations(items: Vec<ServiceRegistration>) -> (Vec<String>, Vec<String>) {
    let confirmed: HashSet<&str> = items
        .iter()
        .filter(|r| !r.rate_limited)
        .map(|r| r.service.as_str())
        .collect();

    let mut seen = HashSet::new();
    let mut registered = Vec::new();
    let mut rate_limited = Vec::new();
    for item in &items {
        if !seen.insert(item.service.as_str()) {
            continue;
        }
        if confirmed.contains(item.service.as_str()) {
            registered.push(item.service.clone());
        } else {
            rate_limited.push(item.service.clone());
        }
    }
    (registered, rate_limited)
}

fn dedupe_hits(hits: Vec<UsernameHit>) -> Vec<UsernameHit> {
    let mut seen = HashSet::new();
    hits.into_iter().filter(|h| seen.insert(h.url.clone())).collect()
}
