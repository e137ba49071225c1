use chrono::{Duration as ChronoDuration, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::patterns;
use super::{DenyReason, Verdict};
use crate::cache::{blocked_key, suspicious_key, CacheEntry, GuardCache, SuspicionRecord};
use crate::settings::{keys, SettingsProvider};
use crate::storage::{BlockedEntry, BlocklistStore};

const DEFAULT_BLOCK_ON_NO_IP: bool = true;
const DEFAULT_SUSPICIOUS_THRESHOLD: u64 = 3;
const DEFAULT_SUSPICIOUS_WINDOW_HOURS: u64 = 24;
const DEFAULT_SUSPICIOUS_BLOCK_HOURS: u64 = 24;
const DEFAULT_BLOCKED_CACHE_TTL_SECS: u64 = 300;

const AUTO_BLOCK_REASON: &str = "Automated: suspicious activity threshold exceeded";
const REPEAT_OFFENDER_REASON: &str =
    "Automated: repeat offender, suspicious activity threshold exceeded";

/// The request gate. Evaluated once per inbound request, before routing;
/// stateless per request apart from the injected cache and store.
pub struct RequestGuard {
    store: Arc<dyn BlocklistStore>,
    cache: Arc<dyn GuardCache>,
    settings: Arc<dyn SettingsProvider>,
}

impl RequestGuard {
    pub fn new(
        store: Arc<dyn BlocklistStore>,
        cache: Arc<dyn GuardCache>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    /// Decide pass/reject for one request. `target` is the raw `path?query`
    /// including any percent-encoding.
    pub fn evaluate(&self, client_ip: Option<&str>, target: &str) -> Verdict {
        let ip = match client_ip {
            Some(ip) => ip,
            None => {
                if self
                    .settings
                    .read_bool(keys::BLOCK_ON_NO_IP, DEFAULT_BLOCK_ON_NO_IP)
                {
                    warn!("request rejected: unable to determine client IP");
                    return Verdict::Deny(DenyReason::OriginUnverifiable);
                }
                // No IP to look up in the blocklist; only the pattern battery
                // applies, and there is no counter to escalate.
                if let Some(rule) = patterns::first_match(target) {
                    warn!(
                        "suspicious request from unknown origin: {target} ({}/{})",
                        rule.family, rule.name
                    );
                    return Verdict::Deny(DenyReason::SuspiciousRequest);
                }
                info!("request allowed despite missing IP - consider enabling block_on_no_ip");
                return Verdict::Pass;
            }
        };

        if self.is_ip_blocked(ip) {
            info!("rejected request from blocked IP: {ip}");
            return Verdict::Deny(DenyReason::IpBlocked);
        }

        if let Some(rule) = patterns::first_match(target) {
            warn!(
                "suspicious request from {ip}: {target} ({}/{})",
                rule.family, rule.name
            );
            self.track_suspicious(ip, target);
            return Verdict::Deny(DenyReason::SuspiciousRequest);
        }

        Verdict::Pass
    }

    /// Cache fast path, then store. Only store-confirmed positives are cached;
    /// a miss always falls back to the store, never to an assumption.
    fn is_ip_blocked(&self, ip: &str) -> bool {
        let key = blocked_key(ip);
        if let Some(CacheEntry::Blocked(true)) = self.cache.read(&key) {
            return true;
        }

        match self.store.find_active(ip, Utc::now()) {
            Ok(Some(_)) => {
                self.cache
                    .write(&key, CacheEntry::Blocked(true), self.blocked_cache_ttl());
                true
            }
            Ok(None) => false,
            Err(e) => {
                // Fail open: a store outage must not lock out all traffic.
                error!("blocklist lookup failed for {ip}: {e}");
                false
            }
        }
    }

    /// Count a fresh pattern match against `ip` and escalate to a timed block
    /// once the threshold is reached within the tracking window. Never called
    /// for requests rejected via the already-blocked paths.
    fn track_suspicious(&self, ip: &str, target: &str) {
        let window_hours = self
            .settings
            .read_u64(keys::SUSPICIOUS_WINDOW_HOURS, DEFAULT_SUSPICIOUS_WINDOW_HOURS);
        let key = suspicious_key(ip);

        let mut record = match self.cache.read(&key) {
            Some(CacheEntry::Suspicion(record)) => record,
            _ => SuspicionRecord::new(Utc::now()),
        };
        record.record(target);
        self.cache.write(
            &key,
            CacheEntry::Suspicion(record.clone()),
            Duration::from_secs(window_hours * 3600),
        );

        let threshold = self
            .settings
            .read_u64(keys::SUSPICIOUS_THRESHOLD, DEFAULT_SUSPICIOUS_THRESHOLD);
        let within_window =
            Utc::now() - record.first_seen <= ChronoDuration::hours(window_hours as i64);

        if u64::from(record.count) >= threshold && within_window {
            self.escalate(ip);
        }
    }

    fn escalate(&self, ip: &str) {
        let mut block_hours = self
            .settings
            .read_u64(keys::SUSPICIOUS_BLOCK_HOURS, DEFAULT_SUSPICIOUS_BLOCK_HOURS)
            as i64;
        let mut reason = AUTO_BLOCK_REASON;

        // A prior block that has already lapsed marks a repeat offender and
        // doubles the new block.
        match self.store.find_latest(ip) {
            Ok(Some(previous)) => {
                if previous.expires_at.is_some_and(|t| t <= Utc::now()) {
                    block_hours *= 2;
                    reason = REPEAT_OFFENDER_REASON;
                }
            }
            Ok(None) => {}
            Err(e) => error!("repeat-offender lookup failed for {ip}: {e}"),
        }

        let expires_at = Utc::now() + ChronoDuration::hours(block_hours);
        let entry = BlockedEntry {
            ip_address: ip.to_string(),
            reason: reason.to_string(),
            created: Utc::now(),
            expires_at: Some(expires_at),
        };

        match self.store.insert(entry) {
            Ok(()) => {
                warn!("IP address blocked: {ip} until {expires_at} ({reason})");
                self.cache.write(
                    &blocked_key(ip),
                    CacheEntry::Blocked(true),
                    self.blocked_cache_ttl(),
                );
            }
            Err(e) => {
                // Dropped on the floor; the counter still stands, so the next
                // match re-attempts the insert.
                error!("failed to record block for {ip}: {e}");
            }
        }
    }

    fn blocked_cache_ttl(&self) -> Duration {
        Duration::from_secs(
            self.settings
                .read_u64(keys::BLOCKED_CACHE_TTL_SECS, DEFAULT_BLOCKED_CACHE_TTL_SECS),
        )
    }
}
