//! Session cache for enforcement results and compiled schemas.
//!
//! Entries are keyed by the full sha256 of the document content, the template
//! name and the tier. Expiry is TTL based; when full, the entry with the
//! oldest `cached_at` is evicted (insertion time, not access time).

use crate::core::config::CacheConfig;
use crate::core::schema::{TemplateSchema, content_checksum};
use crate::core::time::{Clock, SystemClock};
use crate::core::validate::{Tier, ValidationResult};
use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize)]
pub struct CachedEnforcementResult {
    pub result: ValidationResult,
    pub cached_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CachedEnforcementResult {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        expired(self.cached_at, self.ttl_seconds, now)
    }
}

#[derive(Debug, Clone)]
struct CachedSchema {
    schema: TemplateSchema,
    cached_at: DateTime<Utc>,
    ttl_seconds: u64,
}

impl CachedSchema {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        expired(self.cached_at, self.ttl_seconds, now)
    }
}

/// A TTL too large for a `Duration` never expires.
fn expired(cached_at: DateTime<Utc>, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
    match i64::try_from(ttl_seconds).ok().and_then(Duration::try_seconds) {
        Some(ttl) => now - cached_at > ttl,
        None => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub schemas: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultKey {
    content_hash: String,
    template_name: String,
    tier: Tier,
}

#[derive(Default)]
struct CacheState {
    results: FxHashMap<ResultKey, CachedEnforcementResult>,
    schemas: FxHashMap<String, CachedSchema>,
    hits: u64,
    misses: u64,
    expirations: u64,
    evictions: u64,
}

pub struct SessionCache {
    state: Mutex<CacheState>,
    default_ttl: u64,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            default_ttl: config.ttl_seconds,
            max_entries: config.max_entries.max(1),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key(content: &str, template_name: &str, tier: Tier) -> ResultKey {
        ResultKey {
            content_hash: content_checksum(content),
            template_name: template_name.to_string(),
            tier,
        }
    }

    pub fn get_enforcement_result(
        &self,
        content: &str,
        template_name: &str,
        tier: Tier,
    ) -> Option<ValidationResult> {
        let key = Self::key(content, template_name, tier);
        let now = self.clock.now();
        let mut state = self.lock();

        let expired = match state.results.get(&key) {
            Some(entry) if !entry.is_expired(now) => {
                let result = entry.result.clone();
                state.hits += 1;
                tracing::debug!(template = template_name, "enforcement cache hit");
                return Some(result);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.results.remove(&key);
            state.expirations += 1;
        }
        state.misses += 1;
        None
    }

    pub fn cache_enforcement_result(
        &self,
        content: &str,
        template_name: &str,
        tier: Tier,
        result: &ValidationResult,
        ttl_seconds: Option<u64>,
    ) {
        let key = Self::key(content, template_name, tier);
        let now = self.clock.now();
        let mut state = self.lock();

        if !state.results.contains_key(&key) && state.results.len() >= self.max_entries {
            let oldest = state
                .results
                .iter()
                .min_by_key(|(_, v)| v.cached_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.results.remove(&oldest);
                state.evictions += 1;
                tracing::debug!("enforcement cache full; evicted oldest entry");
            }
        }

        state.results.insert(
            key,
            CachedEnforcementResult {
                result: result.clone(),
                cached_at: now,
                ttl_seconds: ttl_seconds.unwrap_or(self.default_ttl),
            },
        );
    }

    pub fn get_schema(&self, template_name: &str) -> Option<TemplateSchema> {
        let now = self.clock.now();
        let mut state = self.lock();
        match state.schemas.get(template_name) {
            Some(entry) if !entry.is_expired(now) => Some(entry.schema.clone()),
            Some(_) => {
                state.schemas.remove(template_name);
                state.expirations += 1;
                None
            }
            None => None,
        }
    }

    pub fn cache_schema(&self, schema: &TemplateSchema, ttl_seconds: Option<u64>) {
        let now = self.clock.now();
        self.lock().schemas.insert(
            schema.template_name.clone(),
            CachedSchema {
                schema: schema.clone(),
                cached_at: now,
                ttl_seconds: ttl_seconds.unwrap_or(self.default_ttl),
            },
        );
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let before = state.results.len() + state.schemas.len();
        state.results.retain(|_, v| !v.is_expired(now));
        state.schemas.retain(|_, v| !v.is_expired(now));
        let removed = before - (state.results.len() + state.schemas.len());
        state.expirations += removed as u64;
        removed
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.results.clear();
        state.schemas.clear();
    }

    pub fn get_stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            expirations: state.expirations,
            evictions: state.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
            entries: state.results.len(),
            schemas: state.schemas.len(),
        }
    }
}
