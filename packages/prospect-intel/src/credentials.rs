//! Credential pool with rotation, usage accounting, and rate-limit
//! cooldowns.
//!
//! Uses the `secrecy` crate so tokens never leak into logs or debug output.
//! Per provider the pool keeps an ordered credential list and a cursor;
//! acquiring advances the cursor round-robin so load spreads evenly across
//! keys. Throttled credentials cool down instead of being retired;
//! rejected credentials are retired permanently.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretBox};

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::ProviderKind;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value for use.
    ///
    /// Only call this at the point of an actual API request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One provider credential with usage accounting.
#[derive(Debug, Clone)]
pub struct Credential {
    /// The API token
    pub token: SecretString,

    /// Which provider the token belongs to
    pub provider: ProviderKind,

    /// How many times this credential has been handed out
    pub usage_count: u64,

    /// Last time this credential was handed out
    pub last_used_at: Option<DateTime<Utc>>,

    /// Set while the credential is rate-limit cooling
    pub cooldown_until: Option<DateTime<Utc>>,

    /// Flips to false permanently on authorization failure
    pub is_active: bool,
}

impl Credential {
    fn new(token: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            token: SecretString::new(token),
            provider,
            usage_count: 0,
            last_used_at: None,
            cooldown_until: None,
            is_active: true,
        }
    }

    /// Eligible = active and not cooling at `now`.
    fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.cooldown_until.map_or(true, |until| until <= now)
    }
}

/// Handle to an acquired credential, used to report outcomes back.
#[derive(Debug, Clone)]
pub struct Lease {
    /// Provider the credential belongs to
    pub provider: ProviderKind,

    /// Index into the provider's credential list
    pub slot: usize,

    /// The token to use
    pub token: SecretString,
}

/// Result of a successful acquire.
#[derive(Debug)]
pub enum Acquired {
    /// An eligible credential
    Ready(Lease),

    /// Nothing eligible, but this credential's cooldown expires soonest.
    /// Callers holding only rate-limited credentials proceed with it
    /// rather than failing the fetch outright.
    Cooling {
        lease: Lease,
        until: DateTime<Utc>,
    },
}

impl Acquired {
    /// The lease, whichever way it was acquired.
    pub fn lease(&self) -> &Lease {
        match self {
            Acquired::Ready(lease) => lease,
            Acquired::Cooling { lease, .. } => lease,
        }
    }
}

#[derive(Default)]
struct ProviderSlots {
    credentials: Vec<Credential>,
    cursor: usize,
}

impl ProviderSlots {
    fn advance_to_next_eligible(&mut self, now: DateTime<Utc>) {
        let len = self.credentials.len();
        if len == 0 {
            return;
        }
        for offset in 0..len {
            let idx = (self.cursor + offset) % len;
            if self.credentials[idx].is_eligible(now) {
                self.cursor = idx;
                return;
            }
        }
        // Nothing eligible; leave the cursor where it is.
    }
}

/// Rotating set of provider credentials.
///
/// Thread-safe; constructor-injected into the gateway (no process-wide
/// singleton).
#[derive(Default)]
pub struct CredentialPool {
    slots: RwLock<HashMap<ProviderKind, ProviderSlots>>,
}

impl CredentialPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add credentials for a provider (builder form).
    pub fn with_credentials(
        self,
        provider: ProviderKind,
        tokens: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for token in tokens {
            self.add_credential(provider, token);
        }
        self
    }

    /// Build a pool from conventional environment variables.
    ///
    /// Each variable may hold a comma-separated list to enable rotation:
    /// `TAVILY_API_KEYS`, `FIRECRAWL_API_KEYS`, `OPENAI_API_KEYS`, with the
    /// singular `*_API_KEY` accepted as a fallback. Missing variables leave
    /// that provider empty; its calls fail with `NoCredential`.
    pub fn from_env() -> Self {
        let pool = Self::new();
        for (provider, plural, singular) in [
            (ProviderKind::Search, "TAVILY_API_KEYS", "TAVILY_API_KEY"),
            (
                ProviderKind::Extraction,
                "FIRECRAWL_API_KEYS",
                "FIRECRAWL_API_KEY",
            ),
            (ProviderKind::Reasoning, "OPENAI_API_KEYS", "OPENAI_API_KEY"),
        ] {
            let raw = std::env::var(plural).or_else(|_| std::env::var(singular));
            if let Ok(raw) = raw {
                for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    pool.add_credential(provider, token);
                }
            } else {
                tracing::debug!(provider = %provider, "no credentials configured");
            }
        }
        pool
    }

    /// Add a single credential for a provider.
    pub fn add_credential(&self, provider: ProviderKind, token: impl Into<String>) {
        let mut slots = self.slots.write().unwrap();
        slots
            .entry(provider)
            .or_default()
            .credentials
            .push(Credential::new(token, provider));
    }

    /// Acquire a credential for a provider.
    ///
    /// Returns the credential at the cursor if eligible, otherwise scans
    /// forward (wrapping once) for the first eligible one. When only
    /// cooling credentials remain, returns the one whose cooldown expires
    /// soonest as [`Acquired::Cooling`]. Errors with `NoCredential` only
    /// when every credential is retired or none are configured.
    pub fn acquire(&self, provider: ProviderKind) -> ProviderResult<Acquired> {
        let now = Utc::now();
        let mut slots = self.slots.write().unwrap();
        let slot = slots
            .get_mut(&provider)
            .filter(|s| !s.credentials.is_empty())
            .ok_or(ProviderError::NoCredential { provider })?;

        let len = slot.credentials.len();
        for offset in 0..len {
            let idx = (slot.cursor + offset) % len;
            if slot.credentials[idx].is_eligible(now) {
                let cred = &mut slot.credentials[idx];
                cred.usage_count += 1;
                cred.last_used_at = Some(now);
                let lease = Lease {
                    provider,
                    slot: idx,
                    token: cred.token.clone(),
                };
                // Round-robin: the next acquire starts one past this slot.
                slot.cursor = (idx + 1) % len;
                return Ok(Acquired::Ready(lease));
            }
        }

        // Nothing eligible. Pick the soonest-to-cool active credential.
        let soonest = slot
            .credentials
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_active)
            .filter_map(|(idx, c)| c.cooldown_until.map(|until| (idx, until)))
            .min_by_key(|(_, until)| *until);

        match soonest {
            Some((idx, until)) => {
                let cred = &mut slot.credentials[idx];
                cred.usage_count += 1;
                cred.last_used_at = Some(now);
                tracing::warn!(
                    provider = %provider,
                    slot = idx,
                    cooldown_until = %until,
                    "all credentials cooling, proceeding with soonest"
                );
                Ok(Acquired::Cooling {
                    lease: Lease {
                        provider,
                        slot: idx,
                        token: cred.token.clone(),
                    },
                    until,
                })
            }
            None => Err(ProviderError::NoCredential { provider }),
        }
    }

    /// Record a rate-limit response: cool the credential down and rotate
    /// the cursor to the next eligible one.
    pub fn report_rate_limited(&self, lease: &Lease, cooldown_until: DateTime<Utc>) {
        let mut slots = self.slots.write().unwrap();
        if let Some(slot) = slots.get_mut(&lease.provider) {
            if let Some(cred) = slot.credentials.get_mut(lease.slot) {
                cred.cooldown_until = Some(cooldown_until);
                tracing::debug!(
                    provider = %lease.provider,
                    slot = lease.slot,
                    until = %cooldown_until,
                    "credential cooling down"
                );
            }
            slot.advance_to_next_eligible(Utc::now());
        }
    }

    /// Record an authorization failure: retire the credential permanently
    /// and rotate away from it.
    pub fn report_invalid(&self, lease: &Lease) {
        let mut slots = self.slots.write().unwrap();
        if let Some(slot) = slots.get_mut(&lease.provider) {
            if let Some(cred) = slot.credentials.get_mut(lease.slot) {
                cred.is_active = false;
                tracing::warn!(
                    provider = %lease.provider,
                    slot = lease.slot,
                    "credential retired after authorization failure"
                );
            }
            slot.advance_to_next_eligible(Utc::now());
        }
    }

    /// Advance the cursor unconditionally (scheduled rotation).
    pub fn rotate(&self, provider: ProviderKind) {
        let mut slots = self.slots.write().unwrap();
        if let Some(slot) = slots.get_mut(&provider) {
            let len = slot.credentials.len();
            if len > 0 {
                slot.cursor = (slot.cursor + 1) % len;
            }
        }
    }

    /// Number of active (non-retired) credentials for a provider.
    pub fn active_count(&self, provider: ProviderKind) -> usize {
        self.slots
            .read()
            .unwrap()
            .get(&provider)
            .map(|s| s.credentials.iter().filter(|c| c.is_active).count())
            .unwrap_or(0)
    }
}
