//! OTP ledger: the in-memory record of outstanding passcodes.
//!
//! One pending [`Challenge`] per identity. Issuing replaces, verification
//! consumes on success or expiry, and a wrong code leaves the challenge in
//! place. Expired entries are dropped when `verify` touches them or when
//! the sweeper runs.

mod clock;
mod code;
mod sweeper;

pub use clock::{Clock, SystemClock};
pub use sweeper::sweeper_worker;

#[cfg(test)]
pub use clock::ManualClock;

use chrono::{DateTime, Duration, Utc};
use code::{codes_match, generate_code};
use keystamp_common::{Challenge, VerifyOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory passcode store
pub struct OtpLedger {
    /// identity -> pending challenge
    challenges: Mutex<HashMap<String, Challenge>>,
    /// TTL used by `issue`
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl OtpLedger {
    /// Create a ledger on the wall clock
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            challenges: Mutex::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a code for `identity` with the default TTL
    pub fn issue(&self, identity: &str) -> String {
        self.issue_with_ttl(identity, self.default_ttl)
    }

    /// Issue a code for `identity`, replacing any pending one
    ///
    /// A TTL reaching past the representable range never expires.
    #[tracing::instrument(name = "Issuing OTP", skip(self), fields(ttl_secs = ttl.num_seconds()))]
    pub fn issue_with_ttl(&self, identity: &str, ttl: Duration) -> String {
        let code = generate_code();
        let issued_at = self.clock.now();

        let challenge = Challenge {
            identity: identity.to_string(),
            code: code.clone(),
            issued_at,
            expires_at: issued_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let replaced = self
            .lock()
            .insert(identity.to_string(), challenge)
            .is_some();

        tracing::debug!(replaced, code = %code, "OTP saved");

        code
    }

    /// Check `submitted` against the pending challenge for `identity`
    ///
    /// Existence is checked first, then expiry, then the code itself, so an
    /// expired challenge reports `Expired` whatever was submitted.
    #[tracing::instrument(name = "Verifying OTP", skip(self, submitted))]
    pub fn verify(&self, identity: &str, submitted: &str) -> VerifyOutcome {
        let now = self.clock.now();
        let mut challenges = self.lock();

        let state = challenges
            .get(identity)
            .map(|c| (c.is_expired_at(now), codes_match(&c.code, submitted)));

        let outcome = match state {
            None => VerifyOutcome::NotFound,
            Some((true, _)) => {
                challenges.remove(identity);
                VerifyOutcome::Expired
            }
            Some((false, false)) => VerifyOutcome::Mismatch,
            Some((false, true)) => {
                challenges.remove(identity);
                VerifyOutcome::Valid
            }
        };

        tracing::debug!(outcome = ?outcome, "OTP checked");

        outcome
    }

    /// Drop the challenge for `identity` if it still carries `code`
    ///
    /// A challenge that has since been replaced by a newer `issue` is left
    /// alone. Returns true if something was removed.
    pub fn revoke(&self, identity: &str, code: &str) -> bool {
        let mut challenges = self.lock();

        let matches = challenges
            .get(identity)
            .is_some_and(|c| codes_match(&c.code, code));

        if matches {
            challenges.remove(identity);
            tracing::debug!(identity = %identity, "OTP revoked");
        }

        matches
    }

    /// Remove every expired challenge, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut challenges = self.lock();

        let before = challenges.len();
        challenges.retain(|_, c| !c.is_expired_at(now));
        before - challenges.len()
    }

    /// Number of pending challenges, expired or not
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn peek(&self, identity: &str) -> Option<Challenge> {
        self.lock().get(identity).cloned()
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every mutation is a single insert, remove, or retain.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Challenge>> {
        self.challenges.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
