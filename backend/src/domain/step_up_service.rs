//! Step-up authentication gate.
//!
//! Every sensitive mutation must present a fresh [`StepUpProof`] bound to the
//! acting guardian and to the exact [`GuardedOperation`] being performed. A
//! proof is obtained by re-entering the guardian password or by verifying a
//! one-time code, lives for a short time, and is redeemed at most once:
//!
//! 1. `execute` reserves the proof (marks it in flight) and runs the mutation.
//! 2. If the mutation succeeds the proof is consumed.
//! 3. If the mutation fails, or its future is dropped, the reservation is
//!    released and the proof can be retried until it expires.
//!
//! Gate state lives in a `std::sync::Mutex` that is never held across an
//! `.await`; calls into the identity provider are bounded by a timeout.

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    ChallengeChannel, ChallengeTicket, GuardedOperation, ProofMethod, StepUpAttempt, StepUpAttemptStats,
    StepUpProof, StepUpRequirement,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::errors::{GuardianError, GuardianResult};
use crate::domain::identity::IdentityProvider;
use crate::domain::models::ActorContext;
use crate::storage::StepUpAttemptStorage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepUpSettings {
    /// Minimum delay between two challenges on the same channel
    pub resend_cooldown_secs: i64,
    pub challenge_ttl_secs: i64,
    pub proof_ttl_secs: i64,
    /// Wrong codes tolerated before a challenge is discarded
    pub max_code_attempts: u32,
}

impl Default for StepUpSettings {
    fn default() -> Self {
        Self {
            resend_cooldown_secs: 30,
            challenge_ttl_secs: 300,
            proof_ttl_secs: 120,
            max_code_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
struct ChallengeRecord {
    guardian_id: String,
    channel: ChallengeChannel,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Debug, Clone)]
struct ProofEntry {
    proof: StepUpProof,
    in_flight: bool,
}

#[derive(Default)]
struct GateState {
    challenges: HashMap<String, ChallengeRecord>,
    last_sent: HashMap<(String, ChallengeChannel), DateTime<Utc>>,
    proofs: HashMap<String, ProofEntry>,
}

impl GateState {
    fn purge_proofs(&mut self, now: DateTime<Utc>) {
        self.proofs.retain(|_, p| p.in_flight || p.proof.expires_at > now);
    }

    /// Forget expired state; returns the ids of the dropped challenges
    fn purge_expired(&mut self, now: DateTime<Utc>, cooldown: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .challenges
            .iter()
            .filter(|(_, c)| c.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.challenges.remove(id);
        }
        self.last_sent.retain(|_, sent| *sent + cooldown > now);
        self.purge_proofs(now);
        expired
    }
}

fn lock_state(state: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds a proof in flight; releases it on drop unless committed
struct ProofReservation {
    state: Arc<Mutex<GateState>>,
    proof_id: String,
    committed: bool,
}

impl ProofReservation {
    fn commit(mut self) {
        lock_state(&self.state).proofs.remove(&self.proof_id);
        self.committed = true;
    }
}

impl Drop for ProofReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(entry) = lock_state(&self.state).proofs.get_mut(&self.proof_id) {
            entry.in_flight = false;
        }
    }
}

#[derive(Clone)]
pub struct StepUpService {
    identity: Arc<dyn IdentityProvider>,
    attempts: Arc<dyn StepUpAttemptStorage>,
    clock: Arc<dyn Clock>,
    settings: StepUpSettings,
    call_timeout: std::time::Duration,
    state: Arc<Mutex<GateState>>,
}

impl StepUpService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        attempts: Arc<dyn StepUpAttemptStorage>,
        clock: Arc<dyn Clock>,
        settings: StepUpSettings,
        call_timeout: std::time::Duration,
    ) -> Self {
        Self {
            identity,
            attempts,
            clock,
            settings,
            call_timeout,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    /// Describe the prompt shown before `operation`
    pub fn require_step_up(&self, actor: &ActorContext, operation: GuardedOperation) -> StepUpRequirement {
        StepUpRequirement {
            title: operation.title().to_string(),
            subtitle: operation.subtitle(),
            password_available: self.identity.has_password(&actor.guardian_id),
            channels: self.identity.channels_for(&actor.guardian_id),
            operation,
        }
    }

    pub async fn verify_password(
        &self,
        actor: &ActorContext,
        operation: GuardedOperation,
        secret: &str,
    ) -> GuardianResult<StepUpProof> {
        if secret.trim().is_empty() {
            return Err(GuardianError::validation("Password cannot be empty"));
        }

        let verified = self
            .bounded("Password verification", self.identity.verify_password(&actor.guardian_id, secret))
            .await?;
        self.journal(actor, &ProofMethod::Password, &operation, verified).await;

        if !verified {
            warn!("Password step-up failed for guardian {}", actor.guardian_id);
            return Err(GuardianError::auth("Incorrect password"));
        }
        Ok(self.issue_proof(actor, operation, ProofMethod::Password))
    }

    pub async fn send_challenge(
        &self,
        actor: &ActorContext,
        channel: ChallengeChannel,
    ) -> GuardianResult<ChallengeTicket> {
        let now = self.clock.now();
        let cooldown = Duration::seconds(self.settings.resend_cooldown_secs);
        let key = (actor.guardian_id.clone(), channel);

        self.sweep(now, cooldown).await;

        // Reserve the send slot before calling out so concurrent sends cannot both pass
        let previous = {
            let mut state = lock_state(&self.state);
            if let Some(last) = state.last_sent.get(&key) {
                let available_at = *last + cooldown;
                if available_at > now {
                    let remaining = (available_at - now).num_milliseconds();
                    return Err(GuardianError::ChallengeCooldown {
                        retry_after_secs: (remaining + 999) / 1000,
                    });
                }
            }
            state.last_sent.insert(key.clone(), now)
        };

        let sent = self
            .bounded("Challenge delivery", self.identity.send_challenge(&actor.guardian_id, channel))
            .await;
        let challenge_id = match sent {
            Ok(challenge_id) => challenge_id,
            Err(e) => {
                let mut state = lock_state(&self.state);
                match previous {
                    Some(previous) => state.last_sent.insert(key, previous),
                    None => state.last_sent.remove(&key),
                };
                return Err(e);
            }
        };

        let expires_at = now + Duration::seconds(self.settings.challenge_ttl_secs);
        lock_state(&self.state).challenges.insert(
            challenge_id.clone(),
            ChallengeRecord {
                guardian_id: actor.guardian_id.clone(),
                channel,
                expires_at,
                attempts: 0,
            },
        );
        info!("Sent {} challenge to guardian {}", channel, actor.guardian_id);

        Ok(ChallengeTicket {
            challenge_id,
            channel,
            expires_at,
            resend_available_at: now + cooldown,
        })
    }

    pub async fn verify_challenge(
        &self,
        actor: &ActorContext,
        operation: GuardedOperation,
        challenge_id: &str,
        code: &str,
    ) -> GuardianResult<StepUpProof> {
        if code.trim().is_empty() {
            return Err(GuardianError::validation("Verification code cannot be empty"));
        }
        let now = self.clock.now();

        let checked = {
            let mut state = lock_state(&self.state);
            match state.challenges.get_mut(challenge_id) {
                Some(record) if record.guardian_id == actor.guardian_id => {
                    if record.expires_at <= now {
                        None
                    } else {
                        record.attempts += 1;
                        Some((record.channel, record.attempts >= self.settings.max_code_attempts))
                    }
                }
                _ => return Err(GuardianError::auth("Unknown challenge")),
            }
        };
        let (channel, exhausted) = match checked {
            Some(checked) => checked,
            None => {
                lock_state(&self.state).challenges.remove(challenge_id);
                self.revoke(challenge_id).await;
                return Err(GuardianError::auth("Challenge expired"));
            }
        };

        let method = ProofMethod::Challenge(channel);
        let verified = self
            .bounded("Code verification", self.identity.verify_challenge(challenge_id, code))
            .await?;
        self.journal(actor, &method, &operation, verified).await;

        if verified {
            lock_state(&self.state).challenges.remove(challenge_id);
            return Ok(self.issue_proof(actor, operation, method));
        }

        if exhausted {
            lock_state(&self.state).challenges.remove(challenge_id);
            self.revoke(challenge_id).await;
            warn!("Challenge {} discarded after too many attempts", challenge_id);
        }
        Err(GuardianError::auth("Incorrect verification code"))
    }

    /// Run `mutation` under the proof `proof_id`. The proof must belong to the
    /// actor, match `operation` exactly, be unexpired and not already in use.
    pub async fn execute<T, F, Fut>(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        operation: &GuardedOperation,
        mutation: F,
    ) -> GuardianResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GuardianResult<T>>,
    {
        let reservation = self.reserve(actor, proof_id, operation)?;
        match mutation().await {
            Ok(value) => {
                reservation.commit();
                info!("Guardian {} completed {}", actor.guardian_id, operation);
                Ok(value)
            }
            Err(e) => {
                drop(reservation);
                Err(e)
            }
        }
    }

    /// Discard an unused proof
    pub fn cancel(&self, actor: &ActorContext, proof_id: &str) -> GuardianResult<()> {
        let mut state = lock_state(&self.state);
        let in_flight = match state.proofs.get(proof_id) {
            Some(entry) if entry.proof.guardian_id == actor.guardian_id => entry.in_flight,
            _ => return Err(GuardianError::auth("Unknown step-up proof")),
        };
        if in_flight {
            return Err(GuardianError::validation("Proof is currently in use"));
        }
        state.proofs.remove(proof_id);
        Ok(())
    }

    pub async fn recent_attempts(&self, guardian_id: Option<&str>, limit: Option<u32>) -> GuardianResult<Vec<StepUpAttempt>> {
        let attempts = match guardian_id {
            Some(id) => self.attempts.get_attempts(id, limit).await?,
            None => self.attempts.get_all_attempts(limit).await?,
        };
        Ok(attempts)
    }

    pub async fn attempt_stats(&self, guardian_id: Option<&str>) -> GuardianResult<StepUpAttemptStats> {
        let attempts = self.recent_attempts(guardian_id, None).await?;
        let total_attempts = attempts.len();
        let successful_attempts = attempts.iter().filter(|a| a.success).count();
        let failed_attempts = total_attempts - successful_attempts;
        let success_rate = if total_attempts > 0 {
            (successful_attempts as f64 / total_attempts as f64) * 100.0
        } else {
            0.0
        };
        Ok(StepUpAttemptStats {
            total_attempts,
            successful_attempts,
            failed_attempts,
            success_rate,
        })
    }

    fn reserve(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        operation: &GuardedOperation,
    ) -> GuardianResult<ProofReservation> {
        let now = self.clock.now();
        let mut state = lock_state(&self.state);
        state.purge_proofs(now);

        let entry = state
            .proofs
            .get_mut(proof_id)
            .ok_or_else(|| GuardianError::auth("Missing or expired step-up proof"))?;
        if entry.proof.guardian_id != actor.guardian_id {
            return Err(GuardianError::auth("Step-up proof belongs to another guardian"));
        }
        if &entry.proof.operation != operation {
            return Err(GuardianError::auth("Step-up proof was issued for a different operation"));
        }
        if entry.proof.expires_at <= now {
            return Err(GuardianError::auth("Step-up proof expired"));
        }
        if entry.in_flight {
            return Err(GuardianError::auth("Step-up proof is already being redeemed"));
        }
        entry.in_flight = true;

        Ok(ProofReservation {
            state: self.state.clone(),
            proof_id: proof_id.to_string(),
            committed: false,
        })
    }

    fn issue_proof(&self, actor: &ActorContext, operation: GuardedOperation, method: ProofMethod) -> StepUpProof {
        let issued_at = self.clock.now();
        let proof = StepUpProof {
            proof_id: format!("proof::{}", Uuid::new_v4().simple()),
            guardian_id: actor.guardian_id.clone(),
            operation,
            method,
            issued_at,
            expires_at: issued_at + Duration::seconds(self.settings.proof_ttl_secs),
        };
        lock_state(&self.state).proofs.insert(
            proof.proof_id.clone(),
            ProofEntry {
                proof: proof.clone(),
                in_flight: false,
            },
        );
        info!("Issued {} step-up proof for {}", proof.method, proof.operation);
        proof
    }

    async fn bounded<T, Fut>(&self, what: &str, call: Fut) -> GuardianResult<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GuardianError::ExternalService(format!("{}: {}", what, e))),
            Err(_) => Err(GuardianError::Timeout(what.to_string())),
        }
    }

    async fn journal(&self, actor: &ActorContext, method: &ProofMethod, operation: &GuardedOperation, success: bool) {
        // The attempt journal is advisory; a failed write does not change the outcome
        if let Err(e) = self
            .attempts
            .record_attempt(&actor.guardian_id, &method.to_string(), &operation.to_string(), success)
            .await
        {
            warn!("Failed to record step-up attempt: {}", e);
        }
    }

    /// Drop expired gate state and revoke the expired challenges with the provider
    async fn sweep(&self, now: DateTime<Utc>, cooldown: Duration) {
        let expired = lock_state(&self.state).purge_expired(now, cooldown);
        for challenge_id in expired {
            self.revoke(&challenge_id).await;
        }
    }

    async fn revoke(&self, challenge_id: &str) {
        if let Err(e) = self.identity.revoke_challenge(challenge_id).await {
            warn!("Failed to revoke challenge {}: {}", challenge_id, e);
        }
    }
}
