//! Household membership and approval-mode settings.
//!
//! The household is a single record guarded by one lock. Its primary guardian
//! is seeded from configuration on first start and can only change hands via
//! [`HouseholdService::set_primary`].

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    ActivityEvent, ActivityKind, ApprovalMode, ContactChannel, GuardedOperation, Household, HouseholdMember,
    MemberRole, MemberStatus, Severity,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::activity_service::ActivityService;
use crate::domain::clock::Clock;
use crate::domain::commands::household::{InviteMemberCommand, RemoveMemberCommand};
use crate::domain::errors::{GuardianError, GuardianResult};
use crate::domain::identity::{Notification, NotificationDispatcher};
use crate::domain::locks::EntityLocks;
use crate::domain::models::ActorContext;
use crate::domain::step_up_service::StepUpService;
use crate::storage::HouseholdStorage;

const HOUSEHOLD_LOCK: &str = "household";

/// Identity of the guardian who owns the household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryGuardian {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// SHA-256 hex digest of the step-up password
    pub password_sha256: Option<String>,
}

impl Default for PrimaryGuardian {
    fn default() -> Self {
        Self {
            id: "guardian::primary".to_string(),
            name: "Primary guardian".to_string(),
            email: None,
            phone: None,
            password_sha256: None,
        }
    }
}

#[derive(Clone)]
pub struct HouseholdService {
    storage: Arc<dyn HouseholdStorage>,
    activity: ActivityService,
    step_up: StepUpService,
    dispatcher: Arc<dyn NotificationDispatcher>,
    locks: EntityLocks,
    clock: Arc<dyn Clock>,
    call_timeout: std::time::Duration,
    primary: PrimaryGuardian,
}

impl HouseholdService {
    pub fn new(
        storage: Arc<dyn HouseholdStorage>,
        activity: ActivityService,
        step_up: StepUpService,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        call_timeout: std::time::Duration,
        primary: PrimaryGuardian,
    ) -> Self {
        Self {
            storage,
            activity,
            step_up,
            dispatcher,
            locks: EntityLocks::new(),
            clock,
            call_timeout,
            primary,
        }
    }

    /// Load the household, creating it around the configured primary guardian on first use
    pub async fn household(&self) -> GuardianResult<Household> {
        if let Some(household) = self.storage.load_household().await? {
            return Ok(household);
        }
        let _guard = self.locks.acquire(HOUSEHOLD_LOCK).await;
        self.load_or_bootstrap().await
    }

    /// Approvals needed to resolve a request under the current mode
    pub async fn required_quorum(&self) -> GuardianResult<usize> {
        let household = self.household().await?;
        Ok(required_quorum(&household))
    }

    /// The acting guardian's membership, if they may supervise
    pub async fn require_active_co_guardian(&self, actor: &ActorContext) -> GuardianResult<HouseholdMember> {
        let household = self.household().await?;
        active_co_guardian(&household, actor).cloned()
    }

    pub async fn invite(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        command: InviteMemberCommand,
    ) -> GuardianResult<HouseholdMember> {
        let command = validate_invite(command)?;
        self.step_up
            .execute(actor, proof_id, &GuardedOperation::InviteMember, || async move {
                let _guard = self.locks.acquire(HOUSEHOLD_LOCK).await;
                let current = self.load_or_bootstrap().await?;
                active_co_guardian(&current, actor)?;

                let duplicate = current.members.iter().any(|m| {
                    (command.email.is_some() && m.email == command.email)
                        || (command.phone.is_some() && m.phone == command.phone)
                });
                if duplicate {
                    return Err(GuardianError::validation("This contact is already a household member"));
                }

                let now = self.clock.now();
                let member = HouseholdMember {
                    id: format!("member::{}", Uuid::new_v4().simple()),
                    role: command.role,
                    status: MemberStatus::Pending,
                    name: command.name,
                    email: command.email,
                    phone: command.phone,
                    channels: command.channels,
                    is_primary: false,
                    invited_at: now,
                    joined_at: None,
                };

                self.send_invitation(&member).await?;

                let mut next = current.clone();
                next.members.push(member.clone());
                let event = self.household_event(format!("Invited {} as {}", member.name, role_label(member.role)));
                self.persist(&current, next, event).await?;

                info!("Invited household member {} ({})", member.id, member.name);
                Ok(member)
            })
            .await
    }

    /// Activate a pending invitation
    pub async fn accept_invite(&self, member_id: &str) -> GuardianResult<HouseholdMember> {
        let _guard = self.locks.acquire(HOUSEHOLD_LOCK).await;
        let current = self.load_or_bootstrap().await?;

        let mut next = current.clone();
        let member = next
            .members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| GuardianError::not_found("Member", member_id))?;
        if member.status == MemberStatus::Active {
            return Err(GuardianError::validation("Invitation was already accepted"));
        }
        member.status = MemberStatus::Active;
        member.joined_at = Some(self.clock.now());
        let accepted = member.clone();

        let event = self.household_event(format!("{} joined the household", accepted.name));
        self.persist(&current, next, event).await?;
        Ok(accepted)
    }

    pub async fn remove(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        command: RemoveMemberCommand,
    ) -> GuardianResult<HouseholdMember> {
        let operation = GuardedOperation::RemoveMember {
            member_id: command.member_id.clone(),
        };
        self.step_up
            .execute(actor, proof_id, &operation, || async move {
                let _guard = self.locks.acquire(HOUSEHOLD_LOCK).await;
                let current = self.load_or_bootstrap().await?;
                active_co_guardian(&current, actor)?;

                let member = current
                    .member(&command.member_id)
                    .cloned()
                    .ok_or_else(|| GuardianError::not_found("Member", command.member_id.as_str()))?;

                if member.is_primary {
                    return Err(GuardianError::SafetyInvariantViolation(
                        "The primary guardian cannot be removed; transfer the primary role first".to_string(),
                    ));
                }
                let active_contacts = current
                    .members
                    .iter()
                    .filter(|m| m.role == MemberRole::EmergencyContact && m.status == MemberStatus::Active)
                    .count();
                let last_contact = member.role == MemberRole::EmergencyContact
                    && member.status == MemberStatus::Active
                    && active_contacts == 1;
                if last_contact && !command.allow_last_emergency_contact {
                    return Err(GuardianError::SafetyInvariantViolation(
                        "Removing the last active emergency contact requires explicit confirmation".to_string(),
                    ));
                }

                let mut next = current.clone();
                next.members.retain(|m| m.id != member.id);
                let event = self.household_event(format!("Removed {} ({})", member.name, role_label(member.role)));
                self.persist(&current, next, event).await?;

                if last_contact {
                    warn!("Last active emergency contact {} removed", member.id);
                }
                Ok(member)
            })
            .await
    }

    pub async fn set_approval_mode(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        mode: ApprovalMode,
    ) -> GuardianResult<Household> {
        self.step_up
            .execute(actor, proof_id, &GuardedOperation::SetApprovalMode, || async move {
                let _guard = self.locks.acquire(HOUSEHOLD_LOCK).await;
                let current = self.load_or_bootstrap().await?;
                active_co_guardian(&current, actor)?;

                let mut next = current.clone();
                next.approval_mode = mode;
                let event = self.household_event(format!("Approval mode set to {}", mode));
                self.persist(&current, next, event).await
            })
            .await
    }

    pub async fn set_primary(&self, actor: &ActorContext, proof_id: &str, member_id: &str) -> GuardianResult<Household> {
        let operation = GuardedOperation::SetPrimaryGuardian {
            member_id: member_id.to_string(),
        };
        self.step_up
            .execute(actor, proof_id, &operation, || async move {
                let _guard = self.locks.acquire(HOUSEHOLD_LOCK).await;
                let current = self.load_or_bootstrap().await?;
                active_co_guardian(&current, actor)?;

                let target = current
                    .member(member_id)
                    .ok_or_else(|| GuardianError::not_found("Member", member_id))?;
                if !target.is_active_co_guardian() {
                    return Err(GuardianError::validation("Only an active co-guardian can become primary"));
                }
                if target.is_primary {
                    return Ok(current);
                }
                let name = target.name.clone();

                let mut next = current.clone();
                for member in next.members.iter_mut() {
                    member.is_primary = member.id == member_id;
                }
                let event = self.household_event(format!("{} is now the primary guardian", name));
                self.persist(&current, next, event).await
            })
            .await
    }

    async fn load_or_bootstrap(&self) -> GuardianResult<Household> {
        if let Some(household) = self.storage.load_household().await? {
            return Ok(household);
        }

        let now = self.clock.now();
        let primary = &self.primary;
        let mut channels = BTreeMap::new();
        channels.insert(ContactChannel::Email, primary.email.is_some());
        channels.insert(ContactChannel::Sms, primary.phone.is_some());
        let household = Household {
            approval_mode: ApprovalMode::default(),
            members: vec![HouseholdMember {
                id: primary.id.clone(),
                role: MemberRole::CoGuardian,
                status: MemberStatus::Active,
                name: primary.name.clone(),
                email: primary.email.clone(),
                phone: primary.phone.clone(),
                channels,
                is_primary: true,
                invited_at: now,
                joined_at: Some(now),
            }],
            version: 1,
            updated_at: now,
        };
        self.storage.save_household(&household).await?;
        info!("Created household with primary guardian {}", primary.id);
        Ok(household)
    }

    async fn persist(&self, current: &Household, mut next: Household, event: ActivityEvent) -> GuardianResult<Household> {
        next.version = current.version + 1;
        next.updated_at = self.clock.now();

        self.storage.save_household(&next).await?;
        if let Err(e) = self.activity.record(&[event]).await {
            error!("Rolling back household after audit failure");
            if let Err(rollback) = self.storage.save_household(current).await {
                error!("Household rollback failed: {}", rollback);
            }
            return Err(e);
        }
        Ok(next)
    }

    async fn send_invitation(&self, member: &HouseholdMember) -> GuardianResult<()> {
        for (channel, enabled) in &member.channels {
            if !enabled {
                continue;
            }
            let recipient = match channel {
                ContactChannel::Email => member.email.clone(),
                ContactChannel::Sms | ContactChannel::WhatsApp => member.phone.clone(),
            };
            let Some(recipient) = recipient else { continue };

            let notice = Notification {
                recipient,
                channel: channel.to_string(),
                subject: "Household invitation".to_string(),
                body: format!(
                    "{} invited you to join their household as {}",
                    self.primary.name,
                    role_label(member.role)
                ),
                code: None,
            };
            match tokio::time::timeout(self.call_timeout, self.dispatcher.dispatch(notice)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(GuardianError::ExternalService(format!("Invitation delivery: {}", e))),
                Err(_) => return Err(GuardianError::Timeout("Invitation delivery".to_string())),
            }
        }
        Ok(())
    }

    fn household_event(&self, summary: String) -> ActivityEvent {
        self.activity
            .event(None, ActivityKind::HouseholdUpdated, Severity::Info, summary)
    }
}

/// Only active co-guardians may supervise; everyone else is forbidden
pub fn active_co_guardian<'a>(household: &'a Household, actor: &ActorContext) -> GuardianResult<&'a HouseholdMember> {
    household
        .active_co_guardians()
        .find(|m| m.id == actor.guardian_id)
        .ok_or_else(|| {
            GuardianError::Forbidden(format!("{} is not an active co-guardian", actor.guardian_id))
        })
}

pub fn required_quorum(household: &Household) -> usize {
    match household.approval_mode {
        ApprovalMode::AnyGuardian => 1,
        ApprovalMode::AllGuardians => household.active_co_guardians().count().max(1),
    }
}

fn role_label(role: MemberRole) -> &'static str {
    match role {
        MemberRole::CoGuardian => "co-guardian",
        MemberRole::EmergencyContact => "emergency contact",
    }
}

fn validate_invite(mut command: InviteMemberCommand) -> GuardianResult<InviteMemberCommand> {
    command.name = command.name.trim().to_string();
    if command.name.is_empty() {
        return Err(GuardianError::validation("Member name cannot be empty"));
    }
    command.email = command.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
    command.phone = command.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

    if let Some(email) = &command.email {
        let valid = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
            .unwrap_or(false);
        if !valid {
            return Err(GuardianError::validation(format!("Invalid email address: {}", email)));
        }
    }
    if let Some(phone) = &command.phone {
        let number = phone.strip_prefix('+').unwrap_or(phone);
        let digits = number.chars().filter(|c| c.is_ascii_digit()).count();
        let allowed = number.chars().all(|c| c.is_ascii_digit() || c == ' ');
        if !allowed || !(7..=15).contains(&digits) {
            return Err(GuardianError::validation(format!("Invalid phone number: {}", phone)));
        }
    }

    let enabled: Vec<ContactChannel> = command
        .channels
        .iter()
        .filter(|(_, on)| **on)
        .map(|(channel, _)| *channel)
        .collect();
    if enabled.is_empty() {
        return Err(GuardianError::validation("At least one contact channel must be enabled"));
    }
    for channel in enabled {
        let reachable = match channel {
            ContactChannel::Email => command.email.is_some(),
            ContactChannel::Sms | ContactChannel::WhatsApp => command.phone.is_some(),
        };
        if !reachable {
            return Err(GuardianError::validation(format!(
                "{} is enabled but no matching contact detail was given",
                channel
            )));
        }
    }
    Ok(command)
}
