use log::{error, info};
use shared::{
    ActivityEvent, ActivityKind, ApprovalMode, ApprovalStatus, ApprovalVote, ChildActionOutcome, Decision,
    GuardedOperation, PendingApproval, Severity,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::activity_service::ActivityService;
use crate::domain::child_service::ChildService;
use crate::domain::clock::Clock;
use crate::domain::commands::approvals::{ApprovalListQuery, ChildAction, CreateApprovalCommand};
use crate::domain::errors::{GuardianError, GuardianResult};
use crate::domain::household_service::{active_co_guardian, required_quorum, HouseholdService};
use crate::domain::locks::EntityLocks;
use crate::domain::models::ActorContext;
use crate::domain::policy_evaluation::{evaluate_action, Verdict};
use crate::domain::step_up_service::StepUpService;
use crate::storage::ApprovalStorage;

const MAX_TITLE_LENGTH: usize = 200;
const MIN_REASON_LENGTH: usize = 3;

/// Service for approval requests and guardian decisions on them
#[derive(Clone)]
pub struct ApprovalService {
    storage: Arc<dyn ApprovalStorage>,
    children: ChildService,
    household: HouseholdService,
    activity: ActivityService,
    step_up: StepUpService,
    locks: EntityLocks,
    clock: Arc<dyn Clock>,
    charging_app_key: String,
}

impl ApprovalService {
    pub fn new(
        storage: Arc<dyn ApprovalStorage>,
        children: ChildService,
        household: HouseholdService,
        activity: ActivityService,
        step_up: StepUpService,
        clock: Arc<dyn Clock>,
        charging_app_key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            children,
            household,
            activity,
            step_up,
            locks: EntityLocks::new(),
            clock,
            charging_app_key: charging_app_key.into(),
        }
    }

    pub fn generate_id() -> String {
        format!("approval::{}", Uuid::new_v4().simple())
    }

    /// Raise an approval request for a child
    pub async fn create_approval(&self, command: CreateApprovalCommand) -> GuardianResult<PendingApproval> {
        info!("Creating approval for child {}: {}", command.child_id, command.title);

        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GuardianError::validation("Approval title cannot be empty"));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(GuardianError::validation(format!(
                "Approval title cannot exceed {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if command.amount < 0 {
            return Err(GuardianError::validation("Amount cannot be negative"));
        }
        let reason = command.reason.trim().to_string();
        if reason.chars().count() < MIN_REASON_LENGTH {
            return Err(GuardianError::validation(format!(
                "Reason must be at least {} characters",
                MIN_REASON_LENGTH
            )));
        }

        let child = self.children.get_child(&command.child_id).await?;
        let currency = match command.currency {
            Some(code) if !code.trim().is_empty() => code.trim().to_uppercase(),
            _ => child.currency.clone(),
        };

        let approval = PendingApproval {
            id: Self::generate_id(),
            child_id: child.id.clone(),
            created_at: self.clock.now(),
            kind: command.kind,
            title,
            amount: command.amount,
            currency,
            reason,
            vendor: command.vendor,
            detail: command.detail,
            status: ApprovalStatus::Pending,
            votes: Vec::new(),
            decided_at: None,
            decided_by: None,
        };

        let event = self.activity.event(
            Some(&child.id),
            ActivityKind::ApprovalRequested,
            Severity::Info,
            format!("{} needs approval: {}", approval.title, approval.reason),
        );
        self.storage.store_approval(&approval).await?;
        if let Err(e) = self.activity.record(&[event]).await {
            error!("Removing approval {} after audit failure", approval.id);
            if let Err(rollback) = self.storage.remove_approval(&approval.id).await {
                error!("Rollback of approval {} failed: {}", approval.id, rollback);
            }
            return Err(e);
        }

        info!("Created approval {} for child {}", approval.id, approval.child_id);
        Ok(approval)
    }

    /// Evaluate a child-initiated action and block it, allow it, or raise an approval
    pub async fn submit_child_action(&self, child_id: &str, action: ChildAction) -> GuardianResult<ChildActionOutcome> {
        if action.title.trim().is_empty() {
            return Err(GuardianError::validation("Action title cannot be empty"));
        }
        if action.amount < 0 {
            return Err(GuardianError::validation("Amount cannot be negative"));
        }
        if action.energy_kwh.map_or(false, |kwh| !kwh.is_finite() || kwh < 0.0) {
            return Err(GuardianError::validation("Energy must be a non-negative number"));
        }

        let child = self.children.get_child(child_id).await?;
        let local_time = action.local_time.unwrap_or_else(|| self.clock.now().time());

        match evaluate_action(&child, &action, local_time, &self.charging_app_key) {
            Verdict::Allow => Ok(ChildActionOutcome::Allowed),
            Verdict::Block(reason) => {
                let event = self.activity.event(
                    Some(child_id),
                    ActivityKind::Blocked,
                    Severity::Warning,
                    format!("Blocked {}: {}", action.title.trim(), reason),
                );
                self.activity.record(&[event]).await?;
                info!("Blocked action '{}' for child {}: {}", action.title, child_id, reason);
                Ok(ChildActionOutcome::Blocked { reason })
            }
            Verdict::RequireApproval(reason) => {
                let approval = self
                    .create_approval(CreateApprovalCommand {
                        child_id: child_id.to_string(),
                        kind: action.kind,
                        title: action.title,
                        amount: action.amount,
                        currency: action.currency,
                        reason,
                        vendor: action.vendor,
                        detail: action.detail,
                    })
                    .await?;
                Ok(ChildActionOutcome::ApprovalRequired { approval })
            }
        }
    }

    pub async fn get_approval(&self, approval_id: &str) -> GuardianResult<PendingApproval> {
        self.storage
            .get_approval(approval_id)
            .await?
            .ok_or_else(|| GuardianError::not_found("Approval", approval_id))
    }

    pub async fn list_approvals(&self, query: ApprovalListQuery) -> GuardianResult<Vec<PendingApproval>> {
        Ok(self
            .storage
            .list_approvals(query.child_id.as_deref(), query.status)
            .await?)
    }

    /// Record a guardian decision. Requires a step-up proof for this approval.
    pub async fn decide(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        approval_id: &str,
        decision: Decision,
    ) -> GuardianResult<PendingApproval> {
        let operation = GuardedOperation::DecideApproval {
            approval_id: approval_id.to_string(),
        };
        self.step_up
            .execute(actor, proof_id, &operation, || {
                self.apply_decision(actor, approval_id, decision)
            })
            .await
    }

    async fn apply_decision(
        &self,
        actor: &ActorContext,
        approval_id: &str,
        decision: Decision,
    ) -> GuardianResult<PendingApproval> {
        let _guard = self.locks.acquire(approval_id).await;

        let current = self.get_approval(approval_id).await?;
        if current.status.is_terminal() {
            return Err(GuardianError::AlreadyDecided(approval_id.to_string()));
        }

        let household = self.household.household().await?;
        let guardian_name = active_co_guardian(&household, actor)?.name.clone();

        if current.votes.iter().any(|v| v.guardian_id == actor.guardian_id) {
            return Err(GuardianError::AlreadyVoted {
                approval_id: approval_id.to_string(),
                guardian_id: actor.guardian_id.clone(),
            });
        }

        let now = self.clock.now();
        let mut next = current.clone();
        next.votes.push(ApprovalVote {
            guardian_id: actor.guardian_id.clone(),
            decision,
            at: now,
        });

        let amount = format!("{} {}", format_minor_units(next.amount), next.currency);
        let event = match decision {
            Decision::Decline => {
                next.status = ApprovalStatus::Declined;
                next.decided_at = Some(now);
                next.decided_by = Some(actor.guardian_id.clone());
                self.decision_event(
                    &next,
                    ActivityKind::ApprovalDeclined,
                    Severity::Warning,
                    format!("{} declined {} ({})", guardian_name, next.title, amount),
                )
            }
            Decision::Approve => {
                let required = required_quorum(&household);
                let approvals = next
                    .votes
                    .iter()
                    .filter(|v| v.decision == Decision::Approve)
                    .filter(|v| household.active_co_guardians().any(|m| m.id == v.guardian_id))
                    .count();
                if household.approval_mode == ApprovalMode::AnyGuardian || approvals >= required {
                    next.status = ApprovalStatus::Approved;
                    next.decided_at = Some(now);
                    next.decided_by = Some(actor.guardian_id.clone());
                    self.decision_event(
                        &next,
                        ActivityKind::ApprovalApproved,
                        Severity::Info,
                        format!("{} approved {} ({})", guardian_name, next.title, amount),
                    )
                } else {
                    self.decision_event(
                        &next,
                        ActivityKind::ApprovalVoteRecorded,
                        Severity::Info,
                        format!(
                            "{} approved {} ({}/{} approvals)",
                            guardian_name, next.title, approvals, required
                        ),
                    )
                }
            }
        };

        self.storage.update_approval(&next).await?;
        if let Err(e) = self.activity.record(&[event]).await {
            error!("Rolling back approval {} after audit failure", approval_id);
            if let Err(rollback) = self.storage.update_approval(&current).await {
                error!("Rollback of approval {} failed: {}", approval_id, rollback);
            }
            return Err(e);
        }

        info!("Approval {} is now {:?}", approval_id, next.status);
        Ok(next)
    }

    fn decision_event(
        &self,
        approval: &PendingApproval,
        kind: ActivityKind,
        severity: Severity,
        summary: String,
    ) -> ActivityEvent {
        self.activity
            .event(Some(&approval.child_id), kind, severity, summary)
    }
}

/// Render minor units with two decimals, e.g. `7500` as `75.00`
fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{TestEngine, PRIMARY_ID};
    use shared::{ApprovalKind, MemberRole};

    fn request(child_id: &str, amount: i64) -> CreateApprovalCommand {
        CreateApprovalCommand {
            child_id: child_id.to_string(),
            kind: ApprovalKind::Purchase,
            title: "Sneakers".to_string(),
            amount,
            currency: None,
            reason: "Above approval threshold".to_string(),
            vendor: Some("ShoeCo".to_string()),
            detail: None,
        }
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(7_500), "75.00");
        assert_eq!(format_minor_units(5), "0.05");
        assert_eq!(format_minor_units(-1_234), "-12.34");
    }

    #[tokio::test]
    async fn test_create_approval_validation() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let service = &engine.state.approval_service;

        assert!(matches!(
            service.create_approval(request(&child.id, -1)).await,
            Err(GuardianError::Validation(_))
        ));
        let mut short_reason = request(&child.id, 100);
        short_reason.reason = "no".to_string();
        assert!(matches!(service.create_approval(short_reason).await, Err(GuardianError::Validation(_))));
        assert!(matches!(
            service.create_approval(request("child::missing", 100)).await,
            Err(GuardianError::NotFound { .. })
        ));

        let approval = service.create_approval(request(&child.id, 7_500)).await.unwrap();
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert_eq!(approval.currency, child.currency);
        let events = engine.activity_for(&child.id).await;
        assert_eq!(events[0].kind, ActivityKind::ApprovalRequested);
    }

    #[tokio::test]
    async fn test_decide_any_guardian_mode() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let service = &engine.state.approval_service;
        let approval = service.create_approval(request(&child.id, 7_500)).await.unwrap();
        let op = GuardedOperation::DecideApproval { approval_id: approval.id.clone() };

        let proof = engine.password_proof(op.clone()).await;
        let decided = service
            .decide(&engine.primary(), &proof, &approval.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
        assert_eq!(decided.decided_by.as_deref(), Some(PRIMARY_ID));

        let events = engine.activity_for(&child.id).await;
        assert_eq!(events[0].kind, ActivityKind::ApprovalApproved);
        assert_eq!(events[0].severity, Severity::Info);

        let proof = engine.password_proof(op).await;
        let again = service.decide(&engine.primary(), &proof, &approval.id, Decision::Decline).await;
        assert!(matches!(again, Err(GuardianError::AlreadyDecided(_))));
    }

    #[tokio::test]
    async fn test_decline_is_a_warning() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let service = &engine.state.approval_service;
        let approval = service.create_approval(request(&child.id, 7_500)).await.unwrap();
        let proof = engine
            .password_proof(GuardedOperation::DecideApproval { approval_id: approval.id.clone() })
            .await;

        let declined = service
            .decide(&engine.primary(), &proof, &approval.id, Decision::Decline)
            .await
            .unwrap();
        assert_eq!(declined.status, ApprovalStatus::Declined);
        let events = engine.activity_for(&child.id).await;
        assert_eq!(events[0].kind, ActivityKind::ApprovalDeclined);
        assert_eq!(events[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_all_guardians_mode_requires_every_vote() {
        let engine = TestEngine::new().await;
        let alex = engine.add_active_guardian("Alex", "alex@example.com", "alex-password").await;
        engine.set_mode(ApprovalMode::AllGuardians).await;

        let child = engine.create_child("Ann").await;
        let service = &engine.state.approval_service;
        let approval = service.create_approval(request(&child.id, 7_500)).await.unwrap();
        let op = GuardedOperation::DecideApproval { approval_id: approval.id.clone() };

        let proof = engine.password_proof(op.clone()).await;
        let first = service
            .decide(&engine.primary(), &proof, &approval.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(first.status, ApprovalStatus::Pending);
        assert_eq!(first.votes.len(), 1);
        assert_eq!(engine.activity_for(&child.id).await[0].kind, ActivityKind::ApprovalVoteRecorded);

        let proof = engine.password_proof(op.clone()).await;
        let twice = service.decide(&engine.primary(), &proof, &approval.id, Decision::Approve).await;
        assert!(matches!(twice, Err(GuardianError::AlreadyVoted { .. })));

        let alex_actor = ActorContext::guardian(alex.id.clone());
        let proof = engine.password_proof_for(&alex_actor, "alex-password", op).await;
        let second = service
            .decide(&alex_actor, &proof, &approval.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(second.status, ApprovalStatus::Approved);
        assert_eq!(engine.activity_for(&child.id).await[0].kind, ActivityKind::ApprovalApproved);
    }

    #[tokio::test]
    async fn test_non_guardians_cannot_decide() {
        let engine = TestEngine::new().await;
        let contact = engine
            .invite_member(MemberRole::EmergencyContact, "Gran", "gran@example.com")
            .await;
        engine.state.household_service.accept_invite(&contact.id).await.unwrap();
        engine.identity.set_password(contact.id.clone(), "gran-password");

        let child = engine.create_child("Ann").await;
        let service = &engine.state.approval_service;
        let approval = service.create_approval(request(&child.id, 7_500)).await.unwrap();
        let op = GuardedOperation::DecideApproval { approval_id: approval.id.clone() };

        let gran = ActorContext::guardian(contact.id.clone());
        let proof = engine.password_proof_for(&gran, "gran-password", op).await;
        let result = service.decide(&gran, &proof, &approval.id, Decision::Approve).await;
        assert!(matches!(result, Err(GuardianError::Forbidden(_))));
        assert_eq!(service.get_approval(&approval.id).await.unwrap().status, ApprovalStatus::Pending);
    }

    #[tokio::test]
    async fn test_child_action_outcomes() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let service = &engine.state.approval_service;
        let action = |amount: i64| ChildAction {
            kind: ApprovalKind::Purchase,
            title: "Comic book".to_string(),
            amount,
            currency: None,
            vendor: None,
            app: None,
            category: None,
            energy_kwh: None,
            station: None,
            detail: None,
            local_time: chrono::NaiveTime::from_hms_opt(12, 0, 0),
        };

        // the helper child has a daily limit of 2 000
        let allowed = service.submit_child_action(&child.id, action(500)).await.unwrap();
        assert_eq!(allowed, ChildActionOutcome::Allowed);

        let blocked = service.submit_child_action(&child.id, action(5_000)).await.unwrap();
        assert!(matches!(blocked, ChildActionOutcome::Blocked { .. }));
        assert_eq!(engine.activity_for(&child.id).await[0].kind, ActivityKind::Blocked);

        let mut trip = action(1_000);
        trip.kind = ApprovalKind::Trip;
        match service.submit_child_action(&child.id, trip).await.unwrap() {
            ChildActionOutcome::ApprovalRequired { approval } => {
                assert_eq!(approval.reason, "Requires guardian approval");
                assert_eq!(approval.status, ApprovalStatus::Pending);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert!(matches!(
            service.submit_child_action(&child.id, action(-5)).await,
            Err(GuardianError::Validation(_))
        ));
    }
}
