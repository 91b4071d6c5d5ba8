use chrono::NaiveDate;
use log::{error, info, warn};
use shared::{ActivityEvent, ActivityKind, ChildProfile, GuardedOperation, Severity};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::activity_service::ActivityService;
use crate::domain::clock::Clock;
use crate::domain::commands::activity::AuditNote;
use crate::domain::commands::children::{
    ApplyTemplateCommand, CreateChildCommand, LinkChildCommand, RecordConsentCommand, UpdatePolicyCommand,
};
use crate::domain::errors::{GuardianError, GuardianResult};
use crate::domain::household_service::HouseholdService;
use crate::domain::locks::EntityLocks;
use crate::domain::models::{ActorContext, PolicyPatch};
use crate::domain::policy_template::template_patch;
use crate::domain::step_up_service::StepUpService;
use crate::storage::ChildStorage;

const MAX_NAME_LENGTH: usize = 100;

/// Service owning supervised child profiles and every change to their policy
#[derive(Clone)]
pub struct ChildService {
    storage: Arc<dyn ChildStorage>,
    activity: ActivityService,
    step_up: StepUpService,
    household: HouseholdService,
    locks: EntityLocks,
    clock: Arc<dyn Clock>,
    charging_app_key: String,
    default_currency: String,
}

impl ChildService {
    pub fn new(
        storage: Arc<dyn ChildStorage>,
        activity: ActivityService,
        step_up: StepUpService,
        household: HouseholdService,
        clock: Arc<dyn Clock>,
        charging_app_key: impl Into<String>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            activity,
            step_up,
            household,
            locks: EntityLocks::new(),
            clock,
            charging_app_key: charging_app_key.into(),
            default_currency: default_currency.into(),
        }
    }

    pub fn generate_id() -> String {
        format!("child::{}", Uuid::new_v4().simple())
    }

    /// Create a new supervised child. The guardian is not verified until consent is recorded.
    pub async fn create_child(&self, actor: &ActorContext, command: CreateChildCommand) -> GuardianResult<ChildProfile> {
        info!("Creating child: name={}, date_of_birth={}", command.name, command.date_of_birth);
        self.household.require_active_co_guardian(actor).await?;

        let name = validate_name(&command.name)?;
        let date_of_birth = self.parse_birthdate(&command.date_of_birth)?;
        let currency = normalize_currency(command.currency.as_deref(), &self.default_currency)?;
        validate_limits(command.daily_limit, command.weekly_limit)?;
        if command.apps.keys().any(|key| key.trim().is_empty()) {
            return Err(GuardianError::validation("App keys cannot be empty"));
        }

        let now = self.clock.now();
        let child = ChildProfile {
            id: Self::generate_id(),
            name,
            date_of_birth,
            school: trimmed(command.school),
            country: trimmed(command.country),
            linked_account: None,
            template: Default::default(),
            currency,
            daily_limit: command.daily_limit,
            weekly_limit: command.weekly_limit,
            require_approval_above: None,
            require_approval_for_all_purchases: false,
            capabilities: Default::default(),
            apps: command.apps,
            category_blocks: Default::default(),
            seller_whitelist: Default::default(),
            schedule: Default::default(),
            curfew: Default::default(),
            geofences: Default::default(),
            charging: Default::default(),
            guardian_verified: false,
            consent_version: None,
            consent_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let event = self.activity.event(
            Some(&child.id),
            ActivityKind::ChildAdded,
            Severity::Success,
            format!("Added {} as a supervised child", child.name),
        );
        self.persist_new(&child, &[event]).await?;

        info!("Created child: {} with ID: {}", child.name, child.id);
        Ok(child)
    }

    /// Place an existing account under supervision, recording consent at once
    pub async fn link_child(&self, actor: &ActorContext, command: LinkChildCommand) -> GuardianResult<ChildProfile> {
        self.household.require_active_co_guardian(actor).await?;
        let account_ref = command.account_ref.trim().to_string();
        if account_ref.is_empty() {
            return Err(GuardianError::validation("Account reference cannot be empty"));
        }
        let consent_version = command.consent_version.trim().to_string();
        if consent_version.is_empty() {
            return Err(GuardianError::validation("Consent version cannot be empty"));
        }
        let name = validate_name(&command.name)?;
        let date_of_birth = self.parse_birthdate(&command.date_of_birth)?;
        let currency = normalize_currency(command.currency.as_deref(), &self.default_currency)?;

        let _guard = self.locks.acquire(&format!("link::{}", account_ref)).await;
        if let Some(existing) = self.storage.find_by_linked_account(&account_ref).await? {
            warn!("Account {} is already linked to {}", account_ref, existing.id);
            return Err(GuardianError::validation(format!(
                "Account {} is already supervised",
                account_ref
            )));
        }

        let now = self.clock.now();
        let child = ChildProfile {
            id: Self::generate_id(),
            name,
            date_of_birth,
            school: None,
            country: None,
            linked_account: Some(account_ref.clone()),
            template: Default::default(),
            currency,
            daily_limit: None,
            weekly_limit: None,
            require_approval_above: None,
            require_approval_for_all_purchases: false,
            capabilities: Default::default(),
            apps: Default::default(),
            category_blocks: Default::default(),
            seller_whitelist: Default::default(),
            schedule: Default::default(),
            curfew: Default::default(),
            geofences: Default::default(),
            charging: Default::default(),
            guardian_verified: true,
            consent_version: Some(consent_version),
            consent_at: Some(now),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let event = self.activity.event(
            Some(&child.id),
            ActivityKind::ChildAdded,
            Severity::Success,
            format!("Linked existing account {} for {}", account_ref, child.name),
        );
        self.persist_new(&child, &[event]).await?;

        info!("Linked account {} as child {}", account_ref, child.id);
        Ok(child)
    }

    pub async fn get_child(&self, child_id: &str) -> GuardianResult<ChildProfile> {
        self.storage
            .get_child(child_id)
            .await?
            .ok_or_else(|| GuardianError::not_found("Child", child_id))
    }

    pub async fn list_children(&self) -> GuardianResult<Vec<ChildProfile>> {
        let children = self.storage.list_children().await?;
        info!("Found {} children", children.len());
        Ok(children)
    }

    pub async fn update_policy(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        child_id: &str,
        command: UpdatePolicyCommand,
    ) -> GuardianResult<ChildProfile> {
        let operation = GuardedOperation::UpdatePolicy {
            child_id: child_id.to_string(),
        };
        self.step_up
            .execute(actor, proof_id, &operation, || async move {
                self.household.require_active_co_guardian(actor).await?;
                let UpdatePolicyCommand {
                    patch,
                    expected_version,
                    audit,
                } = command;
                if patch.is_empty() {
                    return Err(GuardianError::validation("Policy update contains no changes"));
                }
                validate_patch(&patch)?;
                let note = audit.unwrap_or_else(|| default_audit_note(&patch));
                self.commit_patch(child_id, expected_version, move |_| Ok((patch, note)))
                    .await
            })
            .await
    }

    pub async fn apply_template(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        child_id: &str,
        command: ApplyTemplateCommand,
    ) -> GuardianResult<ChildProfile> {
        let operation = GuardedOperation::ApplyTemplate {
            child_id: child_id.to_string(),
        };
        self.step_up
            .execute(actor, proof_id, &operation, || async move {
                self.household.require_active_co_guardian(actor).await?;
                self.commit_patch(child_id, command.expected_version, move |current| {
                    let patch = template_patch(current, command.template);
                    let note = AuditNote::new(
                        ActivityKind::TemplateApplied,
                        Severity::Info,
                        format!("Applied template {} to {}", command.template, current.name),
                    );
                    Ok((patch, note))
                })
                .await
            })
            .await
    }

    pub async fn record_consent(
        &self,
        actor: &ActorContext,
        proof_id: &str,
        child_id: &str,
        command: RecordConsentCommand,
    ) -> GuardianResult<ChildProfile> {
        let consent_version = command.consent_version.trim().to_string();
        if consent_version.is_empty() {
            return Err(GuardianError::validation("Consent version cannot be empty"));
        }
        let operation = GuardedOperation::RecordConsent {
            child_id: child_id.to_string(),
        };
        self.step_up
            .execute(actor, proof_id, &operation, || async move {
                self.household.require_active_co_guardian(actor).await?;
                self.modify(child_id, None, move |_, next| {
                    next.guardian_verified = true;
                    next.consent_version = Some(consent_version.clone());
                    next.consent_at = Some(self.clock.now());
                    Ok(vec![self.activity.event(
                        Some(child_id),
                        ActivityKind::ConsentRecorded,
                        Severity::Success,
                        format!("Guardian consent recorded (version {})", consent_version),
                    )])
                })
                .await
            })
            .await
    }

    /// Build a patch from the current profile and commit it under the child's lock
    async fn commit_patch<B>(
        &self,
        child_id: &str,
        expected_version: Option<u64>,
        build: B,
    ) -> GuardianResult<ChildProfile>
    where
        B: FnOnce(&ChildProfile) -> GuardianResult<(PolicyPatch, AuditNote)>,
    {
        self.modify(child_id, expected_version, |current, next| {
            let (patch, note) = build(current)?;
            patch.apply_to(next);
            validate_profile(next, patch.template.is_none())?;

            let mut audit = self.activity.event_from_note(Some(&current.id), note);
            let Some(disabled) = self.enforce_charging_invariant(current, next, &patch)? else {
                return Ok(vec![audit]);
            };
            // one Charging Updated event per change
            if audit.kind == ActivityKind::ChargingUpdated {
                audit.summary = format!("{}; {}", audit.summary, disabled.summary);
                audit.severity = disabled.severity;
                Ok(vec![audit])
            } else {
                Ok(vec![audit, disabled])
            }
        })
        .await
    }

    /// Read-modify-write of one profile: serialized per child, version-checked,
    /// and rolled back if the audit events cannot be appended.
    async fn modify<F>(&self, child_id: &str, expected_version: Option<u64>, mutate: F) -> GuardianResult<ChildProfile>
    where
        F: FnOnce(&ChildProfile, &mut ChildProfile) -> GuardianResult<Vec<ActivityEvent>>,
    {
        let _guard = self.locks.acquire(child_id).await;

        let current = self.get_child(child_id).await?;
        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(GuardianError::StaleVersion {
                    id: child_id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }

        let mut next = current.clone();
        let events = mutate(&current, &mut next)?;
        next.version = current.version + 1;
        next.updated_at = self.clock.now();

        self.storage.update_child(&next).await?;
        if let Err(e) = self.activity.record(&events).await {
            error!("Rolling back child {} after audit failure", child_id);
            if let Err(rollback) = self.storage.update_child(&current).await {
                error!("Rollback of child {} failed: {}", child_id, rollback);
            }
            return Err(e);
        }

        info!("Updated child {} to version {}", child_id, next.version);
        Ok(next)
    }

    /// Keep charging restrictions consistent with the charging app allowlist entry
    fn enforce_charging_invariant(
        &self,
        before: &ChildProfile,
        after: &mut ChildProfile,
        patch: &PolicyPatch,
    ) -> GuardianResult<Option<ActivityEvent>> {
        let key = self.charging_app_key.as_str();
        if after.app_allowed(key) {
            return Ok(None);
        }
        if patch.charging.enabled == Some(true) {
            return Err(GuardianError::SafetyInvariantViolation(format!(
                "Charging cannot be enabled while the '{}' app is not allowed",
                key
            )));
        }

        let disabled_by_patch = patch.apps.get(key) == Some(&false) && before.app_allowed(key);
        if !disabled_by_patch && !after.charging.enabled {
            return Ok(None);
        }

        after.charging.enabled = false;
        warn!("Charging disabled for {} because the '{}' app is not allowed", after.id, key);
        Ok(Some(self.activity.event(
            Some(&after.id),
            ActivityKind::ChargingUpdated,
            Severity::Warning,
            format!("Charging restrictions disabled because the '{}' app was disallowed", key),
        )))
    }

    async fn persist_new(&self, child: &ChildProfile, events: &[ActivityEvent]) -> GuardianResult<()> {
        self.storage.store_child(child).await?;
        if let Err(e) = self.activity.record(events).await {
            error!("Removing child {} after audit failure", child.id);
            if let Err(rollback) = self.storage.remove_child(&child.id).await {
                error!("Rollback of child {} failed: {}", child.id, rollback);
            }
            return Err(e);
        }
        Ok(())
    }

    fn parse_birthdate(&self, value: &str) -> GuardianResult<NaiveDate> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| GuardianError::validation("Date of birth must be in YYYY-MM-DD format"))?;
        let today = self.clock.now().date_naive();
        if date > today {
            return Err(GuardianError::validation("Date of birth cannot be in the future"));
        }
        if date < NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN) {
            return Err(GuardianError::validation("Date of birth is too far in the past"));
        }
        Ok(date)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_name(name: &str) -> GuardianResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GuardianError::validation("Child name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(GuardianError::validation(format!(
            "Child name cannot exceed {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn normalize_currency(value: Option<&str>, default: &str) -> GuardianResult<String> {
    let code = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default).to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(GuardianError::validation(format!("Invalid currency code: {}", code)));
    }
    Ok(code)
}

fn validate_limits(daily: Option<i64>, weekly: Option<i64>) -> GuardianResult<()> {
    if daily.map_or(false, |v| v < 0) || weekly.map_or(false, |v| v < 0) {
        return Err(GuardianError::validation("Spending limits cannot be negative"));
    }
    if let (Some(daily), Some(weekly)) = (daily, weekly) {
        if weekly < daily {
            return Err(GuardianError::validation("Weekly limit cannot be lower than the daily limit"));
        }
    }
    Ok(())
}

fn non_negative(value: Option<f64>, what: &str) -> GuardianResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(GuardianError::validation(format!("{} must be a non-negative number", what)))
        }
        _ => Ok(()),
    }
}

fn validate_patch(patch: &PolicyPatch) -> GuardianResult<()> {
    if patch.require_approval_above.map_or(false, |v| v < 0) {
        return Err(GuardianError::validation("Approval threshold cannot be negative"));
    }
    if patch.apps.keys().any(|key| key.trim().is_empty()) {
        return Err(GuardianError::validation("App keys cannot be empty"));
    }
    if let Some(sellers) = &patch.seller_whitelist {
        if sellers.iter().any(|s| s.trim().is_empty()) {
            return Err(GuardianError::validation("Seller names cannot be empty"));
        }
    }
    for place in [&patch.geofences.home, &patch.geofences.school].into_iter().flatten() {
        if place.label.trim().is_empty() {
            return Err(GuardianError::validation("Place label cannot be empty"));
        }
        if !place.radius_km.is_finite() || place.radius_km <= 0.0 || place.radius_km > 50.0 {
            return Err(GuardianError::validation("Geofence radius must be between 0 and 50 km"));
        }
    }
    non_negative(patch.charging.daily_kwh_cap, "Daily kWh cap")?;
    non_negative(patch.charging.session_kwh_cap, "Session kWh cap")?;
    non_negative(patch.charging.require_approval_above_kwh, "Charging approval threshold")?;
    Ok(())
}

/// Checks on the profile as it would be stored
fn validate_profile(profile: &ChildProfile, check_limit_order: bool) -> GuardianResult<()> {
    if check_limit_order {
        validate_limits(profile.daily_limit, profile.weekly_limit)?;
    } else {
        validate_limits(profile.daily_limit, None)?;
    }
    if profile.curfew.enabled && profile.curfew.start == profile.curfew.end {
        return Err(GuardianError::validation("Curfew start and end cannot be equal"));
    }
    let charging = &profile.charging;
    if let (Some(session), Some(daily)) = (charging.session_kwh_cap, charging.daily_kwh_cap) {
        if session > daily {
            return Err(GuardianError::validation("Session kWh cap cannot exceed the daily cap"));
        }
    }
    Ok(())
}

fn default_audit_note(patch: &PolicyPatch) -> AuditNote {
    let summary = format!("Updated {}", patch.sections().join(", "));
    let kind = if patch.touches_charging() {
        ActivityKind::ChargingUpdated
    } else if patch.touches_safety() {
        ActivityKind::SafetyUpdated
    } else if patch.touches_schedule() {
        ActivityKind::ScheduleUpdated
    } else {
        ActivityKind::PolicyUpdated
    };
    AuditNote::new(kind, Severity::Info, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChargingPatch, CurfewPatch};
    use crate::domain::test_support::{TestEngine, PRIMARY_ID};
    use chrono::NaiveTime;
    use shared::{MemberRole, PolicyTemplate};
    use std::collections::BTreeMap;

    fn create_command(name: &str) -> CreateChildCommand {
        CreateChildCommand {
            name: name.to_string(),
            date_of_birth: "2014-05-02".to_string(),
            school: Some("  Hillside Primary ".to_string()),
            country: None,
            currency: Some("eur".to_string()),
            daily_limit: Some(2_000),
            weekly_limit: Some(8_000),
            apps: BTreeMap::new(),
        }
    }

    fn update(patch: PolicyPatch) -> UpdatePolicyCommand {
        UpdatePolicyCommand {
            patch,
            expected_version: None,
            audit: None,
        }
    }

    #[tokio::test]
    async fn test_create_child_starts_unverified() {
        let engine = TestEngine::new().await;
        let child = engine.state.child_service.create_child(&engine.primary(), create_command("Ann")).await.unwrap();

        assert!(child.id.starts_with("child::"));
        assert_eq!(child.version, 1);
        assert!(!child.guardian_verified);
        assert!(child.consent_at.is_none());
        assert_eq!(child.currency, "EUR");
        assert_eq!(child.school.as_deref(), Some("Hillside Primary"));

        let events = engine.activity_for(&child.id).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ActivityKind::ChildAdded);
    }

    #[tokio::test]
    async fn test_create_child_validation() {
        let engine = TestEngine::new().await;
        let service = &engine.state.child_service;

        let mut empty_name = create_command("   ");
        empty_name.name = "   ".to_string();
        assert!(matches!(service.create_child(&engine.primary(), empty_name).await, Err(GuardianError::Validation(_))));

        let mut bad_date = create_command("Ann");
        bad_date.date_of_birth = "02/05/2014".to_string();
        assert!(matches!(service.create_child(&engine.primary(), bad_date).await, Err(GuardianError::Validation(_))));

        let mut future = create_command("Ann");
        future.date_of_birth = "2099-01-01".to_string();
        assert!(matches!(service.create_child(&engine.primary(), future).await, Err(GuardianError::Validation(_))));

        let mut inverted = create_command("Ann");
        inverted.weekly_limit = Some(100);
        assert!(matches!(service.create_child(&engine.primary(), inverted).await, Err(GuardianError::Validation(_))));

        let mut currency = create_command("Ann");
        currency.currency = Some("EURO".to_string());
        assert!(matches!(service.create_child(&engine.primary(), currency).await, Err(GuardianError::Validation(_))));

        assert!(service.list_children().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_child_is_verified_and_unique() {
        let engine = TestEngine::new().await;
        let service = &engine.state.child_service;
        let command = LinkChildCommand {
            account_ref: "acct-77".to_string(),
            name: "Ben".to_string(),
            date_of_birth: "2012-01-01".to_string(),
            consent_version: "2026-01".to_string(),
            currency: None,
        };

        let child = service.link_child(&engine.primary(), command.clone()).await.unwrap();
        assert!(child.guardian_verified);
        assert_eq!(child.consent_at, Some(engine.clock.now()));
        assert_eq!(child.linked_account.as_deref(), Some("acct-77"));
        assert_eq!(child.currency, "USD");

        let duplicate = service.link_child(&engine.primary(), command).await;
        assert!(matches!(duplicate, Err(GuardianError::Validation(_))));
    }

    #[tokio::test]
    async fn test_apply_template_bumps_version_and_audits() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let op = GuardedOperation::ApplyTemplate { child_id: child.id.clone() };
        let proof = engine.password_proof(op).await;

        let updated = engine
            .state
            .child_service
            .apply_template(
                &engine.primary(),
                &proof,
                &child.id,
                ApplyTemplateCommand { template: PolicyTemplate::Child, expected_version: Some(1) },
            )
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.template, PolicyTemplate::Child);
        let events = engine.activity_for(&child.id).await;
        assert_eq!(events[0].kind, ActivityKind::TemplateApplied);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected_without_changes() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let op = GuardedOperation::ApplyTemplate { child_id: child.id.clone() };
        let proof = engine.password_proof(op).await;

        let result = engine
            .state
            .child_service
            .apply_template(
                &engine.primary(),
                &proof,
                &child.id,
                ApplyTemplateCommand { template: PolicyTemplate::Teen, expected_version: Some(7) },
            )
            .await;

        assert!(matches!(result, Err(GuardianError::StaleVersion { expected: 7, actual: 1, .. })));
        let stored = engine.state.child_service.get_child(&child.id).await.unwrap();
        assert_eq!(stored, child);
    }

    #[tokio::test]
    async fn test_update_policy_requires_matching_proof() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let wrong_op = GuardedOperation::ApplyTemplate { child_id: child.id.clone() };
        let proof = engine.password_proof(wrong_op).await;

        let result = engine
            .state
            .child_service
            .update_policy(
                &engine.primary(),
                &proof,
                &child.id,
                update(PolicyPatch { daily_limit: Some(10), ..Default::default() }),
            )
            .await;
        assert!(matches!(result, Err(GuardianError::AuthenticationFailed(_))));
        assert_eq!(engine.activity_for(&child.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_disabling_charging_app_disables_charging() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let service = &engine.state.child_service;
        let op = GuardedOperation::UpdatePolicy { child_id: child.id.clone() };

        let mut enable = PolicyPatch {
            charging: ChargingPatch { enabled: Some(true), ..Default::default() },
            ..Default::default()
        };
        enable.apps.insert("charging".to_string(), true);
        let proof = engine.password_proof(op.clone()).await;
        let enabled = service.update_policy(&engine.primary(), &proof, &child.id, update(enable)).await.unwrap();
        assert!(enabled.charging.enabled);

        let mut disallow = PolicyPatch::default();
        disallow.apps.insert("charging".to_string(), false);
        let proof = engine.password_proof(op).await;
        let updated = service.update_policy(&engine.primary(), &proof, &child.id, update(disallow)).await.unwrap();

        assert!(!updated.charging.enabled);
        let events = engine.activity_for(&child.id).await;
        let charging_events: Vec<_> = events
            .iter()
            .take(2)
            .filter(|e| e.kind == ActivityKind::ChargingUpdated)
            .collect();
        assert_eq!(charging_events.len(), 1);
        assert_eq!(events[1].kind, ActivityKind::PolicyUpdated);
    }

    #[tokio::test]
    async fn test_disallowing_app_with_charging_edit_audits_once() {
        let engine = TestEngine::new().await;
        let service = &engine.state.child_service;

        for start_enabled in [true, false] {
            let child = engine.create_child("Ann").await;
            let op = GuardedOperation::UpdatePolicy { child_id: child.id.clone() };

            let mut allow = PolicyPatch {
                charging: ChargingPatch { enabled: Some(start_enabled), ..Default::default() },
                ..Default::default()
            };
            allow.apps.insert("charging".to_string(), true);
            let proof = engine.password_proof(op.clone()).await;
            service.update_policy(&engine.primary(), &proof, &child.id, update(allow)).await.unwrap();
            let before = engine.activity_for(&child.id).await.len();

            let mut disallow = PolicyPatch {
                charging: ChargingPatch { daily_kwh_cap: Some(5.0), ..Default::default() },
                ..Default::default()
            };
            disallow.apps.insert("charging".to_string(), false);
            let proof = engine.password_proof(op).await;
            let updated = service
                .update_policy(&engine.primary(), &proof, &child.id, update(disallow))
                .await
                .unwrap();

            assert!(!updated.charging.enabled);
            assert_eq!(updated.charging.daily_kwh_cap, Some(5.0));
            let events = engine.activity_for(&child.id).await;
            assert_eq!(events.len(), before + 1, "start_enabled={}", start_enabled);
            assert_eq!(events[0].kind, ActivityKind::ChargingUpdated);
            assert_eq!(events[0].severity, Severity::Warning);
            assert!(events[0].summary.contains("disallowed"));
        }
    }

    #[tokio::test]
    async fn test_enabling_charging_without_app_is_rejected() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let op = GuardedOperation::UpdatePolicy { child_id: child.id.clone() };
        let proof = engine.password_proof(op).await;

        let patch = PolicyPatch {
            charging: ChargingPatch { enabled: Some(true), ..Default::default() },
            ..Default::default()
        };
        let result = engine
            .state
            .child_service
            .update_policy(&engine.primary(), &proof, &child.id, update(patch))
            .await;

        assert!(matches!(result, Err(GuardianError::SafetyInvariantViolation(_))));
        let stored = engine.state.child_service.get_child(&child.id).await.unwrap();
        assert_eq!(stored.version, 1);
        assert!(!stored.charging.enabled);
    }

    #[tokio::test]
    async fn test_audit_kind_follows_patch_section() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let op = GuardedOperation::UpdatePolicy { child_id: child.id.clone() };
        let proof = engine.password_proof(op).await;

        let patch = PolicyPatch {
            curfew: CurfewPatch {
                enabled: Some(true),
                start: NaiveTime::from_hms_opt(21, 0, 0),
                end: NaiveTime::from_hms_opt(6, 30, 0),
                ..Default::default()
            },
            ..Default::default()
        };
        engine
            .state
            .child_service
            .update_policy(&engine.primary(), &proof, &child.id, update(patch))
            .await
            .unwrap();

        let events = engine.activity_for(&child.id).await;
        assert_eq!(events[0].kind, ActivityKind::SafetyUpdated);
        assert_eq!(events[0].summary, "Updated curfew");
    }

    #[tokio::test]
    async fn test_record_consent_verifies_guardian() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let op = GuardedOperation::RecordConsent { child_id: child.id.clone() };
        let proof = engine.password_proof(op).await;

        let updated = engine
            .state
            .child_service
            .record_consent(
                &ActorContext::guardian(PRIMARY_ID),
                &proof,
                &child.id,
                RecordConsentCommand { consent_version: "v3".to_string() },
            )
            .await
            .unwrap();

        assert!(updated.guardian_verified);
        assert_eq!(updated.consent_version.as_deref(), Some("v3"));
        assert_eq!(updated.version, 2);
        let events = engine.activity_for(&child.id).await;
        assert_eq!(events[0].kind, ActivityKind::ConsentRecorded);
    }

    #[tokio::test]
    async fn test_aliased_child_id_is_not_found() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let alias = child.id.replace("::", "_");

        let result = engine.state.child_service.get_child(&alias).await;
        assert!(matches!(result, Err(GuardianError::NotFound { entity: "Child", .. })));

        let op = GuardedOperation::UpdatePolicy { child_id: alias.clone() };
        let proof = engine.password_proof(op).await;
        let patch = PolicyPatch { daily_limit: Some(100), ..Default::default() };
        let updated = engine
            .state
            .child_service
            .update_policy(&engine.primary(), &proof, &alias, update(patch))
            .await;
        assert!(matches!(updated, Err(GuardianError::NotFound { .. })));
        assert_eq!(engine.state.child_service.get_child(&child.id).await.unwrap(), child);
    }

    #[tokio::test]
    async fn test_unknown_child_is_not_found() {
        let engine = TestEngine::new().await;
        let result = engine.state.child_service.get_child("child::missing").await;
        assert!(matches!(result, Err(GuardianError::NotFound { entity: "Child", .. })));
    }

    #[tokio::test]
    async fn test_only_active_co_guardians_change_children() {
        let engine = TestEngine::new().await;
        let service = &engine.state.child_service;
        let child = engine.create_child("Ann").await;
        let contact = engine
            .add_active_member(MemberRole::EmergencyContact, "Gran", "gran@example.com", "gran-password")
            .await;
        let gran = ActorContext::guardian(contact.id.clone());

        let op = GuardedOperation::ApplyTemplate { child_id: child.id.clone() };
        let proof = engine.password_proof_for(&gran, "gran-password", op).await;
        let template = service
            .apply_template(
                &gran,
                &proof,
                &child.id,
                ApplyTemplateCommand { template: PolicyTemplate::YoungAdult, expected_version: None },
            )
            .await;
        assert!(matches!(template, Err(GuardianError::Forbidden(_))));

        let op = GuardedOperation::UpdatePolicy { child_id: child.id.clone() };
        let proof = engine.password_proof_for(&gran, "gran-password", op).await;
        let patch = PolicyPatch { daily_limit: Some(90_000), ..Default::default() };
        let updated = service.update_policy(&gran, &proof, &child.id, update(patch)).await;
        assert!(matches!(updated, Err(GuardianError::Forbidden(_))));

        let op = GuardedOperation::RecordConsent { child_id: child.id.clone() };
        let proof = engine.password_proof_for(&gran, "gran-password", op).await;
        let consent = service
            .record_consent(&gran, &proof, &child.id, RecordConsentCommand { consent_version: "v1".to_string() })
            .await;
        assert!(matches!(consent, Err(GuardianError::Forbidden(_))));

        let created = service.create_child(&gran, create_command("Ben")).await;
        assert!(matches!(created, Err(GuardianError::Forbidden(_))));
        let stranger = ActorContext::guardian("guardian::stranger");
        let linked = service
            .link_child(
                &stranger,
                LinkChildCommand {
                    account_ref: "acct-9".to_string(),
                    name: "Ben".to_string(),
                    date_of_birth: "2012-01-01".to_string(),
                    consent_version: "2026-01".to_string(),
                    currency: None,
                },
            )
            .await;
        assert!(matches!(linked, Err(GuardianError::Forbidden(_))));

        assert_eq!(service.get_child(&child.id).await.unwrap(), child);
        assert_eq!(service.list_children().await.unwrap().len(), 1);
        assert_eq!(engine.activity_for(&child.id).await.len(), 1);
    }
}
