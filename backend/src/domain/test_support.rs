//! Fixtures shared by the domain, storage and REST tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use shared::{
    ActivityEvent, ApprovalKind, ApprovalMode, ApprovalStatus, ChildProfile, ContactChannel, GuardedOperation,
    HouseholdMember, MemberRole, PendingApproval,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::domain::clock::ManualClock;
use crate::domain::commands::activity::ActivityQuery;
use crate::domain::commands::children::CreateChildCommand;
use crate::domain::commands::household::InviteMemberCommand;
use crate::domain::identity::{hash_secret, LocalIdentityProvider, OutboxDispatcher};
use crate::domain::models::ActorContext;
use crate::storage::csv::test_utils::TestEnvironment;
use crate::storage::csv::ActivityRepository;
use crate::storage::ActivityStorage;
use crate::{build_state_with_activity, AppState};

pub const PRIMARY_ID: &str = "guardian::primary";
pub const PRIMARY_PASSWORD: &str = "correct horse battery staple";

pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
}

/// Profile with no limits and nothing blocked
pub fn sample_profile(id: &str) -> ChildProfile {
    ChildProfile {
        id: id.to_string(),
        name: "Sample".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2014, 5, 2).unwrap(),
        school: None,
        country: None,
        linked_account: None,
        template: Default::default(),
        currency: "USD".to_string(),
        daily_limit: None,
        weekly_limit: None,
        require_approval_above: None,
        require_approval_for_all_purchases: false,
        capabilities: Default::default(),
        apps: BTreeMap::new(),
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
        created_at: test_start(),
        updated_at: test_start(),
    }
}

pub fn sample_approval(id: &str, child_id: &str) -> PendingApproval {
    PendingApproval {
        id: id.to_string(),
        child_id: child_id.to_string(),
        created_at: test_start(),
        kind: ApprovalKind::Purchase,
        title: "Headphones".to_string(),
        amount: 12_000,
        currency: "USD".to_string(),
        reason: "Above approval threshold".to_string(),
        vendor: Some("SoundShop".to_string()),
        detail: None,
        status: ApprovalStatus::Pending,
        votes: Vec::new(),
        decided_at: None,
        decided_by: None,
    }
}

/// Activity log that can be told to reject appends
pub struct SwitchableActivityStore {
    inner: ActivityRepository,
    failing: AtomicBool,
}

impl SwitchableActivityStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ActivityStorage for SwitchableActivityStore {
    async fn append_events(&self, events: &[ActivityEvent]) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("activity log is unavailable");
        }
        self.inner.append_events(events).await
    }

    async fn list_events(&self) -> anyhow::Result<Vec<ActivityEvent>> {
        self.inner.list_events().await
    }
}

/// A fully wired engine over a temporary data directory
pub struct TestEngine {
    pub env: TestEnvironment,
    pub state: AppState,
    pub clock: ManualClock,
    pub outbox: OutboxDispatcher,
    pub identity: Arc<LocalIdentityProvider>,
    pub audit: Arc<SwitchableActivityStore>,
}

impl TestEngine {
    pub async fn new() -> Self {
        let env = TestEnvironment::new().await.unwrap();
        let clock = ManualClock::new(test_start());
        let outbox = OutboxDispatcher::new();
        let identity = Arc::new(
            LocalIdentityProvider::new(Arc::new(outbox.clone()))
                .with_password_hash(PRIMARY_ID, hash_secret(PRIMARY_PASSWORD)),
        );

        let mut config = EngineConfig::default();
        config.data_dir = env.base_path.clone();
        config.external_call_timeout_ms = 2_000;

        let audit = Arc::new(SwitchableActivityStore {
            inner: ActivityRepository::new(env.connection.clone()),
            failing: AtomicBool::new(false),
        });
        let state = build_state_with_activity(
            env.connection.clone(),
            audit.clone(),
            &config,
            identity.clone(),
            Arc::new(outbox.clone()),
            Arc::new(clock.clone()),
        );

        TestEngine {
            env,
            state,
            clock,
            outbox,
            identity,
            audit,
        }
    }

    pub fn primary(&self) -> ActorContext {
        ActorContext::guardian(PRIMARY_ID)
    }

    /// Proof for the primary guardian, obtained with the password
    pub async fn password_proof(&self, operation: GuardedOperation) -> String {
        self.password_proof_for(&self.primary(), PRIMARY_PASSWORD, operation).await
    }

    pub async fn password_proof_for(&self, actor: &ActorContext, password: &str, operation: GuardedOperation) -> String {
        self.state
            .step_up_service
            .verify_password(actor, operation, password)
            .await
            .unwrap()
            .proof_id
    }

    /// Child with a daily limit of 2 000 and a weekly limit of 10 000
    pub async fn create_child(&self, name: &str) -> ChildProfile {
        self.state
            .child_service
            .create_child(
                &self.primary(),
                CreateChildCommand {
                    name: name.to_string(),
                    date_of_birth: "2014-05-02".to_string(),
                    school: None,
                    country: None,
                    currency: None,
                    daily_limit: Some(2_000),
                    weekly_limit: Some(10_000),
                    apps: BTreeMap::new(),
                },
            )
            .await
            .unwrap()
    }

    /// Events of one child, newest first
    pub async fn activity_for(&self, child_id: &str) -> Vec<ActivityEvent> {
        self.state
            .activity_service
            .list(ActivityQuery {
                child_id: Some(child_id.to_string()),
                limit: Some(1_000),
            })
            .await
            .unwrap()
    }

    /// Household-scope events, newest first
    pub async fn household_activity(&self) -> Vec<ActivityEvent> {
        self.state
            .activity_service
            .list(ActivityQuery {
                child_id: None,
                limit: Some(1_000),
            })
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.child_id.is_none())
            .collect()
    }

    /// Invite a member reachable by email; the invite stays Pending
    pub async fn invite_member(&self, role: MemberRole, name: &str, email: &str) -> HouseholdMember {
        let proof = self.password_proof(GuardedOperation::InviteMember).await;
        let mut channels = BTreeMap::new();
        channels.insert(ContactChannel::Email, true);
        self.state
            .household_service
            .invite(
                &self.primary(),
                &proof,
                InviteMemberCommand {
                    role,
                    name: name.to_string(),
                    email: Some(email.to_string()),
                    phone: None,
                    channels,
                },
            )
            .await
            .unwrap()
    }

    /// Invite, accept and give a password to a co-guardian
    pub async fn add_active_guardian(&self, name: &str, email: &str, password: &str) -> HouseholdMember {
        self.add_active_member(MemberRole::CoGuardian, name, email, password).await
    }

    pub async fn add_active_member(&self, role: MemberRole, name: &str, email: &str, password: &str) -> HouseholdMember {
        let member = self.invite_member(role, name, email).await;
        let member = self.state.household_service.accept_invite(&member.id).await.unwrap();
        self.identity.set_password(member.id.clone(), password);
        member
    }

    pub async fn set_mode(&self, mode: ApprovalMode) {
        let proof = self.password_proof(GuardedOperation::SetApprovalMode).await;
        self.state
            .household_service
            .set_approval_mode(&self.primary(), &proof, mode)
            .await
            .unwrap();
    }
}
