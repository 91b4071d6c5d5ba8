use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Age-based policy template applied to a child profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyTemplate {
    #[serde(rename = "Child (6-12)")]
    Child,
    #[serde(rename = "Teen (13-17)")]
    Teen,
    #[serde(rename = "Young adult (18+)")]
    YoungAdult,
    #[serde(rename = "Custom")]
    Custom,
}

impl PolicyTemplate {
    pub fn label(&self) -> &'static str {
        match self {
            PolicyTemplate::Child => "Child (6-12)",
            PolicyTemplate::Teen => "Teen (13-17)",
            PolicyTemplate::YoungAdult => "Young adult (18+)",
            PolicyTemplate::Custom => "Custom",
        }
    }
}

impl Default for PolicyTemplate {
    fn default() -> Self {
        PolicyTemplate::Custom
    }
}

impl fmt::Display for PolicyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Content categories a guardian can block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    Adult,
    Alcohol,
    Gambling,
    Violence,
    Weapons,
    Drugs,
    Tobacco,
    Dating,
}

/// Weekly schedule preset attached to a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulePreset {
    #[serde(rename = "Unrestricted")]
    Unrestricted,
    #[serde(rename = "School days")]
    SchoolDays,
    #[serde(rename = "Weekends")]
    Weekends,
    #[serde(rename = "Custom")]
    Custom,
}

impl Default for SchedulePreset {
    fn default() -> Self {
        SchedulePreset::Unrestricted
    }
}

/// Boolean capability switches of a supervised child
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    pub allow_withdrawals: bool,
    pub allow_peer_transfers: bool,
    pub allow_saved_cards: bool,
    pub allow_unknown_contacts: bool,
    pub allow_attachments: bool,
    pub allow_voice_calls: bool,
    pub location_sharing: bool,
    pub public_profile: bool,
    pub marketing_opt_out: bool,
    pub bedtime_lock: bool,
}

/// Night-time restriction window. `start` may be later than `end`, in which case
/// the window wraps past midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curfew {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Blocks all activity while the curfew is active
    pub hard_lock: bool,
    pub allow_school_only_during_curfew: bool,
}

impl Curfew {
    /// Whether the curfew window covers the given time of day
    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl Default for Curfew {
    fn default() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            hard_lock: false,
            allow_school_only_during_curfew: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub label: String,
    pub address: String,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeofenceSettings {
    pub enabled: bool,
    pub alerts_on_enter_leave: bool,
    pub home: Option<Place>,
    pub school: Option<Place>,
}

/// EV charging restrictions. Only meaningful while the charging app is allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargingPolicy {
    pub enabled: bool,
    pub daily_kwh_cap: Option<f64>,
    pub session_kwh_cap: Option<f64>,
    pub require_approval_above_kwh: Option<f64>,
    pub allowed_stations: BTreeSet<String>,
}

/// A supervised identity under one or more guardians
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildProfile {
    /// Stable identifier in format "child::<uuid>"
    pub id: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub school: Option<String>,
    pub country: Option<String>,
    /// External account this profile was linked from, if any
    pub linked_account: Option<String>,

    pub template: PolicyTemplate,
    /// ISO 4217 code the monetary limits are expressed in (minor units)
    pub currency: String,
    pub daily_limit: Option<i64>,
    pub weekly_limit: Option<i64>,
    pub require_approval_above: Option<i64>,
    pub require_approval_for_all_purchases: bool,
    pub capabilities: CapabilityFlags,
    /// Application key -> allowed
    pub apps: BTreeMap<String, bool>,
    pub category_blocks: BTreeSet<ContentCategory>,
    pub seller_whitelist: BTreeSet<String>,
    pub schedule: SchedulePreset,

    pub curfew: Curfew,
    pub geofences: GeofenceSettings,
    pub charging: ChargingPolicy,

    pub guardian_verified: bool,
    pub consent_version: Option<String>,
    pub consent_at: Option<DateTime<Utc>>,

    /// Incremented on every committed mutation
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChildProfile {
    /// Whether the given application key is explicitly allowed
    pub fn app_allowed(&self, app_key: &str) -> bool {
        self.apps.get(app_key).copied().unwrap_or(false)
    }
}

/// Kind of child-initiated action that may need a guardian decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalKind {
    Purchase,
    Trip,
    ServiceBooking,
    AppInstall,
    ChargingSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Declined,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Decline,
}

/// A single guardian vote recorded against an approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalVote {
    pub guardian_id: String,
    pub decision: Decision,
    pub at: DateTime<Utc>,
}

/// A sensitive child action awaiting a guardian decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    /// Identifier in format "approval::<uuid>"
    pub id: String,
    pub child_id: String,
    pub created_at: DateTime<Utc>,
    pub kind: ApprovalKind,
    pub title: String,
    /// Amount in minor units of `currency`
    pub amount: i64,
    pub currency: String,
    /// Why approval was triggered
    pub reason: String,
    pub vendor: Option<String>,
    pub detail: Option<String>,
    pub status: ApprovalStatus,
    pub votes: Vec<ApprovalVote>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    #[serde(rename = "Co-guardian")]
    CoGuardian,
    #[serde(rename = "Emergency contact")]
    EmergencyContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Active,
    Pending,
}

/// Delivery channel for household notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContactChannel {
    Email,
    #[serde(rename = "SMS")]
    Sms,
    WhatsApp,
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactChannel::Email => f.write_str("Email"),
            ContactChannel::Sms => f.write_str("SMS"),
            ContactChannel::WhatsApp => f.write_str("WhatsApp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdMember {
    /// Identifier in format "member::<uuid>" (the primary guardian keeps its configured id)
    pub id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub channels: BTreeMap<ContactChannel, bool>,
    pub is_primary: bool,
    pub invited_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl HouseholdMember {
    pub fn is_active_co_guardian(&self) -> bool {
        self.role == MemberRole::CoGuardian && self.status == MemberStatus::Active
    }
}

/// How approval decisions are authorized when several guardians exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalMode {
    #[serde(rename = "Any guardian")]
    AnyGuardian,
    #[serde(rename = "All guardians")]
    AllGuardians,
}

impl Default for ApprovalMode {
    fn default() -> Self {
        ApprovalMode::AnyGuardian
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalMode::AnyGuardian => f.write_str("Any guardian"),
            ApprovalMode::AllGuardians => f.write_str("All guardians"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub approval_mode: ApprovalMode,
    pub members: Vec<HouseholdMember>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Household {
    pub fn member(&self, member_id: &str) -> Option<&HouseholdMember> {
        self.members.iter().find(|m| m.id == member_id)
    }

    pub fn primary(&self) -> Option<&HouseholdMember> {
        self.members.iter().find(|m| m.is_primary)
    }

    pub fn active_co_guardians(&self) -> impl Iterator<Item = &HouseholdMember> {
        self.members.iter().filter(|m| m.is_active_co_guardian())
    }
}

/// Controlled vocabulary for activity events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    #[serde(rename = "Login")]
    Login,
    #[serde(rename = "Child Added")]
    ChildAdded,
    #[serde(rename = "Approval Requested")]
    ApprovalRequested,
    #[serde(rename = "Approval Vote Recorded")]
    ApprovalVoteRecorded,
    #[serde(rename = "Approval Approved")]
    ApprovalApproved,
    #[serde(rename = "Approval Declined")]
    ApprovalDeclined,
    #[serde(rename = "Blocked")]
    Blocked,
    #[serde(rename = "Policy Updated")]
    PolicyUpdated,
    #[serde(rename = "Schedule Updated")]
    ScheduleUpdated,
    #[serde(rename = "Template Applied")]
    TemplateApplied,
    #[serde(rename = "Safety Updated")]
    SafetyUpdated,
    #[serde(rename = "Charging Updated")]
    ChargingUpdated,
    #[serde(rename = "Consent Recorded")]
    ConsentRecorded,
    #[serde(rename = "Household Updated")]
    HouseholdUpdated,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 14] = [
        ActivityKind::Login,
        ActivityKind::ChildAdded,
        ActivityKind::ApprovalRequested,
        ActivityKind::ApprovalVoteRecorded,
        ActivityKind::ApprovalApproved,
        ActivityKind::ApprovalDeclined,
        ActivityKind::Blocked,
        ActivityKind::PolicyUpdated,
        ActivityKind::ScheduleUpdated,
        ActivityKind::TemplateApplied,
        ActivityKind::SafetyUpdated,
        ActivityKind::ChargingUpdated,
        ActivityKind::ConsentRecorded,
        ActivityKind::HouseholdUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Login => "Login",
            ActivityKind::ChildAdded => "Child Added",
            ActivityKind::ApprovalRequested => "Approval Requested",
            ActivityKind::ApprovalVoteRecorded => "Approval Vote Recorded",
            ActivityKind::ApprovalApproved => "Approval Approved",
            ActivityKind::ApprovalDeclined => "Approval Declined",
            ActivityKind::Blocked => "Blocked",
            ActivityKind::PolicyUpdated => "Policy Updated",
            ActivityKind::ScheduleUpdated => "Schedule Updated",
            ActivityKind::TemplateApplied => "Template Applied",
            ActivityKind::SafetyUpdated => "Safety Updated",
            ActivityKind::ChargingUpdated => "Charging Updated",
            ActivityKind::ConsentRecorded => "Consent Recorded",
            ActivityKind::HouseholdUpdated => "Household Updated",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown activity kind: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "success" => Ok(Severity::Success),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Identifier in format "event::<uuid>"
    pub id: String,
    pub at: DateTime<Utc>,
    /// None for household-scope events
    pub child_id: Option<String>,
    pub kind: ActivityKind,
    pub summary: String,
    pub severity: Severity,
}

// ---------------------------------------------------------------------------
// Step-up authentication DTOs
// ---------------------------------------------------------------------------

/// MFA channel a one-time code can be issued on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeChannel {
    Authenticator,
    #[serde(rename = "SMS")]
    Sms,
    WhatsApp,
    Email,
}

impl fmt::Display for ChallengeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeChannel::Authenticator => f.write_str("Authenticator"),
            ChallengeChannel::Sms => f.write_str("SMS"),
            ChallengeChannel::WhatsApp => f.write_str("WhatsApp"),
            ChallengeChannel::Email => f.write_str("Email"),
        }
    }
}

/// The sensitive mutation a step-up proof is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GuardedOperation {
    ApplyTemplate { child_id: String },
    UpdatePolicy { child_id: String },
    RecordConsent { child_id: String },
    DecideApproval { approval_id: String },
    InviteMember,
    RemoveMember { member_id: String },
    SetApprovalMode,
    SetPrimaryGuardian { member_id: String },
}

impl GuardedOperation {
    pub fn title(&self) -> &'static str {
        match self {
            GuardedOperation::ApplyTemplate { .. } => "Apply policy template",
            GuardedOperation::UpdatePolicy { .. } => "Change child restrictions",
            GuardedOperation::RecordConsent { .. } => "Record guardian consent",
            GuardedOperation::DecideApproval { .. } => "Decide pending approval",
            GuardedOperation::InviteMember => "Invite household member",
            GuardedOperation::RemoveMember { .. } => "Remove household member",
            GuardedOperation::SetApprovalMode => "Change approval mode",
            GuardedOperation::SetPrimaryGuardian { .. } => "Transfer primary guardian",
        }
    }

    pub fn subtitle(&self) -> String {
        match self {
            GuardedOperation::ApplyTemplate { child_id }
            | GuardedOperation::UpdatePolicy { child_id }
            | GuardedOperation::RecordConsent { child_id } => format!("Child {}", child_id),
            GuardedOperation::DecideApproval { approval_id } => format!("Approval {}", approval_id),
            GuardedOperation::RemoveMember { member_id }
            | GuardedOperation::SetPrimaryGuardian { member_id } => format!("Member {}", member_id),
            GuardedOperation::InviteMember | GuardedOperation::SetApprovalMode => {
                "Household settings".to_string()
            }
        }
    }
}

impl fmt::Display for GuardedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.subtitle())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "channel")]
pub enum ProofMethod {
    Password,
    Challenge(ChallengeChannel),
}

impl fmt::Display for ProofMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofMethod::Password => f.write_str("password"),
            ProofMethod::Challenge(channel) => write!(f, "challenge:{}", channel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpRequest {
    pub operation: GuardedOperation,
}

/// Prompt shown before a sensitive mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpRequirement {
    pub operation: GuardedOperation,
    pub title: String,
    pub subtitle: String,
    pub password_available: bool,
    pub channels: Vec<ChallengeChannel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordStepUpRequest {
    pub operation: GuardedOperation,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendChallengeRequest {
    pub channel: ChallengeChannel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeTicket {
    pub challenge_id: String,
    pub channel: ChallengeChannel,
    pub expires_at: DateTime<Utc>,
    pub resend_available_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyChallengeRequest {
    pub operation: GuardedOperation,
    pub code: String,
}

/// Single-use proof of a fresh re-authentication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpProof {
    pub proof_id: String,
    pub guardian_id: String,
    pub operation: GuardedOperation,
    pub method: ProofMethod,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One journaled step-up attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpAttempt {
    pub id: i64,
    pub guardian_id: String,
    pub method: String,
    pub operation: String,
    pub success: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpAttemptStats {
    pub total_attempts: usize,
    pub successful_attempts: usize,
    pub failed_attempts: usize,
    /// Percentage
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpAttemptsResponse {
    pub attempts: Vec<StepUpAttempt>,
    pub stats: StepUpAttemptStats,
}

// ---------------------------------------------------------------------------
// Child profile DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChildRequest {
    pub name: String,
    /// YYYY-MM-DD
    pub date_of_birth: String,
    pub school: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub daily_limit: Option<i64>,
    pub weekly_limit: Option<i64>,
    pub apps: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkChildRequest {
    /// Reference of the existing account being placed under supervision
    pub account_ref: String,
    pub name: String,
    pub date_of_birth: String,
    pub consent_version: String,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyTemplateRequest {
    pub template: PolicyTemplate,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordConsentRequest {
    pub consent_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildResponse {
    pub child: ChildProfile,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildListResponse {
    pub children: Vec<ChildProfile>,
}

/// A child-initiated action submitted for policy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildActionRequest {
    pub kind: ApprovalKind,
    pub title: String,
    pub amount: i64,
    pub currency: Option<String>,
    pub vendor: Option<String>,
    pub app: Option<String>,
    pub category: Option<ContentCategory>,
    pub energy_kwh: Option<f64>,
    pub station: Option<String>,
    pub detail: Option<String>,
    /// Local time of day the action happens at; defaults to the engine clock
    pub local_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChildActionOutcome {
    Allowed,
    Blocked { reason: String },
    ApprovalRequired { approval: PendingApproval },
}

// ---------------------------------------------------------------------------
// Approval DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateApprovalRequest {
    pub child_id: String,
    pub kind: ApprovalKind,
    pub title: String,
    pub amount: i64,
    pub currency: Option<String>,
    pub reason: String,
    pub vendor: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecideApprovalRequest {
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approval: PendingApproval,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalListResponse {
    pub approvals: Vec<PendingApproval>,
}

// ---------------------------------------------------------------------------
// Household DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteMemberRequest {
    pub role: MemberRole,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub channels: BTreeMap<ContactChannel, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveMemberQuery {
    #[serde(default)]
    pub allow_last_emergency_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetApprovalModeRequest {
    pub mode: ApprovalMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPrimaryGuardianRequest {
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdResponse {
    pub household: Household,
    pub required_quorum: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberResponse {
    pub member: HouseholdMember,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Query surface DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub supervised_count: usize,
    pub pending_approval_count: usize,
    pub blocked_event_count: usize,
    pub unverified_guardian_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildOverview {
    pub child: ChildProfile,
    pub pending_approvals: Vec<PendingApproval>,
    pub recent_activity: Vec<ActivityEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityListRequest {
    pub child_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityListResponse {
    pub events: Vec<ActivityEvent>,
}
