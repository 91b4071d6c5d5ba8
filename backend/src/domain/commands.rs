//! Domain-level command and query types
//! These structs are used by services inside the domain layer and are **not**
//! exposed over the public API. The REST layer maps the public DTOs defined in
//! the `shared` crate to these internal types.

pub mod children {
    use crate::domain::models::PolicyPatch;
    use std::collections::BTreeMap;

    /// Input for creating a new supervised child from scratch.
    #[derive(Debug, Clone)]
    pub struct CreateChildCommand {
        pub name: String,
        pub date_of_birth: String,
        pub school: Option<String>,
        pub country: Option<String>,
        pub currency: Option<String>,
        pub daily_limit: Option<i64>,
        pub weekly_limit: Option<i64>,
        pub apps: BTreeMap<String, bool>,
    }

    /// Input for placing an existing account under supervision.
    #[derive(Debug, Clone)]
    pub struct LinkChildCommand {
        pub account_ref: String,
        pub name: String,
        pub date_of_birth: String,
        pub consent_version: String,
        pub currency: Option<String>,
    }

    #[derive(Debug, Clone)]
    pub struct UpdatePolicyCommand {
        pub patch: PolicyPatch,
        pub expected_version: Option<u64>,
        /// Overrides the audit event derived from the patch
        pub audit: Option<super::activity::AuditNote>,
    }

    #[derive(Debug, Clone)]
    pub struct ApplyTemplateCommand {
        pub template: shared::PolicyTemplate,
        pub expected_version: Option<u64>,
    }

    #[derive(Debug, Clone)]
    pub struct RecordConsentCommand {
        pub consent_version: String,
    }
}

pub mod approvals {
    use chrono::NaiveTime;
    use shared::{ApprovalKind, ApprovalStatus, ContentCategory};

    /// Input for raising an approval request directly.
    #[derive(Debug, Clone)]
    pub struct CreateApprovalCommand {
        pub child_id: String,
        pub kind: ApprovalKind,
        pub title: String,
        pub amount: i64,
        pub currency: Option<String>,
        pub reason: String,
        pub vendor: Option<String>,
        pub detail: Option<String>,
    }

    /// A child-initiated action evaluated against the child's policy.
    #[derive(Debug, Clone)]
    pub struct ChildAction {
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
        pub local_time: Option<NaiveTime>,
    }

    #[derive(Debug, Clone, Default)]
    pub struct ApprovalListQuery {
        pub child_id: Option<String>,
        pub status: Option<ApprovalStatus>,
    }
}

pub mod household {
    use shared::{ContactChannel, MemberRole};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone)]
    pub struct InviteMemberCommand {
        pub role: MemberRole,
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub channels: BTreeMap<ContactChannel, bool>,
    }

    #[derive(Debug, Clone)]
    pub struct RemoveMemberCommand {
        pub member_id: String,
        /// Must be set to remove the last active emergency contact
        pub allow_last_emergency_contact: bool,
    }
}

pub mod activity {
    use shared::{ActivityKind, Severity};

    /// Audit event a caller wants recorded alongside a mutation.
    #[derive(Debug, Clone)]
    pub struct AuditNote {
        pub kind: ActivityKind,
        pub severity: Severity,
        pub summary: String,
    }

    impl AuditNote {
        pub fn new(kind: ActivityKind, severity: Severity, summary: impl Into<String>) -> Self {
            Self {
                kind,
                severity,
                summary: summary.into(),
            }
        }
    }

    /// Query parameters for reading the activity log.
    #[derive(Debug, Clone, Default)]
    pub struct ActivityQuery {
        pub child_id: Option<String>,
        pub limit: Option<usize>,
    }
}
