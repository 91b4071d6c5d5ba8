//! Read-only views across children, approvals and the activity log.

use log::debug;
use shared::{ActivityEvent, ActivityKind, ApprovalStatus, ChildOverview, PolicySummary};

use crate::domain::activity_service::ActivityService;
use crate::domain::approval_service::ApprovalService;
use crate::domain::child_service::ChildService;
use crate::domain::commands::activity::ActivityQuery;
use crate::domain::commands::approvals::ApprovalListQuery;
use crate::domain::errors::GuardianResult;

/// Events shown on a child overview
pub const OVERVIEW_ACTIVITY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct QueryService {
    children: ChildService,
    approvals: ApprovalService,
    activity: ActivityService,
}

impl QueryService {
    pub fn new(children: ChildService, approvals: ApprovalService, activity: ActivityService) -> Self {
        Self {
            children,
            approvals,
            activity,
        }
    }

    /// Household-wide counters for the dashboard
    pub async fn summary(&self) -> GuardianResult<PolicySummary> {
        let children = self.children.list_children().await?;
        let pending = self
            .approvals
            .list_approvals(ApprovalListQuery {
                child_id: None,
                status: Some(ApprovalStatus::Pending),
            })
            .await?;
        let blocked = self.activity.count_kind(ActivityKind::Blocked).await?;

        let summary = PolicySummary {
            supervised_count: children.len(),
            pending_approval_count: pending.len(),
            blocked_event_count: blocked,
            unverified_guardian_count: children.iter().filter(|c| !c.guardian_verified).count(),
        };
        debug!("Policy summary: {:?}", summary);
        Ok(summary)
    }

    pub async fn child_overview(&self, child_id: &str) -> GuardianResult<ChildOverview> {
        let child = self.children.get_child(child_id).await?;
        let pending_approvals = self
            .approvals
            .list_approvals(ApprovalListQuery {
                child_id: Some(child.id.clone()),
                status: Some(ApprovalStatus::Pending),
            })
            .await?;
        let recent_activity = self
            .activity
            .list(ActivityQuery {
                child_id: Some(child.id.clone()),
                limit: Some(OVERVIEW_ACTIVITY_LIMIT),
            })
            .await?;

        Ok(ChildOverview {
            child,
            pending_approvals,
            recent_activity,
        })
    }

    pub async fn activity(&self, query: ActivityQuery) -> GuardianResult<Vec<ActivityEvent>> {
        self.activity.list(query).await
    }
}
