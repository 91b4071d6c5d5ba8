use shared::{ApprovalResponse, ApprovalStatus, CreateApprovalRequest, PendingApproval};

use crate::domain::commands::approvals::CreateApprovalCommand;

pub struct ApprovalMapper;

impl ApprovalMapper {
    pub fn to_create_command(request: CreateApprovalRequest) -> CreateApprovalCommand {
        CreateApprovalCommand {
            child_id: request.child_id,
            kind: request.kind,
            title: request.title,
            amount: request.amount,
            currency: request.currency,
            reason: request.reason,
            vendor: request.vendor,
            detail: request.detail,
        }
    }

    pub fn to_approval_response(approval: PendingApproval) -> ApprovalResponse {
        let success_message = match approval.status {
            ApprovalStatus::Pending if approval.votes.is_empty() => format!("Approval requested: {}", approval.title),
            ApprovalStatus::Pending => format!(
                "Vote recorded for {} ({} so far)",
                approval.title,
                approval.votes.len()
            ),
            ApprovalStatus::Approved => format!("{} approved", approval.title),
            ApprovalStatus::Declined => format!("{} declined", approval.title),
        };
        ApprovalResponse {
            approval,
            success_message,
        }
    }
}
