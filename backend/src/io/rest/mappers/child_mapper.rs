//! Conversions between child DTOs and domain commands.

use shared::{ChildActionRequest, ChildProfile, ChildResponse, CreateChildRequest, LinkChildRequest};

use crate::domain::commands::approvals::ChildAction;
use crate::domain::commands::children::{CreateChildCommand, LinkChildCommand};

pub struct ChildMapper;

impl ChildMapper {
    pub fn to_create_command(request: CreateChildRequest) -> CreateChildCommand {
        CreateChildCommand {
            name: request.name,
            date_of_birth: request.date_of_birth,
            school: request.school,
            country: request.country,
            currency: request.currency,
            daily_limit: request.daily_limit,
            weekly_limit: request.weekly_limit,
            apps: request.apps.unwrap_or_default(),
        }
    }

    pub fn to_link_command(request: LinkChildRequest) -> LinkChildCommand {
        LinkChildCommand {
            account_ref: request.account_ref,
            name: request.name,
            date_of_birth: request.date_of_birth,
            consent_version: request.consent_version,
            currency: request.currency,
        }
    }

    pub fn to_child_action(request: ChildActionRequest) -> ChildAction {
        ChildAction {
            kind: request.kind,
            title: request.title,
            amount: request.amount,
            currency: request.currency,
            vendor: request.vendor,
            app: request.app,
            category: request.category,
            energy_kwh: request.energy_kwh,
            station: request.station,
            detail: request.detail,
            local_time: request.local_time,
        }
    }

    pub fn to_child_response(child: ChildProfile, message: impl Into<String>) -> ChildResponse {
        ChildResponse {
            child,
            success_message: message.into(),
        }
    }
}
