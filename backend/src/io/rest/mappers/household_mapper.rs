use shared::{Household, HouseholdMember, HouseholdResponse, InviteMemberRequest, MemberResponse};

use crate::domain::commands::household::InviteMemberCommand;
use crate::domain::household_service::required_quorum;

pub struct HouseholdMapper;

impl HouseholdMapper {
    pub fn to_invite_command(request: InviteMemberRequest) -> InviteMemberCommand {
        InviteMemberCommand {
            role: request.role,
            name: request.name,
            email: request.email,
            phone: request.phone,
            channels: request.channels,
        }
    }

    pub fn to_household_response(household: Household) -> HouseholdResponse {
        HouseholdResponse {
            required_quorum: required_quorum(&household),
            household,
        }
    }

    pub fn to_member_response(member: HouseholdMember, message: impl Into<String>) -> MemberResponse {
        MemberResponse {
            member,
            success_message: message.into(),
        }
    }
}
