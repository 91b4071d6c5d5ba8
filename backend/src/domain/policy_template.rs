//! Age-based policy templates.
//!
//! A template never writes to a profile directly. It is expanded into a
//! [`PolicyPatch`] from the child's current policy, and the caller commits that
//! patch through the normal update path.

use crate::domain::models::{CapabilityPatch, CurfewPatch, GeofencePatch, PolicyPatch};
use chrono::NaiveTime;
use shared::{ChildProfile, ContentCategory, PolicyTemplate, SchedulePreset};

pub const CHILD_DAILY_CAP: i64 = 10_000;
pub const CHILD_WEEKLY_CAP: i64 = 40_000;
pub const CHILD_APPROVAL_ABOVE: i64 = 5_000;

pub const TEEN_DAILY_FLOOR: i64 = 15_000;
pub const TEEN_WEEKLY_FLOOR: i64 = 80_000;
pub const TEEN_APPROVAL_ABOVE: i64 = 15_000;

pub const YOUNG_ADULT_APPROVAL_FLOOR: i64 = 20_000;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Expand `template` against the child's current policy
pub fn template_patch(child: &ChildProfile, template: PolicyTemplate) -> PolicyPatch {
    match template {
        PolicyTemplate::Child => child_patch(child),
        PolicyTemplate::Teen => teen_patch(child),
        PolicyTemplate::YoungAdult => young_adult_patch(child),
        PolicyTemplate::Custom => PolicyPatch {
            template: Some(PolicyTemplate::Custom),
            ..Default::default()
        },
    }
}

fn child_patch(child: &ChildProfile) -> PolicyPatch {
    let mut category_blocks = child.category_blocks.clone();
    category_blocks.extend([
        ContentCategory::Adult,
        ContentCategory::Alcohol,
        ContentCategory::Gambling,
    ]);

    PolicyPatch {
        template: Some(PolicyTemplate::Child),
        daily_limit: Some(child.daily_limit.map_or(CHILD_DAILY_CAP, |v| v.min(CHILD_DAILY_CAP))),
        weekly_limit: Some(child.weekly_limit.map_or(CHILD_WEEKLY_CAP, |v| v.min(CHILD_WEEKLY_CAP))),
        require_approval_above: Some(CHILD_APPROVAL_ABOVE),
        require_approval_for_all_purchases: Some(true),
        capabilities: CapabilityPatch {
            allow_withdrawals: Some(false),
            allow_peer_transfers: Some(false),
            allow_saved_cards: Some(false),
            allow_unknown_contacts: Some(false),
            allow_attachments: Some(false),
            allow_voice_calls: Some(false),
            ..Default::default()
        },
        category_blocks: Some(category_blocks),
        schedule: Some(SchedulePreset::SchoolDays),
        curfew: CurfewPatch {
            enabled: Some(true),
            start: Some(hm(20, 30)),
            end: Some(hm(6, 0)),
            hard_lock: Some(true),
            allow_school_only_during_curfew: Some(true),
        },
        geofences: GeofencePatch {
            enabled: Some(true),
            alerts_on_enter_leave: Some(true),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn teen_patch(child: &ChildProfile) -> PolicyPatch {
    PolicyPatch {
        template: Some(PolicyTemplate::Teen),
        daily_limit: Some(child.daily_limit.map_or(TEEN_DAILY_FLOOR, |v| v.max(TEEN_DAILY_FLOOR))),
        weekly_limit: Some(child.weekly_limit.map_or(TEEN_WEEKLY_FLOOR, |v| v.max(TEEN_WEEKLY_FLOOR))),
        require_approval_above: Some(TEEN_APPROVAL_ABOVE),
        require_approval_for_all_purchases: Some(false),
        capabilities: CapabilityPatch {
            allow_withdrawals: Some(false),
            allow_peer_transfers: Some(false),
            allow_saved_cards: Some(false),
            allow_unknown_contacts: Some(false),
            allow_attachments: Some(true),
            allow_voice_calls: Some(false),
            ..Default::default()
        },
        curfew: CurfewPatch {
            enabled: Some(true),
            start: Some(hm(21, 30)),
            end: Some(hm(6, 0)),
            hard_lock: Some(false),
            ..Default::default()
        },
        geofences: GeofencePatch {
            enabled: Some(true),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn young_adult_patch(child: &ChildProfile) -> PolicyPatch {
    PolicyPatch {
        template: Some(PolicyTemplate::YoungAdult),
        require_approval_above: Some(
            child
                .require_approval_above
                .map_or(YOUNG_ADULT_APPROVAL_FLOOR, |v| v.max(YOUNG_ADULT_APPROVAL_FLOOR)),
        ),
        capabilities: CapabilityPatch {
            allow_attachments: Some(true),
            allow_voice_calls: Some(true),
            ..Default::default()
        },
        curfew: CurfewPatch {
            enabled: Some(false),
            ..Default::default()
        },
        geofences: GeofencePatch {
            enabled: Some(false),
            ..Default::default()
        },
        ..Default::default()
    }
}
