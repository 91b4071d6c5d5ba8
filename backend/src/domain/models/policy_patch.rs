//! Explicit, enumerable policy patch.
//!
//! Every field a template or a guardian edit can touch is named here. `None`
//! (or an empty map for `apps`) means "leave as is". Collections wrapped in
//! `Option` replace the current value wholesale.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use shared::{ChildProfile, ContentCategory, Place, PolicyTemplate, SchedulePreset};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityPatch {
    pub allow_withdrawals: Option<bool>,
    pub allow_peer_transfers: Option<bool>,
    pub allow_saved_cards: Option<bool>,
    pub allow_unknown_contacts: Option<bool>,
    pub allow_attachments: Option<bool>,
    pub allow_voice_calls: Option<bool>,
    pub location_sharing: Option<bool>,
    pub public_profile: Option<bool>,
    pub marketing_opt_out: Option<bool>,
    pub bedtime_lock: Option<bool>,
}

impl CapabilityPatch {
    pub fn is_empty(&self) -> bool {
        self == &CapabilityPatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurfewPatch {
    pub enabled: Option<bool>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub hard_lock: Option<bool>,
    pub allow_school_only_during_curfew: Option<bool>,
}

impl CurfewPatch {
    pub fn is_empty(&self) -> bool {
        self == &CurfewPatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofencePatch {
    pub enabled: Option<bool>,
    pub alerts_on_enter_leave: Option<bool>,
    pub home: Option<Place>,
    pub school: Option<Place>,
}

impl GeofencePatch {
    pub fn is_empty(&self) -> bool {
        self == &GeofencePatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingPatch {
    pub enabled: Option<bool>,
    pub daily_kwh_cap: Option<f64>,
    pub session_kwh_cap: Option<f64>,
    pub require_approval_above_kwh: Option<f64>,
    pub allowed_stations: Option<BTreeSet<String>>,
}

impl ChargingPatch {
    pub fn is_empty(&self) -> bool {
        self == &ChargingPatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyPatch {
    pub template: Option<PolicyTemplate>,
    pub daily_limit: Option<i64>,
    pub weekly_limit: Option<i64>,
    pub require_approval_above: Option<i64>,
    pub require_approval_for_all_purchases: Option<bool>,
    pub capabilities: CapabilityPatch,
    /// Entries merged into the allowlist
    pub apps: BTreeMap<String, bool>,
    pub category_blocks: Option<BTreeSet<ContentCategory>>,
    pub seller_whitelist: Option<BTreeSet<String>>,
    pub schedule: Option<SchedulePreset>,
    pub curfew: CurfewPatch,
    pub geofences: GeofencePatch,
    pub charging: ChargingPatch,
}

fn set<T>(target: &mut T, value: &Option<T>)
where
    T: Clone,
{
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl PolicyPatch {
    pub fn is_empty(&self) -> bool {
        self == &PolicyPatch::default()
    }

    pub fn touches_limits(&self) -> bool {
        self.daily_limit.is_some()
            || self.weekly_limit.is_some()
            || self.require_approval_above.is_some()
            || self.require_approval_for_all_purchases.is_some()
    }

    pub fn touches_safety(&self) -> bool {
        !self.curfew.is_empty() || !self.geofences.is_empty()
    }

    pub fn touches_charging(&self) -> bool {
        !self.charging.is_empty()
    }

    pub fn touches_schedule(&self) -> bool {
        self.schedule.is_some()
    }

    /// Human names of the sections this patch changes, for audit summaries
    pub fn sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self.template.is_some() {
            sections.push("template");
        }
        if self.touches_limits() {
            sections.push("spending limits");
        }
        if !self.capabilities.is_empty() {
            sections.push("capabilities");
        }
        if !self.apps.is_empty() {
            sections.push("apps");
        }
        if self.category_blocks.is_some() {
            sections.push("content categories");
        }
        if self.seller_whitelist.is_some() {
            sections.push("seller whitelist");
        }
        if self.touches_schedule() {
            sections.push("schedule");
        }
        if !self.curfew.is_empty() {
            sections.push("curfew");
        }
        if !self.geofences.is_empty() {
            sections.push("geofencing");
        }
        if self.touches_charging() {
            sections.push("charging");
        }
        sections
    }

    /// Merge this patch into `profile`. Does not touch version or timestamps.
    pub fn apply_to(&self, profile: &mut ChildProfile) {
        set(&mut profile.template, &self.template);
        if self.daily_limit.is_some() {
            profile.daily_limit = self.daily_limit;
        }
        if self.weekly_limit.is_some() {
            profile.weekly_limit = self.weekly_limit;
        }
        if self.require_approval_above.is_some() {
            profile.require_approval_above = self.require_approval_above;
        }
        set(
            &mut profile.require_approval_for_all_purchases,
            &self.require_approval_for_all_purchases,
        );

        let caps = &self.capabilities;
        let flags = &mut profile.capabilities;
        set(&mut flags.allow_withdrawals, &caps.allow_withdrawals);
        set(&mut flags.allow_peer_transfers, &caps.allow_peer_transfers);
        set(&mut flags.allow_saved_cards, &caps.allow_saved_cards);
        set(&mut flags.allow_unknown_contacts, &caps.allow_unknown_contacts);
        set(&mut flags.allow_attachments, &caps.allow_attachments);
        set(&mut flags.allow_voice_calls, &caps.allow_voice_calls);
        set(&mut flags.location_sharing, &caps.location_sharing);
        set(&mut flags.public_profile, &caps.public_profile);
        set(&mut flags.marketing_opt_out, &caps.marketing_opt_out);
        set(&mut flags.bedtime_lock, &caps.bedtime_lock);

        for (app, allowed) in &self.apps {
            profile.apps.insert(app.clone(), *allowed);
        }
        set(&mut profile.category_blocks, &self.category_blocks);
        set(&mut profile.seller_whitelist, &self.seller_whitelist);
        set(&mut profile.schedule, &self.schedule);

        let curfew = &mut profile.curfew;
        set(&mut curfew.enabled, &self.curfew.enabled);
        set(&mut curfew.start, &self.curfew.start);
        set(&mut curfew.end, &self.curfew.end);
        set(&mut curfew.hard_lock, &self.curfew.hard_lock);
        set(
            &mut curfew.allow_school_only_during_curfew,
            &self.curfew.allow_school_only_during_curfew,
        );

        let geofences = &mut profile.geofences;
        set(&mut geofences.enabled, &self.geofences.enabled);
        set(&mut geofences.alerts_on_enter_leave, &self.geofences.alerts_on_enter_leave);
        if self.geofences.home.is_some() {
            geofences.home = self.geofences.home.clone();
        }
        if self.geofences.school.is_some() {
            geofences.school = self.geofences.school.clone();
        }

        let charging = &mut profile.charging;
        set(&mut charging.enabled, &self.charging.enabled);
        if self.charging.daily_kwh_cap.is_some() {
            charging.daily_kwh_cap = self.charging.daily_kwh_cap;
        }
        if self.charging.session_kwh_cap.is_some() {
            charging.session_kwh_cap = self.charging.session_kwh_cap;
        }
        if self.charging.require_approval_above_kwh.is_some() {
            charging.require_approval_above_kwh = self.charging.require_approval_above_kwh;
        }
        set(&mut charging.allowed_stations, &self.charging.allowed_stations);
    }
}
