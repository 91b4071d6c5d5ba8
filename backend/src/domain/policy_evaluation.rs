//! Evaluation of child-initiated actions against a profile.
//!
//! Hard blocks are checked before approval gates, so an action that breaks a
//! limit is never turned into an approval request.

use crate::domain::commands::approvals::ChildAction;
use chrono::NaiveTime;
use shared::{ApprovalKind, ChildProfile};

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow,
    Block(String),
    RequireApproval(String),
}

pub fn evaluate_action(
    profile: &ChildProfile,
    action: &ChildAction,
    local_time: NaiveTime,
    charging_app_key: &str,
) -> Verdict {
    let curfew_active = profile.curfew.is_active_at(local_time);
    if curfew_active && profile.curfew.hard_lock {
        return Verdict::Block("Curfew hard lock is active".to_string());
    }

    if let Some(app) = &action.app {
        if !profile.app_allowed(app) {
            return Verdict::Block(format!("App '{}' is not allowed", app));
        }
    }

    if let Some(category) = &action.category {
        if profile.category_blocks.contains(category) {
            return Verdict::Block(format!("Category {:?} is blocked", category));
        }
    }

    if action.kind == ApprovalKind::Purchase && !profile.seller_whitelist.is_empty() {
        let whitelisted = action
            .vendor
            .as_ref()
            .map(|vendor| profile.seller_whitelist.contains(vendor))
            .unwrap_or(false);
        if !whitelisted {
            return Verdict::Block("Vendor is not on the seller whitelist".to_string());
        }
    }

    if let Some(limit) = profile.daily_limit {
        if action.amount > limit {
            return Verdict::Block("Amount exceeds the daily limit".to_string());
        }
    }

    if action.kind == ApprovalKind::ChargingSession {
        let charging = &profile.charging;
        if !charging.enabled || !profile.app_allowed(charging_app_key) {
            return Verdict::Block("Charging is not enabled for this child".to_string());
        }
        if let Some(station) = &action.station {
            if !charging.allowed_stations.is_empty() && !charging.allowed_stations.contains(station) {
                return Verdict::Block(format!("Station '{}' is not allowed", station));
            }
        }
        let energy = action.energy_kwh.unwrap_or(0.0);
        if let Some(cap) = charging.session_kwh_cap {
            if energy > cap {
                return Verdict::Block("Energy exceeds the session cap".to_string());
            }
        }
        if let Some(threshold) = charging.require_approval_above_kwh {
            if energy > threshold {
                return Verdict::RequireApproval("Above charging approval threshold".to_string());
            }
        }
    }

    match action.kind {
        ApprovalKind::Trip | ApprovalKind::ServiceBooking => {
            return Verdict::RequireApproval("Requires guardian approval".to_string());
        }
        ApprovalKind::Purchase | ApprovalKind::AppInstall
            if profile.require_approval_for_all_purchases =>
        {
            return Verdict::RequireApproval("All purchases require approval".to_string());
        }
        _ => {}
    }

    if let Some(threshold) = profile.require_approval_above {
        if action.amount > threshold {
            return Verdict::RequireApproval("Above approval threshold".to_string());
        }
    }

    if curfew_active {
        return Verdict::RequireApproval("Requested during curfew hours".to_string());
    }

    Verdict::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::sample_profile;

    const CHARGING: &str = "charging";

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn purchase(amount: i64) -> ChildAction {
        ChildAction {
            kind: ApprovalKind::Purchase,
            title: "Sneakers".to_string(),
            amount,
            currency: None,
            vendor: None,
            app: None,
            category: None,
            energy_kwh: None,
            station: None,
            detail: None,
            local_time: None,
        }
    }

    #[test]
    fn test_small_purchase_is_allowed() {
        let profile = sample_profile("child::a");
        assert_eq!(evaluate_action(&profile, &purchase(500), noon(), CHARGING), Verdict::Allow);
    }

    #[test]
    fn test_daily_limit_blocks_before_approval_gate() {
        let mut profile = sample_profile("child::a");
        profile.daily_limit = Some(1_000);
        profile.require_approval_for_all_purchases = true;

        let verdict = evaluate_action(&profile, &purchase(2_000), noon(), CHARGING);
        assert_eq!(verdict, Verdict::Block("Amount exceeds the daily limit".to_string()));
    }

    #[test]
    fn test_threshold_requires_approval() {
        let mut profile = sample_profile("child::a");
        profile.require_approval_above = Some(5_000);

        let verdict = evaluate_action(&profile, &purchase(7_500), noon(), CHARGING);
        assert_eq!(verdict, Verdict::RequireApproval("Above approval threshold".to_string()));
    }

    #[test]
    fn test_hard_curfew_blocks_everything() {
        let mut profile = sample_profile("child::a");
        profile.curfew.enabled = true;
        profile.curfew.hard_lock = true;
        let late = NaiveTime::from_hms_opt(23, 0, 0).unwrap();

        let verdict = evaluate_action(&profile, &purchase(1), late, CHARGING);
        assert_eq!(verdict, Verdict::Block("Curfew hard lock is active".to_string()));
    }

    #[test]
    fn test_soft_curfew_requires_approval() {
        let mut profile = sample_profile("child::a");
        profile.curfew.enabled = true;
        let late = NaiveTime::from_hms_opt(23, 0, 0).unwrap();

        let verdict = evaluate_action(&profile, &purchase(1), late, CHARGING);
        assert!(matches!(verdict, Verdict::RequireApproval(_)));
    }

    #[test]
    fn test_vendor_outside_whitelist_is_blocked() {
        let mut profile = sample_profile("child::a");
        profile.seller_whitelist.insert("bookshop".to_string());

        let mut action = purchase(100);
        action.vendor = Some("arcade".to_string());
        assert!(matches!(evaluate_action(&profile, &action, noon(), CHARGING), Verdict::Block(_)));

        action.vendor = Some("bookshop".to_string());
        assert_eq!(evaluate_action(&profile, &action, noon(), CHARGING), Verdict::Allow);
    }

    #[test]
    fn test_trips_are_always_gated() {
        let profile = sample_profile("child::a");
        let mut action = purchase(0);
        action.kind = ApprovalKind::Trip;
        assert!(matches!(
            evaluate_action(&profile, &action, noon(), CHARGING),
            Verdict::RequireApproval(_)
        ));
    }

    #[test]
    fn test_charging_requires_app_and_policy() {
        let mut profile = sample_profile("child::a");
        let mut action = purchase(0);
        action.kind = ApprovalKind::ChargingSession;
        action.energy_kwh = Some(12.0);

        assert!(matches!(evaluate_action(&profile, &action, noon(), CHARGING), Verdict::Block(_)));

        profile.apps.insert(CHARGING.to_string(), true);
        profile.charging.enabled = true;
        profile.charging.session_kwh_cap = Some(20.0);
        profile.charging.require_approval_above_kwh = Some(10.0);
        assert_eq!(
            evaluate_action(&profile, &action, noon(), CHARGING),
            Verdict::RequireApproval("Above charging approval threshold".to_string())
        );

        action.energy_kwh = Some(25.0);
        assert_eq!(
            evaluate_action(&profile, &action, noon(), CHARGING),
            Verdict::Block("Energy exceeds the session cap".to_string())
        );
    }

    #[test]
    fn test_disallowed_app_is_blocked() {
        let mut profile = sample_profile("child::a");
        profile.apps.insert("games".to_string(), false);
        let mut action = purchase(100);
        action.kind = ApprovalKind::AppInstall;
        action.app = Some("games".to_string());
        assert_eq!(
            evaluate_action(&profile, &action, noon(), CHARGING),
            Verdict::Block("App 'games' is not allowed".to_string())
        );
    }
}
