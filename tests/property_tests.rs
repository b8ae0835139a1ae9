/// Property-based tests using proptest
/// Tests invariants of the journey classifier that should hold for all inputs
use chrono::{DateTime, Duration, FixedOffset};
use journey_board::journey::{classify, days_since, is_truthy};
use journey_board::models::{CrmRecord, Stage};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-12-01T15:30:00-03:00").unwrap()
}

/// Values a CRM property can plausibly hold, plus some junk.
fn property_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        Just(json!("true")),
        Just(json!("false")),
        (-1_000_000i64..1_000_000i64).prop_map(|n| json!(n)),
        (-1e7f64..1e7f64).prop_map(|n| json!(n)),
        (-1e7f64..1e7f64).prop_map(|n| json!(n.to_string())),
        (0i64..400).prop_map(|d| json!((now() - Duration::days(d)).format("%Y-%m-%d").to_string())),
        (0i64..400).prop_map(|d| json!((now() - Duration::days(d)).to_rfc3339())),
        "\\PC{0,24}".prop_map(Value::String),
    ]
}

fn deal_stage() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("appointmentscheduled")),
        Just(json!("presentationscheduled")),
        Just(json!("contractsent")),
        Just(json!("closedwon")),
        Just(json!("closedlost")),
        property_value(),
    ]
}

prop_compose! {
    fn deal_record()(
        dealstage in deal_stage(),
        amount in property_value(),
        first_deposit_date in property_value(),
        proposal_sent in property_value(),
        allocation_done in property_value(),
        entered_stage in property_value(),
    ) -> CrmRecord {
        let mut props = Map::new();
        props.insert("dealstage".into(), dealstage);
        props.insert("amount".into(), amount);
        props.insert("first_deposit_date".into(), first_deposit_date);
        props.insert("proposal_sent".into(), proposal_sent);
        props.insert("allocation_done".into(), allocation_done);
        props.insert("hs_date_entered_current_stage".into(), entered_stage);
        CrmRecord::new("deal", props)
    }
}

prop_compose! {
    fn contact_record()(
        cadence in property_value(),
        last_meeting in property_value(),
        open_rate in property_value(),
        firstname in property_value(),
        email in property_value(),
    ) -> CrmRecord {
        let mut props = Map::new();
        props.insert("whatsapp_cadence_active".into(), cadence);
        props.insert("last_meeting_date".into(), last_meeting);
        props.insert("hs_email_open_rate".into(), open_rate);
        props.insert("firstname".into(), firstname);
        props.insert("email".into(), email);
        CrmRecord::new("contact", props)
    }
}

// Property: classification never panics and keeps its bounds
proptest! {
    #[test]
    fn score_always_within_bounds(deal in deal_record(), contact in contact_record()) {
        let journey = classify(&deal, &contact, now());
        prop_assert!(journey.score <= 100);
        prop_assert!(journey.metadata.days_in_current_stage >= 0);
        prop_assert!(journey.metadata.deal_amount >= 0.0);
        prop_assert!(journey.metadata.deal_amount.is_finite());
    }

    #[test]
    fn classification_is_deterministic(deal in deal_record(), contact in contact_record()) {
        prop_assert_eq!(classify(&deal, &contact, now()), classify(&deal, &contact, now()));
    }

    #[test]
    fn stage_and_substage_are_set_together(deal in deal_record(), contact in contact_record()) {
        let journey = classify(&deal, &contact, now());
        prop_assert_eq!(journey.stage.is_some(), journey.substage.is_some());
        prop_assert_eq!(journey.stage.is_some(), journey.stage_name.is_some());
        if let (Some(stage), Some(substage)) = (journey.stage, journey.substage) {
            prop_assert!(stage.substages().contains(&substage));
        }
        prop_assert!(!journey.recommendations.is_empty());
    }

    #[test]
    fn active_cadence_with_recent_meeting_always_wins(
        deal in deal_record(),
        days in 0i64..=90,
    ) {
        let mut props = Map::new();
        props.insert("whatsapp_cadence_active".into(), json!("true"));
        props.insert("last_meeting_date".into(), json!((now() - Duration::days(days)).to_rfc3339()));
        let contact = CrmRecord::new("contact", props);

        let journey = classify(&deal, &contact, now());
        prop_assert_eq!(journey.stage, Some(Stage::Relationship));
    }

    #[test]
    fn higher_amounts_never_lower_the_score(
        dealstage in deal_stage(),
        low in 0.0f64..200_000.0,
        extra in 0.0f64..200_000.0,
    ) {
        let deal_with = |amount: f64| {
            let mut props = Map::new();
            props.insert("dealstage".into(), dealstage.clone());
            props.insert("amount".into(), json!(amount));
            CrmRecord::new("deal", props)
        };
        let contact = CrmRecord::placeholder_contact();

        let low_score = classify(&deal_with(low), &contact, now()).score;
        let high_score = classify(&deal_with(low + extra), &contact, now()).score;
        prop_assert!(high_score >= low_score);
    }
}

// Property: date and flag coercion never panic
proptest! {
    #[test]
    fn days_since_never_panics(raw in "\\PC*") {
        let _ = days_since(Some(&Value::String(raw)), now());
    }

    #[test]
    fn strings_without_dates_yield_zero(raw in "[a-zA-Z ]{0,20}") {
        prop_assume!(!raw.contains('T'));
        prop_assert_eq!(days_since(Some(&Value::String(raw)), now()), 0);
    }

    #[test]
    fn plain_dates_count_whole_days(days in 0i64..5000) {
        let date = (now() - Duration::days(days)).format("%Y-%m-%d").to_string();
        prop_assert_eq!(days_since(Some(&json!(date)), now()), days);
    }

    #[test]
    fn only_exact_true_is_truthy(raw in "\\PC{0,10}") {
        prop_assert_eq!(is_truthy(Some(&Value::String(raw.clone()))), raw == "true");
    }
}
