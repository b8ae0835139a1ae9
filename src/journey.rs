//! Journey classification.
//!
//! Maps a deal/contact pair onto the customer journey:
//! Prospecção → Onboarding → Relacionamento.
//!
//! Stage inference is a left fold over [`STAGE_RULES`]: every rule is
//! evaluated and a later match replaces an earlier one. The relationship rule
//! therefore wins over prospecting/onboarding whenever the WhatsApp cadence is
//! active and the last meeting is recent enough.
//!
//! Classification never fails. Missing or malformed properties fall back to
//! empty strings, `0`, or an unclassified stage.
use crate::models::{
    ContactRecord, DealRecord, JourneyClassification, JourneyMetadata, Stage, Substage,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// A contact counts as an active client while the last meeting is at most
/// this many days old.
pub const RELATIONSHIP_WINDOW_DAYS: i64 = 90;

/// Amount above which a deal is considered high value.
pub const HIGH_VALUE_AMOUNT: f64 = 50_000.0;

/// Amount above which a deal receives the second score bonus.
pub const PREMIUM_AMOUNT: f64 = 100_000.0;

/// Open rate above which a contact is considered engaged.
pub const HIGH_ENGAGEMENT_OPEN_RATE: f64 = 0.3;

pub const MAX_SCORE: u32 = 100;

const PROSPECTING_DEAL_STAGES: [&str; 2] = ["appointmentscheduled", "presentationscheduled"];
const ONBOARDING_DEAL_STAGES: [&str; 2] = ["contractsent", "closedwon"];
const WON_DEAL_STAGE: &str = "closedwon";

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Stage and substage assigned by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub stage: Stage,
    pub substage: Substage,
}

impl Placement {
    fn new(stage: Stage, substage: Substage) -> Self {
        Self { stage, substage }
    }
}

/// Rule inputs extracted once from the raw property bags.
#[derive(Debug, Clone)]
pub struct JourneySignals<'a> {
    pub deal_stage: Option<&'a str>,
    pub proposal_sent: bool,
    pub allocation_done: bool,
    pub has_first_deposit: bool,
    pub whatsapp_cadence_active: bool,
    pub days_since_last_meeting: i64,
}

impl<'a> JourneySignals<'a> {
    pub fn extract(
        deal: &'a DealRecord,
        contact: &'a ContactRecord,
        now: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            deal_stage: deal.prop_str("dealstage"),
            proposal_sent: is_truthy(deal.prop("proposal_sent")),
            allocation_done: is_truthy(deal.prop("allocation_done")),
            has_first_deposit: is_present(deal.prop("first_deposit_date")),
            whatsapp_cadence_active: is_truthy(contact.prop("whatsapp_cadence_active")),
            days_since_last_meeting: days_since(contact.prop("last_meeting_date"), now),
        }
    }
}

pub type StageRule = fn(&JourneySignals<'_>) -> Option<Placement>;

/// Evaluated in order; the last rule that matches decides the placement.
pub const STAGE_RULES: [StageRule; 3] = [prospecting_rule, onboarding_rule, relationship_rule];

fn prospecting_rule(signals: &JourneySignals<'_>) -> Option<Placement> {
    let stage = signals.deal_stage?;
    if !PROSPECTING_DEAL_STAGES.contains(&stage) {
        return None;
    }
    let substage = if signals.proposal_sent {
        Substage::ProposalSent
    } else {
        Substage::InitialContact
    };
    Some(Placement::new(Stage::Prospecting, substage))
}

// Shares no deal stage with the prospecting rule today; if the pipeline ever
// maps one stage into both sets this rule silently takes over.
fn onboarding_rule(signals: &JourneySignals<'_>) -> Option<Placement> {
    let stage = signals.deal_stage?;
    if !ONBOARDING_DEAL_STAGES.contains(&stage) || !signals.has_first_deposit {
        return None;
    }
    let substage = if signals.allocation_done {
        Substage::Implementation
    } else {
        Substage::ContractSigned
    };
    Some(Placement::new(Stage::Onboarding, substage))
}

fn relationship_rule(signals: &JourneySignals<'_>) -> Option<Placement> {
    if signals.whatsapp_cadence_active
        && signals.days_since_last_meeting <= RELATIONSHIP_WINDOW_DAYS
    {
        Some(Placement::new(Stage::Relationship, Substage::ActiveClient))
    } else {
        None
    }
}

/// Folds [`STAGE_RULES`] over an unset placement, last match wins.
pub fn infer_placement(signals: &JourneySignals<'_>) -> Option<Placement> {
    STAGE_RULES
        .iter()
        .fold(None, |current, rule| rule(signals).or(current))
}

/// Classifies a deal/contact pair as of `now`.
///
/// Pure: the same inputs and `now` always yield the same classification.
pub fn classify(
    deal: &DealRecord,
    contact: &ContactRecord,
    now: DateTime<FixedOffset>,
) -> JourneyClassification {
    let signals = JourneySignals::extract(deal, contact, now);
    let placement = infer_placement(&signals);
    let amount = parse_number(deal.prop("amount"));
    let stage = placement.map(|p| p.stage);

    JourneyClassification {
        deal_id: deal.id.clone(),
        contact_id: contact.id.clone(),
        stage,
        substage: placement.map(|p| p.substage),
        stage_name: placement.map(|p| p.stage.label().to_string()),
        substage_name: placement.map(|p| p.substage.label().to_string()),
        score: score(placement, amount),
        indicators: indicators(deal, contact, amount),
        recommendations: recommendations(stage)
            .iter()
            .map(|r| r.to_string())
            .collect(),
        metadata: JourneyMetadata {
            analyzed_at: now,
            days_in_current_stage: days_since(deal.prop("hs_date_entered_current_stage"), now)
                .max(0),
            deal_amount: amount.max(0.0),
            contact_name: contact_name(contact),
            contact_email: contact.prop_str("email").unwrap_or_default().to_string(),
        },
    }
}

/// Journey score in `0..=100`.
pub fn score(placement: Option<Placement>, amount: f64) -> u8 {
    let base = match placement {
        Some(Placement {
            stage: Stage::Prospecting,
            substage,
        }) => 20 + if substage == Substage::ProposalSent { 15 } else { 0 },
        Some(Placement {
            stage: Stage::Onboarding,
            substage,
        }) => 50 + if substage == Substage::Implementation { 20 } else { 0 },
        Some(Placement {
            stage: Stage::Relationship,
            ..
        }) => 80,
        None => 10,
    };

    let mut bonus = 0;
    if amount > HIGH_VALUE_AMOUNT {
        bonus += 10;
    }
    if amount > PREMIUM_AMOUNT {
        bonus += 10;
    }

    (base + bonus).min(MAX_SCORE) as u8
}

fn indicators(deal: &DealRecord, contact: &ContactRecord, amount: f64) -> Vec<String> {
    let mut indicators = Vec::new();

    if amount > HIGH_VALUE_AMOUNT {
        indicators.push("Alto valor".to_string());
    }
    if parse_number(contact.prop("hs_email_open_rate")) > HIGH_ENGAGEMENT_OPEN_RATE {
        indicators.push("Alto engajamento".to_string());
    }
    if deal.prop_str("dealstage") == Some(WON_DEAL_STAGE) {
        indicators.push("Cliente conquistado".to_string());
    }

    indicators
}

/// Next actions suggested for a stage.
pub fn recommendations(stage: Option<Stage>) -> &'static [&'static str] {
    match stage {
        Some(Stage::Prospecting) => &[
            "Agendar próxima reunião",
            "Enviar material complementar",
            "Qualificar necessidades específicas",
        ],
        Some(Stage::Onboarding) => &[
            "Acompanhar implementação",
            "Agendar treinamento",
            "Definir marcos de sucesso",
        ],
        Some(Stage::Relationship) => &[
            "Avaliar oportunidades de upsell",
            "Solicitar feedback",
            "Programar revisão trimestral",
        ],
        None => &["Definir próximos passos", "Agendar follow-up"],
    }
}

fn contact_name(contact: &ContactRecord) -> String {
    let first = contact.prop_str("firstname").unwrap_or_default();
    let last = contact.prop_str("lastname").unwrap_or_default();
    format!("{} {}", first, last).trim().to_string()
}

// ============ Property coercion ============

/// `true` only for JSON `true` or the string `"true"`.
///
/// Anything else, including `"True"`, `1` and `"1"`, is false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
        || matches!(value, Some(Value::String(s)) if s == "true")
}

/// Whether a property carries a non-empty value.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Parses a numeric property given as a JSON number or numeric string.
///
/// Returns `0.0` for anything missing, unparseable or non-finite.
pub fn parse_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

// ============ Dates ============

/// A CRM date, with or without a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmDate {
    Offset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

// `%#z` accepts `+03`, `+0300` and `+03:00`.
const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f %#z",
    "%Y-%m-%dT%H:%M%#z",
];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses an ISO-8601 timestamp (when it contains `T`) or a plain
/// `YYYY-MM-DD` date. A trailing `Z` is read as `+00:00`.
pub fn parse_crm_date(raw: &str) -> Option<CrmDate> {
    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CrmDate::Naive);
    }

    let normalized = raw.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(CrmDate::Offset(dt));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
    {
        return Some(CrmDate::Offset(dt));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(CrmDate::Naive)
}

/// Whole days elapsed between a date property and `now`, floored.
///
/// Dates with an offset are compared as instants; naive dates are compared
/// against the wall-clock time of `now`. Missing, non-string or unparseable
/// values yield `0`. Future dates yield a negative count.
pub fn days_since(value: Option<&Value>, now: DateTime<FixedOffset>) -> i64 {
    let Some(raw) = value.and_then(Value::as_str).filter(|s| !s.is_empty()) else {
        return 0;
    };

    let elapsed = match parse_crm_date(raw) {
        Some(CrmDate::Offset(date)) => now.signed_duration_since(date),
        Some(CrmDate::Naive(date)) => now.naive_local().signed_duration_since(date),
        None => return 0,
    };

    match elapsed.num_microseconds() {
        Some(micros) => micros.div_euclid(MICROS_PER_DAY),
        None => elapsed.num_days(),
    }
}
