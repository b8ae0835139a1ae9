use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============ CRM Records ============

/// A CRM object (deal or contact) as returned by the record provider.
///
/// Properties are kept as a loose JSON map: the CRM hands back strings for
/// most values, but booleans and numbers show up depending on how the
/// property was created, and the classifier has to cope with both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmRecord {
    /// External CRM identifier. Accepts either a JSON string or number.
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    /// Raw property bag.
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Map<String, Value>,
}

/// A deal record (`dealstage`, `amount`, `first_deposit_date`, ...).
pub type DealRecord = CrmRecord;

/// A contact record (`firstname`, `email`, `whatsapp_cadence_active`, ...).
pub type ContactRecord = CrmRecord;

impl CrmRecord {
    /// Creates a record with the given id and properties.
    pub fn new(id: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            properties,
        }
    }

    /// Contact used when a deal has no associated contact.
    pub fn placeholder_contact() -> Self {
        Self::new("no-contact", Map::new())
    }

    /// Looks up a property value.
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Returns a property only when it is a JSON string.
    pub fn prop_str(&self, name: &str) -> Option<&str> {
        self.prop(name).and_then(Value::as_str)
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_properties<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

// ============ Journey Classification ============

/// Coarse journey stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Prospecting,
    Onboarding,
    Relationship,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Prospecting, Stage::Onboarding, Stage::Relationship];

    /// Wire code, e.g. `PROSPECTING`.
    pub fn code(&self) -> &'static str {
        match self {
            Stage::Prospecting => "PROSPECTING",
            Stage::Onboarding => "ONBOARDING",
            Stage::Relationship => "RELATIONSHIP",
        }
    }

    /// Display label shown on the dashboard (pt-BR).
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Prospecting => "Prospecção",
            Stage::Onboarding => "Onboarding",
            Stage::Relationship => "Relacionamento",
        }
    }

    /// Substages the classifier can assign within this stage.
    pub fn substages(&self) -> &'static [Substage] {
        match self {
            Stage::Prospecting => &[Substage::InitialContact, Substage::ProposalSent],
            Stage::Onboarding => &[Substage::ContractSigned, Substage::Implementation],
            Stage::Relationship => &[Substage::ActiveClient],
        }
    }
}

/// Fine-grained position within a [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Substage {
    InitialContact,
    ProposalSent,
    ContractSigned,
    Implementation,
    ActiveClient,
}

impl Substage {
    pub fn code(&self) -> &'static str {
        match self {
            Substage::InitialContact => "INITIAL_CONTACT",
            Substage::ProposalSent => "PROPOSAL_SENT",
            Substage::ContractSigned => "CONTRACT_SIGNED",
            Substage::Implementation => "IMPLEMENTATION",
            Substage::ActiveClient => "ACTIVE_CLIENT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Substage::InitialContact => "Contato Inicial",
            Substage::ProposalSent => "Proposta Enviada",
            Substage::ContractSigned => "Contrato Assinado",
            Substage::Implementation => "Implementação",
            Substage::ActiveClient => "Cliente Ativo",
        }
    }
}

/// Result of classifying a deal/contact pair.
///
/// Field names are camelCase on the wire; the dashboard reads them directly.
/// An unclassified journey serializes `stage`/`substage` and their names as
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyClassification {
    pub deal_id: Option<String>,
    pub contact_id: Option<String>,
    pub stage: Option<Stage>,
    pub substage: Option<Substage>,
    pub stage_name: Option<String>,
    pub substage_name: Option<String>,
    /// Always within 0..=100.
    pub score: u8,
    pub indicators: Vec<String>,
    pub recommendations: Vec<String>,
    pub metadata: JourneyMetadata,
}

impl JourneyClassification {
    /// Stage code for logs; `UNCLASSIFIED` when no rule matched.
    pub fn stage_code(&self) -> &'static str {
        self.stage.map(|s| s.code()).unwrap_or("UNCLASSIFIED")
    }
}

/// Context attached to every classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyMetadata {
    /// The `now` the classification was computed against.
    pub analyzed_at: DateTime<FixedOffset>,
    pub days_in_current_stage: i64,
    pub deal_amount: f64,
    pub contact_name: String,
    pub contact_email: String,
}

// ============ API Responses ============

/// Journey response body: the classification plus request echo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyResponse {
    #[serde(flatten)]
    pub journey: JourneyClassification,
    pub endpoint: EndpointInfo,
}

/// Request echo included in journey responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub timestamp: DateTime<FixedOffset>,
}

/// Query parameters accepted by `/api/journey/:deal_id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JourneyQuery {
    pub contact_id: Option<String>,
}

/// Health of the record provider, as reported by `/api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// `success` or `error`.
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl ProviderStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            version: None,
            account: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            version: None,
            account: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "success"
    }
}

/// One entry of the `/api/stages` catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDescriptor {
    pub code: String,
    pub name: String,
    pub substages: Vec<SubstageDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstageDescriptor {
    pub code: String,
    pub name: String,
}

impl From<Stage> for StageDescriptor {
    fn from(stage: Stage) -> Self {
        Self {
            code: stage.code().to_string(),
            name: stage.label().to_string(),
            substages: stage
                .substages()
                .iter()
                .map(|s| SubstageDescriptor {
                    code: s.code().to_string(),
                    name: s.label().to_string(),
                })
                .collect(),
        }
    }
}
