use crate::errors::AppError;
use crate::models::{ContactRecord, CrmRecord, DealRecord, ProviderStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Local};
use serde_json::{json, Map, Value};

/// Source of deal and contact records.
///
/// The journey classifier only sees the records; it does not care whether
/// they were synthesized or fetched from the CRM.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Short name reported by `/health`.
    fn name(&self) -> &'static str;

    async fn get_deal(&self, deal_id: &str) -> Result<Option<DealRecord>, AppError>;

    async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactRecord>, AppError>;

    /// First contact associated with a deal, if any.
    async fn get_associated_contact(
        &self,
        deal_id: &str,
    ) -> Result<Option<ContactRecord>, AppError>;

    async fn list_deals(&self, limit: usize) -> Result<Vec<DealRecord>, AppError>;

    async fn list_contacts(&self, limit: usize) -> Result<Vec<ContactRecord>, AppError>;

    /// Whether the provider is usable. Never fails; problems are reported in
    /// the returned status.
    async fn status(&self) -> ProviderStatus;
}

/// Synthetic records for running the dashboard without a CRM.
///
/// Any deal id resolves to the same prospecting deal; its associated contact
/// is `contact-<dealId>`.
pub struct MockRecordService {
    clock: fn() -> DateTime<FixedOffset>,
}

impl Default for MockRecordService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecordService {
    pub fn new() -> Self {
        Self {
            clock: || Local::now().fixed_offset(),
        }
    }

    /// Uses a fixed clock for the relative dates in generated records.
    pub fn with_clock(clock: fn() -> DateTime<FixedOffset>) -> Self {
        Self { clock }
    }

    fn days_ago(&self, days: i64) -> String {
        ((self.clock)() - Duration::days(days)).to_rfc3339()
    }

    fn mock_deal(&self, deal_id: &str) -> DealRecord {
        record(
            deal_id,
            json!({
                "dealname": format!("Deal {}", deal_id),
                "dealstage": "appointmentscheduled",
                "amount": "67500",
                "proposal_sent": "true",
                "allocation_done": "false",
                "hs_date_entered_current_stage": self.days_ago(5),
            }),
        )
    }

    fn mock_contact(&self, contact_id: &str) -> ContactRecord {
        record(
            contact_id,
            json!({
                "firstname": "Maria",
                "lastname": "Silva",
                "email": "maria.silva@empresa.com",
                "whatsapp_cadence_active": "false",
                "last_meeting_date": self.days_ago(12),
                "hs_email_open_rate": "0.45",
            }),
        )
    }

    /// One deal per journey stage, plus one that no rule matches.
    fn catalogue_deals(&self) -> Vec<DealRecord> {
        vec![
            self.mock_deal("123"),
            record(
                "456",
                json!({
                    "dealname": "Deal 456",
                    "dealstage": "contractsent",
                    "amount": "120000",
                    "first_deposit_date": self.days_ago(20),
                    "allocation_done": "true",
                    "hs_date_entered_current_stage": self.days_ago(20),
                }),
            ),
            record(
                "789",
                json!({
                    "dealname": "Deal 789",
                    "dealstage": "closedwon",
                    "amount": "45000",
                    "first_deposit_date": self.days_ago(200),
                    "hs_date_entered_current_stage": self.days_ago(200),
                }),
            ),
            record(
                "999",
                json!({
                    "dealname": "Deal 999",
                    "dealstage": "qualifiedtobuy",
                    "amount": null,
                }),
            ),
        ]
    }

    fn catalogue_contacts(&self) -> Vec<ContactRecord> {
        vec![
            self.mock_contact("contact-123"),
            record(
                "contact-456",
                json!({
                    "firstname": "João",
                    "lastname": "Souza",
                    "email": "joao.souza@empresa.com",
                    "hs_email_open_rate": "0.12",
                }),
            ),
            record(
                "contact-789",
                json!({
                    "firstname": "Ana",
                    "lastname": "Costa",
                    "email": "ana.costa@empresa.com",
                    "whatsapp_cadence_active": "true",
                    "last_meeting_date": self.days_ago(30),
                    "hs_email_open_rate": "0.6",
                }),
            ),
        ]
    }
}

fn record(id: &str, properties: Value) -> CrmRecord {
    match properties {
        Value::Object(map) => CrmRecord::new(id, map),
        _ => CrmRecord::new(id, Map::new()),
    }
}

#[async_trait]
impl RecordProvider for MockRecordService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_deal(&self, deal_id: &str) -> Result<Option<DealRecord>, AppError> {
        let deal = self
            .catalogue_deals()
            .into_iter()
            .find(|d| d.id.as_deref() == Some(deal_id))
            .unwrap_or_else(|| self.mock_deal(deal_id));
        Ok(Some(deal))
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactRecord>, AppError> {
        let contact = self
            .catalogue_contacts()
            .into_iter()
            .find(|c| c.id.as_deref() == Some(contact_id))
            .unwrap_or_else(|| self.mock_contact(contact_id));
        Ok(Some(contact))
    }

    async fn get_associated_contact(
        &self,
        deal_id: &str,
    ) -> Result<Option<ContactRecord>, AppError> {
        self.get_contact(&format!("contact-{}", deal_id)).await
    }

    async fn list_deals(&self, limit: usize) -> Result<Vec<DealRecord>, AppError> {
        Ok(self.catalogue_deals().into_iter().take(limit).collect())
    }

    async fn list_contacts(&self, limit: usize) -> Result<Vec<ContactRecord>, AppError> {
        Ok(self.catalogue_contacts().into_iter().take(limit).collect())
    }

    async fn status(&self) -> ProviderStatus {
        ProviderStatus::success("Dados simulados (mock)")
    }
}
