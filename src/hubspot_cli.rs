//! HubSpot CLI adapter.
//!
//! Records are fetched by running the `hs` command-line tool with
//! `--output json`, so the server inherits whatever account `hs auth`
//! configured and never handles API keys itself.
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{ContactRecord, CrmRecord, DealRecord, ProviderStatus};
use crate::services::RecordProvider;
use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use std::fmt;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

const DEAL_PROPERTIES: &str = "dealstage,amount,dealname,first_deposit_date,proposal_sent,allocation_done,hs_date_entered_current_stage,closedate";
const CONTACT_PROPERTIES: &str = "email,firstname,lastname,whatsapp_cadence_active,\
last_meeting_date,hs_email_open_rate,createdate";
const DEAL_LIST_PROPERTIES: &str =
    "dealstage,amount,dealname,hs_date_entered_current_stage,closedate";
const CONTACT_LIST_PROPERTIES: &str = "email,firstname,lastname,hs_email_open_rate,createdate";

/// CRM object types the journey board reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmObjectType {
    Deals,
    Contacts,
}

impl CrmObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrmObjectType::Deals => "deals",
            CrmObjectType::Contacts => "contacts",
        }
    }

    fn get_properties(&self) -> &'static str {
        match self {
            CrmObjectType::Deals => DEAL_PROPERTIES,
            CrmObjectType::Contacts => CONTACT_PROPERTIES,
        }
    }

    fn list_properties(&self) -> &'static str {
        match self {
            CrmObjectType::Deals => DEAL_LIST_PROPERTIES,
            CrmObjectType::Contacts => CONTACT_LIST_PROPERTIES,
        }
    }
}

/// Why a CLI invocation did not produce usable output.
#[derive(Debug)]
pub enum CliFailure {
    /// The executable could not be started (usually not installed).
    Spawn(std::io::Error),
    Timeout(Duration),
    /// Non-zero exit; carries the trimmed stderr.
    Exit { code: Option<i32>, stderr: String },
}

impl fmt::Display for CliFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliFailure::Spawn(e) => write!(f, "failed to execute CLI: {}", e),
            CliFailure::Timeout(t) => write!(f, "CLI timed out after {:?}", t),
            CliFailure::Exit { code, stderr } => match code {
                Some(code) => write!(f, "CLI exited with status {}: {}", code, stderr),
                None => write!(f, "CLI terminated by signal: {}", stderr),
            },
        }
    }
}

impl From<CliFailure> for AppError {
    fn from(failure: CliFailure) -> Self {
        AppError::ExternalApiError(failure.to_string())
    }
}

/// Thin wrapper around the `hs` executable.
#[derive(Debug, Clone)]
pub struct HubSpotCliClient {
    bin: String,
    timeout: Duration,
    list_timeout: Duration,
}

impl HubSpotCliClient {
    /// Creates a new `HubSpotCliClient`.
    ///
    /// # Arguments
    ///
    /// * `bin` - Path or name of the CLI executable.
    /// * `timeout` - Limit for single-record commands.
    /// * `list_timeout` - Limit for list commands.
    pub fn new(bin: impl Into<String>, timeout: Duration, list_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
            list_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.hubspot_cli_bin.clone(),
            config.cli_timeout,
            config.cli_list_timeout,
        )
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, CliFailure> {
        tracing::debug!("Running {} {}", self.bin, args.join(" "));

        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| CliFailure::Timeout(timeout))?
            .map_err(CliFailure::Spawn)?;

        if !output.status.success() {
            return Err(CliFailure::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }

    async fn run_json(&self, args: &[&str], timeout: Duration) -> Result<Value, AppError> {
        let output = self.run(args, timeout).await?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Fetches one object by id.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` when the CLI answers with an empty result.
    pub async fn get_object(
        &self,
        object_type: CrmObjectType,
        object_id: &str,
    ) -> Result<Option<CrmRecord>, AppError> {
        tracing::info!("Fetching {} {} via HubSpot CLI", object_type.as_str(), object_id);

        let data = self
            .run_json(
                &[
                    "crm",
                    "object",
                    "get",
                    "--object-type",
                    object_type.as_str(),
                    "--object-id",
                    object_id,
                    "--properties",
                    object_type.get_properties(),
                    "--output",
                    "json",
                ],
                self.timeout,
            )
            .await?;

        normalize_single(data)
    }

    /// Lists up to `limit` objects of a type.
    pub async fn list_objects(
        &self,
        object_type: CrmObjectType,
        limit: usize,
    ) -> Result<Vec<CrmRecord>, AppError> {
        tracing::info!("Listing {} via HubSpot CLI (limit {})", object_type.as_str(), limit);

        let limit = limit.to_string();
        let data = self
            .run_json(
                &[
                    "crm",
                    "object",
                    "list",
                    "--object-type",
                    object_type.as_str(),
                    "--properties",
                    object_type.list_properties(),
                    "--limit",
                    limit.as_str(),
                    "--output",
                    "json",
                ],
                self.list_timeout,
            )
            .await?;

        Ok(normalize_list(data))
    }

    /// Id of the first contact associated with a deal.
    pub async fn first_associated_contact_id(
        &self,
        deal_id: &str,
    ) -> Result<Option<String>, AppError> {
        let data = self
            .run_json(
                &[
                    "crm",
                    "associations",
                    "list",
                    "--from-object-type",
                    "deals",
                    "--from-object-id",
                    deal_id,
                    "--to-object-type",
                    "contacts",
                    "--output",
                    "json",
                ],
                self.timeout,
            )
            .await?;

        Ok(first_association_id(&data))
    }

    /// Checks that the CLI is installed and authenticated.
    pub async fn check_status(&self) -> ProviderStatus {
        let version = match self.run(&["--version"], STATUS_TIMEOUT).await {
            Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
            Err(CliFailure::Timeout(_)) => return ProviderStatus::error("Timeout verificando CLI"),
            Err(e) => {
                tracing::warn!("HubSpot CLI version check failed: {}", e);
                return ProviderStatus::error("HubSpot CLI não instalado");
            }
        };

        match self.run(&["account"], STATUS_TIMEOUT).await {
            Ok(_) => ProviderStatus {
                version: Some(version),
                account: Some("Autenticado".to_string()),
                ..ProviderStatus::success("HubSpot CLI conectado")
            },
            Err(CliFailure::Timeout(_)) => ProviderStatus::error("Timeout verificando CLI"),
            Err(e) => {
                tracing::warn!("HubSpot CLI account check failed: {}", e);
                ProviderStatus::error("HubSpot CLI não autenticado")
            }
        }
    }
}

/// A `get` answers with either the object or a one-element array.
pub fn normalize_single(data: Value) -> Result<Option<CrmRecord>, AppError> {
    let object = match data {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        Value::Null => return Ok(None),
        other => other,
    };
    Ok(Some(serde_json::from_value(object)?))
}

/// A `list` answers with `{"results": [...]}` or a bare array. Anything else,
/// and any entry that is not an object, is dropped.
pub fn normalize_list(data: Value) -> Vec<CrmRecord> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// Contact id of the first association, taken from `toObjectId` or `id`.
pub fn first_association_id(data: &Value) -> Option<String> {
    let first = match data {
        Value::Array(items) => items.first(),
        Value::Object(map) => map.get("results").and_then(Value::as_array)?.first(),
        _ => None,
    }?;

    ["toObjectId", "id"].iter().find_map(|key| match first.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// [`RecordProvider`] backed by the HubSpot CLI.
///
/// Single-record lookups are cached briefly so dashboard refreshes do not
/// spawn a new process for every request.
pub struct HubSpotCliService {
    client: HubSpotCliClient,
    record_cache: Option<Cache<String, CrmRecord>>,
}

impl HubSpotCliService {
    pub fn new(client: HubSpotCliClient, cache_ttl: Duration) -> Self {
        let record_cache = (!cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .time_to_live(cache_ttl)
                .max_capacity(10_000)
                .build()
        });
        Self {
            client,
            record_cache,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(HubSpotCliClient::from_config(config), config.record_cache_ttl)
    }

    async fn cached_get(
        &self,
        object_type: CrmObjectType,
        object_id: &str,
    ) -> Result<Option<CrmRecord>, AppError> {
        let cache_key = format!("{}:{}", object_type.as_str(), object_id);

        if let Some(cache) = &self.record_cache {
            if let Some(record) = cache.get(&cache_key).await {
                tracing::debug!("Record cache HIT: {}", cache_key);
                return Ok(Some(record));
            }
        }

        let record = self.client.get_object(object_type, object_id).await?;

        if let (Some(cache), Some(record)) = (&self.record_cache, &record) {
            cache.insert(cache_key, record.clone()).await;
        }

        Ok(record)
    }
}

#[async_trait]
impl RecordProvider for HubSpotCliService {
    fn name(&self) -> &'static str {
        "hubspot"
    }

    async fn get_deal(&self, deal_id: &str) -> Result<Option<DealRecord>, AppError> {
        self.cached_get(CrmObjectType::Deals, deal_id).await
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactRecord>, AppError> {
        self.cached_get(CrmObjectType::Contacts, contact_id).await
    }

    async fn get_associated_contact(
        &self,
        deal_id: &str,
    ) -> Result<Option<ContactRecord>, AppError> {
        match self.client.first_associated_contact_id(deal_id).await? {
            Some(contact_id) => self.get_contact(&contact_id).await,
            None => {
                tracing::info!("Deal {} has no associated contact", deal_id);
                Ok(None)
            }
        }
    }

    async fn list_deals(&self, limit: usize) -> Result<Vec<DealRecord>, AppError> {
        self.client.list_objects(CrmObjectType::Deals, limit).await
    }

    async fn list_contacts(&self, limit: usize) -> Result<Vec<ContactRecord>, AppError> {
        self.client.list_objects(CrmObjectType::Contacts, limit).await
    }

    async fn status(&self) -> ProviderStatus {
        self.client.check_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_takes_first_array_element() {
        let record = normalize_single(json!([
            {"id": "1", "properties": {"dealstage": "closedwon"}},
            {"id": "2", "properties": {}}
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(record.id.as_deref(), Some("1"));
        assert_eq!(record.prop_str("dealstage"), Some("closedwon"));
    }

    #[test]
    fn single_empty_array_is_not_found() {
        assert_eq!(normalize_single(json!([])).unwrap(), None);
        assert_eq!(normalize_single(Value::Null).unwrap(), None);
    }

    #[test]
    fn single_rejects_non_objects() {
        assert!(normalize_single(json!("oops")).is_err());
    }

    #[test]
    fn list_accepts_results_wrapper_or_bare_array() {
        let wrapped = normalize_list(json!({"results": [{"id": "1"}, {"id": 2}]}));
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].id.as_deref(), Some("2"));

        let bare = normalize_list(json!([{"id": "1"}, "junk"]));
        assert_eq!(bare.len(), 1);

        assert!(normalize_list(json!({"paging": {}})).is_empty());
        assert!(normalize_list(json!(42)).is_empty());
    }

    #[test]
    fn association_prefers_to_object_id() {
        assert_eq!(
            first_association_id(&json!([{"toObjectId": 901, "id": "x"}])),
            Some("901".to_string())
        );
        assert_eq!(
            first_association_id(&json!({"results": [{"id": "77"}]})),
            Some("77".to_string())
        );
        assert_eq!(first_association_id(&json!({"results": []})), None);
        assert_eq!(first_association_id(&json!([{"type": "deal_to_contact"}])), None);
    }

    #[tokio::test]
    async fn missing_binary_reports_not_installed() {
        let client = HubSpotCliClient::new(
            "/nonexistent/hubspot-cli-for-tests",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let status = client.check_status().await;
        assert_eq!(status, ProviderStatus::error("HubSpot CLI não instalado"));

        let err = client
            .get_object(CrmObjectType::Deals, "1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalApiError(_)));
    }
}
