use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::journey;
use crate::models::*;
use crate::services::RecordProvider;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Where deal and contact records come from (mock or HubSpot CLI).
    pub provider: Arc<dyn RecordProvider>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and the active data source.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "dataSource": state.provider.name(),
        })),
    )
}

/// GET /api/journey/:deal_id
///
/// Fetches the deal and its contact, then classifies the journey.
///
/// The contact is `contact_id` when given, otherwise the first contact
/// associated with the deal. A deal without contact is classified against an
/// empty placeholder contact.
///
/// # Returns
///
/// * `404` when the deal does not exist.
/// * `502` when the record provider fails.
pub async fn get_journey(
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<String>,
    Query(params): Query<JourneyQuery>,
) -> Result<Json<JourneyResponse>, AppError> {
    tracing::info!(
        "GET /api/journey/{} - contact_id: {:?}",
        deal_id,
        params.contact_id
    );

    let deal_id = deal_id.trim();
    if deal_id.is_empty() {
        return Err(AppError::BadRequest("ID do deal é obrigatório".to_string()));
    }

    let deal = state
        .provider
        .get_deal(deal_id)
        .await
        .with_context(|| format!("Fetching deal {}", deal_id))?
        .ok_or_else(|| AppError::NotFound(format!("Deal {} não encontrado", deal_id)))?;

    let contact_id = params
        .contact_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let contact = match contact_id {
        Some(contact_id) => state.provider.get_contact(contact_id).await,
        None => state.provider.get_associated_contact(deal_id).await,
    };
    let contact = match contact {
        Ok(Some(contact)) => contact,
        Ok(None) => CrmRecord::placeholder_contact(),
        Err(e) => {
            tracing::warn!("Contact lookup for deal {} failed: {}", deal_id, e);
            CrmRecord::placeholder_contact()
        }
    };

    let now = Local::now().fixed_offset();
    let journey = journey::classify(&deal, &contact, now);

    tracing::debug!(
        "Deal {} classified as {} (score {})",
        deal_id,
        journey.stage_code(),
        journey.score
    );

    Ok(Json(JourneyResponse {
        journey,
        endpoint: EndpointInfo {
            method: "GET".to_string(),
            path: format!("/api/journey/{}", deal_id),
            timestamp: now,
        },
    }))
}

/// GET /api/deals
///
/// Lists deals. Provider failures are logged and degrade to an empty list.
pub async fn list_deals(State(state): State<Arc<AppState>>) -> Json<Vec<CrmRecord>> {
    tracing::info!("GET /api/deals");

    let deals = state
        .provider
        .list_deals(state.config.list_limit)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to list deals: {}", e);
            Vec::new()
        });

    Json(deals)
}

/// GET /api/contacts
///
/// Lists contacts. Provider failures are logged and degrade to an empty list.
pub async fn list_contacts(State(state): State<Arc<AppState>>) -> Json<Vec<CrmRecord>> {
    tracing::info!("GET /api/contacts");

    let contacts = state
        .provider
        .list_contacts(state.config.list_limit)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to list contacts: {}", e);
            Vec::new()
        });

    Json(contacts)
}

/// GET /api/hubspot/:object_type
///
/// Raw record listing for `deals` or `contacts`.
pub async fn list_crm_objects(
    State(state): State<Arc<AppState>>,
    Path(object_type): Path<String>,
) -> Result<Json<Vec<CrmRecord>>, AppError> {
    tracing::info!("GET /api/hubspot/{}", object_type);

    match object_type.as_str() {
        "deals" => Ok(list_deals(State(state)).await),
        "contacts" => Ok(list_contacts(State(state)).await),
        _ => Err(AppError::NotFound("Endpoint not found".to_string())),
    }
}

/// GET /api/hubspot/:object_type/:object_id
///
/// Raw record lookup for a single deal or contact.
pub async fn get_crm_object(
    State(state): State<Arc<AppState>>,
    Path((object_type, object_id)): Path<(String, String)>,
) -> Result<Json<CrmRecord>, AppError> {
    tracing::info!("GET /api/hubspot/{}/{}", object_type, object_id);

    let record = match object_type.as_str() {
        "deals" => state.provider.get_deal(&object_id).await?,
        "contacts" => state.provider.get_contact(&object_id).await?,
        _ => return Err(AppError::NotFound("Endpoint not found".to_string())),
    };

    record.map(Json).ok_or_else(|| {
        AppError::NotFound(format!("{} {} não encontrado", object_type, object_id))
    })
}

/// GET /api/status
///
/// Reports whether the record provider is reachable.
pub async fn provider_status(State(state): State<Arc<AppState>>) -> Json<ProviderStatus> {
    tracing::info!("GET /api/status");
    Json(state.provider.status().await)
}

/// GET /api/stages
///
/// Catalogue of journey stages and the substages each can carry.
pub async fn list_stages() -> Json<Vec<StageDescriptor>> {
    Json(Stage::ALL.into_iter().map(StageDescriptor::from).collect())
}

/// Fallback for unknown `/api` routes.
pub async fn api_not_found() -> AppError {
    AppError::NotFound("Endpoint not found".to_string())
}
