//! End-to-end tests for the HubSpot CLI provider against a fake `hs` script.
#![cfg(unix)]

use journey_board::errors::AppError;
use journey_board::hubspot_cli::{CrmObjectType, HubSpotCliClient, HubSpotCliService};
use journey_board::journey::classify;
use journey_board::models::Stage;
use journey_board::services::RecordProvider;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tempfile::TempDir;

const FAKE_HS: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$*" in
  "--version") echo "7.4.0" ;;
  "account") echo "Authenticated" ;;
  *"--object-type deals --object-id 42 "*)
    echo '[{"id": 42, "properties": {"dealstage": "closedwon", "first_deposit_date": "2024-01-10", "allocation_done": "true", "amount": "150000"}}]' ;;
  *"--object-type contacts --object-id 901 "*)
    echo '{"id": "901", "properties": {"firstname": "Carla", "lastname": "Dias", "email": "carla@empresa.com", "hs_email_open_rate": "0.4"}}' ;;
  *"--object-type deals --object-id 77 "*)
    echo '{"id": "77", "properties": {"dealstage": "appointmentscheduled"}}' ;;
  *"--object-id 500 "*) echo "HTTP 500 from HubSpot" >&2; exit 2 ;;
  *"--object-id slow "*) sleep 5 ;;
  *"--object-id garbage "*) echo "not json" ;;
  *"associations list"*"--from-object-id 42 "*) echo '{"results": [{"toObjectId": 901}]}' ;;
  *"associations list"*) echo '[]' ;;
  *"object list --object-type deals"*) echo '{"results": [{"id": "1"}, {"id": "2"}], "paging": {}}' ;;
  *"object list --object-type contacts"*) echo '[{"id": 3}]' ;;
  *) echo '[]' ;;
esac
"#;

/// Writes the fake CLI once, before any test spawns a process.
fn fake_cli() -> &'static Path {
    static CLI: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = CLI.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hs");
        std::fs::write(&path, FAKE_HS).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

fn calls_for(needle: &str) -> usize {
    let log = fake_cli().parent().unwrap().join("calls.log");
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .filter(|line| line.contains(needle))
        .count()
}

fn client() -> HubSpotCliClient {
    HubSpotCliClient::new(
        fake_cli().to_string_lossy(),
        Duration::from_secs(1),
        Duration::from_secs(2),
    )
}

#[tokio::test]
async fn status_reports_version_and_account() {
    let status = client().check_status().await;

    assert!(status.is_ok());
    assert_eq!(status.message, "HubSpot CLI conectado");
    assert_eq!(status.version.as_deref(), Some("7.4.0"));
    assert_eq!(status.account.as_deref(), Some("Autenticado"));
}

#[tokio::test]
async fn journey_from_cli_records() {
    let service = HubSpotCliService::new(client(), Duration::from_secs(60));

    let deal = service.get_deal("42").await.unwrap().unwrap();
    let contact = service.get_associated_contact("42").await.unwrap().unwrap();
    assert_eq!(deal.id.as_deref(), Some("42"));
    assert_eq!(contact.id.as_deref(), Some("901"));

    let now = chrono::DateTime::parse_from_rfc3339("2024-12-01T12:00:00Z").unwrap();
    let journey = classify(&deal, &contact, now);
    assert_eq!(journey.stage, Some(Stage::Onboarding));
    assert_eq!(journey.score, 90);
    assert_eq!(
        journey.indicators,
        vec!["Alto valor", "Alto engajamento", "Cliente conquistado"]
    );
    assert_eq!(journey.metadata.contact_name, "Carla Dias");
}

#[tokio::test]
async fn deal_without_association_has_no_contact() {
    let service = HubSpotCliService::new(client(), Duration::ZERO);
    assert_eq!(service.get_associated_contact("77").await.unwrap(), None);
}

#[tokio::test]
async fn lookups_are_cached() {
    let service = HubSpotCliService::new(client(), Duration::from_secs(60));

    for _ in 0..3 {
        let deal = service.get_deal("77").await.unwrap().unwrap();
        assert_eq!(deal.prop_str("dealstage"), Some("appointmentscheduled"));
    }

    assert_eq!(calls_for("--object-type deals --object-id 77 "), 1);
}

#[tokio::test]
async fn lists_unwrap_results() {
    let client = client();
    let deals = client.list_objects(CrmObjectType::Deals, 10).await.unwrap();
    let contacts = client.list_objects(CrmObjectType::Contacts, 10).await.unwrap();

    assert_eq!(deals.len(), 2);
    assert_eq!(contacts[0].id.as_deref(), Some("3"));
    assert_eq!(calls_for("--limit 10 --output json"), 2);
}

#[tokio::test]
async fn cli_failures_become_external_errors() {
    let client = client();

    for id in ["500", "slow", "garbage"] {
        let err = client
            .get_object(CrmObjectType::Deals, id)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::ExternalApiError(_)),
            "unexpected error for {}: {:?}",
            id,
            err
        );
    }

    let err = client
        .get_object(CrmObjectType::Deals, "500")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("HTTP 500 from HubSpot"));
}

#[tokio::test]
async fn empty_answer_is_not_found() {
    let record = client()
        .get_object(CrmObjectType::Contacts, "unknown")
        .await
        .unwrap();
    assert_eq!(record, None);
}
