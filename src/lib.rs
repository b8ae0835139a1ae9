//! Journey Board Library
//!
//! Serves a customer-journey dashboard for CRM deals: records come from a
//! synthetic provider or the HubSpot CLI, and each deal/contact pair is
//! classified into Prospecção, Onboarding or Relacionamento.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `hubspot_cli`: HubSpot CLI record provider.
//! - `journey`: Journey classification rules, scoring and recommendations.
//! - `models`: CRM records and classification types.
//! - `server`: Router, static files and startup helpers.
//! - `services`: Record provider trait and mock data.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod hubspot_cli;
pub mod journey;
pub mod models;
pub mod server;
pub mod services;
