use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{config::EnvironmentReport, dto::format_system_time};

/// Tri-state health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Configuration complete and the store answered the probe.
    Healthy,
    /// Configuration complete but the store probe failed.
    Unhealthy,
    /// Required configuration absent; no network call was attempted.
    Misconfigured,
}

/// Per-variable presence flags reported alongside every probe result.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentFlags {
    /// True when `SUPABASE_URL` is set and not a placeholder.
    pub supabase_url: bool,
    /// True when `SUPABASE_ANON_KEY` is set and not a placeholder.
    pub supabase_anon_key: bool,
}

impl From<EnvironmentReport> for EnvironmentFlags {
    fn from(report: EnvironmentReport) -> Self {
        Self {
            supabase_url: report.store_url,
            supabase_anon_key: report.store_key,
        }
    }
}

/// Store diagnostics included when the probe reached the database.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    /// Whether the probe query completed.
    pub query_success: bool,
    /// Number of reachable session rows.
    pub session_count: u64,
}

/// Error details carried by unhealthy results.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthErrorDetail {
    /// Store error code, surfaced verbatim.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// Body of the `/healthcheck` response. Degraded health travels in the body
/// with HTTP 200, so monitoring can tell a failed check from a broken one.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    /// Overall verdict.
    pub status: HealthState,
    /// When the probe ran.
    pub timestamp: String,
    /// Configuration presence flags.
    pub environment: EnvironmentFlags,
    /// Store diagnostics, when the probe reached the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
    /// Failure details, when the probe did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HealthErrorDetail>,
}

impl HealthCheckResult {
    /// Result for a reachable store.
    pub fn healthy(environment: EnvironmentFlags, session_count: u64) -> Self {
        Self {
            status: HealthState::Healthy,
            timestamp: format_system_time(SystemTime::now()),
            environment,
            database: Some(DatabaseHealth {
                query_success: true,
                session_count,
            }),
            error: None,
        }
    }

    /// Result for a configured but unreachable or failing store.
    pub fn unhealthy(
        environment: EnvironmentFlags,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: HealthState::Unhealthy,
            timestamp: format_system_time(SystemTime::now()),
            environment,
            database: None,
            error: Some(HealthErrorDetail {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    /// Result for missing configuration; emitted before any network call.
    pub fn misconfigured(environment: EnvironmentFlags) -> Self {
        Self {
            status: HealthState::Misconfigured,
            timestamp: format_system_time(SystemTime::now()),
            environment,
            database: None,
            error: Some(HealthErrorDetail {
                code: "misconfigured".into(),
                message: "required configuration values are missing or placeholders".into(),
            }),
        }
    }
}
