use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// GET /api/v1/analytics/sales
///
/// Window defaults to the trailing 30 days.
pub async fn sales_report(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let end = query.end.unwrap_or_else(Utc::now);
    let start = query.start.unwrap_or(end - Duration::days(30));
    if start >= end {
        return Err(ServiceError::BadRequest(
            "start must be before end".to_string(),
        ));
    }
    let report = state.services.analytics.sales_report(start, end).await?;
    Ok(Json(report))
}
