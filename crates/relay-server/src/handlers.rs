//! Backend notification endpoints.
//!
//! Bodies are validated here; a request that fails to parse never reaches
//! the dispatcher.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;
use relay_core::{AreaCode, AreaDispatch, UserId, VendorId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::metrics::NOTIFICATIONS_TOTAL;
use crate::server::AppState;

/// Message returned when a vendor-targeted notification names an area with
/// no registered vendors.
pub const NO_VENDORS_IN_AREA: &str = "No vendors in this area";

/// `POST /notify-user` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyUserRequest {
    /// Target user.
    pub user_id: UserId,
    /// Event name relayed to the client.
    pub event: String,
    /// Payload relayed verbatim.
    #[serde(default)]
    pub data: Value,
}

/// `POST /notify-vendor` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyVendorRequest {
    /// Target vendor.
    pub vendor_id: VendorId,
    /// Event name relayed to the client.
    pub event: String,
    /// Payload relayed verbatim.
    #[serde(default)]
    pub data: Value,
}

/// `POST /notify-specific-vendors-in-area` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyVendorsInAreaRequest {
    /// Area to resolve vendors in.
    pub area_code: AreaCode,
    /// Vendors to reach.
    pub vendor_ids: Vec<VendorId>,
    /// Event name relayed to the client.
    pub event: String,
    /// Payload relayed verbatim.
    #[serde(default)]
    pub data: Value,
}

/// `POST /notify-area` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyAreaRequest {
    /// Target area.
    pub area_code: AreaCode,
    /// Event name relayed to the client.
    pub event: String,
    /// Payload relayed verbatim.
    #[serde(default)]
    pub data: Value,
}

/// Body of every notification response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    /// Whether the request was accepted.
    pub success: bool,
    /// Vendors or members reached, where the endpoint reports it.
    #[serde(rename = "sentTo", default, skip_serializing_if = "Option::is_none")]
    pub sent_to: Option<usize>,
    /// Reason for a negative outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NotifyResponse {
    /// `{success: true}`.
    pub fn accepted() -> Self {
        Self {
            success: true,
            sent_to: None,
            message: None,
        }
    }

    /// `{success: true, sentTo: n}`.
    pub fn sent_to(n: usize) -> Self {
        Self {
            sent_to: Some(n),
            ..Self::accepted()
        }
    }

    /// `{success: false, message}`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            sent_to: None,
            message: Some(message.into()),
        }
    }
}

/// A request the adapter refused before dispatching.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The body was not valid JSON or missed a required field.
    #[error("{message}")]
    InvalidBody {
        /// Status chosen by the extractor (400, 415 or 422).
        status: StatusCode,
        /// Extractor's explanation.
        message: String,
    },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidBody { status, message } => {
                debug!(%status, %message, "rejected notification request");
                (status, Json(NotifyResponse::failed(message))).into_response()
            }
        }
    }
}

/// POST /notify-user
pub async fn notify_user(
    State(state): State<AppState>,
    body: Result<Json<NotifyUserRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(req) = body?;
    counter!(NOTIFICATIONS_TOTAL, "kind" => "user").increment(1);
    let report = state.dispatcher.notify_user(&req.user_id, &req.event, req.data);
    info!(
        user_id = %req.user_id,
        event = %req.event,
        recipients = report.recipients,
        "notified user"
    );
    Ok(Json(NotifyResponse::accepted()))
}

/// POST /notify-vendor
pub async fn notify_vendor(
    State(state): State<AppState>,
    body: Result<Json<NotifyVendorRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(req) = body?;
    counter!(NOTIFICATIONS_TOTAL, "kind" => "vendor").increment(1);
    let report = state
        .dispatcher
        .notify_vendor(&req.vendor_id, &req.event, req.data);
    info!(
        vendor_id = %req.vendor_id,
        event = %req.event,
        recipients = report.recipients,
        "notified vendor"
    );
    Ok(Json(NotifyResponse::accepted()))
}

/// POST /notify-specific-vendors-in-area
pub async fn notify_vendors_in_area(
    State(state): State<AppState>,
    body: Result<Json<NotifyVendorsInAreaRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(req) = body?;
    counter!(NOTIFICATIONS_TOTAL, "kind" => "vendors_in_area").increment(1);
    let outcome = state.dispatcher.notify_vendors_in_area(
        &req.area_code,
        &req.vendor_ids,
        &req.event,
        req.data,
    );
    let resp = match outcome {
        AreaDispatch::UnknownArea => {
            info!(area = %req.area_code, event = %req.event, "no vendors in area");
            NotifyResponse::failed(NO_VENDORS_IN_AREA)
        }
        AreaDispatch::Delivered { sent_to, .. } => {
            info!(
                area = %req.area_code,
                event = %req.event,
                requested = req.vendor_ids.len(),
                sent_to,
                "notified vendors in area"
            );
            NotifyResponse::sent_to(sent_to)
        }
    };
    Ok(Json(resp))
}

/// POST /notify-area
pub async fn notify_area(
    State(state): State<AppState>,
    body: Result<Json<NotifyAreaRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(req) = body?;
    counter!(NOTIFICATIONS_TOTAL, "kind" => "area").increment(1);
    let report = state
        .dispatcher
        .notify_area(&req.area_code, &req.event, req.data);
    info!(
        area = %req.area_code,
        event = %req.event,
        recipients = report.recipients,
        "notified area"
    );
    Ok(Json(NotifyResponse::sent_to(report.recipients)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_serializes_bare() {
        let json = serde_json::to_string(&NotifyResponse::accepted()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn sent_to_uses_camel_case() {
        let json = serde_json::to_string(&NotifyResponse::sent_to(1)).unwrap();
        assert_eq!(json, r#"{"success":true,"sentTo":1}"#);
    }

    #[test]
    fn failure_carries_message() {
        let json = serde_json::to_value(NotifyResponse::failed(NO_VENDORS_IN_AREA)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "No vendors in this area");
        assert!(json.get("sentTo").is_none());
    }

    #[test]
    fn data_defaults_to_null() {
        let req: NotifyUserRequest =
            serde_json::from_str(r#"{"userId":"42","event":"ping"}"#).unwrap();
        assert_eq!(req.data, Value::Null);
        assert_eq!(req.user_id.as_str(), "42");
    }

    #[test]
    fn area_request_requires_vendor_ids() {
        let err = serde_json::from_str::<NotifyVendorsInAreaRequest>(
            r#"{"areaCode":"A1","event":"order"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("vendorIds"));
    }

    #[test]
    fn api_error_renders_failure_body() {
        let err = ApiError::InvalidBody {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "missing field `userId`".into(),
        };
        assert_eq!(err.to_string(), "missing field `userId`");
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
