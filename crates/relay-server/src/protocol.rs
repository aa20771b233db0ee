//! Client wire protocol.
//!
//! Every text frame is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Inbound frames name a membership operation; outbound frames are either
//! acknowledgments, errors, or notifications relayed from a backend.

use relay_core::{AreaCode, Delivery, GroupKey, UserId, VendorId};
use serde::Deserialize;
use serde_json::json;

/// Event name of join acknowledgments.
pub const ACK_EVENT: &str = "message";
/// Event name of protocol errors.
pub const ERROR_EVENT: &str = "error";

/// `{userId}` payload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    /// Backend user id.
    pub user_id: UserId,
}

/// `{vendorId}` payload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRef {
    /// Backend vendor id.
    pub vendor_id: VendorId,
}

/// `{vendorId, areaCode}` payload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorAreaRef {
    /// Backend vendor id.
    pub vendor_id: VendorId,
    /// Area the vendor is serving.
    pub area_code: AreaCode,
}

/// A membership request from a client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to `user:<id>`.
    JoinUser(UserRef),
    /// Unsubscribe from `user:<id>`.
    LeaveUser(UserRef),
    /// Subscribe to `vendor:<id>`.
    JoinVendor(VendorRef),
    /// Unsubscribe from `vendor:<id>`.
    LeaveVendor(VendorRef),
    /// Subscribe to `area:<code>` and register as the vendor's session there.
    JoinVendorArea(VendorAreaRef),
    /// Undo [`ClientMessage::JoinVendorArea`].
    LeaveVendorArea(VendorAreaRef),
}

impl ClientMessage {
    /// Wire name of the message.
    pub fn event(&self) -> &'static str {
        match self {
            Self::JoinUser(_) => "join_user",
            Self::LeaveUser(_) => "leave_user",
            Self::JoinVendor(_) => "join_vendor",
            Self::LeaveVendor(_) => "leave_vendor",
            Self::JoinVendorArea(_) => "join_vendor_area",
            Self::LeaveVendorArea(_) => "leave_vendor_area",
        }
    }

    /// Group the message joins or leaves.
    pub fn group(&self) -> GroupKey {
        match self {
            Self::JoinUser(r) | Self::LeaveUser(r) => GroupKey::User(r.user_id.clone()),
            Self::JoinVendor(r) | Self::LeaveVendor(r) => GroupKey::Vendor(r.vendor_id.clone()),
            Self::JoinVendorArea(r) | Self::LeaveVendorArea(r) => {
                GroupKey::Area(r.area_code.clone())
            }
        }
    }
}

/// A client frame that could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Binary frames are not part of the protocol.
    #[error("binary frames are not supported")]
    Binary,
    /// The text was not a known message.
    #[error("invalid message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse one inbound text frame.
pub fn parse(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// `{"event":"message","data":"You are in room <group>"}`.
pub fn ack(group: &GroupKey) -> Delivery {
    Delivery::new(ACK_EVENT, json!(format!("You are in room {group}")))
}

/// `{"event":"error","data":{"message": ...}}`.
pub fn error_frame(err: &ProtocolError) -> Delivery {
    Delivery::new(ERROR_EVENT, json!({ "message": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_user() {
        let msg = parse(r#"{"event":"join_user","data":{"userId":"42"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinUser(UserRef {
                user_id: "42".into()
            })
        );
        assert_eq!(msg.group(), GroupKey::User("42".into()));
        assert_eq!(msg.event(), "join_user");
    }

    #[test]
    fn parses_numeric_ids() {
        let msg = parse(r#"{"event":"join_vendor","data":{"vendorId":17}}"#).unwrap();
        assert_eq!(msg.group(), GroupKey::Vendor("17".into()));
    }

    #[test]
    fn parses_vendor_area() {
        let msg =
            parse(r#"{"event":"leave_vendor_area","data":{"vendorId":"v1","areaCode":"A1"}}"#)
                .unwrap();
        let ClientMessage::LeaveVendorArea(r) = &msg else {
            panic!("expected leave_vendor_area, got {msg:?}");
        };
        assert_eq!(r.vendor_id.as_str(), "v1");
        assert_eq!(msg.group(), GroupKey::Area("A1".into()));
    }

    #[test]
    fn rejects_unknown_event() {
        let err = parse(r#"{"event":"join_galaxy","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn rejects_missing_field() {
        assert!(parse(r#"{"event":"join_vendor_area","data":{"vendorId":"v1"}}"#).is_err());
        assert!(parse(r#"{"event":"join_user"}"#).is_err());
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse("hello").is_err());
    }

    #[test]
    fn ack_names_the_room() {
        let frame = ack(&GroupKey::User("42".into())).encoded().unwrap();
        assert_eq!(
            frame.as_str(),
            r#"{"event":"message","data":"You are in room user:42"}"#
        );
    }

    #[test]
    fn error_frame_carries_message() {
        let frame = error_frame(&ProtocolError::Binary);
        assert_eq!(frame.event(), "error");
        assert_eq!(frame.payload()["message"], "binary frames are not supported");
    }
}
