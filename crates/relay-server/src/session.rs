//! Applies inbound client frames to relay state.

use relay_core::{ConnectionId, Delivery, Relay};
use tracing::{debug, info, warn};

use crate::protocol::{self, ClientMessage};

/// Handle one inbound text frame from `conn`.
///
/// Returns the frame to send back, if any: an acknowledgment for user and
/// vendor joins, an error for frames that did not parse. Area joins and
/// leaves are silent.
pub fn handle_text(relay: &Relay, conn: &ConnectionId, text: &str) -> Option<Delivery> {
    match protocol::parse(text) {
        Ok(msg) => apply(relay, conn, &msg),
        Err(e) => {
            warn!(conn_id = %conn, error = %e, "rejected client frame");
            Some(protocol::error_frame(&e))
        }
    }
}

/// Apply a parsed message to `relay` on behalf of `conn`.
pub fn apply(relay: &Relay, conn: &ConnectionId, msg: &ClientMessage) -> Option<Delivery> {
    let group = msg.group();
    match msg {
        ClientMessage::JoinUser(_) | ClientMessage::JoinVendor(_) => {
            let added = relay.join(conn, &group);
            info!(conn_id = %conn, %group, added, "joined group");
            Some(protocol::ack(&group))
        }
        ClientMessage::JoinVendorArea(r) => {
            let displaced = relay.join_vendor_area(conn, &r.area_code, &r.vendor_id);
            if let Some(previous) = displaced.filter(|prev| prev != conn) {
                debug!(
                    conn_id = %conn,
                    previous = %previous,
                    area = %r.area_code,
                    vendor = %r.vendor_id,
                    "vendor session replaced in area"
                );
            }
            info!(conn_id = %conn, %group, vendor = %r.vendor_id, "vendor joined area");
            None
        }
        ClientMessage::LeaveUser(_) | ClientMessage::LeaveVendor(_) => {
            let removed = relay.leave(conn, &group);
            debug!(conn_id = %conn, %group, removed, "left group");
            None
        }
        ClientMessage::LeaveVendorArea(r) => {
            relay.leave_vendor_area(conn, &r.area_code, &r.vendor_id);
            debug!(conn_id = %conn, %group, vendor = %r.vendor_id, "vendor left area");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{GroupKey, VendorId};

    #[test]
    fn join_user_acks_and_joins() {
        let relay = Relay::new();
        let conn = relay.on_connect();
        let reply =
            handle_text(&relay, &conn, r#"{"event":"join_user","data":{"userId":"42"}}"#).unwrap();
        assert_eq!(reply.event(), "message");
        assert_eq!(reply.payload(), "You are in room user:42");
        assert_eq!(relay.members_of(&GroupKey::User("42".into())), vec![conn]);
    }

    #[test]
    fn repeated_join_still_acks() {
        let relay = Relay::new();
        let conn = relay.on_connect();
        let frame = r#"{"event":"join_vendor","data":{"vendorId":"v1"}}"#;
        assert!(handle_text(&relay, &conn, frame).is_some());
        assert!(handle_text(&relay, &conn, frame).is_some());
        assert_eq!(relay.members_of(&GroupKey::Vendor("v1".into())).len(), 1);
    }

    #[test]
    fn leave_is_silent() {
        let relay = Relay::new();
        let conn = relay.on_connect();
        let _ = handle_text(&relay, &conn, r#"{"event":"join_user","data":{"userId":"42"}}"#);
        let reply = handle_text(&relay, &conn, r#"{"event":"leave_user","data":{"userId":"42"}}"#);
        assert!(reply.is_none());
        assert!(relay.members_of(&GroupKey::User("42".into())).is_empty());
    }

    #[test]
    fn vendor_area_round_trip() {
        let relay = Relay::new();
        let conn = relay.on_connect();
        let join = r#"{"event":"join_vendor_area","data":{"vendorId":"v1","areaCode":"A1"}}"#;
        assert!(handle_text(&relay, &conn, join).is_none());
        assert_eq!(
            relay.lookup(&"A1".into(), &VendorId::from("v1")),
            Some(conn.clone())
        );

        let leave = r#"{"event":"leave_vendor_area","data":{"vendorId":"v1","areaCode":"A1"}}"#;
        assert!(handle_text(&relay, &conn, leave).is_none());
        assert_eq!(relay.lookup(&"A1".into(), &"v1".into()), None);
        assert!(relay.groups_of(&conn).is_empty());
    }

    #[test]
    fn area_join_sends_nothing_back() {
        let relay = Relay::new();
        let conn = relay.on_connect();
        let join = r#"{"event":"join_vendor_area","data":{"vendorId":"v1","areaCode":"A1"}}"#;
        assert!(handle_text(&relay, &conn, join).is_none());
        assert!(handle_text(&relay, &conn, join).is_none());
        assert_eq!(
            relay.members_of(&GroupKey::Area("A1".into())),
            vec![conn.clone()]
        );
    }

    #[test]
    fn malformed_frame_changes_nothing() {
        let relay = Relay::new();
        let conn = relay.on_connect();
        let reply = handle_text(&relay, &conn, r#"{"event":"join_user","data":{}}"#).unwrap();
        assert_eq!(reply.event(), "error");
        assert!(reply.payload()["message"].is_string());
        assert!(relay.groups_of(&conn).is_empty());
        assert_eq!(relay.stats().groups, 0);
    }
}
