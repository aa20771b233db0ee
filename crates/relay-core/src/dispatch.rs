//! Notification fan-out.
//!
//! Requests are resolved against a snapshot of [`Relay`] state and then
//! handed to the [`Transport`] one connection at a time. Delivery is
//! best-effort: a recipient that vanished after the snapshot is skipped
//! without error.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::group::GroupKey;
use crate::ids::{AreaCode, ConnectionId, UserId, VendorId};
use crate::relay::Relay;
use crate::transport::{Delivery, Transport};

/// Outcome of a fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Connections the request resolved to.
    pub recipients: usize,
    /// Deliveries the transport accepted.
    pub delivered: usize,
}

/// Outcome of a vendor-targeted area notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AreaDispatch {
    /// No vendor is currently registered in the area.
    UnknownArea,
    /// The area is known; `sent_to` requested vendors had a live session.
    Delivered {
        /// Requested vendors that were found in the area.
        sent_to: usize,
        /// Transport-level result.
        report: DispatchReport,
    },
}

/// Resolves notification requests to connections and delivers them.
pub struct Dispatcher {
    relay: Arc<Relay>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Create a dispatcher over shared relay state.
    pub fn new(relay: Arc<Relay>, transport: Arc<dyn Transport>) -> Self {
        Self { relay, transport }
    }

    /// Deliver to every session of `user`.
    pub fn notify_user(&self, user: &UserId, event: &str, payload: Value) -> DispatchReport {
        self.notify_group(&GroupKey::User(user.clone()), event, payload)
    }

    /// Deliver to every session of `vendor`.
    pub fn notify_vendor(&self, vendor: &VendorId, event: &str, payload: Value) -> DispatchReport {
        self.notify_group(&GroupKey::Vendor(vendor.clone()), event, payload)
    }

    /// Deliver to every member of `area:<area>`.
    pub fn notify_area(&self, area: &AreaCode, event: &str, payload: Value) -> DispatchReport {
        self.notify_group(&GroupKey::Area(area.clone()), event, payload)
    }

    /// Deliver to every current member of `group`, once per connection.
    pub fn notify_group(&self, group: &GroupKey, event: &str, payload: Value) -> DispatchReport {
        let members = self.relay.members_of(group);
        let delivery = Delivery::new(event, payload);
        let report = self.deliver_all(&members, &delivery);
        debug!(
            %group,
            event,
            recipients = report.recipients,
            delivered = report.delivered,
            "group notification"
        );
        report
    }

    /// Deliver directly to the named vendors' sessions in `area`.
    ///
    /// Vendors without a session in the area are skipped; a vendor named
    /// twice in the request is reached once.
    pub fn notify_vendors_in_area(
        &self,
        area: &AreaCode,
        vendors: &[VendorId],
        event: &str,
        payload: Value,
    ) -> AreaDispatch {
        let mut seen = HashSet::new();
        let requested: Vec<VendorId> = vendors
            .iter()
            .filter(|v| seen.insert(*v))
            .cloned()
            .collect();

        let Some(found) = self.relay.resolve_vendors(area, &requested) else {
            debug!(%area, event, "no vendors in area");
            return AreaDispatch::UnknownArea;
        };

        let delivery = Delivery::new(event, payload);
        let mut report = DispatchReport {
            recipients: found.len(),
            delivered: 0,
        };
        for (vendor, conn) in &found {
            if self.transport.send(conn, &delivery) {
                report.delivered += 1;
                debug!(%area, %vendor, conn_id = %conn, event, "sent to vendor in area");
            } else {
                warn!(%area, %vendor, conn_id = %conn, event, "delivery to vendor dropped");
            }
        }
        AreaDispatch::Delivered {
            sent_to: found.len(),
            report,
        }
    }

    fn deliver_all(&self, members: &[ConnectionId], delivery: &Delivery) -> DispatchReport {
        let mut report = DispatchReport {
            recipients: members.len(),
            delivered: 0,
        };
        for conn in members {
            if self.transport.send(conn, delivery) {
                report.delivered += 1;
            } else {
                warn!(conn_id = %conn, event = delivery.event(), "delivery dropped");
            }
        }
        report
    }
}
