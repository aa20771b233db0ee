//! # relay-core
//!
//! Membership tracking and fan-out routing for the notification relay.
//!
//! - [`Relay`]: process-wide connection registry, group membership index and
//!   area directory, mutated atomically under one lock
//! - [`Dispatcher`]: resolves user, vendor and area notifications to
//!   connections and hands each a [`Delivery`] through a [`Transport`]
//!
//! Nothing here knows about sockets or HTTP; adapters implement
//! [`Transport`] and translate their wire messages into [`Relay`] calls.

#![deny(unsafe_code)]

pub mod directory;
pub mod dispatch;
pub mod group;
pub mod ids;
pub mod membership;
pub mod registry;
pub mod relay;
pub mod transport;

pub use dispatch::{AreaDispatch, DispatchReport, Dispatcher};
pub use group::{GroupKey, GroupKind};
pub use ids::{AreaCode, ConnectionId, UserId, VendorId};
pub use relay::{Disconnected, Relay, RelayStats};
pub use transport::{Delivery, Transport};
