//! Broadcast group keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{AreaCode, UserId, VendorId};

/// The kind of a broadcast group.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// All sessions of one user.
    User,
    /// All sessions of one vendor.
    Vendor,
    /// All vendor sessions currently active in an area.
    Area,
}

impl GroupKind {
    /// Lowercase label used in logs, metrics and room names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Vendor => "vendor",
            Self::Area => "area",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed identity of a broadcast group.
///
/// The kind is part of the key, so a user and a vendor that happen to share
/// an identifier never land in the same group.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum GroupKey {
    /// `user:<id>`
    User(UserId),
    /// `vendor:<id>`
    Vendor(VendorId),
    /// `area:<code>`
    Area(AreaCode),
}

impl GroupKey {
    /// Group kind.
    pub fn kind(&self) -> GroupKind {
        match self {
            Self::User(_) => GroupKind::User,
            Self::Vendor(_) => GroupKind::Vendor,
            Self::Area(_) => GroupKind::Area,
        }
    }

    /// Identifier within the kind.
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Vendor(id) => id.as_str(),
            Self::Area(code) => code.as_str(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

impl From<UserId> for GroupKey {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<VendorId> for GroupKey {
    fn from(id: VendorId) -> Self {
        Self::Vendor(id)
    }
}

impl From<AreaCode> for GroupKey {
    fn from(code: AreaCode) -> Self {
        Self::Area(code)
    }
}
