//! Operation kinds, the unit of authorization granularity.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Every request the gateway serves (other than system endpoints) belongs
/// to exactly one of these kinds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    BucketList,
    ObjectList,
    ObjectRead,
    ObjectCreate,
    ObjectDelete,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::BucketList,
        OperationKind::ObjectList,
        OperationKind::ObjectRead,
        OperationKind::ObjectCreate,
        OperationKind::ObjectDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::BucketList => "BucketList",
            OperationKind::ObjectList => "ObjectList",
            OperationKind::ObjectRead => "ObjectRead",
            OperationKind::ObjectCreate => "ObjectCreate",
            OperationKind::ObjectDelete => "ObjectDelete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown operation kind `{0}`")]
pub struct UnknownOperationKind(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperationKind;

    /// Case-insensitive, so `objectcreate` and `ObjectCreate` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownOperationKind(s.to_string()))
    }
}
