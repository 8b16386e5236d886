//! Per-operation bearer-token gate.
//!
//! The gate holds an immutable snapshot of which operation kinds require a
//! credential and the set of accepted tokens. It is consulted by the HTTP
//! handlers before any store call; the object store knows nothing about it.

use crate::models::operation::OperationKind;
use axum::http::{HeaderMap, header};
use serde::Serialize;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Which operation kinds require authentication. Every kind has an entry.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct AuthRequirements(BTreeMap<OperationKind, bool>);

impl AuthRequirements {
    /// Nothing requires a credential.
    pub fn open() -> Self {
        Self(OperationKind::ALL.into_iter().map(|kind| (kind, false)).collect())
    }

    pub fn requiring(kinds: impl IntoIterator<Item = OperationKind>) -> Self {
        let mut reqs = Self::open();
        for kind in kinds {
            reqs.0.insert(kind, true);
        }
        reqs
    }

    pub fn is_required(&self, kind: OperationKind) -> bool {
        self.0.get(&kind).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperationKind, bool)> + '_ {
        self.0.iter().map(|(kind, required)| (*kind, *required))
    }
}

impl Default for AuthRequirements {
    fn default() -> Self {
        Self::open()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("No Authorization header provided")]
    MissingHeader,
    #[error("Authorization header is not a bearer token")]
    NotBearer,
    #[error("Authorization header token is invalid")]
    InvalidToken,
}

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    requirements: AuthRequirements,
    keys: Vec<String>,
}

impl AccessGate {
    /// Empty keys are dropped; they would otherwise match `Bearer ` with no token.
    pub fn new(requirements: AuthRequirements, keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            requirements,
            keys: keys.into_iter().filter(|key| !key.is_empty()).collect(),
        }
    }

    pub fn requirements(&self) -> &AuthRequirements {
        &self.requirements
    }

    pub fn is_required(&self, kind: OperationKind) -> bool {
        self.requirements.is_required(kind)
    }

    pub fn is_valid(&self, credential: &str) -> bool {
        let candidate = credential.as_bytes();
        // Check every key so timing does not reveal which one matched.
        self.keys.iter().fold(false, |matched, key| {
            matched | bool::from(key.as_bytes().ct_eq(candidate))
        })
    }

    /// Decide whether a request carrying `headers` may perform `kind`.
    pub fn authorize(&self, kind: OperationKind, headers: &HeaderMap) -> Result<(), AccessDenied> {
        if !self.is_required(kind) {
            return Ok(());
        }

        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AccessDenied::MissingHeader)?;
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AccessDenied::NotBearer)?;

        if self.is_valid(token) {
            Ok(())
        } else {
            Err(AccessDenied::InvalidToken)
        }
    }
}
