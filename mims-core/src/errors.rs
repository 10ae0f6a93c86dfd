//! # Errors
//!
//! Two layers of structured errors:
//! - [`CapabilityError`] is raised by the namespace guard when an operation
//!   needs an Enterprise capability the cluster does not have.
//! - [`MimsError`] is the general status-carrying error used at every other
//!   boundary (lifecycle verification, GraphQL failures, connectivity).
//!
//! Both live inside `anyhow::Error` and are recovered with
//! [`MimsError::normalize`] at the HTTP boundary, which renders the shared
//! `{error, message, details}` payload.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Value};

use crate::capabilities::TenancyMode;

pub const SUGGESTION_UPGRADE: &str =
    "Upgrade to Dgraph Enterprise Edition to enable namespace support";
pub const SUGGESTION_VERIFY_CONFIG: &str =
    "Verify the namespace isolation configuration of your Dgraph Enterprise cluster";
pub const SUGGESTION_ENTERPRISE: &str =
    "Upgrade to Dgraph Enterprise Edition or enable an Enterprise trial license";

/// Capability violations raised by the namespace guard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("Operation '{operation}' requires Dgraph Enterprise features (current mode: {current_mode})")]
    EnterpriseFeatureNotAvailable {
        operation: String,
        current_mode: TenancyMode,
        suggestion: String,
    },

    #[error("Operation '{operation}' requires namespace support, which is not available (current mode: {current_mode})")]
    NamespaceNotSupported {
        operation: String,
        namespace: Option<String>,
        current_mode: TenancyMode,
        suggestion: String,
    },
}

impl CapabilityError {
    pub fn namespace_not_supported(
        operation: impl Into<String>,
        namespace: Option<&str>,
        enterprise_detected: bool,
    ) -> Self {
        let (current_mode, suggestion) = if enterprise_detected {
            (TenancyMode::EnterpriseSingleTenant, SUGGESTION_VERIFY_CONFIG)
        } else {
            (TenancyMode::OssSingleTenant, SUGGESTION_UPGRADE)
        };
        Self::NamespaceNotSupported {
            operation: operation.into(),
            namespace: namespace.map(str::to_string),
            current_mode,
            suggestion: suggestion.to_string(),
        }
    }

    pub fn enterprise_not_available(operation: impl Into<String>, current_mode: TenancyMode) -> Self {
        Self::EnterpriseFeatureNotAvailable {
            operation: operation.into(),
            current_mode,
            suggestion: SUGGESTION_ENTERPRISE.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CapabilityError::EnterpriseFeatureNotAvailable { .. } => "ENTERPRISE_FEATURE_NOT_AVAILABLE",
            CapabilityError::NamespaceNotSupported { .. } => "NAMESPACE_NOT_SUPPORTED",
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            CapabilityError::EnterpriseFeatureNotAvailable { operation, .. }
            | CapabilityError::NamespaceNotSupported { operation, .. } => operation,
        }
    }

    pub fn current_mode(&self) -> TenancyMode {
        match self {
            CapabilityError::EnterpriseFeatureNotAvailable { current_mode, .. }
            | CapabilityError::NamespaceNotSupported { current_mode, .. } => *current_mode,
        }
    }

    pub fn suggestion(&self) -> &str {
        match self {
            CapabilityError::EnterpriseFeatureNotAvailable { suggestion, .. }
            | CapabilityError::NamespaceNotSupported { suggestion, .. } => suggestion,
        }
    }

    pub fn details(&self) -> Value {
        let mut details = json!({
            "operation": self.operation(),
            "currentMode": self.current_mode().as_str(),
            "suggestion": self.suggestion(),
        });
        match self {
            CapabilityError::NamespaceNotSupported { namespace, .. } => {
                details["namespace"] = json!(namespace);
                details["requiredFeature"] = json!("namespaces");
            }
            CapabilityError::EnterpriseFeatureNotAvailable { .. } => {
                details["requiredFeature"] = json!("enterprise");
            }
        }
        details
    }
}

/// HTTP-flavoured error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,         // 400
    NotFound,           // 404
    Unprocessable,      // 422
    GeneralError,       // 500
    BadGateway,         // 502
    Unavailable,        // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::BadGateway => 502,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Default machine code for errors that do not set their own.
    pub fn default_code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Unprocessable => "UNPROCESSABLE",
            ErrorKind::GeneralError => "GENERAL_ERROR",
            ErrorKind::BadGateway => "BAD_GATEWAY",
            ErrorKind::Unavailable => "UNAVAILABLE",
        }
    }
}

/// A structured MIMS-Graph error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct MimsError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub source: Option<AnyError>,
}

impl MimsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code(),
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn status(&self) -> u16 {
        self.kind.status_code()
    }

    /// Convert into `anyhow::Error`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Recover a structured error from anything in the anyhow chain:
    /// - a `MimsError` is kept as is
    /// - a `CapabilityError` becomes a 400 carrying its code and details
    /// - anything else is wrapped as `GeneralError`
    pub fn normalize(err: AnyError) -> MimsError {
        if let Some(cap) = err.chain().find_map(|e| e.downcast_ref::<CapabilityError>()) {
            return MimsError::from(cap.clone());
        }
        match err.downcast::<MimsError>() {
            Ok(mims) => mims,
            Err(other) => MimsError::general_error(other.to_string()).with_source(other),
        }
    }

    /// Copy suitable for clients: the inner `source` is dropped.
    pub fn sanitize_for_client(&self) -> MimsError {
        MimsError {
            kind: self.kind,
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            source: None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": self.code,
            "message": self.message,
            "details": self.details.clone().unwrap_or_else(|| json!({})),
        })
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadGateway, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
}

impl From<CapabilityError> for MimsError {
    fn from(err: CapabilityError) -> Self {
        MimsError::bad_request(err.to_string())
            .with_code(err.code())
            .with_details(err.details())
    }
}

impl fmt::Display for MimsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status(), self.message)
    }
}

impl std::error::Error for MimsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
