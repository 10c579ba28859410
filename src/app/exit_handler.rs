//! Exit code logic for the rescue process.
//!
//! Single responsibility: map a fatal error to the process exit outcome.

use rescue_core::{
    AuditError, ConfigError, ReconcileError, SelectError, UploadError, source::SourceError,
};

use crate::ProcessExit;

/// Errors raised before any row starts are configuration errors; everything
/// else is a fatal runtime failure.
pub(crate) fn classify_error(err: &anyhow::Error) -> ProcessExit {
    if err.chain().any(is_configuration_error) {
        ProcessExit::Configuration
    } else {
        ProcessExit::Failure
    }
}

fn is_configuration_error(cause: &(dyn std::error::Error + 'static)) -> bool {
    if cause.is::<ConfigError>() || cause.is::<SelectError>() || cause.is::<SourceError>() {
        return true;
    }
    if let Some(error) = cause.downcast_ref::<UploadError>() {
        return matches!(error, UploadError::Configuration(_) | UploadError::Csv { .. });
    }
    if let Some(error) = cause.downcast_ref::<ReconcileError>() {
        return matches!(
            error,
            ReconcileError::Configuration(_)
                | ReconcileError::Credentials { .. }
                | ReconcileError::Csv { .. }
        );
    }
    if let Some(error) = cause.downcast_ref::<AuditError>() {
        return matches!(error, AuditError::MissingColumn { .. });
    }
    false
}
