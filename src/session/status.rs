//! Response status checking.

use tracing::{debug, error};

use crate::error::{AppError, Result};
use crate::llrp::LlrpStatus;

/// Decide whether a response reports success.
///
/// A missing status is a failure, never an implied success. Failures are
/// logged here; callers only propagate the error.
pub fn check_status(status: Option<&LlrpStatus>, context: &str) -> Result<()> {
    let Some(status) = status else {
        error!("{context} missing LLRP status");
        return Err(AppError::MissingStatus(context.to_string()));
    };

    if !status.is_success() {
        let description = status
            .description
            .clone()
            .unwrap_or_else(|| "no error description given".to_string());
        error!("{context} failed, {description} (status {})", status.code);
        return Err(AppError::Protocol {
            context: context.to_string(),
            description,
        });
    }

    debug!("{context} succeeded");
    Ok(())
}
