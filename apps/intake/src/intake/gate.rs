use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::intake::policy::ValidationPolicy;
use crate::models::upload::CandidateFile;

/// Reasons the intake gate turns a file away. Both are recoverable: the
/// client may simply offer another file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("File size exceeds {limit} limit")]
    SizeExceeded { limit: String, size_bytes: u64 },

    #[error("File type not supported")]
    UnsupportedType { name: String, media_type: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
}

impl ValidationOutcome {
    pub fn of(file: &CandidateFile, policy: &ValidationPolicy) -> Self {
        match validate(file, policy) {
            Ok(_) => Self {
                accepted: true,
                reason: None,
            },
            Err(e) => Self {
                accepted: false,
                reason: Some(e.to_string()),
            },
        }
    }
}

/// Checks size first, then type. Returns the file untouched on acceptance.
pub fn validate<'a>(
    file: &'a CandidateFile,
    policy: &ValidationPolicy,
) -> Result<&'a CandidateFile, IntakeError> {
    let size_bytes = file.size_bytes();
    if size_bytes > policy.max_bytes {
        debug!(name = %file.name, size_bytes, max = policy.max_bytes, "file over size limit");
        return Err(IntakeError::SizeExceeded {
            limit: policy.limit_label(),
            size_bytes,
        });
    }

    if !policy.accepts_type(&file.name, &file.media_type) {
        debug!(name = %file.name, media_type = %file.media_type, "no matcher accepts file");
        return Err(IntakeError::UnsupportedType {
            name: file.name.clone(),
            media_type: file.media_type.clone(),
        });
    }

    Ok(file)
}
