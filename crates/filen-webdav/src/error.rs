//! Mapping from core errors to WebDAV/HTTP errors.

use dav_server::fs::FsError;
use filen_core::api::ApiError;
use filen_core::drive::DriveError;
use filen_core::transfer::TransferError;
use thiserror::Error;

/// Errors raised by the WebDAV front-end itself (server lifecycle, config).
#[derive(Debug, Error)]
pub enum WebDavError {
    #[error("server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts a drive error to a dav-server `FsError`.
///
/// Takes ownership to work with `.map_err()`.
#[allow(clippy::needless_pass_by_value)]
pub fn drive_error_to_fs_error(e: DriveError) -> FsError {
    match &e {
        DriveError::NotFound { .. } => FsError::NotFound,
        DriveError::WrongKind { .. } => FsError::Forbidden,
        DriveError::Api(api) => api_error_to_fs_error(api),
        DriveError::UndecryptableMetadata | DriveError::BadFileKey { .. } => FsError::Forbidden,
        _ => FsError::GeneralFailure,
    }
}

/// Converts a transfer error to a dav-server `FsError`.
#[allow(clippy::needless_pass_by_value)]
pub fn transfer_error_to_fs_error(e: TransferError) -> FsError {
    match &e {
        TransferError::Api(api) => api_error_to_fs_error(api),
        TransferError::Drive(_) => FsError::NotFound,
        TransferError::BadFileKey { .. } => FsError::Forbidden,
        _ => FsError::GeneralFailure,
    }
}

fn api_error_to_fs_error(e: &ApiError) -> FsError {
    match e {
        ApiError::Conflict { .. } => FsError::Exists,
        ApiError::NotAuthenticated => FsError::Forbidden,
        _ => FsError::GeneralFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_not_found() {
        let e = DriveError::NotFound {
            partial: "/a".into(),
        };
        assert!(matches!(drive_error_to_fs_error(e), FsError::NotFound));
    }

    #[test]
    fn conflict_maps_to_exists() {
        let e = DriveError::Api(ApiError::Conflict {
            message: "exists".into(),
        });
        assert!(matches!(drive_error_to_fs_error(e), FsError::Exists));
    }
}
