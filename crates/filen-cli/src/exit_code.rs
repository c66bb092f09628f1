//! Exit codes for the CLI.
//!
//! Scripting contract: 0 is success, anything else is failure. The values
//! above 1 add detail for automation that wants it.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Authentication failed or credentials missing
pub const AUTH_FAILED: u8 = 3;

/// Remote path or entity not found
pub const NOT_FOUND: u8 = 4;

/// Network or server failure after retries
pub const NETWORK_ERROR: u8 = 5;

/// Batch finished but some tasks failed (state kept for resume)
pub const PARTIAL_FAILURE: u8 = 6;
