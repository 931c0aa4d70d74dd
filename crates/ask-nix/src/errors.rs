//! Exit codes for ask-nix

use luminous_shared::{Intent, Response};

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when the operation ran and failed
pub const EXIT_FAILED: i32 = 1;

/// Exit code when the request was not understood
pub const EXIT_NOT_UNDERSTOOD: i32 = 64;

/// Exit code for an unreadable or malformed config file (sysexits EX_CONFIG)
pub const EXIT_CONFIG_ERROR: i32 = 78;

pub fn exit_code(intent: &Intent, response: &Response) -> i32 {
    if intent.is_unknown() {
        EXIT_NOT_UNDERSTOOD
    } else if response.success {
        EXIT_SUCCESS
    } else {
        EXIT_FAILED
    }
}
