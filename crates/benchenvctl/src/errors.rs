//! Exit status for benchenvctl

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code after SIGINT (128 + 2)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Map an error chain to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<benchenv_common::Error>()
        .map(benchenv_common::Error::exit_code)
        .unwrap_or(EXIT_GENERAL_ERROR)
}
