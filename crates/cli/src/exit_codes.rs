//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad args, missing config, value over limit) |
//! | 3    | Sales report could not be read or parsed                 |
//! | 4    | Machine table unavailable                                |
//! | 5    | Machine table rejected the write, or a row is malformed  |
//! | 6    | Machine table changed while the command ran              |
//! | 7    | No machine at the given location                         |
//! | 8    | Duplicate machine or invalid location                    |
//! | 9    | Invalid reconciliation config                            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` / `store_exit_code`

use vendstock_recon::{ReconError, StoreError};

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable config file, value over the
/// configured limit.
pub const EXIT_USAGE: u8 = 2;

/// Sales report cannot be read, or is missing required columns.
pub const EXIT_PARSE: u8 = 3;

/// Machine table file missing or unreadable/unwritable.
pub const EXIT_STORE_UNAVAILABLE: u8 = 4;

/// Write rejected (empty/duplicate location) or stored row malformed.
pub const EXIT_STORE_REJECTED: u8 = 5;

/// Optimistic version check failed at commit.
pub const EXIT_STORE_CONFLICT: u8 = 6;

pub const EXIT_UNKNOWN_MACHINE: u8 = 7;

/// `add` with a location that already exists, or an empty location.
pub const EXIT_DUPLICATE_MACHINE: u8 = 8;

/// Recon config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 9;

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Unavailable(_) => EXIT_STORE_UNAVAILABLE,
        StoreError::Rejected(_) | StoreError::Malformed { .. } => EXIT_STORE_REJECTED,
        StoreError::Conflict { .. } => EXIT_STORE_CONFLICT,
    }
}

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::Parse(_) => EXIT_PARSE,
        ReconError::Reconciliation(store) => store_exit_code(store),
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::UnknownMachine(_) => EXIT_UNKNOWN_MACHINE,
        ReconError::DuplicateMachine(_) | ReconError::InvalidLocation(_) => EXIT_DUPLICATE_MACHINE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendstock_recon::ParseError;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_PARSE,
            EXIT_STORE_UNAVAILABLE,
            EXIT_STORE_REJECTED,
            EXIT_STORE_CONFLICT,
            EXIT_UNKNOWN_MACHINE,
            EXIT_DUPLICATE_MACHINE,
            EXIT_INVALID_CONFIG,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn store_errors_inside_recon_errors_keep_their_code() {
        let conflict = ReconError::Reconciliation(StoreError::Conflict {
            expected: "a".into(),
            found: "b".into(),
        });
        assert_eq!(recon_exit_code(&conflict), EXIT_STORE_CONFLICT);

        let parse = ReconError::Parse(ParseError::Unreadable("bad quote".into()));
        assert_eq!(recon_exit_code(&parse), EXIT_PARSE);
    }
}
