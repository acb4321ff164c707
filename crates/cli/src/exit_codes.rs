//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad arguments, invalid condition, bad page) |
//! | 3    | IO error (files, database)                               |
//! | 4    | Parse error (CSV, JSON, settings)                        |
//! | 5    | Not found (saved filter id, empty result for preview)    |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown column, page 0.
pub const EXIT_USAGE: u8 = 2;

/// IO error - cannot read/write a file or open the database.
pub const EXIT_IO: u8 = 3;

/// Parse error - malformed CSV, JSON document or settings file.
pub const EXIT_PARSE: u8 = 4;

/// Not found - saved filter id does not exist.
pub const EXIT_NOT_FOUND: u8 = 5;
