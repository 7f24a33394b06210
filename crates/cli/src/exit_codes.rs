//! CLI Exit Code Registry
//!
//! Single source of truth for `tuition` exit codes. Scripts rely on them.
//!
//! | Range   | Domain     | Description                               |
//! |---------|------------|-------------------------------------------|
//! | 0       | Universal  | Success                                   |
//! | 1       | Universal  | General error (unspecified)               |
//! | 2       | Universal  | Usage error (bad args, bad rules file)    |
//! | 3-9     | data       | File I/O, parse, open billing errors      |
//! | 10-19   | ai         | AI provider/keychain codes                |
//! | 20-29   | store      | Unit store codes                          |

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid rules file, unsupported extension.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Data (3-9)
// =============================================================================

/// File could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Spreadsheet could not be parsed.
pub const EXIT_PARSE: u8 = 4;

/// `report --fail-on-errors` found unresolved billing errors.
pub const EXIT_OPEN_ERRORS: u8 = 5;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none).
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Keychain error (cannot read credentials).
pub const EXIT_AI_KEYCHAIN_ERR: u8 = 12;

/// Provider request failed (network, HTTP, unparsable answer).
pub const EXIT_AI_REQUEST: u8 = 13;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Cannot reach or read the store.
pub const EXIT_STORE_CONNECT: u8 = 20;

/// A write to the store failed.
pub const EXIT_STORE_WRITE: u8 = 21;

/// Store rejected credentials.
pub const EXIT_STORE_AUTH: u8 = 22;

/// Named unit or student does not exist.
pub const EXIT_NOT_FOUND: u8 = 23;
