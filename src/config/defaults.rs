//! Default values for import limits and server settings

/// Largest accepted upload (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Room left for multipart framing and the team id field on top of the file ceiling
pub const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Ceiling for free-text fields without a field-specific limit
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1000;

/// Records committed per atomic write group
pub const DEFAULT_WRITE_GROUP_SIZE: usize = 500;

/// Keys allowed in one membership ("in") query against the roster store
pub const DEFAULT_MEMBERSHIP_QUERY_LIMIT: usize = 30;

/// Rows scanned for the header row in a workbook sheet
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;

pub const DEFAULT_PREFERRED_SHEET: &str = "operaciones";

pub const DEFAULT_COUNTRY: &str = "Argentina";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./realty-import.db";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 8080;
