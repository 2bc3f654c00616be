//! Process exit codes, using the sysexits.h numbers

pub const OK: i32 = 0;

/// Bad arguments or a missing command
pub const USAGE: i32 = 64;

/// Illegal tree operation or broken tree data
pub const DATAERR: i32 = 65;

/// Node or tree root not found
pub const NOINPUT: i32 = 66;

pub const SOFTWARE: i32 = 70;

/// Store file could not be read or written
pub const IOERR: i32 = 74;

/// Bad settings or tree column layout
pub const CONFIG: i32 = 78;
