//! The CRC-verified, optionally gzip-compressed `.apo` binary snapshot
//! format.

mod format;
mod serializer;

pub use serializer::{dump, load, MapLoader};

/// Preferred file extension for a dumped snapshot. Compressed variants
/// are detected by gzip magic, not by extension.
pub const PREFERRED_FILE_EXT: &str = "apo";
