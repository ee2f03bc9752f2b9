//! Supported audio format tables.

use std::path::Path;

use crate::model::extension_of;

/// File extensions treated as playable audio, lowercased with leading dot.
pub const SUPPORTED_EXTENSIONS: [&str; 35] = [
    ".mp3", ".mp2", ".mp1", ".ogg", ".oga", ".wav", ".aif", ".aiff", ".flac", ".fla", ".aac",
    ".m4a", ".m4b", ".mp4", ".wma", ".wv", ".ape", ".mac", ".mpc", ".mp+", ".mpp", ".ofr", ".ofs",
    ".tta", ".adx", ".aix", ".ac3", ".cda", ".mod", ".xm", ".it", ".s3m", ".mtm", ".umx", ".mo3",
];

/// The tracker-module subset. These carry patterns and instrument samples
/// instead of tagged audio, so metadata extraction reads module fields
/// (song name, message, author, instrument/sample names).
pub const TRACKER_EXTENSIONS: [&str; 7] = [".mod", ".xm", ".it", ".s3m", ".mtm", ".umx", ".mo3"];

/// True when `ext` (lowercased, leading dot) is a supported format.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

/// True when `ext` (lowercased, leading dot) is a tracker-module format.
pub fn is_tracker_extension(ext: &str) -> bool {
    TRACKER_EXTENSIONS
        .iter()
        .any(|tracker| ext.eq_ignore_ascii_case(tracker))
}

/// True when `path` has a supported audio extension, case-insensitively.
pub fn is_supported_file(path: &Path) -> bool {
    is_supported_extension(&extension_of(path))
}
