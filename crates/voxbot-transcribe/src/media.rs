//! Content-type resolution for audio file names.

use std::path::Path;

/// Map a file name to a MIME type by its extension.
///
/// Unknown extensions resolve to `application/octet-stream`, which every
/// provider accepts as "sniff it yourself".
pub fn content_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
