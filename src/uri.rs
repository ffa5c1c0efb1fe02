use std::path::Path;

pub const FILE_SCHEME: &str = "file://";

/// Filesystem path behind a plain path or a `file://` URI.
pub fn strip_file_scheme(input: &str) -> &str {
    input.strip_prefix(FILE_SCHEME).unwrap_or(input)
}

/// `file://` URI for a path, leaving strings that already carry the scheme alone.
pub fn to_file_uri(path: impl AsRef<Path>) -> String {
    let path = path.as_ref().to_string_lossy();
    if path.starts_with(FILE_SCHEME) {
        path.into_owned()
    } else {
        format!("{FILE_SCHEME}{path}")
    }
}
