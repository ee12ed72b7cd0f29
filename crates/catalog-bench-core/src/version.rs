//! Version string lookup from a bundled properties resource.
//!
//! The resource is a `key=value` file; the binary reports the `cli.version`
//! entry through `--version`.

use std::collections::BTreeMap;

use thiserror::Error;

/// Key holding the version in the properties resource.
pub const VERSION_KEY: &str = "cli.version";

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Version resource has no '{0}' entry")]
    MissingKey(String),
}

/// Parse `key=value` (or `key: value`) lines. Blank lines and lines starting
/// with `#` or `!` are ignored; later keys win.
pub fn parse_properties(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(|c| c == '=' || c == ':')?;
            let key = line[..split].trim();
            let value = line[split + 1..].trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Version lines to report, read from properties text.
pub fn version_strings(contents: &str) -> Result<Vec<String>, VersionError> {
    parse_properties(contents)
        .remove(VERSION_KEY)
        .map(|v| vec![v])
        .ok_or_else(|| VersionError::MissingKey(VERSION_KEY.to_string()))
}
