//! `docsync version`.

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
    profile: &'static str,
    schema: i32,
}

impl VersionInfo {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            profile: if cfg!(debug_assertions) { "dev" } else { "release" },
            schema: CURRENT_SCHEMA_VERSION,
        }
    }
}

/// Print the binary version and the database schema it writes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let info = VersionInfo::current();

    if json {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!(
            "{} {} ({}, schema v{})",
            info.name, info.version, info.profile, info.schema
        );
    }
    Ok(())
}
