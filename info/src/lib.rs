//! Build metadata baked in at compile time.

/// The package version of the crate embedding this value.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The source revision, if `GLOSSARY_BACKEND_REVISION` was set at build time.
pub const REVISION: Option<&str> = option_env!("GLOSSARY_BACKEND_REVISION");

/// The build timestamp, if `GLOSSARY_BACKEND_BUILD_TIMESTAMP` was set at build time.
pub const BUILD_TIMESTAMP: Option<&str> = option_env!("GLOSSARY_BACKEND_BUILD_TIMESTAMP");

/// Formats the build metadata for a startup banner.
pub fn describe() -> String {
    format!(
        "{} (revision {}, built {})",
        VERSION,
        REVISION.unwrap_or("unknown"),
        BUILD_TIMESTAMP.unwrap_or("unknown")
    )
}
