//! Compiled-in build metadata, logged once at daemon startup.
//!
//! Populated at compile time the way `hooteconf`'s infrastructure layer
//! supplies compiled defaults — no vendored build-info crate, just
//! `env!`/`option_env!` against values `build.rs`/Cargo set.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub revision: &'static str,
    pub branch: &'static str,
    pub build_date: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            revision: match option_env!("FLEET_BUILD_REVISION") {
                Some(r) => r,
                None => "unknown",
            },
            branch: match option_env!("FLEET_BUILD_BRANCH") {
                Some(b) => b,
                None => "unknown",
            },
            build_date: match option_env!("FLEET_BUILD_DATE") {
                Some(d) => d,
                None => "unknown",
            },
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}
