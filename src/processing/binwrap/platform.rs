//! Host platform detection and OS/architecture alias matching.
//!
//! Canonical names are Rust's `std::env::consts` values (`linux`, `macos`,
//! `windows`, `x86`, `x86_64`, `aarch64`). Asset tables in the wild use older
//! spellings (`win32`, `darwin`, `386`, `x64`, `amd64`, `arm64`), so every
//! comparison goes through the alias tables below in both directions.

use std::fmt;
use lazy_static::lazy_static;

/// Groups of OS names that refer to the same operating system.
const OS_ALIASES: &[&[&str]] = &[
    &["windows", "win32"],
    &["macos", "darwin"],
];

/// Groups of architecture names that refer to the same architecture.
const ARCH_ALIASES: &[&[&str]] = &[
    &["x86", "386", "i386", "i686", "ia32"],
    &["x86_64", "amd64", "x64"],
    &["aarch64", "arm64"],
];

lazy_static! {
    static ref HOST: Platform = Platform::new(std::env::consts::OS, std::env::consts::ARCH);
}

/// An operating system / architecture pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system (linux, macos, windows, ...)
    pub os: String,
    /// Architecture (x86, x86_64, aarch64, ...)
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process is running on.
    pub fn current() -> &'static Platform {
        &HOST
    }

    /// True if a candidate OS tag names this platform's OS (directly or via alias).
    pub fn os_matches(&self, tag: &str) -> bool {
        names_match(OS_ALIASES, &self.os, tag)
    }

    /// True if a candidate architecture tag names this platform's architecture.
    pub fn arch_matches(&self, tag: &str) -> bool {
        names_match(ARCH_ALIASES, &self.arch, tag)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn names_match(table: &[&[&str]], value: &str, tag: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    if value.eq_ignore_ascii_case(tag) {
        return true;
    }
    table.iter().any(|group| {
        group.iter().any(|n| n.eq_ignore_ascii_case(value))
            && group.iter().any(|n| n.eq_ignore_ascii_case(tag))
    })
}
