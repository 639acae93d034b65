//! Candidate binaries and platform-ranked selection.

use bytes::Bytes;
use tracing::debug;
use crate::utils::{ToolError, ToolResult};
use super::platform::Platform;

/// One candidate executable image, optionally tied to an OS and architecture.
///
/// Empty tags are wildcards. Sources are immutable once built; cloning is
/// cheap because the bytes are reference counted.
#[derive(Debug, Clone)]
pub struct BinarySource {
    bin: Bytes,
    os: String,
    arch: String,
}

impl BinarySource {
    pub fn new(bin: impl Into<Bytes>) -> Self {
        Self {
            bin: bin.into(),
            os: String::new(),
            arch: String::new(),
        }
    }

    /// Wraps bytes compiled into the binary without copying them.
    pub fn from_static(bin: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(bin))
    }

    /// Ties the source to an OS (`linux`, `macos`/`darwin`, `windows`/`win32`).
    pub fn os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Ties the source to an architecture (`x86_64`/`x64`/`amd64`, `x86`/`386`, ...).
    pub fn arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bin
    }

    pub fn os_tag(&self) -> &str {
        &self.os
    }

    pub fn arch_tag(&self) -> &str {
        &self.arch
    }
}

/// Selection tiers, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    OsAndArch,
    OsOnly,
    ArchOnly,
    Wildcard,
}

impl Tier {
    const ORDER: [Tier; 4] = [Tier::OsAndArch, Tier::OsOnly, Tier::ArchOnly, Tier::Wildcard];

    fn accepts(&self, source: &BinarySource, platform: &Platform) -> bool {
        let os_any = source.os.is_empty();
        let arch_any = source.arch.is_empty();
        match self {
            Tier::OsAndArch => platform.os_matches(&source.os) && platform.arch_matches(&source.arch),
            Tier::OsOnly => platform.os_matches(&source.os) && arch_any,
            Tier::ArchOnly => os_any && platform.arch_matches(&source.arch),
            Tier::Wildcard => os_any && arch_any,
        }
    }
}

/// Picks the most specific source for `platform`.
///
/// Tiers are tried in order; inside a tier the first source in registration
/// order wins.
pub fn select<'a>(sources: &'a [BinarySource], platform: &Platform) -> Option<&'a BinarySource> {
    Tier::ORDER.iter().find_map(|tier| {
        sources.iter().find(|source| tier.accepts(source, platform)).inspect(|source| {
            debug!(
                "Selected {:?} binary source (os={:?}, arch={:?}, {} bytes) for {}",
                tier,
                source.os,
                source.arch,
                source.bin.len(),
                platform
            );
        })
    })
}

/// Ordered set of candidate binaries for one logical tool.
///
/// Read-only once built, so a single registry can back any number of runners
/// (wrap it in an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct BinaryRegistry {
    name: String,
    sources: Vec<BinarySource>,
}

impl BinaryRegistry {
    /// Creates an empty registry. `name` becomes the child's `argv[0]`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: BinarySource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn push(&mut self, source: BinarySource) {
        self.sources.push(source);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &[BinarySource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Resolves the source for `platform`.
    ///
    /// An empty registry is a configuration error; a registry with no fitting
    /// candidate is an unsupported-platform error.
    pub fn resolve(&self, platform: &Platform) -> ToolResult<&BinarySource> {
        if self.sources.is_empty() {
            return Err(ToolError::config(format!(
                "need at least one binary source to run {}",
                self.name
            )));
        }

        select(&self.sources, platform)
            .ok_or_else(|| ToolError::unsupported_platform(&platform.os, &platform.arch))
    }

    /// Resolves the source for the host this process runs on.
    pub fn resolve_current(&self) -> ToolResult<&BinarySource> {
        self.resolve(Platform::current())
    }
}
