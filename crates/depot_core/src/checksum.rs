//! Checksum algorithms, sidecar files and `{algorithm}digest` declarations.

use crate::error::{DepotError, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fmt;

/// Checksum algorithms with sidecar files next to the content they describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    /// SHA-1, sidecar extension `.sha1`.
    Sha1,
    /// MD5, sidecar extension `.md5`.
    Md5,
}

impl ChecksumAlgorithm {
    /// Order in which freshness checks consult the algorithms.
    pub const FRESHNESS_ORDER: [ChecksumAlgorithm; 2] = [ChecksumAlgorithm::Sha1, ChecksumAlgorithm::Md5];

    /// Algorithm name as used in checksum maps (`sha-1`, `md5`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha-1",
            Self::Md5 => "md5",
        }
    }

    /// Sidecar file extension including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sha1 => ".sha1",
            Self::Md5 => ".md5",
        }
    }

    /// Looks up an algorithm by its checksum-map name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha-1" | "sha1" => Some(Self::Sha1),
            "md5" => Some(Self::Md5),
            _ => None,
        }
    }

    /// Detects a sidecar file name, returning the algorithm and the described file name.
    ///
    /// ```
    /// use depot_core::ChecksumAlgorithm;
    ///
    /// let (algorithm, target) = ChecksumAlgorithm::from_sidecar("maven-metadata.xml.sha1").unwrap();
    /// assert_eq!(algorithm, ChecksumAlgorithm::Sha1);
    /// assert_eq!(target, "maven-metadata.xml");
    /// ```
    pub fn from_sidecar(file_name: &str) -> Option<(Self, &str)> {
        Self::FRESHNESS_ORDER.iter().find_map(|algorithm| {
            file_name
                .strip_suffix(algorithm.extension())
                .filter(|target| !target.is_empty())
                .map(|target| (*algorithm, target))
        })
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a `{algorithm}digest` declaration into its name and digest.
///
/// The digest is kept exactly as supplied, including embedded whitespace.
///
/// ```
/// use depot_core::parse_checksum_declaration;
///
/// let (name, digest) = parse_checksum_declaration("{sha-1}ba79baeb 9f10896a").unwrap();
/// assert_eq!(name, "sha-1");
/// assert_eq!(digest, "ba79baeb 9f10896a");
/// ```
pub fn parse_checksum_declaration(declaration: &str) -> Result<(String, String)> {
    let invalid = || DepotError::InvalidChecksum(declaration.to_string());

    let rest = declaration.strip_prefix('{').ok_or_else(invalid)?;
    let (algorithm, digest) = rest.split_once('}').ok_or_else(invalid)?;
    if algorithm.trim().is_empty() || algorithm.contains('{') || digest.trim().is_empty() {
        return Err(invalid());
    }
    Ok((algorithm.to_string(), digest.to_string()))
}

/// Renders a checksum map back into declarations, sorted by algorithm name.
pub fn format_checksum_declarations(checksums: &BTreeMap<String, String>) -> Vec<String> {
    checksums
        .iter()
        .map(|(algorithm, digest)| format!("{{{}}}{}", algorithm, digest))
        .collect()
}

/// Extracts the digest from the body of a sidecar file.
///
/// Sidecars hold the hex digest, optionally followed by a file name.
pub fn parse_sidecar(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    text.split_whitespace()
        .next()
        .filter(|token| token.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|token| token.to_ascii_lowercase())
}

/// Computes every supported digest over streamed content.
#[derive(Clone, Default)]
pub struct ContentDigests {
    sha1: Sha1,
    md5: Md5,
}

impl ContentDigests {
    /// Fresh hashers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.sha1.update(chunk);
        self.md5.update(chunk);
    }

    /// Finishes hashing, returning lowercase hex digests per algorithm.
    pub fn finish(self) -> BTreeMap<ChecksumAlgorithm, String> {
        let mut digests = BTreeMap::new();
        digests.insert(ChecksumAlgorithm::Sha1, hex::encode(self.sha1.finalize()));
        digests.insert(ChecksumAlgorithm::Md5, hex::encode(self.md5.finalize()));
        digests
    }
}
