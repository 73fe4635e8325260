//! Digital Twin Model Identifiers and the per-version validity rules.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};
use url::Url;

use crate::catalogs::DTMI_PREFIX;

/// Structural shape: `dtmi:<path>[;major[.minor]][#fragment]`.
static RE_DTMI_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^dtmi:([^;#]+)(?:;([0-9]+)(?:\.([0-9]+))?)?(?:#([^#]*))?$").unwrap()
});

/// DTDL v2 reference grammar: letter-led labels, major version only, no fragment.
static RE_DTMI_V2: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^dtmi:[A-Za-z](?:[A-Za-z0-9_]*[A-Za-z0-9])?(?::[A-Za-z](?:[A-Za-z0-9_]*[A-Za-z0-9])?)*(?:;[1-9][0-9]{0,8})?$",
    )
    .unwrap()
});

/// DTDL v3+ reference grammar: system labels, minor versions and fragments.
static RE_DTMI_V3: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^dtmi:(?:_+[A-Za-z0-9]|[A-Za-z])(?:[A-Za-z0-9_]*[A-Za-z0-9])?(?::(?:_+[A-Za-z0-9]|[A-Za-z])(?:[A-Za-z0-9_]*[A-Za-z0-9])?)*(?:;[1-9][0-9]{0,8}(?:\.(?:0|[1-9][0-9]{0,5}))?)?(?:#(?:_+[A-Za-z0-9]|[A-Za-z])(?:[A-Za-z0-9_]*[A-Za-z0-9])?)?$",
    )
    .unwrap()
});

const MAX_DTMI_LENGTH_V2: usize = 2048;
const MAX_DTMI_LENGTH_V3: usize = 4096;

// ---------------------------------------------------------------------------
// Dtmi
// ---------------------------------------------------------------------------

/// A structurally parsed DTMI. Major version 0 means unversioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dtmi {
    absolute: String,
    versionless: String,
    labels: Vec<String>,
    major_version: u32,
    minor_version: u32,
    fragment: Option<String>,
}

impl Dtmi {
    /// Structural decomposition only; per-version legality is
    /// [`IdentifierValidator::is_reference_valid`].
    pub fn parse(text: &str) -> Option<Self> {
        let caps = RE_DTMI_STRUCTURE.captures(text)?;
        let path = caps.get(1)?.as_str();
        let labels: Vec<String> = path.split(':').map(String::from).collect();
        if labels.iter().any(|l| l.is_empty()) {
            return None;
        }

        let major_version = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let minor_version = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };

        Some(Self {
            absolute: text.to_string(),
            versionless: format!("{DTMI_PREFIX}{path}"),
            labels,
            major_version,
            minor_version,
            fragment: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.absolute
    }

    /// The identifier without version suffix or fragment.
    pub fn versionless(&self) -> &str {
        &self.versionless
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn major_version(&self) -> u32 {
        self.major_version
    }

    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn is_versioned(&self) -> bool {
        self.major_version != 0
    }
}

impl fmt::Display for Dtmi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute)
    }
}

impl Serialize for Dtmi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.absolute)
    }
}

// ---------------------------------------------------------------------------
// Identifier (term value)
// ---------------------------------------------------------------------------

/// What a term resolves to: a DTMI, or any other absolute URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Dtmi(Dtmi),
    Uri(Url),
}

impl Identifier {
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Dtmi(dtmi) => dtmi.as_str(),
            Identifier::Uri(url) => url.as_str(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validator capability
// ---------------------------------------------------------------------------

/// Identifier syntax rules consumed by the resolver.
pub trait IdentifierValidator: Send + Sync {
    /// Structural parse (scheme, labels, version suffix, fragment).
    fn parse(&self, text: &str) -> Option<Dtmi>;

    /// Whether `text` is a legal identifier reference under `dtdl_version`.
    fn is_reference_valid(&self, text: &str, dtdl_version: u32) -> bool;
}

/// Built-in DTMI rules for DTDL versions 2 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct DtmiValidator;

impl IdentifierValidator for DtmiValidator {
    fn parse(&self, text: &str) -> Option<Dtmi> {
        Dtmi::parse(text)
    }

    fn is_reference_valid(&self, text: &str, dtdl_version: u32) -> bool {
        if dtdl_version <= 2 {
            text.len() <= MAX_DTMI_LENGTH_V2 && RE_DTMI_V2.is_match(text)
        } else {
            text.len() <= MAX_DTMI_LENGTH_V3 && RE_DTMI_V3.is_match(text)
        }
    }
}
