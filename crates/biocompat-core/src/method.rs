//! Static registry of biometric back-ends

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BiometricError;

/// Logical sensor category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiometricType {
    Any,
    Fingerprint,
    Face,
    Iris,
}

impl BiometricType {
    /// Concrete categories (everything but `Any`)
    pub const CONCRETE: [BiometricType; 3] = [Self::Fingerprint, Self::Face, Self::Iris];

    /// Whether a method of category `other` satisfies a request for `self`
    pub fn matches(self, other: BiometricType) -> bool {
        self == BiometricType::Any || self == other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Fingerprint => "fingerprint",
            Self::Face => "face",
            Self::Iris => "iris",
        }
    }
}

impl fmt::Display for BiometricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiometricType {
    type Err = BiometricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Any, Self::Fingerprint, Self::Face, Self::Iris]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BiometricError::UnknownName {
                kind: "biometric type",
                name: s.to_string(),
            })
    }
}

/// API family a back-end belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiometricApi {
    /// Unified first, legacy as fallback
    Auto,
    /// Vendor and pre-unified platform APIs
    Legacy,
    /// The unified platform biometric API
    Unified,
}

impl BiometricApi {
    /// Whether a method of family `family` satisfies a request for `self`
    pub fn matches(self, family: BiometricApi) -> bool {
        self == BiometricApi::Auto || self == family
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Legacy => "legacy",
            Self::Unified => "unified",
        }
    }
}

impl fmt::Display for BiometricApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiometricApi {
    type Err = BiometricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Auto, Self::Legacy, Self::Unified]
            .into_iter()
            .find(|api| api.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BiometricError::UnknownName {
                kind: "biometric api",
                name: s.to_string(),
            })
    }
}

/// Descriptor row of the registry table
#[derive(Debug, Clone, Copy)]
struct Descriptor {
    id: i32,
    name: &'static str,
    kind: BiometricType,
    api: BiometricApi,
    priority: u16,
}

/// A known authentication back-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BiometricMethod {
    Dummy,
    FingerprintUnified,
    FaceUnified,
    IrisUnified,
    FingerprintLegacy,
    FingerprintSupport,
    FingerprintSamsung,
    FingerprintFlyme,
    FaceHuawei,
    FaceMiui,
    FaceSamsung,
    FaceOppo,
    FaceOnePlus,
    FaceVivo,
    FaceSoter,
    IrisSamsung,
}

impl BiometricMethod {
    const ALL: [BiometricMethod; 16] = [
        Self::Dummy,
        Self::FingerprintUnified,
        Self::FaceUnified,
        Self::IrisUnified,
        Self::FingerprintLegacy,
        Self::FingerprintSupport,
        Self::FingerprintSamsung,
        Self::FingerprintFlyme,
        Self::FaceHuawei,
        Self::FaceMiui,
        Self::FaceSamsung,
        Self::FaceOppo,
        Self::FaceOnePlus,
        Self::FaceVivo,
        Self::FaceSoter,
        Self::IrisSamsung,
    ];

    fn descriptor(self) -> Descriptor {
        use BiometricApi::{Legacy, Unified};
        use BiometricType::{Face, Fingerprint, Iris};

        let (id, name, kind, api, priority) = match self {
            Self::Dummy => (-1, "dummy", Fingerprint, Legacy, u16::MAX),
            Self::FingerprintUnified => (1, "fingerprint-unified", Fingerprint, Unified, 0),
            Self::FaceUnified => (2, "face-unified", Face, Unified, 1),
            Self::IrisUnified => (3, "iris-unified", Iris, Unified, 2),
            Self::FingerprintLegacy => (10, "fingerprint-legacy", Fingerprint, Legacy, 10),
            Self::FingerprintSupport => (11, "fingerprint-support", Fingerprint, Legacy, 11),
            Self::FingerprintSamsung => (12, "fingerprint-samsung", Fingerprint, Legacy, 12),
            Self::FingerprintFlyme => (13, "fingerprint-flyme", Fingerprint, Legacy, 13),
            Self::FaceHuawei => (20, "face-huawei", Face, Legacy, 20),
            Self::FaceMiui => (21, "face-miui", Face, Legacy, 21),
            Self::FaceSamsung => (22, "face-samsung", Face, Legacy, 22),
            Self::FaceOppo => (23, "face-oppo", Face, Legacy, 23),
            Self::FaceOnePlus => (24, "face-oneplus", Face, Legacy, 24),
            Self::FaceVivo => (25, "face-vivo", Face, Legacy, 25),
            Self::FaceSoter => (26, "face-soter", Face, Legacy, 26),
            Self::IrisSamsung => (30, "iris-samsung", Iris, Legacy, 30),
        };

        Descriptor {
            id,
            name,
            kind,
            api,
            priority,
        }
    }

    /// Every registered method, in declaration order
    pub fn all() -> &'static [BiometricMethod] {
        &Self::ALL
    }

    /// Look up a method by its numeric id
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.id() == id)
    }

    /// Look up a method by its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    pub fn id(self) -> i32 {
        self.descriptor().id
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn biometric_type(self) -> BiometricType {
        self.descriptor().kind
    }

    pub fn api(self) -> BiometricApi {
        self.descriptor().api
    }

    /// Selection priority; lower values are tried first
    pub fn priority(self) -> u16 {
        self.descriptor().priority
    }

    /// Sort key used when ordering candidates: unified back-ends first
    pub(crate) fn selection_key(self) -> (u8, u16, i32) {
        let family = match self.api() {
            BiometricApi::Unified => 0,
            _ => 1,
        };
        (family, self.priority(), self.id())
    }
}

impl fmt::Display for BiometricMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BiometricMethod {
    type Err = BiometricError;

    /// Accepts a method name or its numeric id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
            .or_else(|| s.parse().ok().and_then(Self::from_id))
            .ok_or_else(|| BiometricError::UnknownName {
                kind: "biometric method",
                name: s.to_string(),
            })
    }
}

/// What a caller asks to authenticate with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthRequest {
    pub api: BiometricApi,
    #[serde(rename = "type")]
    pub kind: BiometricType,
    /// Pin a specific back-end instead of automatic selection
    #[serde(default)]
    pub method: Option<BiometricMethod>,
}

impl Default for AuthRequest {
    fn default() -> Self {
        Self {
            api: BiometricApi::Auto,
            kind: BiometricType::Any,
            method: None,
        }
    }
}

impl AuthRequest {
    pub fn new(api: BiometricApi, kind: BiometricType) -> Self {
        Self {
            api,
            kind,
            method: None,
        }
    }

    /// Request pinned to one back-end
    pub fn pinned(method: BiometricMethod) -> Self {
        Self {
            api: method.api(),
            kind: method.biometric_type(),
            method: Some(method),
        }
    }

    /// Whether `method` is eligible for this request
    pub fn accepts(&self, method: BiometricMethod) -> bool {
        match self.method {
            Some(pinned) => pinned == method,
            None => self.kind.matches(method.biometric_type()) && self.api.matches(method.api()),
        }
    }
}

impl fmt::Display for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            Some(method) => write!(f, "{}/{} ({})", self.api, self.kind, method),
            None => write!(f, "{}/{}", self.api, self.kind),
        }
    }
}
