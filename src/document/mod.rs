//! The YAML job description consumed by the reduction pipeline.
//!
//! Layout:
//!
//! ```yaml
//! bias:
//!   calibration: bias.fits
//! dark:
//!   calibration: dark.fits
//!   rawfiles: [d1.fits, d2.fits]
//!   additional:
//!     B: bias.fits
//! disp:
//!   calibration: disp.fits
//!   rawfiles: [arc1.fits]
//!   reference: ref_arc.fits
//!   additional:
//!     B: bias.fits
//!     C: true
//! object:
//!   frames: [obj1.fits, obj2.fits]
//!   result: result.fits
//!   additional:
//!     B: bias.fits
//!     D: dark.fits
//! ```
//!
//! `additional` maps a calibration code to the resolved product of that
//! step, or to `true` for flag kinds (cosmics, summation).
//!
//! Older files write `null` (or an empty string) for paths the user never
//! chose. Those read back as "not set".

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::domain::{CalibrationKind, FormError};

mod convert;

pub use convert::{flatten, restore, validate};

/// Resolved value of a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Flag(bool),
    Path(PathBuf),
    /// `null` or an empty path: selected, but nothing to point at.
    Missing,
}

impl Resolved {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Resolved::Path(p) => Some(p),
            Resolved::Flag(_) | Resolved::Missing => None,
        }
    }
}

impl Serialize for Resolved {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Resolved::Flag(on) => serializer.serialize_bool(*on),
            Resolved::Path(path) => path.serialize(serializer),
            Resolved::Missing => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for Resolved {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResolvedVisitor;

        impl<'de> Visitor<'de> for ResolvedVisitor {
            type Value = Resolved;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a file path, `true`/`false` or null")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Resolved::Flag(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v.is_empty() {
                    Ok(Resolved::Missing)
                } else {
                    Ok(Resolved::Path(PathBuf::from(v)))
                }
            }

            // Bare numbers are file names too.
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Resolved::Path(PathBuf::from(v.to_string())))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Resolved::Path(PathBuf::from(v.to_string())))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Resolved::Missing)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Resolved::Missing)
            }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_any(self)
            }
        }

        deserializer.deserialize_any(ResolvedVisitor)
    }
}

/// Read an optional path, treating `null` and `''` alike as absent.
fn optional_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PathBuf>, D::Error> {
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.as_os_str().is_empty()))
}

/// Dependency map as written in the document.
pub type Additional = BTreeMap<CalibrationKind, Resolved>;

/// One calibration step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepEntry {
    /// Source file (from-file) or product path (raw processing).
    #[serde(default, deserialize_with = "optional_path")]
    pub calibration: Option<PathBuf>,
    /// Present only when the step is derived from raw frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rawfiles: Option<Vec<PathBuf>>,
    #[serde(
        default,
        deserialize_with = "optional_path",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: Additional,
}

impl StepEntry {
    /// A from-file entry.
    pub fn from_file(calibration: impl Into<PathBuf>) -> Self {
        Self {
            calibration: Some(calibration.into()),
            ..Self::default()
        }
    }

    /// Placeholder written for a step the user left empty.
    pub fn is_blank(&self) -> bool {
        self.calibration.is_none()
            && self.rawfiles.is_none()
            && self.reference.is_none()
            && self.additional.is_empty()
    }
}

/// Legacy `{calibration: true}` entry for flag kinds.
///
/// Accepted on load, never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEntry {
    #[serde(default)]
    pub calibration: bool,
}

/// Object frames and their calibrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectEntry {
    pub frames: Vec<PathBuf>,
    pub result: PathBuf,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: Additional,
}

/// The whole document. Fields are declared in dependency order so the
/// written file reads top to bottom in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<StepEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark: Option<StepEntry>,
    #[serde(default, skip_serializing)]
    pub cosmics: Option<FlagEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corr: Option<StepEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat: Option<StepEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disp: Option<StepEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<StepEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sky: Option<StepEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<StepEntry>,
    #[serde(default, skip_serializing)]
    pub summation: Option<FlagEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectEntry>,
}

impl Document {
    /// Entry for `kind`. Blank placeholder entries count as absent.
    pub fn step(&self, kind: CalibrationKind) -> Option<&StepEntry> {
        let entry = match kind {
            CalibrationKind::Bias => self.bias.as_ref(),
            CalibrationKind::Dark => self.dark.as_ref(),
            CalibrationKind::Geometry => self.corr.as_ref(),
            CalibrationKind::Flat => self.flat.as_ref(),
            CalibrationKind::Wavelength => self.disp.as_ref(),
            CalibrationKind::Distortion => self.dist.as_ref(),
            CalibrationKind::Sky => self.sky.as_ref(),
            CalibrationKind::Standard => self.standard.as_ref(),
            CalibrationKind::Cosmics | CalibrationKind::Summation => None,
        };
        entry.filter(|e| !e.is_blank())
    }

    /// Product path of `kind` as written in this document.
    pub fn product(&self, kind: CalibrationKind) -> Option<&Path> {
        self.step(kind).and_then(|e| e.calibration.as_deref())
    }

    /// Flags requested through legacy top-level entries.
    pub fn legacy_flags(&self) -> impl Iterator<Item = CalibrationKind> + '_ {
        [
            (CalibrationKind::Cosmics, &self.cosmics),
            (CalibrationKind::Summation, &self.summation),
        ]
        .into_iter()
        .filter(|(_, entry)| matches!(entry, Some(FlagEntry { calibration: true })))
        .map(|(kind, _)| kind)
    }

    fn slot_mut(&mut self, kind: CalibrationKind) -> Option<&mut Option<StepEntry>> {
        match kind {
            CalibrationKind::Bias => Some(&mut self.bias),
            CalibrationKind::Dark => Some(&mut self.dark),
            CalibrationKind::Geometry => Some(&mut self.corr),
            CalibrationKind::Flat => Some(&mut self.flat),
            CalibrationKind::Wavelength => Some(&mut self.disp),
            CalibrationKind::Distortion => Some(&mut self.dist),
            CalibrationKind::Sky => Some(&mut self.sky),
            CalibrationKind::Standard => Some(&mut self.standard),
            CalibrationKind::Cosmics | CalibrationKind::Summation => None,
        }
    }

    pub fn set_step(&mut self, kind: CalibrationKind, entry: StepEntry) -> Result<(), FormError> {
        let slot = self.slot_mut(kind).ok_or(FormError::NotConfigurable(kind))?;
        *slot = Some(entry);
        Ok(())
    }

    /// Configured steps in dependency order.
    pub fn steps(&self) -> impl Iterator<Item = (CalibrationKind, &StepEntry)> {
        CalibrationKind::CONFIGURABLE
            .into_iter()
            .filter_map(|kind| self.step(kind).map(|entry| (kind, entry)))
    }

    pub fn is_empty(&self) -> bool {
        self.steps().next().is_none() && self.object.is_none()
    }
}

/// Errors raised while flattening, restoring or validating a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error("{0}: raw processing selected but no raw files given")]
    MissingRawInputs(&'static str),

    #[error("{0}: no output path given")]
    MissingOutput(&'static str),

    #[error("{0}: object frames selected but no frames given")]
    MissingFrames(&'static str),

    #[error("{step}: depends on {dependency}, which has no calibration file yet")]
    UnresolvedDependency {
        step: &'static str,
        dependency: CalibrationKind,
    },

    #[error("{step}: entry for {dependency} must be `true`")]
    ExpectedFlag {
        step: &'static str,
        dependency: CalibrationKind,
    },

    #[error("{step}: entry for {dependency} must be a file path")]
    ExpectedPath {
        step: &'static str,
        dependency: CalibrationKind,
    },

    #[error(
        "{step}: {dependency} resolves to '{}' but the {dependency} step produces '{}'",
        .found.display(),
        .expected.display()
    )]
    StaleDependency {
        step: &'static str,
        dependency: CalibrationKind,
        expected: PathBuf,
        found: PathBuf,
    },

    #[error("{0}: reference exposure given without raw processing")]
    OrphanReference(&'static str),
}
