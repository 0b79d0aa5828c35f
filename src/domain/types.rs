//! Calibration kinds and the fixed dependency order.
//!
//! Every step of the reduction recipe is identified by a `CalibrationKind`.
//! Kinds carry three names:
//!
//! - a single-letter code used in dependency maps (`B`, `D`, ...)
//! - the top-level key used in the YAML document (`bias`, `corr`, ...)
//! - a human-readable label for the form
//!
//! The enum variants are declared in dependency order, so the derived `Ord`
//! is the order in which steps must be produced.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::FormError;

/// A set of dependency codes, kept in dependency order.
pub type Dependencies = BTreeSet<CalibrationKind>;

/// One step of the reduction recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalibrationKind {
    Bias,
    Dark,
    Cosmics,
    Geometry,
    Flat,
    Wavelength,
    Distortion,
    Sky,
    Standard,
    Summation,
}

use CalibrationKind::*;

impl CalibrationKind {
    /// All kinds in dependency order.
    pub const ALL: [CalibrationKind; 10] = [
        Bias, Dark, Cosmics, Geometry, Flat, Wavelength, Distortion, Sky, Standard, Summation,
    ];

    /// Kinds that have their own entry in the form and the document.
    pub const CONFIGURABLE: [CalibrationKind; 8] =
        [Bias, Dark, Geometry, Flat, Wavelength, Distortion, Sky, Standard];

    /// Calibrations that may be applied to object frames.
    pub const OBJECT_DEPENDENCIES: &'static [CalibrationKind] = &[
        Bias, Dark, Cosmics, Geometry, Flat, Wavelength, Distortion, Sky, Standard, Summation,
    ];

    pub fn code(self) -> char {
        match self {
            Bias => 'B',
            Dark => 'D',
            Cosmics => 'C',
            Geometry => 'X',
            Flat => 'F',
            Wavelength => 'W',
            Distortion => 'Y',
            Sky => 'S',
            Standard => 'T',
            Summation => 'A',
        }
    }

    /// The code as a one-letter string (map keys in the document).
    pub fn code_str(self) -> &'static str {
        match self {
            Bias => "B",
            Dark => "D",
            Cosmics => "C",
            Geometry => "X",
            Flat => "F",
            Wavelength => "W",
            Distortion => "Y",
            Sky => "S",
            Standard => "T",
            Summation => "A",
        }
    }

    pub fn from_code(code: char) -> Result<Self, FormError> {
        Self::ALL
            .into_iter()
            .find(|k| k.code() == code.to_ascii_uppercase())
            .ok_or(FormError::UnknownCode(code))
    }

    /// Top-level key of this step in the YAML document.
    pub fn document_key(self) -> &'static str {
        match self {
            Bias => "bias",
            Dark => "dark",
            Cosmics => "cosmics",
            Geometry => "corr",
            Flat => "flat",
            Wavelength => "disp",
            Distortion => "dist",
            Sky => "sky",
            Standard => "standard",
            Summation => "summation",
        }
    }

    pub fn from_document_key(key: &str) -> Result<Self, FormError> {
        Self::ALL
            .into_iter()
            .find(|k| k.document_key() == key)
            .ok_or_else(|| FormError::UnknownKey(key.to_string()))
    }

    /// Accept either a one-letter code or a document key.
    pub fn parse(text: &str) -> Result<Self, FormError> {
        let text = text.trim();
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_code(c),
            _ => Self::from_document_key(&text.to_ascii_lowercase()),
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Bias => "Bias",
            Dark => "Dark",
            Cosmics => "Cosmics",
            Geometry => "X-correction",
            Flat => "Flat",
            Wavelength => "Wavelengths",
            Distortion => "Y-correction",
            Sky => "Sky",
            Standard => "Standard",
            Summation => "Summation",
        }
    }

    /// Short lowercase label used on dependency checkboxes.
    pub fn short_label(self) -> &'static str {
        match self {
            Bias => "bias",
            Dark => "dark",
            Cosmics => "cosmics",
            Geometry => "geometry",
            Flat => "flat",
            Wavelength => "wavelengths",
            Distortion => "distortion",
            Sky => "sky",
            Standard => "standard",
            Summation => "summation",
        }
    }

    /// Flag kinds are requested by a boolean and never configured on their own.
    pub fn is_flag(self) -> bool {
        matches!(self, Cosmics | Summation)
    }

    /// Calibrations that may be applied while processing raw frames of this kind.
    ///
    /// Every entry sits strictly earlier in the dependency order.
    pub fn allowed_dependencies(self) -> &'static [CalibrationKind] {
        match self {
            Bias | Cosmics | Summation => &[],
            Dark => &[Bias],
            Geometry => &[Bias, Dark, Cosmics],
            Flat => &[Bias, Geometry],
            Wavelength => &[Bias, Dark, Cosmics, Flat],
            Distortion => &[Bias, Dark, Cosmics, Flat, Wavelength],
            Sky => &[Bias, Dark, Cosmics, Geometry, Flat, Wavelength, Distortion],
            Standard => &[Bias, Dark, Cosmics, Geometry, Flat, Wavelength, Distortion, Sky],
        }
    }

    /// Only the wavelength solution takes a reference exposure.
    pub fn accepts_reference(self) -> bool {
        self == Wavelength
    }
}

impl fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.document_key())
    }
}

// In dependency maps kinds are keyed by their one-letter code.
impl Serialize for CalibrationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code_str())
    }
}

impl<'de> Deserialize<'de> for CalibrationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = CalibrationKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a one-letter calibration code")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => CalibrationKind::from_code(c).map_err(E::custom),
                    _ => Err(E::custom(format!("invalid calibration code '{v}'"))),
                }
            }

            fn visit_char<E: de::Error>(self, v: char) -> Result<Self::Value, E> {
                CalibrationKind::from_code(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CodeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_point_backwards() {
        for kind in CalibrationKind::ALL {
            for dep in kind.allowed_dependencies() {
                assert!(dep < &kind, "{kind} depends on later kind {dep}");
            }
        }
    }

    #[test]
    fn flags_have_no_dependencies() {
        for kind in CalibrationKind::ALL.into_iter().filter(|k| k.is_flag()) {
            assert!(kind.allowed_dependencies().is_empty());
            assert!(!CalibrationKind::CONFIGURABLE.contains(&kind));
        }
    }

    #[test]
    fn codes_and_keys_are_unique() {
        for a in CalibrationKind::ALL {
            assert_eq!(CalibrationKind::from_code(a.code()).unwrap(), a);
            assert_eq!(CalibrationKind::from_document_key(a.document_key()).unwrap(), a);
            assert_eq!(a.code_str().chars().next(), Some(a.code()));
        }
    }

    #[test]
    fn parse_accepts_codes_and_keys() {
        assert_eq!(CalibrationKind::parse("w").unwrap(), Wavelength);
        assert_eq!(CalibrationKind::parse("Corr").unwrap(), Geometry);
        assert_eq!(
            CalibrationKind::parse("flats"),
            Err(FormError::UnknownKey("flats".to_string()))
        );
        assert_eq!(CalibrationKind::parse("Q"), Err(FormError::UnknownCode('Q')));
    }

    #[test]
    fn flat_and_wavelength_graph() {
        assert_eq!(Flat.allowed_dependencies(), &[Bias, Geometry]);
        assert!(Wavelength.allowed_dependencies().contains(&Cosmics));
        assert!(!Wavelength.allowed_dependencies().contains(&Geometry));
        assert!(Wavelength.accepts_reference());
        assert!(!Flat.accepts_reference());
    }
}
