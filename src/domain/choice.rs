//! Per-step choices and the complete form state.
//!
//! A step keeps the fields of both modes alive while the user toggles
//! between them; only the active mode contributes to the document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::{CalibrationKind, Dependencies, FormError};

/// Dependency paths that point outside the form, keyed by the kind they stand for.
pub type ExternalPaths = BTreeMap<CalibrationKind, PathBuf>;

/// How a calibration product is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Use an already-produced calibration file.
    #[default]
    FromFile,
    /// Derive the product from raw exposures plus earlier calibrations.
    ProcessRaw,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::FromFile => Mode::ProcessRaw,
            Mode::ProcessRaw => Mode::FromFile,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Mode::FromFile => "From file",
            Mode::ProcessRaw => "Process calibration",
        }
    }
}

/// The user's choice for one configurable calibration kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationChoice {
    kind: CalibrationKind,
    pub mode: Mode,
    /// Processed calibration (from-file mode).
    pub file: Option<PathBuf>,
    /// Raw exposures (raw mode).
    pub raw_inputs: Vec<PathBuf>,
    /// Product written by raw processing.
    pub output: Option<PathBuf>,
    dependencies: Dependencies,
    external: ExternalPaths,
    reference: Option<PathBuf>,
}

impl CalibrationChoice {
    pub fn new(kind: CalibrationKind) -> Result<Self, FormError> {
        if kind.is_flag() {
            return Err(FormError::NotConfigurable(kind));
        }
        Ok(Self::empty(kind))
    }

    fn empty(kind: CalibrationKind) -> Self {
        Self {
            kind,
            mode: Mode::default(),
            file: None,
            raw_inputs: Vec::new(),
            output: None,
            dependencies: Dependencies::new(),
            external: ExternalPaths::new(),
            reference: None,
        }
    }

    /// A from-file choice pointing at `path`.
    pub fn from_file(kind: CalibrationKind, path: impl Into<PathBuf>) -> Result<Self, FormError> {
        let mut choice = Self::new(kind)?;
        choice.file = Some(path.into());
        Ok(choice)
    }

    /// A raw-processing choice with the given inputs, output and dependencies.
    pub fn process_raw(
        kind: CalibrationKind,
        raw_inputs: Vec<PathBuf>,
        output: impl Into<PathBuf>,
        dependencies: &[CalibrationKind],
    ) -> Result<Self, FormError> {
        let mut choice = Self::new(kind)?;
        choice.mode = Mode::ProcessRaw;
        choice.raw_inputs = raw_inputs;
        choice.output = Some(output.into());
        for &dep in dependencies {
            choice.add_dependency(dep)?;
        }
        Ok(choice)
    }

    pub fn kind(&self) -> CalibrationKind {
        self.kind
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, dependency: CalibrationKind) -> Result<(), FormError> {
        check_dependency(self.kind.document_key(), self.kind.allowed_dependencies(), dependency)?;
        self.dependencies.insert(dependency);
        Ok(())
    }

    /// Select `dependency` and remember a file for it that the form itself
    /// does not produce.
    pub fn add_external_dependency(
        &mut self,
        dependency: CalibrationKind,
        path: impl Into<PathBuf>,
    ) -> Result<(), FormError> {
        self.add_dependency(dependency)?;
        self.external.insert(dependency, path.into());
        Ok(())
    }

    pub fn external_paths(&self) -> &ExternalPaths {
        &self.external
    }

    /// Flip a dependency checkbox. Returns whether it is now selected.
    pub fn toggle_dependency(&mut self, dependency: CalibrationKind) -> Result<bool, FormError> {
        if self.dependencies.remove(&dependency) {
            self.external.remove(&dependency);
            return Ok(false);
        }
        self.add_dependency(dependency)?;
        Ok(true)
    }

    pub fn reference(&self) -> Option<&Path> {
        self.reference.as_deref()
    }

    pub fn set_reference(&mut self, reference: Option<PathBuf>) -> Result<(), FormError> {
        if reference.is_some() && !self.kind.accepts_reference() {
            return Err(FormError::ReferenceNotAllowed(self.kind));
        }
        self.reference = reference;
        Ok(())
    }

    /// Path other steps see when they depend on this one.
    pub fn resolved_path(&self) -> Option<&Path> {
        match self.mode {
            Mode::FromFile => self.file.as_deref(),
            Mode::ProcessRaw => self.output.as_deref(),
        }
    }

    /// Whether the active mode carries anything worth writing out.
    pub fn is_configured(&self) -> bool {
        match self.mode {
            Mode::FromFile => self.file.is_some(),
            Mode::ProcessRaw => {
                !self.raw_inputs.is_empty() || self.output.is_some() || !self.dependencies.is_empty()
            }
        }
    }
}

/// Object frames and the calibrations applied to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFrames {
    pub frames: Vec<PathBuf>,
    pub result: Option<PathBuf>,
    dependencies: Dependencies,
    external: ExternalPaths,
}

impl ObjectFrames {
    pub fn new(frames: Vec<PathBuf>, result: Option<PathBuf>) -> Self {
        Self {
            frames,
            result,
            ..Self::default()
        }
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, dependency: CalibrationKind) -> Result<(), FormError> {
        check_dependency("object", CalibrationKind::OBJECT_DEPENDENCIES, dependency)?;
        self.dependencies.insert(dependency);
        Ok(())
    }

    pub fn add_external_dependency(
        &mut self,
        dependency: CalibrationKind,
        path: impl Into<PathBuf>,
    ) -> Result<(), FormError> {
        self.add_dependency(dependency)?;
        self.external.insert(dependency, path.into());
        Ok(())
    }

    pub fn external_paths(&self) -> &ExternalPaths {
        &self.external
    }

    pub fn toggle_dependency(&mut self, dependency: CalibrationKind) -> Result<bool, FormError> {
        if self.dependencies.remove(&dependency) {
            self.external.remove(&dependency);
            return Ok(false);
        }
        self.add_dependency(dependency)?;
        Ok(true)
    }

    /// Same rule as a raw-processing step: any frame, result or ticked
    /// dependency makes the entry count.
    pub fn is_configured(&self) -> bool {
        !self.frames.is_empty() || self.result.is_some() || !self.dependencies.is_empty()
    }
}

fn check_dependency(
    step: &'static str,
    allowed: &[CalibrationKind],
    dependency: CalibrationKind,
) -> Result<(), FormError> {
    if allowed.contains(&dependency) {
        Ok(())
    } else {
        Err(FormError::DependencyNotAllowed {
            kind: step,
            dependency,
        })
    }
}

/// Complete state of the reduction form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    steps: BTreeMap<CalibrationKind, CalibrationChoice>,
    pub object: ObjectFrames,
    /// Where the document is written; `None` means the default file name.
    pub save_path: Option<PathBuf>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// An empty form: every step in from-file mode with nothing chosen.
    pub fn new() -> Self {
        let steps = CalibrationKind::CONFIGURABLE
            .into_iter()
            .map(|kind| (kind, CalibrationChoice::empty(kind)))
            .collect();
        Self {
            steps,
            object: ObjectFrames::default(),
            save_path: None,
        }
    }

    pub fn step(&self, kind: CalibrationKind) -> Result<&CalibrationChoice, FormError> {
        self.steps.get(&kind).ok_or(FormError::NotConfigurable(kind))
    }

    pub fn step_mut(&mut self, kind: CalibrationKind) -> Result<&mut CalibrationChoice, FormError> {
        self.steps.get_mut(&kind).ok_or(FormError::NotConfigurable(kind))
    }

    /// Replace a step wholesale (used when restoring a document).
    pub fn set_step(&mut self, choice: CalibrationChoice) {
        self.steps.insert(choice.kind(), choice);
    }

    /// Steps in dependency order.
    pub fn steps(&self) -> impl Iterator<Item = &CalibrationChoice> {
        self.steps.values()
    }

    /// Path that a dependency on `kind` resolves to right now.
    ///
    /// The form's own step wins; `external` is consulted only when that
    /// step has no file. Flag kinds never resolve to a path.
    pub fn resolved_path<'a>(&'a self, kind: CalibrationKind, external: &'a ExternalPaths) -> Option<&'a Path> {
        self.steps
            .get(&kind)
            .and_then(|c| c.resolved_path())
            .or_else(|| external.get(&kind).map(PathBuf::as_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CalibrationKind::*;

    #[test]
    fn flags_are_not_configurable() {
        assert_eq!(CalibrationChoice::new(Cosmics), Err(FormError::NotConfigurable(Cosmics)));
        let form = Form::new();
        assert!(form.step(Summation).is_err());
        assert_eq!(form.steps().count(), CalibrationKind::CONFIGURABLE.len());
    }

    #[test]
    fn toggling_dependencies_respects_the_graph() {
        let mut dark = CalibrationChoice::new(Dark).unwrap();
        assert_eq!(dark.toggle_dependency(Bias), Ok(true));
        assert_eq!(dark.toggle_dependency(Bias), Ok(false));
        assert!(dark.dependencies().is_empty());

        let err = dark.toggle_dependency(Flat).unwrap_err();
        assert_eq!(
            err,
            FormError::DependencyNotAllowed {
                kind: "dark",
                dependency: Flat
            }
        );
    }

    #[test]
    fn object_accepts_flags() {
        let mut object = ObjectFrames::default();
        object.add_dependency(Cosmics).unwrap();
        object.add_dependency(Summation).unwrap();
        object.add_dependency(Standard).unwrap();
        assert_eq!(object.dependencies().len(), 3);
    }

    #[test]
    fn resolved_path_follows_mode() {
        let mut flat = CalibrationChoice::from_file(Flat, "flat.fits").unwrap();
        flat.output = Some(PathBuf::from("flat_out.fits"));
        assert_eq!(flat.resolved_path(), Some(Path::new("flat.fits")));

        flat.set_mode(flat.mode.toggled());
        assert_eq!(flat.resolved_path(), Some(Path::new("flat_out.fits")));
        // From-file path survives the toggle.
        assert_eq!(flat.file.as_deref(), Some(Path::new("flat.fits")));
    }

    #[test]
    fn reference_only_for_wavelength() {
        let mut disp = CalibrationChoice::new(Wavelength).unwrap();
        disp.set_reference(Some(PathBuf::from("arc.fits"))).unwrap();
        assert_eq!(disp.reference(), Some(Path::new("arc.fits")));

        let mut dark = CalibrationChoice::new(Dark).unwrap();
        assert_eq!(
            dark.set_reference(Some(PathBuf::from("arc.fits"))),
            Err(FormError::ReferenceNotAllowed(Dark))
        );
        assert_eq!(dark.set_reference(None), Ok(()));
    }

    #[test]
    fn external_paths_fill_in_for_empty_steps() {
        let mut form = Form::new();
        let mut dark = CalibrationChoice::process_raw(Dark, vec![PathBuf::from("d1.fits")], "dark.fits", &[])
            .unwrap();
        dark.add_external_dependency(Bias, "/archive/bias.fits").unwrap();
        let external = dark.external_paths().clone();
        form.set_step(dark);

        assert_eq!(form.resolved_path(Bias, &external), Some(Path::new("/archive/bias.fits")));

        form.set_step(CalibrationChoice::from_file(Bias, "bias.fits").unwrap());
        assert_eq!(form.resolved_path(Bias, &external), Some(Path::new("bias.fits")));

        let dark = form.step_mut(Dark).unwrap();
        assert_eq!(dark.toggle_dependency(Bias), Ok(false));
        assert!(dark.external_paths().is_empty());
    }

    #[test]
    fn object_with_only_dependencies_counts_as_configured() {
        let mut object = ObjectFrames::default();
        assert!(!object.is_configured());
        object.add_dependency(Bias).unwrap();
        assert!(object.is_configured());
    }

    #[test]
    fn configured_state() {
        let mut bias = CalibrationChoice::new(Bias).unwrap();
        assert!(!bias.is_configured());
        bias.set_mode(Mode::ProcessRaw);
        assert!(!bias.is_configured());
        bias.raw_inputs.push(PathBuf::from("b1.fits"));
        assert!(bias.is_configured());
    }
}
