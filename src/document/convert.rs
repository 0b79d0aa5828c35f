//! Conversion between the form state and the document.

use std::path::PathBuf;

use log::{debug, warn};

use crate::document::{Additional, Document, DocumentError, ObjectEntry, Resolved, StepEntry};
use crate::domain::{
    CalibrationChoice, CalibrationKind, Dependencies, ExternalPaths, Form, FormError, Mode, ObjectFrames,
};

const OBJECT_KEY: &str = "object";

/// Flatten the form into a document.
///
/// Steps with nothing chosen are left out. Every dependency is replaced by
/// the current product path of the step it names (or `true` for flags).
pub fn flatten(form: &Form) -> Result<Document, DocumentError> {
    let mut doc = Document::default();

    for choice in form.steps() {
        if !choice.is_configured() {
            continue;
        }
        let entry = flatten_step(form, choice)?;
        doc.set_step(choice.kind(), entry)?;
    }

    if form.object.is_configured() {
        doc.object = Some(flatten_object(form, &form.object)?);
    }

    debug!(
        "flattened form: {} step(s), object={}",
        doc.steps().count(),
        doc.object.is_some()
    );
    Ok(doc)
}

fn flatten_step(form: &Form, choice: &CalibrationChoice) -> Result<StepEntry, DocumentError> {
    let step = choice.kind().document_key();
    match choice.mode {
        Mode::FromFile => {
            let calibration = choice.file.clone().ok_or(DocumentError::MissingOutput(step))?;
            Ok(StepEntry::from_file(calibration))
        }
        Mode::ProcessRaw => {
            if choice.raw_inputs.is_empty() {
                return Err(DocumentError::MissingRawInputs(step));
            }
            let calibration = choice.output.clone().ok_or(DocumentError::MissingOutput(step))?;
            Ok(StepEntry {
                calibration: Some(calibration),
                rawfiles: Some(choice.raw_inputs.clone()),
                reference: choice.reference().map(|p| p.to_path_buf()),
                additional: resolve_dependencies(form, step, choice.dependencies(), choice.external_paths())?,
            })
        }
    }
}

fn flatten_object(form: &Form, object: &ObjectFrames) -> Result<ObjectEntry, DocumentError> {
    if object.frames.is_empty() {
        return Err(DocumentError::MissingFrames(OBJECT_KEY));
    }
    let result = object.result.clone().ok_or(DocumentError::MissingOutput(OBJECT_KEY))?;
    Ok(ObjectEntry {
        frames: object.frames.clone(),
        result,
        additional: resolve_dependencies(form, OBJECT_KEY, object.dependencies(), object.external_paths())?,
    })
}

fn resolve_dependencies(
    form: &Form,
    step: &'static str,
    deps: &Dependencies,
    external: &ExternalPaths,
) -> Result<Additional, DocumentError> {
    deps.iter()
        .map(|&dependency| {
            let value = if dependency.is_flag() {
                Resolved::Flag(true)
            } else {
                let path = form
                    .resolved_path(dependency, external)
                    .ok_or(DocumentError::UnresolvedDependency { step, dependency })?;
                Resolved::Path(path.to_path_buf())
            };
            Ok((dependency, value))
        })
        .collect()
}

/// Rebuild the form from a document.
///
/// Entries with `rawfiles` come back in raw-processing mode, the rest in
/// from-file mode. Blank entries (`calibration: null`) stay unconfigured.
/// Dependency selections are taken from the `additional` keys. Paths to
/// steps present in the document are recomputed on the next flatten; paths
/// to steps the document lacks are kept as external files.
pub fn restore(doc: &Document) -> Result<Form, DocumentError> {
    let mut form = Form::new();

    for (kind, entry) in doc.steps() {
        form.set_step(restore_step(doc, kind, entry)?);
    }

    if let Some(object) = &doc.object {
        let mut frames = ObjectFrames::new(object.frames.clone(), Some(object.result.clone()));
        for (&dependency, value) in &object.additional {
            match restore_dependency(doc, OBJECT_KEY, dependency, value)? {
                Restored::Skip => {}
                Restored::Selected => frames.add_dependency(dependency)?,
                Restored::External(path) => frames.add_external_dependency(dependency, path)?,
            }
        }
        form.object = frames;
    }

    for flag in doc.legacy_flags() {
        debug!("ignoring top-level {flag} entry; flags are applied per step");
    }

    debug!("restored form from document ({} step(s))", doc.steps().count());
    Ok(form)
}

fn restore_step(doc: &Document, kind: CalibrationKind, entry: &StepEntry) -> Result<CalibrationChoice, DocumentError> {
    let step = kind.document_key();
    let mut choice = CalibrationChoice::new(kind)?;

    let Some(rawfiles) = &entry.rawfiles else {
        if entry.reference.is_some() {
            return Err(DocumentError::OrphanReference(step));
        }
        if !entry.additional.is_empty() {
            warn!("{step}: ignoring dependencies on a from-file entry");
        }
        choice.file = entry.calibration.clone();
        return Ok(choice);
    };

    choice.set_mode(Mode::ProcessRaw);
    choice.raw_inputs = rawfiles.clone();
    choice.output = entry.calibration.clone();
    choice.set_reference(entry.reference.clone())?;
    for (&dependency, value) in &entry.additional {
        match restore_dependency(doc, step, dependency, value)? {
            Restored::Skip => {}
            Restored::Selected => choice.add_dependency(dependency)?,
            Restored::External(path) => choice.add_external_dependency(dependency, path)?,
        }
    }
    Ok(choice)
}

/// How one `additional` entry comes back into the form.
enum Restored {
    Skip,
    Selected,
    External(PathBuf),
}

fn restore_dependency(
    doc: &Document,
    step: &'static str,
    dependency: CalibrationKind,
    value: &Resolved,
) -> Result<Restored, DocumentError> {
    if !is_selected(step, dependency, value)? {
        return Ok(Restored::Skip);
    }
    match value.as_path() {
        Some(path) if doc.product(dependency).is_none() => {
            debug!("{step}: keeping external {dependency} file {}", path.display());
            Ok(Restored::External(path.to_path_buf()))
        }
        _ => Ok(Restored::Selected),
    }
}

/// Check a single `additional` value against the kind it names.
///
/// `false` or `null` on a flag means "not requested". `null` on a file
/// kind keeps the selection without a path.
fn is_selected(step: &'static str, dependency: CalibrationKind, value: &Resolved) -> Result<bool, DocumentError> {
    match (dependency.is_flag(), value) {
        (true, Resolved::Flag(on)) => Ok(*on),
        (true, Resolved::Missing) => Ok(false),
        (true, Resolved::Path(_)) => Err(DocumentError::ExpectedFlag { step, dependency }),
        (false, Resolved::Path(_) | Resolved::Missing) => Ok(true),
        (false, Resolved::Flag(_)) => Err(DocumentError::ExpectedPath { step, dependency }),
    }
}

/// Collect every consistency problem in a document.
///
/// Unlike `restore`, this also compares each dependency path against the
/// product of the referenced step when that step is present.
pub fn validate(doc: &Document) -> Vec<DocumentError> {
    let mut problems = Vec::new();

    for (kind, entry) in doc.steps() {
        let step = kind.document_key();
        match &entry.rawfiles {
            Some(raw) if raw.is_empty() => problems.push(DocumentError::MissingRawInputs(step)),
            Some(_) if entry.calibration.is_none() => problems.push(DocumentError::MissingOutput(step)),
            None if entry.reference.is_some() => problems.push(DocumentError::OrphanReference(step)),
            _ => {}
        }
        if entry.reference.is_some() && !kind.accepts_reference() {
            problems.push(FormError::ReferenceNotAllowed(kind).into());
        }
        check_additional(doc, step, kind.allowed_dependencies(), &entry.additional, &mut problems);
    }

    if let Some(object) = &doc.object {
        if object.frames.is_empty() {
            problems.push(DocumentError::MissingFrames(OBJECT_KEY));
        }
        check_additional(
            doc,
            OBJECT_KEY,
            CalibrationKind::OBJECT_DEPENDENCIES,
            &object.additional,
            &mut problems,
        );
    }

    problems
}

fn check_additional(
    doc: &Document,
    step: &'static str,
    allowed: &[CalibrationKind],
    additional: &Additional,
    problems: &mut Vec<DocumentError>,
) {
    for (&dependency, value) in additional {
        if !allowed.contains(&dependency) {
            problems.push(FormError::DependencyNotAllowed { kind: step, dependency }.into());
            continue;
        }
        match is_selected(step, dependency, value) {
            Ok(true) if !dependency.is_flag() => {}
            Ok(_) => continue,
            Err(err) => {
                problems.push(err);
                continue;
            }
        }
        match (value.as_path(), doc.product(dependency)) {
            (None, None) => problems.push(DocumentError::UnresolvedDependency { step, dependency }),
            (Some(found), Some(expected)) if found != expected => {
                problems.push(DocumentError::StaleDependency {
                    step,
                    dependency,
                    expected: expected.to_path_buf(),
                    found: found.to_path_buf(),
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::domain::CalibrationKind::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn sample_form() -> Form {
        let mut form = Form::new();
        form.set_step(CalibrationChoice::from_file(Bias, "bias.fits").unwrap());
        form.set_step(
            CalibrationChoice::process_raw(Dark, paths(&["d1.fits", "d2.fits"]), "dark.fits", &[Bias])
                .unwrap(),
        );
        let mut disp = CalibrationChoice::process_raw(
            Wavelength,
            paths(&["arc.fits"]),
            "disp.fits",
            &[Bias, Dark, Cosmics],
        )
        .unwrap();
        disp.set_reference(Some(PathBuf::from("ref_arc.fits"))).unwrap();
        form.set_step(disp);

        form.object = ObjectFrames::new(paths(&["obj1.fits"]), Some(PathBuf::from("result.fits")));
        form.object.add_dependency(Dark).unwrap();
        form.object.add_dependency(Summation).unwrap();
        form
    }

    #[test]
    fn flatten_resolves_dependencies_to_products() {
        let doc = flatten(&sample_form()).unwrap();

        let bias = doc.bias.as_ref().unwrap();
        assert_eq!(bias.calibration, Some(PathBuf::from("bias.fits")));
        assert!(bias.rawfiles.is_none());

        let dark = doc.dark.as_ref().unwrap();
        assert_eq!(dark.calibration, Some(PathBuf::from("dark.fits")));
        assert_eq!(dark.additional.get(&Bias), Some(&Resolved::Path("bias.fits".into())));

        let disp = doc.disp.as_ref().unwrap();
        assert_eq!(disp.additional.get(&Dark), Some(&Resolved::Path("dark.fits".into())));
        assert_eq!(disp.additional.get(&Cosmics), Some(&Resolved::Flag(true)));
        assert_eq!(disp.reference.as_deref(), Some(Path::new("ref_arc.fits")));

        let object = doc.object.as_ref().unwrap();
        assert_eq!(object.additional.get(&Summation), Some(&Resolved::Flag(true)));
        assert_eq!(object.additional.get(&Dark), Some(&Resolved::Path("dark.fits".into())));

        assert!(doc.cosmics.is_none());
        assert!(doc.flat.is_none());
        assert!(validate(&doc).is_empty());
    }

    #[test]
    fn flatten_rejects_unresolved_dependency() {
        let mut form = Form::new();
        form.set_step(CalibrationChoice::process_raw(Dark, paths(&["d1.fits"]), "dark.fits", &[Bias]).unwrap());

        let err = flatten(&form).unwrap_err();
        assert_eq!(
            err,
            DocumentError::UnresolvedDependency {
                step: "dark",
                dependency: Bias
            }
        );
    }

    #[test]
    fn flatten_requires_raw_inputs_and_output() {
        let mut form = Form::new();
        let flat = form.step_mut(Flat).unwrap();
        flat.set_mode(Mode::ProcessRaw);
        flat.output = Some(PathBuf::from("flat.fits"));
        assert_eq!(flatten(&form).unwrap_err(), DocumentError::MissingRawInputs("flat"));

        let flat = form.step_mut(Flat).unwrap();
        flat.raw_inputs = paths(&["f1.fits"]);
        flat.output = None;
        assert_eq!(flatten(&form).unwrap_err(), DocumentError::MissingOutput("flat"));
    }

    #[test]
    fn flatten_uses_the_active_mode_only() {
        let mut form = Form::new();
        let bias = form.step_mut(Bias).unwrap();
        bias.raw_inputs = paths(&["b1.fits"]);
        bias.output = Some(PathBuf::from("bias_out.fits"));
        bias.file = Some(PathBuf::from("master_bias.fits"));

        let doc = flatten(&form).unwrap();
        let entry = doc.bias.unwrap();
        assert_eq!(entry.calibration, Some(PathBuf::from("master_bias.fits")));
        assert!(entry.rawfiles.is_none());
    }

    #[test]
    fn object_without_result_is_rejected() {
        let mut form = Form::new();
        form.object.frames = paths(&["obj.fits"]);
        assert_eq!(flatten(&form).unwrap_err(), DocumentError::MissingOutput("object"));
    }

    #[test]
    fn restore_round_trips_the_form() {
        let form = sample_form();
        let restored = restore(&flatten(&form).unwrap()).unwrap();
        assert_eq!(restored, form);
    }

    #[test]
    fn restore_rejects_bad_flag_values() {
        let mut doc = flatten(&sample_form()).unwrap();
        doc.disp
            .as_mut()
            .unwrap()
            .additional
            .insert(Cosmics, Resolved::Path("cosmics.fits".into()));
        assert_eq!(
            restore(&doc).unwrap_err(),
            DocumentError::ExpectedFlag {
                step: "disp",
                dependency: Cosmics
            }
        );
    }

    #[test]
    fn restore_skips_disabled_flags() {
        let mut doc = flatten(&sample_form()).unwrap();
        doc.disp.as_mut().unwrap().additional.insert(Cosmics, Resolved::Flag(false));
        let form = restore(&doc).unwrap();
        assert!(!form.step(Wavelength).unwrap().dependencies().contains(&Cosmics));
    }

    #[test]
    fn restore_rejects_forward_dependencies() {
        let mut doc = flatten(&sample_form()).unwrap();
        doc.dark
            .as_mut()
            .unwrap()
            .additional
            .insert(Flat, Resolved::Path("flat.fits".into()));
        assert_eq!(
            restore(&doc).unwrap_err(),
            DocumentError::Form(FormError::DependencyNotAllowed {
                kind: "dark",
                dependency: Flat
            })
        );
    }

    #[test]
    fn validate_reports_stale_paths() {
        let mut doc = flatten(&sample_form()).unwrap();
        doc.dark.as_mut().unwrap().calibration = Some(PathBuf::from("dark_v2.fits"));

        let problems = validate(&doc);
        // disp and object both still point at the old dark product.
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| matches!(
            p,
            DocumentError::StaleDependency {
                dependency: Dark,
                ..
            }
        )));
    }

    #[test]
    fn validate_accepts_external_dependency_paths() {
        let mut form = Form::new();
        form.set_step(CalibrationChoice::from_file(Bias, "bias.fits").unwrap());
        form.set_step(CalibrationChoice::process_raw(Dark, paths(&["d.fits"]), "dark.fits", &[Bias]).unwrap());
        let mut doc = flatten(&form).unwrap();
        // Bias entry removed: the dark step keeps pointing at an external product.
        doc.bias = None;
        assert!(validate(&doc).is_empty());
    }

    #[test]
    fn restore_keeps_external_dependency_paths() {
        let mut dark = StepEntry::from_file("dark.fits");
        dark.rawfiles = Some(paths(&["d1.fits"]));
        dark.additional.insert(Bias, Resolved::Path("/archive/master_bias.fits".into()));
        let doc = Document {
            dark: Some(dark),
            ..Document::default()
        };
        assert!(validate(&doc).is_empty());

        let form = restore(&doc).unwrap();
        let restored = form.step(Dark).unwrap();
        assert!(restored.dependencies().contains(&Bias));
        assert_eq!(
            restored.external_paths().get(&Bias).map(PathBuf::as_path),
            Some(Path::new("/archive/master_bias.fits"))
        );

        assert_eq!(flatten(&form).unwrap(), doc);
    }

    #[test]
    fn blank_entries_stay_unconfigured() {
        let mut disp = StepEntry::from_file("disp.fits");
        disp.rawfiles = Some(paths(&["arc.fits"]));
        disp.additional.insert(Flat, Resolved::Missing);
        disp.additional.insert(Cosmics, Resolved::Missing);
        let doc = Document {
            flat: Some(StepEntry::default()),
            disp: Some(disp),
            ..Document::default()
        };

        assert_eq!(doc.steps().count(), 1);
        assert_eq!(
            validate(&doc),
            vec![DocumentError::UnresolvedDependency {
                step: "disp",
                dependency: Flat
            }]
        );

        let form = restore(&doc).unwrap();
        assert!(!form.step(Flat).unwrap().is_configured());
        let disp = form.step(Wavelength).unwrap();
        assert!(disp.dependencies().contains(&Flat));
        assert!(!disp.dependencies().contains(&Cosmics));
        assert_eq!(
            flatten(&form).unwrap_err(),
            DocumentError::UnresolvedDependency {
                step: "disp",
                dependency: Flat
            }
        );
    }

    #[test]
    fn raw_entry_without_product_is_reported() {
        let doc = Document {
            dark: Some(StepEntry {
                rawfiles: Some(paths(&["d1.fits"])),
                ..StepEntry::default()
            }),
            ..Document::default()
        };
        assert_eq!(validate(&doc), vec![DocumentError::MissingOutput("dark")]);

        let form = restore(&doc).unwrap();
        let dark = form.step(Dark).unwrap();
        assert_eq!(dark.mode, Mode::ProcessRaw);
        assert!(dark.output.is_none());
    }

    #[test]
    fn legacy_flag_entries_are_ignored() {
        let doc = Document {
            bias: Some(StepEntry::from_file("bias.fits")),
            cosmics: Some(crate::document::FlagEntry { calibration: true }),
            summation: Some(crate::document::FlagEntry { calibration: true }),
            ..Document::default()
        };
        assert_eq!(doc.legacy_flags().collect::<Vec<_>>(), vec![Cosmics, Summation]);

        let form = restore(&doc).unwrap();
        assert_eq!(form.step(Bias).unwrap().file.as_deref(), Some(Path::new("bias.fits")));
        assert!(form.object.dependencies().is_empty());

        let written = flatten(&form).unwrap();
        assert!(written.cosmics.is_none());
        assert!(written.summation.is_none());
    }

    #[test]
    fn object_with_only_dependencies_needs_frames() {
        let mut form = Form::new();
        form.object.add_dependency(Cosmics).unwrap();
        assert_eq!(flatten(&form).unwrap_err(), DocumentError::MissingFrames("object"));
    }
}
