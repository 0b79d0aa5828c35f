//! Formatted terminal output for documents and the dependency graph.
//!
//! Formatting lives here so the conversion code stays free of presentation.

use std::path::Path;

use crate::cli::picker::join_file_list;
use crate::document::{Additional, Document, DocumentError, Resolved};
use crate::domain::CalibrationKind;

/// Human-readable summary of a document, one block per step.
pub fn format_document_summary(doc: &Document, source: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== tdsr - {} ===\n", source.display()));

    if doc.is_empty() {
        out.push_str("(empty document)\n");
        return out;
    }

    for (kind, entry) in doc.steps() {
        out.push_str(&format!("\n{} [{}]\n", kind.display_name(), kind.code()));
        match &entry.rawfiles {
            Some(raw) => {
                out.push_str(&format!("  process {} raw file(s): {}\n", raw.len(), join_file_list(raw)));
                out.push_str(&format!("  output: {}\n", display_or_unset(entry.calibration.as_deref())));
                if let Some(reference) = &entry.reference {
                    out.push_str(&format!("  reference: {}\n", reference.display()));
                }
                push_additional(&mut out, &entry.additional);
            }
            None => {
                out.push_str(&format!("  from file: {}\n", display_or_unset(entry.calibration.as_deref())));
            }
        }
    }

    if let Some(object) = &doc.object {
        out.push_str("\nObject frames\n");
        out.push_str(&format!("  {} frame(s): {}\n", object.frames.len(), join_file_list(&object.frames)));
        out.push_str(&format!("  result: {}\n", object.result.display()));
        push_additional(&mut out, &object.additional);
    }

    out
}

fn display_or_unset(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

fn push_additional(out: &mut String, additional: &Additional) {
    if additional.is_empty() {
        out.push_str("  calibrations: none\n");
        return;
    }
    out.push_str("  calibrations:\n");
    for (kind, value) in additional {
        let rendered = match value {
            Resolved::Flag(true) => "yes".to_string(),
            Resolved::Flag(false) => "no".to_string(),
            Resolved::Path(p) => p.display().to_string(),
            Resolved::Missing => display_or_unset(None),
        };
        out.push_str(&format!("    {} {:<12} {}\n", kind.code(), kind.short_label(), rendered));
    }
}

/// Table of kinds, codes, document keys and allowed dependencies.
pub fn format_dependency_table() -> String {
    let mut out = format!("{:<5} {:<14} {:<10} {}\n", "code", "kind", "key", "depends on");
    for kind in CalibrationKind::ALL {
        out.push_str(&format_dependency_row(kind));
    }
    out.push_str(&format!(
        "{:<5} {:<14} {:<10} {}\n",
        "-",
        "Object",
        "object",
        codes(CalibrationKind::OBJECT_DEPENDENCIES)
    ));
    out
}

/// One table line for `kind`.
pub fn format_dependency_row(kind: CalibrationKind) -> String {
    let mut deps = if kind.is_flag() {
        "(flag)".to_string()
    } else {
        codes(kind.allowed_dependencies())
    };
    if deps.is_empty() {
        deps.push('-');
    }
    if kind.accepts_reference() {
        deps.push_str(" + reference");
    }
    format!(
        "{:<5} {:<14} {:<10} {}\n",
        kind.code(),
        kind.display_name(),
        kind.document_key(),
        deps
    )
}

fn codes(kinds: &[CalibrationKind]) -> String {
    kinds.iter().map(|k| k.code()).collect()
}

/// One line per validation problem.
pub fn format_problems(path: &Path, problems: &[DocumentError]) -> String {
    if problems.is_empty() {
        return format!("{}: ok\n", path.display());
    }
    let mut out = format!("{}: {} problem(s)\n", path.display(), problems.len());
    for problem in problems {
        out.push_str(&format!("  - {problem}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ObjectEntry, StepEntry};

    #[test]
    fn summary_lists_steps_in_order() {
        let mut doc = Document::default();
        doc.flat = Some(StepEntry::from_file("flat.fits"));
        let mut additional = Additional::new();
        additional.insert(CalibrationKind::Cosmics, Resolved::Flag(true));
        additional.insert(CalibrationKind::Bias, Resolved::Path("bias.fits".into()));
        doc.disp = Some(StepEntry {
            calibration: None,
            rawfiles: Some(vec!["arc1.fits".into(), "arc2.fits".into()]),
            reference: Some("ref.fits".into()),
            additional: additional.clone(),
        });
        doc.object = Some(ObjectEntry {
            frames: vec!["obj.fits".into()],
            result: "result.fits".into(),
            additional,
        });

        let text = format_document_summary(&doc, Path::new("night.yml"));
        let flat_at = text.find("Flat [F]").unwrap();
        let disp_at = text.find("Wavelengths [W]").unwrap();
        assert!(flat_at < disp_at);
        assert!(text.contains("process 2 raw file(s): arc1.fits, arc2.fits"));
        assert!(text.contains("reference: ref.fits"));
        assert!(text.contains("output: (not set)"));
        assert!(text.contains("C cosmics      yes"));
        assert!(text.contains("result: result.fits"));
    }

    #[test]
    fn empty_summary() {
        let text = format_document_summary(&Document::default(), Path::new("x.yml"));
        assert!(text.contains("(empty document)"));
    }

    #[test]
    fn dependency_table_mentions_every_kind() {
        let table = format_dependency_table();
        for kind in CalibrationKind::ALL {
            assert!(table.contains(kind.document_key()));
        }
        assert!(table.contains("BDCF + reference"));
        assert!(table.contains("BDCXFWYSTA"));
    }

    #[test]
    fn single_row() {
        let row = format_dependency_row(CalibrationKind::Bias);
        assert!(row.starts_with("B     Bias"));
        assert!(row.trim_end().ends_with('-'));
        assert!(format_dependency_row(CalibrationKind::Summation).contains("(flag)"));
    }

    #[test]
    fn problems_listing() {
        let path = Path::new("x.yml");
        assert_eq!(format_problems(path, &[]), "x.yml: ok\n");
        let text = format_problems(path, &[DocumentError::MissingFrames("object")]);
        assert!(text.contains("1 problem(s)"));
        assert!(text.contains("object frames selected but no frames given"));
    }
}
