//! Terminal-independent editing model for the form.
//!
//! The form is presented as a flat list of rows (`Field`). Rows belonging to
//! the inactive mode of a step stay visible but are disabled, like the
//! greyed-out widgets of a desktop form.

use std::path::{Path, PathBuf};

use crate::cli::picker::{
    FITS_EXTENSION, join_file_list, parse_file_list, parse_single_file, validate_fits_path, with_default_extension,
};
use crate::domain::{CalibrationKind, Form, FormError, Mode};

/// One editable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Mode(CalibrationKind),
    File(CalibrationKind),
    RawFiles(CalibrationKind),
    Output(CalibrationKind),
    Dependencies(CalibrationKind),
    Reference(CalibrationKind),
    ObjectFrames,
    ObjectResult,
    ObjectDependencies,
    SavePath,
}

/// What kind of file choice a row expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    /// One existing file.
    Open,
    /// Any number of existing files.
    OpenMany,
    /// A file to be written.
    Save,
}

impl Field {
    pub fn kind(self) -> Option<CalibrationKind> {
        match self {
            Field::Mode(k)
            | Field::File(k)
            | Field::RawFiles(k)
            | Field::Output(k)
            | Field::Dependencies(k)
            | Field::Reference(k) => Some(k),
            Field::ObjectFrames | Field::ObjectResult | Field::ObjectDependencies | Field::SavePath => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Mode(_) => "Mode",
            Field::File(_) => "File",
            Field::RawFiles(_) => "Raw files",
            Field::Output(_) => "Output",
            Field::Dependencies(_) | Field::ObjectDependencies => "Apply",
            Field::Reference(_) => "Reference",
            Field::ObjectFrames => "Object frames",
            Field::ObjectResult => "Result path",
            Field::SavePath => "Save config to",
        }
    }

    pub fn is_text(self) -> bool {
        self.pick_mode().is_some() || self == Field::SavePath
    }

    pub fn pick_mode(self) -> Option<PickMode> {
        match self {
            Field::File(_) | Field::Reference(_) => Some(PickMode::Open),
            Field::RawFiles(_) | Field::ObjectFrames => Some(PickMode::OpenMany),
            Field::Output(_) | Field::ObjectResult => Some(PickMode::Save),
            _ => None,
        }
    }

    /// Dependency checkboxes offered on this row.
    pub fn dependency_options(self) -> &'static [CalibrationKind] {
        match self {
            Field::Dependencies(kind) => kind.allowed_dependencies(),
            Field::ObjectDependencies => CalibrationKind::OBJECT_DEPENDENCIES,
            _ => &[],
        }
    }
}

/// All rows, top to bottom.
pub fn layout() -> Vec<Field> {
    let mut fields = Vec::new();
    for kind in CalibrationKind::CONFIGURABLE {
        fields.push(Field::Mode(kind));
        fields.push(Field::File(kind));
        fields.push(Field::RawFiles(kind));
        fields.push(Field::Output(kind));
        if !kind.allowed_dependencies().is_empty() {
            fields.push(Field::Dependencies(kind));
        }
        if kind.accepts_reference() {
            fields.push(Field::Reference(kind));
        }
    }
    fields.extend([
        Field::ObjectFrames,
        Field::ObjectResult,
        Field::ObjectDependencies,
        Field::SavePath,
    ]);
    fields
}

/// Form state plus the cursor and the in-progress text edit.
#[derive(Debug, Clone)]
pub struct FormEditor {
    pub form: Form,
    fields: Vec<Field>,
    selected: usize,
    dep_cursor: usize,
    editing: Option<String>,
}

impl FormEditor {
    pub fn new(form: Form) -> Self {
        Self {
            form,
            fields: layout(),
            selected: 0,
            dep_cursor: 0,
            editing: None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Field {
        self.fields[self.selected]
    }

    pub fn dep_cursor(&self) -> usize {
        self.dep_cursor
    }

    pub fn edit_buffer(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Swap in a freshly loaded form, keeping the cursor.
    pub fn replace_form(&mut self, form: Form) {
        self.form = form;
        self.editing = None;
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.fields.len() {
            self.selected += 1;
            self.dep_cursor = 0;
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.dep_cursor = 0;
        }
    }

    /// Whether the row can be edited in the current mode of its step.
    pub fn is_enabled(&self, field: Field) -> bool {
        let mode = field
            .kind()
            .and_then(|k| self.form.step(k).ok())
            .map(|c| c.mode);
        match field {
            Field::File(_) => mode == Some(Mode::FromFile),
            Field::RawFiles(_) | Field::Output(_) | Field::Dependencies(_) | Field::Reference(_) => {
                mode == Some(Mode::ProcessRaw)
            }
            _ => true,
        }
    }

    /// Current value of a text row as it would appear in the input box.
    pub fn field_text(&self, field: Field) -> String {
        let display = |p: Option<&std::path::Path>| p.map(|p| p.display().to_string()).unwrap_or_default();
        let step = field.kind().and_then(|k| self.form.step(k).ok());
        match (field, step) {
            (Field::Mode(_), Some(c)) => c.mode.display_name().to_string(),
            (Field::File(_), Some(c)) => display(c.file.as_deref()),
            (Field::RawFiles(_), Some(c)) => join_file_list(&c.raw_inputs),
            (Field::Output(_), Some(c)) => display(c.output.as_deref()),
            (Field::Reference(_), Some(c)) => display(c.reference()),
            (Field::ObjectFrames, _) => join_file_list(&self.form.object.frames),
            (Field::ObjectResult, _) => display(self.form.object.result.as_deref()),
            (Field::SavePath, _) => display(self.form.save_path.as_deref()),
            _ => String::new(),
        }
    }

    /// Whether dependency `dep` is ticked on `field`.
    pub fn is_checked(&self, field: Field, dep: CalibrationKind) -> bool {
        match field {
            Field::Dependencies(kind) => self
                .form
                .step(kind)
                .map(|c| c.dependencies().contains(&dep))
                .unwrap_or(false),
            Field::ObjectDependencies => self.form.object.dependencies().contains(&dep),
            _ => false,
        }
    }

    /// Problems with the input files currently chosen on `field`.
    ///
    /// Only rows that read existing frames are checked. Missing files are
    /// reported, not rejected, so a config can be prepared before the data
    /// arrive.
    pub fn input_warnings(&self, field: Field) -> Vec<String> {
        let step = field.kind().and_then(|k| self.form.step(k).ok());
        let inputs: Vec<PathBuf> = match (field, step) {
            (Field::File(_), Some(c)) => c.file.iter().cloned().collect(),
            (Field::RawFiles(_), Some(c)) => c.raw_inputs.clone(),
            (Field::Reference(_), Some(c)) => c.reference().map(Path::to_path_buf).into_iter().collect(),
            (Field::ObjectFrames, _) => self.form.object.frames.clone(),
            _ => Vec::new(),
        };
        inputs
            .iter()
            .filter_map(|p| validate_fits_path(p).err())
            .map(|e| e.to_string())
            .collect()
    }

    /// Flip the mode of the selected step.
    pub fn toggle_mode(&mut self) -> Result<Option<Mode>, FormError> {
        let Field::Mode(kind) = self.selected() else {
            return Ok(None);
        };
        let step = self.form.step_mut(kind)?;
        step.set_mode(step.mode.toggled());
        Ok(Some(step.mode))
    }

    pub fn move_dep_cursor(&mut self, delta: isize) {
        let n = self.selected().dependency_options().len();
        if n == 0 {
            return;
        }
        self.dep_cursor = (self.dep_cursor as isize + delta).clamp(0, n as isize - 1) as usize;
    }

    /// Flip the dependency under the cursor. Returns the kind and its new state.
    pub fn toggle_dependency(&mut self) -> Result<Option<(CalibrationKind, bool)>, FormError> {
        let field = self.selected();
        if !self.is_enabled(field) {
            return Ok(None);
        }
        let Some(&dep) = field.dependency_options().get(self.dep_cursor) else {
            return Ok(None);
        };
        let on = match field {
            Field::Dependencies(kind) => self.form.step_mut(kind)?.toggle_dependency(dep)?,
            Field::ObjectDependencies => self.form.object.toggle_dependency(dep)?,
            _ => return Ok(None),
        };
        Ok(Some((dep, on)))
    }

    /// Start editing the selected row. Returns false for non-text or disabled rows.
    pub fn begin_edit(&mut self) -> bool {
        let field = self.selected();
        if !field.is_text() || !self.is_enabled(field) {
            return false;
        }
        self.editing = Some(self.field_text(field));
        true
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(buf) = &mut self.editing {
            buf.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(buf) = &mut self.editing {
            buf.pop();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Apply the edit buffer to the selected row.
    pub fn commit_edit(&mut self) -> Result<(), FormError> {
        let Some(text) = self.editing.take() else {
            return Ok(());
        };
        self.set_text(self.selected(), &text)
    }

    /// Apply files chosen in the picker to the selected row.
    pub fn apply_picked(&mut self, picked: &[PathBuf]) -> Result<(), FormError> {
        let field = self.selected();
        if !self.is_enabled(field) || field.pick_mode().is_none() {
            return Ok(());
        }
        self.set_text(field, &join_file_list(picked))
    }

    fn set_text(&mut self, field: Field, text: &str) -> Result<(), FormError> {
        let single = parse_single_file(text);
        let output = single.as_deref().map(|p| with_default_extension(p, FITS_EXTENSION));
        match field {
            Field::File(kind) => self.form.step_mut(kind)?.file = single,
            Field::RawFiles(kind) => self.form.step_mut(kind)?.raw_inputs = parse_file_list(text),
            Field::Output(kind) => self.form.step_mut(kind)?.output = output,
            Field::Reference(kind) => self.form.step_mut(kind)?.set_reference(single)?,
            Field::ObjectFrames => self.form.object.frames = parse_file_list(text),
            Field::ObjectResult => self.form.object.result = output,
            Field::SavePath => self.form.save_path = single,
            Field::Mode(_) | Field::Dependencies(_) | Field::ObjectDependencies => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::document::flatten;
    use crate::domain::CalibrationKind::*;

    fn select(editor: &mut FormEditor, field: Field) {
        while editor.selected() != field {
            editor.select_next();
        }
    }

    fn type_text(editor: &mut FormEditor, text: &str) {
        assert!(editor.begin_edit());
        while editor.edit_buffer().is_some_and(|b| !b.is_empty()) {
            editor.pop_char();
        }
        for c in text.chars() {
            editor.push_char(c);
        }
        editor.commit_edit().unwrap();
    }

    #[test]
    fn layout_skips_empty_dependency_rows() {
        let fields = layout();
        assert!(!fields.contains(&Field::Dependencies(Bias)));
        assert!(fields.contains(&Field::Dependencies(Dark)));
        assert!(fields.contains(&Field::Reference(Wavelength)));
        assert!(!fields.contains(&Field::Reference(Flat)));
        assert_eq!(fields.last(), Some(&Field::SavePath));
    }

    #[test]
    fn raw_rows_are_disabled_in_file_mode() {
        let mut editor = FormEditor::new(Form::new());
        select(&mut editor, Field::RawFiles(Bias));
        assert!(!editor.is_enabled(Field::RawFiles(Bias)));
        assert!(!editor.begin_edit());

        let mut editor = FormEditor::new(Form::new());
        assert_eq!(editor.selected(), Field::Mode(Bias));
        assert_eq!(editor.toggle_mode().unwrap(), Some(Mode::ProcessRaw));
        assert!(editor.is_enabled(Field::RawFiles(Bias)));
        assert!(!editor.is_enabled(Field::File(Bias)));
    }

    #[test]
    fn typing_paths_builds_a_document() {
        let mut editor = FormEditor::new(Form::new());
        select(&mut editor, Field::File(Bias));
        type_text(&mut editor, "master_bias.fits");

        select(&mut editor, Field::Mode(Dark));
        editor.toggle_mode().unwrap();
        select(&mut editor, Field::RawFiles(Dark));
        type_text(&mut editor, "d1.fits, d2.fits");
        select(&mut editor, Field::Output(Dark));
        type_text(&mut editor, "out/dark");
        select(&mut editor, Field::Dependencies(Dark));
        assert_eq!(editor.toggle_dependency().unwrap(), Some((Bias, true)));

        let doc = flatten(&editor.form).unwrap();
        let dark = doc.dark.unwrap();
        assert_eq!(dark.calibration, Some(PathBuf::from("out/dark.fits")));
        assert_eq!(dark.rawfiles.unwrap().len(), 2);
        assert_eq!(
            dark.additional.get(&Bias).and_then(|r| r.as_path()),
            Some(Path::new("master_bias.fits"))
        );
    }

    #[test]
    fn input_rows_warn_about_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("obj1.fits");
        std::fs::write(&frame, b"SIMPLE").unwrap();
        let missing = dir.path().join("obj2.fits");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"x").unwrap();

        let mut editor = FormEditor::new(Form::new());
        select(&mut editor, Field::ObjectFrames);
        editor.apply_picked(&[frame.clone()]).unwrap();
        assert!(editor.input_warnings(Field::ObjectFrames).is_empty());

        editor.apply_picked(&[frame, missing, notes]).unwrap();
        let warnings = editor.input_warnings(Field::ObjectFrames);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("not found"), "{warnings:?}");
        assert!(warnings[1].contains(".fits/.fts"), "{warnings:?}");

        // Outputs are written later and never checked.
        select(&mut editor, Field::ObjectResult);
        type_text(&mut editor, "nowhere/result");
        assert!(editor.input_warnings(Field::ObjectResult).is_empty());
    }

    #[test]
    fn dependency_cursor_is_clamped() {
        let mut editor = FormEditor::new(Form::new());
        select(&mut editor, Field::ObjectDependencies);
        editor.move_dep_cursor(-3);
        assert_eq!(editor.dep_cursor(), 0);
        editor.move_dep_cursor(100);
        assert_eq!(editor.dep_cursor(), CalibrationKind::OBJECT_DEPENDENCIES.len() - 1);
        assert_eq!(editor.toggle_dependency().unwrap(), Some((Summation, true)));
        assert!(editor.is_checked(Field::ObjectDependencies, Summation));
    }

    #[test]
    fn picked_files_fill_the_row() {
        let mut editor = FormEditor::new(Form::new());
        select(&mut editor, Field::ObjectFrames);
        editor
            .apply_picked(&[PathBuf::from("o1.fits"), PathBuf::from("o2.fits")])
            .unwrap();
        assert_eq!(editor.field_text(Field::ObjectFrames), "o1.fits, o2.fits");

        select(&mut editor, Field::SavePath);
        type_text(&mut editor, "night");
        assert_eq!(editor.form.save_path, Some(PathBuf::from("night")));
    }

    #[test]
    fn cancel_keeps_the_old_value() {
        let mut editor = FormEditor::new(Form::new());
        select(&mut editor, Field::File(Bias));
        type_text(&mut editor, "a.fits");
        assert!(editor.begin_edit());
        editor.push_char('x');
        editor.cancel_edit();
        assert_eq!(editor.field_text(Field::File(Bias)), "a.fits");
    }
}
