//! Per-session state and operations of the placement screen.
//!
//! The manager owns the UI-facing state (search, paging, modal, form, pending
//! delete). The database connection and "today" are handed in per call; the
//! current student is resolved once in [`PlacementManager::initialize`].

use crate::db::{self, PlacementFields};
use crate::error::{Flash, PlacementError};
use crate::model::{Company, Placement, PlacementPage, Student, Teacher};
use crate::rules::{self, FieldError, PlacementForm, ValidForm};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

const ONE_PLACEMENT_PER_STUDENT: &str = "Student already has a placement.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    StudentId,
    CompanyId,
    TeacherId,
    Start,
    End,
}

impl FormField {
    pub const ALL: [FormField; 5] = [
        FormField::StudentId,
        FormField::CompanyId,
        FormField::TeacherId,
        FormField::Start,
        FormField::End,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FormField::StudentId => "studentId",
            FormField::CompanyId => "companyId",
            FormField::TeacherId => "teacherId",
            FormField::Start => "start",
            FormField::End => "end",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementListing {
    pub placements: PlacementPage,
    pub current_student: Option<Student>,
    pub companies: Vec<Company>,
    pub teachers: Vec<Teacher>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementManager {
    current_student: Option<Student>,
    search: String,
    page: u32,
    per_page: u32,
    modal_open: bool,
    edit_mode: bool,
    editing_id: Option<String>,
    pending_delete_id: Option<String>,
    form: PlacementForm,
    field_error: Option<FieldError>,
    #[serde(skip)]
    flash: Option<Flash>,
}

impl PlacementManager {
    pub fn new(per_page: u32) -> Self {
        Self {
            current_student: None,
            search: String::new(),
            page: 1,
            per_page: per_page.max(1),
            modal_open: false,
            edit_mode: false,
            editing_id: None,
            pending_delete_id: None,
            form: PlacementForm::default(),
            field_error: None,
            flash: None,
        }
    }
}

#[cfg(test)]
impl PlacementManager {
    pub fn current_student(&self) -> Option<&Student> {
        self.current_student.as_ref()
    }

    pub fn form(&self) -> &PlacementForm {
        &self.form
    }

    pub fn is_modal_open(&self) -> bool {
        self.modal_open
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    pub fn pending_delete_id(&self) -> Option<&str> {
        self.pending_delete_id.as_deref()
    }

    pub fn field_error(&self) -> Option<&FieldError> {
        self.field_error.as_ref()
    }
}

impl PlacementManager {
    pub fn take_flash(&mut self) -> Option<Flash> {
        self.flash.take()
    }

    pub fn initialize(
        &mut self,
        conn: &Connection,
        email: &str,
    ) -> Result<Option<&Student>, PlacementError> {
        let email = email.trim();
        self.current_student = db::student_by_email(conn, email)?;
        match &self.current_student {
            Some(s) => info!(student_id = %s.id, "session bound to student"),
            None => warn!(email, "no student matches the session email"),
        }
        Ok(self.current_student.as_ref())
    }

    /// Ownership rule for edit/delete. Without a current student nothing is owned.
    pub fn can_edit_delete(&self, student_id: &str) -> bool {
        self.current_student
            .as_ref()
            .is_some_and(|s| s.id == student_id)
    }

    pub fn list_placements(
        &mut self,
        conn: &Connection,
        search: Option<String>,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<PlacementListing, PlacementError> {
        if let Some(s) = search {
            self.search = s;
        }
        if let Some(p) = page {
            self.page = p.max(1);
        }
        if let Some(n) = per_page {
            self.per_page = n.max(1);
        }

        let viewer = self.current_student.as_ref().map(|s| s.id.as_str());
        let placements =
            db::placements_page(conn, Some(&self.search), self.page, self.per_page, viewer)?;
        Ok(PlacementListing {
            placements,
            current_student: self.current_student.clone(),
            companies: db::companies_all(conn)?,
            teachers: db::teachers_all(conn)?,
        })
    }

    pub fn open_create_form(&mut self) {
        self.form = PlacementForm::default();
        self.field_error = None;
        self.edit_mode = false;
        self.modal_open = true;
    }

    pub fn open_edit_form(&mut self, conn: &Connection, id: &str) -> Result<(), PlacementError> {
        let placement = db::placement_get(conn, id)?
            .ok_or_else(|| PlacementError::placement_not_found(id))?;

        if !self.can_edit_delete(&placement.student_id) {
            let e = PlacementError::Authorization(
                "You are not allowed to edit this placement.".to_string(),
            );
            self.flash = Some(Flash::error(e.code(), e.to_string()));
            return Ok(());
        }

        self.fill_form(placement);
        self.field_error = None;
        self.edit_mode = true;
        self.modal_open = true;
        Ok(())
    }

    fn fill_form(&mut self, p: Placement) {
        self.editing_id = Some(p.id);
        self.form = PlacementForm {
            student_id: p.student_id,
            company_id: p.company_id,
            teacher_id: p.teacher_id.unwrap_or_default(),
            start: p.start_date,
            end: p.end_date,
        };
    }

    pub fn close_form(&mut self) {
        self.modal_open = false;
        self.edit_mode = false;
        self.editing_id = None;
    }

    pub fn set_field(&mut self, field: FormField, value: String) {
        match field {
            FormField::StudentId => self.form.student_id = value,
            FormField::CompanyId => self.form.company_id = value,
            FormField::TeacherId => self.form.teacher_id = value,
            FormField::Start => self.on_start_date_changed(value),
            FormField::End => self.form.end = value,
        }
    }

    /// Stores the new start and proposes the end that gives the minimum span.
    /// An unreadable start leaves the end alone.
    pub fn on_start_date_changed(&mut self, new_start: String) {
        if let Some(start) = rules::parse_form_date(&new_start) {
            self.form.end = rules::format_date(rules::suggested_end(start));
        }
        self.form.start = new_start;
    }

    pub fn min_start_date(&self, today: NaiveDate) -> NaiveDate {
        rules::min_start_hint(today)
    }

    /// Validates the form, then writes it in one transaction.
    ///
    /// Only a rejected form comes back as `Err`; failures inside the
    /// transaction are rolled back and reported through the flash.
    pub fn submit(&mut self, conn: &Connection, today: NaiveDate) -> Result<(), PlacementError> {
        let checked = rules::validate(&self.form, today, |tid| db::teacher_exists(conn, tid))?;
        let valid = match checked {
            Ok(v) => v,
            Err(field_error) => {
                self.field_error = Some(field_error.clone());
                return Err(PlacementError::Validation(field_error));
            }
        };
        self.field_error = None;

        match self.persist(conn, &valid) {
            Ok(message) => {
                if !self.edit_mode && self.can_edit_delete(&valid.student_id) {
                    if let Some(s) = self.current_student.as_mut() {
                        s.status_pkl = true;
                    }
                }
                self.close_form();
                self.form = PlacementForm::default();
                self.flash = Some(Flash::success(message));
            }
            Err(e) => {
                warn!(error = %e, edit_mode = self.edit_mode, "placement save rolled back");
                self.flash = Some(Flash::error(e.code(), format!("An error occurred: {e}")));
            }
        }
        Ok(())
    }

    fn persist(&self, conn: &Connection, valid: &ValidForm) -> Result<&'static str, PlacementError> {
        let start = rules::format_date(valid.start);
        let end = rules::format_date(valid.end);
        let fields = PlacementFields {
            student_id: &valid.student_id,
            company_id: &valid.company_id,
            teacher_id: valid.teacher_id.as_deref(),
            start_date: &start,
            end_date: &end,
        };

        let tx = conn.unchecked_transaction()?;
        let message = if self.edit_mode {
            let id = self.editing_id.as_deref().ok_or_else(|| {
                PlacementError::Persistence("no placement is being edited".to_string())
            })?;
            let updated = db::placement_update(&tx, id, &fields).map_err(unique_as_conflict)?;
            if updated == 0 {
                return Err(PlacementError::placement_not_found(id));
            }
            info!(placement_id = id, "placement updated");
            "Placement updated."
        } else {
            if db::placement_for_student(&tx, &valid.student_id)?.is_some() {
                return Err(PlacementError::Conflict(ONE_PLACEMENT_PER_STUDENT.to_string()));
            }
            let id = db::placement_insert(&tx, &fields).map_err(unique_as_conflict)?;
            db::student_set_status(&tx, &valid.student_id, true)?;
            info!(placement_id = %id, student_id = %valid.student_id, "placement created");
            "Placement created."
        };
        tx.commit()?;
        Ok(message)
    }

    pub fn request_delete(&mut self, id: String) {
        self.pending_delete_id = Some(id);
    }

    pub fn confirm_delete(&mut self, conn: &Connection) -> Result<(), PlacementError> {
        let Some(id) = self.pending_delete_id.clone() else {
            self.flash = Some(Flash::error(
                "bad_params",
                "No placement was selected for deletion.",
            ));
            return Ok(());
        };

        let placement = db::placement_get(conn, &id)?
            .ok_or_else(|| PlacementError::placement_not_found(&id))?;

        if !self.can_edit_delete(&placement.student_id) {
            let e = PlacementError::Authorization(
                "You are not allowed to delete this placement.".to_string(),
            );
            self.flash = Some(Flash::error(e.code(), e.to_string()));
            self.pending_delete_id = None;
            return Ok(());
        }

        match delete_with_status(conn, &placement) {
            Ok(()) => {
                if let Some(s) = self.current_student.as_mut() {
                    s.status_pkl = false;
                }
                self.flash = Some(Flash::success("Placement deleted."));
            }
            Err(e) => {
                warn!(error = %e, placement_id = %id, "placement delete rolled back");
                self.flash = Some(Flash::error(
                    e.code(),
                    format!("An error occurred while deleting: {e}"),
                ));
            }
        }
        self.pending_delete_id = None;
        Ok(())
    }
}

fn unique_as_conflict(e: rusqlite::Error) -> PlacementError {
    if db::is_unique_violation(&e) {
        PlacementError::Conflict(ONE_PLACEMENT_PER_STUDENT.to_string())
    } else {
        e.into()
    }
}

fn delete_with_status(conn: &Connection, placement: &Placement) -> Result<(), PlacementError> {
    let tx = conn.unchecked_transaction()?;
    let before = db::student_get(&tx, &placement.student_id)?;
    info!(
        student_id = %placement.student_id,
        status_pkl = before.as_ref().map(|s| s.status_pkl),
        "student status before placement delete"
    );
    if db::placement_delete(&tx, &placement.id)? == 0 {
        return Err(PlacementError::placement_not_found(&placement.id));
    }
    db::student_set_status(&tx, &placement.student_id, false)?;
    let after = db::student_get(&tx, &placement.student_id)?;
    info!(
        student_id = %placement.student_id,
        status_pkl = after.as_ref().map(|s| s.status_pkl),
        "student status after placement delete"
    );
    tx.commit()?;
    Ok(())
}
