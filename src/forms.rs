//! Form controllers for enrollment, onboarding, registration, feedback and
//! todos. Validation is field-level only; the API stays the authority.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::directory::Notice;
use crate::error::{ApiError, FieldError, Result};
use crate::models::{
    FeedbackCreate, Ratings, RegisterRequest, Role, StaffCreate, StudentCreate, TodoCreate,
};

pub const DEPARTMENTS: [&str; 15] = [
    "AIML",
    "AGRI",
    "EEE",
    "EIE",
    "ECE",
    "BT",
    "BME",
    "CIVIL",
    "IT",
    "MECH",
    "MECHATRONICS",
    "CSE",
    "FT",
    "FD",
    "AIDS",
];

pub const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

pub const TODO_PRIORITIES: [&str; 3] = ["Low", "Medium", "High"];

pub const DEFAULT_PASSWORD: &str = "password123";

/// Two-digit admission batch for a year of study.
pub fn batch_suffix(year: u8) -> &'static str {
    match year {
        1 => "25",
        2 => "24",
        3 => "23",
        4 => "22",
        _ => "25",
    }
}

/// Batch label shown beside each year filter.
pub fn year_batch(year: u8) -> Option<&'static str> {
    match year {
        1 => Some("2025-2029"),
        2 => Some("2024-2028"),
        3 => Some("2023-2027"),
        4 => Some("2022-2026"),
        _ => None,
    }
}

/// Preview of the institutional address the API will assign. Display only:
/// it is never submitted.
pub fn institutional_email_preview(full_name: &str, department: &str, year: u8) -> String {
    format!(
        "{}.{}{}@gmail.com",
        first_name(full_name),
        department.to_lowercase(),
        batch_suffix(year)
    )
}

/// Staff addresses carry no batch, only the department and a fixed `777`.
pub fn staff_email_preview(full_name: &str, department: &str) -> String {
    format!(
        "{}{}777@gmail.com",
        first_name(full_name),
        department.to_lowercase()
    )
}

fn first_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_else(|| "name".to_string())
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_phone(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Collects field errors for one form.
#[derive(Default)]
struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    fn fail(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    fn required(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.fail(field, "is required");
            return false;
        }
        true
    }

    fn email(&mut self, field: &'static str, value: &str) {
        if self.required(field, value) && !is_email(value) {
            self.fail(field, "must be a valid email address");
        }
    }

    fn phone(&mut self, field: &'static str, value: &str) {
        if self.required(field, value) && !is_phone(value.trim()) {
            self.fail(field, "must be 10 to 15 digits");
        }
    }

    fn one_of(&mut self, field: &'static str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.fail(field, &format!("must be one of {}", allowed.join(", ")));
        }
    }

    fn range(&mut self, field: &'static str, value: f64, min: f64, max: f64) {
        if !(min..=max).contains(&value) {
            self.fail(field, &format!("must be between {min} and {max}"));
        }
    }

    fn finish<T>(self, value: T) -> Result<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ApiError::validation(self.errors))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentEnrollmentForm {
    pub full_name: String,
    pub personal_email: String,
    pub password: String,
    pub department: String,
    pub year: u8,
    pub dob: String,
    pub blood_group: String,
    pub parent_phone: String,
    pub personal_phone: String,
    pub previous_school: String,
    pub current_cgpa: f64,
}

impl Default for StudentEnrollmentForm {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            personal_email: String::new(),
            password: DEFAULT_PASSWORD.to_string(),
            department: "CSE".to_string(),
            year: 1,
            dob: String::new(),
            blood_group: "O+".to_string(),
            parent_phone: String::new(),
            personal_phone: String::new(),
            previous_school: String::new(),
            current_cgpa: 0.0,
        }
    }
}

impl StudentEnrollmentForm {
    pub fn email_preview(&self) -> String {
        institutional_email_preview(&self.full_name, &self.department, self.year)
    }

    pub fn validate(&self) -> Result<StudentCreate> {
        let mut checks = Checks::default();
        checks.required("full_name", &self.full_name);
        checks.email("personal_email", &self.personal_email);
        checks.required("password", &self.password);
        checks.one_of("department", &self.department, &DEPARTMENTS);
        if !(1..=4).contains(&self.year) {
            checks.fail("year", "must be between 1 and 4");
        }
        if checks.required("dob", &self.dob)
            && NaiveDate::parse_from_str(self.dob.trim(), "%Y-%m-%d").is_err()
        {
            checks.fail("dob", "must be a date like 2005-08-14");
        }
        checks.one_of("blood_group", &self.blood_group, &BLOOD_GROUPS);
        checks.phone("parent_phone", &self.parent_phone);
        checks.phone("personal_phone", &self.personal_phone);
        checks.range("current_cgpa", self.current_cgpa, 0.0, 10.0);

        checks.finish(StudentCreate {
            full_name: self.full_name.trim().to_string(),
            personal_email: self.personal_email.trim().to_string(),
            password: self.password.clone(),
            department: self.department.clone(),
            year: self.year,
            dob: self.dob.trim().to_string(),
            blood_group: self.blood_group.clone(),
            parent_phone: self.parent_phone.trim().to_string(),
            personal_phone: self.personal_phone.trim().to_string(),
            previous_school: optional(&self.previous_school),
            current_cgpa: self.current_cgpa,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffOnboardingForm {
    pub full_name: String,
    pub personal_email: String,
    pub password: String,
    pub staff_id: String,
    pub department: String,
    pub designation: String,
    pub personal_phone: String,
    pub primary_skill: String,
    pub be_degree: String,
    pub me_degree: String,
}

impl Default for StaffOnboardingForm {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            personal_email: String::new(),
            password: DEFAULT_PASSWORD.to_string(),
            staff_id: String::new(),
            department: "CSE".to_string(),
            designation: "Assistant Professor".to_string(),
            personal_phone: String::new(),
            primary_skill: String::new(),
            be_degree: String::new(),
            me_degree: String::new(),
        }
    }
}

impl StaffOnboardingForm {
    pub fn email_preview(&self) -> String {
        staff_email_preview(&self.full_name, &self.department)
    }

    pub fn validate(&self) -> Result<StaffCreate> {
        let mut checks = Checks::default();
        checks.required("full_name", &self.full_name);
        checks.email("personal_email", &self.personal_email);
        checks.required("password", &self.password);
        checks.one_of("department", &self.department, &DEPARTMENTS);
        checks.required("designation", &self.designation);
        if !self.personal_phone.trim().is_empty() && !is_phone(self.personal_phone.trim()) {
            checks.fail("personal_phone", "must be 10 to 15 digits");
        }

        checks.finish(StaffCreate {
            full_name: self.full_name.trim().to_string(),
            personal_email: self.personal_email.trim().to_string(),
            password: self.password.clone(),
            staff_id: optional(&self.staff_id),
            department: self.department.clone(),
            designation: self.designation.trim().to_string(),
            personal_phone: optional(&self.personal_phone),
            primary_skill: optional(&self.primary_skill),
            be_degree: optional(&self.be_degree),
            me_degree: optional(&self.me_degree),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<RegisterRequest> {
        let mut checks = Checks::default();
        checks.email("email", &self.email);
        checks.required("password", &self.password);
        if self.password != self.confirm_password {
            checks.fail("confirm_password", "Passwords do not match.");
        }
        checks.finish(RegisterRequest {
            email: self.email.trim().to_lowercase(),
            password: self.password.clone(),
            role: Role::Student,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackForm {
    pub student_id: Uuid,
    pub ratings: Ratings,
    pub detailed_remarks: String,
}

impl FeedbackForm {
    /// A fresh form rates every metric 5.
    pub fn new(student_id: Uuid) -> Self {
        Self {
            student_id,
            ratings: Ratings::uniform(5.0),
            detailed_remarks: String::new(),
        }
    }

    pub fn validate(&self) -> Result<FeedbackCreate> {
        let mut checks = Checks::default();
        for (metric, value) in self.ratings.iter() {
            if !(0.0..=10.0).contains(&value) {
                checks.errors.push(FieldError::new(
                    "ratings",
                    format!("{metric} must be between 0 and 10"),
                ));
            }
        }
        checks.finish(FeedbackCreate {
            student_id: self.student_id,
            ratings: self.ratings,
            detailed_remarks: optional(&self.detailed_remarks),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodoForm {
    pub task_name: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
}

impl TodoForm {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            priority: "Medium".to_string(),
            due_date: None,
        }
    }

    pub fn validate(&self) -> Result<TodoCreate> {
        let mut checks = Checks::default();
        checks.required("task_name", &self.task_name);
        checks.one_of("priority", &self.priority, &TODO_PRIORITIES);
        checks.finish(TodoCreate {
            task_name: self.task_name.trim().to_string(),
            priority: self.priority.clone(),
            due_date: self.due_date,
        })
    }
}

/// Result of one submission, reduced to what the view shows.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<T> {
    Created { record: T, notice: Notice },
    Failed { notice: Notice },
}

impl<T> SubmitOutcome<T> {
    pub fn from_result(result: Result<T>, success: impl Into<String>) -> Self {
        match result {
            Ok(record) => SubmitOutcome::Created {
                record,
                notice: Notice::success(success),
            },
            Err(err) => {
                if err.is_input_error() {
                    tracing::debug!(error = %err, "form input rejected");
                } else {
                    tracing::warn!(error = %err, "form submission failed");
                }
                SubmitOutcome::Failed {
                    notice: Notice::error(err.user_message()),
                }
            }
        }
    }

    pub fn notice(&self) -> &Notice {
        match self {
            SubmitOutcome::Created { notice, .. } | SubmitOutcome::Failed { notice } => notice,
        }
    }
}

/// One row of a batch enrollment file, validated like the form.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub line: usize,
    pub outcome: std::result::Result<StudentCreate, String>,
}

#[derive(Deserialize)]
struct EnrollmentCsvRow {
    full_name: String,
    personal_email: String,
    department: String,
    year: u8,
    dob: String,
    blood_group: String,
    parent_phone: String,
    personal_phone: String,
    previous_school: Option<String>,
    current_cgpa: Option<f64>,
    password: Option<String>,
}

impl From<EnrollmentCsvRow> for StudentEnrollmentForm {
    fn from(row: EnrollmentCsvRow) -> Self {
        let defaults = StudentEnrollmentForm::default();
        Self {
            full_name: row.full_name,
            personal_email: row.personal_email,
            password: row
                .password
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.password),
            department: row.department.trim().to_uppercase(),
            year: row.year,
            dob: row.dob,
            blood_group: row.blood_group.trim().to_uppercase(),
            parent_phone: row.parent_phone,
            personal_phone: row.personal_phone,
            previous_school: row.previous_school.unwrap_or_default(),
            current_cgpa: row.current_cgpa.unwrap_or(defaults.current_cgpa),
        }
    }
}

pub fn read_enrollment_csv(path: &Path) -> anyhow::Result<Vec<ImportRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_enrollments(file)
}

pub fn read_enrollments<R: Read>(source: R) -> anyhow::Result<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_reader(source);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<EnrollmentCsvRow>().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let outcome = match result {
            Ok(row) => StudentEnrollmentForm::from(row)
                .validate()
                .map_err(|err| err.user_message()),
            Err(err) => Err(format!("unreadable row: {err}")),
        };
        rows.push(ImportRow { line, outcome });
    }

    Ok(rows)
}
