//! Leave letter composition.
//!
//! [`LetterComposer`] asks an optional [`LetterGenerator`] for a letter and
//! falls back to a fixed template whenever the generator is missing, fails,
//! times out or returns nothing.

mod generator;
mod template;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::workflows::leave::acting::{is_sentinel, normalize_assignments};
use crate::workflows::leave::domain::{
    dates_in_range, effective_to_date, ActingStaffAssignment, DayType, HalfDaySection,
    LeaveApplication, LeavePurpose,
};

pub use generator::{HttpLetterGenerator, LetterGenerationError, LetterGenerator};
pub use template::render_template;

pub const NON_TEACHING_COVERAGE: &str = "Not applicable for non-teaching staff.";
pub const NO_COVERAGE: &str = "None (Class Free)";

/// Immutable inputs to a leave letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterFields {
    pub name: String,
    pub is_teaching_staff: bool,
    pub department: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub day_type: DayType,
    pub purpose: LeavePurpose,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub sections: Vec<HalfDaySection>,
    pub coverage: String,
}

impl LetterFields {
    /// Builds the letter inputs for an applicant's form, summarizing the
    /// coverage plan over the effective date range.
    pub fn from_application(
        name: &str,
        is_teaching_staff: bool,
        department: Option<&str>,
        application: &LeaveApplication,
    ) -> Self {
        let to_date = effective_to_date(
            application.from_date,
            application.to_date,
            application.day_type,
            application.purpose,
        );
        let coverage = if is_teaching_staff {
            let (acting, _) = normalize_assignments(
                &application.acting_staff,
                application.from_date,
                to_date,
                true,
            );
            coverage_summary(&acting, application.from_date, to_date)
        } else {
            NON_TEACHING_COVERAGE.to_string()
        };
        let detail = Some(application.description.trim().to_string()).filter(|d| !d.is_empty());

        Self {
            name: name.to_string(),
            is_teaching_staff,
            department: application
                .department
                .clone()
                .filter(|department| !department.trim().is_empty())
                .or_else(|| department.map(str::to_string)),
            from_date: application.from_date,
            to_date,
            day_type: application.day_type,
            purpose: application.purpose,
            detail,
            time: application.time.clone(),
            sections: application.sections.clone(),
            coverage,
        }
    }

    /// "from to to", or the single date plus time and sections for half days.
    pub fn duration(&self, with_time: bool) -> String {
        if self.day_type != DayType::HalfDay {
            return format!("{} to {}", self.from_date, self.to_date);
        }
        let mut duration = self.from_date.to_string();
        if with_time {
            if let Some(time) = self.time.as_deref().filter(|time| !time.trim().is_empty()) {
                duration.push_str(&format!(" at {time}"));
            }
        }
        if !self.sections.is_empty() {
            duration.push_str(&format!(" ({})", self.sections_label()));
        }
        duration
    }

    pub fn sections_label(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.label())
            .collect::<Vec<_>>()
            .join(" & ")
    }

    /// Detail text that must appear verbatim in the letter.
    pub fn required_detail(&self) -> Option<&str> {
        match self.purpose {
            LeavePurpose::OnDuty => self.detail.as_deref(),
            _ => None,
        }
    }
}

/// "2024-03-11: P1: name, P3: name; 2024-03-12: Free".
pub fn coverage_summary(acting: &ActingStaffAssignment, from: NaiveDate, to: NaiveDate) -> String {
    let days: Vec<String> = dates_in_range(from, to)
        .into_iter()
        .map(|date| {
            let periods: Vec<String> = acting
                .get(&date)
                .into_iter()
                .flat_map(|periods| periods.iter())
                .filter(|(_, name)| !is_sentinel(name))
                .map(|(period, name)| format!("{}: {}", period.short_label(), name.trim()))
                .collect();
            if periods.is_empty() {
                format!("{date}: Free")
            } else {
                format!("{date}: {}", periods.join(", "))
            }
        })
        .collect();
    if days.is_empty() {
        NO_COVERAGE.to_string()
    } else {
        days.join("; ")
    }
}

/// Composes letters with an optional external generator.
#[derive(Clone, Default)]
pub struct LetterComposer {
    generator: Option<Arc<dyn LetterGenerator>>,
}

impl LetterComposer {
    pub fn new(generator: Option<Arc<dyn LetterGenerator>>) -> Self {
        Self { generator }
    }

    pub fn template_only() -> Self {
        Self::default()
    }

    pub async fn compose(&self, fields: &LetterFields) -> String {
        let Some(generator) = &self.generator else {
            debug!("no letter generator configured, using template");
            return render_template(fields);
        };

        match generator.generate(fields).await {
            Ok(text) if !text.trim().is_empty() => ensure_detail(text, fields),
            Ok(_) => {
                warn!("letter generator returned an empty letter, using template");
                render_template(fields)
            }
            Err(err) => {
                warn!(error = %err, "letter generation failed, using template");
                render_template(fields)
            }
        }
    }
}

fn ensure_detail(mut text: String, fields: &LetterFields) -> String {
    if let Some(detail) = fields.required_detail() {
        if !text.contains(detail) {
            text.push_str(&format!("\n\nDuty details: {detail}"));
        }
    }
    text
}
