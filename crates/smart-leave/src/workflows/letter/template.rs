use super::LetterFields;
use crate::workflows::leave::domain::LeavePurpose;

/// Deterministic letter used whenever generation is unavailable.
pub fn render_template(fields: &LetterFields) -> String {
    let reason = match fields.detail.as_deref() {
        Some(detail) => format!("{} - {detail}", fields.purpose.label()),
        None => fields.purpose.label().to_string(),
    };
    let certificate = if fields.purpose == LeavePurpose::MedicalLeave {
        "My medical certificate is attached for your review."
    } else {
        ""
    };
    let department = fields
        .department
        .as_deref()
        .map(|department| format!("Dept: {department}"))
        .unwrap_or_default();

    format!(
        "To The Authority,\n\n\
         Subject: Leave Application for {purpose}\n\n\
         Respected Sir/Madam,\n\n\
         I am writing to request a {day_type} leave for {duration}.\n\
         Reason: {reason}.\n\n\
         I have arranged for the following staff members to handle my duties: {coverage}.\n\
         {certificate}\n\n\
         I kindly request you to grant me permission.\n\n\
         Sincerely,\n\
         {name}\n\
         {department}",
        purpose = fields.purpose.label(),
        day_type = fields.day_type.label().to_lowercase(),
        duration = fields.duration(false),
        coverage = fields.coverage,
        name = fields.name,
    )
}
