//! Comma-separated export of uniform records.

use crate::workflows::leave::domain::LeaveRequest;

/// One export row as ordered `(column, value)` pairs.
pub type ExportRecord = Vec<(String, String)>;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,
    #[error("failed to write export: {0}")]
    Csv(#[from] csv::Error),
    #[error("export is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Writes a header row taken from the first record's keys, then one row per
/// record in input order. Values missing from a later record are left blank.
pub fn export_csv(records: &[ExportRecord]) -> Result<String, ExportError> {
    let first = records.first().ok_or(ExportError::Empty)?;
    let headers: Vec<&str> = first.iter().map(|(key, _)| key.as_str()).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers)?;
    for record in records {
        let row = headers.iter().map(|header| {
            record
                .iter()
                .find(|(key, _)| key == header)
                .map(|(_, value)| value.as_str())
                .unwrap_or_default()
        });
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Csv(err.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Rows of the approver's daily "received leaves" export.
pub fn authority_export_rows(leaves: &[LeaveRequest]) -> Vec<ExportRecord> {
    leaves
        .iter()
        .map(|leave| {
            vec![
                ("Staff_Name".to_string(), leave.name.clone()),
                ("Department".to_string(), leave.department_label().to_string()),
                ("Type".to_string(), leave.day_type.label().to_string()),
                ("From".to_string(), leave.from_date.to_string()),
                ("To".to_string(), leave.to_date.to_string()),
                ("Reason".to_string(), leave.purpose.label().to_string()),
                ("Status".to_string(), leave.status.label().to_string()),
                (
                    "Teaching".to_string(),
                    if leave.is_teaching_staff { "Yes" } else { "No" }.to_string(),
                ),
                (
                    "Received_At".to_string(),
                    leave.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
            ]
        })
        .collect()
}
