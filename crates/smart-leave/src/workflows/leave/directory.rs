use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

const STANDARD_DEPARTMENTS: &str = include_str!("../../../data/departments.csv");
const STANDARD_STAFF: &str = include_str!("../../../data/staff.csv");

/// Official staff directory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Email")]
    pub email: String,
}

/// Department catalog row naming the head of department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentEntry {
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "HoD Name")]
    pub hod_name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Short Code")]
    pub short_code: String,
    #[serde(rename = "Maternity Leave")]
    pub has_maternity_leave: bool,
    /// Shared departments (languages, maths) teach across programmes and are
    /// offered as coverage for every department.
    #[serde(rename = "Shared")]
    pub shared: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to open directory file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed directory data: {0}")]
    Csv(#[from] csv::Error),
}

/// Read-only institution reference data, injected wherever names are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    departments: Vec<DepartmentEntry>,
    staff: Vec<DirectoryEntry>,
}

impl Directory {
    pub fn new(departments: Vec<DepartmentEntry>, staff: Vec<DirectoryEntry>) -> Self {
        Self { departments, staff }
    }

    /// Directory bundled with the crate.
    pub fn standard() -> Result<Self, DirectoryError> {
        Self::from_readers(STANDARD_DEPARTMENTS.as_bytes(), STANDARD_STAFF.as_bytes())
    }

    pub fn from_readers<D: Read, S: Read>(
        departments: D,
        staff: S,
    ) -> Result<Self, DirectoryError> {
        Ok(Self {
            departments: read_rows(departments)?,
            staff: read_rows(staff)?,
        })
    }

    /// Loads either table from disk, falling back to the bundled copy for the
    /// table that has no override.
    pub fn from_paths(
        departments: Option<&Path>,
        staff: Option<&Path>,
    ) -> Result<Self, DirectoryError> {
        let departments = match departments {
            Some(path) => read_rows(open(path)?)?,
            None => read_rows(STANDARD_DEPARTMENTS.as_bytes())?,
        };
        let staff = match staff {
            Some(path) => read_rows(open(path)?)?,
            None => read_rows(STANDARD_STAFF.as_bytes())?,
        };
        Ok(Self { departments, staff })
    }

    pub fn departments(&self) -> &[DepartmentEntry] {
        &self.departments
    }

    pub fn staff(&self) -> &[DirectoryEntry] {
        &self.staff
    }

    pub fn department(&self, name: &str) -> Option<&DepartmentEntry> {
        let target = normalize(name);
        self.departments
            .iter()
            .find(|entry| normalize(&entry.department) == target)
    }

    pub fn is_shared_department(&self, name: &str) -> bool {
        self.department(name).is_some_and(|entry| entry.shared)
    }

    /// Whether staff from `candidate` may cover classes of `target`: the same
    /// department always, and any shared department unless the target is
    /// itself shared.
    pub fn can_cover(&self, target: &str, candidate: &str) -> bool {
        let target_norm = normalize(target);
        let candidate_norm = normalize(candidate);
        if target_norm == candidate_norm {
            return true;
        }
        !self.is_shared_department(target) && self.is_shared_department(candidate)
    }
}

fn open(path: &Path) -> Result<File, DirectoryError> {
    File::open(path).map_err(|source| DirectoryError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn read_rows<T, R>(reader: R) -> Result<Vec<T>, DirectoryError>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in csv_reader.deserialize::<T>() {
        rows.push(row?);
    }
    Ok(rows)
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_directory_loads_bundled_tables() {
        let directory = Directory::standard().expect("bundled directory parses");
        assert!(directory.departments().len() >= 10);
        assert!(directory.staff().len() >= 10);

        let cs = directory
            .department("computer science")
            .expect("department lookup ignores case");
        assert_eq!(cs.hod_name, "Dr.M.Lingaraj Mani");
        assert!(directory.is_shared_department("Maths"));
        assert!(!directory.is_shared_department("MBA"));
    }

    #[test]
    fn shared_departments_cover_everyone_but_each_other() {
        let directory = Directory::standard().expect("bundled directory parses");
        assert!(directory.can_cover("MBA", "mba"));
        assert!(directory.can_cover("MBA", "English"));
        assert!(!directory.can_cover("MBA", "CSDA"));
        assert!(directory.can_cover("Tamil", "Tamil"));
        assert!(!directory.can_cover("Tamil", "English"));
    }

    #[test]
    fn from_readers_rejects_malformed_rows() {
        let departments = concat!(
            "Department,HoD Name,Email,Short Code,Maternity Leave,Shared\n",
            "X,Dr.Y,y@x,X,maybe,false\n",
        );
        let staff = "Name,Department,Email\n";
        let err = Directory::from_readers(departments.as_bytes(), staff.as_bytes())
            .expect_err("boolean column must parse");
        assert!(matches!(err, DirectoryError::Csv(_)));
    }

    #[test]
    fn missing_override_file_reports_path() {
        let err = Directory::from_paths(Some(Path::new("/nonexistent/departments.csv")), None)
            .expect_err("file is missing");
        assert!(err.to_string().contains("/nonexistent/departments.csv"));
    }
}
