//! Name identity resolution.
//!
//! Staff are written down inconsistently across forms ("Lingaraj Mani",
//! "Dr.M.Lingaraj Mani", "M. Lingaraj"), so every comparison between an
//! assignee name and a person goes through [`names_match`].

use std::sync::Arc;

use super::directory::{normalize, Directory, DirectoryEntry};
use super::domain::{Gender, Role, User, UserId, UserView};

const HONORIFICS: [&str; 5] = ["dr", "mr", "mrs", "ms", "prof"];

/// Tokenizes a name: lower-cased, split on whitespace, periods and hyphens,
/// with honorifics dropped.
fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '.' || c == '-')
        .filter(|token| !token.is_empty())
        .filter(|token| !HONORIFICS.contains(token))
        .map(str::to_string)
        .collect()
}

fn all_contained(needles: &[&String], haystack: &[&String]) -> bool {
    needles.iter().all(|token| haystack.contains(token))
}

/// Order-independent fuzzy comparison of two staff names.
pub fn names_match(a: &str, b: &str) -> bool {
    if a.trim().is_empty() || b.trim().is_empty() {
        return false;
    }

    let left = name_tokens(a);
    let right = name_tokens(b);
    if left.is_empty() || right.is_empty() {
        return false;
    }

    let left_all: Vec<&String> = left.iter().collect();
    let right_all: Vec<&String> = right.iter().collect();

    if left_all.len() == right_all.len() && all_contained(&left_all, &right_all) {
        return true;
    }

    let left_sig: Vec<&String> = left.iter().filter(|token| token.len() > 2).collect();
    let right_sig: Vec<&String> = right.iter().filter(|token| token.len() > 2).collect();
    if !left_sig.is_empty() && !right_sig.is_empty() {
        let (short, long) = if left_sig.len() <= right_sig.len() {
            (&left_sig, &right_sig)
        } else {
            (&right_sig, &left_sig)
        };
        if all_contained(short, long) {
            return true;
        }
    }

    let (short, long) = if left_all.len() <= right_all.len() {
        (&left_all, &right_all)
    } else {
        (&right_all, &left_all)
    };
    all_contained(short, long)
}

/// True when `name` matches any alias in `identities`.
pub fn matches_any(identities: &[String], name: &str) -> bool {
    identities.iter().any(|identity| names_match(name, identity))
}

/// Resolves people against the injected [`Directory`].
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    directory: Arc<Directory>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn official_profile_by_email(&self, email: &str) -> Option<&DirectoryEntry> {
        let target = normalize(email);
        if target.is_empty() {
            return None;
        }
        self.directory
            .staff()
            .iter()
            .find(|entry| normalize(&entry.email) == target)
    }

    /// Exact (case-insensitive) name first, then the first fuzzy match.
    pub fn official_profile(&self, name: &str) -> Option<&DirectoryEntry> {
        let target = normalize(name);
        if target.is_empty() {
            return None;
        }
        let staff = self.directory.staff();
        staff
            .iter()
            .find(|entry| normalize(&entry.name) == target)
            .or_else(|| staff.iter().find(|entry| names_match(&entry.name, name)))
    }

    /// Every name the user may appear under in acting-staff assignments,
    /// starting with the registered name.
    pub fn resolve_identities(&self, user: &User) -> Vec<String> {
        let mut identities = vec![user.name.clone()];
        let candidates = [
            self.official_profile_by_email(&user.email),
            self.official_profile(&user.name),
        ];

        for official in candidates.into_iter().flatten() {
            if !identities
                .iter()
                .any(|existing| names_match(existing, &official.name))
            {
                identities.push(official.name.clone());
            }
        }

        identities
    }

    /// With a known department only that department's head counts; otherwise
    /// any configured head does.
    pub fn is_head_of_department(&self, name: &str, department: Option<&str>) -> bool {
        if let Some(entry) = department.and_then(|dept| self.directory.department(dept)) {
            return names_match(&entry.hod_name, name);
        }
        self.directory
            .departments()
            .iter()
            .any(|entry| names_match(&entry.hod_name, name))
    }

    /// Colleagues who may cover classes of `department`: registered users
    /// first, then directory staff without an account under a synthetic
    /// `dir-` id. An excluded user is not offered back through the
    /// directory. Sorted by name.
    pub fn acting_staff_options(
        &self,
        registered: &[User],
        department: &str,
        exclude: Option<&UserId>,
    ) -> Vec<UserView> {
        let mut options: Vec<UserView> = registered
            .iter()
            .filter(|user| Some(&user.id) != exclude)
            .filter(|user| {
                self.directory
                    .can_cover(department, user.department.as_deref().unwrap_or_default())
            })
            .map(User::view)
            .collect();

        let mut seen: Vec<String> = registered.iter().map(|user| normalize(&user.name)).collect();
        for entry in self.directory.staff() {
            let key = normalize(&entry.name);
            if seen.contains(&key) || !self.directory.can_cover(department, &entry.department) {
                continue;
            }
            seen.push(key);
            options.push(UserView {
                id: UserId(format!("dir-{}", entry.name)),
                name: entry.name.clone(),
                email: entry.email.clone(),
                role: Role::Staff,
                department: Some(entry.department.clone()),
                is_teaching_staff: true,
                gender: Gender::Other,
            });
        }

        options.sort_by_key(|user| user.name.to_lowercase());
        options
    }
}
