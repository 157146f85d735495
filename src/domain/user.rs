use serde::{Deserialize, Serialize};

use super::{Cents, Gpa};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Faculty,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Faculty => "Faculty",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            _ => None,
        }
    }

    /// Name of the sheet holding users of this role.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Role::Student => "Students",
            Role::Faculty => "Faculty",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the Students sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub major: String,
    pub gpa: Gpa,
    pub email: String,
    /// Advisor number (or name, in older sheets) of the assigned advisor
    pub advisor_assigned: String,
    /// Comma-separated course codes
    pub course_registered: String,
    pub transcript_level: String,
    pub attendance: String,
    /// "Full-Time" / "Part-Time"
    pub enrollment_status: String,
    pub qualification: String,
    pub account_balance: Cents,
}

impl Student {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            full_name: String::new(),
            major: String::new(),
            gpa: Gpa::default(),
            email: String::new(),
            advisor_assigned: String::new(),
            course_registered: String::new(),
            transcript_level: String::new(),
            attendance: String::new(),
            enrollment_status: String::new(),
            qualification: String::new(),
            account_balance: 0,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn with_major(mut self, major: impl Into<String>) -> Self {
        self.major = major.into();
        self
    }

    pub fn with_gpa(mut self, gpa: Gpa) -> Self {
        self.gpa = gpa;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_advisor(mut self, advisor: impl Into<String>) -> Self {
        self.advisor_assigned = advisor.into();
        self
    }

    pub fn with_courses(mut self, courses: impl Into<String>) -> Self {
        self.course_registered = courses.into();
        self
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.account_balance = balance;
        self
    }

    pub fn courses(&self) -> Vec<String> {
        split_courses(&self.course_registered)
    }

    pub fn is_registered_for(&self, course: &str) -> bool {
        let course = course.trim();
        !course.is_empty() && self.courses().iter().any(|c| c == course)
    }

    /// Display name, falling back to the username when the sheet has none.
    pub fn display_name(&self) -> &str {
        match self.full_name.trim() {
            "" => self.username.trim(),
            name => name,
        }
    }
}

/// A row of the Faculty sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub course: String,
    pub schedule: String,
    pub advisor_number: String,
    pub email: String,
}

impl Faculty {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            full_name: String::new(),
            course: String::new(),
            schedule: String::new(),
            advisor_number: String::new(),
            email: String::new(),
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = course.into();
        self
    }

    pub fn with_advisor_number(mut self, number: impl Into<String>) -> Self {
        self.advisor_number = number.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn display_name(&self) -> &str {
        match self.full_name.trim() {
            "" => self.username.trim(),
            name => name,
        }
    }
}

/// Split a "CS101, MATH200" cell into trimmed, non-empty course codes.
pub fn split_courses(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Find the advisor assigned to `student`: first by advisor number, then by
/// full name for sheets that store the advisor's name instead.
pub fn find_advisor<'a>(student: &Student, faculty: &'a [Faculty]) -> Option<&'a Faculty> {
    let assigned = student.advisor_assigned.trim();
    if assigned.is_empty() {
        return None;
    }
    faculty
        .iter()
        .find(|f| f.advisor_number.trim() == assigned)
        .or_else(|| faculty.iter().find(|f| f.full_name.trim() == assigned))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    UserNotFound,
    IncorrectPassword,
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::UserNotFound => write!(f, "Username not found."),
            CredentialError::IncorrectPassword => write!(f, "Incorrect password."),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Compare an entered password with the stored one. Both sides are trimmed
/// since sheet cells and browser autofill often carry stray whitespace.
pub fn check_password(stored: Option<&str>, entered: &str) -> Result<(), CredentialError> {
    match stored {
        None => Err(CredentialError::UserNotFound),
        Some(stored) if stored.trim() == entered.trim() => Ok(()),
        Some(_) => Err(CredentialError::IncorrectPassword),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Student, Role::Faculty] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str(" STUDENT "), Some(Role::Student));
        assert_eq!(Role::from_str("admin"), None);
    }

    #[test]
    fn test_split_courses() {
        assert_eq!(
            split_courses(" CS101, MATH200 ,,  "),
            vec!["CS101".to_string(), "MATH200".to_string()]
        );
        assert!(split_courses("").is_empty());
    }

    #[test]
    fn test_is_registered_for_matches_whole_codes() {
        let student = Student::new("amy", "pw").with_courses("CS101, CS1010");
        assert!(student.is_registered_for("CS101"));
        assert!(student.is_registered_for(" CS1010 "));
        assert!(!student.is_registered_for("CS10"));
        assert!(!student.is_registered_for(""));
    }

    #[test]
    fn test_find_advisor_by_number_then_name() {
        let faculty = vec![
            Faculty::new("smith", "pw")
                .with_full_name("Dr. Smith")
                .with_advisor_number("7"),
            Faculty::new("jones", "pw")
                .with_full_name("Dr. Jones")
                .with_advisor_number("9"),
        ];

        let by_number = Student::new("amy", "pw").with_advisor("9");
        assert_eq!(
            find_advisor(&by_number, &faculty).map(|f| f.username.as_str()),
            Some("jones")
        );

        let by_name = Student::new("bob", "pw").with_advisor("Dr. Smith");
        assert_eq!(
            find_advisor(&by_name, &faculty).map(|f| f.username.as_str()),
            Some("smith")
        );

        let unassigned = Student::new("cat", "pw");
        assert!(find_advisor(&unassigned, &faculty).is_none());
    }

    #[test]
    fn test_check_password() {
        assert_eq!(check_password(Some(" secret "), "secret"), Ok(()));
        assert_eq!(
            check_password(Some("secret"), "Secret"),
            Err(CredentialError::IncorrectPassword)
        );
        assert_eq!(
            check_password(None, "secret"),
            Err(CredentialError::UserNotFound)
        );
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let student = Student::new("amy", "pw");
        assert_eq!(student.display_name(), "amy");
        assert_eq!(student.with_full_name("Amy Lee").display_name(), "Amy Lee");
    }

    #[test]
    fn test_display_name_is_trimmed() {
        let student = Student::new("amy", "pw").with_full_name(" Amy Lee  ");
        assert_eq!(student.display_name(), "Amy Lee");
        let faculty = Faculty::new("rsmith", "pw").with_full_name("Dr. Smith ");
        assert_eq!(faculty.display_name(), "Dr. Smith");
    }
}
