// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use aggie::application::PortalService;
use aggie::domain::{Faculty, Gpa, Role, Session, Student};
use anyhow::Result;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(PortalService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = PortalService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: a small campus with two instructors and three students
pub struct Campus;

impl Campus {
    /// Faculty: Dr. Ruth Smith (CS101, advisor 7) and Dr. Omar Lee (MATH200, advisor 9).
    /// Students: amy (CS101, advisor 7), ben (CS101 + MATH200, advisor "Dr. Omar Lee"),
    /// cara (no course, no advisor).
    pub async fn seed(service: &PortalService) -> Result<()> {
        service
            .add_faculty(
                Faculty::new("rsmith", "teach1")
                    .with_full_name("Dr. Ruth Smith")
                    .with_course("CS101")
                    .with_advisor_number("7")
                    .with_email("rsmith@aggie.edu"),
            )
            .await?;
        service
            .add_faculty(
                Faculty::new("olee", "teach2")
                    .with_full_name("Dr. Omar Lee")
                    .with_course("MATH200")
                    .with_advisor_number("9"),
            )
            .await?;

        service
            .add_student(
                Student::new("amy", "pw1")
                    .with_full_name("Amy Adams")
                    .with_major("Computer Science")
                    .with_gpa(Gpa::new(3.2)?)
                    .with_email("amy@aggie.edu")
                    .with_advisor("7")
                    .with_courses("CS101"),
            )
            .await?;
        service
            .add_student(
                Student::new("ben", "pw2")
                    .with_full_name("Ben Brooks")
                    .with_major("Mathematics")
                    .with_gpa(Gpa::new(2.5)?)
                    .with_advisor("Dr. Omar Lee")
                    .with_courses("CS101, MATH200"),
            )
            .await?;
        service
            .add_student(Student::new("cara", "pw3").with_full_name("Cara Cruz"))
            .await?;
        Ok(())
    }

    pub async fn login_student(service: &PortalService, username: &str) -> Result<Session> {
        let password = match username {
            "amy" => "pw1",
            "ben" => "pw2",
            _ => "pw3",
        };
        Ok(service.login(Role::Student, username, password).await?)
    }

    pub async fn login_faculty(service: &PortalService, username: &str) -> Result<Session> {
        let password = if username == "rsmith" { "teach1" } else { "teach2" };
        Ok(service.login(Role::Faculty, username, password).await?)
    }
}
