mod common;

use std::fs;

use aggie::domain::{Role, TransactionKind};
use aggie::io::{Exporter, ImportOptions, Importer, Sheet};
use anyhow::Result;
use common::{Campus, test_service};
use tempfile::TempDir;

const STUDENTS_CSV: &str = "\
Username,Password,Full Name,Major,GPA,Email,Advisor_Assigned,Course_Registered,Transcript_Level,Attendance,Full_Time/Part_Time,Qualification,Account_Balance
amy,pw1,Amy Adams,Biology,3.40,amy@aggie.edu,7,CS101,Junior,95%,Full_Time,Dean's List,150.00
zoe,pw9,Zoe Zhang,Art,2.00,,,ART110,Freshman,88%,Part_Time,,75.50
,,Nameless,,,,,,,,,,
";

const FACULTY_CSV: &str = "\
Username,Password,Full_Name,Course,Schedule,Advisor_Number,Email
rsmith,teach1,Dr. Ruth Smith,CS101,TTh 9:30,7,ruth.smith@aggie.edu
kpark,teach3,Dr. Kim Park,ART110,MW 1:00,12,kpark@aggie.edu
";

#[tokio::test]
async fn test_import_into_empty_portal() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let dir = TempDir::new()?;
    fs::write(dir.path().join("Students.csv"), STUDENTS_CSV)?;
    fs::write(dir.path().join("Faculty.csv"), FACULTY_CSV)?;

    let importer = Importer::new(&service);
    let results = importer
        .import_workbook(dir.path(), &ImportOptions::default())
        .await?;

    let (sheet, students) = &results[0];
    assert_eq!(*sheet, Sheet::Students);
    assert_eq!(students.imported, 2);
    assert_eq!(students.skipped, 1);
    assert!(students.errors.is_empty());

    // Missing Transactions.csv and Messages.csv read as empty sheets
    assert_eq!(results[2].1.imported, 0);
    assert_eq!(results[3].1.imported, 0);

    // "Full Name" header is normalized to Full_Name
    let zoe = service.get_student("zoe").await?;
    assert_eq!(zoe.full_name, "Zoe Zhang");
    assert_eq!(zoe.account_balance, 7550);

    let session = service.login(Role::Student, "amy", "pw1").await?;
    assert_eq!(session.full_name, "Amy Adams");
    let advisor = service.advisor(&session).await?.unwrap();
    assert_eq!(advisor.email.as_deref(), Some("ruth.smith@aggie.edu"));

    Ok(())
}

#[tokio::test]
async fn test_reimport_never_overwrites_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;
    service.deposit(&amy, 2000).await?;

    let dir = TempDir::new()?;
    fs::write(dir.path().join("Students.csv"), STUDENTS_CSV)?;
    Importer::new(&service)
        .import_workbook(dir.path(), &ImportOptions::default())
        .await?;

    let stored = service.get_student("amy").await?;
    assert_eq!(stored.major, "Biology");
    assert_eq!(stored.account_balance, 2000);

    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let dir = TempDir::new()?;
    fs::write(dir.path().join("Students.csv"), STUDENTS_CSV)?;

    let results = Importer::new(&service)
        .import_workbook(dir.path(), &ImportOptions { dry_run: true })
        .await?;
    assert_eq!(results[0].1.imported, 2);
    assert!(service.list_students().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_invalid_rows_are_reported() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("Students.csv"),
        "Username,Password,GPA,Account_Balance\nok,pw,3.0,10\nbadgpa,pw,5.1,0\nbroke,pw,2.0,-4\n",
    )?;
    fs::write(
        dir.path().join("Transactions.csv"),
        "Username,Role,Type,Amount,Old_Balance,New_Balance,Timestamp,Id\n\
         ok,Student,Deposit,10.00,0.00,10.00,2024-01-15 09:30:00,\n\
         ok,Student,Withdraw,20.00,10.00,-10.00,2024-01-16,\n\
         ok,Student,Refund,1.00,0.00,1.00,2024-01-17,\n",
    )?;

    let results = Importer::new(&service)
        .import_workbook(dir.path(), &ImportOptions::default())
        .await?;

    let students = &results[0].1;
    assert_eq!(students.imported, 1);
    assert_eq!(students.errors.len(), 2);
    assert_eq!(students.errors[0].line, 3);
    assert_eq!(students.errors[0].field.as_deref(), Some("GPA"));
    assert_eq!(students.errors[1].field.as_deref(), Some("Account_Balance"));

    let transactions = &results[2].1;
    assert_eq!(transactions.imported, 1);
    assert_eq!(transactions.errors.len(), 2);
    assert_eq!(transactions.errors[1].field.as_deref(), Some("Type"));

    let log = service.list_all_transactions().await?;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, TransactionKind::Deposit);
    assert_eq!(log[0].amount_cents, 1000);

    Ok(())
}

#[tokio::test]
async fn test_missing_username_column_fails_the_import() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let dir = TempDir::new()?;
    fs::write(dir.path().join("Students.csv"), "Name,GPA\nAmy,3.0\n")?;

    let err = Importer::new(&service)
        .import_workbook(dir.path(), &ImportOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Username"));

    Ok(())
}

#[tokio::test]
async fn test_export_then_import_into_fresh_portal() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;
    service.deposit(&amy, 5000).await?;
    service.withdraw(&amy, 1250).await?;
    service.message_advisor(&amy, "Office hours?").await?;

    let dir = TempDir::new()?;
    let counts = Exporter::new(&service).export_workbook(dir.path()).await?;
    assert_eq!(counts, vec![
        (Sheet::Students, 3),
        (Sheet::Faculty, 2),
        (Sheet::Transactions, 2),
        (Sheet::Messages, 1),
    ]);
    for sheet in Sheet::ALL {
        assert!(dir.path().join(sheet.file_name()).exists());
    }

    let (fresh, _fresh_temp) = test_service().await?;
    let importer = Importer::new(&fresh);
    importer
        .import_workbook(dir.path(), &ImportOptions::default())
        .await?;

    assert_eq!(fresh.get_student("amy").await?.account_balance, 3750);
    assert_eq!(fresh.list_all_transactions().await?.len(), 2);
    assert_eq!(fresh.list_all_messages().await?.len(), 1);
    fresh.login(Role::Faculty, "rsmith", "teach1").await?;

    // Same Ids again: transaction rows are skipped, not duplicated
    let results = importer
        .import_workbook(dir.path(), &ImportOptions::default())
        .await?;
    assert_eq!(results[2].1.imported, 0);
    assert_eq!(results[2].1.skipped, 2);
    assert_eq!(fresh.list_all_transactions().await?.len(), 2);

    // Messages carry their Id too, so the badge does not double
    assert_eq!(results[3].1.imported, 0);
    assert_eq!(results[3].1.skipped, 1);
    assert_eq!(fresh.list_all_messages().await?.len(), 1);
    let amy = fresh.login(Role::Student, "amy", "pw1").await?;
    assert_eq!(
        fresh.mailbox_counts(&amy).await?.to_string(),
        "Messages - Inbox: 0 | Sent: 1"
    );

    // A dry run over the same workbook reports the stored rows as skipped
    let dry = importer
        .import_workbook(dir.path(), &ImportOptions { dry_run: true })
        .await?;
    assert_eq!(dry[2].1.imported, 0);
    assert_eq!(dry[2].1.skipped, 2);
    assert_eq!(dry[3].1.imported, 0);
    assert_eq!(dry[3].1.skipped, 1);

    Ok(())
}

#[tokio::test]
async fn test_bad_message_rows_do_not_stop_the_sheet() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("Messages.csv"),
        "Sender,Receiver,Message,Timestamp,Id\n\
         Amy Adams,Dr. Ruth Smith,Hello,2024-02-01 08:00:00,\n\
         Amy Adams,Dr. Ruth Smith,Bad id,2024-02-01 09:00:00,not-a-uuid\n\
         Amy Adams,Dr. Ruth Smith,Bad time,yesterday,\n\
         Dr. Ruth Smith,Amy Adams,Reply,2024-02-02,\n",
    )?;

    let results = Importer::new(&service)
        .import_workbook(dir.path(), &ImportOptions::default())
        .await?;

    let messages = &results[3].1;
    assert_eq!(messages.imported, 2);
    assert_eq!(messages.errors.len(), 2);
    assert_eq!(messages.errors[0].line, 3);
    assert_eq!(messages.errors[0].field.as_deref(), Some("Id"));
    assert_eq!(messages.errors[1].line, 4);
    assert_eq!(messages.errors[1].field.as_deref(), Some("Timestamp"));
    assert_eq!(service.list_all_messages().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_json_snapshot_omits_passwords() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service)
        .export_snapshot_json(&mut buffer)
        .await?;
    assert_eq!(snapshot.students.len(), 3);

    let json = String::from_utf8(buffer)?;
    assert!(json.contains("\"Amy Adams\""));
    assert!(!json.contains("pw1"));
    assert!(!json.contains("teach1"));

    Ok(())
}
