use std::path::Path;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::application::PortalService;
use crate::domain::{
    Faculty, Gpa, Message, Role, Student, TransactionKind, TransactionRecord, parse_cents,
};

use super::sheet::{Sheet, Table, parse_timestamp};

/// Result of importing one sheet
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// A row that could not be imported
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

impl ImportError {
    fn new(line: usize, field: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            line,
            field: field.map(String::from),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Parse and validate without writing anything
    pub dry_run: bool,
}

/// Loads spreadsheet sheets (CSV) into the portal.
pub struct Importer<'a> {
    service: &'a PortalService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a PortalService) -> Self {
        Self { service }
    }

    /// Import every sheet file found in `dir`. Missing files count as empty
    /// sheets.
    pub async fn import_workbook(
        &self,
        dir: &Path,
        options: &ImportOptions,
    ) -> Result<Vec<(Sheet, ImportResult)>> {
        let mut results = Vec::with_capacity(Sheet::ALL.len());
        for sheet in Sheet::ALL {
            let table = Table::load(&dir.join(sheet.file_name()), sheet)?;
            let result = self.import_table(sheet, &table, options).await?;
            info!(
                sheet = %sheet,
                imported = result.imported,
                skipped = result.skipped,
                errors = result.errors.len(),
                "sheet imported"
            );
            results.push((sheet, result));
        }
        Ok(results)
    }

    pub async fn import_table(
        &self,
        sheet: Sheet,
        table: &Table,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        match sheet {
            Sheet::Students => self.import_students(table, options).await,
            Sheet::Faculty => self.import_faculty(table, options).await,
            Sheet::Transactions => self.import_transactions(table, options).await,
            Sheet::Messages => self.import_messages(table, options).await,
        }
    }

    /// Read the whole Students sheet, then write it back keyed by username.
    pub async fn import_students(&self, table: &Table, options: &ImportOptions) -> Result<ImportResult> {
        let mut result = ImportResult::default();
        if table.is_empty() {
            return Ok(result);
        }
        require_column(table, Sheet::Students, "Username")?;

        let mut students = Vec::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            let line = i + 2;
            match student_from_row(table, row) {
                Ok(Some(student)) => students.push(student),
                Ok(None) => result.skipped += 1,
                Err(e) => result.errors.push(ImportError { line, ..e }),
            }
        }

        result.imported = if options.dry_run {
            students.len()
        } else {
            self.service.merge_students(&students).await?
        };
        Ok(result)
    }

    pub async fn import_faculty(&self, table: &Table, options: &ImportOptions) -> Result<ImportResult> {
        let mut result = ImportResult::default();
        if table.is_empty() {
            return Ok(result);
        }
        require_column(table, Sheet::Faculty, "Username")?;

        let mut faculty = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let username = table.cell(row, "Username");
            if username.is_empty() {
                result.skipped += 1;
                continue;
            }
            faculty.push(Faculty {
                username: username.to_string(),
                password: table.cell(row, "Password").to_string(),
                full_name: table.cell(row, "Full_Name").to_string(),
                course: table.cell(row, "Course").to_string(),
                schedule: table.cell(row, "Schedule").to_string(),
                advisor_number: table.cell(row, "Advisor_Number").to_string(),
                email: table.cell(row, "Email").to_string(),
            });
        }

        result.imported = if options.dry_run {
            faculty.len()
        } else {
            self.service.merge_faculty(&faculty).await?
        };
        Ok(result)
    }

    /// Append transaction rows. Rows that break the record invariant are
    /// reported and skipped; rows already present (same Id) are skipped.
    pub async fn import_transactions(
        &self,
        table: &Table,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let mut result = ImportResult::default();

        for (i, row) in table.rows.iter().enumerate() {
            let line = i + 2;
            let record = match transaction_from_row(table, row) {
                Ok(r) => r,
                Err(e) => {
                    result.errors.push(ImportError { line, ..e });
                    continue;
                }
            };
            if let Err(e) = record.validate() {
                result
                    .errors
                    .push(ImportError::new(line, None, format!("Invalid record: {}", e)));
                continue;
            }

            let outcome = if options.dry_run {
                self.service.transaction_exists(record.id).await.map(|found| !found)
            } else {
                self.service.append_transaction_record(record).await
            };
            match outcome {
                Ok(true) => result.imported += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => result.errors.push(ImportError::new(line, None, e.to_string())),
            }
        }

        Ok(result)
    }

    /// Append message rows. Rows already present (same Id) are skipped; a
    /// row without an Id gets a new one.
    pub async fn import_messages(&self, table: &Table, options: &ImportOptions) -> Result<ImportResult> {
        let mut result = ImportResult::default();

        for (i, row) in table.rows.iter().enumerate() {
            let line = i + 2;
            let timestamp = match parse_timestamp(table.cell(row, "Timestamp")) {
                Ok(ts) => ts,
                Err(e) => {
                    result
                        .errors
                        .push(ImportError::new(line, Some("Timestamp"), e.to_string()));
                    continue;
                }
            };
            let mut message = match Message::new(
                table.cell(row, "Sender"),
                table.cell(row, "Receiver"),
                table.cell(row, "Message"),
                timestamp,
            ) {
                Ok(m) => m,
                Err(e) => {
                    result
                        .errors
                        .push(ImportError::new(line, Some("Message"), e.to_string()));
                    continue;
                }
            };
            let id_cell = table.cell(row, "Id");
            if !id_cell.is_empty() {
                match Uuid::parse_str(id_cell) {
                    Ok(id) => message = message.with_id(id),
                    Err(e) => {
                        result
                            .errors
                            .push(ImportError::new(line, Some("Id"), format!("Invalid id: {}", e)));
                        continue;
                    }
                }
            }

            let outcome = if options.dry_run {
                self.service.message_exists(message.id).await.map(|found| !found)
            } else {
                self.service.append_message(&message).await
            };
            match outcome {
                Ok(true) => result.imported += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => result.errors.push(ImportError::new(line, None, e.to_string())),
            }
        }

        Ok(result)
    }
}

fn require_column(table: &Table, sheet: Sheet, column: &str) -> Result<()> {
    if !table.has_column(column) {
        anyhow::bail!("No '{}' column found in the {} sheet.", column, sheet);
    }
    Ok(())
}

fn student_from_row(table: &Table, row: &[String]) -> Result<Option<Student>, ImportError> {
    let username = table.cell(row, "Username");
    if username.is_empty() {
        return Ok(None);
    }

    let gpa = Gpa::parse(table.cell(row, "GPA"))
        .map_err(|e| ImportError::new(0, Some("GPA"), e.to_string()))?;

    let balance_cell = table.cell(row, "Account_Balance");
    let account_balance = if balance_cell.is_empty() {
        0
    } else {
        parse_cents(balance_cell)
            .map_err(|e| ImportError::new(0, Some("Account_Balance"), e.to_string()))?
    };
    if account_balance < 0 {
        return Err(ImportError::new(
            0,
            Some("Account_Balance"),
            "Balance cannot be negative",
        ));
    }

    Ok(Some(Student {
        username: username.to_string(),
        password: table.cell(row, "Password").to_string(),
        full_name: table.cell(row, "Full_Name").to_string(),
        major: table.cell(row, "Major").to_string(),
        gpa,
        email: table.cell(row, "Email").to_string(),
        advisor_assigned: table.cell(row, "Advisor_Assigned").to_string(),
        course_registered: table.cell(row, "Course_Registered").to_string(),
        transcript_level: table.cell(row, "Transcript_Level").to_string(),
        attendance: table.cell(row, "Attendance").to_string(),
        enrollment_status: table.cell(row, "Full_Time/Part_Time").to_string(),
        qualification: table.cell(row, "Qualification").to_string(),
        account_balance,
    }))
}

fn transaction_from_row(table: &Table, row: &[String]) -> Result<TransactionRecord, ImportError> {
    let money = |column: &str| {
        parse_cents(table.cell(row, column))
            .map_err(|e| ImportError::new(0, Some(column), format!("Invalid amount: {}", e)))
    };

    let username = table.cell(row, "Username");
    if username.is_empty() {
        return Err(ImportError::new(0, Some("Username"), "Missing username"));
    }
    let role_cell = table.cell(row, "Role");
    let role = Role::from_str(role_cell)
        .ok_or_else(|| ImportError::new(0, Some("Role"), format!("Invalid role: {}", role_cell)))?;
    let kind_cell = table.cell(row, "Type");
    let kind = TransactionKind::from_str(kind_cell).ok_or_else(|| {
        ImportError::new(0, Some("Type"), format!("Invalid type: {}", kind_cell))
    })?;
    let timestamp = parse_timestamp(table.cell(row, "Timestamp"))
        .map_err(|e| ImportError::new(0, Some("Timestamp"), e.to_string()))?;

    let id_cell = table.cell(row, "Id");
    let id = if id_cell.is_empty() {
        Uuid::new_v4()
    } else {
        Uuid::parse_str(id_cell)
            .map_err(|e| ImportError::new(0, Some("Id"), format!("Invalid id: {}", e)))?
    };

    Ok(TransactionRecord {
        id,
        sequence: 0,
        username: username.to_string(),
        role,
        kind,
        amount_cents: money("Amount")?,
        old_balance: money("Old_Balance")?,
        new_balance: money("New_Balance")?,
        timestamp,
    })
}
