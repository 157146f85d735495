use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::PortalService;
use crate::domain::{Faculty, Message, Student, TransactionRecord, format_cents};

use super::sheet::Sheet;

/// Whole-workbook snapshot for JSON export. Passwords are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub students: Vec<Student>,
    pub faculty: Vec<Faculty>,
    pub transactions: Vec<TransactionRecord>,
    pub messages: Vec<Message>,
}

/// Writes portal data out as spreadsheet-compatible sheets.
pub struct Exporter<'a> {
    service: &'a PortalService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a PortalService) -> Self {
        Self { service }
    }

    /// Write one CSV file per sheet into `dir`, creating it if needed.
    pub async fn export_workbook(&self, dir: &Path) -> Result<Vec<(Sheet, usize)>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut counts = Vec::with_capacity(Sheet::ALL.len());
        for sheet in Sheet::ALL {
            let path = dir.join(sheet.file_name());
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let count = self.export_sheet_csv(sheet, file).await?;
            counts.push((sheet, count));
        }
        Ok(counts)
    }

    pub async fn export_sheet_csv<W: Write>(&self, sheet: Sheet, writer: W) -> Result<usize> {
        match sheet {
            Sheet::Students => self.export_students_csv(writer).await,
            Sheet::Faculty => self.export_faculty_csv(writer).await,
            Sheet::Transactions => self.export_transactions_csv(writer).await,
            Sheet::Messages => self.export_messages_csv(writer).await,
        }
    }

    pub async fn export_students_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let students = self.service.list_students().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(Sheet::Students.headers())?;

        for s in &students {
            let gpa = s.gpa.to_string();
            let balance = format_cents(s.account_balance);
            csv_writer.write_record([
                s.username.as_str(),
                s.password.as_str(),
                s.full_name.as_str(),
                s.major.as_str(),
                gpa.as_str(),
                s.email.as_str(),
                s.advisor_assigned.as_str(),
                s.course_registered.as_str(),
                s.transcript_level.as_str(),
                s.attendance.as_str(),
                s.enrollment_status.as_str(),
                s.qualification.as_str(),
                balance.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(students.len())
    }

    pub async fn export_faculty_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let faculty = self.service.list_faculty().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(Sheet::Faculty.headers())?;

        for f in &faculty {
            csv_writer.write_record([
                &f.username,
                &f.password,
                &f.full_name,
                &f.course,
                &f.schedule,
                &f.advisor_number,
                &f.email,
            ])?;
        }

        csv_writer.flush()?;
        Ok(faculty.len())
    }

    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.service.list_all_transactions().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(Sheet::Transactions.headers())?;

        for r in &records {
            csv_writer.write_record([
                r.username.clone(),
                r.role.as_str().to_string(),
                r.kind.as_str().to_string(),
                format_cents(r.amount_cents),
                format_cents(r.old_balance),
                format_cents(r.new_balance),
                r.timestamp.to_rfc3339(),
                r.id.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(records.len())
    }

    pub async fn export_messages_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let messages = self.service.list_all_messages().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(Sheet::Messages.headers())?;

        for m in &messages {
            csv_writer.write_record([
                m.sender.clone(),
                m.receiver.clone(),
                m.body.clone(),
                m.timestamp.to_rfc3339(),
                m.id.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(messages.len())
    }

    /// Export every sheet as one JSON document.
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<WorkbookSnapshot> {
        let snapshot = WorkbookSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            students: self.service.list_students().await?,
            faculty: self.service.list_faculty().await?,
            transactions: self.service.list_all_transactions().await?,
            messages: self.service.list_all_messages().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
