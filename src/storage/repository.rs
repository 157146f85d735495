use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Faculty, Gpa, Message, Role, Student, TransactionKind, TransactionRecord,
};

use super::MIGRATION_001_INITIAL;

/// Outcome of committing a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The stored balance no longer matched the record's old balance, so
    /// nothing was written.
    StaleBalance,
}

/// Repository for the four portal sheets, each stored as one SQLite table.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Create any missing tables. Safe to run on every start.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Connect and migrate.
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Students
    // ========================

    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(&format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY username"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list students")?;

        rows.iter().map(Self::row_to_student).collect()
    }

    pub async fn get_student(&self, username: &str) -> Result<Option<Student>> {
        let row = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch student")?;

        row.as_ref().map(Self::row_to_student).transpose()
    }

    pub async fn get_student_by_full_name(&self, full_name: &str) -> Result<Option<Student>> {
        let row = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE TRIM(full_name) = ? ORDER BY username LIMIT 1"
        ))
        .bind(full_name.trim())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch student by name")?;

        row.as_ref().map(Self::row_to_student).transpose()
    }

    pub async fn save_student(&self, student: &Student) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students (username, password, full_name, major, gpa, email, advisor_assigned,
                course_registered, transcript_level, attendance, enrollment_status, qualification,
                account_balance_cents)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.username)
        .bind(&student.password)
        .bind(&student.full_name)
        .bind(&student.major)
        .bind(student.gpa.value())
        .bind(&student.email)
        .bind(&student.advisor_assigned)
        .bind(&student.course_registered)
        .bind(&student.transcript_level)
        .bind(&student.attendance)
        .bind(&student.enrollment_status)
        .bind(&student.qualification)
        .bind(student.account_balance)
        .execute(&self.pool)
        .await
        .context("Failed to save student")?;
        Ok(())
    }

    /// Overwrite the profile columns of a student. The balance column is
    /// left alone; only the ledger commit changes it.
    pub async fn update_student_profile(&self, student: &Student) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET full_name = ?, major = ?, gpa = ?, email = ?, advisor_assigned = ?,
                course_registered = ?, transcript_level = ?, attendance = ?,
                enrollment_status = ?, qualification = ?
            WHERE username = ?
            "#,
        )
        .bind(&student.full_name)
        .bind(&student.major)
        .bind(student.gpa.value())
        .bind(&student.email)
        .bind(&student.advisor_assigned)
        .bind(&student.course_registered)
        .bind(&student.transcript_level)
        .bind(&student.attendance)
        .bind(&student.enrollment_status)
        .bind(&student.qualification)
        .bind(&student.username)
        .execute(&self.pool)
        .await
        .context("Failed to update student")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_gpa(&self, username: &str, gpa: Gpa) -> Result<bool> {
        let result = sqlx::query("UPDATE students SET gpa = ? WHERE username = ?")
            .bind(gpa.value())
            .bind(username)
            .execute(&self.pool)
            .await
            .context("Failed to update GPA")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_student(&self, username: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .context("Failed to delete student")?;
        Ok(result.rows_affected() > 0)
    }

    /// Write a whole Students sheet back: rows are inserted or updated by
    /// username inside one transaction. An existing student's balance is
    /// never overwritten; the sheet value only seeds new accounts.
    /// Returns the number of rows written.
    pub async fn upsert_students(&self, students: &[Student]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for student in students {
            sqlx::query(
                r#"
                INSERT INTO students (username, password, full_name, major, gpa, email, advisor_assigned,
                    course_registered, transcript_level, attendance, enrollment_status, qualification,
                    account_balance_cents)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(username) DO UPDATE SET
                    password = excluded.password,
                    full_name = excluded.full_name,
                    major = excluded.major,
                    gpa = excluded.gpa,
                    email = excluded.email,
                    advisor_assigned = excluded.advisor_assigned,
                    course_registered = excluded.course_registered,
                    transcript_level = excluded.transcript_level,
                    attendance = excluded.attendance,
                    enrollment_status = excluded.enrollment_status,
                    qualification = excluded.qualification
                "#,
            )
            .bind(&student.username)
            .bind(&student.password)
            .bind(&student.full_name)
            .bind(&student.major)
            .bind(student.gpa.value())
            .bind(&student.email)
            .bind(&student.advisor_assigned)
            .bind(&student.course_registered)
            .bind(&student.transcript_level)
            .bind(&student.attendance)
            .bind(&student.enrollment_status)
            .bind(&student.qualification)
            .bind(student.account_balance)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to write student '{}'", student.username))?;
        }

        tx.commit().await.context("Failed to commit students")?;
        Ok(students.len())
    }

    fn row_to_student(row: &sqlx::sqlite::SqliteRow) -> Result<Student> {
        let username: String = row.get("username");
        let gpa: f64 = row.get("gpa");

        Ok(Student {
            gpa: Gpa::new(gpa)
                .map_err(|e| anyhow::anyhow!("Invalid GPA for student {}: {}", username, e))?,
            username,
            password: row.get("password"),
            full_name: row.get("full_name"),
            major: row.get("major"),
            email: row.get("email"),
            advisor_assigned: row.get("advisor_assigned"),
            course_registered: row.get("course_registered"),
            transcript_level: row.get("transcript_level"),
            attendance: row.get("attendance"),
            enrollment_status: row.get("enrollment_status"),
            qualification: row.get("qualification"),
            account_balance: row.get("account_balance_cents"),
        })
    }

    // ========================
    // Faculty
    // ========================

    pub async fn list_faculty(&self) -> Result<Vec<Faculty>> {
        let rows = sqlx::query(&format!("SELECT {FACULTY_COLUMNS} FROM faculty ORDER BY username"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list faculty")?;

        Ok(rows.iter().map(Self::row_to_faculty).collect())
    }

    pub async fn get_faculty(&self, username: &str) -> Result<Option<Faculty>> {
        let row = sqlx::query(&format!(
            "SELECT {FACULTY_COLUMNS} FROM faculty WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch faculty")?;

        Ok(row.as_ref().map(Self::row_to_faculty))
    }

    pub async fn get_faculty_by_full_name(&self, full_name: &str) -> Result<Option<Faculty>> {
        let row = sqlx::query(&format!(
            "SELECT {FACULTY_COLUMNS} FROM faculty WHERE TRIM(full_name) = ? ORDER BY username LIMIT 1"
        ))
        .bind(full_name.trim())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch faculty by name")?;

        Ok(row.as_ref().map(Self::row_to_faculty))
    }

    pub async fn save_faculty(&self, faculty: &Faculty) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO faculty (username, password, full_name, course, schedule, advisor_number, email)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&faculty.username)
        .bind(&faculty.password)
        .bind(&faculty.full_name)
        .bind(&faculty.course)
        .bind(&faculty.schedule)
        .bind(&faculty.advisor_number)
        .bind(&faculty.email)
        .execute(&self.pool)
        .await
        .context("Failed to save faculty")?;
        Ok(())
    }

    pub async fn update_faculty_profile(&self, faculty: &Faculty) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE faculty
            SET full_name = ?, course = ?, schedule = ?, advisor_number = ?, email = ?
            WHERE username = ?
            "#,
        )
        .bind(&faculty.full_name)
        .bind(&faculty.course)
        .bind(&faculty.schedule)
        .bind(&faculty.advisor_number)
        .bind(&faculty.email)
        .bind(&faculty.username)
        .execute(&self.pool)
        .await
        .context("Failed to update faculty")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_faculty(&self, username: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM faculty WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .context("Failed to delete faculty")?;
        Ok(result.rows_affected() > 0)
    }

    /// Write a whole Faculty sheet back, keyed by username.
    pub async fn upsert_faculty(&self, faculty: &[Faculty]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for member in faculty {
            sqlx::query(
                r#"
                INSERT INTO faculty (username, password, full_name, course, schedule, advisor_number, email)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(username) DO UPDATE SET
                    password = excluded.password,
                    full_name = excluded.full_name,
                    course = excluded.course,
                    schedule = excluded.schedule,
                    advisor_number = excluded.advisor_number,
                    email = excluded.email
                "#,
            )
            .bind(&member.username)
            .bind(&member.password)
            .bind(&member.full_name)
            .bind(&member.course)
            .bind(&member.schedule)
            .bind(&member.advisor_number)
            .bind(&member.email)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to write faculty '{}'", member.username))?;
        }

        tx.commit().await.context("Failed to commit faculty")?;
        Ok(faculty.len())
    }

    fn row_to_faculty(row: &sqlx::sqlite::SqliteRow) -> Faculty {
        Faculty {
            username: row.get("username"),
            password: row.get("password"),
            full_name: row.get("full_name"),
            course: row.get("course"),
            schedule: row.get("schedule"),
            advisor_number: row.get("advisor_number"),
            email: row.get("email"),
        }
    }

    // ========================
    // Transactions
    // ========================

    /// Persist a ledger mutation: the student's new balance and the audit
    /// record land in one transaction, or neither does.
    ///
    /// The balance update only applies while the stored balance still equals
    /// `record.old_balance`. On success the record's sequence is filled in.
    pub async fn commit_ledger_mutation(
        &self,
        record: &mut TransactionRecord,
    ) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE students
            SET account_balance_cents = ?
            WHERE username = ? AND account_balance_cents = ?
            "#,
        )
        .bind(record.new_balance)
        .bind(&record.username)
        .bind(record.old_balance)
        .execute(&mut *tx)
        .await
        .context("Failed to update account balance")?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.context("Failed to roll back")?;
            debug!(username = %record.username, "stale balance, ledger mutation not applied");
            return Ok(CommitOutcome::StaleBalance);
        }

        record.sequence = Self::insert_transaction(&mut tx, record).await?;

        tx.commit().await.context("Failed to commit ledger mutation")?;
        debug!(
            username = %record.username,
            sequence = record.sequence,
            kind = record.kind.as_str(),
            "ledger mutation committed"
        );
        Ok(CommitOutcome::Committed)
    }

    /// Append an already-validated historical record without touching any
    /// balance (used by sheet import).
    pub async fn append_transaction(&self, record: &mut TransactionRecord) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        record.sequence = Self::insert_transaction(&mut tx, record).await?;
        tx.commit().await.context("Failed to commit transaction record")?;
        Ok(())
    }

    async fn insert_transaction(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        record: &TransactionRecord,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (id, username, role, kind, amount_cents, old_balance_cents,
                new_balance_cents, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING sequence
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.username)
        .bind(record.role.as_str())
        .bind(record.kind.as_str())
        .bind(record.amount_cents)
        .bind(record.old_balance)
        .bind(record.new_balance)
        .bind(format_timestamp(record.timestamp))
        .fetch_one(&mut **tx)
        .await
        .context("Failed to save transaction record")?;

        Ok(row.get("sequence"))
    }

    pub async fn transaction_exists(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up transaction")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    /// All records for one user, oldest first.
    pub async fn list_transactions_for_user(&self, username: &str) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE TRIM(username) = ? ORDER BY sequence"
        ))
        .bind(username.trim())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// The whole Transactions sheet, oldest first.
    pub async fn list_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY sequence"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord> {
        let id_str: String = row.get("id");
        let role_str: String = row.get("role");
        let kind_str: String = row.get("kind");
        let timestamp_str: String = row.get("timestamp");

        Ok(TransactionRecord {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            username: row.get("username"),
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role_str))?,
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            old_balance: row.get("old_balance_cents"),
            new_balance: row.get("new_balance_cents"),
            timestamp: parse_timestamp(&timestamp_str)?,
        })
    }

    // ========================
    // Messages
    // ========================

    pub async fn save_message(&self, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender, receiver, body, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(&message.sender)
        .bind(&message.receiver)
        .bind(&message.body)
        .bind(format_timestamp(message.timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save message")?;
        Ok(())
    }

    pub async fn message_exists(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up message")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Messages where `full_name` is the sender or the receiver. Names are
    /// compared trimmed.
    pub async fn list_messages_for(&self, full_name: &str) -> Result<Vec<Message>> {
        let full_name = full_name.trim();
        let rows = sqlx::query(
            r#"
            SELECT id, sender, receiver, body, timestamp
            FROM messages
            WHERE TRIM(sender) = ? OR TRIM(receiver) = ?
            ORDER BY timestamp
            "#,
        )
        .bind(full_name)
        .bind(full_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list messages")?;

        rows.iter().map(Self::row_to_message).collect()
    }

    pub async fn list_messages(&self) -> Result<Vec<Message>> {
        let rows = sqlx::query("SELECT id, sender, receiver, body, timestamp FROM messages ORDER BY timestamp")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list messages")?;

        rows.iter().map(Self::row_to_message).collect()
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message> {
        let id_str: String = row.get("id");
        let timestamp_str: String = row.get("timestamp");

        Ok(Message {
            id: Uuid::parse_str(&id_str).context("Invalid message ID")?,
            sender: row.get("sender"),
            receiver: row.get("receiver"),
            body: row.get("body"),
            timestamp: parse_timestamp(&timestamp_str)?,
        })
    }
}

const STUDENT_COLUMNS: &str = "username, password, full_name, major, gpa, email, advisor_assigned, \
    course_registered, transcript_level, attendance, enrollment_status, qualification, \
    account_balance_cents";

const FACULTY_COLUMNS: &str =
    "username, password, full_name, course, schedule, advisor_number, email";

const TRANSACTION_COLUMNS: &str = "sequence, id, username, role, kind, amount_cents, \
    old_balance_cents, new_balance_cents, timestamp";

// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}
