use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    self, Cents, Faculty, Gpa, LedgerError, MailboxCounts, Message, MessageId, Role, Session,
    Student, TransactionId, TransactionKind, TransactionRecord, check_password, find_advisor,
    mailbox_counts,
};
use crate::storage::{CommitOutcome, Repository};

use super::AppError;

/// Number of rows shown in the "Recent Transactions" table.
pub const RECENT_TRANSACTIONS: usize = 5;

/// Application service providing the portal's use cases.
/// Every operation that acts on behalf of a user takes the caller's `Session`.
pub struct PortalService {
    repo: Repository,
}

/// Result of an accepted deposit or withdrawal
#[derive(Debug, Clone, Serialize)]
pub struct LedgerResult {
    pub record: TransactionRecord,
    pub notice: String,
}

/// Advisor card shown on the student dashboard
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorCard {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub student: Student,
    pub courses: Vec<String>,
    pub advisor: Option<AdvisorCard>,
    pub mailbox: MailboxCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacultyDashboard {
    pub faculty: Faculty,
    pub advisees: Vec<Student>,
    pub mailbox: MailboxCounts,
}

/// Inbox and sent lists, newest first
#[derive(Debug, Clone, Serialize)]
pub struct Mailbox {
    pub counts: MailboxCounts,
    pub inbox: Vec<Message>,
    pub sent: Vec<Message>,
}

/// Fields of a student that an edit may change. `None` keeps the value.
#[derive(Debug, Clone, Default)]
pub struct StudentUpdate {
    pub full_name: Option<String>,
    pub major: Option<String>,
    pub gpa: Option<Gpa>,
    pub email: Option<String>,
    pub advisor_assigned: Option<String>,
    pub course_registered: Option<String>,
}

/// Fields of a faculty member that an edit may change.
#[derive(Debug, Clone, Default)]
pub struct FacultyUpdate {
    pub full_name: Option<String>,
    pub course: Option<String>,
    pub schedule: Option<String>,
    pub email: Option<String>,
    pub advisor_number: Option<String>,
}

impl PortalService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create (or upgrade) the database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Login
    // ========================

    /// Check credentials against the sheet for `role` and open a session.
    pub async fn login(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let username = username.trim();

        let (stored_password, full_name) = match role {
            Role::Student => match self.repo.get_student(username).await? {
                Some(s) => (Some(s.password.clone()), s.display_name().to_string()),
                None => (None, String::new()),
            },
            Role::Faculty => match self.repo.get_faculty(username).await? {
                Some(f) => (Some(f.password.clone()), f.display_name().to_string()),
                None => (None, String::new()),
            },
        };

        if let Err(err) = check_password(stored_password.as_deref(), password) {
            warn!(%role, username, "login rejected: {}", err);
            return Err(err.into());
        }

        info!(%role, username, "login successful");
        Ok(Session::new(username, role, full_name))
    }

    // ========================
    // Dashboards
    // ========================

    /// The student row behind a student session.
    pub async fn current_student(&self, session: &Session) -> Result<Student, AppError> {
        if !session.is_student() {
            return Err(AppError::WrongRole(Role::Student));
        }
        self.get_student(&session.username).await
    }

    /// The faculty row behind a faculty session.
    pub async fn current_faculty(&self, session: &Session) -> Result<Faculty, AppError> {
        if !session.is_faculty() {
            return Err(AppError::WrongRole(Role::Faculty));
        }
        self.get_faculty(&session.username).await
    }

    pub async fn student_dashboard(&self, session: &Session) -> Result<StudentDashboard, AppError> {
        let student = self.current_student(session).await?;
        let advisor = self.advisor_for(&student).await?;
        let mailbox = self.mailbox_counts(session).await?;

        Ok(StudentDashboard {
            courses: student.courses(),
            student,
            advisor,
            mailbox,
        })
    }

    pub async fn faculty_dashboard(&self, session: &Session) -> Result<FacultyDashboard, AppError> {
        let faculty = self.current_faculty(session).await?;
        let advisees = self.advisees(session).await?;
        let mailbox = self.mailbox_counts(session).await?;

        Ok(FacultyDashboard {
            faculty,
            advisees,
            mailbox,
        })
    }

    /// The advisor card for the logged-in student, if an advisor is listed.
    pub async fn advisor(&self, session: &Session) -> Result<Option<AdvisorCard>, AppError> {
        let student = self.current_student(session).await?;
        self.advisor_for(&student).await
    }

    async fn advisor_for(&self, student: &Student) -> Result<Option<AdvisorCard>, AppError> {
        let faculty = self.repo.list_faculty().await?;
        Ok(find_advisor(student, &faculty).map(|f| AdvisorCard {
            name: f.display_name().to_string(),
            email: Some(f.email.trim().to_string()).filter(|e| !e.is_empty()),
        }))
    }

    // ========================
    // Finance
    // ========================

    pub async fn balance(&self, session: &Session) -> Result<Cents, AppError> {
        Ok(self.current_student(session).await?.account_balance)
    }

    pub async fn deposit(&self, session: &Session, amount_cents: Cents) -> Result<LedgerResult, AppError> {
        self.mutate_balance(session, amount_cents, TransactionKind::Deposit)
            .await
    }

    pub async fn withdraw(&self, session: &Session, amount_cents: Cents) -> Result<LedgerResult, AppError> {
        self.mutate_balance(session, amount_cents, TransactionKind::Withdrawal)
            .await
    }

    async fn mutate_balance(
        &self,
        session: &Session,
        amount_cents: Cents,
        kind: TransactionKind,
    ) -> Result<LedgerResult, AppError> {
        let student = self.current_student(session).await?;

        let (_, mut record) = domain::apply(
            &student.username,
            session.role,
            student.account_balance,
            amount_cents,
            kind,
            Utc::now(),
        )
        .map_err(|err| {
            warn!(username = %student.username, %kind, amount_cents, "ledger mutation rejected: {}", err);
            match err {
                LedgerError::InvalidAmount(amount) => AppError::InvalidAmount { kind, amount },
                other => other.into(),
            }
        })?;

        match self.repo.commit_ledger_mutation(&mut record).await? {
            CommitOutcome::Committed => {}
            CommitOutcome::StaleBalance => return Err(AppError::BalanceChanged),
        }

        info!(
            username = %record.username,
            %kind,
            amount_cents,
            old_balance = record.old_balance,
            new_balance = record.new_balance,
            "balance updated"
        );

        let notice = match kind {
            TransactionKind::Deposit => "Deposit successful. Your new balance has been saved.",
            TransactionKind::Withdrawal => "Withdrawal successful. Your new balance has been saved.",
        };

        Ok(LedgerResult {
            record,
            notice: notice.to_string(),
        })
    }

    /// The logged-in student's most recent transactions, newest first.
    pub async fn recent_transactions(
        &self,
        session: &Session,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let student = self.current_student(session).await?;
        let records = self
            .repo
            .list_transactions_for_user(&student.username)
            .await?;
        Ok(domain::recent(&records, limit))
    }

    // ========================
    // Advisees and GPA
    // ========================

    /// Students registered for the faculty member's course.
    pub async fn advisees(&self, session: &Session) -> Result<Vec<Student>, AppError> {
        let faculty = self.current_faculty(session).await?;
        let students = self.repo.list_students().await?;
        Ok(students
            .into_iter()
            .filter(|s| s.is_registered_for(&faculty.course))
            .collect())
    }

    /// Set the GPA of a student registered for the faculty member's course.
    pub async fn set_gpa(
        &self,
        session: &Session,
        student_username: &str,
        gpa: Gpa,
    ) -> Result<Student, AppError> {
        let faculty = self.current_faculty(session).await?;
        let mut student = self.get_student(student_username.trim()).await?;

        if !student.is_registered_for(&faculty.course) {
            return Err(AppError::NotAdvisee {
                student: student.display_name().to_string(),
                course: faculty.course,
            });
        }

        self.repo.update_gpa(&student.username, gpa).await?;
        info!(faculty = %faculty.username, student = %student.username, %gpa, "GPA updated");

        student.gpa = gpa;
        Ok(student)
    }

    // ========================
    // Messaging
    // ========================

    /// Send a message to a person on the other side: students write to
    /// faculty, faculty write to students. Returns the notice shown to the
    /// sender.
    pub async fn send_message(
        &self,
        session: &Session,
        receiver: &str,
        text: &str,
    ) -> Result<String, AppError> {
        let receiver = receiver.trim();
        let receiver_role = match session.role {
            Role::Student => Role::Faculty,
            Role::Faculty => Role::Student,
        };

        // Validate the body before looking anyone up
        let message = Message::new(&session.full_name, receiver, text, Utc::now())?;

        let known = match receiver_role {
            Role::Faculty => self.repo.get_faculty_by_full_name(receiver).await?.is_some(),
            Role::Student => self.repo.get_student_by_full_name(receiver).await?.is_some(),
        };
        if !known {
            return Err(AppError::RecipientNotFound(receiver_role, receiver.to_string()));
        }

        self.repo.save_message(&message).await?;
        info!(sender = %message.sender, receiver = %message.receiver, "message sent");

        Ok(format!("Message sent to {}.", message.receiver))
    }

    /// Send a message to the logged-in student's advisor.
    pub async fn message_advisor(&self, session: &Session, text: &str) -> Result<String, AppError> {
        let advisor = self.advisor(session).await?.ok_or(AppError::AdvisorNotFound)?;
        self.send_message(session, &advisor.name, text).await
    }

    pub async fn mailbox(&self, session: &Session) -> Result<Mailbox, AppError> {
        let messages = self.repo.list_messages_for(&session.full_name).await?;
        Ok(Mailbox {
            counts: mailbox_counts(&messages, &session.full_name),
            inbox: domain::inbox(&messages, &session.full_name),
            sent: domain::sent(&messages, &session.full_name),
        })
    }

    pub async fn mailbox_counts(&self, session: &Session) -> Result<MailboxCounts, AppError> {
        let messages = self.repo.list_messages_for(&session.full_name).await?;
        Ok(mailbox_counts(&messages, &session.full_name))
    }

    /// Full names of everyone the session may write to.
    pub async fn contacts(&self, session: &Session) -> Result<Vec<String>, AppError> {
        Ok(match session.role {
            Role::Student => self
                .repo
                .list_faculty()
                .await?
                .iter()
                .map(|f| f.display_name().to_string())
                .collect(),
            Role::Faculty => self
                .repo
                .list_students()
                .await?
                .iter()
                .map(|s| s.display_name().to_string())
                .collect(),
        })
    }

    // ========================
    // User management
    // ========================

    pub async fn get_student(&self, username: &str) -> Result<Student, AppError> {
        self.repo
            .get_student(username)
            .await?
            .ok_or_else(|| AppError::RecordNotFound {
                role: Role::Student,
                username: username.to_string(),
            })
    }

    pub async fn get_faculty(&self, username: &str) -> Result<Faculty, AppError> {
        self.repo
            .get_faculty(username)
            .await?
            .ok_or_else(|| AppError::RecordNotFound {
                role: Role::Faculty,
                username: username.to_string(),
            })
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        Ok(self.repo.list_students().await?)
    }

    pub async fn list_faculty(&self) -> Result<Vec<Faculty>, AppError> {
        Ok(self.repo.list_faculty().await?)
    }

    /// Add a student account. New accounts always start at a zero balance.
    pub async fn add_student(&self, student: Student) -> Result<Student, AppError> {
        if self.repo.get_student(&student.username).await?.is_some() {
            return Err(AppError::UsernameTaken(Role::Student));
        }
        let mut student = student.with_balance(0);
        student.full_name = student.full_name.trim().to_string();
        self.repo.save_student(&student).await?;
        info!(username = %student.username, "student account created");
        Ok(student)
    }

    pub async fn add_faculty(&self, mut faculty: Faculty) -> Result<Faculty, AppError> {
        if self.repo.get_faculty(&faculty.username).await?.is_some() {
            return Err(AppError::UsernameTaken(Role::Faculty));
        }
        faculty.full_name = faculty.full_name.trim().to_string();
        self.repo.save_faculty(&faculty).await?;
        info!(username = %faculty.username, "faculty account created");
        Ok(faculty)
    }

    pub async fn update_student(
        &self,
        username: &str,
        update: StudentUpdate,
    ) -> Result<Student, AppError> {
        let mut student = self.get_student(username).await?;

        if let Some(v) = update.full_name {
            student.full_name = v.trim().to_string();
        }
        if let Some(v) = update.major {
            student.major = v;
        }
        if let Some(v) = update.gpa {
            student.gpa = v;
        }
        if let Some(v) = update.email {
            student.email = v;
        }
        if let Some(v) = update.advisor_assigned {
            student.advisor_assigned = v;
        }
        if let Some(v) = update.course_registered {
            student.course_registered = v;
        }

        self.repo.update_student_profile(&student).await?;
        info!(username = %student.username, "student updated");
        Ok(student)
    }

    pub async fn update_faculty(
        &self,
        username: &str,
        update: FacultyUpdate,
    ) -> Result<Faculty, AppError> {
        let mut faculty = self.get_faculty(username).await?;

        if let Some(v) = update.full_name {
            faculty.full_name = v.trim().to_string();
        }
        if let Some(v) = update.course {
            faculty.course = v;
        }
        if let Some(v) = update.schedule {
            faculty.schedule = v;
        }
        if let Some(v) = update.email {
            faculty.email = v;
        }
        if let Some(v) = update.advisor_number {
            faculty.advisor_number = v;
        }

        self.repo.update_faculty_profile(&faculty).await?;
        info!(username = %faculty.username, "faculty updated");
        Ok(faculty)
    }

    /// Permanently remove a user. Their transaction records stay in the log.
    pub async fn delete_user(
        &self,
        role: Role,
        username: &str,
        confirmed: bool,
    ) -> Result<(), AppError> {
        if !confirmed {
            return Err(AppError::ConfirmationRequired);
        }

        let deleted = match role {
            Role::Student => self.repo.delete_student(username).await?,
            Role::Faculty => self.repo.delete_faculty(username).await?,
        };
        if !deleted {
            return Err(AppError::RecordNotFound {
                role,
                username: username.to_string(),
            });
        }

        info!(%role, username, "user deleted");
        Ok(())
    }

    // ========================
    // Sheet access
    // ========================

    pub async fn list_all_transactions(&self) -> Result<Vec<TransactionRecord>, AppError> {
        Ok(self.repo.list_transactions().await?)
    }

    pub async fn list_all_messages(&self) -> Result<Vec<Message>, AppError> {
        Ok(self.repo.list_messages().await?)
    }

    /// Merge a Students sheet into storage, keyed by username.
    pub async fn merge_students(&self, students: &[Student]) -> Result<usize, AppError> {
        Ok(self.repo.upsert_students(students).await?)
    }

    /// Merge a Faculty sheet into storage, keyed by username.
    pub async fn merge_faculty(&self, faculty: &[Faculty]) -> Result<usize, AppError> {
        Ok(self.repo.upsert_faculty(faculty).await?)
    }

    /// Append a historical transaction record. Returns false when a record
    /// with the same id is already stored.
    pub async fn append_transaction_record(
        &self,
        mut record: TransactionRecord,
    ) -> Result<bool, AppError> {
        record.validate()?;
        if self.repo.transaction_exists(record.id).await? {
            return Ok(false);
        }
        self.repo.append_transaction(&mut record).await?;
        Ok(true)
    }

    /// Append a historical message. Returns false when a message with the
    /// same id is already stored.
    pub async fn append_message(&self, message: &Message) -> Result<bool, AppError> {
        if self.repo.message_exists(message.id).await? {
            return Ok(false);
        }
        self.repo.save_message(message).await?;
        Ok(true)
    }

    pub async fn transaction_exists(&self, id: TransactionId) -> Result<bool, AppError> {
        Ok(self.repo.transaction_exists(id).await?)
    }

    pub async fn message_exists(&self, id: MessageId) -> Result<bool, AppError> {
        Ok(self.repo.message_exists(id).await?)
    }
}
