use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{
    FacultyUpdate, Mailbox, PortalService, RECENT_TRANSACTIONS, StudentUpdate,
};
use crate::domain::{
    Faculty, Gpa, Message, Role, Session, Student, format_cents, format_dollars, parse_cents,
};
use crate::io::{Exporter, ImportOptions, ImportResult, Importer};

/// Aggie Access - student information portal
#[derive(Parser)]
#[command(name = "aggie")]
#[command(about = "Student portal: dashboards, account balance, GPA and messages")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "AGGIE_DATABASE", default_value = "aggie.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log in as: student or faculty
    #[arg(long, env = "AGGIE_ROLE", global = true)]
    pub role: Option<String>,

    /// Username to log in with
    #[arg(short, long, env = "AGGIE_USER", global = true)]
    pub username: Option<String>,

    /// Password to log in with
    #[arg(short, long, env = "AGGIE_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database (safe to run again)
    Init,

    /// Check credentials
    Login,

    /// Show your dashboard
    Dashboard {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Account balance, deposits and withdrawals (students)
    #[command(subcommand)]
    Finance(FinanceCommands),

    /// Your advisor (students)
    #[command(subcommand)]
    Advisor(AdvisorCommands),

    /// Students registered for your course (faculty)
    Advisees,

    /// Update a student's GPA (faculty)
    Gpa {
        /// Student username
        student: String,

        /// New GPA on the 0.0-4.0 scale
        gpa: String,
    },

    /// Send and read messages
    #[command(subcommand)]
    Message(MessageCommands),

    /// Add, edit, or delete users
    #[command(subcommand)]
    User(UserCommands),

    /// Spreadsheet interchange
    #[command(subcommand)]
    Sheet(SheetCommands),
}

#[derive(Subcommand)]
pub enum FinanceCommands {
    /// Show current balance and recent transactions
    Balance,

    /// Deposit money into your account
    Deposit {
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Withdraw money from your account
    Withdraw {
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// List your transactions, newest first
    History {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value_t = RECENT_TRANSACTIONS)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum AdvisorCommands {
    /// Show your advisor's name and email
    Show,

    /// Send a message to your advisor
    Message {
        /// Message text
        text: String,
    },
}

#[derive(Subcommand)]
pub enum MessageCommands {
    /// Send a message (students write to faculty, faculty to students)
    Send {
        /// Recipient full name
        #[arg(long)]
        to: String,

        /// Message text
        text: String,
    },

    /// Messages you received
    Inbox,

    /// Messages you sent
    Sent,

    /// People you can write to
    Contacts,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users of a role
    List {
        /// student or faculty
        #[arg(long = "of", default_value = "student")]
        of_role: String,
    },

    /// Create a student account
    AddStudent {
        /// Username (must be unique)
        new_username: String,

        /// Temporary password
        #[arg(long)]
        temp_password: String,

        #[arg(long, default_value = "")]
        full_name: String,

        #[arg(long, default_value = "")]
        major: String,

        /// Starting GPA (0.0-4.0)
        #[arg(long, default_value = "0.0")]
        gpa: String,

        #[arg(long, default_value = "")]
        email: String,

        /// Advisor number or name
        #[arg(long, default_value = "")]
        advisor: String,

        /// Comma-separated course codes
        #[arg(long, default_value = "")]
        courses: String,
    },

    /// Create a faculty account
    AddFaculty {
        /// Username (must be unique)
        new_username: String,

        /// Temporary password
        #[arg(long)]
        temp_password: String,

        #[arg(long, default_value = "")]
        full_name: String,

        #[arg(long, default_value = "")]
        course: String,

        #[arg(long, default_value = "")]
        schedule: String,

        #[arg(long, default_value = "")]
        advisor_number: String,

        #[arg(long, default_value = "")]
        email: String,
    },

    /// Edit a student's profile (only the given fields change)
    EditStudent {
        target: String,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        major: Option<String>,

        #[arg(long)]
        gpa: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        advisor: Option<String>,

        #[arg(long)]
        courses: Option<String>,
    },

    /// Edit a faculty member's profile (only the given fields change)
    EditFaculty {
        target: String,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        course: Option<String>,

        #[arg(long)]
        schedule: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        advisor_number: Option<String>,
    },

    /// Permanently delete a user
    Delete {
        target: String,

        /// student or faculty
        #[arg(long = "from")]
        from_role: String,

        /// Confirm the record is permanently removed
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SheetCommands {
    /// Write every sheet into a directory (one CSV per sheet)
    Export {
        /// Output directory (csv) or file (json, stdout if omitted)
        output: Option<PathBuf>,

        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },

    /// Load sheets from a directory of CSV files
    Import {
        /// Directory holding Students.csv, Faculty.csv, Transactions.csv, Messages.csv
        input: PathBuf,

        /// Validate without importing
        #[arg(long)]
        dry_run: bool,
    },
}

/// Credentials given on the command line for this invocation.
struct Credentials {
    role: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl Credentials {
    async fn login(&self, service: &PortalService) -> Result<Session> {
        let role_str = self
            .role
            .as_deref()
            .context("Log in first: pass --role, --username and --password")?;
        let role = parse_role(role_str)?;
        let username = self.username.as_deref().context("Missing --username")?;
        let password = self.password.as_deref().unwrap_or("");

        Ok(service.login(role, username, password).await?)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli {
            database,
            role,
            username,
            password,
            command,
            ..
        } = self;
        let credentials = Credentials {
            role,
            username,
            password,
        };

        let service = match command {
            Commands::Init => {
                PortalService::init(&database).await?;
                println!("Database initialized: {}", database);
                return Ok(());
            }
            _ => PortalService::connect(&database).await?,
        };

        // Sheet interchange seeds accounts, so it runs without a session.
        let command = match command {
            Commands::Sheet(cmd) => return run_sheet_command(&service, cmd).await,
            other => other,
        };

        let session = credentials.login(&service).await?;

        match command {
            Commands::Init | Commands::Sheet(_) => {}

            Commands::Login => {
                println!("Login successful.");
                println!("Welcome, {}!", session.full_name);
            }

            Commands::Dashboard { format } => {
                run_dashboard_command(&service, &session, &format).await?;
            }

            Commands::Finance(cmd) => run_finance_command(&service, &session, cmd).await?,

            Commands::Advisor(cmd) => run_advisor_command(&service, &session, cmd).await?,

            Commands::Advisees => {
                let advisees = service.advisees(&session).await?;
                print_advisees(&advisees);
            }

            Commands::Gpa { student, gpa } => {
                let gpa = Gpa::parse(&gpa)?;
                let updated = service.set_gpa(&session, &student, gpa).await?;
                println!("GPA updated for {}!", updated.display_name());
            }

            Commands::Message(cmd) => run_message_command(&service, &session, cmd).await?,

            Commands::User(cmd) => run_user_command(&service, cmd).await?,
        }

        Ok(())
    }
}

async fn run_dashboard_command(
    service: &PortalService,
    session: &Session,
    format: &str,
) -> Result<()> {
    match session.role {
        Role::Student => {
            let dashboard = service.student_dashboard(session).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                return Ok(());
            }

            let s = &dashboard.student;
            println!("{}", session);
            println!("{}", dashboard.mailbox);
            println!();
            println!("Student Dashboard");
            println!("Welcome, {}!", s.display_name());
            println!();
            println!("Academic Information");
            println!("  Major:              {}", s.major);
            println!("  Transcript Level:   {}", s.transcript_level);
            println!("  GPA:                {}", s.gpa);
            println!("  Attendance:         {}", s.attendance);
            println!("  Status:             {}", s.enrollment_status);
            println!("  Qualification:      {}", s.qualification);
            println!("  Courses Registered: {}", dashboard.courses.join(", "));
            println!();
            println!("Finance");
            println!("  Current Balance:    {}", format_dollars(s.account_balance));
            println!();
            println!("Your Advisor");
            match &dashboard.advisor {
                Some(advisor) => {
                    println!("  Name:  {}", advisor.name);
                    println!(
                        "  Email: {}",
                        advisor.email.as_deref().unwrap_or("(not listed)")
                    );
                }
                None => println!("  Not Found"),
            }
        }
        Role::Faculty => {
            let dashboard = service.faculty_dashboard(session).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                return Ok(());
            }

            let f = &dashboard.faculty;
            println!("{}", session);
            println!("{}", dashboard.mailbox);
            println!();
            println!("Faculty Dashboard");
            println!();
            println!("Instructor Information");
            println!("  Course:         {}", f.course);
            println!("  Schedule:       {}", f.schedule);
            println!("  Advisor Number: {}", f.advisor_number);
            println!("  Email:          {}", f.email);
            println!();
            print_advisees(&dashboard.advisees);
        }
    }
    Ok(())
}

async fn run_finance_command(
    service: &PortalService,
    session: &Session,
    cmd: FinanceCommands,
) -> Result<()> {
    match cmd {
        FinanceCommands::Balance => {
            let balance = service.balance(session).await?;
            println!("Current Balance: {}", format_dollars(balance));
            println!();
            let records = service.recent_transactions(session, RECENT_TRANSACTIONS).await?;
            print_transactions(&records);
        }

        FinanceCommands::Deposit { amount } => {
            let amount_cents = parse_amount(&amount, "deposit")?;
            let result = service.deposit(session, amount_cents).await?;
            println!("{}", result.notice);
            println!(
                "Current Balance: {}",
                format_dollars(result.record.new_balance)
            );
        }

        FinanceCommands::Withdraw { amount } => {
            let amount_cents = parse_amount(&amount, "withdrawal")?;
            let result = match service.withdraw(session, amount_cents).await {
                Ok(result) => result,
                Err(err) => {
                    if let Some(detail) = err.detail() {
                        eprintln!("{}", detail);
                    }
                    return Err(err.into());
                }
            };
            println!("{}", result.notice);
            println!(
                "Current Balance: {}",
                format_dollars(result.record.new_balance)
            );
        }

        FinanceCommands::History { limit } => {
            let records = service.recent_transactions(session, limit).await?;
            print_transactions(&records);
        }
    }
    Ok(())
}

async fn run_advisor_command(
    service: &PortalService,
    session: &Session,
    cmd: AdvisorCommands,
) -> Result<()> {
    match cmd {
        AdvisorCommands::Show => match service.advisor(session).await? {
            Some(advisor) => {
                println!("Advisor Name:  {}", advisor.name);
                println!(
                    "Advisor Email: {}",
                    advisor.email.as_deref().unwrap_or("(not listed)")
                );
                println!(
                    "You can contact your advisor for help with courses, grades, or graduation plans."
                );
            }
            None => {
                println!("Advisor Name:  Not Found");
                println!("Advisor Email: Not Found");
            }
        },

        AdvisorCommands::Message { text } => {
            let notice = service.message_advisor(session, &text).await?;
            println!("{}", notice);
        }
    }
    Ok(())
}

async fn run_message_command(
    service: &PortalService,
    session: &Session,
    cmd: MessageCommands,
) -> Result<()> {
    match cmd {
        MessageCommands::Send { to, text } => {
            let notice = service.send_message(session, &to, &text).await?;
            println!("{}", notice);
        }

        MessageCommands::Inbox => {
            let mailbox = service.mailbox(session).await?;
            print_mailbox_section(&mailbox, true);
        }

        MessageCommands::Sent => {
            let mailbox = service.mailbox(session).await?;
            print_mailbox_section(&mailbox, false);
        }

        MessageCommands::Contacts => {
            let contacts = service.contacts(session).await?;
            if contacts.is_empty() {
                println!("No one available to message.");
            }
            for name in contacts {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

async fn run_user_command(service: &PortalService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::List { of_role } => match parse_role(&of_role)? {
            Role::Student => {
                let students = service.list_students().await?;
                println!("{:<16} {:<24} {:<16} {:>5}", "USERNAME", "NAME", "MAJOR", "GPA");
                println!("{}", "-".repeat(64));
                for s in students {
                    println!(
                        "{:<16} {:<24} {:<16} {:>5}",
                        truncate(&s.username, 16),
                        truncate(&s.full_name, 24),
                        truncate(&s.major, 16),
                        s.gpa
                    );
                }
            }
            Role::Faculty => {
                let faculty = service.list_faculty().await?;
                println!("{:<16} {:<24} {:<12} {:<8}", "USERNAME", "NAME", "COURSE", "ADVISOR");
                println!("{}", "-".repeat(63));
                for f in faculty {
                    println!(
                        "{:<16} {:<24} {:<12} {:<8}",
                        truncate(&f.username, 16),
                        truncate(&f.full_name, 24),
                        truncate(&f.course, 12),
                        f.advisor_number
                    );
                }
            }
        },

        UserCommands::AddStudent {
            new_username,
            temp_password,
            full_name,
            major,
            gpa,
            email,
            advisor,
            courses,
        } => {
            let student = Student::new(new_username.trim(), temp_password)
                .with_full_name(full_name)
                .with_major(major)
                .with_gpa(Gpa::parse(&gpa)?)
                .with_email(email)
                .with_advisor(advisor)
                .with_courses(courses);
            service.add_student(student).await?;
            println!("New student account created!");
        }

        UserCommands::AddFaculty {
            new_username,
            temp_password,
            full_name,
            course,
            schedule,
            advisor_number,
            email,
        } => {
            let mut faculty = Faculty::new(new_username.trim(), temp_password)
                .with_full_name(full_name)
                .with_course(course)
                .with_advisor_number(advisor_number)
                .with_email(email);
            faculty.schedule = schedule;
            service.add_faculty(faculty).await?;
            println!("New faculty account created!");
        }

        UserCommands::EditStudent {
            target,
            full_name,
            major,
            gpa,
            email,
            advisor,
            courses,
        } => {
            let update = StudentUpdate {
                full_name,
                major,
                gpa: gpa.as_deref().map(Gpa::parse).transpose()?,
                email,
                advisor_assigned: advisor,
                course_registered: courses,
            };
            service.update_student(&target, update).await?;
            println!("Student '{}' updated successfully!", target);
        }

        UserCommands::EditFaculty {
            target,
            full_name,
            course,
            schedule,
            email,
            advisor_number,
        } => {
            let update = FacultyUpdate {
                full_name,
                course,
                schedule,
                email,
                advisor_number,
            };
            service.update_faculty(&target, update).await?;
            println!("Faculty '{}' updated successfully!", target);
        }

        UserCommands::Delete {
            target,
            from_role,
            yes,
        } => {
            let role = parse_role(&from_role)?;
            service.delete_user(role, &target, yes).await?;
            println!("{} '{}' deleted successfully!", role, target);
        }
    }
    Ok(())
}

async fn run_sheet_command(service: &PortalService, cmd: SheetCommands) -> Result<()> {
    match cmd {
        SheetCommands::Export { output, format } => {
            let exporter = Exporter::new(service);
            match format.as_str() {
                "csv" => {
                    let dir = output.context("CSV export needs an output directory")?;
                    for (sheet, count) in exporter.export_workbook(&dir).await? {
                        println!("Exported {} rows to {}", count, dir.join(sheet.file_name()).display());
                    }
                }
                "json" => match output {
                    Some(path) => {
                        let file = std::fs::File::create(&path).with_context(|| {
                            format!("Failed to create output file: {}", path.display())
                        })?;
                        let snapshot = exporter.export_snapshot_json(file).await?;
                        eprintln!(
                            "Exported {} students, {} faculty, {} transactions, {} messages",
                            snapshot.students.len(),
                            snapshot.faculty.len(),
                            snapshot.transactions.len(),
                            snapshot.messages.len()
                        );
                    }
                    None => {
                        exporter.export_snapshot_json(std::io::stdout()).await?;
                    }
                },
                other => anyhow::bail!("Invalid export format '{}'. Valid formats: csv, json", other),
            }
        }

        SheetCommands::Import { input, dry_run } => {
            let importer = Importer::new(service);
            let options = ImportOptions { dry_run };
            let results = importer.import_workbook(&input, &options).await?;

            if dry_run {
                println!("Dry run - nothing was written.");
            }
            for (sheet, result) in &results {
                print_import_result(&sheet.to_string(), result);
            }
        }
    }
    Ok(())
}

fn print_import_result(sheet: &str, result: &ImportResult) {
    println!(
        "{:<14} imported {}, skipped {}, errors {}",
        sheet,
        result.imported,
        result.skipped,
        result.errors.len()
    );
    for err in &result.errors {
        match &err.field {
            Some(field) => println!("  line {} ({}): {}", err.line, field, err.error),
            None => println!("  line {}: {}", err.line, err.error),
        }
    }
}

fn print_transactions(records: &[crate::domain::TransactionRecord]) {
    if records.is_empty() {
        println!("No transactions recorded yet.");
        return;
    }

    println!("Recent Transactions");
    println!(
        "{:<20} {:<11} {:>12} {:>12} {:>12}",
        "TIMESTAMP", "TYPE", "AMOUNT", "OLD BALANCE", "NEW BALANCE"
    );
    println!("{}", "-".repeat(71));
    for r in records {
        println!(
            "{:<20} {:<11} {:>12} {:>12} {:>12}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.kind,
            format_cents(r.amount_cents),
            format_cents(r.old_balance),
            format_cents(r.new_balance)
        );
    }
}

fn print_advisees(advisees: &[Student]) {
    if advisees.is_empty() {
        println!("No students registered for your course.");
        return;
    }

    println!("{:<16} {:<28} {:>5}", "USERNAME", "STUDENT", "GPA");
    println!("{}", "-".repeat(51));
    for s in advisees {
        println!(
            "{:<16} {:<28} {:>5}",
            truncate(&s.username, 16),
            truncate(s.display_name(), 28),
            s.gpa
        );
    }
}

fn print_mailbox_section(mailbox: &Mailbox, inbox: bool) {
    let (title, messages, empty) = if inbox {
        ("Inbox", &mailbox.inbox, "No messages received yet.")
    } else {
        ("Sent", &mailbox.sent, "No messages sent yet.")
    };

    println!("{}", mailbox.counts);
    println!();
    println!("{}", title);
    if messages.is_empty() {
        println!("{}", empty);
        return;
    }
    for m in messages {
        print_message(m, inbox);
    }
}

fn print_message(message: &Message, inbox: bool) {
    let (label, who) = if inbox {
        ("From", &message.sender)
    } else {
        ("To", &message.receiver)
    };
    println!(
        "{}: {}  |  At: {}",
        label,
        who,
        message.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", message.body);
    println!("{}", "-".repeat(40));
}

fn parse_role(s: &str) -> Result<Role> {
    Role::from_str(s)
        .with_context(|| format!("Invalid role '{}'. Valid roles: student, faculty", s))
}

/// Parse a deposit/withdrawal amount, rejecting zero and negatives with the
/// dashboard's wording.
fn parse_amount(input: &str, what: &str) -> Result<i64> {
    let cents = parse_cents(input).context("Invalid amount format. Use '50.00' or '50'")?;
    if cents <= 0 {
        anyhow::bail!("Enter a {} amount greater than 0.", what);
    }
    Ok(cents)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
