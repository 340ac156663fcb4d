use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::api::{ApiClient, StaffFilter, StudentFilter};
use crate::config::Config;
use crate::directory::{DeleteOutcome, DirectoryController, Phase, DELETE_PROMPT};
use crate::forms::{
    read_enrollment_csv, FeedbackForm, RegistrationForm, StaffOnboardingForm,
    StudentEnrollmentForm, SubmitOutcome, TodoForm, DEFAULT_PASSWORD,
};
use crate::modal::Viewport;
use crate::models::{EntityKind, Ratings};
use crate::portal::Portal;
use crate::report;
use crate::session::SessionStore;

#[derive(Parser)]
#[command(name = "academic-portal")]
#[command(about = "Terminal client for the academic management portals", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Create a student account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Institutional overview for admins
    Overview {
        /// Write the markdown report to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also show the strategic action plan
        #[arg(long)]
        action_plan: bool,
    },
    /// Manage students
    #[command(subcommand)]
    Students(StudentsCommand),
    /// Manage staff
    #[command(subcommand)]
    Staff(StaffCommand),
    /// Interactive user directory with live search
    Directory {
        #[arg(long, default_value = "student")]
        kind: EntityKind,
    },
    /// Faculty portal
    #[command(subcommand)]
    Faculty(FacultyCommand),
    /// Student portal
    #[command(subcommand)]
    Student(StudentCommand),
}

#[derive(Subcommand)]
pub enum StudentsCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        year: Option<u8>,
    },
    Show {
        id: Uuid,
    },
    /// Enroll one student
    Enroll(EnrollArgs),
    /// Enroll students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    Delete {
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct EnrollArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    personal_email: String,
    #[arg(long, default_value = DEFAULT_PASSWORD)]
    password: String,
    #[arg(long, default_value = "CSE")]
    department: String,
    #[arg(long, default_value_t = 1)]
    year: u8,
    /// Date of birth, YYYY-MM-DD
    #[arg(long)]
    dob: String,
    #[arg(long, default_value = "O+")]
    blood_group: String,
    #[arg(long)]
    parent_phone: String,
    #[arg(long)]
    personal_phone: String,
    #[arg(long, default_value = "")]
    previous_school: String,
    #[arg(long, default_value_t = 0.0)]
    cgpa: f64,
}

#[derive(Subcommand)]
pub enum StaffCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
    Show {
        id: Uuid,
    },
    /// Onboard one staff member
    Onboard(OnboardArgs),
    Delete {
        id: Uuid,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct OnboardArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    personal_email: String,
    #[arg(long, default_value = DEFAULT_PASSWORD)]
    password: String,
    #[arg(long, default_value = "")]
    staff_id: String,
    #[arg(long, default_value = "CSE")]
    department: String,
    #[arg(long, default_value = "Assistant Professor")]
    designation: String,
    #[arg(long, default_value = "")]
    personal_phone: String,
    #[arg(long, default_value = "")]
    primary_skill: String,
    #[arg(long, default_value = "")]
    be_degree: String,
    #[arg(long, default_value = "")]
    me_degree: String,
}

#[derive(Subcommand)]
pub enum FacultyCommand {
    /// The logged-in faculty member's profile
    Profile,
    /// Students assigned to the logged-in faculty member
    Students {
        #[arg(long)]
        year: Option<u8>,
    },
    /// Submit feedback for a student
    Feedback {
        #[arg(long)]
        student: Uuid,
        /// Rating applied to every metric
        #[arg(long, default_value_t = 5.0)]
        rating: f64,
        #[arg(long, default_value = "")]
        remarks: String,
    },
}

#[derive(Subcommand)]
pub enum StudentCommand {
    Profile,
    Todos,
    AddTodo {
        task: String,
        #[arg(long, default_value = "Medium")]
        priority: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    ToggleTodo {
        id: Uuid,
    },
    StudyPlan,
}

pub async fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let session = Arc::new(SessionStore::open(&config.session_file));
    let api = Arc::new(ApiClient::new(config, session)?);
    let portal = Portal::new(Arc::clone(&api));

    match cli.command {
        Commands::Login { email, password } => {
            let session = api.login(&email, &password).await.context("login failed")?;
            println!(
                "Logged in as {} (home {}).",
                session.role,
                session.role.home_route()
            );
        }
        Commands::Logout => {
            portal.clear();
            if api.logout()? {
                println!("Logged out.");
            } else {
                println!("No active session.");
            }
        }
        Commands::Whoami => {
            let user = api.me().await?;
            println!(
                "{} ({}) {}",
                user.full_name.as_deref().unwrap_or(&user.email),
                user.role,
                user.email
            );
            if let Some(institutional) = &user.institutional_email {
                println!("Institutional email: {institutional}");
            }
        }
        Commands::Register {
            email,
            password,
            confirm_password,
        } => {
            let form = RegistrationForm {
                email,
                password,
                confirm_password,
            };
            let result = match form.validate() {
                Ok(request) => api.register(&request).await,
                Err(err) => Err(err),
            };
            print_outcome(&SubmitOutcome::from_result(
                result,
                "Account created. You can log in now.",
            ))?;
        }
        Commands::Overview { out, action_plan } => {
            let overview = portal.overview().await?;
            let mut text = report::render_overview((*overview).as_ref());
            if action_plan {
                if let Some(overview) = (*overview).as_ref() {
                    let viewport = Viewport::new();
                    text.push('\n');
                    text.push_str(&report::render_action_plan(&viewport, overview));
                }
            }
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::Students(command) => run_students(&portal, command).await?,
        Commands::Staff(command) => run_staff(&portal, command).await?,
        Commands::Directory { kind } => run_directory(api, kind, config).await?,
        Commands::Faculty(command) => run_faculty(&api, command).await?,
        Commands::Student(command) => run_student(&portal, command).await?,
    }

    Ok(())
}

async fn run_students(portal: &Portal, command: StudentsCommand) -> anyhow::Result<()> {
    let api = portal.api();
    match command {
        StudentsCommand::List {
            search,
            department,
            year,
        } => {
            let filter = StudentFilter {
                search,
                department,
                year,
            };
            let students = api.list_students(&filter).await?;
            print!("{}", report::render_students(&students, year));
        }
        StudentsCommand::Show { id } => {
            let detail = portal.student(id).await?;
            print!("{}", report::render_student_detail(&detail));
        }
        StudentsCommand::Enroll(args) => {
            let form = StudentEnrollmentForm {
                full_name: args.full_name,
                personal_email: args.personal_email,
                password: args.password,
                department: args.department.to_uppercase(),
                year: args.year,
                dob: args.dob,
                blood_group: args.blood_group.to_uppercase(),
                parent_phone: args.parent_phone,
                personal_phone: args.personal_phone,
                previous_school: args.previous_school,
                current_cgpa: args.cgpa,
            };
            println!("Institutional email preview: {}", form.email_preview());
            let result = match form.validate() {
                Ok(request) => api.create_student(&request).await,
                Err(err) => Err(err),
            };
            print_outcome(&SubmitOutcome::from_result(
                result,
                "Student enrolled successfully",
            ))?;
        }
        StudentsCommand::Import { csv } => {
            let rows = read_enrollment_csv(&csv)?;
            let mut created = 0usize;
            let mut failed = 0usize;
            for row in rows {
                let result = match row.outcome {
                    Ok(request) => api
                        .create_student(&request)
                        .await
                        .map_err(|err| err.user_message()),
                    Err(message) => Err(message),
                };
                match result {
                    Ok(student) => {
                        created += 1;
                        tracing::info!(line = row.line, id = %student.id, "student imported");
                    }
                    Err(message) => {
                        failed += 1;
                        println!("- line {}: {}", row.line, message);
                    }
                }
            }
            println!(
                "Enrolled {created} students from {} ({failed} failed).",
                csv.display()
            );
            import_status(created, failed)?;
        }
        StudentsCommand::Delete { id, yes } => {
            delete_entry(portal, EntityKind::Student, id, yes).await?;
        }
    }
    Ok(())
}

async fn run_staff(portal: &Portal, command: StaffCommand) -> anyhow::Result<()> {
    let api = portal.api();
    match command {
        StaffCommand::List { search, department } => {
            let staff = api.list_staff(&StaffFilter { search, department }).await?;
            print!("{}", report::render_staff_list(&staff));
        }
        StaffCommand::Show { id } => {
            let detail = portal.staff(id).await?;
            print!("{}", report::render_staff_detail(&detail));
        }
        StaffCommand::Onboard(args) => {
            let form = StaffOnboardingForm {
                full_name: args.full_name,
                personal_email: args.personal_email,
                password: args.password,
                staff_id: args.staff_id,
                department: args.department.to_uppercase(),
                designation: args.designation,
                personal_phone: args.personal_phone,
                primary_skill: args.primary_skill,
                be_degree: args.be_degree,
                me_degree: args.me_degree,
            };
            println!("Institutional email preview: {}", form.email_preview());
            let result = match form.validate() {
                Ok(request) => api.create_staff(&request).await,
                Err(err) => Err(err),
            };
            print_outcome(&SubmitOutcome::from_result(
                result,
                "Staff member onboarded successfully",
            ))?;
        }
        StaffCommand::Delete { id, yes } => {
            delete_entry(portal, EntityKind::Staff, id, yes).await?;
        }
    }
    Ok(())
}

async fn delete_entry(
    portal: &Portal,
    kind: EntityKind,
    id: Uuid,
    yes: bool,
) -> anyhow::Result<()> {
    if !yes && !prompt_yes_no(DELETE_PROMPT)? {
        println!("Cancelled.");
        return Ok(());
    }
    let response = portal.delete(kind, id).await?;
    println!("{}", response.message);
    Ok(())
}

fn prompt_yes_no(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// One line of interactive directory input.
#[derive(Debug, Clone, PartialEq)]
enum DirectoryInput {
    Query(String),
    Kind(EntityKind),
    Delete(Uuid),
    Quit,
    Invalid(String),
}

fn parse_directory_input(line: &str) -> DirectoryInput {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return DirectoryInput::Query(line.to_string());
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));
    match name {
        "quit" | "q" => DirectoryInput::Quit,
        "kind" => match arg.parse() {
            Ok(kind) => DirectoryInput::Kind(kind),
            Err(err) => DirectoryInput::Invalid(err),
        },
        "delete" => match Uuid::parse_str(arg) {
            Ok(id) => DirectoryInput::Delete(id),
            Err(_) => DirectoryInput::Invalid(format!("not a valid id: {arg}")),
        },
        other => DirectoryInput::Invalid(format!("unknown command :{other}")),
    }
}

async fn run_directory(api: Arc<ApiClient>, kind: EntityKind, config: &Config) -> anyhow::Result<()> {
    let controller = DirectoryController::new(api, kind, config.debounce());
    let mut updates = controller.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let view = updates.borrow_and_update().clone();
            if view.phase == Phase::Idle {
                print!("{}", report::render_directory(&view));
                let _ = std::io::stdout().flush();
            }
        }
    });

    println!("Type to search. Commands: :kind student|staff, :delete <id>, :quit");
    controller.mount();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_directory_input(&line) {
            DirectoryInput::Query(query) => controller.set_query(query),
            DirectoryInput::Kind(kind) => controller.set_kind(kind),
            DirectoryInput::Quit => break,
            DirectoryInput::Invalid(message) => eprintln!("{message}"),
            DirectoryInput::Delete(id) => {
                print!("{DELETE_PROMPT} [y/N] ");
                std::io::stdout().flush()?;
                let answer = lines.next_line().await?.unwrap_or_default();
                let confirmed = is_yes(&answer);
                match controller.delete(id, &move |_: &str| confirmed).await {
                    Ok(DeleteOutcome::Cancelled) => println!("Cancelled."),
                    Ok(DeleteOutcome::Deleted) => {}
                    // Already shown as a notice by the controller.
                    Err(err) => tracing::debug!(error = %err, "directory delete failed"),
                }
            }
        }
    }

    drop(controller);
    printer.abort();
    Ok(())
}

async fn run_faculty(api: &ApiClient, command: FacultyCommand) -> anyhow::Result<()> {
    match command {
        FacultyCommand::Profile => {
            let staff = api.my_staff_profile().await?;
            print!("{}", report::render_staff_profile(&staff));
        }
        FacultyCommand::Students { year } => {
            let students = api.faculty_students(year).await?;
            print!("{}", report::render_students(&students, year));
        }
        FacultyCommand::Feedback {
            student,
            rating,
            remarks,
        } => {
            let mut form = FeedbackForm::new(student);
            form.ratings = Ratings::uniform(rating);
            form.detailed_remarks = remarks;
            let result = match form.validate() {
                Ok(feedback) => api.submit_feedback(&feedback).await,
                Err(err) => Err(err),
            };
            let outcome = SubmitOutcome::from_result(result, "Feedback submitted");
            if let SubmitOutcome::Created { record, .. } = &outcome {
                println!("Overall rating {:.1}", record.overall_rating);
            }
            print_outcome(&outcome)?;
        }
    }
    Ok(())
}

async fn run_student(portal: &Portal, command: StudentCommand) -> anyhow::Result<()> {
    let api = portal.api();
    match command {
        StudentCommand::Profile => {
            let detail = portal.student_profile().await?;
            print!("{}", report::render_student_detail(&detail));
        }
        StudentCommand::Todos => {
            let todos = api.todos().await?;
            print!("{}", report::render_todos(&todos));
        }
        StudentCommand::AddTodo {
            task,
            priority,
            due,
        } => {
            let mut form = TodoForm::new(task);
            form.priority = priority;
            form.due_date = due;
            let result = match form.validate() {
                Ok(todo) => api.add_todo(&todo).await,
                Err(err) => Err(err),
            };
            print_outcome(&SubmitOutcome::from_result(result, "Task added"))?;
        }
        StudentCommand::ToggleTodo { id } => {
            let toggle = api.toggle_todo(id).await?;
            let state = if toggle.is_completed { "done" } else { "open" };
            println!("{} ({state})", toggle.message);
        }
        StudentCommand::StudyPlan => {
            let plan = api.study_plan().await?;
            print!("{}", report::render_study_plan(&plan));
        }
    }
    Ok(())
}

fn import_status(created: usize, failed: usize) -> anyhow::Result<()> {
    if failed > 0 {
        anyhow::bail!("{failed} of {} rows were not enrolled", created + failed);
    }
    Ok(())
}

/// Prints a success notice, or turns a failed submission into an error so
/// the process exits non-zero.
fn print_outcome<T>(outcome: &SubmitOutcome<T>) -> anyhow::Result<()> {
    match outcome {
        SubmitOutcome::Created { notice, .. } => {
            println!("{}", notice.message);
            Ok(())
        }
        SubmitOutcome::Failed { notice } => anyhow::bail!("{}", notice.message),
    }
}
