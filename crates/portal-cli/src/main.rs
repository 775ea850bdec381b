//! Portal CLI
//!
//! Command-line interface for the teacher/student math portal.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use portal_core::{Config, Portal, SectionTheme};

mod commands;
mod editor;
mod output;

use commands::student::{StudentChanges, StudentForm};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Math portal - teacher profile, student results and quick links")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enter admin mode with this email before running the command
    #[arg(long = "as", value_name = "EMAIL", global = true)]
    admin_email: Option<String>,

    /// Answer yes to confirmation dialogs
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection, storage and content status
    Status,
    /// Public directory: featured students, results, sections and links
    #[command(alias = "dir")]
    Directory {
        /// Search by name or roll number
        #[arg(short, long)]
        search: Option<String>,
        /// Only this class
        #[arg(short, long)]
        class: Option<String>,
        /// Only this year
        #[arg(short = 'Y', long)]
        year: Option<String>,
    },
    /// Manage students
    Student {
        #[command(subcommand)]
        command: StudentCommands,
    },
    /// Manage quick links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// Manage custom page sections
    Section {
        #[command(subcommand)]
        command: SectionCommands,
    },
    /// Show or edit the teacher profile
    Teacher {
        #[command(subcommand)]
        command: Option<TeacherCommands>,
    },
    /// Push every collection to the remote store
    Push,
    /// Follow realtime changes until interrupted
    Watch,
    /// Ask the math tutor (interactive when no message is given)
    Chat {
        /// Message to send
        message: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum StudentCommands {
    /// List students (admins also see hidden ones)
    #[command(alias = "ls")]
    List,
    /// Show student details
    Show {
        /// Student ID
        id: String,
    },
    /// Create a student
    #[command(alias = "create")]
    Add {
        /// Full name
        name: String,
        /// Class or batch (e.g. "Class 12")
        class: String,
        #[command(flatten)]
        form: StudentForm,
    },
    /// Edit a student (interactive when no changes are given)
    Edit {
        /// Student ID
        id: String,
        #[command(flatten)]
        changes: StudentChanges,
    },
    /// Flip a student's visibility or featured flag
    Toggle {
        /// Student ID
        id: String,
        /// Which flag to flip
        #[arg(value_enum, default_value_t = ToggleField::Visible)]
        field: ToggleField,
    },
    /// Delete a student
    #[command(alias = "rm")]
    Delete {
        /// Student ID
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToggleField {
    Visible,
    Featured,
}

#[derive(Subcommand)]
enum LinkCommands {
    /// List quick links
    #[command(alias = "ls")]
    List,
    /// Add a quick link
    #[command(alias = "create")]
    Add {
        /// Link title
        title: String,
        /// Link URL
        url: String,
    },
    /// Edit a quick link
    Edit {
        /// Link ID
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New URL
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Delete a quick link
    #[command(alias = "rm")]
    Delete {
        /// Link ID
        id: String,
    },
}

#[derive(Subcommand)]
enum SectionCommands {
    /// List sections (admins also see hidden ones)
    #[command(alias = "ls")]
    List,
    /// Add a placeholder section
    #[command(alias = "create")]
    Add,
    /// Update section fields
    Update {
        /// Section ID
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New content
        #[arg(short, long)]
        content: Option<String>,
        /// Colour theme (light, dark, amber)
        #[arg(long)]
        theme: Option<SectionTheme>,
        /// Show or hide the section
        #[arg(long)]
        visible: Option<bool>,
    },
    /// Delete a section
    #[command(alias = "rm")]
    Delete {
        /// Section ID
        id: String,
    },
}

#[derive(Subcommand)]
enum TeacherCommands {
    /// Show the teacher profile
    Show,
    /// Update profile fields
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        tagline: Option<String>,
        #[arg(long)]
        years_exp: Option<String>,
        #[arg(long)]
        students_count: Option<String>,
        #[arg(long)]
        success_rate: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, local_backend, remote_url, remote_key,
        /// remote_enabled, trust_empty_remote, admin_emails, chat_model, chat_endpoint)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    init_logging();

    // Commands that don't need the portal session
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;

    if let Commands::Chat { message } = &cli.command {
        return commands::chat::run(&config, message.clone(), &output).await;
    }

    let mut portal = Portal::open(&config)?;
    let connected = portal.boot().await;
    if config.remote_ready() && !connected {
        output.warn("Remote store unreachable, working from local data");
    }

    if let Some(ref email) = cli.admin_email {
        if !portal.enter_admin(email) {
            portal.shutdown().await;
            bail!("'{}' is not allowed to enter admin mode", email);
        }
    }

    let result = run_command(cli.command, &mut portal, cli.yes, &output).await;

    // Let queued pushes finish before exiting
    portal.shutdown().await;
    if let Some(stats) = portal.outbox_stats() {
        if stats.failed > 0 {
            output.warn(&format!(
                "{} push(es) to the remote store failed; run `portal push` to retry",
                stats.failed
            ));
        }
    }
    if portal.store().failed_writes() > 0 {
        output.warn("Some changes could not be saved locally; check free space and permissions");
    }

    result
}

async fn run_command(
    command: Commands,
    portal: &mut Portal,
    assume_yes: bool,
    output: &Output,
) -> Result<()> {
    match command {
        Commands::Status => commands::status::show(portal, output),
        Commands::Directory {
            search,
            class,
            year,
        } => commands::directory::show(portal, search, class, year, output),
        Commands::Student { command } => {
            handle_student_command(command, portal, assume_yes, output)
        }
        Commands::Link { command } => handle_link_command(command, portal, assume_yes, output),
        Commands::Section { command } => {
            handle_section_command(command, portal, assume_yes, output)
        }
        Commands::Teacher { command } => handle_teacher_command(command, portal, output).await,
        Commands::Push => commands::push::push(portal, output).await,
        Commands::Watch => commands::watch::watch(portal, output).await,
        // Handled before the session is opened
        Commands::Chat { .. } | Commands::Config { .. } => Ok(()),
    }
}

fn handle_student_command(
    command: StudentCommands,
    portal: &mut Portal,
    assume_yes: bool,
    output: &Output,
) -> Result<()> {
    match command {
        StudentCommands::List => commands::student::list(portal, output),
        StudentCommands::Show { id } => commands::student::show(portal, &id, output),
        StudentCommands::Add { name, class, form } => {
            commands::student::add(portal, name, class, form, output)
        }
        StudentCommands::Edit { id, changes } => {
            commands::student::edit(portal, &id, changes, assume_yes, output)
        }
        StudentCommands::Toggle { id, field } => {
            commands::student::toggle(portal, &id, field, output)
        }
        StudentCommands::Delete { id } => {
            commands::student::delete(portal, &id, assume_yes, output)
        }
    }
}

fn handle_link_command(
    command: LinkCommands,
    portal: &mut Portal,
    assume_yes: bool,
    output: &Output,
) -> Result<()> {
    match command {
        LinkCommands::List => commands::link::list(portal, output),
        LinkCommands::Add { title, url } => commands::link::add(portal, title, url, output),
        LinkCommands::Edit { id, title, url } => {
            commands::link::edit(portal, &id, title, url, output)
        }
        LinkCommands::Delete { id } => commands::link::delete(portal, &id, assume_yes, output),
    }
}

fn handle_section_command(
    command: SectionCommands,
    portal: &mut Portal,
    assume_yes: bool,
    output: &Output,
) -> Result<()> {
    match command {
        SectionCommands::List => commands::section::list(portal, output),
        SectionCommands::Add => commands::section::add(portal, output),
        SectionCommands::Update {
            id,
            title,
            content,
            theme,
            visible,
        } => {
            let patch = portal_core::SectionPatch {
                title,
                content,
                theme,
                is_visible: visible,
            };
            commands::section::update(portal, &id, patch, output)
        }
        SectionCommands::Delete { id } => {
            commands::section::delete(portal, &id, assume_yes, output)
        }
    }
}

async fn handle_teacher_command(
    command: Option<TeacherCommands>,
    portal: &mut Portal,
    output: &Output,
) -> Result<()> {
    match command {
        Some(TeacherCommands::Show) | None => commands::teacher::show(portal, output),
        Some(TeacherCommands::Set {
            name,
            photo,
            bio,
            tagline,
            years_exp,
            students_count,
            success_rate,
        }) => {
            let changes = commands::teacher::TeacherChanges {
                name,
                photo,
                bio,
                tagline,
                years_exp,
                students_count,
                success_rate,
            };
            commands::teacher::set(portal, changes, output).await
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr, filtered by PORTAL_LOG (default: warn)
fn init_logging() {
    let log_level = std::env::var("PORTAL_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::new(format!(
        "portal_core={},portal_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
