use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{Command, DirectorySaver, HttpBackend, Orchestrator, UiEvent};
use shared::domain::ExportFormat;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, parse_server_url};

/// Upload timetable data, generate class schedules and download them.
#[derive(Parser, Debug)]
#[command(name = "timetable")]
struct Args {
    /// Backend base URL; overrides timetable.toml and the environment.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Directory downloaded files are saved into.
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Fetch the department, class and teacher dropdown options.
    Options,
    /// Upload a workbook and list the departments and classes it contains.
    Upload { file: PathBuf },
    /// Upload a workbook, generate one class schedule and optionally download it.
    Schedule {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        department: String,
        #[arg(long = "class")]
        class_name: String,
        /// pdf, word, excel or csv
        #[arg(long)]
        format: Option<ExportFormat>,
    },
    /// Ask the backend to generate timetables for every class.
    Generate,
    /// Download the entire timetable for all departments and classes.
    DownloadAll {
        #[arg(long)]
        format: Option<ExportFormat>,
    },
    /// Export the stored timetable.
    Export {
        #[arg(long)]
        format: Option<ExportFormat>,
    },
}

impl CliCommand {
    fn steps(self) -> Vec<Command> {
        match self {
            CliCommand::Options => vec![Command::LoadOptions],
            CliCommand::Upload { file } => vec![Command::StageFile(Some(file)), Command::Upload],
            CliCommand::Schedule {
                file,
                department,
                class_name,
                format,
            } => {
                let mut steps = vec![
                    Command::StageFile(Some(file)),
                    Command::Upload,
                    Command::Select {
                        department: Some(department),
                        class_name: Some(class_name),
                    },
                    Command::GenerateSchedule,
                ];
                if format.is_some() {
                    steps.push(Command::DownloadSchedule { format });
                }
                steps
            }
            CliCommand::Generate => vec![Command::GenerateAll],
            CliCommand::DownloadAll { format } => vec![Command::DownloadEntireTimetable { format }],
            CliCommand::Export { format } => vec![Command::ExportTimetable { format }],
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(v) = args.server_url {
        settings.server_url = v;
    }
    if let Some(v) = args.timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = args.download_dir {
        settings.download_dir = v;
    }

    let server_url = parse_server_url(&settings.server_url)?;
    info!(%server_url, download_dir = %settings.download_dir.display(), "starting session");
    let backend = HttpBackend::new(server_url, settings.request_timeout())
        .context("failed to build backend client")?;
    let orchestrator = Orchestrator::new(
        Arc::new(backend),
        Arc::new(DirectorySaver::new(settings.download_dir)),
    );
    let mut events = orchestrator.subscribe_events();

    for step in args.command.steps() {
        let result = orchestrator.dispatch(step).await;
        print_events(&mut events);
        if result.is_err() {
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_events(events: &mut Receiver<UiEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => print_event(event),
            Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "ui events dropped"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn print_event(event: UiEvent) {
    match event {
        UiEvent::Info(message) => println!("{message}"),
        UiEvent::DropdownPopulated(dropdown) => {
            let values: Vec<&str> = dropdown.values().collect();
            if values.is_empty() {
                println!("{}: (none)", dropdown.category);
            } else {
                println!("{}: {}", dropdown.category, values.join(", "));
            }
        }
        UiEvent::ScheduleRendered(table) => {
            println!("Generated Schedule");
            println!("{}", table.to_text());
        }
        UiEvent::FileSaved { path } => println!("Saved {}", path.display()),
        UiEvent::Error(error) => eprintln!("{}", error.message()),
        UiEvent::PhaseChanged(phase) => debug!(?phase, "phase changed"),
        UiEvent::SelectionFormShown => debug!("selection form shown"),
    }
}
