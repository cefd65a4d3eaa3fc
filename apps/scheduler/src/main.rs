use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use scheduler_core::{
    Confirm, FeedState, FixedConfirm, FormField, HttpSchedulingService, Notification, Notifier,
    PatientDirectory, SchedulingService, WorkflowController,
};
use shared::domain::AppointmentId;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "scheduler", about = "Schedule and manage patient appointments")]
struct Args {
    /// Scheduling service base URL; overrides config and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List upcoming appointments.
    List,
    /// Show the patients and providers available for scheduling.
    Options,
    /// Book an appointment.
    Create {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        provider: String,
        /// Date and time, e.g. 2024-01-10T09:00 or RFC 3339.
        #[arg(long)]
        at: String,
        #[arg(long)]
        duration: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel an appointment by id.
    Cancel {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// List active patients, optionally filtered by a search term.
    Patients {
        #[arg(long)]
        search: Option<String>,
    },
}

/// Asks on the terminal; anything but y/yes declines.
struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            write!(stdout, "{prompt} [y/N] ")?;
            stdout.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

fn print_notifications(rx: &mut broadcast::Receiver<Notification>) {
    while let Ok(notification) = rx.try_recv() {
        println!(
            "[{}] {}: {}",
            notification.severity.as_str(),
            notification.title,
            notification.message
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(server_url = %settings.server_url, "scheduler starting");

    let service: Arc<dyn SchedulingService> = Arc::new(HttpSchedulingService::new(
        &settings.server_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?);
    let notifier = Notifier::new();
    let mut notes = notifier.subscribe();

    match args.command {
        Command::Patients { search } => {
            let directory = PatientDirectory::start(service, notifier).await;
            let state = match search {
                Some(term) => directory.search(&term).await,
                None => directory.patients().await,
            };
            print_notifications(&mut notes);
            match state {
                FeedState::Failed(err) => return Err(err.into()),
                state if !state.has_data() => println!("No patients found"),
                state => {
                    for patient in state.data() {
                        println!(
                            "{}\t{}\t{} {}\t{}\t{}",
                            patient.id,
                            patient.name,
                            patient.first_name,
                            patient.last_name,
                            patient.email.as_deref().unwrap_or("-"),
                            patient.phone.as_deref().unwrap_or("-"),
                        );
                    }
                }
            }
        }
        command => {
            let confirm: Arc<dyn Confirm> = match &command {
                Command::Cancel { yes: true, .. } => Arc::new(FixedConfirm(true)),
                _ => Arc::new(TerminalConfirm),
            };
            let controller = WorkflowController::start(service, confirm, notifier).await;
            let outcome = run_workflow(&controller, command).await;
            print_notifications(&mut notes);
            controller.shutdown().await;
            outcome?;
        }
    }

    Ok(())
}

async fn run_workflow(controller: &WorkflowController, command: Command) -> Result<()> {
    match command {
        Command::List => {
            if let Some(err) = controller.appointments().current().error() {
                return Err(err.clone().into());
            }
            if !controller.has_appointments() {
                println!("No upcoming appointments");
            }
            for row in controller.display_rows() {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{} min\t{}",
                    row.id,
                    row.name,
                    row.patient_name,
                    row.provider_name,
                    row.specialty,
                    row.scheduled_at.format("%Y-%m-%d %H:%M"),
                    row.duration_minutes,
                    row.status,
                );
            }
        }
        Command::Options => {
            println!("Patients:");
            for option in controller.patient_options() {
                println!("  {}\t{}", option.value, option.label);
            }
            println!("Providers:");
            for option in controller.provider_options() {
                println!("  {}\t{}", option.value, option.label);
            }
        }
        Command::Create {
            patient,
            provider,
            at,
            duration,
            notes,
        } => {
            controller.open_modal();
            controller.field_change(FormField::Patient, patient)?;
            controller.field_change(FormField::Provider, provider)?;
            controller.field_change(FormField::DateTime, at)?;
            if let Some(duration) = duration {
                controller.field_change(FormField::Duration, duration)?;
            }
            if let Some(notes) = notes {
                controller.field_change(FormField::Notes, notes)?;
            }
            let created = controller.submit().await?;
            println!("Created appointment {}", created.id);
        }
        Command::Cancel { id, .. } => {
            let outcome = controller.cancel_appointment(&AppointmentId::new(id)).await?;
            println!("{outcome:?}");
        }
        Command::Patients { .. } => {
            return Err(anyhow!("patients is handled by the patient directory"));
        }
    }
    Ok(())
}
