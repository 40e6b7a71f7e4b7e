//! Spotless CLI: upload a job's photos and manage what is stored for a booking.
//!
//! Configuration comes from the environment (see `UploadConfig::from_env`).

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use spotless_cli::{init_tracing, load_selection, render_report, truncate_string};
use spotless_core::models::{BookingContext, PhotoCategory};
use spotless_core::UploadConfig;
use spotless_db::{JobPhotoRepository, PhotoMetadataStore};
use spotless_storage::{create_storage, Storage};
use spotless_worker::{
    OrphanReconciler, PhotoGallery, ProgressSnapshot, ProgressTracker, UploadPipeline,
    UploadRequest,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "spotless", about = "Cleaning job photo uploads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct BookingArgs {
    #[arg(long, value_name = "UUID")]
    booking_id: Uuid,
    #[arg(long, value_name = "UUID")]
    customer_id: Uuid,
    #[arg(long, value_name = "UUID")]
    cleaner_id: Option<Uuid>,
    #[arg(long)]
    postcode: String,
    /// Booking date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    date: NaiveDate,
}

impl BookingArgs {
    fn context(&self) -> BookingContext {
        BookingContext::new(
            self.booking_id,
            self.customer_id,
            self.cleaner_id,
            self.postcode.clone(),
            self.date,
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload before, after and additional files for a booking
    Upload {
        #[command(flatten)]
        booking: BookingArgs,
        #[arg(long, num_args = 1.., value_name = "PATH")]
        before: Vec<PathBuf>,
        #[arg(long, num_args = 1.., value_name = "PATH")]
        after: Vec<PathBuf>,
        #[arg(long, num_args = 1.., value_name = "PATH")]
        additional: Vec<PathBuf>,
        /// Note attached to every additional file
        #[arg(long)]
        note: Option<String>,
        /// Worker count for this upload
        #[arg(long)]
        concurrency: Option<usize>,
        /// Output format: json or table
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Stored photos of a booking
    Photos {
        #[command(subcommand)]
        sub: PhotoCommands,
    },
    /// Stored objects with no metadata row
    Orphans {
        #[command(subcommand)]
        sub: OrphanCommands,
    },
    /// Apply database migrations
    Migrate,
}

#[derive(Subcommand)]
enum PhotoCommands {
    /// List photos, newest first, with signed URLs
    List {
        #[arg(long, value_name = "UUID")]
        booking_id: Uuid,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Delete one photo (object and row)
    Delete {
        #[arg(long, value_name = "UUID")]
        booking_id: Uuid,
        #[arg(long, value_name = "UUID")]
        photo_id: Uuid,
    },
}

#[derive(Subcommand)]
enum OrphanCommands {
    /// Find orphaned objects
    List {
        #[command(flatten)]
        booking: BookingArgs,
        /// Scan before and after folders too
        #[arg(long)]
        all_categories: bool,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Delete orphaned objects
    Delete {
        #[command(flatten)]
        booking: BookingArgs,
        #[arg(long)]
        all_categories: bool,
        /// Required; without it the orphans are only listed
        #[arg(long)]
        yes: bool,
    },
}

/// Storage and metadata handles built from the environment.
struct Services {
    config: UploadConfig,
    storage: Arc<dyn Storage>,
    metadata: Arc<dyn PhotoMetadataStore>,
}

impl Services {
    async fn connect(config: UploadConfig) -> anyhow::Result<Self> {
        let storage = create_storage(&config)
            .await
            .context("Failed to initialize storage")?;
        let pool = spotless_db::connect(&config).await?;
        Ok(Self {
            config,
            storage,
            metadata: Arc::new(JobPhotoRepository::new(pool)),
        })
    }

    fn gallery(&self) -> PhotoGallery {
        PhotoGallery::from_config(self.storage.clone(), self.metadata.clone(), &self.config)
    }

    fn reconciler(&self) -> OrphanReconciler {
        OrphanReconciler::new(self.storage.clone(), self.metadata.clone())
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn categories(all: bool) -> Vec<PhotoCategory> {
    if all {
        PhotoCategory::ALL.to_vec()
    } else {
        vec![PhotoCategory::Additional]
    }
}

/// Mirror tracker updates onto the bar until `done` fires.
async fn refresh_bar(
    bar: ProgressBar,
    mut updates: watch::Receiver<ProgressSnapshot>,
    done: CancellationToken,
) {
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *updates.borrow_and_update();
                bar.set_length(snapshot.total as u64);
                bar.set_position(snapshot.completed as u64);
            }
            _ = done.cancelled() => break,
        }
    }
}

async fn upload(
    services: &Services,
    request: UploadRequest,
    format: &str,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; finishing files already in flight...");
            on_interrupt.cancel();
        }
    });

    let pipeline = UploadPipeline::new(
        services.storage.clone(),
        services.metadata.clone(),
        &services.config,
    )
    .with_cancellation(cancel);

    let tracker = ProgressTracker::default();
    let done = CancellationToken::new();
    let refresher = if std::io::stderr().is_terminal() {
        let bar = ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} files ({elapsed})")
                .context("Invalid progress template")?
                .progress_chars("=> "),
        );
        let task_bar = bar.clone();
        Some((
            bar,
            tokio::spawn(refresh_bar(task_bar, tracker.subscribe(), done.clone())),
        ))
    } else {
        None
    };

    let report = pipeline.upload_tracked(request, &tracker, None).await;

    done.cancel();
    if let Some((bar, handle)) = refresher {
        let _ = handle.await;
        bar.finish_and_clear();
    }

    match format {
        "json" => print_json(&serde_json::json!({
            "result": report.result,
            "skipped": report.skipped,
            "no_compatible_files": report.no_compatible_files,
        }))?,
        _ => {
            for line in render_report(&report) {
                println!("{}", line);
            }
        }
    }

    match report.summary_error() {
        Some(summary) => Err(summary.into()),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = UploadConfig::from_env().context("Invalid configuration")?;

    if let Commands::Migrate = cli.command {
        let pool = spotless_db::connect(&config).await?;
        spotless_db::run_migrations(&pool).await?;
        println!("Migrations applied");
        return Ok(());
    }

    let services = Services::connect(config).await?;

    match cli.command {
        Commands::Upload {
            booking,
            before,
            after,
            additional,
            note,
            concurrency,
            format,
        } => {
            let mut request = UploadRequest::new(booking.context());
            request.before = load_selection(&before).await?;
            request.after = load_selection(&after).await?;
            request.additional = load_selection(&additional).await?;
            request.annotation = note;
            request.concurrency_hint = concurrency;
            upload(&services, request, &format).await?;
        }
        Commands::Photos { sub } => match sub {
            PhotoCommands::List { booking_id, format } => {
                let photos = services.gallery().list(booking_id).await?;
                match format.as_str() {
                    "json" => print_json(&photos)?,
                    _ => {
                        println!(
                            "{:<36}  {:<10}  {:<20}  {}",
                            "ID", "CATEGORY", "CREATED", "FILE"
                        );
                        for entry in &photos {
                            println!(
                                "{:<36}  {:<10}  {:<20}  {}",
                                entry.photo.id,
                                entry.photo.category.as_str(),
                                entry.photo.created_at.format("%Y-%m-%d %H:%M:%S"),
                                truncate_string(entry.photo.file_name(), 60)
                            );
                        }
                        println!("{} photo(s)", photos.len());
                    }
                }
            }
            PhotoCommands::Delete {
                booking_id,
                photo_id,
            } => {
                let gallery = services.gallery();
                let photo = gallery
                    .find(booking_id, photo_id)
                    .await?
                    .with_context(|| format!("Photo {} not found for booking {}", photo_id, booking_id))?;
                gallery.delete(&photo).await?;
                println!("Deleted {}", photo.file_path);
            }
        },
        Commands::Orphans { sub } => match sub {
            OrphanCommands::List {
                booking,
                all_categories,
                format,
            } => {
                let orphans = services
                    .reconciler()
                    .reconcile_categories(&booking.context(), &categories(all_categories))
                    .await?;
                match format.as_str() {
                    "json" => print_json(&orphans)?,
                    _ => {
                        for orphan in &orphans {
                            println!("{:<10}  {}", orphan.category.as_str(), orphan.file_path);
                        }
                        println!("{} orphan(s)", orphans.len());
                    }
                }
            }
            OrphanCommands::Delete {
                booking,
                all_categories,
                yes,
            } => {
                let orphans = services
                    .reconciler()
                    .reconcile_categories(&booking.context(), &categories(all_categories))
                    .await?;
                if !yes {
                    for orphan in &orphans {
                        println!("would delete {}", orphan.file_path);
                    }
                    println!("{} orphan(s); pass --yes to delete", orphans.len());
                    return Ok(());
                }
                let gallery = services.gallery();
                for orphan in &orphans {
                    gallery.delete_orphan(orphan).await?;
                    println!("Deleted {}", orphan.file_path);
                }
            }
        },
        Commands::Migrate => {}
    }

    Ok(())
}
