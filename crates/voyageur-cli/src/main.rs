//! Voyageur CLI - plan trips from the terminal and keep them in sync
//!
//! Thin front-end over voyageur-core: every subcommand maps onto a core
//! mutation or sync action. One-shot commands push immediately after a
//! change; `watch` runs the polling loop.

mod error;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use voyageur_core::models::{Day, ItemCategory, PackingCategory, PackingEntry};
use voyageur_core::state::{DayPatch, ItemPatch, PackingPatch, TripPatch};
use voyageur_core::store::{KvStore, SqliteStore};
use voyageur_core::{SyncEngine, Trip, TripId};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "voyageur")]
#[command(about = "Local-first trip planner with shared-store sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Optional path to the local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new trip
    #[command(alias = "new")]
    Add {
        /// Trip name
        name: Vec<String>,
    },
    /// List trips
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one trip in full
    Show {
        /// Trip id, id prefix, or join code
        trip: String,
    },
    /// Edit a trip's descriptive fields
    Edit(EditArgs),
    /// Delete a trip (and its shared record, if published)
    Delete {
        /// Trip id, id prefix, or join code
        trip: String,
    },
    /// Publish a trip to the shared store and print its join code
    Share {
        trip: String,
    },
    /// Remove a trip from the shared store and stop syncing it
    Unshare {
        trip: String,
    },
    /// Import a trip shared by someone else
    Join {
        /// Join code (case-insensitive)
        code: String,
    },
    /// Pull remote changes, then push local ones
    Sync {
        /// Limit to one trip
        trip: Option<String>,
    },
    /// Keep polling the shared store until interrupted
    Watch,
    /// Manage a trip's days
    #[command(subcommand)]
    Day(DayCommands),
    /// Manage itinerary items
    #[command(subcommand)]
    Item(ItemCommands),
    /// Manage the packing list
    #[command(subcommand)]
    Pack(PackCommands),
}

#[derive(Args)]
struct EditArgs {
    /// Trip id, id prefix, or join code
    trip: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    destination: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long)]
    budget: Option<String>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    emoji: Option<String>,
    /// Comma-separated list, replacing the current participants
    #[arg(long)]
    participants: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum DayCommands {
    /// Append a day to a trip
    Add {
        trip: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove a day (and all of its items)
    Remove {
        trip: String,
        /// Day number, starting at 1
        day: usize,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Add an item to a day
    Add {
        trip: String,
        /// Day number, starting at 1
        day: usize,
        /// Item title
        title: Vec<String>,
        #[arg(short, long, value_enum, default_value = "activity")]
        category: CliItemCategory,
        #[arg(long)]
        cost: Option<String>,
    },
    /// Toggle an item's done flag
    Done {
        trip: String,
        day: usize,
        /// Item number within the day, starting at 1
        item: usize,
    },
    /// Remove an item
    Remove {
        trip: String,
        day: usize,
        item: usize,
    },
}

#[derive(Subcommand)]
enum PackCommands {
    /// Add a packing entry
    Add {
        trip: String,
        /// Entry label
        label: Vec<String>,
        #[arg(short, long, value_enum, default_value = "misc")]
        category: CliPackCategory,
        #[arg(short, long, default_value = "1")]
        quantity: u32,
    },
    /// Toggle an entry's packed flag
    Check {
        trip: String,
        /// Entry number, starting at 1
        entry: usize,
    },
    /// Remove a packing entry
    Remove {
        trip: String,
        /// Entry number, starting at 1
        entry: usize,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CliItemCategory {
    Lodging,
    Dining,
    Activity,
    Transport,
    Note,
}

impl From<CliItemCategory> for ItemCategory {
    fn from(value: CliItemCategory) -> Self {
        match value {
            CliItemCategory::Lodging => Self::Lodging,
            CliItemCategory::Dining => Self::Dining,
            CliItemCategory::Activity => Self::Activity,
            CliItemCategory::Transport => Self::Transport,
            CliItemCategory::Note => Self::Note,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CliPackCategory {
    Clothing,
    Documents,
    Hygiene,
    Electronics,
    Health,
    Misc,
}

impl From<CliPackCategory> for PackingCategory {
    fn from(value: CliPackCategory) -> Self {
        match value {
            CliPackCategory::Clothing => Self::Clothing,
            CliPackCategory::Documents => Self::Documents,
            CliPackCategory::Hygiene => Self::Hygiene,
            CliPackCategory::Electronics => Self::Electronics,
            CliPackCategory::Health => Self::Health,
            CliPackCategory::Misc => Self::Misc,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voyageur=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let engine = open_engine(&db_path)?;
    engine.load().await?;

    match cli.command {
        Some(Commands::Add { name }) => run_add(&engine, &name).await?,
        Some(Commands::Show { trip }) => run_show(&engine, &trip)?,
        Some(Commands::Edit(args)) => run_edit(&engine, args).await?,
        Some(Commands::Delete { trip }) => run_delete(&engine, &trip).await?,
        Some(Commands::Share { trip }) => run_share(&engine, &trip).await?,
        Some(Commands::Unshare { trip }) => run_unshare(&engine, &trip).await?,
        Some(Commands::Join { code }) => run_join(&engine, &code).await?,
        Some(Commands::Sync { trip }) => run_sync(&engine, trip.as_deref()).await?,
        Some(Commands::Watch) => run_watch(&engine).await?,
        Some(Commands::Day(command)) => run_day(&engine, command).await?,
        Some(Commands::Item(command)) => run_item(&engine, command).await?,
        Some(Commands::Pack(command)) => run_pack(&engine, command).await?,
        Some(Commands::List { json }) => run_list(&engine, json)?,
        None => run_list(&engine, false)?,
    }

    Ok(())
}

fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = env::var("VOYAGEUR_DB_PATH") {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voyageur")
        .join("voyageur.db")
}

/// Prefer the durable store; fall back to a volatile one rather than
/// refusing to run when the data directory is unusable.
fn open_engine(db_path: &Path) -> Result<SyncEngine<SqliteStore>, CliError> {
    let store = match SqliteStore::open(db_path) {
        Ok(store) => store,
        Err(error) => {
            tracing::warn!(%error, "durable store unavailable, falling back to in-memory");
            SqliteStore::open_in_memory()?
        }
    };
    Ok(SyncEngine::new(Arc::new(store)))
}

/// Persist, and push immediately when the trip is share-linked.
/// One-shot processes exit too soon for the debounce window to matter.
async fn flush<S: KvStore>(engine: &SyncEngine<S>, id: TripId) -> Result<(), CliError> {
    engine.persist().await?;
    if engine.get(id).is_some_and(|trip| trip.share_linked) {
        engine.force_sync(id).await?;
    }
    Ok(())
}

async fn run_add<S: KvStore>(engine: &SyncEngine<S>, name_parts: &[String]) -> Result<(), CliError> {
    let name = name_parts.join(" ");
    if name.trim().is_empty() {
        return Err(CliError::EmptyName);
    }

    let id = engine.create_trip(name.trim());
    engine.persist().await?;
    println!("{} ({})", id.short_code(), id);
    Ok(())
}

#[derive(Debug, Serialize)]
struct TripListItem {
    id: String,
    code: String,
    name: String,
    destination: String,
    shared: bool,
    days: usize,
    items: usize,
    done: usize,
}

fn trip_to_list_item(trip: &Trip) -> TripListItem {
    let stats = trip.stats();
    TripListItem {
        id: trip.id.as_str(),
        code: trip.join_code(),
        name: trip.name.clone(),
        destination: trip.destination.clone(),
        shared: trip.share_linked,
        days: trip.days.len(),
        items: stats.item_count,
        done: stats.done_count,
    }
}

fn format_trip_lines(trips: &[Trip]) -> Vec<String> {
    trips
        .iter()
        .map(|trip| {
            let stats = trip.stats();
            let mut line = format!(
                "{}  {} {}",
                trip.join_code(),
                trip.cover_emoji,
                trip.name
            );
            if !trip.destination.is_empty() {
                line.push_str(&format!(" - {}", trip.destination));
            }
            line.push_str(&format!(
                "  ({} days, {}/{} done)",
                trip.days.len(),
                stats.done_count,
                stats.item_count
            ));
            if trip.share_linked {
                line.push_str(" [shared]");
            }
            line
        })
        .collect()
}

fn run_list<S: KvStore>(engine: &SyncEngine<S>, as_json: bool) -> Result<(), CliError> {
    let trips = engine.snapshot();

    if as_json {
        let items: Vec<TripListItem> = trips.iter().map(trip_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if trips.is_empty() {
        println!("No trips yet. Create one with: voyageur add <name>");
    } else {
        for line in format_trip_lines(&trips) {
            println!("{line}");
        }
    }

    Ok(())
}

async fn run_edit<S: KvStore>(engine: &SyncEngine<S>, args: EditArgs) -> Result<(), CliError> {
    let trip = resolve_trip(engine, &args.trip)?;
    let patch = TripPatch {
        name: args.name,
        destination: args.destination,
        country: args.country,
        start_date: args.start_date,
        end_date: args.end_date,
        budget: args.budget,
        currency: args.currency,
        cover_emoji: args.emoji,
        participants: args.participants.map(|list| {
            list.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        }),
        notes: args.notes,
    };
    engine.update_trip(trip.id, patch);
    flush(engine, trip.id).await?;

    let name = engine.get(trip.id).map_or(trip.name, |trip| trip.name);
    println!("Updated \"{name}\"");
    Ok(())
}

fn run_show<S: KvStore>(engine: &SyncEngine<S>, query: &str) -> Result<(), CliError> {
    let trip = resolve_trip(engine, query)?;
    let stats = trip.stats();

    println!("{} {}  (code {})", trip.cover_emoji, trip.name, trip.join_code());
    if !trip.destination.is_empty() {
        println!("Destination: {} {}", trip.destination, trip.country);
    }
    if !trip.start_date.is_empty() || !trip.end_date.is_empty() {
        println!("Dates: {} .. {}", trip.start_date, trip.end_date);
    }
    if !trip.budget.is_empty() {
        println!("Budget: {} {}", trip.budget, trip.currency);
    }
    println!(
        "Shared: {}   Sync: {:?}",
        if trip.share_linked { "yes" } else { "no" },
        engine.status(trip.id)
    );

    for (day_number, day) in trip.days.iter().enumerate() {
        let header = if day.title.is_empty() { "Day" } else { day.title.as_str() };
        println!("Day {}: {} {}", day_number + 1, header, day.date);
        for (item_number, item) in day.items.iter().enumerate() {
            let mark = if item.done { "x" } else { " " };
            let mut line = format!(
                "  {}. [{}] {} ({})",
                item_number + 1,
                mark,
                item.title,
                item.category.label()
            );
            if !item.cost.is_empty() {
                line.push_str(&format!(" {}", item.cost));
            }
            println!("{line}");
        }
    }

    if !trip.packing.is_empty() {
        println!("Packing: {}/{} packed", stats.packed_count, stats.packing_count);
        for (entry_number, entry) in trip.packing.iter().enumerate() {
            let mark = if entry.packed { "x" } else { " " };
            println!(
                "  {}. [{}] {} x{} ({})",
                entry_number + 1,
                mark,
                entry.label,
                entry.quantity,
                entry.category.label()
            );
        }
    }

    Ok(())
}

async fn run_delete<S: KvStore>(engine: &SyncEngine<S>, query: &str) -> Result<(), CliError> {
    let trip = resolve_trip(engine, query)?;
    engine.delete_trip(trip.id).await;
    engine.persist().await?;
    println!("Deleted \"{}\"", trip.name);
    Ok(())
}

async fn run_share<S: KvStore>(engine: &SyncEngine<S>, query: &str) -> Result<(), CliError> {
    let trip = resolve_trip(engine, query)?;
    let code = engine.share(trip.id).await?;
    engine.persist().await?;
    println!("Share code: {code}");
    Ok(())
}

async fn run_unshare<S: KvStore>(engine: &SyncEngine<S>, query: &str) -> Result<(), CliError> {
    let trip = resolve_trip(engine, query)?;
    engine.unshare(trip.id).await?;
    engine.persist().await?;
    println!("\"{}\" is private again", trip.name);
    Ok(())
}

async fn run_join<S: KvStore>(engine: &SyncEngine<S>, code: &str) -> Result<(), CliError> {
    let trip = engine.join(code).await?;
    println!("Added \"{}\" ({})", trip.name, trip.join_code());
    Ok(())
}

async fn run_sync<S: KvStore>(engine: &SyncEngine<S>, query: Option<&str>) -> Result<(), CliError> {
    let ids = match query {
        Some(query) => vec![resolve_trip(engine, query)?.id],
        None => engine
            .snapshot()
            .iter()
            .filter(|trip| trip.share_linked)
            .map(|trip| trip.id)
            .collect(),
    };

    if ids.is_empty() {
        println!("No shared trips to sync.");
        return Ok(());
    }

    engine.pull_all().await;
    for id in &ids {
        engine.force_sync(*id).await?;
    }
    engine.persist().await?;

    for id in ids {
        if let Some(trip) = engine.get(id) {
            println!("{}  {}: {:?}", trip.join_code(), trip.name, engine.status(id));
        }
    }
    Ok(())
}

async fn run_watch<S: KvStore>(engine: &SyncEngine<S>) -> Result<(), CliError> {
    let poller = engine.spawn_poller();
    println!("Watching shared trips; Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    poller.abort();
    engine.persist().await?;
    Ok(())
}

async fn run_day<S: KvStore>(engine: &SyncEngine<S>, command: DayCommands) -> Result<(), CliError> {
    match command {
        DayCommands::Add { trip, date, title } => {
            let trip = resolve_trip(engine, &trip)?;
            if let Some(day_id) = engine.add_day(trip.id) {
                engine.update_day(
                    trip.id,
                    day_id,
                    DayPatch {
                        date,
                        title,
                        ..DayPatch::default()
                    },
                );
            }
            flush(engine, trip.id).await?;
            let count = engine.get(trip.id).map_or(0, |trip| trip.days.len());
            println!("Day {count} added to \"{}\"", trip.name);
        }
        DayCommands::Remove { trip, day } => {
            let trip = resolve_trip(engine, &trip)?;
            let day_id = day_at(&trip, day)?.id;
            engine.remove_day(trip.id, day_id);
            flush(engine, trip.id).await?;
            println!("Day {day} removed");
        }
    }
    Ok(())
}

async fn run_item<S: KvStore>(engine: &SyncEngine<S>, command: ItemCommands) -> Result<(), CliError> {
    match command {
        ItemCommands::Add {
            trip,
            day,
            title,
            category,
            cost,
        } => {
            let trip = resolve_trip(engine, &trip)?;
            let day_id = day_at(&trip, day)?.id;
            if let Some(item_id) = engine.add_item(trip.id, day_id, category.into()) {
                engine.update_item(
                    trip.id,
                    day_id,
                    item_id,
                    ItemPatch {
                        title: Some(title.join(" ")),
                        cost,
                        ..ItemPatch::default()
                    },
                );
            }
            flush(engine, trip.id).await?;
            println!("Item added to day {day}");
        }
        ItemCommands::Done { trip, day, item } => {
            let trip = resolve_trip(engine, &trip)?;
            let day_ref = day_at(&trip, day)?;
            let target = item_at(day_ref, item)?;
            engine.update_item(
                trip.id,
                day_ref.id,
                target.id,
                ItemPatch {
                    done: Some(!target.done),
                    ..ItemPatch::default()
                },
            );
            flush(engine, trip.id).await?;
        }
        ItemCommands::Remove { trip, day, item } => {
            let trip = resolve_trip(engine, &trip)?;
            let day_ref = day_at(&trip, day)?;
            let target = item_at(day_ref, item)?;
            engine.remove_item(trip.id, day_ref.id, target.id);
            flush(engine, trip.id).await?;
            println!("Item {item} removed from day {day}");
        }
    }
    Ok(())
}

async fn run_pack<S: KvStore>(engine: &SyncEngine<S>, command: PackCommands) -> Result<(), CliError> {
    match command {
        PackCommands::Add {
            trip,
            label,
            category,
            quantity,
        } => {
            let trip = resolve_trip(engine, &trip)?;
            if let Some(pack_id) = engine.add_packing(trip.id, category.into()) {
                engine.update_packing(
                    trip.id,
                    pack_id,
                    PackingPatch {
                        label: Some(label.join(" ")),
                        quantity: Some(quantity),
                        ..PackingPatch::default()
                    },
                );
            }
            flush(engine, trip.id).await?;
            println!("Packing entry added");
        }
        PackCommands::Check { trip, entry } => {
            let trip = resolve_trip(engine, &trip)?;
            let target = pack_at(&trip, entry)?;
            engine.update_packing(
                trip.id,
                target.id,
                PackingPatch {
                    packed: Some(!target.packed),
                    ..PackingPatch::default()
                },
            );
            flush(engine, trip.id).await?;
        }
        PackCommands::Remove { trip, entry } => {
            let trip = resolve_trip(engine, &trip)?;
            let target = pack_at(&trip, entry)?;
            engine.remove_packing(trip.id, target.id);
            flush(engine, trip.id).await?;
            println!("Packing entry {entry} removed");
        }
    }
    Ok(())
}

/// Compact (hyphen-free, lowercase) form of a trip id, the shape both
/// id prefixes and join codes normalize to
fn compact_id(id: TripId) -> String {
    id.as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Resolve a user-supplied trip reference: full id, id prefix, or join
/// code. Ambiguous prefixes are rejected with the matching codes listed.
fn resolve_trip<S: KvStore>(engine: &SyncEngine<S>, query: &str) -> Result<Trip, CliError> {
    let needle: String = query
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if needle.is_empty() {
        return Err(CliError::TripNotFound(query.to_string()));
    }

    let trips = engine.snapshot();
    let matches: Vec<&Trip> = trips
        .iter()
        .filter(|trip| compact_id(trip.id).starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::TripNotFound(query.to_string())),
        [only] => Ok((*only).clone()),
        _ => {
            let options = matches
                .iter()
                .map(|trip| trip.join_code())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousTripId(format!(
                "Id/code '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

fn day_at(trip: &Trip, number: usize) -> Result<&Day, CliError> {
    number
        .checked_sub(1)
        .and_then(|index| trip.days.get(index))
        .ok_or(CliError::DayNotFound(number))
}

fn item_at(day: &Day, number: usize) -> Result<&voyageur_core::models::Item, CliError> {
    number
        .checked_sub(1)
        .and_then(|index| day.items.get(index))
        .ok_or(CliError::ItemNotFound(number))
}

fn pack_at(trip: &Trip, number: usize) -> Result<&PackingEntry, CliError> {
    number
        .checked_sub(1)
        .and_then(|index| trip.packing.get(index))
        .ok_or(CliError::PackNotFound(number))
}
