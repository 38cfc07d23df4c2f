use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use medicab_core::validation::{validate_stock, MedicineEdit, MedicineInput, ReminderInput};
use medicab_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medicab")]
#[command(about = "Personal medicine cabinet and dose reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Id of the logged-in user
    #[arg(long, global = true)]
    user: Option<UserId>,

    /// Pin the clock (RFC 3339), defaults to the local time
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<DateTime<FixedOffset>>,

    /// Label language (id, en), defaults to the configured one
    #[arg(long, global = true)]
    lang: Option<Language>,

    /// Print listings and records as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the medicine cabinet
    #[command(subcommand)]
    Medicine(MedicineCommand),

    /// Manage dose reminders
    #[command(subcommand)]
    Reminder(ReminderCommand),
}

#[derive(Subcommand)]
enum MedicineCommand {
    /// Add a medicine
    Add {
        #[arg(long)]
        name: String,
        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        dosage: Option<String>,
        #[arg(long)]
        frequency: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        stock: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List medicines, nearest expiry first
    List,

    /// Edit medicine fields (an empty value clears an optional field)
    Edit {
        id: u64,
        #[command(flatten)]
        fields: EditFields,
    },

    /// Set the remaining stock
    Stock {
        id: u64,
        #[arg(allow_negative_numbers = true)]
        stock: i64,
    },

    /// Delete a medicine and its reminders
    Delete { id: u64 },
}

#[derive(Args)]
struct EditFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    dosage: Option<String>,
    #[arg(long)]
    frequency: Option<String>,
    /// Expiry date (YYYY-MM-DD)
    #[arg(long)]
    expiry: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum ReminderCommand {
    /// Schedule a reminder for a medicine
    Add {
        #[arg(long)]
        medicine: i64,
        /// Time of day (HH:MM, 24-hour)
        #[arg(long)]
        time: String,
        /// Seven 0/1 flags Monday first (e.g. 0010100), or day names (mon,wed,fri)
        #[arg(long, default_value = "1111111")]
        days: String,
    },

    /// List active reminders with their next occurrence
    List,

    /// Pause a reminder
    Pause { id: u64 },

    /// Resume a paused reminder
    Resume { id: u64 },

    /// Delete a reminder
    Delete { id: u64 },

    /// Mark today's dose as taken
    Taken { id: u64 },
}

fn main() -> Result<()> {
    medicab_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = Config::load()?;
    let ctx = Context {
        data_dir: cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone()),
        session: cli.user.map(Session::new),
        now: cli.now.map_or_else(|| Clock::Local(Local::now()), Clock::Pinned),
        language: cli.lang.unwrap_or(config.display.language),
        json: cli.json,
    };
    tracing::debug!("Using data directory {:?}", ctx.data_dir);

    match cli.command {
        Commands::Medicine(cmd) => cmd_medicine(&ctx, cmd),
        Commands::Reminder(cmd) => cmd_reminder(&ctx, cmd),
    }
}

/// Per-invocation state; the clock is read once here
struct Context {
    data_dir: PathBuf,
    session: Option<Session>,
    now: Clock,
    language: Language,
    json: bool,
}

/// The instant a command runs at
///
/// The local clock keeps its zone so that slots past a DST change stay on
/// the wall-clock time; a pinned instant keeps its own offset.
enum Clock {
    Local(DateTime<Local>),
    Pinned(DateTime<FixedOffset>),
}

impl Context {
    fn store(&self) -> Store {
        Store::open(&self.data_dir)
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        match &self.now {
            Clock::Local(now) => now.with_timezone(&Utc),
            Clock::Pinned(now) => now.with_timezone(&Utc),
        }
    }

    fn today(&self) -> NaiveDate {
        match &self.now {
            Clock::Local(now) => now.date_naive(),
            Clock::Pinned(now) => now.date_naive(),
        }
    }
}

fn cmd_medicine(ctx: &Context, cmd: MedicineCommand) -> Result<()> {
    let store = ctx.store();

    match cmd {
        MedicineCommand::Add {
            name,
            expiry,
            dosage,
            frequency,
            stock,
            notes,
        } => {
            // Session first, so anonymous callers never reach validation
            session::require(ctx.session())?;
            let new = MedicineInput {
                name,
                dosage,
                frequency,
                expiry_date: expiry,
                stock,
                notes,
            }
            .validate()?;
            let medicine = store.add_medicine(ctx.session(), new, ctx.now_utc())?;
            print_medicine_record(ctx, &medicine, "Medicine added")
        }

        MedicineCommand::List => {
            let views = list_medicines(&store, ctx.session(), ctx.today())?;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                print_medicines(&views);
            }
            Ok(())
        }

        MedicineCommand::Edit { id, fields } => {
            session::require(ctx.session())?;
            let changes = MedicineEdit {
                name: fields.name,
                dosage: fields.dosage,
                frequency: fields.frequency,
                expiry_date: fields.expiry,
                notes: fields.notes,
            }
            .validate()?;
            if changes.is_empty() {
                return Err(Error::Validation("Nothing to change".into()));
            }
            let medicine = store.edit_medicine(ctx.session(), id, changes, ctx.now_utc())?;
            print_medicine_record(ctx, &medicine, "Medicine updated")
        }

        MedicineCommand::Stock { id, stock } => {
            session::require(ctx.session())?;
            let stock = validate_stock(stock)?;
            let medicine = store.update_medicine_stock(ctx.session(), id, stock, ctx.now_utc())?;
            print_medicine_record(ctx, &medicine, "Stock updated")
        }

        MedicineCommand::Delete { id } => {
            let removed = store.delete_medicine(ctx.session(), id)?;
            println!("✓ Medicine deleted");
            if removed > 0 {
                println!("  Also removed {} reminder(s)", removed);
            }
            Ok(())
        }
    }
}

fn cmd_reminder(ctx: &Context, cmd: ReminderCommand) -> Result<()> {
    let store = ctx.store();

    match cmd {
        ReminderCommand::Add {
            medicine,
            time,
            days,
        } => {
            session::require(ctx.session())?;
            let new = ReminderInput {
                medicine_id: medicine,
                time_of_day: time,
                days_of_week: parse_days_arg(&days)?,
            }
            .validate()?;
            let reminder = store.create_reminder(ctx.session(), new, ctx.now_utc())?;
            print_reminder_record(ctx, &reminder, "Reminder created")
        }

        ReminderCommand::List => {
            let log = DoseLog::open(&ctx.data_dir);
            let views = match &ctx.now {
                Clock::Local(now) => list_reminders(&store, &log, ctx.session(), now, ctx.language)?,
                Clock::Pinned(now) => list_reminders(&store, &log, ctx.session(), now, ctx.language)?,
            };
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                print_reminders(&views);
            }
            Ok(())
        }

        ReminderCommand::Pause { id } => {
            let reminder = store.set_reminder_active(ctx.session(), id, false, ctx.now_utc())?;
            print_reminder_record(ctx, &reminder, "Reminder paused")
        }

        ReminderCommand::Resume { id } => {
            let reminder = store.set_reminder_active(ctx.session(), id, true, ctx.now_utc())?;
            print_reminder_record(ctx, &reminder, "Reminder resumed")
        }

        ReminderCommand::Delete { id } => {
            store.delete_reminder(ctx.session(), id)?;
            println!("✓ Reminder deleted");
            Ok(())
        }

        ReminderCommand::Taken { id } => {
            let mut log = DoseLog::open(&ctx.data_dir);
            let written = match &ctx.now {
                Clock::Local(now) => mark_reminder_taken(&store, &mut log, ctx.session(), id, now)?,
                Clock::Pinned(now) => mark_reminder_taken(&store, &mut log, ctx.session(), id, now)?,
            };
            if written {
                println!("✓ Dose marked as taken");
            } else {
                println!("Dose already marked as taken today");
            }
            Ok(())
        }
    }
}

fn parse_now(s: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

/// Accept either the raw flag string or a comma-separated list of day names
fn parse_days_arg(days: &str) -> Result<String> {
    let days = days.trim();
    if days.chars().all(|c| c == '0' || c == '1') {
        return Ok(days.to_string());
    }

    let mut selected = [false; 7];
    for name in days.split(',').map(|d| d.trim().to_lowercase()) {
        let index = (0..7)
            .find(|&i| {
                [Language::En, Language::Id].iter().any(|&lang| {
                    recurrence::day_short_name(i, lang).map(str::to_lowercase).as_deref()
                        == Some(name.as_str())
                        || recurrence::day_name(i, lang).map(str::to_lowercase).as_deref()
                            == Some(name.as_str())
                })
            })
            .ok_or_else(|| Error::Validation(format!("Unknown day: {name}")))?;
        selected[index] = true;
    }
    Ok(mask_from_selection(selected))
}

fn print_medicine_record(ctx: &Context, medicine: &Medicine, headline: &str) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(medicine)?);
    } else {
        println!("✓ {}", headline);
        println!("  #{} {} (stock {})", medicine.id, medicine.name, medicine.stock);
        println!("  Expires: {}", medicine.expiry_date);
    }
    Ok(())
}

fn print_reminder_record(ctx: &Context, reminder: &Reminder, headline: &str) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(reminder)?);
    } else {
        println!("✓ {}", headline);
        println!(
            "  #{} {}  {}",
            reminder.id,
            reminder.time_of_day,
            format_active_days(reminder.days_of_week, ctx.language)
        );
    }
    Ok(())
}

fn print_medicines(views: &[MedicineView]) {
    if views.is_empty() {
        println!("No medicines yet.");
        return;
    }

    for view in views {
        let status = match view.status {
            ExpiryStatus::Safe => "SAFE",
            ExpiryStatus::Expiring => "EXPIRING",
            ExpiryStatus::Expired => "EXPIRED",
        };
        println!(
            "  #{:<4} {:<24} {:<10} stock {:<4} expires {}  {} ({} days)",
            view.id,
            view.name,
            view.dosage.as_deref().unwrap_or("-"),
            view.stock,
            view.expiry_date,
            status,
            view.days_until_expiry
        );
    }
}

fn print_reminders(views: &[ReminderView]) {
    if views.is_empty() {
        println!("No active reminders.");
        return;
    }

    for view in views {
        let next = view
            .next_reminder_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  #{:<4} {}  {:<24} {:<20} next {}{}",
            view.id,
            view.time_of_day,
            view.medicine.name,
            view.days_label,
            next,
            if view.is_overdue { "  OVERDUE" } else { "" }
        );
    }
}
