mod commands;
mod config;
mod distance;
mod pdf;
mod server;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use korjournal_core::LogbookService;
use korjournal_core::models::UpdateUserProfile;
use korjournal_core::store::SqliteStore;

use crate::commands::{
    TripArgs, build_filter, cmd_distance, cmd_export_csv, cmd_export_pdf, cmd_odometer_add,
    cmd_odometer_check, cmd_odometer_delete, cmd_odometer_list, cmd_profile_set, cmd_profile_show,
    cmd_report, cmd_trip_add, cmd_trip_delete, cmd_trip_duplicate, cmd_trip_list, cmd_trip_show,
    cmd_trip_update, cmd_vehicle_add, cmd_vehicle_default, cmd_vehicle_delete, cmd_vehicle_list,
    cmd_vehicle_show, cmd_vehicle_update,
};
use crate::config::Config;
use crate::distance::DistanceClient;

#[derive(Parser)]
#[command(
    name = "korjournal",
    version,
    about = "A mileage logbook for business trips",
    long_about = "Keep a körjournal: log trips by odometer or by route, track odometer \
readings per vehicle and export reimbursement reports as CSV or PDF."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Report filters shared by `report`, `trip list` and `export`.
#[derive(Args)]
struct FilterArgs {
    /// First date to include (YYYY-MM-DD or today/yesterday)
    #[arg(long)]
    from: Option<String>,
    /// Last date to include
    #[arg(long)]
    to: Option<String>,
    /// Only trips with this license plate
    #[arg(long)]
    car: Option<String>,
    /// Only trips in this category: Tjänsteresa, Övrigt
    #[arg(long)]
    category: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> Result<korjournal_core::report::ReportFilter> {
        build_filter(
            self.from.as_deref(),
            self.to.as_deref(),
            self.car,
            self.category.as_deref(),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the vehicle registry
    Vehicle {
        #[command(subcommand)]
        command: VehicleCommands,
    },
    /// Record and inspect odometer readings
    Odometer {
        #[command(subcommand)]
        command: OdometerCommands,
    },
    /// Log and manage trips
    Trip {
        #[command(subcommand)]
        command: TripCommands,
    },
    /// Show distance and reimbursement totals
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export trips to a file
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Show or edit the report profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Look up the driving distance between two addresses
    Distance {
        /// Start address
        origin: String,
        /// Destination address
        destination: String,
        /// Count the route twice
        #[arg(long)]
        roundtrip: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum VehicleCommands {
    /// Register a vehicle
    Add {
        /// License plate, e.g. ABC123
        plate: String,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Make this the default vehicle
        #[arg(long)]
        default: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered vehicles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a vehicle and its latest reading
    Show {
        plate: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change plate, make, model or color (empty string clears)
    Update {
        plate: String,
        /// New license plate
        #[arg(long)]
        new_plate: Option<String>,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a vehicle (its readings are kept)
    Delete {
        plate: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a vehicle the default for new trips and readings
    Default {
        plate: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum OdometerCommands {
    /// Record an odometer reading
    Add {
        /// Odometer value in km
        value: u64,
        /// License plate (default: the default vehicle)
        #[arg(long)]
        car: Option<String>,
        /// Date of the reading (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List readings, newest first
    List {
        /// Only this license plate
        #[arg(long)]
        car: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a reading by id or id prefix
    Delete {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find readings where the odometer went backwards
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TripCommands {
    /// Log a trip by odometer values or by route
    Add {
        #[command(flatten)]
        trip: TripArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List trips, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one trip
    Show {
        /// Trip id or id prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a trip
    Delete {
        /// Trip id or id prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a trip to another date
    Duplicate {
        /// Trip id or id prefix
        id: String,
        /// Date for the copy (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a trip
    Update {
        /// Trip id or id prefix
        id: String,
        #[command(flatten)]
        trip: TripArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Semicolon-separated CSV with a UTF-8 BOM
    Csv {
        /// Output file, `-` for stdout (default: korjournal_<date>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// PDF report with profile header and totals
    Pdf {
        /// Output file (default: korjournal_<date>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile used in report headers
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update profile fields
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        employee_id: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long = "ref")]
        reference: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        /// Default departure address for route trips
        #[arg(long)]
        from_address: Option<String>,
        /// Default destination address for route trips
        #[arg(long)]
        to_address: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    debug!(data_dir = %config.data_dir.display(), db = %config.db_path.display(), "loaded config");
    let mut svc = LogbookService::open(SqliteStore::open(&config.db_path)?)?;
    let client = DistanceClient::new(&config)?;

    match cli.command {
        Commands::Vehicle { command } => match command {
            VehicleCommands::Add {
                plate,
                make,
                model,
                color,
                default,
                json,
            } => cmd_vehicle_add(&mut svc, &plate, make, model, color, default, json),
            VehicleCommands::List { json } => cmd_vehicle_list(&svc, json),
            VehicleCommands::Show { plate, json } => cmd_vehicle_show(&svc, &plate, json),
            VehicleCommands::Update {
                plate,
                new_plate,
                make,
                model,
                color,
                json,
            } => cmd_vehicle_update(&mut svc, &plate, new_plate, make, model, color, json),
            VehicleCommands::Delete { plate, json } => cmd_vehicle_delete(&mut svc, &plate, json),
            VehicleCommands::Default { plate, json } => {
                cmd_vehicle_default(&mut svc, &plate, json)
            }
        },
        Commands::Odometer { command } => match command {
            OdometerCommands::Add {
                value,
                car,
                date,
                notes,
                json,
            } => cmd_odometer_add(&mut svc, value, car.as_deref(), date, notes, json),
            OdometerCommands::List {
                car,
                from,
                to,
                json,
            } => cmd_odometer_list(&svc, car.as_deref(), from.as_deref(), to.as_deref(), json),
            OdometerCommands::Delete { id, json } => cmd_odometer_delete(&mut svc, &id, json),
            OdometerCommands::Check { json } => cmd_odometer_check(&svc, json),
        },
        Commands::Trip { command } => match command {
            TripCommands::Add { trip, json } => cmd_trip_add(&mut svc, &client, trip, json),
            TripCommands::List { filter, json } => {
                cmd_trip_list(&svc, &filter.into_filter()?, json)
            }
            TripCommands::Show { id, json } => cmd_trip_show(&svc, &id, json),
            TripCommands::Delete { id, json } => cmd_trip_delete(&mut svc, &id, json),
            TripCommands::Duplicate { id, date, json } => {
                cmd_trip_duplicate(&mut svc, &id, date, json)
            }
            TripCommands::Update { id, trip, json } => {
                cmd_trip_update(&mut svc, &client, &id, trip, json)
            }
        },
        Commands::Report { filter, json } => cmd_report(&svc, &filter.into_filter()?, json),
        Commands::Export { command } => match command {
            ExportCommands::Csv { output, filter } => {
                cmd_export_csv(&svc, &filter.into_filter()?, output)
            }
            ExportCommands::Pdf { output, filter } => {
                cmd_export_pdf(&svc, &filter.into_filter()?, output)
            }
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&svc, json),
            ProfileCommands::Set {
                name,
                email,
                employee_id,
                department,
                account,
                company,
                reference,
                purpose,
                from_address,
                to_address,
                json,
            } => cmd_profile_set(
                &mut svc,
                UpdateUserProfile {
                    name,
                    email,
                    employee_id,
                    department,
                    account,
                    company,
                    reference,
                    purpose,
                },
                (from_address, to_address),
                json,
            ),
        },
        Commands::Distance {
            origin,
            destination,
            roundtrip,
            json,
        } => cmd_distance(&client, &origin, &destination, roundtrip, json).await,
        Commands::Serve { port, bind } => {
            server::start_server(svc, Arc::new(client), port, &bind).await
        }
    }
}
