mod distance;
mod export;
mod helpers;
mod odometer;
mod profile;
mod report;
mod trip;
mod vehicle;

use korjournal_core::LogbookService;
use korjournal_core::store::SqliteStore;

/// The logbook as the CLI and server use it: backed by the on-disk SQLite store.
pub(crate) type Logbook = LogbookService<SqliteStore>;

pub(crate) use distance::cmd_distance;
pub(crate) use export::{cmd_export_csv, cmd_export_pdf};
pub(crate) use helpers::build_filter;
pub(crate) use odometer::{
    cmd_odometer_add, cmd_odometer_check, cmd_odometer_delete, cmd_odometer_list,
};
pub(crate) use profile::{cmd_profile_set, cmd_profile_show};
pub(crate) use report::cmd_report;
pub(crate) use trip::{
    TripArgs, cmd_trip_add, cmd_trip_delete, cmd_trip_duplicate, cmd_trip_list, cmd_trip_show,
    cmd_trip_update,
};
pub(crate) use vehicle::{
    cmd_vehicle_add, cmd_vehicle_default, cmd_vehicle_delete, cmd_vehicle_list, cmd_vehicle_show,
    cmd_vehicle_update,
};
