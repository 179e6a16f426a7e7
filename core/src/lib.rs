//! Core of the korjournal mileage logbook: vehicles, odometer readings,
//! drive entries, reporting and the persistence port.

pub mod distance;
pub mod error;
pub mod models;
pub mod odometer;
pub mod report;
pub mod service;
pub mod store;
pub mod trips;
pub mod vehicles;

pub use error::{LogbookError, Result};
pub use service::LogbookService;
