//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `parcel_core` linkage and schema bootstrap end to end.
//! - Walk one parcel through its lifecycle on an in-memory database.
//!
//! Set `PARCEL_LOG_DIR` to an absolute path to also write core logs there.

use parcel_core::{
    core_version, default_log_level, init_logging, open_db_in_memory, DbHandle, Parcel,
    ParcelStatus, ParcelStore,
};
use std::error::Error;
use std::process::ExitCode;

const DEMO_CLIENT: i64 = 1000;
const DEMO_CREATED_AT: &str = "2024-05-01T10:00:00Z";

fn main() -> ExitCode {
    println!("parcel_core version={}", core_version());

    if let Ok(log_dir) = std::env::var("PARCEL_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run_lifecycle() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("smoke run failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_lifecycle() -> Result<(), Box<dyn Error>> {
    let store = ParcelStore::try_new(DbHandle::new(open_db_in_memory()?))?;

    let number = store.add(&Parcel::registered(
        DEMO_CLIENT,
        "1 Example Street",
        DEMO_CREATED_AT,
    ))?;
    println!("added parcel number={number} status=registered");

    store.set_address(number, "2 Example Street")?;
    println!("updated address number={number}");

    for status in [ParcelStatus::Sent, ParcelStatus::Delivered] {
        store.set_status(number, status)?;
        println!("moved parcel number={number} status={status}");
    }

    match store.set_status(number, ParcelStatus::Sent) {
        Ok(()) => return Err("backward move to `sent` was accepted".into()),
        Err(err) => println!("rejected as expected code={} message={err}", err.code()),
    }

    let parcels = store.get_by_client(DEMO_CLIENT)?;
    println!("client={DEMO_CLIENT} parcels={}", parcels.len());
    Ok(())
}
