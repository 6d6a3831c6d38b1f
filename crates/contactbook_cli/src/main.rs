//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a contact store from an optional JSON config path.
//! - Print one name-sorted page and the store total.
//!
//! Without a config argument, an in-memory store seeded with demo data is used.

use contactbook_core::{
    core_version, open_contact_service, ContactQuery, ContactQueryService, SortOrder,
    StoreConfig,
};
use log::error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("contactbook: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig {
            seed_demo_data: true,
            ..StoreConfig::default()
        },
    };

    let service = Arc::new(open_contact_service(&config)?);
    let queries = ContactQueryService::new(service);
    let page = queries.page(&ContactQuery::new().sort_by(SortOrder::asc("name")))?;

    println!("contactbook_core version={}", core_version());
    for contact in &page.items {
        println!(
            "{:>4}  {:<20} {:<15} {}",
            contact.id.unwrap_or_default(),
            contact.name,
            contact.city,
            contact.email
        );
    }
    println!("total={}", queries.total_count()?);
    Ok(())
}
