use anyhow::Result;
use davdedup_core::{Record, vcard};
use owo_colors::OwoColorize;

use super::{RunOptions, connect, deduplicate, fetch_objects, originals, select_collections};
use crate::config::Settings;
use crate::dav::{Collection, CollectionKind, DavClient, DavObject};

pub fn run(settings: &Settings, run: RunOptions) -> Result<()> {
    let options = settings.dedup_options()?;
    let client = connect(settings)?;

    let fetched = fetch_address_books(&client)?;
    let records = contact_records(&fetched);
    if !run.json {
        println!("{}", format!("{} contacts", records.len()).dimmed());
    }

    let originals = originals(fetched.iter().flat_map(|(_, objects)| objects));
    deduplicate(&client, &records, &originals, &options, &run, "contact")
}

/// Every contact of every address book of the user.
pub fn fetch_contacts(client: &DavClient) -> Result<Vec<Record>> {
    Ok(contact_records(&fetch_address_books(client)?))
}

fn fetch_address_books(client: &DavClient) -> Result<Vec<(Collection, Vec<DavObject>)>> {
    let books = select_collections(client, CollectionKind::AddressBook, None)?;
    fetch_objects(client, &books, CollectionKind::AddressBook)
}

fn contact_records(fetched: &[(Collection, Vec<DavObject>)]) -> Vec<Record> {
    vcard::parse_all(
        fetched
            .iter()
            .flat_map(|(_, objects)| objects.iter())
            .map(|o| (o.href.as_str(), o.data.as_str())),
    )
}
