//! CardDAV / CalDAV access to a Nextcloud server.
//!
//! Blocking HTTP with basic authentication. Collections are discovered with
//! PROPFIND on the user's address book / calendar home, objects are fetched
//! with a single REPORT per collection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use davdedup_core::{BirthdayEvent, DedupError, DedupResult, Record, RecordStore};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use url::Url;

use crate::backup::Backup;
use crate::config::ServerSettings;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

const ADDRESSBOOK_QUERY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<card:addressbook-query xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:prop>
    <d:getetag/>
    <card:address-data/>
  </d:prop>
</card:addressbook-query>"#;

const CALENDAR_QUERY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data/>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT"/>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#;

/// Which kind of DAV collection to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    AddressBook,
    Calendar,
}

impl CollectionKind {
    /// `resourcetype` child element that marks the collection
    fn resource_type(self) -> &'static str {
        match self {
            CollectionKind::AddressBook => "addressbook",
            CollectionKind::Calendar => "calendar",
        }
    }

    /// Property holding the object data in a REPORT response
    fn data_property(self) -> &'static str {
        match self {
            CollectionKind::AddressBook => "address-data",
            CollectionKind::Calendar => "calendar-data",
        }
    }

    fn query(self) -> &'static str {
        match self {
            CollectionKind::AddressBook => ADDRESSBOOK_QUERY,
            CollectionKind::Calendar => CALENDAR_QUERY,
        }
    }
}

/// An address book or calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub href: String,
    pub name: String,
}

/// A vCard or iCalendar object and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavObject {
    pub href: String,
    pub data: String,
}

pub struct DavClient {
    http: Client,
    base: Url,
    username: String,
    password: String,
}

impl DavClient {
    pub fn new(server: &ServerSettings, password: String) -> Result<Self> {
        let base = Url::parse(server.url.trim())
            .with_context(|| format!("Invalid server URL: {}", server.url))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(DavClient {
            http,
            base,
            username: server.username.clone(),
            password,
        })
    }

    /// Nextcloud home collection for `kind`.
    pub fn home(&self, kind: CollectionKind) -> Result<Url> {
        let path = match kind {
            CollectionKind::AddressBook => {
                format!("remote.php/dav/addressbooks/users/{}/", self.username)
            }
            CollectionKind::Calendar => format!("remote.php/dav/calendars/{}/", self.username),
        };
        self.resolve(&path)
    }

    /// Turn an href (absolute path or full URL) into a URL on this server.
    fn resolve(&self, href: &str) -> Result<Url> {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(href)
            .with_context(|| format!("Invalid resource path: {}", href))
    }

    fn request(&self, method: &str, url: Url) -> Result<RequestBuilder> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .with_context(|| format!("Invalid HTTP method {}", method))?;
        Ok(self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password)))
    }

    /// Discover the address books or calendars of the user.
    pub fn collections(&self, kind: CollectionKind) -> Result<Vec<Collection>> {
        let home = self.home(kind)?;
        log::debug!("PROPFIND {}", home);

        let response = self
            .request("PROPFIND", home.clone())?
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", "1")
            .body(PROPFIND_BODY)
            .send()
            .with_context(|| format!("Failed to reach {}", home))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            anyhow::bail!("Authentication failed for {}", self.username);
        }
        if !status.is_success() {
            anyhow::bail!("Failed to list collections at {} (status {})", home, status);
        }

        let body = response.text().context("Failed to read response body")?;
        let collections = parse_collections(&body, kind)?;
        log::info!("{} {:?} collection(s) found", collections.len(), kind);
        Ok(collections)
    }

    /// Every object of a collection.
    pub fn objects(&self, collection: &Collection, kind: CollectionKind) -> Result<Vec<DavObject>> {
        let url = self.resolve(&collection.href)?;
        log::debug!("REPORT {}", url);

        let response = self
            .request("REPORT", url)?
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", "1")
            .body(kind.query())
            .send()
            .with_context(|| format!("Failed to fetch {}", collection.name))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Failed to fetch {} (status {})", collection.name, status);
        }

        let body = response.text().context("Failed to read response body")?;
        let objects = parse_objects(&body, kind)?;
        log::info!("{}: {} object(s)", collection.name, objects.len());
        Ok(objects)
    }

    pub fn delete(&self, href: &str) -> Result<()> {
        let url = self.resolve(href)?;
        let response = self
            .request("DELETE", url)?
            .send()
            .with_context(|| format!("Failed to delete {}", href))?;

        let status = response.status();
        // 404: already gone
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Failed to delete {} (status {}): {}", href, status, body);
        }

        Ok(())
    }

    /// Create a new resource; fails if one already exists at `href`.
    pub fn put_new(&self, href: &str, ics: &str) -> Result<()> {
        let url = self.resolve(href)?;
        let response = self
            .request("PUT", url)?
            .header("Content-Type", "text/calendar; charset=utf-8")
            .header("If-None-Match", "*")
            .body(ics.to_string())
            .send()
            .with_context(|| format!("Failed to create {}", href))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Failed to create {} (status {}): {}", href, status, body);
        }

        Ok(())
    }
}

/// [`RecordStore`] over a [`DavClient`].
///
/// Events are created in the calendar given to [`DavStore::in_calendar`].
/// With a backup, the original text of a record is saved before it is
/// deleted, and a record without a saved copy is not deleted at all.
pub struct DavStore<'a> {
    client: &'a DavClient,
    calendar: Option<&'a Collection>,
    retry_delay: Duration,
    backup: Option<(Backup, &'a HashMap<String, String>)>,
    saved: HashSet<String>,
}

impl<'a> DavStore<'a> {
    pub fn new(client: &'a DavClient) -> Self {
        DavStore {
            client,
            calendar: None,
            retry_delay: Duration::ZERO,
            backup: None,
            saved: HashSet::new(),
        }
    }

    pub fn in_calendar(mut self, calendar: &'a Collection) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// `originals` maps hrefs to the text fetched from the server.
    pub fn with_backup(mut self, backup: Backup, originals: &'a HashMap<String, String>) -> Self {
        self.backup = Some((backup, originals));
        self
    }

    fn save_original(&mut self, href: &str) -> DedupResult<()> {
        let Some((ref backup, originals)) = self.backup else {
            return Ok(());
        };
        if self.saved.contains(href) {
            return Ok(());
        }

        let data = originals
            .get(href)
            .ok_or_else(|| DedupError::Collaborator(format!("no copy of {} to back up", href)))?;
        backup
            .save(href, data)
            .map_err(|e| DedupError::Collaborator(format!("backup failed: {:#}", e)))?;

        self.saved.insert(href.to_string());
        Ok(())
    }
}

impl RecordStore for DavStore<'_> {
    fn delete(&mut self, record: &Record) -> DedupResult<()> {
        self.save_original(&record.id)?;
        self.client
            .delete(&record.id)
            .map_err(|e| DedupError::Collaborator(format!("{:#}", e)))
    }

    fn create_event(&mut self, event: &BirthdayEvent) -> DedupResult<()> {
        let calendar = self
            .calendar
            .ok_or_else(|| DedupError::Collaborator("no target calendar".into()))?;
        let href = format!("{}/{}", calendar.href.trim_end_matches('/'), event.filename());
        self.client
            .put_new(&href, &event.ics)
            .map_err(|e| DedupError::Collaborator(format!("{:#}", e)))
    }

    fn before_retry(&mut self, attempt: u32) {
        if !self.retry_delay.is_zero() {
            log::debug!("waiting {:?} before attempt {}", self.retry_delay, attempt + 1);
            std::thread::sleep(self.retry_delay);
        }
    }
}

/// Collections of `kind` in a PROPFIND multistatus response.
fn parse_collections(xml: &str, kind: CollectionKind) -> Result<Vec<Collection>> {
    let doc = roxmltree::Document::parse(xml).context("Invalid PROPFIND response")?;

    let collections = doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
        .filter_map(|response| {
            let is_kind = response
                .descendants()
                .filter(|n| n.tag_name().name() == "resourcetype")
                .flat_map(|n| n.children())
                .any(|n| n.tag_name().name() == kind.resource_type());
            if !is_kind {
                return None;
            }

            let href = child_text(response, "href")?;
            let name = child_text(response, "displayname").unwrap_or_else(|| {
                href.trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });

            Some(Collection { href, name })
        })
        .collect();

    Ok(collections)
}

/// Objects carried in a REPORT multistatus response.
fn parse_objects(xml: &str, kind: CollectionKind) -> Result<Vec<DavObject>> {
    let doc = roxmltree::Document::parse(xml).context("Invalid REPORT response")?;

    let objects = doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
        .filter_map(|response| {
            let href = child_text(response, "href")?;
            let Some(data) = child_text(response, kind.data_property()) else {
                log::warn!("no {} for {}", kind.data_property(), href);
                return None;
            };
            Some(DavObject { href, data })
        })
        .collect();

    Ok(objects)
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPFIND: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:"
    xmlns:card="urn:ietf:params:xml:ns:carddav"
    xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/alice/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/alice/contacts/</d:href>
    <d:propstat><d:prop>
      <d:displayname>Contacts</d:displayname>
      <d:resourcetype><d:collection/><card:addressbook/></d:resourcetype>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/alice/work/</d:href>
    <d:propstat><d:prop>
      <d:displayname/>
      <d:resourcetype><d:collection/><card:addressbook/></d:resourcetype>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/calendars/alice/personal/</d:href>
    <d:propstat><d:prop>
      <d:displayname>Personal</d:displayname>
      <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn test_parse_collections_by_kind() {
        let books = parse_collections(PROPFIND, CollectionKind::AddressBook).unwrap();
        assert_eq!(
            books,
            vec![
                Collection {
                    href: "/remote.php/dav/addressbooks/users/alice/contacts/".into(),
                    name: "Contacts".into(),
                },
                Collection {
                    href: "/remote.php/dav/addressbooks/users/alice/work/".into(),
                    name: "work".into(),
                },
            ]
        );

        let calendars = parse_collections(PROPFIND, CollectionKind::Calendar).unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name, "Personal");
    }

    #[test]
    fn test_parse_report_objects() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/alice/contacts/1.vcf</d:href>
    <d:propstat><d:prop>
      <d:getetag>"abc"</d:getetag>
      <card:address-data>BEGIN:VCARD
FN:Jean Dupont
END:VCARD
</card:address-data>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/addressbooks/users/alice/contacts/2.vcf</d:href>
    <d:propstat><d:prop><d:getetag>"def"</d:getetag></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

        let objects = parse_objects(xml, CollectionKind::AddressBook).unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].data.starts_with("BEGIN:VCARD"));
        assert!(objects[0].data.contains("FN:Jean Dupont"));
    }

    #[test]
    fn test_invalid_xml_is_an_error() {
        assert!(parse_objects("<not xml", CollectionKind::Calendar).is_err());
    }

    #[test]
    fn test_nextcloud_urls() {
        let server = ServerSettings {
            url: "https://cloud.example.org/nextcloud".into(),
            username: "alice".into(),
            ..ServerSettings::default()
        };
        let client = DavClient::new(&server, "pw".into()).unwrap();

        assert_eq!(
            client.home(CollectionKind::AddressBook).unwrap().as_str(),
            "https://cloud.example.org/nextcloud/remote.php/dav/addressbooks/users/alice/"
        );
        assert_eq!(
            client.home(CollectionKind::Calendar).unwrap().as_str(),
            "https://cloud.example.org/nextcloud/remote.php/dav/calendars/alice/"
        );
        assert_eq!(
            client
                .resolve("/remote.php/dav/calendars/alice/personal/x.ics")
                .unwrap()
                .as_str(),
            "https://cloud.example.org/remote.php/dav/calendars/alice/personal/x.ics"
        );
    }

    fn offline_client() -> DavClient {
        let server = ServerSettings {
            url: "http://127.0.0.1:9".into(),
            username: "alice".into(),
            ..ServerSettings::default()
        };
        DavClient::new(&server, "pw".into()).unwrap()
    }

    #[test]
    fn test_record_without_backup_copy_is_not_deleted() {
        let client = offline_client();
        let root = tempfile::tempdir().unwrap();
        let originals = HashMap::new();
        let mut store = DavStore::new(&client)
            .with_backup(Backup::create(root.path()).unwrap(), &originals);

        let record = davdedup_core::vcard::parse_contact(
            "/book/1.vcf",
            "BEGIN:VCARD\nFN:Jean\nEND:VCARD\n",
        )
        .unwrap();
        let err = store.delete(&record).unwrap_err();
        assert!(err.to_string().contains("no copy"), "{}", err);
    }

    #[test]
    fn test_original_is_saved_once() {
        let client = offline_client();
        let root = tempfile::tempdir().unwrap();
        let backup = Backup::create(root.path()).unwrap();
        let dir = backup.dir().to_path_buf();
        let originals = HashMap::from([(
            "/book/1.vcf".to_string(),
            "BEGIN:VCARD\nFN:Jean\nEND:VCARD\n".to_string(),
        )]);
        let mut store = DavStore::new(&client).with_backup(backup, &originals);

        store.save_original("/book/1.vcf").unwrap();
        store.save_original("/book/1.vcf").unwrap();

        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.join("1.vcf")).unwrap(),
            "BEGIN:VCARD\nFN:Jean\nEND:VCARD\n"
        );
    }
}
