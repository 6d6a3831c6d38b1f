//! SQLite contact repository.
//!
//! # Responsibility
//! - Keep the `contacts` table consistent with the shared repository contract.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every write runs in one `IMMEDIATE` transaction and fully succeeds or
//!   rolls back.
//! - New ids come from `INTEGER PRIMARY KEY` allocation (max rowid + 1).
//! - Read paths report undecodable rows as `InvalidData` instead of masking them.

use crate::db::migrations::{latest_version, schema_version};
use crate::model::contact::{next_last_modified, Contact, ContactId, ContactValidationError};
use crate::query::filter::{count_matching, ContactFilter};
use crate::repo::contact_repo::{
    ensure_version_matches, require_id, ContactRepository, RepoError, RepoResult,
};
use log::debug;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const CONTACT_SELECT_SQL: &str = "SELECT
    id,
    name,
    street,
    city,
    country,
    phone,
    email,
    last_modified
FROM contacts";

const CONTACT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "street",
    "city",
    "country",
    "phone",
    "email",
    "last_modified",
];

/// SQLite-backed contact repository. Owns its connection.
pub struct SqliteContactRepository {
    conn: Connection,
}

impl SqliteContactRepository {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not the latest.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_contact_connection_ready(&conn)?;
        Ok(Self { conn })
    }
}

impl ContactRepository for SqliteContactRepository {
    fn persist(&mut self, contact: &Contact) -> RepoResult<Contact> {
        contact.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = match contact.id {
            None => insert_contact(&tx, contact)?,
            Some(id) => update_contact(&tx, id, contact)?,
        };
        tx.commit()?;

        debug!(
            "event=contact_store module=repo backend=sqlite status=ok id={}",
            stored.id.unwrap_or_default()
        );
        Ok(stored)
    }

    fn find(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        load_contact(&self.conn, id)
    }

    fn delete(&mut self, contact: &Contact) -> RepoResult<()> {
        let id = require_id(contact)?;
        let changed = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?1;", [id])?;
        debug!(
            "event=contact_remove module=repo backend=sqlite status=ok id={} removed={}",
            id,
            changed > 0
        );
        Ok(())
    }

    fn list_all(&self) -> RepoResult<Vec<Contact>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONTACT_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(parse_contact_row(row)?);
        }
        Ok(contacts)
    }

    fn size(&self, filter: &ContactFilter) -> RepoResult<usize> {
        if !filter.is_empty() {
            let contacts = self.list_all()?;
            return Ok(count_matching(&contacts, filter));
        }

        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM contacts;", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative contact count `{count}`")))
    }
}

fn insert_contact(tx: &Transaction<'_>, contact: &Contact) -> RepoResult<Contact> {
    ensure_unique(tx, contact, None)?;

    let last_modified = next_last_modified(None);
    tx.execute(
        "INSERT INTO contacts (
            name,
            street,
            city,
            country,
            phone,
            email,
            last_modified
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            contact.name.as_str(),
            contact.street.as_str(),
            contact.city.as_str(),
            contact.country.as_str(),
            contact.phone.as_str(),
            contact.email.as_str(),
            last_modified,
        ],
    )?;

    let mut stored = contact.clone();
    stored.id = Some(tx.last_insert_rowid());
    stored.last_modified = Some(last_modified);
    Ok(stored)
}

fn update_contact(tx: &Transaction<'_>, id: ContactId, contact: &Contact) -> RepoResult<Contact> {
    ensure_unique(tx, contact, Some(id))?;

    let existing = load_contact(tx, id)?.ok_or(RepoError::NotFound(id))?;
    ensure_version_matches(contact, &existing)?;

    let last_modified = next_last_modified(existing.last_modified);
    let changed = tx.execute(
        "UPDATE contacts
         SET
            name = ?1,
            street = ?2,
            city = ?3,
            country = ?4,
            phone = ?5,
            email = ?6,
            last_modified = ?7
         WHERE id = ?8;",
        params![
            contact.name.as_str(),
            contact.street.as_str(),
            contact.city.as_str(),
            contact.country.as_str(),
            contact.phone.as_str(),
            contact.email.as_str(),
            last_modified,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }

    let mut stored = contact.clone();
    stored.last_modified = Some(last_modified);
    Ok(stored)
}

fn ensure_unique(
    conn: &Connection,
    contact: &Contact,
    exclude_id: Option<ContactId>,
) -> RepoResult<()> {
    if value_taken(conn, "email", &contact.email, exclude_id)? {
        return Err(ContactValidationError::DuplicateEmail(contact.email.clone()).into());
    }
    if value_taken(conn, "phone", &contact.phone, exclude_id)? {
        return Err(ContactValidationError::DuplicatePhone(contact.phone.clone()).into());
    }
    Ok(())
}

fn value_taken(
    conn: &Connection,
    column: &'static str,
    value: &str,
    exclude_id: Option<ContactId>,
) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(
                SELECT 1
                FROM contacts
                WHERE {column} = ?1
                  AND (?2 IS NULL OR id <> ?2)
            );"
        ),
        params![value, exclude_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_contact(conn: &Connection, id: ContactId) -> RepoResult<Option<Contact>> {
    let mut stmt = conn.prepare(&format!("{CONTACT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_contact_row(row)?));
    }
    Ok(None)
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<Contact> {
    let contact = decode_contact_row(row).map_err(decode_error)?;
    if contact.id.is_none() {
        return Err(RepoError::InvalidData("NULL value in contacts.id".to_string()));
    }
    Ok(contact)
}

fn decode_contact_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get("id")?,
        name: row.get("name")?,
        street: row.get("street")?,
        city: row.get("city")?,
        country: row.get("country")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        last_modified: row.get("last_modified")?,
    })
}

// Type mismatches are bad rows, not transport failures.
fn decode_error(err: rusqlite::Error) -> RepoError {
    match err {
        rusqlite::Error::InvalidColumnType(_, column, kind) => {
            RepoError::InvalidData(format!("contacts.{column} holds a {kind} value"))
        }
        rusqlite::Error::FromSqlConversionFailure(_, kind, source) => {
            RepoError::InvalidData(format!("cannot decode {kind} value: {source}"))
        }
        other => other.into(),
    }
}

fn ensure_contact_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "contacts")? {
        return Err(RepoError::MissingRequiredTable("contacts"));
    }

    for &column in CONTACT_COLUMNS {
        if !table_has_column(conn, "contacts", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "contacts",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
