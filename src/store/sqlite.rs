use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params,
    params_from_iter,
};

use super::schema::SCHEMA;
use super::{DistroOrder, Store};
use crate::error::{Error, Result};
use crate::types::*;

const DISTRO_COLUMNS: &str = "distro_id, name, owner, author, author_email, classifiers,
    description, download_url, home_page, keywords, license, metadata_version, platform,
    summary, version, last_updated";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_distribution(row: &Row<'_>) -> rusqlite::Result<Distribution> {
    Ok(Distribution {
        distro_id: row.get(0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        metadata: DistroMetadata {
            author: row.get(3)?,
            author_email: row.get(4)?,
            classifiers: row.get(5)?,
            description: row.get(6)?,
            download_url: row.get(7)?,
            home_page: row.get(8)?,
            keywords: row.get(9)?,
            license: row.get(10)?,
            metadata_version: row.get(11)?,
            platform: row.get(12)?,
            summary: row.get(13)?,
            version: row.get(14)?,
        },
        last_updated: row
            .get::<_, Option<String>>(15)?
            .map(|s| parse_datetime(&s)),
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        username: row.get(0)?,
        password_hash: row.get(1)?,
        email: row.get(2)?,
    })
}

fn row_to_pin(row: &Row<'_>) -> rusqlite::Result<IndexPin> {
    Ok(IndexPin {
        indexname: row.get(0)?,
        distro_id: row.get(1)?,
        target_distro_id: row.get(2)?,
        target_version: row.get(3)?,
    })
}

fn order_clause(order: DistroOrder) -> &'static str {
    match order {
        DistroOrder::DistroId => "ORDER BY distro_id",
        DistroOrder::LastUpdated => "ORDER BY last_updated DESC, distro_id",
    }
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('%');
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn ensure_subject(tx: &Transaction<'_>, subject: &Subject) -> Result<()> {
    match subject {
        Subject::User(name) => tx.execute(
            "INSERT OR IGNORE INTO users (username) VALUES (?1)",
            params![name],
        )?,
        Subject::Group(name) => tx.execute(
            "INSERT OR IGNORE INTO groups (groupname) VALUES (?1)",
            params![name],
        )?,
    };
    Ok(())
}

fn select_roles(conn: &Connection, distro_id: &str, subject: &Subject) -> Result<RoleSet> {
    let (username, groupname) = subject.columns();
    let mut stmt = conn.prepare(
        "SELECT role FROM role_grants WHERE distro_id = ?1 AND username = ?2 AND groupname = ?3",
    )?;
    let rows = stmt.query_map(params![distro_id, username, groupname], |row| row.get(0))?;
    rows.collect::<std::result::Result<RoleSet, _>>()
        .map_err(Error::from)
}

/// Diffs the stored grants of one (scope, subject) pair against `roles`
/// and applies the difference. Returns false when nothing was written.
fn reconcile_roles(
    tx: &Transaction<'_>,
    distro_id: &str,
    subject: &Subject,
    roles: &RoleSet,
) -> Result<bool> {
    let current = select_roles(tx, distro_id, subject)?;
    if &current == roles {
        return Ok(false);
    }

    ensure_subject(tx, subject)?;
    let (username, groupname) = subject.columns();

    for role in current.difference(roles) {
        tx.execute(
            "DELETE FROM role_grants
             WHERE role = ?1 AND distro_id = ?2 AND username = ?3 AND groupname = ?4",
            params![role, distro_id, username, groupname],
        )?;
    }
    for role in roles.difference(&current) {
        tx.execute(
            "INSERT INTO role_grants (role, distro_id, username, groupname)
             VALUES (?1, ?2, ?3, ?4)",
            params![role, distro_id, username, groupname],
        )?;
    }
    Ok(true)
}

fn select_user_groups(conn: &Connection, username: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT groupname FROM user_groups WHERE username = ?1")?;
    let rows = stmt.query_map(params![username], |row| row.get(0))?;
    rows.collect::<std::result::Result<BTreeSet<_>, _>>()
        .map_err(Error::from)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT INTO users (username, password_hash, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO NOTHING",
            params![user.username, user.password_hash, user.email],
        )?;
        Ok(inserted == 1)
    }

    fn update_user(&self, user: &User, roles: Option<&RoleSet>) -> Result<User> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO users (username, password_hash, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO UPDATE SET
                password_hash = COALESCE(excluded.password_hash, users.password_hash),
                email = excluded.email",
            params![user.username, user.password_hash, user.email],
        )?;
        if let Some(roles) = roles {
            reconcile_roles(&tx, "", &Subject::User(user.username.clone()), roles)?;
        }
        let stored = tx.query_row(
            "SELECT username, password_hash, email FROM users WHERE username = ?1",
            params![user.username],
            row_to_user,
        )?;

        tx.commit()?;
        Ok(stored)
    }

    fn get_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT username, password_hash, email FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT username, password_hash, email FROM users ORDER BY username")?;
        let rows = stmt.query_map([], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Group operations

    fn update_group(&self, groupname: &str, roles: Option<&RoleSet>) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let subject = Subject::Group(groupname.to_string());
        ensure_subject(&tx, &subject)?;
        if let Some(roles) = roles {
            reconcile_roles(&tx, "", &subject, roles)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT groupname FROM groups ORDER BY groupname")?;
        let rows = stmt.query_map([], |row| {
            Ok(Group {
                groupname: row.get(0)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_groups(&self, username: &str) -> Result<BTreeSet<String>> {
        select_user_groups(&self.conn(), username)
    }

    fn set_user_groups(&self, username: &str, groups: &BTreeSet<String>) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = select_user_groups(&tx, username)?;
        if &current == groups {
            return Ok(false);
        }

        ensure_subject(&tx, &Subject::User(username.to_string()))?;
        tx.execute(
            "DELETE FROM user_groups WHERE username = ?1",
            params![username],
        )?;

        for groupname in groups {
            let created = tx.execute(
                "INSERT OR IGNORE INTO groups (groupname) VALUES (?1)",
                params![groupname],
            )?;
            if created > 0 {
                tracing::info!("Created new group \"{}\"", groupname);
            }
            tx.execute(
                "INSERT INTO user_groups (username, groupname) VALUES (?1, ?2)",
                params![username, groupname],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    // Role grant operations

    fn list_roles(&self, distro_id: &str, subject: &Subject) -> Result<RoleSet> {
        select_roles(&self.conn(), distro_id, subject)
    }

    fn list_grants(&self, distro_id: Option<&str>) -> Result<Vec<RoleGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT role, distro_id, username, groupname FROM role_grants
             WHERE ?1 IS NULL OR distro_id = ?1
             ORDER BY distro_id, username, groupname, role",
        )?;
        let rows = stmt.query_map(params![distro_id], |row| {
            let username: String = row.get(2)?;
            let groupname: String = row.get(3)?;
            Ok(RoleGrant {
                role: row.get(0)?,
                distro_id: row.get(1)?,
                subject: if username.is_empty() {
                    Subject::Group(groupname)
                } else {
                    Subject::User(username)
                },
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_roles(&self, distro_id: &str, subject: &Subject, roles: &RoleSet) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !reconcile_roles(&tx, distro_id, subject, roles)? {
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    // Distribution operations

    fn create_distribution(&self, distro: &Distribution) -> Result<()> {
        let m = &distro.metadata;
        let result = self.conn().execute(
            &format!("INSERT INTO distributions ({DISTRO_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"),
            params![
                distro.distro_id,
                distro.name,
                distro.owner,
                m.author,
                m.author_email,
                m.classifiers,
                m.description,
                m.download_url,
                m.home_page,
                m.keywords,
                m.license,
                m.metadata_version,
                m.platform,
                m.summary,
                m.version,
                distro.last_updated.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(format!(
                    "distro \"{}\" already exists",
                    distro.distro_id
                )))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_distribution(&self, distro_id: &str) -> Result<Option<Distribution>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DISTRO_COLUMNS} FROM distributions WHERE distro_id = ?1"),
            params![distro_id],
            row_to_distribution,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_distribution(&self, distro: &Distribution) -> Result<()> {
        let m = &distro.metadata;
        let rows = self.conn().execute(
            "UPDATE distributions SET name = ?1, author = ?2, author_email = ?3,
                classifiers = ?4, description = ?5, download_url = ?6, home_page = ?7,
                keywords = ?8, license = ?9, metadata_version = ?10, platform = ?11,
                summary = ?12, version = ?13, last_updated = ?14
             WHERE distro_id = ?15",
            params![
                distro.name,
                m.author,
                m.author_email,
                m.classifiers,
                m.description,
                m.download_url,
                m.home_page,
                m.keywords,
                m.license,
                m.metadata_version,
                m.platform,
                m.summary,
                m.version,
                distro.last_updated.as_ref().map(format_datetime),
                distro.distro_id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::no_such_distro(&distro.distro_id));
        }
        Ok(())
    }

    fn touch_distribution(&self, distro_id: &str, at: DateTime<Utc>) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE distributions SET last_updated = ?1 WHERE distro_id = ?2",
            params![format_datetime(&at), distro_id],
        )?;

        if rows == 0 {
            return Err(Error::no_such_distro(distro_id));
        }
        Ok(())
    }

    fn delete_distribution(&self, distro_id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM role_grants WHERE distro_id = ?1",
            params![distro_id],
        )?;
        tx.execute(
            "DELETE FROM index_pins WHERE distro_id = ?1",
            params![distro_id],
        )?;
        let rows = tx.execute(
            "DELETE FROM distributions WHERE distro_id = ?1",
            params![distro_id],
        )?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn list_distributions(&self, order: DistroOrder) -> Result<Vec<Distribution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DISTRO_COLUMNS} FROM distributions {}",
            order_clause(order)
        ))?;
        let rows = stmt.query_map([], row_to_distribution)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn search_distributions(&self, needle: &str, order: DistroOrder) -> Result<Vec<Distribution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DISTRO_COLUMNS} FROM distributions
             WHERE name LIKE ?1 ESCAPE '\\'
                OR description LIKE ?1 ESCAPE '\\'
                OR summary LIKE ?1 ESCAPE '\\'
             {}",
            order_clause(order)
        ))?;
        let rows = stmt.query_map(params![escape_like(needle)], row_to_distribution)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn find_distributions(&self, distro_ids: &[String]) -> Result<Vec<Distribution>> {
        if distro_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; distro_ids.len()].join(", ");
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DISTRO_COLUMNS} FROM distributions
             WHERE distro_id IN ({placeholders}) ORDER BY distro_id"
        ))?;
        let rows = stmt.query_map(params_from_iter(distro_ids.iter()), row_to_distribution)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Index pin operations

    fn add_pin(&self, pin: &IndexPin) -> Result<()> {
        self.conn().execute(
            "INSERT INTO index_pins (indexname, distro_id, target_distro_id, target_version)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(indexname, distro_id, target_distro_id)
             DO UPDATE SET target_version = excluded.target_version",
            params![
                pin.indexname,
                pin.distro_id,
                pin.target_distro_id,
                pin.target_version
            ],
        )?;
        Ok(())
    }

    fn remove_pin(
        &self,
        distro_id: &str,
        indexname: &str,
        target_distro_id: &str,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM index_pins
             WHERE distro_id = ?1 AND indexname = ?2 AND target_distro_id = ?3",
            params![distro_id, indexname, target_distro_id],
        )?;
        Ok(rows > 0)
    }

    fn list_pins(&self, distro_id: &str, indexname: &str) -> Result<Vec<IndexPin>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT indexname, distro_id, target_distro_id, target_version FROM index_pins
             WHERE distro_id = ?1 AND indexname = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![distro_id, indexname], row_to_pin)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_index_names(&self, distro_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT indexname FROM index_pins WHERE distro_id = ?1
             GROUP BY indexname ORDER BY MIN(rowid)",
        )?;
        let rows = stmt.query_map(params![distro_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn has_index(&self, distro_id: &str, indexname: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM index_pins WHERE distro_id = ?1 AND indexname = ?2 LIMIT 1",
                params![distro_id, indexname],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn clear_index(&self, distro_id: &str, indexname: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM index_pins WHERE distro_id = ?1 AND indexname = ?2",
            params![distro_id, indexname],
        )?;
        Ok(rows)
    }

    fn replace_index(&self, distro_id: &str, indexname: &str, pins: &[IndexPin]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM index_pins WHERE distro_id = ?1 AND indexname = ?2",
            params![distro_id, indexname],
        )?;

        for pin in pins {
            tx.execute(
                "INSERT INTO index_pins (indexname, distro_id, target_distro_id, target_version)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(indexname, distro_id, target_distro_id)
                 DO UPDATE SET target_version = excluded.target_version",
                params![indexname, distro_id, pin.target_distro_id, pin.target_version],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
