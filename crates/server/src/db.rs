// Database persistence layer using SQLite

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;
use xsshunter_core::{
    token, CollectedPage, NewPayloadFire, NewSecret, PageRequest, PayloadFire, RecordOutcome,
    Secret, User,
};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Database {
    conn: Mutex<Connection>,
}

/// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!(raw, error = %e, "Unparseable timestamp in database");
            DateTime::<Utc>::UNIX_EPOCH
        })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

const FIRE_COLUMNS: &str = "id, user_id, url, ip_address, referer, user_agent, cookies, title,
     dom, text, origin, screenshot_id, was_iframe, browser_timestamp, cors, git_exposed,
     correlated_request, created_at";

const USER_COLUMNS: &str = "id, email, path, correlation_key, chainload_uri, pages_to_collect,
     send_email_alerts, created_at";

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                path TEXT NOT NULL UNIQUE,
                correlation_key TEXT UNIQUE,
                chainload_uri TEXT,
                pages_to_collect TEXT NOT NULL DEFAULT '[]',
                send_email_alerts INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS payload_fire_results (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                url TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                referer TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                cookies TEXT NOT NULL,
                title TEXT NOT NULL,
                dom TEXT,
                text TEXT,
                origin TEXT NOT NULL,
                screenshot_id TEXT,
                was_iframe INTEGER NOT NULL,
                browser_timestamp INTEGER NOT NULL,
                cors TEXT,
                git_exposed TEXT,
                correlated_request TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Child rows of payload_fire_results; removed by delete_fires.
            CREATE TABLE IF NOT EXISTS secrets (
                id TEXT PRIMARY KEY,
                payload_id TEXT NOT NULL,
                secret_type TEXT NOT NULL,
                secret_value TEXT
            );

            CREATE TABLE IF NOT EXISTS collected_pages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                uri TEXT NOT NULL,
                html TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS injection_requests (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                injection_key TEXT NOT NULL,
                request TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_injection_requests_key
                ON injection_requests(injection_key);

            CREATE INDEX IF NOT EXISTS idx_fires_user_created
                ON payload_fire_results(user_id, created_at DESC);

            CREATE INDEX IF NOT EXISTS idx_secrets_payload
                ON secrets(payload_id);

            CREATE INDEX IF NOT EXISTS idx_collected_pages_user_created
                ON collected_pages(user_id, created_at DESC);
        "#,
        )?;
        Ok(())
    }

    pub fn ping(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Create an identity with a fresh routing token.
    pub fn create_user(&self, email: &str) -> Result<User, DbError> {
        let user = User::new(
            Uuid::new_v4().to_string(),
            email.to_string(),
            token::new_path_token(),
            parse_ts(&ts(&Utc::now())),
        );
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, email, path, correlation_key, chainload_uri,
                                pages_to_collect, send_email_alerts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.email,
                user.path,
                user.correlation_key,
                user.chainload_uri,
                serde_json::to_string(&user.pages_to_collect)?,
                user.send_email_alerts,
                ts(&user.created_at),
            ],
        )?;
        Ok(user)
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        self.find_user_where("id", id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        self.find_user_where("email", email)
    }

    pub fn find_user_by_path(&self, path: &str) -> Result<Option<User>, DbError> {
        self.find_user_where("path", path)
    }

    pub fn find_user_by_correlation_key(&self, key: &str) -> Result<Option<User>, DbError> {
        self.find_user_where("correlation_key", key)
    }

    fn find_user_where(&self, column: &'static str, value: &str) -> Result<Option<User>, DbError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        let raw = conn
            .query_row(&sql, params![value], |row| {
                Ok((Self::row_to_user(row)?, row.get::<_, String>(5)?))
            })
            .optional()?;
        match raw {
            Some((mut user, pages)) => {
                user.pages_to_collect = serde_json::from_str(&pages)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Persist the owner-editable columns of `user`.
    pub fn update_user_settings(&self, user: &User) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET path = ?2, correlation_key = ?3, chainload_uri = ?4,
                              pages_to_collect = ?5, send_email_alerts = ?6
             WHERE id = ?1",
            params![
                user.id,
                user.path,
                user.correlation_key,
                user.chainload_uri,
                serde_json::to_string(&user.pages_to_collect)?,
                user.send_email_alerts,
            ],
        )?;
        Ok(())
    }

    fn row_to_user(row: &Row<'_>) -> Result<User, rusqlite::Error> {
        let created_at: String = row.get(7)?;
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            path: row.get(2)?,
            correlation_key: row.get(3)?,
            chainload_uri: row.get(4)?,
            pages_to_collect: Vec::new(),
            send_email_alerts: row.get(6)?,
            created_at: parse_ts(&created_at),
        })
    }

    // ========================================================================
    // Payload fires
    // ========================================================================

    /// Insert a fire and all of its secrets in one transaction.
    pub fn create_fire(&self, fire: &NewPayloadFire, secrets: &[NewSecret]) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        let created_at = ts(&Utc::now());

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"INSERT INTO payload_fire_results
               (id, user_id, url, ip_address, referer, user_agent, cookies, title,
                dom, text, origin, screenshot_id, was_iframe, browser_timestamp, cors,
                git_exposed, correlated_request, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"#,
            params![
                id,
                fire.user_id,
                fire.url,
                fire.ip_address,
                fire.referer,
                fire.user_agent,
                fire.cookies,
                fire.title,
                fire.dom,
                fire.text,
                fire.origin,
                fire.screenshot_id,
                fire.was_iframe,
                fire.browser_timestamp,
                fire.cors,
                fire.git_exposed,
                fire.correlated_request,
                created_at,
            ],
        )?;
        for secret in secrets {
            tx.execute(
                "INSERT INTO secrets (id, payload_id, secret_type, secret_value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    id,
                    secret.secret_type,
                    secret.secret_value
                ],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Newest-first page of an owner's fires, with the owner's total count.
    pub fn list_fires(
        &self,
        owner_id: &str,
        page: PageRequest,
    ) -> Result<(Vec<PayloadFire>, u64), DbError> {
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM payload_fire_results WHERE user_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {FIRE_COLUMNS} FROM payload_fire_results
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut fires = stmt
            .query_map(
                params![owner_id, i64::from(page.limit), sql_offset(page)],
                Self::row_to_fire,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        if !fires.is_empty() {
            let ids: Vec<&str> = fires.iter().map(|f| f.id.as_str()).collect();
            let sql = format!(
                "SELECT id, payload_id, secret_type, secret_value FROM secrets
                 WHERE payload_id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let secrets = stmt
                .query_map(params_from_iter(ids.iter()), |row| {
                    Ok(Secret {
                        id: row.get(0)?,
                        payload_id: row.get(1)?,
                        secret_type: row.get(2)?,
                        secret_value: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            for secret in secrets {
                if let Some(fire) = fires.iter_mut().find(|f| f.id == secret.payload_id) {
                    fire.secrets.push(secret);
                }
            }
        }

        Ok((fires, total.max(0) as u64))
    }

    /// Screenshot ids of the given fires that belong to `owner_id`.
    pub fn screenshot_ids_for(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<Vec<(String, Option<String>)>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT id, screenshot_id FROM payload_fire_results
             WHERE user_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let bound = std::iter::once(owner_id).chain(ids.iter().map(String::as_str));
        let rows = stmt
            .query_map(params_from_iter(bound), |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete fires owned by `owner_id` together with their secrets.
    pub fn delete_fires(&self, owner_id: &str, ids: &[String]) -> Result<usize, DbError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in ids {
            tx.execute(
                "DELETE FROM secrets WHERE payload_id IN
                    (SELECT id FROM payload_fire_results WHERE id = ?1 AND user_id = ?2)",
                params![id, owner_id],
            )?;
            deleted += tx.execute(
                "DELETE FROM payload_fire_results WHERE id = ?1 AND user_id = ?2",
                params![id, owner_id],
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn row_to_fire(row: &Row<'_>) -> Result<PayloadFire, rusqlite::Error> {
        let created_at: String = row.get(17)?;
        Ok(PayloadFire {
            id: row.get(0)?,
            user_id: row.get(1)?,
            url: row.get(2)?,
            ip_address: row.get(3)?,
            referer: row.get(4)?,
            user_agent: row.get(5)?,
            cookies: row.get(6)?,
            title: row.get(7)?,
            dom: row.get(8)?,
            text: row.get(9)?,
            origin: row.get(10)?,
            screenshot_id: row.get(11)?,
            was_iframe: row.get(12)?,
            browser_timestamp: row.get(13)?,
            cors: row.get(14)?,
            git_exposed: row.get(15)?,
            correlated_request: row.get(16)?,
            created_at: parse_ts(&created_at),
            secrets: Vec::new(),
        })
    }

    // ========================================================================
    // Collected pages
    // ========================================================================

    pub fn create_collected_page(
        &self,
        owner_id: &str,
        uri: &str,
        html: Option<&str>,
    ) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO collected_pages (id, user_id, uri, html, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, owner_id, uri, html, ts(&Utc::now())],
        )?;
        Ok(id)
    }

    pub fn list_collected_pages(
        &self,
        owner_id: &str,
        page: PageRequest,
    ) -> Result<(Vec<CollectedPage>, u64), DbError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM collected_pages WHERE user_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, uri, html, created_at FROM collected_pages
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let pages = stmt
            .query_map(
                params![owner_id, i64::from(page.limit), sql_offset(page)],
                |row| {
                    let created_at: String = row.get(4)?;
                    Ok(CollectedPage {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        uri: row.get(2)?,
                        html: row.get(3)?,
                        created_at: parse_ts(&created_at),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((pages, total.max(0) as u64))
    }

    pub fn delete_collected_pages(&self, owner_id: &str, ids: &[String]) -> Result<usize, DbError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute(
                "DELETE FROM collected_pages WHERE id = ?1 AND user_id = ?2",
                params![id, owner_id],
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    // ========================================================================
    // Injection requests
    // ========================================================================

    /// Register an injection key. A key that already exists is reported as a
    /// conflict and the stored request is left untouched.
    pub fn record_injection(
        &self,
        owner_id: &str,
        injection_key: &str,
        request: &str,
    ) -> Result<RecordOutcome, DbError> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO injection_requests (id, user_id, injection_key, request, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                owner_id,
                injection_key,
                request,
                ts(&Utc::now())
            ],
        );
        match result {
            Ok(_) => Ok(RecordOutcome::Created),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(RecordOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn resolve_injection(&self, injection_key: &str) -> Result<Option<String>, DbError> {
        let conn = self.lock()?;
        let request = conn
            .query_row(
                "SELECT request FROM injection_requests WHERE injection_key = ?1",
                params![injection_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(request)
    }

    // ========================================================================
    // Deployment settings
    // ========================================================================

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_setting(&self, key: &str, value: &str) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// SQLite reads a negative OFFSET as zero, so clamp instead of wrapping.
fn sql_offset(page: PageRequest) -> i64 {
    i64::try_from(page.offset()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsshunter_core::NO_CORRELATED_REQUEST;

    fn new_fire(user_id: &str, url: &str, screenshot_id: Option<&str>) -> NewPayloadFire {
        NewPayloadFire {
            user_id: user_id.to_string(),
            url: url.to_string(),
            ip_address: "203.0.113.9".to_string(),
            referer: String::new(),
            user_agent: "test-agent".to_string(),
            cookies: "a=b".to_string(),
            title: "Victim".to_string(),
            dom: Some("<html></html>".to_string()),
            text: None,
            origin: "http://victim".to_string(),
            screenshot_id: screenshot_id.map(str::to_string),
            was_iframe: false,
            browser_timestamp: 1_700_000_000_000,
            cors: None,
            git_exposed: None,
            correlated_request: NO_CORRELATED_REQUEST.to_string(),
        }
    }

    #[test]
    fn test_user_lookups() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("owner@example.com").unwrap();

        assert_eq!(db.find_user_by_path(&user.path).unwrap(), Some(user.clone()));
        assert_eq!(
            db.find_user_by_email("owner@example.com").unwrap().map(|u| u.id),
            Some(user.id.clone())
        );
        assert!(db.find_user_by_path("nope").unwrap().is_none());
        assert!(db.create_user("owner@example.com").is_err());
    }

    #[test]
    fn test_update_user_settings_round_trips_pages() {
        let db = Database::open_in_memory().unwrap();
        let mut user = db.create_user("owner@example.com").unwrap();
        user.pages_to_collect = vec!["/admin".to_string(), "/debug".to_string()];
        user.correlation_key = Some("k".repeat(64));
        user.send_email_alerts = false;
        db.update_user_settings(&user).unwrap();

        let loaded = db.find_user_by_correlation_key(&"k".repeat(64)).unwrap().unwrap();
        assert_eq!(loaded.pages_to_collect, user.pages_to_collect);
        assert!(!loaded.send_email_alerts);
    }

    #[test]
    fn test_create_fire_with_secrets_and_list() {
        let db = Database::open_in_memory().unwrap();
        let secrets = vec![
            NewSecret {
                secret_type: "aws_key".to_string(),
                secret_value: Some("AKIA".to_string()),
            },
            NewSecret {
                secret_type: "jwt".to_string(),
                secret_value: None,
            },
        ];
        let id = db
            .create_fire(&new_fire("u1", "http://victim/x", None), &secrets)
            .unwrap();

        let (fires, total) = db.list_fires("u1", PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(fires[0].id, id);
        assert_eq!(fires[0].secrets.len(), 2);

        let (others, total) = db.list_fires("u2", PageRequest::default()).unwrap();
        assert!(others.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_list_is_newest_first_and_pages_do_not_overlap() {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..15 {
            ids.push(
                db.create_fire(&new_fire("u1", &format!("http://victim/{i}"), None), &[])
                    .unwrap(),
            );
        }

        let (first, total) = db
            .list_fires("u1", PageRequest::from_query(Some("1"), Some("10")))
            .unwrap();
        let (second, _) = db
            .list_fires("u1", PageRequest::from_query(Some("2"), Some("10")))
            .unwrap();

        assert_eq!(total, 15);
        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 5);
        assert_eq!(first[0].id, ids[14]);
        assert!(second.iter().all(|f| !first.iter().any(|g| g.id == f.id)));
    }

    #[test]
    fn test_page_far_past_the_end_is_empty() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..3 {
            db.create_fire(&new_fire("u1", &format!("http://victim/{i}"), None), &[])
                .unwrap();
        }
        db.create_collected_page("u1", "http://victim/admin", None)
            .unwrap();

        let huge = PageRequest::from_query(Some("4294967295"), Some("4294967295"));
        let (fires, total) = db.list_fires("u1", huge).unwrap();
        assert!(fires.is_empty());
        assert_eq!(total, 3);

        let (pages, total) = db.list_collected_pages("u1", huge).unwrap();
        assert!(pages.is_empty());
        assert_eq!(total, 1);
    }

    #[test]
    fn test_delete_fires_is_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let secret = NewSecret {
            secret_type: "token".to_string(),
            secret_value: None,
        };
        let mine = db
            .create_fire(&new_fire("u1", "http://a", Some("shot")), &[secret.clone()])
            .unwrap();
        let theirs = db.create_fire(&new_fire("u2", "http://b", None), &[secret]).unwrap();

        let shots = db
            .screenshot_ids_for("u1", &[mine.clone(), theirs.clone()])
            .unwrap();
        assert_eq!(shots, vec![(mine.clone(), Some("shot".to_string()))]);

        let deleted = db.delete_fires("u1", &[mine, theirs.clone()]).unwrap();
        assert_eq!(deleted, 1);
        let (remaining, _) = db.list_fires("u2", PageRequest::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].secrets.len(), 1);
    }

    #[test]
    fn test_injection_key_conflict_keeps_first_request() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.record_injection("u1", "key-1", "GET /first").unwrap(),
            RecordOutcome::Created
        );
        assert_eq!(
            db.record_injection("u1", "key-1", "GET /second").unwrap(),
            RecordOutcome::Conflict
        );
        assert_eq!(
            db.resolve_injection("key-1").unwrap().as_deref(),
            Some("GET /first")
        );
        assert!(db.resolve_injection("missing").unwrap().is_none());
    }

    #[test]
    fn test_collected_pages() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_collected_page("u1", "http://victim/admin", Some("<b>hi</b>"))
            .unwrap();
        let (pages, total) = db.list_collected_pages("u1", PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(pages[0].html.as_deref(), Some("<b>hi</b>"));

        assert_eq!(db.delete_collected_pages("u2", &[id.clone()]).unwrap(), 0);
        assert_eq!(db.delete_collected_pages("u1", &[id]).unwrap(), 1);
    }

    #[test]
    fn test_settings_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_setting("session_secret").unwrap().is_none());
        db.put_setting("session_secret", "one").unwrap();
        db.put_setting("session_secret", "two").unwrap();
        assert_eq!(db.get_setting("session_secret").unwrap().as_deref(), Some("two"));
        db.ping().unwrap();
    }
}
