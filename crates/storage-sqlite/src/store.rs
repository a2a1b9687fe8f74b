//! Key-value settings store plus cached liveness rows.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use vigil_core::errors::{Error, Result};
use vigil_core::liveness::{AlertCategory, CheckerLiveness, Identity, LivenessStore, Role};

const KEY_USER_ID: &str = "user_id";
const KEY_ROLE: &str = "role";
const KEY_WATCHED_CHECKER_ID: &str = "watched_checker_id";
const KEY_API_KEY: &str = "api_key";
const KEY_LAST_LOCAL_CHECKIN: &str = "last_checkin";
const KEY_CHECK_INTERVAL_SECS: &str = "check_interval_secs";
const KEY_CHECK_WINDOW_SECS: &str = "check_window_secs";
const KEY_PUSH_TOKEN: &str = "push_token";
const KEY_PUSH_TOKEN_FETCHED_AT: &str = "push_token_fetched_at";

fn storage_err(err: impl ToString) -> Error {
    Error::storage(err.to_string())
}

/// Durable local state behind a single write-serialized connection.
///
/// Last-write-wins per key; no cross-key transactions beyond
/// `save_identity`, which writes its four keys atomically.
pub struct SettingsStore {
    conn: Mutex<Connection>,
}

impl SettingsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS liveness (
                checker_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .map_err(storage_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| Error::storage("settings store poisoned"))?;
        f(&mut conn)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM settings WHERE key = ?1", params![key])
                .map_err(storage_err)?;
            Ok(())
        })
    }

    // ── Identity ────────────────────────────────────────────────────────

    /// Persist the local identity in one transaction.
    pub fn save_identity(&self, identity: &Identity) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(storage_err)?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO settings (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    )
                    .map_err(storage_err)?;
                stmt.execute(params![KEY_USER_ID, identity.user_id])
                    .map_err(storage_err)?;
                stmt.execute(params![KEY_ROLE, identity.role.as_str()])
                    .map_err(storage_err)?;
                stmt.execute(params![KEY_API_KEY, identity.api_key])
                    .map_err(storage_err)?;
                match &identity.watched_checker_id {
                    Some(checker_id) => {
                        stmt.execute(params![KEY_WATCHED_CHECKER_ID, checker_id])
                            .map_err(storage_err)?;
                    }
                    None => {
                        tx.execute(
                            "DELETE FROM settings WHERE key = ?1",
                            params![KEY_WATCHED_CHECKER_ID],
                        )
                        .map_err(storage_err)?;
                    }
                }
            }
            tx.commit().map_err(storage_err)?;
            Ok(())
        })
    }

    /// Load the local identity, if setup has completed.
    pub fn load_identity(&self) -> Result<Option<Identity>> {
        let Some(user_id) = self.get(KEY_USER_ID)? else {
            return Ok(None);
        };
        let Some(role) = self.get(KEY_ROLE)?.as_deref().and_then(Role::parse) else {
            return Ok(None);
        };
        let Some(api_key) = self.get(KEY_API_KEY)? else {
            return Ok(None);
        };
        Ok(Some(Identity {
            user_id,
            role,
            watched_checker_id: self.get(KEY_WATCHED_CHECKER_ID)?,
            api_key,
        }))
    }

    // ── Check-in contract ───────────────────────────────────────────────

    pub fn set_last_local_checkin(&self, timestamp: i64) -> Result<()> {
        self.set(KEY_LAST_LOCAL_CHECKIN, &timestamp.to_string())
    }

    pub fn last_local_checkin(&self) -> Result<Option<i64>> {
        Ok(self
            .get(KEY_LAST_LOCAL_CHECKIN)?
            .and_then(|v| v.parse().ok()))
    }

    pub fn set_check_interval_secs(&self, secs: u32) -> Result<()> {
        self.set(KEY_CHECK_INTERVAL_SECS, &secs.to_string())
    }

    pub fn check_interval_secs(&self) -> Result<Option<u32>> {
        Ok(self
            .get(KEY_CHECK_INTERVAL_SECS)?
            .and_then(|v| v.parse().ok()))
    }

    pub fn set_check_window_secs(&self, secs: u32) -> Result<()> {
        self.set(KEY_CHECK_WINDOW_SECS, &secs.to_string())
    }

    pub fn check_window_secs(&self) -> Result<Option<u32>> {
        Ok(self
            .get(KEY_CHECK_WINDOW_SECS)?
            .and_then(|v| v.parse().ok()))
    }

    // ── Push token ──────────────────────────────────────────────────────

    pub fn set_push_token(&self, token: &str, fetched_at: i64) -> Result<()> {
        self.set(KEY_PUSH_TOKEN, token)?;
        self.set(KEY_PUSH_TOKEN_FETCHED_AT, &fetched_at.to_string())
    }

    /// The stored push token and when it was fetched.
    pub fn push_token(&self) -> Result<Option<(String, i64)>> {
        let Some(token) = self.get(KEY_PUSH_TOKEN)? else {
            return Ok(None);
        };
        let fetched_at = self
            .get(KEY_PUSH_TOKEN_FETCHED_AT)?
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Ok(Some((token, fetched_at)))
    }

    // ── Reset ───────────────────────────────────────────────────────────

    /// Wipe everything. Used on unregister/reset.
    pub fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(storage_err)?;
            tx.execute("DELETE FROM settings", []).map_err(storage_err)?;
            tx.execute("DELETE FROM liveness", []).map_err(storage_err)?;
            tx.commit().map_err(storage_err)?;
            debug!("[Store] cleared all local state");
            Ok(())
        })
    }

    fn notification_key(category: AlertCategory) -> String {
        format!("last_notification_id_{}", category.slug())
    }
}

impl LivenessStore for SettingsStore {
    fn load_all_liveness(&self) -> Result<Vec<CheckerLiveness>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT payload FROM liveness")
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(storage_err)?;

            let mut result = Vec::new();
            for payload in rows {
                let payload = payload.map_err(storage_err)?;
                result.push(serde_json::from_str(&payload)?);
            }
            Ok(result)
        })
    }

    fn save_liveness(&self, liveness: &CheckerLiveness) -> Result<()> {
        let payload = serde_json::to_string(liveness)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO liveness (checker_id, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(checker_id) DO UPDATE SET
                     payload = excluded.payload,
                     updated_at = excluded.updated_at",
                params![
                    liveness.checker_id,
                    payload,
                    Utc::now().timestamp_millis()
                ],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn delete_liveness(&self, checker_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM liveness WHERE checker_id = ?1",
                params![checker_id],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn last_notification_id(&self, category: AlertCategory) -> Result<Option<i64>> {
        Ok(self
            .get(&Self::notification_key(category))?
            .and_then(|v| v.parse().ok()))
    }

    fn set_last_notification_id(&self, category: AlertCategory, id: i64) -> Result<()> {
        self.set(&Self::notification_key(category), &id.to_string())
    }

    fn clear_last_notification_id(&self, category: AlertCategory) -> Result<()> {
        self.remove(&Self::notification_key(category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: "alice".to_string(),
            role: Role::Checker,
            watched_checker_id: None,
            api_key: "secret".to_string(),
        }
    }

    #[test]
    fn identity_round_trips() {
        let store = SettingsStore::open_in_memory().expect("open");
        assert!(store.load_identity().expect("load").is_none());

        store.save_identity(&identity()).expect("save");
        let loaded = store.load_identity().expect("load").expect("identity");
        assert_eq!(loaded, identity());
    }

    #[test]
    fn watcher_identity_keeps_watched_checker() {
        let store = SettingsStore::open_in_memory().expect("open");
        let watcher = Identity {
            user_id: "bob".to_string(),
            role: Role::Watcher,
            watched_checker_id: Some("alice".to_string()),
            api_key: "secret".to_string(),
        };
        store.save_identity(&watcher).expect("save");
        let loaded = store.load_identity().expect("load").expect("identity");
        assert_eq!(loaded.watched_checker_id.as_deref(), Some("alice"));

        // Switching back to a checker role drops the stale reference.
        store.save_identity(&identity()).expect("save");
        let loaded = store.load_identity().expect("load").expect("identity");
        assert_eq!(loaded.watched_checker_id, None);
    }

    #[test]
    fn liveness_rows_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vigil.db");

        let mut row = CheckerLiveness::new("alice");
        row.missed = true;
        row.alarm_active = true;
        row.generation = 3;

        {
            let store = SettingsStore::open(&path).expect("open");
            store.save_liveness(&row).expect("save");
        }

        let store = SettingsStore::open(&path).expect("reopen");
        let rows = store.load_all_liveness().expect("load");
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn save_liveness_overwrites_per_checker() {
        let store = SettingsStore::open_in_memory().expect("open");
        let mut row = CheckerLiveness::new("alice");
        store.save_liveness(&row).expect("save");

        row.sleeping = true;
        row.generation = 1;
        store.save_liveness(&row).expect("save again");

        let rows = store.load_all_liveness().expect("load");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].sleeping);

        store.delete_liveness("alice").expect("delete");
        assert!(store.load_all_liveness().expect("load").is_empty());
    }

    #[test]
    fn notification_id_bookkeeping() {
        let store = SettingsStore::open_in_memory().expect("open");
        assert_eq!(
            store
                .last_notification_id(AlertCategory::Alarm)
                .expect("get"),
            None
        );

        store
            .set_last_notification_id(AlertCategory::Alarm, 1001)
            .expect("set");
        assert_eq!(
            store
                .last_notification_id(AlertCategory::Alarm)
                .expect("get"),
            Some(1001)
        );
        // Categories do not share slots.
        assert_eq!(
            store
                .last_notification_id(AlertCategory::Checkin)
                .expect("get"),
            None
        );

        store
            .clear_last_notification_id(AlertCategory::Alarm)
            .expect("clear");
        assert_eq!(
            store
                .last_notification_id(AlertCategory::Alarm)
                .expect("get"),
            None
        );
    }

    #[test]
    fn contract_params_and_push_token_round_trip() {
        let store = SettingsStore::open_in_memory().expect("open");
        store.set_last_local_checkin(1_700_000_000_000).expect("set");
        store.set_check_interval_secs(60).expect("set");
        store.set_check_window_secs(30).expect("set");
        store.set_push_token("tok-1", 42).expect("set");

        assert_eq!(
            store.last_local_checkin().expect("get"),
            Some(1_700_000_000_000)
        );
        assert_eq!(store.check_interval_secs().expect("get"), Some(60));
        assert_eq!(store.check_window_secs().expect("get"), Some(30));
        assert_eq!(
            store.push_token().expect("get"),
            Some(("tok-1".to_string(), 42))
        );
    }

    #[test]
    fn clear_all_wipes_both_tables() {
        let store = SettingsStore::open_in_memory().expect("open");
        store.save_identity(&identity()).expect("save");
        store
            .save_liveness(&CheckerLiveness::new("alice"))
            .expect("save");
        store
            .set_last_notification_id(AlertCategory::Alarm, 1001)
            .expect("set");

        store.clear_all().expect("clear");
        assert!(store.load_identity().expect("load").is_none());
        assert!(store.load_all_liveness().expect("load").is_empty());
        assert_eq!(
            store
                .last_notification_id(AlertCategory::Alarm)
                .expect("get"),
            None
        );
    }
}
