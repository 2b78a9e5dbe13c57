//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Get current version
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Run migrations
    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- ELDERS
        -- Monitored individuals. Owned by an external
        -- member service; mirrored here for integrity.
        -- ============================================
        CREATE TABLE elders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- CALL SETTINGS
        -- Up to three scheduled daily call slots per
        -- elder; slot times map completed calls to
        -- dose-time categories.
        -- ============================================
        CREATE TABLE call_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            elder_id INTEGER NOT NULL UNIQUE REFERENCES elders(id) ON DELETE CASCADE,
            first_call_time TEXT NOT NULL,       -- "HH:MM"
            second_call_time TEXT,
            third_call_time TEXT,
            recurrence INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- CALL RECORDS
        -- One row per attempted call. Permanent audit
        -- record; extracted fields attached once by
        -- the analysis persister.
        -- ============================================
        CREATE TABLE call_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            elder_id INTEGER NOT NULL REFERENCES elders(id) ON DELETE CASCADE,
            setting_id INTEGER REFERENCES call_settings(id) ON DELETE SET NULL,
            called_at TEXT NOT NULL,             -- "YYYY-MM-DD HH:MM:SS"
            responded INTEGER NOT NULL DEFAULT 0,
            call_status TEXT NOT NULL,           -- completed / no-answer / busy / failed
            transcript TEXT,

            -- Attached by the analysis persister
            sleep_start TEXT,
            sleep_end TEXT,
            health_status INTEGER,               -- NULL = no signal, 0 = bad, 1 = good
            psych_status INTEGER,                -- NULL = no signal, 0 = bad, 1 = good
            health_details TEXT,
            psych_details TEXT,
            ai_health_comment TEXT,
            extracted_json TEXT,

            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_call_records_elder_called ON call_records(elder_id, called_at);

        -- ============================================
        -- MEAL RECORDS
        -- One row per meal mention in a call. eaten is
        -- tri-state: NULL = unreported, never false.
        -- ============================================
        CREATE TABLE meal_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            call_record_id INTEGER NOT NULL REFERENCES call_records(id) ON DELETE CASCADE,
            meal_type TEXT NOT NULL,             -- breakfast / lunch / dinner
            eaten INTEGER,                       -- NULL = unreported, 0 = not eaten, 1 = eaten
            response_summary TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE INDEX idx_meal_records_call ON meal_records(call_record_id);

        -- ============================================
        -- MEDICATION SCHEDULES
        -- Planned doses per elder. schedule_times is a
        -- comma list of dose-time categories; an entry
        -- may cover more than one.
        -- ============================================
        CREATE TABLE medication_schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            elder_id INTEGER NOT NULL REFERENCES elders(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            schedule_times TEXT NOT NULL,        -- e.g. "morning,dinner"
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_medication_schedules_elder ON medication_schedules(elder_id);

        -- ============================================
        -- MEDICATION TAKEN RECORDS
        -- Dose-taken mentions extracted from calls.
        -- schedule_id is NULL when no schedule entry
        -- covers the mentioned take time.
        -- ============================================
        CREATE TABLE medication_taken_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            call_record_id INTEGER NOT NULL REFERENCES call_records(id) ON DELETE CASCADE,
            schedule_id INTEGER REFERENCES medication_schedules(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            taken INTEGER,                       -- NULL = unknown, 0 = not taken, 1 = taken
            dose_time TEXT,                      -- morning / lunch / dinner
            response_summary TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE INDEX idx_medication_taken_call ON medication_taken_records(call_record_id);

        -- ============================================
        -- BLOOD SUGAR RECORDS
        -- ============================================
        CREATE TABLE blood_sugar_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            call_record_id INTEGER NOT NULL REFERENCES call_records(id) ON DELETE CASCADE,
            value REAL NOT NULL,                 -- mg/dL
            measurement_type TEXT,               -- before_meal / after_meal
            status TEXT,                         -- low / normal / high
            response_summary TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE INDEX idx_blood_sugar_call ON blood_sugar_records(call_record_id);

        -- ============================================
        -- DAILY STATISTICS
        -- Derived rollup, one row per (elder, date).
        -- Recomputed in full on every upsert.
        -- ============================================
        CREATE TABLE daily_statistics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            elder_id INTEGER NOT NULL REFERENCES elders(id) ON DELETE CASCADE,
            date TEXT NOT NULL,                  -- "YYYY-MM-DD"
            breakfast_eaten INTEGER,             -- NULL = no signal that day
            lunch_eaten INTEGER,
            dinner_eaten INTEGER,
            medication_total_goal INTEGER NOT NULL DEFAULT 0,
            medication_total_taken INTEGER NOT NULL DEFAULT 0,
            medication_list TEXT NOT NULL DEFAULT '[]',  -- JSON per-medication breakdown
            avg_sleep_minutes INTEGER,
            health_status TEXT,                  -- good / bad
            psych_status TEXT,                   -- good / bad
            avg_blood_sugar INTEGER,
            ai_summary TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(elder_id, date)
        );

        -- ============================================
        -- WEEKLY STATISTICS
        -- Derived rollup, one row per (elder, Monday).
        -- missed_calls is the only field also bumped
        -- by the fast path between recomputes.
        -- ============================================
        CREATE TABLE weekly_statistics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            elder_id INTEGER NOT NULL REFERENCES elders(id) ON DELETE CASCADE,
            start_date TEXT NOT NULL,            -- Monday, "YYYY-MM-DD"
            end_date TEXT NOT NULL,
            breakfast_count INTEGER NOT NULL DEFAULT 0,
            lunch_count INTEGER NOT NULL DEFAULT 0,
            dinner_count INTEGER NOT NULL DEFAULT 0,
            meal_goal_count INTEGER NOT NULL DEFAULT 0,
            meal_rate INTEGER NOT NULL DEFAULT 0,
            medication_taken_count INTEGER NOT NULL DEFAULT 0,
            medication_goal_count INTEGER NOT NULL DEFAULT 0,
            medication_scheduled_count INTEGER NOT NULL DEFAULT 0,
            medication_rate INTEGER NOT NULL DEFAULT 0,
            medication_stats TEXT NOT NULL DEFAULT '{}', -- JSON name -> {taken, goal, scheduled}
            avg_sleep_hours INTEGER,
            avg_sleep_minutes INTEGER,
            psych_good_count INTEGER NOT NULL DEFAULT 0,
            psych_normal_count INTEGER NOT NULL DEFAULT 0,
            psych_bad_count INTEGER NOT NULL DEFAULT 0,
            health_signals INTEGER NOT NULL DEFAULT 0,
            missed_calls INTEGER NOT NULL DEFAULT 0,
            blood_sugar_stats TEXT NOT NULL DEFAULT '{}', -- JSON before/after buckets
            ai_summary TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(elder_id, start_date)
        );
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_once() {
        let conn = Connection::open_in_memory().expect("open");
        run_migrations(&conn).expect("first run");
        run_migrations(&conn).expect("second run is a no-op");
        assert_eq!(get_schema_version(&conn).expect("version"), SCHEMA_VERSION);
    }
}
