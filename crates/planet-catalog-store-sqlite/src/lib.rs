use std::path::Path;

use anyhow::{anyhow, Context, Result};
use planet_catalog_core::{
    Condition, Constraint, MatchPolicy, NewPlanet, Planet, PlanetId, PlanetStore, Predicate,
    StoreError,
};
use rusqlite::functions::FunctionFlags;
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CONTAINS_IGNORE_CASE_FN: &str = "planet_contains_ignore_case";

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

// AUTOINCREMENT keeps removed ids from ever being handed out again.
const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS planets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE CHECK (length(name) > 0),
  climate TEXT NOT NULL CHECK (length(climate) > 0),
  terrain TEXT NOT NULL CHECK (length(terrain) > 0)
);
";

const SELECT_PLANET_COLUMNS: &str = "SELECT id, name, climate, terrain FROM planets";

/// Planets loaded by `db seed` and used as shared test fixtures.
pub const SEED_PLANETS: [(&str, &str, &str); 3] = [
    ("Tatooine", "arid", "desert"),
    ("Alderaan", "temperate", "grasslands, mountains"),
    ("Yavin IV", "temperate, tropical", "jungle, rainforests"),
];

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: Vec<Planet>,
    pub skipped_existing: usize,
}

impl SqliteStore {
    /// Open a SQLite-backed planet store, configure pragmas and register the
    /// matching functions used by compiled predicates.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or configured.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to configure sqlite pragmas")?;

        conn.create_scalar_function(
            CONTAINS_IGNORE_CASE_FN,
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value = ctx.get::<String>(0)?;
                let needle = ctx.get::<String>(1)?;
                Ok(MatchPolicy::ContainsIgnoreCase.accepts(&value, &needle))
            },
        )
        .with_context(|| format!("failed to register sqlite function {CONTAINS_IGNORE_CASE_FN}"))?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus { current_version, target_version: LATEST_SCHEMA_VERSION, pending_versions })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when any migration step fails or the database is newer
    /// than this build understands.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version < 1 {
            self.apply_migration_1()?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    fn apply_migration_1(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .context("failed to start migration v1 transaction")?;
        tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
        record_schema_version(&tx, 1)?;
        tx.commit().context("failed to commit migration v1")?;
        tracing::info!("Applied planet catalog schema migration v1");
        Ok(())
    }

    /// Insert the [`SEED_PLANETS`], skipping names that already exist.
    ///
    /// # Errors
    /// Returns an error when an insert fails for any reason other than an
    /// existing name.
    pub fn seed_fixtures(&self) -> Result<SeedSummary> {
        let mut summary = SeedSummary { inserted: Vec::new(), skipped_existing: 0 };

        for (name, climate, terrain) in SEED_PLANETS {
            match self.persist(&NewPlanet::new(name, climate, terrain)) {
                Ok(planet) => summary.inserted.push(planet),
                Err(StoreError::ConstraintViolation { constraint: Constraint::UniqueName, .. }) => {
                    summary.skipped_existing += 1;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context(format!("failed to seed {name}")));
                }
            }
        }

        Ok(summary)
    }

    /// Number of persisted planets.
    ///
    /// # Errors
    /// Returns an error when the count query fails.
    pub fn count_planets(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM planets", [], |row| row.get::<_, i64>(0))
            .context("failed to count planets")?;
        usize::try_from(count).context("planet count out of range")
    }
}

impl PlanetStore for SqliteStore {
    fn persist(&self, candidate: &NewPlanet) -> Result<Planet, StoreError> {
        let id = self
            .conn
            .query_row(
                "INSERT INTO planets(name, climate, terrain) VALUES (?1, ?2, ?3) RETURNING id",
                params![candidate.name, candidate.climate, candidate.terrain],
                |row| row.get::<_, i64>(0),
            )
            .map_err(classify_insert_error)?;

        Ok(Planet {
            id: PlanetId(id),
            name: candidate.name.clone(),
            climate: candidate.climate.clone(),
            terrain: candidate.terrain.clone(),
        })
    }

    fn find_by_id(&self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        let planet = self
            .conn
            .query_row(
                &format!("{SELECT_PLANET_COLUMNS} WHERE id = ?1"),
                params![id.0],
                planet_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load planet {id}"))?;
        Ok(planet)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Planet>, StoreError> {
        // `=` uses BINARY collation, so this stays case-sensitive.
        let planet = self
            .conn
            .query_row(
                &format!("{SELECT_PLANET_COLUMNS} WHERE name = ?1"),
                params![name],
                planet_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load planet named {name}"))?;
        Ok(planet)
    }

    fn find_all(&self, predicate: &Predicate) -> Result<Vec<Planet>, StoreError> {
        let (where_sql, needles) = where_clause(predicate);
        let sql = format!("{SELECT_PLANET_COLUMNS}{where_sql} ORDER BY id ASC");

        let mut stmt = self.conn.prepare(&sql).context("failed to prepare planet query")?;
        let rows = stmt
            .query_map(params_from_iter(needles), planet_from_row)
            .context("failed to query planets")?;

        let mut planets = Vec::new();
        for row in rows {
            planets.push(row.context("failed to decode planet row")?);
        }
        Ok(planets)
    }

    fn delete_by_id(&self, id: PlanetId) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM planets WHERE id = ?1", params![id.0])
            .with_context(|| format!("failed to delete planet {id}"))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// Render `predicate` as a `WHERE` clause plus its positional parameters.
///
/// Column names come from the fixed field enumeration; needles are always bound.
fn where_clause(predicate: &Predicate) -> (String, Vec<&str>) {
    let mut sql = String::new();
    let mut needles = Vec::with_capacity(predicate.conditions().len());

    for (index, condition) in predicate.conditions().iter().enumerate() {
        sql.push_str(if index == 0 { " WHERE " } else { " AND " });
        sql.push_str(&condition_sql(condition, index + 1));
        needles.push(condition.needle.as_str());
    }

    (sql, needles)
}

fn condition_sql(condition: &Condition, position: usize) -> String {
    let column = condition.field.as_str();
    match condition.policy {
        MatchPolicy::ContainsIgnoreCase => {
            format!("{CONTAINS_IGNORE_CASE_FN}({column}, ?{position})")
        }
    }
}

fn planet_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Planet> {
    Ok(Planet {
        id: PlanetId(row.get(0)?),
        name: row.get(1)?,
        climate: row.get(2)?,
        terrain: row.get(3)?,
    })
}

fn classify_insert_error(err: rusqlite::Error) -> StoreError {
    let constraint = match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE => Some(Constraint::UniqueName),
                ffi::SQLITE_CONSTRAINT_NOTNULL | ffi::SQLITE_CONSTRAINT_CHECK => {
                    Some(Constraint::RequiredField)
                }
                _ => None,
            }
        }
        _ => None,
    };

    match constraint {
        Some(constraint) => StoreError::ConstraintViolation { constraint, detail: err.to_string() },
        None => StoreError::Backend(anyhow::Error::new(err).context("failed to insert planet")),
    }
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread;

    use planet_catalog_core::{compile, CatalogError, CatalogService, PlanetProbe};
    use ulid::Ulid;

    use super::*;

    fn memory_store() -> Result<SqliteStore> {
        let mut store = SqliteStore::open(Path::new(":memory:"))?;
        store.migrate()?;
        Ok(store)
    }

    fn seeded_store() -> Result<(SqliteStore, Vec<Planet>)> {
        let store = memory_store()?;
        let summary = store.seed_fixtures()?;
        Ok((store, summary.inserted))
    }

    fn names(planets: &[Planet]) -> Vec<&str> {
        planets.iter().map(|planet| planet.name.as_str()).collect()
    }

    // Test IDs: TDB-001
    #[test]
    fn migrate_brings_fresh_database_to_latest_schema() -> Result<()> {
        let mut store = SqliteStore::open(Path::new(":memory:"))?;

        let before = store.schema_status()?;
        assert_eq!(before.current_version, 0);
        assert_eq!(before.pending_versions, vec![1]);

        store.migrate()?;
        store.migrate()?;

        let after = store.schema_status()?;
        assert_eq!(after.current_version, LATEST_SCHEMA_VERSION);
        assert!(after.pending_versions.is_empty());
        assert_eq!(store.count_planets()?, 0);
        Ok(())
    }

    // Test IDs: TDB-002
    #[test]
    fn persist_assigns_distinct_ids_and_round_trips_fields() -> Result<()> {
        let (store, planets) = seeded_store()?;

        assert_eq!(planets.len(), 3);
        assert!(planets.windows(2).all(|pair| pair[0].id < pair[1].id));

        for planet in &planets {
            assert_eq!(store.find_by_id(planet.id)?.as_ref(), Some(planet));
        }
        Ok(())
    }

    // Test IDs: TDB-003
    #[test]
    fn duplicate_name_is_rejected_as_unique_violation() -> Result<()> {
        let (store, _) = seeded_store()?;

        let err = store.persist(&NewPlanet::new("Tatooine", "wet", "swamp"));

        match err {
            Err(StoreError::ConstraintViolation { constraint, detail }) => {
                assert_eq!(constraint, Constraint::UniqueName);
                assert!(detail.contains("UNIQUE"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
        assert_eq!(store.count_planets()?, 3);
        Ok(())
    }

    // Test IDs: TDB-004
    #[test]
    fn empty_fields_are_rejected_by_check_constraints() -> Result<()> {
        let store = memory_store()?;

        for candidate in [
            NewPlanet::new("", "", ""),
            NewPlanet::new("Hoth", "", "tundra"),
            NewPlanet::new("Hoth", "frozen", ""),
        ] {
            match store.persist(&candidate) {
                Err(StoreError::ConstraintViolation {
                    constraint: Constraint::RequiredField, ..
                }) => {}
                other => panic!("expected required-field violation, got {other:?}"),
            }
        }
        assert_eq!(store.count_planets()?, 0);
        Ok(())
    }

    // Test IDs: TDB-013
    #[test]
    fn whitespace_only_fields_pass_check_constraints() -> Result<()> {
        let store = memory_store()?;

        let spaced = store.persist(&NewPlanet::new(" ", "arid", "desert"))?;
        let tabbed = store.persist(&NewPlanet::new("Hoth", "\t", "\n"))?;

        assert_eq!(store.find_by_name(" ")?, Some(spaced));
        assert_eq!(store.find_by_id(tabbed.id)?, Some(tabbed));
        Ok(())
    }

    // Test IDs: TDB-005
    #[test]
    fn find_by_name_is_exact_and_case_sensitive() -> Result<()> {
        let (store, planets) = seeded_store()?;

        assert_eq!(store.find_by_name("Yavin IV")?.as_ref(), Some(&planets[2]));
        assert_eq!(store.find_by_name("yavin iv")?, None);
        assert_eq!(store.find_by_name("Yavin")?, None);
        Ok(())
    }

    // Test IDs: TDB-006
    #[test]
    fn find_all_evaluates_compiled_probes() -> Result<()> {
        let (store, _) = seeded_store()?;

        let everything = store.find_all(&compile(&PlanetProbe::unconstrained()))?;
        assert_eq!(names(&everything), vec!["Tatooine", "Alderaan", "Yavin IV"]);

        let tatooine = store.find_all(&compile(
            &PlanetProbe::unconstrained().with_climate("arid").with_terrain("desert"),
        ))?;
        assert_eq!(names(&tatooine), vec!["Tatooine"]);

        let temperate =
            store.find_all(&compile(&PlanetProbe::unconstrained().with_climate("TEMPERATE")))?;
        assert_eq!(names(&temperate), vec!["Alderaan", "Yavin IV"]);

        let by_name = store.find_all(&compile(&PlanetProbe::unconstrained().with_name("aan")))?;
        assert_eq!(names(&by_name), vec!["Alderaan"]);

        let empty_needle =
            store.find_all(&compile(&PlanetProbe::unconstrained().with_terrain("")))?;
        assert_eq!(empty_needle.len(), 3);

        let none = store.find_all(&compile(
            &PlanetProbe::unconstrained().with_climate("nonexistent-value"),
        ))?;
        assert!(none.is_empty());
        Ok(())
    }

    // Test IDs: TDB-007
    #[test]
    fn find_all_agrees_with_in_memory_matching_beyond_ascii() -> Result<()> {
        let store = memory_store()?;
        let planet = store.persist(&NewPlanet::new("Mustafar", "ÉTÉ BRÛLANT", "volcanic"))?;

        let predicate = compile(&PlanetProbe::unconstrained().with_climate("été"));
        assert!(predicate.matches(&planet));
        assert_eq!(store.find_all(&predicate)?, vec![planet]);
        Ok(())
    }

    // Test IDs: TDB-008
    #[test]
    fn needles_are_bound_not_interpolated() -> Result<()> {
        let (store, _) = seeded_store()?;

        let hostile = compile(&PlanetProbe::unconstrained().with_climate("') OR 1=1 --"));
        assert!(store.find_all(&hostile)?.is_empty());
        assert_eq!(store.count_planets()?, 3);

        let wildcard = compile(&PlanetProbe::unconstrained().with_terrain("%"));
        assert!(store.find_all(&wildcard)?.is_empty());
        Ok(())
    }

    #[test]
    fn where_clause_lists_one_term_per_condition() {
        let unconstrained = Predicate::unconstrained();
        let (sql, needles) = where_clause(&unconstrained);
        assert!(sql.is_empty());
        assert!(needles.is_empty());

        let predicate = compile(&PlanetProbe::unconstrained().with_climate("arid").with_terrain(""));
        let (sql, needles) = where_clause(&predicate);
        assert_eq!(
            sql,
            " WHERE planet_contains_ignore_case(climate, ?1) \
             AND planet_contains_ignore_case(terrain, ?2)"
        );
        assert_eq!(needles, vec!["arid", ""]);
    }

    // Test IDs: TDB-009
    #[test]
    fn delete_removes_row_and_missing_id_is_not_found() -> Result<()> {
        let (store, planets) = seeded_store()?;

        store.delete_by_id(planets[0].id)?;
        assert_eq!(store.find_by_id(planets[0].id)?, None);
        assert_eq!(store.count_planets()?, 2);

        match store.delete_by_id(planets[0].id) {
            Err(StoreError::NotFound(id)) => assert_eq!(id, planets[0].id),
            other => panic!("expected not found, got {other:?}"),
        }
        assert_eq!(store.count_planets()?, 2);
        Ok(())
    }

    // Test IDs: TDB-010
    #[test]
    fn removed_ids_are_never_reassigned() -> Result<()> {
        let store = memory_store()?;
        let first = store.persist(&NewPlanet::new("Hoth", "frozen", "tundra"))?;
        store.delete_by_id(first.id)?;

        let second = store.persist(&NewPlanet::new("Hoth", "frozen", "tundra"))?;
        assert!(second.id > first.id);
        assert_eq!(store.find_by_id(first.id)?, None);
        Ok(())
    }

    // Test IDs: TDB-011
    #[test]
    fn seeding_twice_skips_existing_names() -> Result<()> {
        let store = memory_store()?;
        let first = store.seed_fixtures()?;
        let second = store.seed_fixtures()?;

        assert_eq!(first.inserted.len(), 3);
        assert_eq!(second.inserted.len(), 0);
        assert_eq!(second.skipped_existing, 3);
        assert_eq!(store.count_planets()?, 3);
        Ok(())
    }

    // Test IDs: TDB-012
    #[test]
    fn catalog_service_over_sqlite_honours_lifecycle() -> Result<()> {
        let store = memory_store()?;
        let service = CatalogService::new(&store);

        let created = service.create(NewPlanet::new("Orgbit15", "Wet", "Forest"))?;
        assert_eq!(service.get(created.id)?, created);
        assert_eq!(service.get_by_name("Orgbit15")?, created);
        assert!(matches!(
            service.create(NewPlanet::new("Orgbit15", "Dry", "Rock")),
            Err(CatalogError::Conflict(_))
        ));
        assert!(matches!(
            service.create(NewPlanet::new("", "", "")),
            Err(CatalogError::Validation(_))
        ));
        assert_eq!(service.list(Some("wet"), Some("for"))?, vec![created.clone()]);

        service.remove(created.id)?;
        assert!(matches!(service.get(created.id), Err(CatalogError::NotFound(_))));
        assert!(matches!(service.remove(created.id), Err(CatalogError::NotFound(_))));
        assert!(service.list(None, None)?.is_empty());
        Ok(())
    }

    // Test IDs: TCONC-001
    #[test]
    fn concurrent_same_name_creates_yield_exactly_one_success() -> Result<()> {
        let db_path =
            std::env::temp_dir().join(format!("planet-catalog-race-{}.sqlite3", Ulid::new()));
        {
            let mut init = SqliteStore::open(&db_path)?;
            init.migrate()?;
        }

        let contenders = 8;
        let mut handles = Vec::new();
        for _ in 0..contenders {
            let path = db_path.clone();
            handles.push(thread::spawn(move || -> Result<Result<Planet, CatalogError>> {
                let service = CatalogService::new(SqliteStore::open(&path)?);
                Ok(service.create(NewPlanet::new("Kamino", "temperate", "ocean")))
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            let Ok(thread_result) = handle.join() else {
                return Err(anyhow!("contender thread panicked"));
            };
            match thread_result? {
                Ok(_) => created += 1,
                Err(CatalogError::Conflict(_)) => conflicts += 1,
                Err(other) => return Err(anyhow!("unexpected outcome: {other}")),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, contenders - 1);
        assert_eq!(SqliteStore::open(&db_path)?.count_planets()?, 1);

        for suffix in ["", "-wal", "-shm"] {
            let path = std::path::PathBuf::from(format!("{}{}", db_path.display(), suffix));
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to cleanup sqlite file {}", path.display()))?;
            }
        }
        Ok(())
    }
}
