use super::backend::{StorageBackend, Upserted};
use crate::error::{CardError, Result};
use crate::filter::{text_matches, CardFilter};
use crate::model::{Card, NewCard, OwnerId};
use crate::scope::Scope;
use crate::stats::CollectionStats;
use crate::validation::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::ffi::ErrorCode;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cards (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    dedup_key   TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL CHECK (length(name) > 0),
    set_name    TEXT NOT NULL,
    card_number TEXT,
    rarity      TEXT,
    quantity    INTEGER NOT NULL CHECK (typeof(quantity) = 'integer' AND quantity > 0),
    is_favorite INTEGER NOT NULL DEFAULT 0,
    grade       REAL NOT NULL CHECK (grade >= 0 AND grade <= 10),
    price       REAL NOT NULL CHECK (price >= 0),
    card_type   TEXT NOT NULL,
    notes       TEXT,
    image_url   TEXT,
    owner       TEXT,
    date_added  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS card_tags (
    card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
    tag     TEXT NOT NULL,
    PRIMARY KEY (card_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);
CREATE INDEX IF NOT EXISTS idx_cards_owner ON cards(owner);
CREATE INDEX IF NOT EXISTS idx_cards_favorite ON cards(is_favorite);
CREATE INDEX IF NOT EXISTS idx_cards_type ON cards(card_type);
CREATE INDEX IF NOT EXISTS idx_cards_price ON cards(price);
CREATE INDEX IF NOT EXISTS idx_card_tags_tag ON card_tags(tag);
";

const CARD_COLUMNS: &str = "id, name, set_name, card_number, rarity, quantity, is_favorite, \
     grade, price, card_type, notes, image_url, owner, date_added, created_at, updated_at, \
     (SELECT json_group_array(tag) FROM \
        (SELECT tag FROM card_tags WHERE card_id = cards.id ORDER BY tag)) AS tags";

/// Name of the SQL function that applies [`text_matches`] inside queries.
const TEXT_MATCH_FN: &str = "card_text_match";

/// SQLite storage backend.
///
/// One connection guarded by a mutex. Uniqueness is enforced by the database
/// through the `dedup_key` column (the JSON-encoded uniqueness key), so an
/// upsert is a single `INSERT .. ON CONFLICT DO UPDATE` and stays atomic even
/// with several processes sharing the file.
///
/// Rows are returned in `seq` order, which is insertion order.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; \
             PRAGMA foreign_keys=ON; \
             PRAGMA busy_timeout=5000;",
        )?;
        debug!(path = %path.display(), "opened card database");
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        conn.create_scalar_function(
            TEXT_MATCH_FN,
            5,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let needle: String = ctx.get(4)?;
                let mut fields = Vec::with_capacity(4);
                for idx in 0..4 {
                    if let Some(field) = ctx.get::<Option<String>>(idx)? {
                        fields.push(field);
                    }
                }
                Ok(text_matches(&needle, fields.iter().map(String::as_str)))
            },
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CardError::StorageUnavailable("database lock poisoned".to_string()))
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
    let id: String = row.get(0)?;
    let owner: Option<String> = row.get(12)?;
    let tags: String = row.get(16)?;

    Ok(Card {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        name: row.get(1)?,
        set_name: row.get(2)?,
        card_number: row.get(3)?,
        rarity: row.get(4)?,
        quantity: row.get(5)?,
        // Older databases stored favorites as arbitrary integers.
        is_favorite: row.get::<_, i64>(6)? != 0,
        grade: row.get(7)?,
        price: row.get(8)?,
        card_type: row.get(9)?,
        notes: row.get(10)?,
        image_url: row.get(11)?,
        tags: serde_json::from_str::<BTreeSet<String>>(&tags)
            .map_err(|e| conversion_error(16, e))?,
        owner: owner
            .map(OwnerId::new)
            .transpose()
            .map_err(|_| rusqlite::Error::InvalidColumnType(12, "owner".to_string(), Type::Text))?,
        date_added: parse_timestamp(row, 13)?,
        created_at: parse_timestamp(row, 14)?,
        updated_at: parse_timestamp(row, 15)?,
    })
}

/// Accumulates a `WHERE` clause with positional parameters.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    fn visible_in(scope: &Scope) -> Self {
        let mut conds = Self::default();
        if let Scope::Owner(me) = scope {
            conds.push(
                "(owner = ? OR owner IS NULL)",
                Some(Value::Text(me.as_str().to_string())),
            );
        }
        conds
    }

    /// A single row, if visible in `scope`.
    fn row(id: &Uuid, scope: &Scope) -> Self {
        let mut conds = Self::default();
        conds.push("id = ?", Some(Value::Text(id.to_string())));
        let visible = Self::visible_in(scope);
        conds.clauses.extend(visible.clauses);
        conds.params.extend(visible.params);
        conds
    }

    fn push(&mut self, clause: &str, param: Option<Value>) {
        self.clauses.push(clause.to_string());
        self.params.extend(param);
    }

    fn filtered_by(mut self, filter: &CardFilter) -> Self {
        if filter.favorites_only {
            self.push("is_favorite != 0", None);
        }
        if let Some(tag) = filter.tag_value() {
            self.push(
                "EXISTS (SELECT 1 FROM card_tags t WHERE t.card_id = cards.id AND t.tag = ?)",
                Some(Value::Text(tag.to_string())),
            );
        }
        if let Some(card_type) = filter.card_type_value() {
            self.push("card_type = ?", Some(Value::Text(card_type.to_string())));
        }
        if let Some(needle) = filter.needle() {
            let clause = format!(
                "{}(name, set_name, card_number, rarity, ?)",
                TEXT_MATCH_FN
            );
            self.push(&clause, Some(Value::Text(needle)));
        }
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn load_visible(conn: &Connection, id: &Uuid, scope: &Scope) -> Result<Option<Card>> {
    let conds = Conditions::row(id, scope);
    let sql = format!("SELECT {} FROM cards{}", CARD_COLUMNS, conds.where_sql());
    Ok(conn
        .query_row(&sql, params_from_iter(conds.params), row_to_card)
        .optional()?)
}

fn write_tags(conn: &Connection, id: &str, tags: &BTreeSet<String>) -> Result<()> {
    conn.execute("DELETE FROM card_tags WHERE card_id = ?1", params![id])?;
    let mut stmt = conn.prepare_cached("INSERT INTO card_tags (card_id, tag) VALUES (?1, ?2)")?;
    for tag in tags {
        stmt.execute(params![id, tag])?;
    }
    Ok(())
}

/// Turn raw database failures into the error kinds callers act on.
fn classify(err: CardError) -> CardError {
    let CardError::Database(db) = err else {
        return err;
    };
    match db.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            let message = db.to_string();
            if message.contains("dedup_key") {
                CardError::Validation(
                    "another card already has this name, set, number and owner".to_string(),
                )
            } else if message.contains("quantity") {
                ValidationError::QuantityOverflow.into()
            } else {
                CardError::Validation(message)
            }
        }
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            CardError::StorageUnavailable(db.to_string())
        }
        _ => CardError::Database(db),
    }
}

impl SqliteBackend {
    fn upsert_inner(&self, card: NewCard, now: DateTime<Utc>) -> Result<Upserted> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let fresh_id = Uuid::new_v4().to_string();
        let dedup_key = card.key().encode()?;
        let now = timestamp(&now);

        let row_id: String = tx.query_row(
            "INSERT INTO cards (id, dedup_key, name, set_name, card_number, rarity, quantity, \
                 is_favorite, grade, price, card_type, notes, image_url, owner, \
                 date_added, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15, ?15)
             ON CONFLICT(dedup_key) DO UPDATE SET
                 quantity = quantity + excluded.quantity,
                 updated_at = MAX(updated_at, excluded.updated_at)
             RETURNING id",
            params![
                fresh_id,
                dedup_key,
                card.name,
                card.set_name,
                card.card_number,
                card.rarity,
                card.quantity,
                card.is_favorite,
                card.grade,
                card.price,
                card.card_type,
                card.notes,
                card.image_url,
                card.owner.as_ref().map(OwnerId::as_str),
                now,
            ],
            |row| row.get(0),
        )?;

        let inserted = row_id == fresh_id;
        if inserted {
            write_tags(&tx, &row_id, &card.tags)?;
        }

        let id = Uuid::parse_str(&row_id).map_err(|e| conversion_error(0, e))?;
        let stored = load_visible(&tx, &id, &Scope::Admin)?.ok_or(CardError::NotFound(id))?;
        tx.commit()?;

        Ok(if inserted {
            Upserted::Inserted(stored)
        } else {
            Upserted::Merged(stored)
        })
    }

    fn modify_inner(
        &self,
        id: &Uuid,
        scope: &Scope,
        edit: &mut dyn FnMut(&mut Card) -> Result<()>,
    ) -> Result<Option<Card>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut card) = load_visible(&tx, id, scope)? else {
            return Ok(None);
        };
        edit(&mut card)?;
        if card.quantity <= 0 {
            return Err(ValidationError::QuantityOutOfRange(card.quantity).into());
        }

        let row_id = card.id.to_string();
        tx.execute(
            "UPDATE cards SET dedup_key = ?1, name = ?2, set_name = ?3, card_number = ?4, \
                 rarity = ?5, quantity = ?6, is_favorite = ?7, grade = ?8, price = ?9, \
                 card_type = ?10, notes = ?11, image_url = ?12, updated_at = ?13
             WHERE id = ?14",
            params![
                card.key().encode()?,
                card.name,
                card.set_name,
                card.card_number,
                card.rarity,
                card.quantity,
                card.is_favorite,
                card.grade,
                card.price,
                card.card_type,
                card.notes,
                card.image_url,
                timestamp(&card.updated_at),
                row_id,
            ],
        )?;
        write_tags(&tx, &row_id, &card.tags)?;
        tx.commit()?;

        Ok(Some(card))
    }

    fn stats_inner(&self, scope: &Scope) -> Result<CollectionStats> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let conds = Conditions::visible_in(scope);
        let where_sql = conds.where_sql();

        let (total_cards, favorite_count, unique_sets) = tx.query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(is_favorite != 0), 0), COUNT(DISTINCT set_name) \
                 FROM cards{}",
                where_sql
            ),
            params_from_iter(conds.params.iter()),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;

        // SUM() errors on overflow; fold here so the total saturates instead.
        let mut total_quantity: i64 = 0;
        {
            let mut stmt = tx.prepare(&format!("SELECT quantity FROM cards{}", where_sql))?;
            let mut rows = stmt.query(params_from_iter(conds.params.iter()))?;
            while let Some(row) = rows.next()? {
                total_quantity = total_quantity.saturating_add(row.get::<_, i64>(0)?);
            }
        }

        let most_common_set: Option<String> = tx
            .query_row(
                &format!(
                    "SELECT set_name FROM cards{} \
                     GROUP BY set_name ORDER BY COUNT(*) DESC, set_name ASC LIMIT 1",
                    where_sql
                ),
                params_from_iter(conds.params.iter()),
                |row| row.get(0),
            )
            .optional()?;
        tx.commit()?;

        Ok(CollectionStats {
            total_cards: total_cards as u64,
            total_quantity,
            favorite_count: favorite_count as u64,
            unique_sets: unique_sets as u64,
            most_common_set,
        })
    }
}

impl StorageBackend for SqliteBackend {
    fn upsert(&self, card: NewCard, now: DateTime<Utc>) -> Result<Upserted> {
        self.upsert_inner(card, now).map_err(classify)
    }

    fn fetch(&self, id: &Uuid, scope: &Scope) -> Result<Option<Card>> {
        let conn = self.lock()?;
        load_visible(&conn, id, scope).map_err(classify)
    }

    fn modify(
        &self,
        id: &Uuid,
        scope: &Scope,
        edit: &mut dyn FnMut(&mut Card) -> Result<()>,
    ) -> Result<Option<Card>> {
        self.modify_inner(id, scope, edit).map_err(classify)
    }

    fn remove(&self, id: &Uuid, scope: &Scope) -> Result<bool> {
        let conn = self.lock()?;
        let conds = Conditions::row(id, scope);
        let sql = format!("DELETE FROM cards{}", conds.where_sql());
        let removed = conn
            .execute(&sql, params_from_iter(conds.params))
            .map_err(|e| classify(e.into()))?;
        Ok(removed > 0)
    }

    fn query(&self, scope: &Scope, filter: &CardFilter) -> Result<Vec<Card>> {
        let conn = self.lock()?;
        let conds = Conditions::visible_in(scope).filtered_by(filter);
        let sql = format!(
            "SELECT {} FROM cards{} ORDER BY seq",
            CARD_COLUMNS,
            conds.where_sql()
        );

        let mut cards = {
            let mut stmt = conn.prepare(&sql).map_err(|e| classify(e.into()))?;
            let rows = stmt
                .query_map(params_from_iter(conds.params), row_to_card)
                .map_err(|e| classify(e.into()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| classify(e.into()))?
        };
        drop(conn);

        filter.sort.apply(&mut cards);
        Ok(cards)
    }

    fn stats(&self, scope: &Scope) -> Result<CollectionStats> {
        self.stats_inner(scope).map_err(classify)
    }

    fn remove_all(&self) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM cards", [])
            .map_err(|e| classify(e.into()))
    }

    fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| CardError::StorageUnavailable("database lock poisoned".to_string()))?;
        conn.close().map_err(|(_, e)| classify(e.into()))
    }
}
