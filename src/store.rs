use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};

use crate::error::{Error, Result};
use crate::fingerprinter::Configuration;
use crate::hashing::Fingerprint;
use crate::index::{FingerprintIndex, Posting, SongId};

/// Maximum number of hashes bound into a single `IN (...)` lookup.
const LOOKUP_CHUNK_SIZE: usize = 500;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Parameters (
        sr INTEGER NOT NULL,
        win_size INTEGER NOT NULL,
        anchor_dist INTEGER NOT NULL,
        fan_out INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS Songs (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS Fingerprints (
        id INTEGER NOT NULL REFERENCES Songs (id),
        anchor_t INTEGER NOT NULL,
        fp INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS fp_idx ON Fingerprints (fp);
";

/// Fingerprint corpus persisted in a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) a corpus database and makes sure its tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_schema(Connection::open(path)?)
    }

    /// Opens an already existing corpus database without modifying it.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn song_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM Songs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn fingerprint_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM Fingerprints", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Inserts a song under the next free id. Must run inside a transaction.
fn insert_song(conn: &Connection, name: &str) -> Result<SongId> {
    let existing: Option<SongId> = conn
        .query_row("SELECT id FROM Songs WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    if existing.is_some() {
        return Err(Error::DuplicateSong(name.to_owned()));
    }
    let song_id: SongId = conn.query_row("SELECT COALESCE(MAX(id) + 1, 0) FROM Songs", [], |row| row.get(0))?;
    conn.execute("INSERT INTO Songs (id, name) VALUES (?1, ?2)", params![song_id, name])?;
    Ok(song_id)
}

fn insert_fingerprints(conn: &Connection, song_id: SongId, fingerprints: &[Fingerprint]) -> Result<()> {
    let mut stmt = conn.prepare_cached("INSERT INTO Fingerprints (id, anchor_t, fp) VALUES (?1, ?2, ?3)")?;
    for fingerprint in fingerprints {
        stmt.execute(params![song_id, fingerprint.anchor_time, fingerprint.hash])?;
    }
    Ok(())
}

impl FingerprintIndex for SqliteStore {
    fn parameters(&self) -> Result<Option<Configuration>> {
        let row = self
            .conn
            .query_row(
                "SELECT sr, win_size, anchor_dist, fan_out FROM Parameters LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(sample_rate, window_size, anchor_distance, fan_out)| {
            Configuration::default()
                .with_sample_rate(sample_rate)
                .with_window_size(window_size as usize)
                .with_anchor_distance(anchor_distance as usize)
                .with_fan_out(fan_out as usize)
        }))
    }

    fn insert_parameters(&mut self, config: &Configuration) -> Result<()> {
        self.conn.execute(
            "INSERT INTO Parameters (sr, win_size, anchor_dist, fan_out) VALUES (?1, ?2, ?3, ?4)",
            params![
                config.sample_rate(),
                config.window_size() as u32,
                config.anchor_distance() as u32,
                config.fan_out() as u32,
            ],
        )?;
        Ok(())
    }

    fn add_song(&mut self, name: &str) -> Result<SongId> {
        let tx = self.conn.transaction()?;
        let song_id = insert_song(&tx, name)?;
        tx.commit()?;
        Ok(song_id)
    }

    fn put(&mut self, song_id: SongId, fingerprints: &[Fingerprint]) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_fingerprints(&tx, song_id, fingerprints)?;
        tx.commit()?;
        Ok(())
    }

    fn add_song_with_fingerprints(&mut self, name: &str, fingerprints: &[Fingerprint]) -> Result<SongId> {
        let tx = self.conn.transaction()?;
        let song_id = insert_song(&tx, name)?;
        insert_fingerprints(&tx, song_id, fingerprints)?;
        tx.commit()?;
        Ok(song_id)
    }

    fn lookup(&self, hash: u32) -> Result<Vec<Posting>> {
        let mut stmt = self.conn.prepare_cached("SELECT id, anchor_t FROM Fingerprints WHERE fp = ?1")?;
        let postings = stmt
            .query_map(params![hash], |row| {
                Ok(Posting {
                    song_id: row.get(0)?,
                    anchor_time: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(postings)
    }

    fn lookup_many(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<Posting>>> {
        let mut unique = hashes.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut postings: HashMap<u32, Vec<Posting>> = HashMap::new();
        for chunk in unique.chunks(LOOKUP_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT fp, id, anchor_t FROM Fingerprints WHERE fp IN ({placeholders})");
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let hash: u32 = row.get(0)?;
                postings.entry(hash).or_default().push(Posting {
                    song_id: row.get(1)?,
                    anchor_time: row.get(2)?,
                });
            }
        }
        Ok(postings)
    }

    fn get_name(&self, song_id: SongId) -> Result<String> {
        self.conn
            .query_row("SELECT name FROM Songs WHERE id = ?1", params![song_id], |row| row.get(0))
            .optional()?
            .ok_or(Error::UnknownSong(song_id))
    }

    fn song_by_name(&self, name: &str) -> Result<Option<SongId>> {
        let song_id = self
            .conn
            .query_row("SELECT id FROM Songs WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        Ok(song_id)
    }
}
