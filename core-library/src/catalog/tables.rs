//! Catalogue table declarations and DDL.

use crate::dialect::Dialect;
use crate::schema::{binary, boolean, number, string, table, TableDefinition};

/// Every catalogue table, declared once and shared by the store's queries
#[derive(Debug, Clone)]
pub struct CatalogTables {
    pub artists: TableDefinition,
    pub albums: TableDefinition,
    pub tracks: TableDefinition,
    pub playlists: TableDefinition,
    pub playlist_tracks: TableDefinition,
}

impl CatalogTables {
    pub fn new() -> Self {
        Self {
            artists: table(
                "artists",
                [
                    ("id", binary()),
                    ("name", string()),
                    ("created_at", number()),
                ],
            ),
            albums: table(
                "albums",
                [
                    ("id", binary()),
                    ("artist_id", binary().references("artists", "id")),
                    ("title", string()),
                    ("year", number().or_null()),
                ],
            ),
            tracks: table(
                "tracks",
                [
                    ("id", binary()),
                    ("album_id", binary().references("albums", "id")),
                    ("title", string()),
                    ("track_number", number()),
                    ("duration_ms", number().or_null()),
                    ("explicit", boolean().with_default()),
                ],
            ),
            playlists: table("playlists", [("id", binary()), ("name", string())]),
            playlist_tracks: table(
                "playlist_tracks",
                [
                    ("playlist_id", binary().references("playlists", "id")),
                    ("track_id", binary().references("tracks", "id")),
                    ("position", number()),
                ],
            ),
        }
    }
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self::new()
    }
}

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS artists (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS albums (
        id BLOB PRIMARY KEY NOT NULL,
        artist_id BLOB NOT NULL REFERENCES artists(id),
        title TEXT NOT NULL,
        year INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS tracks (
        id BLOB PRIMARY KEY NOT NULL,
        album_id BLOB NOT NULL REFERENCES albums(id),
        title TEXT NOT NULL,
        track_number INTEGER NOT NULL,
        duration_ms INTEGER,
        explicit INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS playlists (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS playlist_tracks (
        playlist_id BLOB NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        track_id BLOB NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (playlist_id, position)
    )",
    "CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id)",
    "CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id)",
];

const MYSQL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS artists (
        id BINARY(16) PRIMARY KEY NOT NULL,
        name VARCHAR(255) NOT NULL,
        created_at BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS albums (
        id BINARY(16) PRIMARY KEY NOT NULL,
        artist_id BINARY(16) NOT NULL,
        title VARCHAR(255) NOT NULL,
        year INT NULL,
        INDEX idx_albums_artist (artist_id),
        FOREIGN KEY (artist_id) REFERENCES artists(id)
    )",
    "CREATE TABLE IF NOT EXISTS tracks (
        id BINARY(16) PRIMARY KEY NOT NULL,
        album_id BINARY(16) NOT NULL,
        title VARCHAR(255) NOT NULL,
        track_number INT NOT NULL,
        duration_ms BIGINT NULL,
        explicit BOOLEAN NOT NULL DEFAULT FALSE,
        INDEX idx_tracks_album (album_id),
        FOREIGN KEY (album_id) REFERENCES albums(id)
    )",
    "CREATE TABLE IF NOT EXISTS playlists (
        id BINARY(16) PRIMARY KEY NOT NULL,
        name VARCHAR(255) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS playlist_tracks (
        playlist_id BINARY(16) NOT NULL,
        track_id BINARY(16) NOT NULL,
        position INT NOT NULL,
        PRIMARY KEY (playlist_id, position),
        FOREIGN KEY (playlist_id) REFERENCES playlists(id) ON DELETE CASCADE,
        FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
    )",
];

/// `CREATE` statements for the catalogue in the given dialect
pub fn schema_statements(dialect: &dyn Dialect) -> &'static [&'static str] {
    match dialect.name() {
        "mysql" => MYSQL_SCHEMA,
        _ => SQLITE_SCHEMA,
    }
}
