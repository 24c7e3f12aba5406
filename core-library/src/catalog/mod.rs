//! # Music Catalogue
//!
//! Artists, albums, tracks and playlists stored through the query builder.
//!
//! [`CatalogStore`] owns a [`DatabaseHandle`], the dialect its SQL is
//! rendered in, and the identifier generator used for new rows. Multi-step
//! writes run inside [`in_transaction`]; their statements are rendered before
//! the transaction starts, so a rendering error never opens one.
//!
//! ```ignore
//! let store = CatalogStore::new(handle);
//! store.create_schema().await?;
//!
//! let artist = store.add_artist("Miles Davis").await?;
//! let album = store
//!     .add_album_with_tracks(
//!         &artist.id,
//!         NewAlbum::new("Kind of Blue").with_year(1959),
//!         vec![NewTrack::new("So What", 1), NewTrack::new("Freddie Freeloader", 2)],
//!     )
//!     .await?;
//!
//! for listing in store.album_tracks(&album.id).await? {
//!     println!("{} - {}", listing.track.track_number, listing.track.title);
//! }
//! ```

mod models;
mod tables;

pub use models::{
    Album, AlbumSummary, Artist, ArtistSummary, NewAlbum, NewTrack, Playlist, Track, TrackListing,
};
pub use tables::{schema_statements, CatalogTables};

use crate::dialect::{Dialect, SqliteDialect};
use crate::error::{LibraryError, Result};
use crate::exec::in_transaction;
use crate::filter::Matcher;
use crate::id::{IdGenerator, Identifier, OsRandom, RandomSource};
use crate::pagination::{Page, PageRequest};
use crate::query::{Query, Selection, Values};
use bridge_traits::database::DatabaseHandle;
use bridge_traits::time::{Clock, SystemClock};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Catalogue operations over one database handle
pub struct CatalogStore<C = SystemClock, R = OsRandom> {
    handle: Arc<dyn DatabaseHandle>,
    dialect: Arc<dyn Dialect>,
    ids: Mutex<IdGenerator<C, R>>,
    tables: CatalogTables,
}

impl CatalogStore<SystemClock, OsRandom> {
    /// Store rendering SQLite SQL with system-clock identifiers
    pub fn new(handle: Arc<dyn DatabaseHandle>) -> Self {
        Self::with_parts(handle, Arc::new(SqliteDialect), IdGenerator::system())
    }
}

impl<C: Clock, R: RandomSource> CatalogStore<C, R> {
    pub fn with_parts(
        handle: Arc<dyn DatabaseHandle>,
        dialect: Arc<dyn Dialect>,
        ids: IdGenerator<C, R>,
    ) -> Self {
        Self {
            handle,
            dialect,
            ids: Mutex::new(ids),
            tables: CatalogTables::new(),
        }
    }

    pub fn tables(&self) -> &CatalogTables {
        &self.tables
    }

    pub fn handle(&self) -> &Arc<dyn DatabaseHandle> {
        &self.handle
    }

    fn query(&self, table: &crate::schema::TableDefinition) -> Query {
        Query::with_dialect(table, self.dialect.clone())
    }

    fn next_id(&self) -> Result<Identifier> {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .generate()
    }

    /// Create any missing catalogue tables
    pub async fn create_schema(&self) -> Result<()> {
        for statement in schema_statements(self.dialect.as_ref()) {
            self.handle.execute(statement).await?;
        }
        info!(dialect = self.dialect.name(), "Catalogue schema ready");
        Ok(())
    }

    // =========================================================================
    // Artists
    // =========================================================================

    /// Insert a new artist
    ///
    /// # Errors
    /// Returns error if the name is empty or the insert fails
    pub async fn add_artist(&self, name: &str) -> Result<Artist> {
        models::require_name("name", name)?;
        let id = self.next_id()?;
        let artist = Artist {
            id,
            name: name.to_string(),
            created_at: id.timestamp_millis(),
        };

        self.query(&self.tables.artists)
            .insert(
                Values::new()
                    .set("id", artist.id)
                    .set("name", artist.name.as_str())
                    .set("created_at", artist.created_at),
            )?
            .execute(self.handle.as_ref())
            .await?;

        debug!(artist_id = %artist.id, "Artist added");
        Ok(artist)
    }

    /// Find an artist by its ID
    ///
    /// # Returns
    /// - `Ok(Some(artist))` if found
    /// - `Ok(None)` if not found
    pub async fn find_artist(&self, id: &Identifier) -> Result<Option<Artist>> {
        let artists: Vec<Artist> = self
            .query(&self.tables.artists)
            .where_(Matcher::new().field("id", id))?
            .fetch_as(self.handle.as_ref())
            .await?;
        Ok(artists.into_iter().next())
    }

    /// Rename an existing artist
    ///
    /// # Errors
    /// Returns [`LibraryError::NotFound`] if no artist has this ID
    pub async fn rename_artist(&self, id: &Identifier, name: &str) -> Result<()> {
        models::require_name("name", name)?;
        let result = self
            .query(&self.tables.artists)
            .where_(Matcher::new().field("id", id))?
            .update(Values::new().set("name", name))?
            .execute(self.handle.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(not_found("Artist", id));
        }
        Ok(())
    }

    // =========================================================================
    // Albums and tracks
    // =========================================================================

    /// Insert an album and its tracks in one transaction
    ///
    /// Either every row is written or none is.
    pub async fn add_album_with_tracks(
        &self,
        artist_id: &Identifier,
        album: NewAlbum,
        tracks: Vec<NewTrack>,
    ) -> Result<Album> {
        album.validate()?;
        for track in &tracks {
            track.validate()?;
        }

        let album = Album {
            id: self.next_id()?,
            artist_id: *artist_id,
            title: album.title,
            year: album.year,
        };

        let album_insert = self.query(&self.tables.albums).insert(
            Values::new()
                .set("id", album.id)
                .set("artist_id", album.artist_id)
                .set("title", album.title.as_str())
                .set("year", album.year),
        )?;

        let track_rows = tracks
            .into_iter()
            .map(|track| -> Result<Values> {
                Ok(Values::new()
                    .set("id", self.next_id()?)
                    .set("album_id", album.id)
                    .set("title", track.title)
                    .set("track_number", track.track_number)
                    .set("duration_ms", track.duration_ms)
                    .set("explicit", track.explicit))
            })
            .collect::<Result<Vec<_>>>()?;
        let track_count = track_rows.len();
        let tracks_insert = if track_rows.is_empty() {
            None
        } else {
            Some(self.query(&self.tables.tracks).insert_many(track_rows)?)
        };

        in_transaction(self.handle.as_ref(), |tx| {
            Box::pin(async move {
                album_insert.execute(tx).await?;
                if let Some(statement) = tracks_insert {
                    statement.execute(tx).await?;
                }
                Ok(())
            })
        })
        .await?;

        info!(album_id = %album.id, tracks = track_count, "Album added");
        Ok(album)
    }

    /// Tracks of one album in track-number order, with album and artist details
    pub async fn album_tracks(&self, album_id: &Identifier) -> Result<Vec<TrackListing>> {
        let t = &self.tables;
        self.query(&t.tracks)
            .inner_join(&t.albums)?
            .on((t.tracks.column("album_id")?, "=", t.albums.column("id")?))?
            .inner_join(&t.artists)?
            .on((t.albums.column("artist_id")?, "=", t.artists.column("id")?))?
            .where_(Matcher::new().table("albums", Matcher::new().field("id", album_id)))?
            .select(Selection::nested([
                ("track", Selection::table(&t.tracks)),
                (
                    "album",
                    Selection::nested([
                        ("title", Selection::from(t.albums.column("title")?)),
                        ("year", Selection::from(t.albums.column("year")?)),
                    ]),
                ),
                (
                    "artist",
                    Selection::nested([("name", Selection::from(t.artists.column("name")?))]),
                ),
            ]))?
            .order_by(t.tracks.column("track_number")?)?
            .fetch_as(self.handle.as_ref())
            .await
    }

    /// One page of all tracks ordered by title
    pub async fn track_page(&self, request: PageRequest) -> Result<Page<Track>> {
        let t = &self.tables;
        let base = self.query(&t.tracks);
        let total = base.count(self.handle.as_ref()).await?;
        let items: Vec<Track> = base
            .order_by(t.tracks.column("title")?)?
            .then_by(t.tracks.column("id")?)?
            .paginate(request)?
            .fetch_as(self.handle.as_ref())
            .await?;

        debug!(
            page = request.page,
            items = items.len(),
            total,
            "Track page loaded"
        );
        Ok(Page::new(items, total, request))
    }

    /// Delete an album and its tracks
    ///
    /// # Errors
    /// Returns [`LibraryError::NotFound`] if the album does not exist; nothing
    /// is deleted in that case.
    pub async fn delete_album(&self, album_id: &Identifier) -> Result<()> {
        let delete_tracks = self
            .query(&self.tables.tracks)
            .where_(Matcher::new().field("album_id", album_id))?
            .delete()?;
        let delete_album = self
            .query(&self.tables.albums)
            .where_(Matcher::new().field("id", album_id))?
            .delete()?;
        let missing = not_found("Album", album_id);

        let removed = in_transaction(self.handle.as_ref(), |tx| {
            Box::pin(async move {
                let tracks = delete_tracks.execute(tx).await?;
                let album = delete_album.execute(tx).await?;
                if album.rows_affected == 0 {
                    return Err(missing);
                }
                Ok(tracks.rows_affected)
            })
        })
        .await?;

        info!(album_id = %album_id, tracks = removed, "Album deleted");
        Ok(())
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        models::require_name("name", name)?;
        let playlist = Playlist {
            id: self.next_id()?,
            name: name.to_string(),
        };
        self.query(&self.tables.playlists)
            .insert(
                Values::new()
                    .set("id", playlist.id)
                    .set("name", playlist.name.as_str()),
            )?
            .execute(self.handle.as_ref())
            .await?;
        Ok(playlist)
    }

    /// Append a track to the end of a playlist, returning its position
    pub async fn append_to_playlist(
        &self,
        playlist_id: &Identifier,
        track_id: &Identifier,
    ) -> Result<u64> {
        let entries = self
            .query(&self.tables.playlist_tracks)
            .where_(Matcher::new().field("playlist_id", playlist_id))?;
        let insert_root = self.query(&self.tables.playlist_tracks);
        let playlist_id = *playlist_id;
        let track_id = *track_id;

        in_transaction(self.handle.as_ref(), |tx| {
            Box::pin(async move {
                let position = entries.count(tx).await?;
                insert_root
                    .insert(
                        Values::new()
                            .set("playlist_id", playlist_id)
                            .set("track_id", track_id)
                            .set("position", position as i64),
                    )?
                    .execute(tx)
                    .await?;
                Ok(position)
            })
        })
        .await
    }

    /// Tracks of a playlist in playlist order
    pub async fn playlist_tracks(&self, playlist_id: &Identifier) -> Result<Vec<Track>> {
        let t = &self.tables;
        self.query(&t.playlist_tracks)
            .inner_join(&t.tracks)?
            .on((
                t.playlist_tracks.column("track_id")?,
                "=",
                t.tracks.column("id")?,
            ))?
            .where_(
                Matcher::new().table(
                    "playlist_tracks",
                    Matcher::new().field("playlist_id", playlist_id),
                ),
            )?
            .select(&t.tracks)?
            .order_by(t.playlist_tracks.column("position")?)?
            .fetch_as(self.handle.as_ref())
            .await
    }
}

fn not_found(entity_type: &str, id: &Identifier) -> LibraryError {
    LibraryError::NotFound {
        entity_type: entity_type.to_string(),
        id: id.to_string(),
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::adapters::SqliteHandle;
    use bridge_traits::database::DatabaseConfig;

    async fn setup_store() -> CatalogStore {
        let handle = SqliteHandle::new(DatabaseConfig::in_memory())
            .await
            .expect("Failed to create handle");
        let store = CatalogStore::new(Arc::new(handle));
        store.create_schema().await.unwrap();
        store
    }

    async fn seed_album(store: &CatalogStore) -> (Artist, Album) {
        let artist = store.add_artist("Miles Davis").await.unwrap();
        let album = store
            .add_album_with_tracks(
                &artist.id,
                NewAlbum::new("Kind of Blue").with_year(1959),
                vec![
                    NewTrack::new("Freddie Freeloader", 2).with_duration_ms(589_000),
                    NewTrack::new("So What", 1).with_duration_ms(545_000),
                    NewTrack::new("Blue in Green", 3).explicit(),
                ],
            )
            .await
            .unwrap();
        (artist, album)
    }

    #[tokio::test]
    async fn test_add_and_find_artist() {
        let store = setup_store().await;
        let artist = store.add_artist("Nina Simone").await.unwrap();

        let found = store.find_artist(&artist.id).await.unwrap();
        assert_eq!(found, Some(artist));

        let missing = store.find_artist(&Identifier::from_bytes([0; 16])).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_add_artist_rejects_blank_name() {
        let store = setup_store().await;
        assert!(matches!(
            store.add_artist("   ").await,
            Err(LibraryError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_rename_artist() {
        let store = setup_store().await;
        let artist = store.add_artist("Prince").await.unwrap();
        store.rename_artist(&artist.id, "The Artist").await.unwrap();

        let found = store.find_artist(&artist.id).await.unwrap().unwrap();
        assert_eq!(found.name, "The Artist");

        let err = store
            .rename_artist(&Identifier::from_bytes([1; 16]), "Nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_album_tracks_are_ordered_and_nested() {
        let store = setup_store().await;
        let (artist, album) = seed_album(&store).await;

        let listings = store.album_tracks(&album.id).await.unwrap();
        let titles: Vec<&str> = listings.iter().map(|l| l.track.title.as_str()).collect();
        assert_eq!(titles, vec!["So What", "Freddie Freeloader", "Blue in Green"]);

        let first = &listings[0];
        assert_eq!(first.track.album_id, album.id);
        assert_eq!(first.track.duration_ms, Some(545_000));
        assert!(!first.track.explicit);
        assert!(listings[2].track.explicit);
        assert_eq!(first.album.title, "Kind of Blue");
        assert_eq!(first.album.year, Some(1959));
        assert_eq!(first.artist.name, artist.name);
    }

    #[tokio::test]
    async fn test_failed_album_insert_writes_nothing() {
        let store = setup_store().await;
        // unknown artist violates the albums foreign key
        let err = store
            .add_album_with_tracks(
                &Identifier::from_bytes([9; 16]),
                NewAlbum::new("Orphan"),
                vec![NewTrack::new("Lost", 1)],
            )
            .await;
        assert!(err.is_err());

        let page = store.track_page(PageRequest::new(0, 10)).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_track_page() {
        let store = setup_store().await;
        seed_album(&store).await;

        let page = store.track_page(PageRequest::new(0, 2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next());
        let titles: Vec<&str> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Blue in Green", "Freddie Freeloader"]);

        let last = store.track_page(PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[tokio::test]
    async fn test_delete_album() {
        let store = setup_store().await;
        let (_, album) = seed_album(&store).await;

        store.delete_album(&album.id).await.unwrap();
        assert!(store.album_tracks(&album.id).await.unwrap().is_empty());
        assert_eq!(
            store.track_page(PageRequest::default()).await.unwrap().total,
            0
        );

        let err = store.delete_album(&album.id).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { entity_type, .. } if entity_type == "Album"));
    }

    #[tokio::test]
    async fn test_playlist_order() {
        let store = setup_store().await;
        let (_, album) = seed_album(&store).await;
        let tracks = store.album_tracks(&album.id).await.unwrap();
        let playlist = store.create_playlist("Late night").await.unwrap();

        assert_eq!(
            store
                .append_to_playlist(&playlist.id, &tracks[2].track.id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .append_to_playlist(&playlist.id, &tracks[0].track.id)
                .await
                .unwrap(),
            1
        );

        let ordered = store.playlist_tracks(&playlist.id).await.unwrap();
        let titles: Vec<&str> = ordered.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Blue in Green", "So What"]);
    }
}
