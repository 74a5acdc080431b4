use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoCounterDocument, MongoEntryDocument, MongoPlayerDocument, MongoTournamentDocument,
        bson_id,
    },
};
use crate::{
    dao::{
        models::{EntryEntity, PlayerEntity, TournamentRecord, TournamentStatus},
        storage::StorageResult,
        tournament_store::TournamentStore,
    },
    state::tournament::TournamentId,
};

const TOURNAMENT_COLLECTION_NAME: &str = "tournaments";
const PLAYER_COLLECTION_NAME: &str = "players";
const ENTRY_COLLECTION_NAME: &str = "entries";
const COUNTER_COLLECTION_NAME: &str = "counters";
const TOURNAMENT_SEQUENCE: &str = "tournaments";

/// [`TournamentStore`] backed by MongoDB, reconnecting in place.
#[derive(Clone)]
pub struct MongoTournamentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoTournamentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let tournaments = database.collection::<Document>(TOURNAMENT_COLLECTION_NAME);
        let status_index = IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("tournament_status_idx".to_owned()))
                    .build(),
            )
            .build();
        tournaments
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TOURNAMENT_COLLECTION_NAME,
                index: "status",
                source,
            })?;

        let entries = database.collection::<Document>(ENTRY_COLLECTION_NAME);
        let entry_index = IndexModel::builder()
            .keys(doc! {"tournament_id": 1, "username": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("entry_tournament_player_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        entries
            .create_index(entry_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ENTRY_COLLECTION_NAME,
                index: "tournament_id,username",
                source,
            })?;

        let player_index = IndexModel::builder()
            .keys(doc! {"username": 1, "is_active": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("entry_player_active_idx".to_owned()))
                    .build(),
            )
            .build();
        entries
            .create_index(player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ENTRY_COLLECTION_NAME,
                index: "username,is_active",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.state.read().await.database.clone()
    }

    async fn tournaments(&self) -> Collection<MongoTournamentDocument> {
        self.database().await.collection(TOURNAMENT_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        self.database().await.collection(PLAYER_COLLECTION_NAME)
    }

    async fn entries(&self) -> Collection<MongoEntryDocument> {
        self.database().await.collection(ENTRY_COLLECTION_NAME)
    }

    async fn next_tournament_id(&self) -> MongoResult<TournamentId> {
        let counters = self
            .database()
            .await
            .collection::<MongoCounterDocument>(COUNTER_COLLECTION_NAME);
        let counter = counters
            .find_one_and_update(
                doc! {"_id": TOURNAMENT_SEQUENCE},
                doc! {"$inc": {"seq": 1_i64}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::NextId { source })?;

        let seq = counter.map_or(1, |counter| counter.seq);
        TournamentId::try_from(seq).map_err(|_| MongoDaoError::NegativeId { id: seq })
    }

    async fn create_tournament(&self, name: String, state: Value) -> MongoResult<TournamentRecord> {
        let id = self.next_tournament_id().await?;
        let now = SystemTime::now();
        let record = TournamentRecord {
            id,
            name,
            status: TournamentStatus::Pending,
            state,
            created_at: now,
            updated_at: now,
        };

        let document = MongoTournamentDocument::from(record.clone());
        self.tournaments()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveTournament { id, source })?;
        Ok(record)
    }

    async fn find_document(
        &self,
        id: TournamentId,
    ) -> MongoResult<Option<MongoTournamentDocument>> {
        self.tournaments()
            .await
            .find_one(doc! {"_id": bson_id(id)})
            .await
            .map_err(|source| MongoDaoError::LoadTournament { id, source })
    }

    async fn find_tournament(&self, id: TournamentId) -> MongoResult<Option<TournamentRecord>> {
        self.find_document(id)
            .await?
            .map(TournamentRecord::try_from)
            .transpose()
    }

    async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> MongoResult<Vec<TournamentRecord>> {
        let filter = match status {
            Some(status) => doc! {"status": status.as_str()},
            None => doc! {},
        };

        let documents: Vec<MongoTournamentDocument> = self
            .tournaments()
            .await
            .find(filter)
            .sort(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListTournaments { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListTournaments { source })?;

        documents.into_iter().map(TournamentRecord::try_from).collect()
    }

    async fn save_state(
        &self,
        id: TournamentId,
        state: Value,
        status: TournamentStatus,
    ) -> MongoResult<bool> {
        let Some(mut document) = self.find_document(id).await? else {
            return Ok(false);
        };

        document.state = state;
        document.status = status;
        document.updated_at = DateTime::now();
        // A finished row left out by the filter is still reported as saved.
        self.tournaments()
            .await
            .replace_one(save_state_filter(id, status), &document)
            .await
            .map_err(|source| MongoDaoError::SaveTournament { id, source })?;
        Ok(true)
    }

    async fn rename_tournament(
        &self,
        id: TournamentId,
        name: String,
    ) -> MongoResult<Option<TournamentRecord>> {
        self.tournaments()
            .await
            .find_one_and_update(
                doc! {"_id": bson_id(id)},
                doc! {"$set": {"name": name, "updated_at": DateTime::now()}},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveTournament { id, source })?
            .map(TournamentRecord::try_from)
            .transpose()
    }

    async fn find_player(&self, username: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(doc! {"_id": username.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { username, source })?;
        Ok(document.map(PlayerEntity::from))
    }

    async fn save_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let document = MongoPlayerDocument::from(player);
        self.players()
            .await
            .replace_one(doc! {"_id": document.username.as_str()}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                username: document.username.clone(),
                source,
            })?;
        Ok(())
    }

    async fn find_entries(&self, filter: Document) -> MongoResult<Vec<EntryEntity>> {
        let documents: Vec<MongoEntryDocument> = self
            .entries()
            .await
            .find(filter)
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::LoadEntries { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadEntries { source })?;

        documents.into_iter().map(EntryEntity::try_from).collect()
    }

    async fn save_entry(&self, entry: EntryEntity) -> MongoResult<()> {
        let tournament_id = entry.tournament_id;
        let document = MongoEntryDocument::from(entry);
        self.entries()
            .await
            .replace_one(
                doc! {
                    "tournament_id": document.tournament_id,
                    "username": document.username.as_str(),
                },
                &document,
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveEntry {
                tournament_id,
                username: document.username.clone(),
                source,
            })?;
        Ok(())
    }
}

impl TournamentStore for MongoTournamentStore {
    fn create_tournament(
        &self,
        name: String,
        state: Value,
    ) -> BoxFuture<'static, StorageResult<TournamentRecord>> {
        let store = self.clone();
        Box::pin(async move { store.create_tournament(name, state).await.map_err(Into::into) })
    }

    fn find_tournament(
        &self,
        id: TournamentId,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.find_tournament(id).await.map_err(Into::into) })
    }

    fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<TournamentRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.list_tournaments(status).await.map_err(Into::into) })
    }

    fn save_state(
        &self,
        id: TournamentId,
        state: Value,
        status: TournamentStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.save_state(id, state, status).await.map_err(Into::into) })
    }

    fn rename_tournament(
        &self,
        id: TournamentId,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.rename_tournament(id, name).await.map_err(Into::into) })
    }

    fn find_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(username).await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn find_entry(
        &self,
        tournament_id: TournamentId,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<EntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {"tournament_id": bson_id(tournament_id), "username": username};
            let mut entries = store.find_entries(filter).await?;
            Ok(entries.pop())
        })
    }

    fn active_entries(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Vec<EntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_entries(doc! {"username": username, "is_active": true})
                .await
                .map_err(Into::into)
        })
    }

    fn save_entry(&self, entry: EntryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_entry(entry).await.map_err(Into::into) })
    }

    fn list_entries(
        &self,
        tournament_id: TournamentId,
    ) -> BoxFuture<'static, StorageResult<Vec<EntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_entries(doc! {"tournament_id": bson_id(tournament_id)})
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

/// Match the row of `id`; writes other than `Finished` also require the row to be open, so the
/// check and the write are one operation.
fn save_state_filter(id: TournamentId, status: TournamentStatus) -> Document {
    if status == TournamentStatus::Finished {
        doc! {"_id": bson_id(id)}
    } else {
        doc! {"_id": bson_id(id), "status": {"$ne": TournamentStatus::Finished.as_str()}}
    }
}
