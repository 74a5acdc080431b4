//! Player profiles and tournament registration.

use std::{collections::HashMap, time::SystemTime};

use tracing::info;

use crate::{
    auth::Identity,
    dao::{
        models::{EntryEntity, PlayerEntity, TournamentStatus},
        tournament_store::TournamentStore,
    },
    dto::{
        player::{PlayerEntry, PlayerProfile},
        validation::MAX_NICKNAME_CHARS,
    },
    error::ServiceError,
    state::{SharedState, tournament::TournamentId},
};

/// Result of a registration request.
#[derive(Debug)]
pub struct Registration {
    /// True when an entry was created or reactivated.
    pub created: bool,
    /// The entry as listed.
    pub entry: PlayerEntry,
}

/// Profile of the caller, created on first access.
pub async fn me(state: &SharedState, identity: &Identity) -> Result<PlayerProfile, ServiceError> {
    let store = state.require_store().await?;
    let player = find_or_create_player(store.as_ref(), &identity.username).await?;
    let active = active_tournament(store.as_ref(), &identity.username).await?;
    Ok(PlayerProfile::new(player, active))
}

/// Change the caller's nickname.
pub async fn update_nickname(
    state: &SharedState,
    identity: &Identity,
    nickname: &str,
) -> Result<PlayerProfile, ServiceError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(ServiceError::InvalidInput("nickname must not be blank".into()));
    }
    if nickname.chars().count() > MAX_NICKNAME_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "nickname must be at most {MAX_NICKNAME_CHARS} characters"
        )));
    }

    let store = state.require_store().await?;
    let mut player = find_or_create_player(store.as_ref(), &identity.username).await?;
    player.nickname = nickname.to_owned();
    store.save_player(player.clone()).await?;

    let active = active_tournament(store.as_ref(), &identity.username).await?;
    Ok(PlayerProfile::new(player, active))
}

/// Register the caller in `tournament_id`.
///
/// A player holds at most one active entry across open tournaments; a busted entry in the
/// same tournament is reactivated.
pub async fn register(
    state: &SharedState,
    identity: &Identity,
    tournament_id: TournamentId,
) -> Result<Registration, ServiceError> {
    let store = state.require_store().await?;
    let tournament = store
        .find_tournament(tournament_id)
        .await?
        .ok_or_else(|| ServiceError::tournament_not_found(tournament_id))?;
    if tournament.status == TournamentStatus::Finished {
        return Err(ServiceError::InvalidState(format!(
            "tournament `{tournament_id}` is finished"
        )));
    }

    let username = identity.username.as_str();
    let player = find_or_create_player(store.as_ref(), username).await?;
    if let Some(conflict) = active_tournament(store.as_ref(), username).await?
        && conflict != tournament_id
    {
        return Err(ServiceError::ActiveEntryConflict(conflict));
    }

    let existing = store
        .find_entry(tournament_id, username.to_owned())
        .await?;
    let (entry, created) = match existing {
        Some(entry) if entry.is_active => (entry, false),
        Some(entry) => (
            EntryEntity {
                is_active: true,
                ..entry
            },
            true,
        ),
        None => (
            EntryEntity {
                tournament_id,
                username: username.to_owned(),
                is_active: true,
                joined_at: SystemTime::now(),
            },
            true,
        ),
    };

    if created {
        store.save_entry(entry.clone()).await?;
        info!(tournament_id, username, "player registered");
    }

    Ok(Registration {
        created,
        entry: PlayerEntry::new(entry, Some(&player)),
    })
}

/// Every entry of a tournament in join order.
pub async fn list_players(
    state: &SharedState,
    tournament_id: TournamentId,
) -> Result<Vec<PlayerEntry>, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_tournament(tournament_id)
        .await?
        .ok_or_else(|| ServiceError::tournament_not_found(tournament_id))?;
    entries_with_nicknames(store.as_ref(), tournament_id).await
}

/// Entries of a tournament joined with the players' display names.
pub async fn entries_with_nicknames(
    store: &dyn TournamentStore,
    tournament_id: TournamentId,
) -> Result<Vec<PlayerEntry>, ServiceError> {
    let entries = store.list_entries(tournament_id).await?;
    let mut players = HashMap::new();
    for entry in &entries {
        if !players.contains_key(&entry.username)
            && let Some(player) = store.find_player(entry.username.clone()).await?
        {
            players.insert(entry.username.clone(), player);
        }
    }

    Ok(entries
        .into_iter()
        .map(|entry| {
            let player = players.get(&entry.username);
            PlayerEntry::new(entry, player)
        })
        .collect())
}

async fn find_or_create_player(
    store: &dyn TournamentStore,
    username: &str,
) -> Result<PlayerEntity, ServiceError> {
    if let Some(player) = store.find_player(username.to_owned()).await? {
        return Ok(player);
    }

    let player = PlayerEntity {
        username: username.to_owned(),
        nickname: username.to_owned(),
        created_at: SystemTime::now(),
    };
    store.save_player(player.clone()).await?;
    info!(username, "player profile created");
    Ok(player)
}

/// Open tournament in which the player holds an active entry.
async fn active_tournament(
    store: &dyn TournamentStore,
    username: &str,
) -> Result<Option<TournamentId>, ServiceError> {
    for entry in store.active_entries(username.to_owned()).await? {
        let open = store
            .find_tournament(entry.tournament_id)
            .await?
            .is_some_and(|tournament| tournament.status.is_open());
        if open {
            return Ok(Some(entry.tournament_id));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        auth::{JwtVerifier, Role},
        config::AppConfig,
        dao::tournament_store::memory::MemoryTournamentStore,
        state::AppState,
    };

    async fn fixture() -> (SharedState, Arc<MemoryTournamentStore>) {
        let state = AppState::new(AppConfig::default(), Arc::new(JwtVerifier::new("test")));
        let store = Arc::new(MemoryTournamentStore::new());
        state.install_store(store.clone()).await;
        store.create_tournament("A".into(), json!({})).await.unwrap();
        store.create_tournament("B".into(), json!({})).await.unwrap();
        (state, store)
    }

    fn player(name: &str) -> Identity {
        Identity {
            username: name.into(),
            role: Role::Viewer,
        }
    }

    #[tokio::test]
    async fn profile_defaults_nickname_to_username() {
        let (state, _store) = fixture().await;
        let profile = me(&state, &player("kari")).await.unwrap();
        assert_eq!(profile.nickname, "kari");
        assert_eq!(profile.active_tournament_id, None);

        let profile = update_nickname(&state, &player("kari"), "  Kari K  ").await.unwrap();
        assert_eq!(profile.nickname, "Kari K");
    }

    #[tokio::test]
    async fn second_open_tournament_is_a_conflict() {
        let (state, _store) = fixture().await;
        let first = register(&state, &player("kari"), 1).await.unwrap();
        assert!(first.created);

        let again = register(&state, &player("kari"), 1).await.unwrap();
        assert!(!again.created);

        let err = register(&state, &player("kari"), 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::ActiveEntryConflict(1)));
    }

    #[tokio::test]
    async fn finished_tournaments_release_the_player() {
        let (state, store) = fixture().await;
        register(&state, &player("kari"), 1).await.unwrap();
        store
            .save_state(1, json!({}), TournamentStatus::Finished)
            .await
            .unwrap();

        assert!(register(&state, &player("kari"), 2).await.unwrap().created);
        let err = register(&state, &player("ola"), 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn busted_entry_is_reactivated() {
        let (state, store) = fixture().await;
        register(&state, &player("kari"), 1).await.unwrap();
        let mut entry = store.find_entry(1, "kari".into()).await.unwrap().unwrap();
        entry.is_active = false;
        store.save_entry(entry).await.unwrap();

        let registration = register(&state, &player("kari"), 1).await.unwrap();
        assert!(registration.created);
        assert!(registration.entry.is_active);
        assert_eq!(list_players(&state, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tournament_is_not_found() {
        let (state, _store) = fixture().await;
        assert!(matches!(
            register(&state, &player("kari"), 9).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            list_players(&state, 9).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
