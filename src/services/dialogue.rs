use std::sync::Arc;

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{serializer::Json, ErasedStorage, InMemStorage, RedisStorage, Storage};
use teloxide::prelude::Dialogue;

use crate::config::DialogueConfig;
use crate::error::{BotError, BotResult};
use crate::services::task::TaskSession;
use crate::storage::RedisClient;

/// Pipeline state for one conversation. `Idle` is the only state without
/// session data; everything in flight travels inside the variant, so a
/// terminal transition discards it wholesale.
#[derive(Clone, Default, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingInterviewAnswer {
        session: TaskSession,
    },
    AwaitingPlanConfirmation {
        session: TaskSession,
    },
    AwaitingPlanModification {
        session: TaskSession,
    },
    /// The solve call is in flight; user input is parked until it settles.
    Solving,
}

pub type TaskDialogue = Dialogue<DialogueState, ErasedStorage<DialogueState>>;

/// Decides whether a fired plan-confirmation timer may abort the pipeline.
/// A timer is stale once the state moved on or the plan was regenerated
/// (`plan_round` bumped); stale timers must be no-ops.
pub fn timeout_should_abort(state: Option<&DialogueState>, armed_round: u32) -> bool {
    match state {
        Some(DialogueState::AwaitingPlanConfirmation { session })
        | Some(DialogueState::AwaitingPlanModification { session }) => session.plan_round == armed_round,
        _ => false,
    }
}

pub struct DialogueService;

impl DialogueService {
    pub async fn get_dialogue_storage(config: &DialogueConfig) -> BotResult<Arc<ErasedStorage<DialogueState>>> {
        let storage = if config.use_redis {
            RedisStorage::open(config.redis_url.as_str(), Json)
                .await
                .map_err(|e| BotError::DialogueStateError(e.to_string()))?
                .erase()
        } else {
            InMemStorage::new().erase()
        };

        Ok(storage)
    }

    /// Drops leftover per-chat dialogue keys. Sessions do not survive a
    /// deploy anyway (plan timeouts are in-process timers), so stale states
    /// would only trap users in a dead flow.
    pub async fn clear_dialogue_storage(config: &DialogueConfig) -> BotResult<()> {
        if !config.use_redis {
            debug!("Dialogue storage is not using Redis, skipping clear");
            return Ok(());
        }

        debug!("Clearing dialogue storage...");

        let mut conn = RedisClient::get()?.get_connection().await?;
        let keys: Vec<String> = conn
            .keys("[0-9]*")
            .await
            .map_err(crate::storage::StorageError::from)?;

        for key in keys {
            debug!("Clearing dialogue state for chat_id: {}", key);
            conn.del::<_, ()>(&key)
                .await
                .map_err(crate::storage::StorageError::from)?;
        }

        debug!("Dialogue storage cleared");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::task::QuotaSource;

    fn session_with_round(round: u32) -> TaskSession {
        let mut session = TaskSession::new(1, "q", QuotaSource::Daily);
        session.plan_round = round;
        session
    }

    #[test]
    fn timer_aborts_only_the_round_it_was_armed_for() {
        let awaiting = DialogueState::AwaitingPlanConfirmation {
            session: session_with_round(2),
        };

        assert!(timeout_should_abort(Some(&awaiting), 2));
        assert!(!timeout_should_abort(Some(&awaiting), 1), "stale round is a no-op");
    }

    #[test]
    fn timer_keeps_running_through_plan_modification() {
        let modifying = DialogueState::AwaitingPlanModification {
            session: session_with_round(1),
        };

        assert!(timeout_should_abort(Some(&modifying), 1));
    }

    #[test]
    fn timer_is_a_noop_after_the_state_moved_on() {
        assert!(!timeout_should_abort(Some(&DialogueState::Idle), 1));
        assert!(!timeout_should_abort(Some(&DialogueState::Solving), 1));
        assert!(!timeout_should_abort(None, 1));

        let interviewing = DialogueState::AwaitingInterviewAnswer {
            session: session_with_round(1),
        };
        assert!(!timeout_should_abort(Some(&interviewing), 1));
    }
}
