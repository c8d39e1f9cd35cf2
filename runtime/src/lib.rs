//! # Strike Events Runtime
//!
//! Runtime implementation for Strike Events reducers.
//!
//! This crate provides the [`Store`], which owns a feature's state, runs the
//! reducer for every action and executes the effects the reducer returns.
//!
//! ## Example
//!
//! ```ignore
//! use strike_events_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action and collect the actions produced by its effects
//! let feedback = store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use futures::future::BoxFuture;
use std::sync::Arc;
use strike_events_core::{effect::Effect, reducer::Reducer};
use tokio::sync::RwLock;

pub use error::StoreError;
pub use store::Store;

/// Upper bound on reducer passes triggered by a single `send`.
///
/// Each feedback action counts as one pass. A reducer that keeps producing
/// effects which produce actions is a bug; the store stops it here.
pub const MAX_FEEDBACK_ACTIONS: usize = 64;

/// Failures raised by the [`Store`] itself
pub mod error {
    use thiserror::Error;

    /// Store failures, as opposed to domain outcomes carried in state
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A spawned effect task panicked or was cancelled
        ///
        /// This typically means a spawned effect panicked.
        #[error("Effect task failed: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// The feedback loop produced more actions than [`crate::MAX_FEEDBACK_ACTIONS`]
        #[error("Feedback loop exceeded {0} actions")]
        FeedbackLimitExceeded(usize),
    }
}

/// Execute one effect to completion, returning the actions it produced.
///
/// Parallel children are spawned onto the runtime; sequential children run
/// in order on the current task.
fn execute_effect<A>(effect: Effect<A>) -> BoxFuture<'static, Result<Vec<A>, StoreError>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => Ok(Vec::new()),
            Effect::Future(fut) => {
                tracing::trace!("Executing Effect::Future");
                Ok(fut.await.into_iter().collect())
            },
            Effect::Sequential(effects) => {
                tracing::trace!("Executing Effect::Sequential with {} effects", effects.len());
                let mut produced = Vec::new();
                for effect in effects {
                    produced.extend(execute_effect(effect).await?);
                }
                Ok(produced)
            },
            Effect::Parallel(effects) => {
                tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                let handles: Vec<_> = effects
                    .into_iter()
                    .map(|effect| tokio::spawn(execute_effect(effect)))
                    .collect();
                let mut produced = Vec::new();
                for result in futures::future::join_all(handles).await {
                    produced.extend(result??);
                }
                Ok(produced)
            },
        }
    })
}

/// Serialises actions through a reducer and runs the effects it returns.
pub mod store {
    use super::{Arc, Effect, MAX_FEEDBACK_ACTIONS, Reducer, RwLock, StoreError, execute_effect};
    use std::collections::VecDeque;
    use strike_events_core::SmallVec;

    /// Owns a feature's state and is the only way to change it
    ///
    /// Every reducer pass holds the state's write lock, and actions yielded
    /// by effects are fed back through the same reducer.
    ///
    /// Effects run after the write lock is released, so slow I/O never blocks
    /// other senders. Concurrent `send()` calls serialize at the reducer.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Builds a store around `initial_state`
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
            }
        }

        /// Reduces `action` and drives its effects to completion
        ///
        /// Runs the reducer, executes the returned effects to completion and
        /// feeds every action they produce back through the reducer.
        ///
        /// # Returns
        ///
        /// The feedback actions, in the order they were reduced.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::TaskJoinError`] if a parallel effect panicked and
        /// [`StoreError::FeedbackLimitExceeded`] if the feedback loop does not settle.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<Vec<A>, StoreError>
        where
            A: Clone,
        {
            self.send_and_inspect(action, |_| ()).await.map(|((), feedback)| feedback)
        }

        /// Send an action and read state under the same write lock
        ///
        /// `inspect` runs right after the reducer, before the lock is released,
        /// so the value it returns reflects exactly this action and never an
        /// action sent concurrently by another caller. Feedback actions are
        /// processed afterwards, as in [`Store::send`].
        ///
        /// # Errors
        ///
        /// Same as [`Store::send`].
        #[tracing::instrument(skip(self, action, inspect), name = "store_send_and_inspect")]
        pub async fn send_and_inspect<F, T>(
            &self,
            action: A,
            inspect: F,
        ) -> Result<(T, Vec<A>), StoreError>
        where
            F: FnOnce(&S) -> T,
            A: Clone,
        {
            metrics::counter!("store.commands.total").increment(1);

            let (inspected, effects) = {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                (inspect(&state), effects)
            };

            let feedback = self.run_feedback_loop(effects).await?;
            Ok((inspected, feedback))
        }

        /// Projects the current state through `f` under a read lock
        ///
        /// ```ignore
        /// let attendee_count = store.state(|s| s.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        async fn run_feedback_loop(
            &self,
            effects: SmallVec<[Effect<A>; 4]>,
        ) -> Result<Vec<A>, StoreError>
        where
            A: Clone,
        {
            let mut feedback = Vec::new();
            let mut pending: VecDeque<Effect<A>> = effects.into_iter().collect();

            while let Some(effect) = pending.pop_front() {
                if effect.is_none() {
                    continue;
                }
                for action in execute_effect(effect).await? {
                    if feedback.len() >= MAX_FEEDBACK_ACTIONS {
                        tracing::error!(limit = MAX_FEEDBACK_ACTIONS, "Feedback loop did not settle");
                        return Err(StoreError::FeedbackLimitExceeded(MAX_FEEDBACK_ACTIONS));
                    }
                    tracing::trace!("Effect produced an action, feeding it back");
                    let more = {
                        let mut state = self.state.write().await;
                        self.reducer.reduce(&mut state, action.clone(), &self.environment)
                    };
                    feedback.push(action);
                    pending.extend(more);
                }
            }

            Ok(feedback)
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strike_events_core::{SmallVec, smallvec};

    #[derive(Clone, Debug, Default)]
    struct TallyState {
        count: u32,
        acknowledged: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum TallyAction {
        Bump,
        BumpTwiceInParallel,
        Acknowledged,
        Loop,
    }

    #[derive(Clone)]
    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Action = TallyAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut TallyState,
            action: TallyAction,
            _env: &(),
        ) -> SmallVec<[Effect<TallyAction>; 4]> {
            match action {
                TallyAction::Bump => {
                    state.count += 1;
                    smallvec![Effect::future(async { Some(TallyAction::Acknowledged) })]
                },
                TallyAction::BumpTwiceInParallel => {
                    state.count += 2;
                    smallvec![Effect::merge(vec![
                        Effect::future(async { Some(TallyAction::Acknowledged) }),
                        Effect::future(async { Some(TallyAction::Acknowledged) }),
                    ])]
                },
                TallyAction::Acknowledged => {
                    state.acknowledged += 1;
                    SmallVec::new()
                },
                TallyAction::Loop => smallvec![Effect::future(async { Some(TallyAction::Loop) })],
            }
        }
    }

    #[tokio::test]
    async fn send_runs_feedback_actions_through_reducer() {
        let store = Store::new(TallyState::default(), TallyReducer, ());

        let feedback = store.send(TallyAction::Bump).await.unwrap();

        assert_eq!(feedback, vec![TallyAction::Acknowledged]);
        let (count, acknowledged) = store.state(|s| (s.count, s.acknowledged)).await;
        assert_eq!(count, 1);
        assert_eq!(acknowledged, 1);
    }

    #[tokio::test]
    async fn parallel_effects_all_feed_back() {
        let store = Store::new(TallyState::default(), TallyReducer, ());

        let feedback = store.send(TallyAction::BumpTwiceInParallel).await.unwrap();

        assert_eq!(feedback.len(), 2);
        assert_eq!(store.state(|s| s.acknowledged).await, 2);
    }

    #[tokio::test]
    async fn inspect_sees_state_before_feedback() {
        let store = Store::new(TallyState::default(), TallyReducer, ());

        let (seen, _) = store
            .send_and_inspect(TallyAction::Bump, |s| (s.count, s.acknowledged))
            .await
            .unwrap();

        assert_eq!(seen, (1, 0));
    }

    #[tokio::test]
    async fn runaway_feedback_is_stopped() {
        let store = Store::new(TallyState::default(), TallyReducer, ());

        let result = store.send(TallyAction::Loop).await;

        assert!(matches!(result, Err(StoreError::FeedbackLimitExceeded(MAX_FEEDBACK_ACTIONS))));
    }

    #[tokio::test]
    async fn concurrent_sends_serialize_at_reducer() {
        let store = Store::new(TallyState::default(), TallyReducer, ());

        let sends = (0..50).map(|_| store.send(TallyAction::Bump));
        for result in futures::future::join_all(sends).await {
            result.unwrap();
        }

        assert_eq!(store.state(|s| s.count).await, 50);
        assert_eq!(store.state(|s| s.acknowledged).await, 50);
    }
}
