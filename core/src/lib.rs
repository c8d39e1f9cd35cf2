//! # Strike Events Core
//!
//! Core traits and types shared by every Strike Events feature.
//!
//! Features are written as reducers: a pure function
//! `(State, Action, Environment) → (State, Effects)` that validates commands,
//! applies events to state and describes (but never performs) side effects.
//!
//! ## Pieces
//!
//! - **State**: Domain state for a feature (an event roster, for instance)
//! - **Action**: Commands and events accepted by a reducer
//! - **Reducer**: The business logic, see [`reducer::Reducer`]
//! - **Effect**: Side effect descriptions, see [`effect::Effect`]
//! - **Environment**: Injected dependencies such as [`environment::Clock`] and
//!   [`storage::KeyValueStore`]
//!
//! ## Example
//!
//! ```ignore
//! use strike_events_core::*;
//!
//! impl Reducer for RosterReducer {
//!     type State = RosterState;
//!     type Action = RosterAction;
//!     type Environment = RosterEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut RosterState,
//!         action: RosterAction,
//!         env: &RosterEnvironment,
//!     ) -> SmallVec<[Effect<RosterAction>; 4]> {
//!         // validate, mutate, describe effects
//!         SmallVec::new()
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Key-value persistence abstraction
pub mod storage;

/// The [`Reducer`](reducer::Reducer) trait
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// Business logic of one feature.
    ///
    /// `reduce` mutates the state in place and returns the side effects to
    /// run afterwards. It must not perform I/O itself; anything that touches
    /// the outside world goes into an [`Effect`] and everything it needs
    /// (time, storage) comes from the environment.
    pub trait Reducer {
        /// State owned by the feature
        type State;

        /// Commands and events the feature accepts
        type Action;

        /// Injected collaborators
        type Environment;

        /// Applies `action` to `state`, returning the effects to execute
        ///
        /// Most actions return no effect or one; four fit without allocating.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effects as values
///
/// The runtime executes effects after the reducer returns and feeds any
/// action they yield back into the reducer.
pub mod effect {
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;

    /// Work for the runtime to do once the reducer has returned
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Children run concurrently
        Parallel(Vec<Effect<Action>>),

        /// Children run in order, each finishing before the next starts
        Sequential(Vec<Effect<Action>>),

        /// An async computation; `Some(action)` is fed back to the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action: fmt::Debug> fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::None => f.write_str("Effect::None"),
                Self::Parallel(children) => f.debug_tuple("Effect::Parallel").field(children).finish(),
                Self::Sequential(children) => f.debug_tuple("Effect::Sequential").field(children).finish(),
                Self::Future(_) => f.write_str("Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Boxes an async block into an effect
        pub fn future<F>(future: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Self::Future(Box::pin(future))
        }

        /// Runs `children` concurrently
        #[must_use]
        pub const fn merge(children: Vec<Self>) -> Self {
            Self::Parallel(children)
        }

        /// Runs `children` one after another
        #[must_use]
        pub const fn chain(children: Vec<Self>) -> Self {
            Self::Sequential(children)
        }

        /// Whether executing this effect would do nothing
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Self::None => true,
                Self::Parallel(children) | Self::Sequential(children) => children.iter().all(Self::is_none),
                Self::Future(_) => false,
            }
        }
    }
}

/// Collaborators injected through a reducer's environment
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of the current time
    pub trait Clock: Send + Sync {
        /// The current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn nested_none_effects_are_none() {
        let effect: Effect<u8> = Effect::merge(vec![
            Effect::None,
            Effect::chain(vec![Effect::None, Effect::None]),
        ]);
        assert!(effect.is_none());
    }

    #[test]
    fn future_effect_is_not_none() {
        let effect: Effect<u8> = Effect::chain(vec![Effect::None, Effect::future(async { Some(1) })]);
        assert!(!effect.is_none());
        assert_eq!(format!("{effect:?}"), "Effect::Sequential([Effect::None, Effect::Future(<future>)])");
    }

    #[test]
    fn future_effect_yields_feedback_action() {
        let Effect::Future(fut) = Effect::<u8>::future(async { Some(7) }) else {
            unreachable!("constructor always builds a future effect");
        };
        assert_eq!(tokio_test::block_on(fut), Some(7));
    }
}
