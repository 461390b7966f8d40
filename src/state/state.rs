//! States and the records that carry them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Error type returned by user-supplied guards and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A value of a state machine's state field.
///
/// Usually generated with [`state_enum!`](crate::state_enum).
///
/// # Example
///
/// ```rust
/// use concernkit::state::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum ArticleState {
///     Draft,
///     Published,
/// }
///
/// impl State for ArticleState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Draft => "draft",
///             Self::Published => "published",
///         }
///     }
/// }
///
/// assert_eq!(ArticleState::Published.name(), "published");
/// ```
pub trait State: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name stored in history rows and used by `is_in_state`.
    fn name(&self) -> &str;
}

/// A record whose state field is driven by a [`StateMachine`](crate::state::StateMachine).
///
/// Guards that reference methods or status predicates by name resolve
/// through [`guard_method`](Stateable::guard_method) and
/// [`status`](Stateable::status); returning `None` means the record has no
/// such member.
pub trait Stateable: 'static {
    type State: State;

    fn current_state(&self) -> &Self::State;

    fn set_state(&mut self, state: Self::State);

    /// Record type name written to history rows.
    fn owner_type(&self) -> &str;

    fn owner_id(&self) -> String;

    fn guard_method(&self, _name: &str) -> Option<Result<bool, BoxError>> {
        None
    }

    fn status(&self, _name: &str) -> Option<bool> {
        None
    }
}
