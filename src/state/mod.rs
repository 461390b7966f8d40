//! Guarded state machines with persisted transition history.
//!
//! # Example
//!
//! ```rust
//! use concernkit::state::{
//!     HistoryRegistry, StateMachine, Stateable, TransitionBuilder, TransitionOptions,
//! };
//! use concernkit::state_enum;
//!
//! state_enum! {
//!     pub enum ArticleState {
//!         Draft => "draft",
//!         Published => "published",
//!     }
//! }
//!
//! struct Article {
//!     id: u64,
//!     title: String,
//!     state: ArticleState,
//! }
//!
//! impl Stateable for Article {
//!     type State = ArticleState;
//!     fn current_state(&self) -> &ArticleState { &self.state }
//!     fn set_state(&mut self, state: ArticleState) { self.state = state; }
//!     fn owner_type(&self) -> &str { "Article" }
//!     fn owner_id(&self) -> String { self.id.to_string() }
//! }
//!
//! let machine = StateMachine::<Article>::builder()
//!     .initial(ArticleState::Draft)
//!     .state(ArticleState::Published)
//!     .transition(
//!         TransitionBuilder::new("publish")
//!             .from(ArticleState::Draft)
//!             .to(ArticleState::Published)
//!             .guard_if(|a: &Article| !a.title.trim().is_empty()),
//!     )?
//!     .build()?;
//!
//! let registry = HistoryRegistry::new();
//! let history = registry.model_for(machine.transitions_table());
//!
//! let mut article = Article { id: 1, title: "Hello".into(), state: machine.initial_state().clone() };
//! assert!(machine.can_attempt(&article, "publish"));
//! machine.attempt(&mut article, "publish", &*history, TransitionOptions::new())?;
//! assert!(machine.is_in_state(&article, "published"));
//! assert_eq!(history.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod error;
pub mod guard;
pub mod history;
pub mod machine;
mod macros;
pub mod registry;
#[allow(clippy::module_inception)]
pub mod state;

pub use engine::{field_error, TransitionContext, TransitionOptions, TransitionStore};
pub use error::{BuildError, FieldError, MemberKind, TransitionError};
pub use guard::{GuardFailure, GuardSpec};
pub use history::{HistoryQuery, TransitionHistory, TransitionRecord};
pub use machine::{
    StateMachine, StateMachineBuilder, TransitionBuilder, TransitionDef, DEFAULT_TRANSITIONS_TABLE,
};
pub use registry::{HistoryModel, HistoryRegistry};
pub use state::{BoxError, State, Stateable};
