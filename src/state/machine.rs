//! Transition table declaration.
//!
//! A [`StateMachine`] is built once per record type and frozen: states,
//! the initial state and every transition keyed by event name.

use crate::state::engine::TransitionContext;
use crate::state::error::{BuildError, FieldError};
use crate::state::guard::GuardSpec;
use crate::state::state::{BoxError, State, Stateable};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Default name of the per-machine history table.
pub const DEFAULT_TRANSITIONS_TABLE: &str = "state_transitions";

pub type ValidationCheck<R> =
    Arc<dyn Fn(&R) -> Validation<(), NonEmptyVec<FieldError>> + Send + Sync>;

pub type Callback<R> = Arc<
    dyn Fn(&mut R, &TransitionContext<<R as Stateable>::State>) -> Result<(), BoxError>
        + Send
        + Sync,
>;

/// One declared transition.
pub struct TransitionDef<R: Stateable> {
    pub(crate) event: String,
    pub(crate) from: Vec<R::State>,
    pub(crate) to: R::State,
    pub(crate) guards: Vec<GuardSpec<R>>,
    pub(crate) validations: Vec<ValidationCheck<R>>,
    pub(crate) before: Vec<Callback<R>>,
    pub(crate) after: Vec<Callback<R>>,
}

impl<R: Stateable> TransitionDef<R> {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn from_states(&self) -> &[R::State] {
        &self.from
    }

    pub fn to_state(&self) -> &R::State {
        &self.to
    }

    pub fn guards(&self) -> &[GuardSpec<R>] {
        &self.guards
    }

    pub fn allows_from(&self, state: &R::State) -> bool {
        self.from.contains(state)
    }
}

impl<R: Stateable> fmt::Debug for TransitionDef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionDef")
            .field("event", &self.event)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("guards", &self.guards)
            .field("validations", &self.validations.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

/// Builder for a single transition.
///
/// # Example
///
/// ```rust
/// use concernkit::state::{Stateable, TransitionBuilder};
/// use concernkit::state_enum;
///
/// state_enum! {
///     pub enum ArticleState {
///         Draft => "draft",
///         Published => "published",
///     }
/// }
///
/// struct Article {
///     state: ArticleState,
///     title: String,
/// }
///
/// impl Stateable for Article {
///     type State = ArticleState;
///     fn current_state(&self) -> &ArticleState { &self.state }
///     fn set_state(&mut self, state: ArticleState) { self.state = state; }
///     fn owner_type(&self) -> &str { "Article" }
///     fn owner_id(&self) -> String { "1".into() }
/// }
///
/// let publish = TransitionBuilder::<Article>::new("publish")
///     .from(ArticleState::Draft)
///     .to(ArticleState::Published)
///     .guard_if(|a| !a.title.trim().is_empty())
///     .build()
///     .unwrap();
/// assert_eq!(publish.event(), "publish");
/// ```
pub struct TransitionBuilder<R: Stateable> {
    event: String,
    from: Vec<R::State>,
    to: Option<R::State>,
    guards: Vec<GuardSpec<R>>,
    validations: Vec<ValidationCheck<R>>,
    before: Vec<Callback<R>>,
    after: Vec<Callback<R>>,
}

impl<R: Stateable> TransitionBuilder<R> {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            from: Vec::new(),
            to: None,
            guards: Vec::new(),
            validations: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Add a source state. May be called repeatedly.
    pub fn from(mut self, state: R::State) -> Self {
        if !self.from.contains(&state) {
            self.from.push(state);
        }
        self
    }

    pub fn from_any<I>(self, states: I) -> Self
    where
        I: IntoIterator<Item = R::State>,
    {
        states.into_iter().fold(self, Self::from)
    }

    pub fn to(mut self, state: R::State) -> Self {
        self.to = Some(state);
        self
    }

    /// Add a guard. Guards run in the order they were added.
    pub fn guard(mut self, guard: GuardSpec<R>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn guard_if<F>(self, check: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.guard(GuardSpec::block(check))
    }

    pub fn guard_try<F>(self, check: F) -> Self
    where
        F: Fn(&R) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.guard(GuardSpec::fallible(check))
    }

    pub fn guard_method(self, name: impl Into<String>) -> Self {
        self.guard(GuardSpec::method(name))
    }

    pub fn guard_predicate(self, name: impl Into<String>) -> Self {
        self.guard(GuardSpec::predicate(name))
    }

    /// Add a validation. Every validation runs and all errors are reported.
    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&R) -> Validation<(), NonEmptyVec<FieldError>> + Send + Sync + 'static,
    {
        self.validations.push(Arc::new(check));
        self
    }

    /// Validation that records `message` on `field` when `check` is false.
    pub fn require<F>(self, field: &str, message: &str, check: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        let error = FieldError::new(field, message);
        self.validate(move |record| {
            if check(record) {
                Validation::success(())
            } else {
                Validation::fail(error.clone())
            }
        })
    }

    pub fn before<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut R, &TransitionContext<R::State>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(callback));
        self
    }

    pub fn after<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut R, &TransitionContext<R::State>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<TransitionDef<R>, BuildError> {
        if self.event.trim().is_empty() {
            return Err(BuildError::MissingEventName);
        }
        if self.from.is_empty() {
            return Err(BuildError::MissingFromState { event: self.event });
        }
        let Some(to) = self.to else {
            return Err(BuildError::MissingToState { event: self.event });
        };

        Ok(TransitionDef {
            event: self.event,
            from: self.from,
            to,
            guards: self.guards,
            validations: self.validations,
            before: self.before,
            after: self.after,
        })
    }
}

/// A frozen transition table for one record type.
pub struct StateMachine<R: Stateable> {
    pub(crate) states: Vec<R::State>,
    pub(crate) initial: R::State,
    pub(crate) transitions: Vec<TransitionDef<R>>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) table: String,
}

impl<R: Stateable> StateMachine<R> {
    pub fn builder() -> StateMachineBuilder<R> {
        StateMachineBuilder::new()
    }

    /// State assigned to newly created records.
    pub fn initial_state(&self) -> &R::State {
        &self.initial
    }

    pub fn states(&self) -> &[R::State] {
        &self.states
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(State::name).collect()
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|s| s.name() == name)
    }

    /// Event names in declaration order.
    pub fn events(&self) -> Vec<&str> {
        self.transitions.iter().map(|t| t.event.as_str()).collect()
    }

    pub fn transition(&self, event: &str) -> Option<&TransitionDef<R>> {
        self.index.get(event).map(|&i| &self.transitions[i])
    }

    pub fn transitions_table(&self) -> &str {
        &self.table
    }
}

impl<R: Stateable> fmt::Debug for StateMachine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.state_names())
            .field("initial", &self.initial.name())
            .field("events", &self.events())
            .field("table", &self.table)
            .finish()
    }
}

/// Builder for constructing state machines with a fluent API.
pub struct StateMachineBuilder<R: Stateable> {
    states: Vec<R::State>,
    initial: Vec<R::State>,
    transitions: Vec<TransitionDef<R>>,
    table: String,
}

impl<R: Stateable> StateMachineBuilder<R> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            initial: Vec::new(),
            transitions: Vec::new(),
            table: DEFAULT_TRANSITIONS_TABLE.to_string(),
        }
    }

    /// Declare a state. Declaring a state twice is a no-op.
    pub fn state(mut self, state: R::State) -> Self {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
        self
    }

    pub fn states<I>(self, states: I) -> Self
    where
        I: IntoIterator<Item = R::State>,
    {
        states.into_iter().fold(self, Self::state)
    }

    /// Declare a state and mark it initial.
    pub fn initial(mut self, state: R::State) -> Self {
        if !self.initial.contains(&state) {
            self.initial.push(state.clone());
        }
        self.state(state)
    }

    /// Add a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder<R>) -> Result<Self, BuildError> {
        let transition = builder.build()?;
        self.transitions.push(transition);
        Ok(self)
    }

    pub fn transitions_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Validate the declarations and freeze the machine.
    pub fn build(self) -> Result<StateMachine<R>, BuildError> {
        let mut initial = self.initial;
        let initial = match initial.len() {
            0 => return Err(BuildError::MissingInitialState),
            1 => initial.remove(0),
            _ => {
                return Err(BuildError::MultipleInitialStates {
                    states: initial.iter().map(|s| s.name().to_string()).collect(),
                })
            }
        };

        if self.transitions.is_empty() {
            return Err(BuildError::NoTransitions);
        }
        if self.table.trim().is_empty() {
            return Err(BuildError::MissingTableName);
        }

        let mut index = HashMap::with_capacity(self.transitions.len());
        for (i, transition) in self.transitions.iter().enumerate() {
            let undeclared = transition
                .from
                .iter()
                .chain(std::iter::once(&transition.to))
                .find(|state| !self.states.contains(state));
            if let Some(state) = undeclared {
                return Err(BuildError::UndeclaredState {
                    event: transition.event.clone(),
                    state: state.name().to_string(),
                });
            }
            if index.insert(transition.event.clone(), i).is_some() {
                return Err(BuildError::DuplicateEvent {
                    event: transition.event.clone(),
                });
            }
        }

        Ok(StateMachine {
            states: self.states,
            initial,
            transitions: self.transitions,
            index,
            table: self.table,
        })
    }
}

impl<R: Stateable> Default for StateMachineBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_enum;

    state_enum! {
        enum TaskState {
            Todo => "todo",
            Doing => "doing",
            Done => "done",
            Archived => "archived",
        }
    }

    struct Task {
        state: TaskState,
    }

    impl Stateable for Task {
        type State = TaskState;

        fn current_state(&self) -> &TaskState {
            &self.state
        }

        fn set_state(&mut self, state: TaskState) {
            self.state = state;
        }

        fn owner_type(&self) -> &str {
            "Task"
        }

        fn owner_id(&self) -> String {
            "1".into()
        }
    }

    fn start() -> TransitionBuilder<Task> {
        TransitionBuilder::new("start")
            .from(TaskState::Todo)
            .to(TaskState::Doing)
    }

    #[test]
    fn builder_validates_required_fields() {
        let result = StateMachine::<Task>::builder().build();
        assert!(matches!(result, Err(BuildError::MissingInitialState)));

        let result = TransitionBuilder::<Task>::new("start")
            .from(TaskState::Todo)
            .build();
        assert!(matches!(result, Err(BuildError::MissingToState { .. })));

        let result = TransitionBuilder::<Task>::new("start")
            .to(TaskState::Doing)
            .build();
        assert!(matches!(result, Err(BuildError::MissingFromState { .. })));

        let result = TransitionBuilder::<Task>::new("  ").build();
        assert!(matches!(result, Err(BuildError::MissingEventName)));
    }

    #[test]
    fn builder_requires_transitions() {
        let result = StateMachine::<Task>::builder()
            .initial(TaskState::Todo)
            .build();
        assert!(matches!(result, Err(BuildError::NoTransitions)));
    }

    #[test]
    fn exactly_one_initial_state() {
        let result = StateMachine::<Task>::builder()
            .initial(TaskState::Todo)
            .initial(TaskState::Doing)
            .transition(start())
            .unwrap()
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::MultipleInitialStates {
                states: vec!["todo".into(), "doing".into()]
            }
        );
    }

    #[test]
    fn state_references_must_resolve() {
        let result = StateMachine::<Task>::builder()
            .initial(TaskState::Todo)
            .transition(start())
            .unwrap()
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::UndeclaredState {
                event: "start".into(),
                state: "doing".into()
            }
        );
    }

    #[test]
    fn events_are_unique() {
        let result = StateMachine::<Task>::builder()
            .initial(TaskState::Todo)
            .state(TaskState::Doing)
            .transition(start())
            .unwrap()
            .transition(start())
            .unwrap()
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateEvent { .. })));
    }

    #[test]
    fn fluent_api_builds_machine() {
        let machine = StateMachine::<Task>::builder()
            .initial(TaskState::Todo)
            .states([TaskState::Doing, TaskState::Done, TaskState::Archived])
            .transition(start())
            .unwrap()
            .transition(
                TransitionBuilder::new("archive")
                    .from_any([TaskState::Todo, TaskState::Done])
                    .to(TaskState::Archived),
            )
            .unwrap()
            .transitions_table("task_transitions")
            .build()
            .unwrap();

        assert_eq!(machine.initial_state(), &TaskState::Todo);
        assert_eq!(machine.events(), vec!["start", "archive"]);
        assert_eq!(machine.state_names(), vec!["todo", "doing", "done", "archived"]);
        assert!(machine.has_state("done"));
        assert_eq!(machine.transitions_table(), "task_transitions");
        assert!(machine
            .transition("archive")
            .unwrap()
            .allows_from(&TaskState::Done));
        assert!(machine.transition("finish").is_none());
    }

    #[test]
    fn default_table_name() {
        let machine = StateMachine::<Task>::builder()
            .initial(TaskState::Todo)
            .state(TaskState::Doing)
            .transition(start())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(machine.transitions_table(), DEFAULT_TRANSITIONS_TABLE);
    }
}
