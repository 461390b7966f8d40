//! Transition engine: `attempt`, `can_attempt` and state introspection.
//!
//! `attempt` runs in a fixed sequence: source-state check, guards in
//! declared order, validations, before callbacks, state change and commit,
//! then after callbacks. Nothing is mutated until every check has passed.
//! `can_attempt` shares the source-state and guard checks but collapses any
//! failure to `false`.

use crate::state::error::{FieldError, TransitionError};
use crate::state::guard::GuardFailure;
use crate::state::history::TransitionRecord;
use crate::state::machine::{StateMachine, TransitionDef};
use crate::state::state::{BoxError, State, Stateable};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Caller-supplied details recorded with a transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionOptions {
    pub metadata: BTreeMap<String, JsonValue>,
    pub actor_id: Option<String>,
    pub reason: Option<String>,
}

impl TransitionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// What callbacks see about the transition in progress.
#[derive(Clone, Debug)]
pub struct TransitionContext<S: State> {
    pub event: String,
    pub from: S,
    pub to: S,
    pub options: TransitionOptions,
    pub started_at: DateTime<Utc>,
}

/// Persists a state change and its history row as one unit.
///
/// Implementations are expected to be atomic: either the record and the
/// history row are both stored, or neither is.
pub trait TransitionStore<R: Stateable> {
    fn commit(&self, record: &R, transition: &TransitionRecord) -> Result<(), BoxError>;
}

impl<R: Stateable> StateMachine<R> {
    /// True when the record is currently in the state named `name`.
    pub fn is_in_state(&self, record: &R, name: &str) -> bool {
        record.current_state().name() == name
    }

    /// Run `event` against the record and commit it through `store`.
    ///
    /// # Errors
    ///
    /// Guard, validation and before-callback failures leave the record and
    /// the store untouched. A failed commit restores the source state.
    /// After-callback failures are reported with the state already committed.
    pub fn attempt(
        &self,
        record: &mut R,
        event: &str,
        store: &dyn TransitionStore<R>,
        options: TransitionOptions,
    ) -> Result<TransitionRecord, TransitionError> {
        let transition = self.lookup(event)?;
        self.check(&*record, transition)?;
        validate(&*record, transition)?;

        let from = record.current_state().clone();
        let context = TransitionContext {
            event: transition.event.clone(),
            from: from.clone(),
            to: transition.to.clone(),
            options,
            started_at: Utc::now(),
        };

        for callback in &transition.before {
            if let Err(source) = callback(record, &context) {
                restore(record, &from);
                return Err(TransitionError::BeforeCallback {
                    event: transition.event.clone(),
                    source,
                });
            }
        }

        record.set_state(transition.to.clone());
        let row = history_row(&*record, &context);
        if let Err(source) = store.commit(&*record, &row) {
            restore(record, &from);
            warn!(
                event = %row.event,
                owner_type = %row.owner_type,
                owner_id = %row.owner_id,
                error = %source,
                "transition commit failed, state restored"
            );
            return Err(TransitionError::Persistence {
                event: row.event,
                source,
            });
        }

        info!(
            event = %row.event,
            from = %row.from_state,
            to = %row.to_state,
            owner_type = %row.owner_type,
            owner_id = %row.owner_id,
            "transition committed"
        );

        for callback in &transition.after {
            if let Err(source) = callback(record, &context) {
                warn!(
                    event = %row.event,
                    error = %source,
                    "after callback failed; transition stays committed"
                );
                return Err(TransitionError::AfterCallback {
                    record: Box::new(row),
                    source,
                });
            }
        }

        Ok(row)
    }

    /// Whether `event` would pass its source-state and guard checks.
    /// Never mutates and never fails; guard errors count as `false`.
    pub fn can_attempt(&self, record: &R, event: &str) -> bool {
        self.lookup(event)
            .and_then(|transition| self.check(record, transition))
            .is_ok()
    }

    /// Events that can currently be attempted, in declaration order.
    pub fn available_events(&self, record: &R) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|transition| self.check(record, transition).is_ok())
            .map(|transition| transition.event.as_str())
            .collect()
    }

    fn lookup(&self, event: &str) -> Result<&TransitionDef<R>, TransitionError> {
        self.transition(event)
            .ok_or_else(|| TransitionError::UnknownEvent {
                event: event.to_string(),
                available: self.events().into_iter().map(str::to_string).collect(),
            })
    }

    /// Source-state check followed by guards in declared order. The first
    /// guard that fails stops evaluation.
    fn check(&self, record: &R, transition: &TransitionDef<R>) -> Result<(), TransitionError> {
        let current = record.current_state();
        if !transition.allows_from(current) {
            return Err(TransitionError::InvalidTransition {
                event: transition.event.clone(),
                from: current.name().to_string(),
                to: transition.to.name().to_string(),
            });
        }

        for guard in &transition.guards {
            match guard.resolve(record) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        event = %transition.event,
                        guard = %guard.describe(),
                        "guard rejected transition"
                    );
                    return Err(TransitionError::CheckFailed {
                        event: transition.event.clone(),
                        from: current.name().to_string(),
                        to: transition.to.name().to_string(),
                        guard: guard.describe(),
                    });
                }
                Err(GuardFailure::Raised(source)) => {
                    return Err(TransitionError::GuardRaised {
                        event: transition.event.clone(),
                        source,
                    })
                }
                Err(GuardFailure::Missing { kind, name }) => {
                    return Err(TransitionError::MissingMember {
                        event: transition.event.clone(),
                        kind,
                        name,
                    })
                }
            }
        }
        Ok(())
    }
}

fn validate<R: Stateable>(record: &R, transition: &TransitionDef<R>) -> Result<(), TransitionError> {
    let results: Vec<_> = transition
        .validations
        .iter()
        .map(|check| check(record))
        .collect();

    match Validation::all_vec(results) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(TransitionError::ValidationFailed {
            event: transition.event.clone(),
            errors: errors.into_vec(),
        }),
    }
}

fn restore<R: Stateable>(record: &mut R, from: &R::State) {
    if record.current_state() != from {
        record.set_state(from.clone());
    }
}

fn history_row<R: Stateable>(record: &R, context: &TransitionContext<R::State>) -> TransitionRecord {
    TransitionRecord {
        id: Uuid::new_v4(),
        owner_type: record.owner_type().to_string(),
        owner_id: record.owner_id(),
        event: context.event.clone(),
        from_state: context.from.name().to_string(),
        to_state: context.to.name().to_string(),
        metadata: context.options.metadata.clone(),
        actor_id: context.options.actor_id.clone(),
        reason: context.options.reason.clone(),
        occurred_at: Utc::now(),
    }
}

/// Convenience for validations that report a single field error.
pub fn field_error(field: &str, message: &str) -> Validation<(), NonEmptyVec<FieldError>> {
    Validation::fail(FieldError::new(field, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::machine::TransitionBuilder;
    use crate::state_enum;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    state_enum! {
        enum PostState {
            Draft => "draft",
            Review => "review",
            Published => "published",
        }
    }

    #[derive(Debug)]
    struct Post {
        id: u32,
        state: PostState,
        title: String,
        body: String,
        published_at: Option<DateTime<Utc>>,
    }

    impl Stateable for Post {
        type State = PostState;

        fn current_state(&self) -> &PostState {
            &self.state
        }

        fn set_state(&mut self, state: PostState) {
            self.state = state;
        }

        fn owner_type(&self) -> &str {
            "Post"
        }

        fn owner_id(&self) -> String {
            self.id.to_string()
        }

        fn guard_method(&self, name: &str) -> Option<Result<bool, BoxError>> {
            match name {
                "has_body" => Some(Ok(!self.body.is_empty())),
                _ => None,
            }
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        rows: Mutex<Vec<TransitionRecord>>,
        fail: bool,
    }

    impl TransitionStore<Post> for RecordingStore {
        fn commit(&self, _record: &Post, transition: &TransitionRecord) -> Result<(), BoxError> {
            if self.fail {
                return Err("disk full".into());
            }
            self.rows.lock().unwrap().push(transition.clone());
            Ok(())
        }
    }

    impl RecordingStore {
        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    fn post() -> Post {
        Post {
            id: 1,
            state: PostState::Draft,
            title: "Hello".into(),
            body: "World".into(),
            published_at: None,
        }
    }

    fn machine_with(publish: TransitionBuilder<Post>) -> StateMachine<Post> {
        StateMachine::<Post>::builder()
            .initial(PostState::Draft)
            .states([PostState::Review, PostState::Published])
            .transition(
                TransitionBuilder::new("submit")
                    .from(PostState::Draft)
                    .to(PostState::Review),
            )
            .unwrap()
            .transition(publish)
            .unwrap()
            .build()
            .unwrap()
    }

    fn publish() -> TransitionBuilder<Post> {
        TransitionBuilder::new("publish")
            .from_any([PostState::Draft, PostState::Review])
            .to(PostState::Published)
    }

    #[test]
    fn successful_attempt_commits_one_row() {
        let machine = machine_with(publish().before(|post: &mut Post, _ctx| {
            post.published_at = Some(Utc::now());
            Ok(())
        }));
        let store = RecordingStore::default();
        let mut post = post();

        let row = machine
            .attempt(
                &mut post,
                "publish",
                &store,
                TransitionOptions::new()
                    .actor("editor-9")
                    .reason("ready")
                    .metadata("source", "cms"),
            )
            .unwrap();

        assert_eq!(post.state, PostState::Published);
        assert!(post.published_at.is_some());
        assert!(machine.is_in_state(&post, "published"));
        assert_eq!(store.len(), 1);
        assert_eq!(row.from_state, "draft");
        assert_eq!(row.to_state, "published");
        assert_eq!(row.owner_id, "1");
        assert_eq!(row.actor_id.as_deref(), Some("editor-9"));
        assert_eq!(row.metadata["source"], "cms");
    }

    #[test]
    fn wrong_source_state_is_rejected() {
        let machine = machine_with(publish());
        let store = RecordingStore::default();
        let mut post = post();
        post.state = PostState::Published;

        let err = machine
            .attempt(&mut post, "publish", &store, TransitionOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition { ref from, ref to, .. }
                if from == "published" && to == "published"
        ));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn guards_stop_at_first_failure() {
        let third_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&third_calls);
        let machine = machine_with(
            publish()
                .guard_if(|_| true)
                .guard_if(|post: &Post| post.title.is_empty())
                .guard_if(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }),
        );
        let store = RecordingStore::default();
        let mut post = post();

        let err = machine
            .attempt(&mut post, "publish", &store, TransitionOptions::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::CheckFailed { .. }));
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
        assert_eq!(post.state, PostState::Draft);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn raising_guard_propagates_but_can_attempt_says_false() {
        let machine =
            machine_with(publish().guard_try(|_| Err::<bool, BoxError>("lookup failed".into())));
        let store = RecordingStore::default();
        let mut post = post();

        assert!(!machine.can_attempt(&post, "publish"));
        match machine.attempt(&mut post, "publish", &store, TransitionOptions::new()) {
            Err(TransitionError::GuardRaised { source, .. }) => {
                assert_eq!(source.to_string(), "lookup failed")
            }
            other => panic!("expected GuardRaised, got {other:?}"),
        }
    }

    #[test]
    fn missing_guard_method_is_reported() {
        let machine = machine_with(publish().guard_method("is_approved"));
        let store = RecordingStore::default();
        let mut post = post();

        let err = machine
            .attempt(&mut post, "publish", &store, TransitionOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::MissingMember { ref name, .. } if name == "is_approved"
        ));
        assert!(!machine.can_attempt(&post, "publish"));
    }

    #[test]
    fn validations_report_every_error() {
        let machine = machine_with(
            publish()
                .guard_method("has_body")
                .require("title", "is too short", |post: &Post| post.title.len() > 10)
                .validate(|post: &Post| {
                    if post.body.len() > 100 {
                        Validation::success(())
                    } else {
                        field_error("body", "is too short")
                    }
                }),
        );
        let store = RecordingStore::default();
        let mut post = post();

        match machine.attempt(&mut post, "publish", &store, TransitionOptions::new()) {
            Err(TransitionError::ValidationFailed { errors, .. }) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "title");
                assert_eq!(errors[1].field, "body");
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
        assert_eq!(post.state, PostState::Draft);
        assert_eq!(store.len(), 0);
        assert!(machine.can_attempt(&post, "publish"));
    }

    #[test]
    fn before_callback_failure_leaves_state_unchanged() {
        let machine = machine_with(publish().before(|post: &mut Post, _ctx| {
            post.set_state(PostState::Review);
            Err("not today".into())
        }));
        let store = RecordingStore::default();
        let mut post = post();

        let err = machine
            .attempt(&mut post, "publish", &store, TransitionOptions::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::BeforeCallback { .. }));
        assert_eq!(post.state, PostState::Draft);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn commit_failure_restores_state() {
        let machine = machine_with(publish());
        let store = RecordingStore {
            fail: true,
            ..RecordingStore::default()
        };
        let mut post = post();

        let err = machine
            .attempt(&mut post, "publish", &store, TransitionOptions::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Persistence { .. }));
        assert_eq!(post.state, PostState::Draft);
    }

    #[test]
    fn after_callback_failure_keeps_the_commit() {
        let machine = machine_with(publish().after(|_post: &mut Post, ctx| {
            Err(format!("notify failed for {}", ctx.event).into())
        }));
        let store = RecordingStore::default();
        let mut post = post();

        let err = machine
            .attempt(&mut post, "publish", &store, TransitionOptions::new())
            .unwrap_err();
        assert!(err.is_committed());
        assert_eq!(post.state, PostState::Published);
        assert_eq!(store.len(), 1);
        match err {
            TransitionError::AfterCallback { record, .. } => {
                assert_eq!(record.to_state, "published")
            }
            other => panic!("expected AfterCallback, got {other:?}"),
        }
    }

    #[test]
    fn available_events_follow_state_and_guards() {
        let machine = machine_with(publish().guard_if(|post: &Post| post.title.len() > 10));
        let mut post = post();
        assert_eq!(machine.available_events(&post), vec!["submit"]);

        post.title = "A much longer title".into();
        assert_eq!(machine.available_events(&post), vec!["submit", "publish"]);

        post.state = PostState::Published;
        assert!(machine.available_events(&post).is_empty());
    }

    #[test]
    fn unknown_events_list_alternatives() {
        let machine = machine_with(publish());
        let store = RecordingStore::default();
        let mut post = post();

        match machine.attempt(&mut post, "retract", &store, TransitionOptions::new()) {
            Err(TransitionError::UnknownEvent { available, .. }) => {
                assert_eq!(available, vec!["submit".to_string(), "publish".to_string()])
            }
            other => panic!("expected UnknownEvent, got {other:?}"),
        }
        assert!(!machine.can_attempt(&post, "retract"));
    }
}
