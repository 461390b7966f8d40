//! End-to-end scenarios across search and state transitions.

use concernkit::search::{Params, SearchError, SearchOptions, Searchable};
use concernkit::state::{
    HistoryQuery, HistoryRegistry, StateMachine, Stateable, TransitionBuilder, TransitionError,
    TransitionOptions,
};
use concernkit::store::{MemoryStore, SemanticType, TableSchema};
use concernkit::{state_enum, ErrorCategory, Reportable, Value};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

type Row = BTreeMap<String, Value>;

fn article_row(title: &str, status: &str, views: i64) -> Row {
    BTreeMap::from([
        ("title".to_string(), Value::from(title)),
        ("status".to_string(), Value::from(status)),
        ("view_count".to_string(), Value::Int(views)),
    ])
}

fn article_search() -> Searchable {
    let schema = TableSchema::new("articles")
        .column("title", SemanticType::Text)
        .column("status", SemanticType::Text)
        .column("view_count", SemanticType::Integer);
    Searchable::builder(Arc::new(schema))
        .predicates(["title", "status", "view_count"])
        .unwrap()
        .sort(["title", "view_count"])
        .unwrap()
        .default_order(["view_count_desc"])
        .build()
        .unwrap()
}

#[test]
fn contains_predicate_filters_rows() {
    let searchable = article_search();
    let store = MemoryStore::with_rows(
        "articles",
        vec![
            article_row("Ruby on Rails", "published", 10),
            article_row("Python", "published", 20),
        ],
    );

    let predicates = BTreeMap::from([("title_cont".to_string(), Value::from("Ruby"))]);
    let query = searchable.search(predicates, &SearchOptions::new()).unwrap();
    let found = store.fetch(&query);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], Value::from("Ruby on Rails"));
}

#[test]
fn oversized_page_is_clamped() {
    let searchable = article_search();
    let store = MemoryStore::with_rows(
        "articles",
        (0..150)
            .map(|i| article_row(&format!("Post {i}"), "published", i))
            .collect(),
    );

    let options = SearchOptions::from_json(&json!({"pagination": {"page": 1, "per_page": 1000}}))
        .unwrap();
    let query = searchable.search(Params::new(BTreeMap::new()).permit(), &options).unwrap();

    assert_eq!(query.limit_value(), Some(100));
    assert_eq!(query.offset_value(), None);
    let rows = store.fetch(&query);
    assert_eq!(rows.len(), 100);
    assert_eq!(rows[0]["view_count"], Value::Int(149));
}

#[test]
fn or_groups_return_the_union() {
    let searchable = article_search();
    let store = MemoryStore::with_rows(
        "articles",
        vec![
            article_row("Ruby", "draft", 1),
            article_row("Rust", "published", 2),
            article_row("Go", "archived", 3),
        ],
    );

    let params = Params::from_json(json!({
        "or": [
            {"title_eq": "Ruby"},
            {"status_eq": "published"}
        ]
    }))
    .unwrap()
    .permit();
    let query = searchable
        .search(params, &SearchOptions::new().orders(["title_asc"]))
        .unwrap();

    let titles: Vec<&Value> = store.fetch(&query).into_iter().map(|r| &r["title"]).collect();
    assert_eq!(titles, vec![&Value::from("Ruby"), &Value::from("Rust")]);
}

#[test]
fn unpermitted_params_are_rejected_before_compiling() {
    let searchable = article_search();
    let params = Params::from_json(json!({"title_cont": "Ruby"})).unwrap();

    let err = searchable.search(params, &SearchOptions::new()).unwrap_err();
    assert_eq!(
        err,
        SearchError::UnpermittedParameters {
            keys: vec!["title_cont".to_string()]
        }
    );
}

#[test]
fn unknown_predicate_lists_alternatives() {
    let searchable = article_search();
    let predicates = BTreeMap::from([("author_eq".to_string(), Value::from("ann"))]);

    let err = searchable.search(predicates, &SearchOptions::new()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidPredicate);
    match err {
        SearchError::InvalidPredicate { key, available } => {
            assert_eq!(key, "author_eq");
            assert!(available.contains(&"title_cont".to_string()));
        }
        other => panic!("expected InvalidPredicate, got {other:?}"),
    }
}

state_enum! {
    enum ArticleState {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

struct Article {
    id: u64,
    title: String,
    state: ArticleState,
}

impl Stateable for Article {
    type State = ArticleState;

    fn current_state(&self) -> &ArticleState {
        &self.state
    }

    fn set_state(&mut self, state: ArticleState) {
        self.state = state;
    }

    fn owner_type(&self) -> &str {
        "Article"
    }

    fn owner_id(&self) -> String {
        self.id.to_string()
    }
}

fn article_machine() -> StateMachine<Article> {
    StateMachine::<Article>::builder()
        .initial(ArticleState::Draft)
        .states([ArticleState::Published, ArticleState::Archived])
        .transition(
            TransitionBuilder::<Article>::new("publish")
                .from(ArticleState::Draft)
                .to(ArticleState::Published)
                .guard_if(|a: &Article| !a.title.trim().is_empty()),
        )
        .unwrap()
        .transition(
            TransitionBuilder::<Article>::new("archive")
                .from_any([ArticleState::Draft, ArticleState::Published])
                .to(ArticleState::Archived),
        )
        .unwrap()
        .transitions_table("article_transitions")
        .build()
        .unwrap()
}

#[test]
fn failing_guard_leaves_state_and_history_untouched() {
    let machine = article_machine();
    let registry = HistoryRegistry::new();
    let history = registry.model_for(machine.transitions_table());
    let mut article = Article {
        id: 1,
        title: "   ".into(),
        state: ArticleState::Draft,
    };

    let err = machine
        .attempt(&mut article, "publish", &*history, TransitionOptions::new())
        .unwrap_err();

    assert!(matches!(err, TransitionError::CheckFailed { .. }));
    assert_eq!(err.category(), ErrorCategory::CheckFailed);
    assert_eq!(article.state, ArticleState::Draft);
    assert!(history.is_empty());
}

#[test]
fn publishing_twice_is_an_invalid_transition() {
    let machine = article_machine();
    let registry = HistoryRegistry::new();
    let history = registry.model_for(machine.transitions_table());
    let mut article = Article {
        id: 2,
        title: "Hello".into(),
        state: ArticleState::Draft,
    };

    let record = machine
        .attempt(
            &mut article,
            "publish",
            &*history,
            TransitionOptions::new().actor("editor-7").reason("ready"),
        )
        .unwrap();
    assert_eq!(record.from_state, "draft");
    assert_eq!(record.to_state, "published");
    assert_eq!(record.actor_id.as_deref(), Some("editor-7"));

    let err = machine
        .attempt(&mut article, "publish", &*history, TransitionOptions::new())
        .unwrap_err();
    match err {
        TransitionError::InvalidTransition { event, from, .. } => {
            assert_eq!(event, "publish");
            assert_eq!(from, "published");
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert_eq!(history.len(), 1);
}

#[test]
fn history_follows_the_record_through_its_lifecycle() {
    let machine = article_machine();
    let registry = HistoryRegistry::new();
    let history = registry.model_for(machine.transitions_table());
    let mut article = Article {
        id: 3,
        title: "Lifecycle".into(),
        state: machine.initial_state().clone(),
    };

    for event in ["publish", "archive"] {
        machine
            .attempt(&mut article, event, &*history, TransitionOptions::new())
            .unwrap();
    }

    let trail = history.history_for("Article", "3");
    assert_eq!(trail.path(), vec!["draft", "published", "archived"]);
    assert_eq!(
        history
            .query(&HistoryQuery::new().for_owner("Article", "3").event("archive"))
            .len(),
        1
    );
    assert!(machine.available_events(&article).is_empty());
}

#[test]
fn concurrent_lookups_share_one_history_model() {
    let registry = Arc::new(HistoryRegistry::new());
    let barrier = Arc::new(Barrier::new(10));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.model_for("foo_transitions").id()
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(registry.created_count(), 1);
}
