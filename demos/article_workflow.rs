//! Article Search and Publishing Workflow
//!
//! This example searches a small article table and then publishes a draft.
//!
//! Key concepts:
//! - Declared predicates and sort keys (`title_cont`, `view_count_desc`)
//! - Security policies that require certain predicates
//! - A guarded transition with history recorded per table
//! - Opt-in state details in a record's JSON
//!
//! Run with: cargo run --example article_workflow

use concernkit::search::{SearchOptions, Searchable};
use concernkit::serialize::{to_json, SerializeOptions};
use concernkit::state::{HistoryRegistry, StateMachine, Stateable, TransitionBuilder, TransitionOptions};
use concernkit::store::{MemoryStore, Record, SemanticType, TableSchema};
use concernkit::{state_enum, State, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

state_enum! {
    enum ArticleState {
        Draft => "draft",
        Published => "published",
    }
}

#[derive(Serialize)]
struct Article {
    id: u64,
    title: String,
    view_count: i64,
    #[serde(skip)]
    state: ArticleState,
}

impl Record for Article {
    fn field(&self, name: &str) -> Value {
        match name {
            "title" => Value::from(self.title.as_str()),
            "view_count" => Value::Int(self.view_count),
            "state" => Value::from(self.state.name()),
            _ => Value::Null,
        }
    }
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

fn article(id: u64, title: &str, view_count: i64) -> Article {
    Article {
        id,
        title: title.to_string(),
        view_count,
        state: ArticleState::Draft,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Article Search and Publishing ===\n");

    let schema = TableSchema::new("articles")
        .column("title", SemanticType::Text)
        .column("view_count", SemanticType::Integer)
        .column("state", SemanticType::Text);
    let searchable = Searchable::builder(Arc::new(schema))
        .predicates(["title", "view_count", "state"])?
        .sort(["title", "view_count"])?
        .security("published_only", ["state_eq"])?
        .default_order(["view_count_desc"])
        .build()?;

    let store = MemoryStore::with_rows(
        "articles",
        vec![
            article(1, "Ruby on Rails", 120),
            article(2, "Rust ownership", 340),
            article(3, "Python tips", 80),
        ],
    );

    println!("Step 1: Search titles containing \"R\"");
    let predicates = BTreeMap::from([("title_cont".to_string(), Value::from("R"))]);
    let query = searchable.search(predicates, &SearchOptions::new().paginate(1, 10))?;
    println!("  Query: {query}");
    for found in store.fetch(&query) {
        println!("  - {} ({} views)", found.title, found.view_count);
    }
    println!();

    println!("Step 2: Search under the published_only policy without a state filter");
    let unscoped = BTreeMap::from([("title_cont".to_string(), Value::from("R"))]);
    match searchable.search(unscoped, &SearchOptions::new().security("published_only")) {
        Ok(_) => println!("  unexpected: query allowed"),
        Err(err) => println!("  ✓ rejected: {err}"),
    }
    println!();

    let machine = StateMachine::<Article>::builder()
        .initial(ArticleState::Draft)
        .state(ArticleState::Published)
        .transition(
            TransitionBuilder::<Article>::new("publish")
                .from(ArticleState::Draft)
                .to(ArticleState::Published)
                .guard_if(|a: &Article| !a.title.trim().is_empty()),
        )?
        .transitions_table("article_transitions")
        .build()?;

    let registry = HistoryRegistry::new();
    let history = registry.model_for(machine.transitions_table());

    println!("Step 3: Publish article 2");
    let mut draft = article(2, "Rust ownership", 340);
    println!("  can publish: {}", machine.can_attempt(&draft, "publish"));
    let row = machine.attempt(
        &mut draft,
        "publish",
        &*history,
        TransitionOptions::new().actor("editor-1").reason("reviewed"),
    )?;
    println!("  ✓ {} -> {} by {:?}", row.from_state, row.to_state, row.actor_id);
    println!("  publish again allowed: {}\n", machine.can_attempt(&draft, "publish"));

    println!("Step 4: Serialize with state details");
    let json = to_json(&draft, &machine, Some(&*history), SerializeOptions::all())?;
    println!("  {json}");

    println!("\nKey Takeaways:");
    println!("- Only declared predicates and sort keys are accepted");
    println!("- Security policies reject under-scoped searches before compiling");
    println!("- Guards run before any state change; history is written on commit");

    println!("\n=== Example Complete ===");
    Ok(())
}
