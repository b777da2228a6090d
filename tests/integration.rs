//! Integration tests for strand.
//!
//! These tests drive the public API from outside the crate: components built
//! through the engine, state writes patching text, conditional and list
//! regions, events, and app-level navigation.

use std::cell::Cell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;
use strand::error::{DeclarationError, StructuralError};
use strand::{
    App, AppConfig, EffectOptions, Engine, Error, Event, NodeId, Router, ScopeId, Setter, Value,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn todo_id(item: &Value, _: usize) -> Value {
    item.get("id").cloned().unwrap_or_default()
}

/// Renders `<li><span>{label}</span><b>done</b|><button>x</button></li>` and
/// wires the button to remove the item from `$todos`.
fn todo_item(engine: &mut Engine, item: &Value, _: usize) -> strand::Result<NodeId> {
    let id = todo_id(item, 0);
    let label = item.get("label").cloned().unwrap_or_default().to_string();
    let done = item.get("done").is_some_and(Value::is_truthy);

    let li = engine.element("li");
    let span = engine.element("span");
    let text = engine.dom_mut().create_text(&label);
    engine.append(span, text);
    engine.append(li, span);
    if done {
        let mark = engine.element("b");
        let text = engine.dom_mut().create_text("done");
        engine.append(mark, text);
        engine.append(li, mark);
    }
    let button = engine.element("button");
    let text = engine.dom_mut().create_text("x");
    engine.append(button, text);
    engine.append(li, button);

    let todos = engine.global_setter("todos")?;
    engine.on(button, "click", move |engine, _| {
        todos.update(engine, |current| {
            let kept = current
                .as_list()
                .unwrap_or_default()
                .iter()
                .filter(|todo| todo_id(todo, 0) != id)
                .cloned()
                .collect::<Vec<_>>();
            Value::List(kept)
        })?;
        Ok(())
    });
    Ok(li)
}

struct TodoPage {
    engine: Engine,
    root: NodeId,
    todos: Setter,
    filter: Setter,
}

fn todo_page() -> TodoPage {
    let mut engine = Engine::new();
    let todos = engine
        .use_global_state(
            "todos",
            Value::from(json!([
                {"id": "a", "label": "write parser", "done": true},
                {"id": "b", "label": "write tests", "done": false}
            ])),
        )
        .unwrap();
    engine.begin_render();
    let root = engine.element("section");
    let filter = engine
        .component(|e| {
            let filter = e.use_state("filter", "all")?;
            let heading = e.text("{{ $todos.length }} todos ({{ filter }})")?;
            let h1 = e.element("h1");
            e.append(h1, heading);
            e.append(root, h1);

            let ul = e.element("ul");
            let items = e.map_list_keyed("$todos", todo_id, todo_item)?;
            e.append(ul, items);
            e.append(root, ul);

            let empty = e.when("$todos.length == 0", "nothing to do", Value::Null)?;
            e.append(root, empty);
            Ok(filter)
        })
        .unwrap();
    TodoPage {
        engine,
        root,
        todos,
        filter,
    }
}

fn markup(page: &TodoPage) -> String {
    page.engine.dom().inner_markup(page.root)
}

fn buttons(page: &TodoPage) -> Vec<NodeId> {
    let dom = page.engine.dom();
    dom.walk_depth_first(page.root)
        .into_iter()
        .filter(|&n| dom.get(n).and_then(|d| d.tag()) == Some("button"))
        .collect()
}

// ---------------------------------------------------------------------------
// Todo page
// ---------------------------------------------------------------------------

#[test]
fn initial_render() {
    let page = todo_page();
    insta::assert_snapshot!(
        markup(&page),
        @r#"<h1>2 todos (all)</h1><ul><!--$todos--><li><span>write parser</span><b>done</b><button>x</button></li><li><span>write tests</span><button>x</button></li></ul>"#
    );
}

#[test]
fn adding_a_todo_patches_heading_and_list() {
    let mut page = todo_page();
    let before = buttons(&page);
    page.todos
        .update(&mut page.engine, |current| {
            let mut list = current.as_list().unwrap_or_default().to_vec();
            list.push(Value::from(json!({"id": "c", "label": "ship", "done": false})));
            Value::List(list)
        })
        .unwrap();
    let after = buttons(&page);
    assert_eq!(&after[..2], &before[..]);
    assert_eq!(after.len(), 3);
    assert!(markup(&page).starts_with("<h1>3 todos (all)</h1>"));
}

#[test]
fn click_removes_item_and_shows_empty_message() {
    let mut page = todo_page();
    let first = buttons(&page)[0];
    assert_eq!(page.engine.dispatch(Event::new("click", first)).unwrap(), 1);
    assert!(markup(&page).starts_with("<h1>1 todos (all)</h1>"));

    let last = buttons(&page)[0];
    page.engine.dispatch(Event::new("click", last)).unwrap();
    insta::assert_snapshot!(
        markup(&page),
        @"<h1>0 todos (all)</h1><ul><!--$todos--></ul>nothing to do"
    );
}

#[test]
fn toggling_done_rerenders_one_item() {
    let mut page = todo_page();
    let before = buttons(&page);
    page.todos
        .set(
            &mut page.engine,
            Value::from(json!([
                {"id": "a", "label": "write parser", "done": true},
                {"id": "b", "label": "write tests", "done": true}
            ])),
        )
        .unwrap();
    let after = buttons(&page);
    assert_eq!(after[0], before[0]);
    assert_ne!(after[1], before[1]);
    assert_eq!(markup(&page).matches("<b>done</b>").count(), 2);
}

#[test]
fn component_state_patches_only_its_slot() {
    let mut page = todo_page();
    page.filter.set(&mut page.engine, "open").unwrap();
    assert!(markup(&page).starts_with("<h1>2 todos (open)</h1>"));
    assert_eq!(page.filter.scope(), ScopeId::Component(1));
}

#[test]
fn effects_observe_patched_tree() {
    let mut page = todo_page();
    let root = page.root;
    let seen = Rc::new(Cell::new(0));
    let s = Rc::clone(&seen);
    page.engine
        .effect(
            move |engine| {
                let items = engine.dom().walk_depth_first(root).len();
                s.set(items);
                Ok(())
            },
            EffectOptions::new().depends_on("todos"),
        )
        .unwrap();
    page.todos.set(&mut page.engine, Value::from(json!([]))).unwrap();
    // section, h1, heading text, ul, anchor, empty-message text
    assert_eq!(seen.get(), 6);
}

// ---------------------------------------------------------------------------
// Contract violations
// ---------------------------------------------------------------------------

#[test]
fn list_over_non_list_state_fails() {
    let mut engine = Engine::new();
    engine.use_global_state("count", 1).unwrap();
    let err = engine
        .map_list("$count", |e, item, _| e.text(&item.to_string()))
        .unwrap_err();
    assert_eq!(
        err,
        Error::Structural(StructuralError::NotAList("$count".into()))
    );
}

#[test]
fn fragment_item_fails() {
    let mut engine = Engine::new();
    engine.use_global_state("rows", Value::from(vec![1])).unwrap();
    let err = engine
        .map_list("$rows", |e, _, _| Ok(e.dom_mut().create_fragment()))
        .unwrap_err();
    assert_eq!(err, Error::Structural(StructuralError::FragmentItem));
}

#[test]
fn reading_undeclared_global_fails() {
    let engine = Engine::new();
    assert!(matches!(
        engine.state("$ghost"),
        Err(Error::Declaration(DeclarationError::NotDeclared { .. }))
    ));
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

#[test]
fn app_navigation_keeps_global_state() {
    let router = Router::new()
        .route("/", |e: &mut Engine| {
            let n = e.use_state("n", 0)?;
            let button = e.element("button");
            let label = e.text("{{ n }} / {{ $total }}")?;
            e.append(button, label);
            let total = e.global_setter("total")?;
            e.on(button, "click", move |e, _| {
                let next = e.state("n")?.as_number().unwrap_or(0.0) + 1.0;
                n.set(e, next)?;
                total.update(e, |t| Value::from(t.as_number().unwrap_or(0.0) + 1.0))?;
                Ok(())
            });
            Ok(button)
        })
        .route("/about", |e: &mut Engine| e.text("about"));

    let mut app = App::new(AppConfig::new().with_title("counter"), router);
    app.engine.use_global_state("total", 0).unwrap();
    app.start().unwrap();

    let click = |app: &mut App| {
        let button = app.engine.dom().children(app.root())[0];
        app.engine.dispatch(Event::new("click", button)).unwrap();
    };
    click(&mut app);
    click(&mut app);
    assert_eq!(app.engine.dom().inner_markup(app.root()), "<button>2 / 2</button>");

    app.navigate("/about").unwrap();
    assert_eq!(app.engine.dom().inner_markup(app.root()), "about");
    assert!(app.engine.events().is_empty());

    app.back().unwrap();
    click(&mut app);
    assert_eq!(app.engine.dom().inner_markup(app.root()), "<button>1 / 3</button>");
}
