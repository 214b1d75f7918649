//! Engine tests over on-disk package fixtures.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;
use trellis_core::error::ResolverError;
use trellis_core::manifest::PackageManifest;

use super::*;
use crate::pipeline::{PluginPipeline, Stage, StageResult};
use crate::stages::ResolvedStage;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Resolved {
        name: String,
        depth: usize,
        ancestry: Vec<String>,
    },
    Updated {
        name: String,
        depth: usize,
        ancestry: Vec<String>,
    },
    Post,
    Write,
}

/// Test stage recording every hook invocation into a shared log
struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    fn new() -> (Self, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl Stage for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn resolver(
        &mut self,
        pack: &PackageManifest,
        _project_dir: &Path,
        depth: usize,
        ancestry: &[String],
    ) -> StageResult {
        self.events.borrow_mut().push(Event::Resolved {
            name: pack.name.clone(),
            depth,
            ancestry: ancestry.to_vec(),
        });
        Ok(())
    }

    fn updater(&mut self, pack: &PackageManifest, depth: usize, ancestry: &[String]) -> StageResult {
        self.events.borrow_mut().push(Event::Updated {
            name: pack.name.clone(),
            depth,
            ancestry: ancestry.to_vec(),
        });
        Ok(())
    }

    fn post_resolver(&mut self, _root: &PackageManifest, _output_dir: &Path) -> StageResult {
        self.events.borrow_mut().push(Event::Post);
        Ok(())
    }

    fn writer(&mut self, _root: &PackageManifest, _output_dir: &Path) -> StageResult {
        self.events.borrow_mut().push(Event::Write);
        Ok(())
    }
}

/// Stage whose resolver hook fails on a chosen package
struct FailOn(&'static str);

impl Stage for FailOn {
    fn name(&self) -> &'static str {
        "fail-on"
    }

    fn resolver(
        &mut self,
        pack: &PackageManifest,
        _project_dir: &Path,
        _depth: usize,
        _ancestry: &[String],
    ) -> StageResult {
        if pack.name == self.0 {
            return Err(format!("refusing {}", pack.name).into());
        }
        Ok(())
    }
}

fn write_pack(dir: &Path, text: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("package.json"), text).unwrap();
}

/// workspace/
///   app/                   pluggable app depending on lib
///   app/node_modules/lib/
///   app-plugin-x/          plugin sibling, also depending on lib
fn plugin_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "dependencies": {"lib": "^1.0.0"},
            "build": {"type": "app", "pluggable": true}}"#,
    );
    write_pack(
        &tmp.path().join("app/node_modules/lib"),
        r#"{"name": "lib", "version": "1.2.0"}"#,
    );
    write_pack(
        &tmp.path().join("app-plugin-x"),
        r#"{"name": "app-plugin-x", "version": "1.0.0",
            "dependencies": {"app": "^1.0.0", "lib": "^1.0.0"},
            "build": {"type": "plugin"}}"#,
    );
    tmp
}

async fn run(start: &Path) -> (ResolutionEngine, Rc<RefCell<Vec<Event>>>) {
    let (recorder, events) = Recorder::new();
    let pipeline = PluginPipeline::new().register(Box::new(recorder));
    let mut engine = ResolutionEngine::new(pipeline);
    engine.resolve(start).await.unwrap();
    (engine, events)
}

#[tokio::test]
async fn test_plugin_scenario_resolver_once_updater_on_revisit() {
    let tmp = plugin_fixture();
    let (engine, events) = run(&tmp.path().join("app")).await;

    let names: Vec<String> = engine.resolved().keys().cloned().collect();
    assert_eq!(names, vec!["app", "app-plugin-x", "lib"]);

    let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
    assert_eq!(
        *events.borrow(),
        vec![
            Event::Resolved {
                name: "app".into(),
                depth: 0,
                ancestry: s(&["app"]),
            },
            Event::Resolved {
                name: "lib".into(),
                depth: 1,
                ancestry: s(&["app", "lib"]),
            },
            Event::Resolved {
                name: "app-plugin-x".into(),
                depth: 1,
                ancestry: s(&["app", "app-plugin-x"]),
            },
            Event::Updated {
                name: "app".into(),
                depth: 2,
                ancestry: s(&["app", "app-plugin-x", "app"]),
            },
            Event::Updated {
                name: "lib".into(),
                depth: 2,
                ancestry: s(&["app", "app-plugin-x", "lib"]),
            },
        ]
    );
}

#[tokio::test]
async fn test_resolving_twice_is_deterministic() {
    let tmp = plugin_fixture();
    let (engine_a, events_a) = run(&tmp.path().join("app")).await;
    let (engine_b, events_b) = run(&tmp.path().join("app")).await;

    assert_eq!(engine_a.resolved(), engine_b.resolved());
    assert_eq!(*events_a.borrow(), *events_b.borrow());
}

#[tokio::test]
async fn test_diamond_resolver_once_updaters_for_remaining_reaches() {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "dependencies": {"lib-a": "^1.0.0", "lib-b": "^1.0.0", "lib-c": "^2.0.0"},
            "build": {"type": "app"}}"#,
    );
    for side in ["lib-a", "lib-b"] {
        write_pack(
            &tmp.path().join("app/node_modules").join(side),
            &format!(
                r#"{{"name": "{side}", "version": "1.0.0",
                    "dependencies": {{"lib-c": "^2.0.0"}}, "build": {{}}}}"#
            ),
        );
    }
    write_pack(
        &tmp.path().join("app/node_modules/lib-c"),
        r#"{"name": "lib-c", "version": "2.1.0"}"#,
    );

    let (_, events) = run(&tmp.path().join("app")).await;

    let resolver_calls = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::Resolved { name, .. } if name == "lib-c"))
        .count();
    let updater_calls = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::Updated { name, .. } if name == "lib-c"))
        .count();

    // three reach attempts: one resolver call, the rest updaters
    assert_eq!(resolver_calls, 1);
    assert_eq!(updater_calls, 2);
}

#[tokio::test]
async fn test_conflicting_requirement_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "dependencies": {"lib": "^1.0.0", "consumer": "^1.0.0"},
            "build": {"type": "app"}}"#,
    );
    write_pack(
        &tmp.path().join("app/node_modules/lib"),
        r#"{"name": "lib", "version": "1.2.0"}"#,
    );
    write_pack(
        &tmp.path().join("app/node_modules/consumer"),
        r#"{"name": "consumer", "version": "1.0.0",
            "dependencies": {"lib": "^2.0.0"}, "build": {}}"#,
    );

    let mut engine = ResolutionEngine::new(PluginPipeline::new());
    let err = engine.resolve(&tmp.path().join("app")).await.unwrap_err();

    assert!(matches!(
        err,
        ResolverError::DependencyConflict {
            ref dependent,
            ref dependency,
            ref requested,
            ref resolved,
        } if dependent == "consumer"
            && dependency == "lib"
            && requested == "^2.0.0"
            && resolved == "1.2.0"
    ));
}

#[tokio::test]
async fn test_unvalidatable_requirement_keeps_existing_resolution() {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "dependencies": {"lib": "^1.0.0", "consumer": "^1.0.0"},
            "build": {"type": "app"}}"#,
    );
    write_pack(
        &tmp.path().join("app/node_modules/lib"),
        r#"{"name": "lib", "version": "1.2.0"}"#,
    );
    write_pack(
        &tmp.path().join("app/node_modules/consumer"),
        r#"{"name": "consumer", "version": "1.0.0",
            "dependencies": {"lib": "git+ssh://git@example.com/lib.git"},
            "build": {}}"#,
    );

    let (engine, events) = run(&tmp.path().join("app")).await;

    assert_eq!(engine.resolved().get("lib").unwrap().to_string(), "1.2.0");
    assert!(events
        .borrow()
        .iter()
        .any(|e| matches!(e, Event::Updated { name, .. } if name == "lib")));
}

#[tokio::test]
async fn test_missing_dependency_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "dependencies": {"ghost": "^1.0.0"},
            "build": {"type": "app"}}"#,
    );

    let mut engine = ResolutionEngine::new(PluginPipeline::new());
    let err = engine.resolve(&tmp.path().join("app")).await.unwrap_err();

    assert!(matches!(
        err,
        ResolverError::PackageNotFound { ref name } if name == "ghost"
    ));
}

#[tokio::test]
async fn test_sibling_without_dependency_declaration_not_resolved() {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "build": {"type": "app", "pluggable": true}}"#,
    );
    write_pack(
        &tmp.path().join("app-plugin-y"),
        r#"{"name": "app-plugin-y", "version": "1.0.0"}"#,
    );

    let (engine, _) = run(&tmp.path().join("app")).await;
    assert!(!engine.resolved().contains_key("app-plugin-y"));
}

#[tokio::test]
async fn test_config_sibling_resolved_after_plugins() {
    let tmp = TempDir::new().unwrap();
    write_pack(
        &tmp.path().join("app"),
        r#"{"name": "app", "version": "1.0.0",
            "build": {"type": "app", "pluggable": true}}"#,
    );
    write_pack(
        &tmp.path().join("app-plugin-x"),
        r#"{"name": "app-plugin-x", "version": "1.0.0",
            "dependencies": {"app": "^1.0.0"},
            "build": {"type": "plugin"}}"#,
    );
    write_pack(
        &tmp.path().join("app-config-dev"),
        r#"{"name": "app-config-dev", "version": "1.0.0",
            "build": {"type": "config"}}"#,
    );

    let (engine, events) = run(&tmp.path().join("app")).await;

    assert!(engine.resolved().contains_key("app-plugin-x"));
    assert!(engine.resolved().contains_key("app-config-dev"));

    let order: Vec<String> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            Event::Resolved { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec!["app", "app-plugin-x", "app-config-dev"]);
}

#[tokio::test]
async fn test_post_resolvers_then_writers_in_registration_order() {
    let tmp = plugin_fixture();
    let out = TempDir::new().unwrap();

    let (mut engine, events) = run(&tmp.path().join("app")).await;
    engine.run_post_resolvers(out.path()).unwrap();
    engine.run_writers(out.path()).unwrap();

    let tail: Vec<Event> = events.borrow().iter().rev().take(2).rev().cloned().collect();
    assert_eq!(tail, vec![Event::Post, Event::Write]);
}

#[tokio::test]
async fn test_stage_failure_aborts_with_stage_error() {
    let tmp = plugin_fixture();

    let pipeline = PluginPipeline::new().register(Box::new(FailOn("lib")));
    let mut engine = ResolutionEngine::new(pipeline);
    let err = engine.resolve(&tmp.path().join("app")).await.unwrap_err();

    match err {
        ResolverError::Stage { stage, source } => {
            assert_eq!(stage, "fail-on");
            assert!(source.to_string().contains("refusing lib"));
        },
        other => panic!("expected stage error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolved_stage_writes_rank_ordered_index() {
    let tmp = plugin_fixture();
    let out = TempDir::new().unwrap();

    let pipeline = PluginPipeline::new().register(Box::new(ResolvedStage::new()));
    let mut engine = ResolutionEngine::new(pipeline);
    engine.resolve(&tmp.path().join("app")).await.unwrap();
    engine.run_post_resolvers(out.path()).unwrap();
    engine.run_writers(out.path()).unwrap();

    let text = fs::read_to_string(out.path().join("resolved.json")).unwrap();
    let listing: serde_json::Value = serde_json::from_str(&text).unwrap();
    let entries = listing.as_array().unwrap();

    // lib was first reached directly (Base, depth 1); the later reach via
    // the plugin must not demote it
    let lib = entries
        .iter()
        .find(|e| e["name"] == "lib")
        .expect("lib entry");
    assert_eq!(lib["group"], "Base");
    assert_eq!(lib["depth"], 1);

    let names: Vec<&str> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["lib", "app", "app-plugin-x"]);
}
