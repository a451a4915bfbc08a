//! Integration tests for the heddle workflow editor.
//!
//! These tests exercise the full flow end to end:
//! - Seeding the default board workflow
//! - Editing transitions through the staged editor
//! - Table and diagram projection
//! - Event streaming
//! - Persistence (Memory and SQLite)

use heddle::{
    seed, HeddleError, MemoryWorkflowStore, RowTarget, State, StatusCategory, TransitionEditor,
    TransitionTable, Workflow, WorkflowEvent, WorkflowStore,
};

fn todo_row_targets(table: &TransitionTable) -> Vec<RowTarget> {
    table.rows_from("todo").map(|r| r.target.clone()).collect()
}

#[test]
fn test_seed_todo_renders_all() {
    let workflow = seed::default_workflow("board").unwrap();
    let table = TransitionTable::project(&workflow);

    assert_eq!(todo_row_targets(&table), vec![RowTarget::All]);
    assert_eq!(table.len(), 4); // every source collapses to one row
}

#[test]
fn test_replace_outgoing_breaks_all_row() {
    let mut workflow = seed::default_workflow("board").unwrap();
    workflow.replace_outgoing("todo", ["done"]).unwrap();

    assert_eq!(workflow.outgoing_of("todo"), vec!["done"]);
    let table = TransitionTable::project(&workflow);
    assert_eq!(
        todo_row_targets(&table),
        vec![RowTarget::State {
            key: "done".to_string(),
            label: "Done".to_string(),
        }]
    );
}

#[test]
fn test_editor_prefills_and_commits() {
    let mut workflow = seed::default_workflow("board").unwrap();
    let mut editor = TransitionEditor::new();

    let session = editor.open(&workflow, "in_review").unwrap();
    assert_eq!(session.candidates(), &["todo", "in_progress", "done"]);
    assert_eq!(session.selection(), vec!["todo", "in_progress", "done"]);
    assert!(session.all_selected());

    assert!(!editor.toggle("done").unwrap());
    assert!(!editor.session().unwrap().all_selected());

    let commit = editor.commit(&mut workflow).unwrap();
    assert_eq!(commit.from, "in_review");
    assert_eq!(commit.to, vec!["todo", "in_progress"]);
    assert!(!editor.is_open());
    assert_eq!(workflow.outgoing_of("in_review"), vec!["todo", "in_progress"]);

    let table = TransitionTable::project(&workflow);
    let in_review: Vec<&str> = table
        .rows_from("in_review")
        .map(|r| r.target.label())
        .collect();
    assert_eq!(in_review, vec!["To Do", "In Progress"]);
}

#[test]
fn test_terminal_state_has_no_row() {
    let mut workflow = seed::default_workflow("board").unwrap();
    workflow.replace_outgoing("done", Vec::<String>::new()).unwrap();

    assert!(workflow.outgoing_of("done").is_empty());
    assert_eq!(workflow.terminal_states(), vec!["done"]);

    let table = TransitionTable::project(&workflow);
    assert_eq!(table.rows_from("done").count(), 0);
}

#[test]
fn test_cancel_leaves_workflow_untouched() {
    let mut workflow = seed::default_workflow("board").unwrap();
    let before = workflow.definition();

    let mut editor = TransitionEditor::new();
    editor.open(&workflow, "todo").unwrap();
    editor.toggle_all().unwrap();
    editor.cancel().unwrap();

    assert_eq!(workflow.definition(), before);
    assert!(matches!(
        editor.commit(&mut workflow),
        Err(HeddleError::EditorClosed)
    ));
}

#[test]
fn test_commit_after_source_removed_is_rejected() {
    let mut workflow = seed::default_workflow("board").unwrap();
    let mut editor = TransitionEditor::new();
    editor.open(&workflow, "in_review").unwrap();

    let removed = workflow.remove_state("in_review").unwrap();
    assert_eq!(removed, 6);
    let before = workflow.definition();

    let result = editor.commit(&mut workflow);
    assert!(matches!(result, Err(HeddleError::StateNotFound(k)) if k == "in_review"));
    assert!(!editor.is_open());
    assert_eq!(workflow.definition(), before);
}

#[test]
fn test_unknown_key_falls_back_to_empty_label() {
    let workflow = seed::default_workflow("board").unwrap();
    assert!(workflow.find_state("archived").is_none());
    assert_eq!(workflow.label("archived"), "");
}

#[test]
fn test_events_follow_edits() {
    let mut workflow = seed::default_workflow("board").unwrap();
    let mut events = workflow.subscribe();

    let mut editor = TransitionEditor::new();
    editor.open(&workflow, "todo").unwrap();
    editor.toggle("in_review").unwrap();
    editor.commit(&mut workflow).unwrap();

    workflow
        .add_state(State::new("archived", "Archived", StatusCategory::Done, 4))
        .unwrap();
    workflow.remove_state("archived").unwrap();

    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }

    assert_eq!(collected.len(), 3);
    match &collected[0] {
        WorkflowEvent::TransitionsReplaced { from, to, .. } => {
            assert_eq!(from, "todo");
            assert_eq!(to, &vec!["in_progress".to_string(), "done".to_string()]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(collected[1], WorkflowEvent::StateAdded { .. }));
    assert!(matches!(
        collected[2],
        WorkflowEvent::StateRemoved {
            removed_transitions: 0,
            ..
        }
    ));
    assert!(collected.iter().all(|e| e.workflow_id() == "board"));
}

#[test]
fn test_json_round_trip() {
    let mut workflow = seed::default_workflow("board").unwrap();
    workflow.replace_outgoing("done", ["todo"]).unwrap();

    let json = workflow.to_json().unwrap();
    let restored = Workflow::from_json("board", &json).unwrap();
    assert_eq!(restored.definition(), workflow.definition());
}

#[tokio::test]
async fn test_editor_session_with_memory_store() {
    let mut store = MemoryWorkflowStore::new();
    seed::default_workflow("board")
        .unwrap()
        .save(&mut store)
        .await
        .unwrap();

    let mut workflow = Workflow::load(&store, "board").await.unwrap();
    let mut editor = TransitionEditor::new();
    editor.open(&workflow, "in_review").unwrap();
    editor.toggle("done").unwrap();
    let commit = editor.commit(&mut workflow).unwrap();

    store
        .replace_outgoing(&commit.workflow_id, &commit.from, &commit.to)
        .await
        .unwrap();

    let reloaded = Workflow::load(&store, "board").await.unwrap();
    assert_eq!(reloaded.outgoing_of("in_review"), vec!["todo", "in_progress"]);
    assert_eq!(reloaded.definition(), workflow.definition());
}

#[tokio::test]
async fn test_persist_outgoing_matches_in_memory() {
    let mut store = MemoryWorkflowStore::new();
    let mut workflow = seed::default_workflow("board").unwrap();
    workflow.save(&mut store).await.unwrap();

    workflow.replace_outgoing("todo", ["done"]).unwrap();
    workflow.persist_outgoing(&mut store, "todo").await.unwrap();

    let reloaded = Workflow::load(&store, "board").await.unwrap();
    assert_eq!(reloaded.definition(), workflow.definition());
}

#[tokio::test]
async fn test_load_unknown_workflow() {
    let store = MemoryWorkflowStore::new();
    let result = Workflow::load(&store, "missing").await;
    assert!(matches!(result, Err(HeddleError::WorkflowNotFound(_))));
}

#[tokio::test]
#[cfg(feature = "sqlite")]
async fn test_editor_session_with_sqlite_store() {
    use heddle::SqliteWorkflowStore;

    let mut store = SqliteWorkflowStore::open_in_memory()
        .await
        .expect("sqlite store should open");
    seed::default_workflow("board")
        .unwrap()
        .save(&mut store)
        .await
        .unwrap();

    let mut workflow = Workflow::load(&store, "board").await.unwrap();
    let mut editor = TransitionEditor::new();
    editor.open(&workflow, "done").unwrap();
    editor.toggle_all().unwrap();
    editor.commit(&mut workflow).unwrap();
    workflow.persist_outgoing(&mut store, "done").await.unwrap();

    let reloaded = Workflow::load(&store, "board").await.unwrap();
    assert!(reloaded.outgoing_of("done").is_empty());
    assert_eq!(reloaded.definition(), workflow.definition());

    let table = TransitionTable::project(&reloaded);
    assert_eq!(table.rows_from("done").count(), 0);
}
