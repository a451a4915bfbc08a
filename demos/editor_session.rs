//! Transition editor walkthrough.
//!
//! This example demonstrates:
//! - Loading configuration and installing tracing
//! - Opening the configured workflow store
//! - Seeding the default board workflow
//! - Editing one state's transitions through the staged editor
//! - Rendering the transition table and a DOT diagram
//! - Observing workflow events
//!
//! Run with: `cargo run --example editor_session`
//! Use `HEDDLE_LOGGING__JSON=true` for JSON logs.

use heddle::{
    open_store, seed, telemetry, to_dot, HeddleConfig, Result, TransitionEditor,
    TransitionTable, WorkflowEvent,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = HeddleConfig::load()?;
    telemetry::init_tracing(&config.logging)?;

    println!("Heddle editor session example\n");

    let mut store = open_store(&config.store).await?;

    let workflow_id = "board-1";
    let mut workflow = match config.load_workflow(&*store, workflow_id).await {
        Ok(workflow) => workflow,
        Err(heddle::HeddleError::WorkflowNotFound(_)) => {
            println!("Seeding default workflow '{}'", workflow_id);
            let seeded = seed::default_workflow(workflow_id)?.definition();
            let workflow = config
                .workflow_builder(workflow_id)
                .definition(seeded)
                .build()?;
            workflow.save(&mut *store).await?;
            workflow
        }
        Err(e) => return Err(e),
    };

    let mut events = workflow.subscribe();

    println!("\nBefore:\n{}", TransitionTable::project(&workflow));

    // In review may only go back to To Do or forward to In Progress.
    let mut editor = TransitionEditor::new();
    let session = editor.open(&workflow, "in_review")?;
    println!(
        "Editing '{}': candidates {:?}, all selected: {}",
        workflow.label(session.from()),
        session.candidates(),
        session.all_selected()
    );
    if session.is_selected("done") {
        editor.toggle("done")?;
    }
    let commit = editor.commit(&mut workflow)?;
    workflow.persist_outgoing(&mut *store, &commit.from).await?;

    // Done becomes terminal.
    if !editor.open(&workflow, "done")?.all_selected() {
        editor.toggle_all()?;
    }
    editor.toggle_all()?;
    let commit = editor.commit(&mut workflow)?;
    workflow.persist_outgoing(&mut *store, &commit.from).await?;

    while let Ok(event) = events.try_recv() {
        match event {
            WorkflowEvent::TransitionsReplaced { from, to, .. } => {
                println!("[Event] '{}' now moves to {:?}", from, to);
            }
            other => println!("[Event] {:?}", other),
        }
    }

    println!("\nAfter:\n{}", TransitionTable::project(&workflow));
    println!("Terminal states: {:?}", workflow.terminal_states());
    println!("Reachable from To Do: {:?}\n", workflow.reachable_from("todo")?);
    println!("{}", to_dot(&workflow));

    Ok(())
}
