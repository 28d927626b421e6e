use std::{fs, path::Path};

use chrono::NaiveDate;
use focusdesk::{
    attach_image, to_blocks, App, AttachmentKind, BlockKind, BlockPatch, Commands, Config,
    DeskError, Direction, FileMedia, JsonStore, JsonTable, Note, NoteCommand, NoteEditor,
    NotePatch, NoteRepository, Table, Task, TaskDraft, TaskRepository,
};

#[test]
fn editor_session_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("whiteboard.png");
    fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();

    let store = JsonStore::open(&dir.path().join("data")).unwrap();
    let mut notes = NoteRepository::new(store.notes);
    notes.load().unwrap();

    let mut editor = NoteEditor::open(None);
    editor.title = "  Sprint planning ".to_string();
    editor.tags = "work, project-apollo,".to_string();
    let first = editor.blocks.as_slice()[0].id.clone();
    editor.blocks.update(
        &first,
        BlockPatch {
            content: Some("Agenda".to_string()),
            ..Default::default()
        },
    );
    let mut media = FileMedia::new([image]);
    attach_image(&mut media, &mut editor.blocks, 0).unwrap().unwrap();
    editor.blocks.insert_after(1, BlockKind::Text);
    let last = editor.blocks.as_slice()[2].id.clone();
    editor.blocks.update(
        &last,
        BlockPatch {
            content: Some("Owners".to_string()),
            ..Default::default()
        },
    );

    let note = notes.add(editor.draft().unwrap()).unwrap().unwrap();
    assert_eq!(note.title, "Sprint planning");
    assert_eq!(note.tags, ["work", "project-apollo"]);
    assert_eq!(note.content, "Agenda\n\nOwners");
    assert_eq!(note.attachments.len(), 1);
    assert_eq!(note.attachments[0].filename, "whiteboard.png");

    let reopened: JsonTable<_> = JsonTable::open(&dir.path().join("data")).unwrap();
    let mut notes = NoteRepository::new(reopened);
    notes.load().unwrap();
    let stored = notes.get(&note.id).unwrap();
    assert_eq!(stored, &note);

    // Text first, then the image, then the empty block to type into
    let blocks = to_blocks(stored);
    let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
    assert_eq!(kinds, [BlockKind::Text, BlockKind::Image, BlockKind::Text]);
}

#[test]
fn reordering_blocks_changes_the_saved_note() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let mut notes = NoteRepository::new(store.notes);
    notes.load().unwrap();

    let mut editor = NoteEditor::open(None);
    editor.title = "Recipe".to_string();
    let text = editor.blocks.as_slice()[0].id.clone();
    editor.blocks.update(
        &text,
        BlockPatch {
            content: Some("Whisk eggs".to_string()),
            ..Default::default()
        },
    );
    let photo = editor
        .blocks
        .insert_media_after(0, BlockKind::Image, vec![1, 2, 3], "eggs.jpg");
    let note = notes.add(editor.draft().unwrap()).unwrap().unwrap();

    let mut editor = NoteEditor::open(Some(&note));
    let image_id = editor.blocks.as_slice()[1].id.clone();
    assert_ne!(image_id, photo);
    assert!(editor.blocks.move_block(&image_id, Direction::Up));
    assert!(editor.blocks.remove(&image_id));

    let updated = notes
        .update(&note.id, NotePatch::from(editor.draft().unwrap()))
        .unwrap()
        .unwrap();
    assert!(updated.attachments.is_empty());
    assert_eq!(updated.content, "Whisk eggs");
    assert_eq!(updated.created_at, note.created_at);
}

#[test]
fn tasks_persist_and_clear_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        let mut repo = TaskRepository::new(JsonTable::<Task>::open(dir.path()).unwrap());
        repo.load().unwrap();
        repo
    };

    let mut repo = open();
    let keep = repo.add("Keep").unwrap();
    let done = repo
        .add_scheduled(TaskDraft {
            scheduled_time: Some("09:00".to_string()),
            ..TaskDraft::titled("Done")
        })
        .unwrap();
    repo.toggle(&done.id).unwrap();

    let mut repo = open();
    assert_eq!(repo.tasks().len(), 2);
    assert!(repo.tasks()[1].completed_at.is_some());
    assert_eq!(repo.clear_completed().unwrap(), 1);

    let repo = open();
    assert_eq!(repo.tasks().len(), 1);
    assert_eq!(repo.tasks()[0].id, keep.id);
}

#[test]
fn updating_a_missing_record_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut table: JsonTable<Task> = JsonTable::open(dir.path()).unwrap();
    let ghost = Task::new(TaskDraft::titled("ghost"));

    let err = table.update(&ghost.id, &ghost).unwrap_err();
    assert!(matches!(err, DeskError::NotFound { .. }));
    table.delete(&ghost.id).unwrap();
}

fn stored_notes(data_dir: &Path) -> Vec<Note> {
    let mut notes = NoteRepository::new(JsonStore::open(data_dir).unwrap().notes);
    notes.load().unwrap();
    notes.notes().to_vec()
}

/// An edit that changes nothing
fn edit(id: &str) -> NoteCommand {
    NoteCommand::Edit {
        id: id.to_string(),
        title: None,
        content: None,
        tags: None,
        image: vec![],
        audio: vec![],
        clear_attachments: false,
        remind_date: None,
        remind_time: None,
        clear_reminder: false,
    }
}

#[tokio::test]
async fn note_edit_reopens_and_saves_back() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let image = dir.path().join("receipt.png");
    let memo = dir.path().join("memo.wav");
    fs::write(&image, [1, 2, 3]).unwrap();
    fs::write(&memo, [4, 5]).unwrap();

    let config = Config {
        data_dir: data_dir.clone(),
        ..Default::default()
    };
    let mut app = App::new(config, dir.path().join("config.json"), false).unwrap();

    let add = NoteCommand::Add {
        title: "Groceries".to_string(),
        content: Some("Milk".to_string()),
        tags: Some("home".to_string()),
        image: vec![image],
        audio: vec![],
        remind_date: None,
        remind_time: None,
    };
    app.run(Commands::Note { action: add }).await.unwrap();
    let original = stored_notes(&data_dir).remove(0);

    let change = NoteCommand::Edit {
        id: original.id.clone(),
        title: Some("Weekly groceries".to_string()),
        content: Some("Milk\n\nEggs".to_string()),
        tags: None,
        image: vec![],
        audio: vec![memo],
        clear_attachments: true,
        remind_date: Some("2026-06-10".to_string()),
        remind_time: Some("9:05".to_string()),
        clear_reminder: false,
    };
    app.run(Commands::Note { action: change }).await.unwrap();

    let notes = stored_notes(&data_dir);
    assert_eq!(notes.len(), 1);
    let edited = &notes[0];
    assert_eq!(edited.id, original.id);
    assert_eq!(edited.created_at, original.created_at);
    assert_eq!(edited.title, "Weekly groceries");
    assert_eq!(edited.content, "Milk\n\nEggs");
    assert_eq!(edited.tags, ["home"]);
    assert_eq!(edited.attachments.len(), 1);
    assert_eq!(edited.attachments[0].kind, AttachmentKind::Audio);
    assert_eq!(edited.attachments[0].filename, "memo.wav");
    assert_eq!(edited.reminder_date, NaiveDate::from_ymd_opt(2026, 6, 10));
    assert_eq!(edited.reminder_time.as_deref(), Some("09:05"));

    // Untouched fields survive a second round trip through the editor
    let change = NoteCommand::Edit {
        id: original.id.clone(),
        title: None,
        content: None,
        tags: None,
        image: vec![],
        audio: vec![],
        clear_attachments: false,
        remind_date: None,
        remind_time: None,
        clear_reminder: true,
    };
    app.run(Commands::Note { action: change }).await.unwrap();

    let again = stored_notes(&data_dir).remove(0);
    assert_eq!(again.content, "Milk\n\nEggs");
    assert_eq!(again.attachments, edited.attachments);
    assert_eq!(again.reminder_date, None);
    assert_eq!(again.reminder_time, None);

    let missing = app.run(Commands::Note { action: edit("ghost") }).await;
    assert!(matches!(missing, Err(DeskError::NotFound { .. })));
}
