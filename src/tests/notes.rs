use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::query::DisplayPolicy;
use crate::tests::helper;

#[tokio::test]
async fn test_notes() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    // verify empty note list
    let (status_code, notes, _) = helper::list_notes(&mut app, &access_token, "").await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some(Vec::<helper::Note>::new()), notes);

    // create note without any fields, defaults are applied
    let note = helper::create_note(&mut app, &access_token, json!({})).await;
    assert_eq!("Untitled".to_string(), note.title);
    assert_eq!("#ffffff".to_string(), note.color);
    assert_eq!(String::new(), note.text);
    assert_eq!(None, note.category);
    assert_eq!(None, note.folder_id);
    assert!(note.tags.is_empty());
    assert!(!note.is_pinned);
    assert!(!note.is_archived);

    // create note with markup, the markup is sanitized
    let note = helper::create_note(
        &mut app,
        &access_token,
        json!({
            "title": "Groceries",
            "text": r#"<p onclick="steal()">Milk</p><script>steal()</script>"#,
            "category": "Personal",
            "tags": ["shop", "shop", " food "],
        }),
    )
    .await;
    assert_eq!("Groceries".to_string(), note.title);
    assert_eq!("<p>Milk</p>".to_string(), note.text);
    assert_eq!(Some("Personal".to_string()), note.category);
    assert_eq!(vec!["shop".to_string(), "food".to_string()], note.tags);

    // verify note
    let (status_code, fetched) = helper::single_note(&mut app, &access_token, &note.id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some(&note), fetched.as_ref());

    // update note, untouched fields are kept
    let (status_code, updated) = helper::maybe_update_note(
        &mut app,
        &access_token,
        &note.id,
        json!({ "text": "<p>Milk and eggs</p>", "color": "#fff475" }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let updated = updated.unwrap();
    assert_eq!("<p>Milk and eggs</p>".to_string(), updated.text);
    assert_eq!("#fff475".to_string(), updated.color);
    assert_eq!("Groceries".to_string(), updated.title);
    assert_eq!(Some("Personal".to_string()), updated.category);

    // clear the category with an explicit null
    let (status_code, updated) = helper::maybe_update_note(
        &mut app,
        &access_token,
        &note.id,
        json!({ "category": null, "title": "" }),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let updated = updated.unwrap();
    assert_eq!(None, updated.category);
    assert_eq!("Untitled".to_string(), updated.title);

    // toggle pinned, twice
    let (status_code, toggled) =
        helper::maybe_toggle_note(&mut app, &access_token, &note.id, "pin").await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(toggled.unwrap().is_pinned);
    let (_, toggled) = helper::maybe_toggle_note(&mut app, &access_token, &note.id, "pin").await;
    assert!(!toggled.unwrap().is_pinned);

    // toggle archived
    let (status_code, toggled) =
        helper::maybe_toggle_note(&mut app, &access_token, &note.id, "archive").await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(toggled.unwrap().is_archived);

    // delete note
    let status_code = helper::maybe_delete_note(&mut app, &access_token, &note.id).await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);

    // verify deleted note
    let (status_code, _) = helper::single_note(&mut app, &access_token, &note.id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let status_code = helper::maybe_delete_note(&mut app, &access_token, &note.id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}

#[tokio::test]
async fn test_visible_notes() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "A", "text": "shopping list", "category": "Work" }),
    )
    .await;
    helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "B", "text": "plan trip", "category": "Travel", "isPinned": true }),
    )
    .await;
    helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "C", "text": "old", "category": "Work", "isArchived": true }),
    )
    .await;

    // pinned first, archived excluded
    let titles = helper::visible_titles(&mut app, &access_token, "").await;
    assert_eq!(vec!["B", "A"], titles);

    let titles =
        helper::visible_titles(&mut app, &access_token, "view=all&category=All&search=").await;
    assert_eq!(vec!["B", "A"], titles);

    let titles = helper::visible_titles(&mut app, &access_token, "view=all&category=Work").await;
    assert_eq!(vec!["A"], titles);

    let titles = helper::visible_titles(&mut app, &access_token, "search=trip").await;
    assert_eq!(vec!["B"], titles);

    let titles = helper::visible_titles(&mut app, &access_token, "search=TRIP").await;
    assert_eq!(vec!["B"], titles);

    let titles = helper::visible_titles(&mut app, &access_token, "view=archived").await;
    assert_eq!(vec!["C"], titles);

    let titles = helper::visible_titles(&mut app, &access_token, "view=starred").await;
    assert_eq!(vec!["B"], titles);

    // category is case-sensitive
    let titles = helper::visible_titles(&mut app, &access_token, "category=work").await;
    assert!(titles.is_empty());

    // unknown view
    let (status_code, _, error) =
        helper::list_notes(&mut app, &access_token, "view=trash").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some(r#"Unknown view "trash""#.to_string()), error);

    // malformed folder
    let (status_code, _, error) =
        helper::list_notes(&mut app, &access_token, "folder=not-a-uuid").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Invalid query parameter".to_string()), error);
}

#[tokio::test]
async fn test_empty_notes_policy() {
    // shown by default
    let mut app = helper::setup_test_app().await;
    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    helper::create_note(&mut app, &access_token, json!({ "title": "Empty" })).await;
    helper::create_note(&mut app, &access_token, json!({ "title": "Full", "text": "x" })).await;

    let titles = helper::visible_titles(&mut app, &access_token, "").await;
    assert_eq!(vec!["Empty", "Full"], titles);

    // hidden when configured
    let mut app = helper::setup_test_app_with_policy(DisplayPolicy {
        hide_empty_text: true,
    })
    .await;
    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    let empty = helper::create_note(&mut app, &access_token, json!({ "title": "Empty" })).await;
    helper::create_note(&mut app, &access_token, json!({ "title": "Full", "text": "x" })).await;

    let titles = helper::visible_titles(&mut app, &access_token, "").await;
    assert_eq!(vec!["Full"], titles);

    // still stored and reachable
    let (status_code, _) = helper::single_note(&mut app, &access_token, &empty.id).await;
    assert_eq!(StatusCode::OK, status_code);
}

#[tokio::test]
async fn test_notes_of_other_users() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;
    let other_access_token = helper::sign_up_and_login(&mut app, "grace").await;

    let note = helper::create_note(&mut app, &access_token, json!({ "title": "Mine" })).await;

    // not listed
    let titles = helper::visible_titles(&mut app, &other_access_token, "").await;
    assert!(titles.is_empty());

    // not reachable on any note route
    let (status_code, _) = helper::single_note(&mut app, &other_access_token, &note.id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::maybe_update_note(
        &mut app,
        &other_access_token,
        &note.id,
        json!({ "title": "Theirs" }),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) =
        helper::maybe_toggle_note(&mut app, &other_access_token, &note.id, "pin").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) =
        helper::maybe_toggle_note(&mut app, &other_access_token, &note.id, "archive").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let status_code = helper::maybe_delete_note(&mut app, &other_access_token, &note.id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    // untouched for the owner
    let (status_code, fetched) = helper::single_note(&mut app, &access_token, &note.id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some(note), fetched);
}

#[tokio::test]
async fn test_invalid_note_ids() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    let (status_code, _, error) =
        helper::single_note_with_str(&mut app, &access_token, "not-a-uuid").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Invalid path parameter".to_string(), error.unwrap().error);

    let (status_code, _) = helper::single_note(&mut app, &access_token, &Uuid::new_v4()).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}

#[tokio::test]
async fn test_notes_in_folders() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    let (_, folder, _) = helper::maybe_create_folder(&mut app, &access_token, "Recipes").await;
    let folder = folder.unwrap();

    let note = helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "Soup", "folderId": folder.id }),
    )
    .await;
    assert_eq!(Some(folder.id), note.folder_id);
    helper::create_note(&mut app, &access_token, json!({ "title": "Loose" })).await;

    let titles =
        helper::visible_titles(&mut app, &access_token, &format!("folder={}", folder.id)).await;
    assert_eq!(vec!["Soup"], titles);

    // unknown folder
    let (status_code, _, error) = helper::maybe_create_note(
        &mut app,
        &access_token,
        json!({ "title": "Lost", "folderId": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Folder not found".to_string()), error);

    // move out of the folder
    let (status_code, updated) =
        helper::maybe_update_note(&mut app, &access_token, &note.id, json!({ "folderId": null }))
            .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(None, updated.unwrap().folder_id);
}
