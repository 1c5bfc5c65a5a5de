use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_categories() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;

    // predefined categories only
    let (status_code, categories) = helper::list_categories(&mut app, &access_token).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(
        Some(vec![
            "Personal".to_string(),
            "Work".to_string(),
            "Study".to_string(),
            "Ideas".to_string(),
            "To-Do".to_string(),
        ]),
        categories
    );

    // create category, name is trimmed
    let (status_code, name, _) =
        helper::maybe_create_category(&mut app, &access_token, " Travel ").await;
    assert_eq!(StatusCode::CREATED, status_code);
    assert_eq!(Some("Travel".to_string()), name);

    let (_, categories) = helper::list_categories(&mut app, &access_token).await;
    assert_eq!(Some(&"Travel".to_string()), categories.unwrap().last());

    // create it again
    let (status_code, _, error) =
        helper::maybe_create_category(&mut app, &access_token, "Travel").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Category already exists".to_string()), error);

    // invalid names
    let (status_code, _, error) =
        helper::maybe_create_category(&mut app, &access_token, "Work").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Category is predefined".to_string()), error);

    let (status_code, _, error) =
        helper::maybe_create_category(&mut app, &access_token, "All").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Category name is reserved".to_string()), error);

    let (status_code, _, error) =
        helper::maybe_create_category(&mut app, &access_token, "  ").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Category name can not be empty".to_string()), error);

    // categories are per user
    let other_access_token = helper::sign_up_and_login(&mut app, "grace").await;
    let (_, categories) = helper::list_categories(&mut app, &other_access_token).await;
    assert!(!categories.unwrap().contains(&"Travel".to_string()));
}

#[tokio::test]
async fn test_delete_category_reassigns_notes() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::sign_up_and_login(&mut app, "ada").await;
    let other_access_token = helper::sign_up_and_login(&mut app, "grace").await;

    helper::maybe_create_category(&mut app, &access_token, "Travel").await;
    helper::maybe_create_category(&mut app, &other_access_token, "Travel").await;

    let trip = helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "Trip", "category": "Travel" }),
    )
    .await;
    let flight = helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "Flight", "category": "Travel" }),
    )
    .await;
    let work = helper::create_note(
        &mut app,
        &access_token,
        json!({ "title": "Report", "category": "Work" }),
    )
    .await;
    let other = helper::create_note(
        &mut app,
        &other_access_token,
        json!({ "title": "Other", "category": "Travel" }),
    )
    .await;

    // predefined categories can not be deleted, nothing changes
    let (status_code, _, error) =
        helper::maybe_delete_category(&mut app, &access_token, "Work").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Category is predefined".to_string()), error);

    let (_, note) = helper::single_note(&mut app, &access_token, &work.id).await;
    assert_eq!(Some("Work".to_string()), note.unwrap().category);

    // delete user category
    let (status_code, reassigned, _) =
        helper::maybe_delete_category(&mut app, &access_token, "Travel").await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some(2), reassigned);

    for id in [trip.id, flight.id] {
        let (_, note) = helper::single_note(&mut app, &access_token, &id).await;
        assert_eq!(Some("Uncategorized".to_string()), note.unwrap().category);
    }

    let (_, note) = helper::single_note(&mut app, &access_token, &work.id).await;
    assert_eq!(Some("Work".to_string()), note.unwrap().category);

    // notes of another user with the same category are untouched
    let (_, note) = helper::single_note(&mut app, &other_access_token, &other.id).await;
    assert_eq!(Some("Travel".to_string()), note.unwrap().category);

    let titles =
        helper::visible_titles(&mut app, &access_token, "category=Uncategorized").await;
    assert_eq!(vec!["Trip", "Flight"], titles);

    // gone
    let (_, categories) = helper::list_categories(&mut app, &access_token).await;
    assert!(!categories.unwrap().contains(&"Travel".to_string()));

    let (status_code, _, error) =
        helper::maybe_delete_category(&mut app, &access_token, "Travel").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Category not found".to_string()), error);
}
