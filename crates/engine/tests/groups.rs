use sea_orm::Database;

use engine::{Engine, EngineError, GroupRole};
use migration::MigratorTrait;

async fn engine_with_users(usernames: &[&str]) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    for username in usernames {
        engine
            .create_user(username, "password", &format!("{username}@example.com"), None)
            .await
            .unwrap();
    }
    engine
}

#[tokio::test]
async fn create_group_enrolls_creator_as_admin() {
    let engine = engine_with_users(&["anna"]).await;

    let group = engine
        .create_group("Ski trip", Some("Dolomiti 2026"), "anna")
        .await
        .unwrap();

    let (detail, members) = engine.group_detail(&group.id, "anna").await.unwrap();
    assert_eq!(detail.name, "Ski trip");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].username, "anna");
    assert_eq!(members[0].role, GroupRole::Admin);
}

#[tokio::test]
async fn non_member_cannot_see_group() {
    let engine = engine_with_users(&["anna", "bruno"]).await;
    let group = engine.create_group("Flat", None, "anna").await.unwrap();

    let err = engine.group_detail(&group.id, "bruno").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn admin_manages_members() {
    let engine = engine_with_users(&["anna", "bruno", "carla"]).await;
    let group = engine.create_group("Flat", None, "anna").await.unwrap();

    engine
        .upsert_member(&group.id, "anna", "bruno", GroupRole::Member)
        .await
        .unwrap();
    engine
        .upsert_member(&group.id, "anna", "carla", GroupRole::Member)
        .await
        .unwrap();

    let (_, members) = engine.group_detail(&group.id, "bruno").await.unwrap();
    assert_eq!(members.len(), 3);

    // Plain members cannot manage the roster.
    let err = engine
        .upsert_member(&group.id, "bruno", "carla", GroupRole::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine
        .remove_member(&group.id, "anna", "carla")
        .await
        .unwrap();
    let (_, members) = engine.group_detail(&group.id, "anna").await.unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn member_can_leave_but_last_admin_cannot() {
    let engine = engine_with_users(&["anna", "bruno"]).await;
    let group = engine.create_group("Flat", None, "anna").await.unwrap();
    engine
        .upsert_member(&group.id, "anna", "bruno", GroupRole::Member)
        .await
        .unwrap();

    engine
        .remove_member(&group.id, "bruno", "bruno")
        .await
        .unwrap();

    let err = engine
        .remove_member(&group.id, "anna", "anna")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn last_admin_cannot_be_demoted() {
    let engine = engine_with_users(&["anna", "bruno"]).await;
    let group = engine.create_group("Flat", None, "anna").await.unwrap();
    engine
        .upsert_member(&group.id, "anna", "bruno", GroupRole::Member)
        .await
        .unwrap();

    let err = engine
        .upsert_member(&group.id, "anna", "anna", GroupRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // Promoting a second admin unlocks the demotion.
    engine
        .upsert_member(&group.id, "anna", "bruno", GroupRole::Admin)
        .await
        .unwrap();
    engine
        .upsert_member(&group.id, "anna", "anna", GroupRole::Member)
        .await
        .unwrap();
}

#[tokio::test]
async fn list_groups_returns_only_own_memberships() {
    let engine = engine_with_users(&["anna", "bruno"]).await;
    engine.create_group("Flat", None, "anna").await.unwrap();
    let shared = engine.create_group("Trip", None, "anna").await.unwrap();
    engine
        .upsert_member(&shared.id, "anna", "bruno", GroupRole::Member)
        .await
        .unwrap();
    engine.create_group("Band", None, "bruno").await.unwrap();

    let anna_groups = engine.list_groups("anna").await.unwrap();
    assert_eq!(anna_groups.len(), 2);

    let bruno_groups = engine.list_groups("bruno").await.unwrap();
    let names: Vec<&str> = bruno_groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Band", "Trip"]);
}

#[tokio::test]
async fn delete_group_is_admin_only() {
    let engine = engine_with_users(&["anna", "bruno"]).await;
    let group = engine.create_group("Flat", None, "anna").await.unwrap();
    engine
        .upsert_member(&group.id, "anna", "bruno", GroupRole::Member)
        .await
        .unwrap();

    let err = engine.delete_group(&group.id, "bruno").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine.delete_group(&group.id, "anna").await.unwrap();
    let err = engine.group_detail(&group.id, "anna").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn blank_group_name_is_rejected() {
    let engine = engine_with_users(&["anna"]).await;
    let err = engine.create_group("   ", None, "anna").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let engine = engine_with_users(&["anna"]).await;
    let err = engine
        .create_user("anna", "secret", "other@example.com", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn search_users_needs_two_chars_and_skips_caller() {
    let engine = engine_with_users(&["anna", "annalisa", "bruno"]).await;

    assert!(engine.search_users("a", "bruno").await.unwrap().is_empty());

    let found = engine.search_users("AN", "anna").await.unwrap();
    let names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["annalisa"]);
}
