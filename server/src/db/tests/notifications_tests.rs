//! Tests for per-user notifications

use super::*;
use crate::models::{NewNotification, NotificationKind, NotificationQuery};

fn notice(user: &User, title: &str) -> NewNotification {
    NewNotification {
        user_id: user.id.clone(),
        kind: NotificationKind::System,
        title: title.to_string(),
        message: "Body".to_string(),
        link: None,
    }
}

#[tokio::test]
async fn test_unread_tracking() {
    let db = create_test_db().await;
    let alice = create_user(&db, Role::Patient, "alice@example.com").await;
    let bob = create_user(&db, Role::Patient, "bob@example.com").await;

    let first = db.create_notification(notice(&alice, "One")).await.unwrap();
    db.create_notification(notice(&alice, "Two")).await.unwrap();
    db.create_notification(notice(&bob, "Other")).await.unwrap();

    assert_eq!(db.count_unread_notifications(&alice.id).await.unwrap(), 2);

    // Another user's notification is not visible
    assert!(db
        .mark_notification_read(&first.id, &bob.id)
        .await
        .unwrap()
        .is_none());

    let read = db
        .mark_notification_read(&first.id, &alice.id)
        .await
        .unwrap()
        .unwrap();
    assert!(read.is_read);

    let unread = db
        .list_notifications(
            &alice.id,
            &NotificationQuery {
                unread_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unread.total, 1);
    assert_eq!(unread.items[0].title, "Two");

    assert_eq!(db.mark_all_notifications_read(&alice.id).await.unwrap(), 1);
    assert_eq!(db.count_unread_notifications(&alice.id).await.unwrap(), 0);
    assert_eq!(db.count_unread_notifications(&bob.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_only_own_notification() {
    let db = create_test_db().await;
    let alice = create_user(&db, Role::Patient, "alice@example.com").await;
    let bob = create_user(&db, Role::Patient, "bob@example.com").await;
    let note = db.create_notification(notice(&alice, "One")).await.unwrap();

    assert!(!db.delete_notification(&note.id, &bob.id).await.unwrap());
    assert!(db.delete_notification(&note.id, &alice.id).await.unwrap());
}
