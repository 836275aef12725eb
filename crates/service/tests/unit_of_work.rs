//! Unit of work and repository behaviour over the in-memory store.

use std::sync::Arc;

use common::Email;
use domain::{
    Aggregate, Command, CreateUser, CweChanges, DeviceChanges, HardwareInfo, Message as _,
    PatchChanges, RecordCwe, RecordPatch, User,
};
use futures_util::future::BoxFuture;
use service::{
    BusError, Context, HandlerRegistry, RepositoryError, Reply, ServiceError, Services, Settings,
    UnitOfWork,
};
use store::{InMemoryStore, StoreError};

fn email(raw: &str) -> Email {
    Email::parse(raw).unwrap()
}

fn user(raw: &str) -> User {
    User::new(email(raw), None, "hash", false)
}

fn services(store: &InMemoryStore) -> Services {
    Services::new(Arc::new(store.clone()), Settings::default())
}

fn add_then_fail(cmd: CreateUser, ctx: &mut Context) -> BoxFuture<'_, service::Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        scope
            .users()
            .add(User::new(cmd.email, cmd.name, "hash", false))?;
        Err(ServiceError::DoesNotExist)
    })
}

fn add_without_commit(
    cmd: CreateUser,
    ctx: &mut Context,
) -> BoxFuture<'_, service::Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        scope
            .users()
            .add(User::new(cmd.email, cmd.name, "hash", false))?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

fn create_user(raw: &str) -> Command {
    CreateUser {
        email: email(raw),
        name: Some("Test".to_string()),
        password: "changethis".into(),
        is_superuser: false,
    }
    .into()
}

#[tokio::test]
async fn test_failed_command_is_rolled_back() {
    let store = InMemoryStore::new();
    let mut registry = HandlerRegistry::<Services>::new();
    registry.on_command(add_then_fail).unwrap();
    let bus = service::MessageBus::new(Arc::new(services(&store)), registry);

    let result = bus.handle(create_user("a@b.com")).await;
    assert!(matches!(
        result,
        Err(BusError::Handler(ServiceError::DoesNotExist))
    ));

    let mut uow = UnitOfWork::new(Arc::new(store.clone()));
    let mut scope = uow.begin().await.unwrap();
    assert!(
        scope
            .users()
            .get(&email("a@b.com"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_nothing_is_persisted_without_commit() {
    let store = InMemoryStore::new();
    let mut registry = HandlerRegistry::<Services>::new();
    registry.on_command(add_without_commit).unwrap();
    let bus = service::MessageBus::new(Arc::new(services(&store)), registry);

    let output = bus.handle(create_user("a@b.com")).await.unwrap();

    assert_eq!(output, Some(Reply::None));
    assert_eq!(store.record_count("users").await, 0);
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let store = InMemoryStore::new();
    let bus = service::bus(services(&store)).unwrap();

    let changes = CweChanges {
        name: Some("Cross-site Scripting".to_string()),
        description: Some("Improper neutralization of input".to_string()),
        ..CweChanges::new(79)
    };
    bus.handle(Command::from(RecordCwe {
        changes: changes.clone(),
    }))
    .await
    .unwrap();
    let once = store.committed("cwes", "79").await.unwrap();

    bus.handle(Command::from(RecordCwe { changes }))
        .await
        .unwrap();
    let twice = store.committed("cwes", "79").await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(store.record_count("cwes").await, 1);
}

#[tokio::test]
async fn test_upsert_only_overwrites_listed_fields() {
    let store = InMemoryStore::new();
    let bus = service::bus(services(&store)).unwrap();

    let full = PatchChanges {
        os: Some("iOS".to_string()),
        name: Some("iOS 17".to_string()),
        version: Some("17.0".to_string()),
        major: Some(17),
        minor: Some(0),
        patch: Some(0),
        cve_ids: Some(vec!["CVE-2023-41991".to_string()]),
        ..PatchChanges::new("21A329")
    };
    bus.handle(Command::from(RecordPatch { changes: full }))
        .await
        .unwrap();

    let rename = PatchChanges {
        name: Some("iOS 17.0".to_string()),
        ..PatchChanges::new("21A329")
    };
    bus.handle(Command::from(RecordPatch { changes: rename }))
        .await
        .unwrap();

    let record = store.committed("patches", "21A329").await.unwrap();
    assert_eq!(record["name"], "iOS 17.0");
    assert_eq!(record["os"], "iOS");
    assert_eq!(record["cve_ids"][0], "CVE-2023-41991");
}

#[tokio::test]
async fn test_upsert_of_unknown_record_needs_required_fields() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));
    let mut scope = uow.begin().await.unwrap();

    let mut devices = scope.devices();
    let result = devices
        .add_or_update(DeviceChanges {
            name: Some("iPhone 15".to_string()),
            ..DeviceChanges::new("iPhone15,4")
        })
        .await;

    assert!(matches!(
        result,
        Err(RepositoryError::IncompleteRecord { .. })
    ));
}

#[tokio::test]
async fn test_repeated_upsert_tracks_one_device() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));
    let mut scope = uow.begin().await.unwrap();

    let complete = DeviceChanges {
        manufacturer: Some("Apple".to_string()),
        name: Some("iPhone 15".to_string()),
        models: Some(vec!["A2846".to_string()]),
        hardware_info: Some(HardwareInfo {
            arch: "arm64e".to_string(),
            boards: vec!["D37AP".to_string()],
            soc: "A16".to_string(),
        }),
        ..DeviceChanges::new("iPhone15,4")
    };
    let mut devices = scope.devices();
    devices.add_or_update(complete.clone()).await.unwrap();
    let device = devices.add_or_update(complete).await.unwrap();
    assert_eq!(device.name(), "iPhone 15");
    assert_eq!(devices.get_seen().len(), 1);

    scope.commit().await.unwrap();
    scope.close().await.unwrap();
    assert_eq!(store.record_count("devices").await, 1);
}

#[tokio::test]
async fn test_event_harvest_is_exact() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));

    let mut scope = uow.begin().await.unwrap();
    let mut users = scope.users();
    users.add(user("a@b.com")).unwrap().send_verification_email();
    let second = users.add(user("c@d.com")).unwrap();
    second.send_verification_email();
    second.send_password_recovery_email();
    users.add(user("e@f.com")).unwrap();
    scope.commit().await.unwrap();
    scope.close().await.unwrap();

    let events = uow.collect_new_events();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events.iter().map(|e| e.kind()).collect::<Vec<_>>(),
        vec![
            domain::EventKind::NotifyNewAccount,
            domain::EventKind::NotifyNewAccount,
            domain::EventKind::NotifyRecoverPassword,
        ]
    );
    assert!(uow.collect_new_events().is_empty());
}

#[tokio::test]
async fn test_adding_a_tracked_key_twice_fails() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));
    let mut scope = uow.begin().await.unwrap();

    let mut users = scope.users();
    users.add(user("a@b.com")).unwrap();
    let result = users.add(user("a@b.com"));

    assert!(matches!(result, Err(RepositoryError::DuplicateKey { .. })));
}

#[tokio::test]
async fn test_adding_a_stored_key_fails_at_commit() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));

    let mut scope = uow.begin().await.unwrap();
    scope.users().add(user("a@b.com")).unwrap();
    scope.commit().await.unwrap();
    scope.close().await.unwrap();

    let mut scope = uow.begin().await.unwrap();
    scope.users().add(user("a@b.com")).unwrap();
    let result = scope.commit().await;

    assert!(matches!(
        result,
        Err(RepositoryError::Store(StoreError::DuplicateKey { .. }))
    ));
    assert!(!scope.is_committed());
}

#[tokio::test]
async fn test_get_returns_the_tracked_instance() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));

    let mut scope = uow.begin().await.unwrap();
    scope.users().add(user("a@b.com")).unwrap();
    scope.commit().await.unwrap();
    scope.close().await.unwrap();

    let mut scope = uow.begin().await.unwrap();
    let mut users = scope.users();
    users
        .get(&email("a@b.com"))
        .await
        .unwrap()
        .unwrap()
        .rename("Renamed");
    let again = users.get(&email("a@b.com")).await.unwrap().unwrap();
    assert_eq!(again.name(), Some("Renamed"));
    assert_eq!(users.get_seen().len(), 1);
}

#[tokio::test]
async fn test_removed_aggregates_are_deleted_and_still_harvested() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));

    let mut scope = uow.begin().await.unwrap();
    scope.users().add(user("a@b.com")).unwrap();
    scope.commit().await.unwrap();
    scope.close().await.unwrap();

    let mut scope = uow.begin().await.unwrap();
    let mut users = scope.users();
    let key = email("a@b.com");
    users
        .get(&key)
        .await
        .unwrap()
        .unwrap()
        .send_password_recovery_email();
    assert!(users.remove(&key).await.unwrap());
    assert!(users.get(&key).await.unwrap().is_none());
    assert!(!users.remove(&key).await.unwrap());
    scope.commit().await.unwrap();
    scope.close().await.unwrap();

    assert_eq!(store.record_count("users").await, 0);
    assert_eq!(uow.collect_new_events().len(), 1);
}

#[tokio::test]
async fn test_find_by_user_id() {
    let store = InMemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(store.clone()));

    let created = user("a@b.com");
    let id = created.id();
    let mut scope = uow.begin().await.unwrap();
    scope.users().add(created).unwrap();
    scope.commit().await.unwrap();
    scope.close().await.unwrap();

    let mut scope = uow.begin().await.unwrap();
    let found = scope.users().get_by_id(id).await.unwrap().map(|u| u.key());
    assert_eq!(found, Some(email("a@b.com")));
}
