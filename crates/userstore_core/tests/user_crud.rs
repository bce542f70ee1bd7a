use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use userstore_core::{
    Context, ErrorKind, RepoError, Repository, SqliteUserRepository, User, UserId,
};

#[test]
fn insert_then_get_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let user = User::new("Doe", "John", 30);
    let id = repo.insert(&ctx, &user).unwrap();

    let loaded = repo.get_by_id(&ctx, id).unwrap();
    assert_eq!(loaded, User { id, ..user });
}

#[test]
fn insert_ignores_caller_supplied_id() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let id = repo
        .insert(&ctx, &User::with_id(500, "Doe", "John", 30))
        .unwrap();

    assert_eq!(id, 1);
    assert!(matches!(
        repo.get_by_id(&ctx, 500),
        Err(RepoError::NotFound(500))
    ));
}

#[test]
fn lifecycle_scenario_matches_contract() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let id = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    assert_eq!(id, 1);
    assert_eq!(
        repo.get_by_id(&ctx, 1).unwrap(),
        User::with_id(1, "Doe", "John", 30)
    );

    let duplicate = repo
        .insert(&ctx, &User::new("Doe", "John", 30))
        .unwrap_err();
    assert!(matches!(
        duplicate,
        RepoError::AlreadyExists { existing_id: 1 }
    ));

    repo.update(&ctx, 1, &User::new("Doe", "Jane", 31)).unwrap();
    let updated = repo.get_by_id(&ctx, 1).unwrap();
    assert_eq!(updated.name, "Jane");
    assert_eq!(updated.age, 31);
    assert_eq!(updated.id, 1);

    repo.delete(&ctx, 1).unwrap();
    assert!(matches!(repo.get_by_id(&ctx, 1), Err(RepoError::NotFound(1))));
}

#[test]
fn get_unknown_id_returns_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());

    let err = repo.get_by_id(&Context::background(), 42).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(42)));
}

#[test]
fn duplicate_insert_creates_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    repo.insert(&ctx, &User::new("Doe", "John", 31)).unwrap();
    let err = repo
        .insert(&ctx, &User::new("Doe", "John", 30))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(row_count(&repo), 2);
}

#[test]
fn update_not_found_creates_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());

    let err = repo
        .update(&Context::background(), 7, &User::new("Doe", "John", 30))
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound(7)));
    assert_eq!(row_count(&repo), 0);
}

#[test]
fn update_never_changes_the_id() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let id = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    repo.update(&ctx, id, &User::with_id(99, "Roe", "Richard", 45))
        .unwrap();

    assert_eq!(
        repo.get_by_id(&ctx, id).unwrap(),
        User::with_id(id, "Roe", "Richard", 45)
    );
    assert!(matches!(repo.get_by_id(&ctx, 99), Err(RepoError::NotFound(99))));
}

#[test]
fn second_delete_returns_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let id = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    repo.delete(&ctx, id).unwrap();

    let err = repo.delete(&ctx, id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(deleted) if deleted == id));
}

#[test]
fn deleted_ids_are_not_reassigned() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let first = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    repo.delete(&ctx, first).unwrap();
    let second = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();

    assert!(second > first);
}

#[test]
fn list_tracks_live_rows_across_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let a = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    let b = repo.insert(&ctx, &User::new("Roe", "Jane", 25)).unwrap();
    let c = repo.insert(&ctx, &User::new("Poe", "Edgar", 40)).unwrap();
    repo.update(&ctx, b, &User::new("Roe", "Janet", 26)).unwrap();
    repo.delete(&ctx, a).unwrap();

    let listing = repo.list(&ctx).unwrap();
    assert!(listing.is_complete());
    let ids: HashSet<UserId> = listing.items.iter().map(|user| user.id).collect();
    assert_eq!(ids, HashSet::from([b, c]));
    assert!(listing
        .items
        .iter()
        .any(|user| user.id == b && user.name == "Janet"));
}

#[test]
fn list_on_empty_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());

    let listing = repo.list(&Context::background()).unwrap();
    assert!(listing.items.is_empty());
    assert!(listing.skipped.is_empty());
}

#[test]
fn list_skips_undecodable_rows_but_get_fails_on_them() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let good = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    let conn = Connection::open(repo.path()).unwrap();
    conn.execute(
        "INSERT INTO users (surname, name, age) VALUES (NULL, 'Ghost', 3);",
        [],
    )
    .unwrap();
    let broken = conn.last_insert_rowid();
    drop(conn);

    let listing = repo.list(&ctx).unwrap();
    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].id, good);
    assert_eq!(listing.skipped.len(), 1);
    assert_eq!(listing.skipped[0].row_id, Some(broken));
    assert_eq!(listing.skipped[0].row_index, 1);

    let err = repo.get_by_id(&ctx, broken).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn non_positive_age_is_a_constraint_violation() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let err = repo.insert(&ctx, &User::new("Doe", "John", 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(row_count(&repo), 0);

    let id = repo.insert(&ctx, &User::new("Doe", "John", 30)).unwrap();
    let err = repo
        .update(&ctx, id, &User::new("Doe", "John", -4))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(repo.get_by_id(&ctx, id).unwrap().age, 30);
}

#[test]
fn values_are_bound_not_interpolated() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    let ctx = Context::background();

    let hostile = User::new("Doe'); DROP TABLE users; --", "John", 30);
    let id = repo.insert(&ctx, &hostile).unwrap();

    assert_eq!(repo.get_by_id(&ctx, id).unwrap().surname, hostile.surname);
    assert_eq!(row_count(&repo), 1);
}

#[test]
fn operations_fail_with_connectivity_when_store_disappears() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(dir.path());
    std::fs::remove_file(repo.path()).unwrap();

    let err = repo.list(&Context::background()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert!(!repo.path().exists());
}

fn open_repo(dir: &Path) -> SqliteUserRepository {
    SqliteUserRepository::open(dir.join("users.db")).unwrap()
}

fn row_count(repo: &SqliteUserRepository) -> i64 {
    let conn = Connection::open(repo.path()).unwrap();
    conn.query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap()
}
