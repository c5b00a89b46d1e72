use plp_bookstore::Database;
use plp_bookstore::engine::{Engine, EngineOptions};
use plp_bookstore::errors::DbError;
use plp_bookstore::index::IndexSpec;
use plp_bookstore::query::{Filter, Order};
use plp_bookstore::seed::{default_books, seed_collection};

fn options(dir: &std::path::Path) -> EngineOptions {
    EngineOptions {
        data_dir: dir.to_path_buf(),
        database: "plp_bookstore".into(),
        create_if_missing: true,
    }
}

#[test]
fn documents_and_indexes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open_with(options(dir.path()), "books").unwrap();
        let books = db.books().unwrap();
        seed_collection(&books, &default_books().unwrap(), false).unwrap();
        let runner = db.runner().unwrap();
        runner.ensure_indexes(&[IndexSpec::single("title", Order::Asc)]).unwrap();
        runner.update_price("The Great Gatsby", 14.99).unwrap();
        db.close().unwrap();
    }
    assert!(dir.path().join("plp_bookstore").join("books.ndjson").is_file());

    let db = Database::open_with(options(dir.path()), "books").unwrap();
    let runner = db.runner().unwrap();
    assert_eq!(runner.count_documents().unwrap(), 12);
    let gatsby = runner.find_by_title("The Great Gatsby").unwrap();
    assert!((gatsby[0].price - 14.99).abs() < 1e-9);
    // natural order is the snapshot order
    assert_eq!(runner.find_by_genre("Fiction").unwrap()[0].title, "To Kill a Mockingbird");

    let names: Vec<String> = runner.list_indexes().unwrap().into_iter().map(|i| i.name).collect();
    assert_eq!(names, ["_id_", "title_1"]);
    let plan = runner.explain_find(&Filter::eq("title", "1984")).unwrap();
    assert_eq!(plan.index_label(), "title_1");
    db.close().unwrap();
}

#[test]
fn ids_are_stable_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let before = {
        let db = Database::open_with(options(dir.path()), "books").unwrap();
        seed_collection(&db.books().unwrap(), &default_books().unwrap(), false).unwrap();
        let ids = db.runner().unwrap().find_by_author("George Orwell").unwrap();
        db.close().unwrap();
        ids.into_iter().map(|b| b.id).collect::<Vec<_>>()
    };
    let db = Database::open_with(options(dir.path()), "books").unwrap();
    let after: Vec<_> =
        db.runner().unwrap().find_by_author("George Orwell").unwrap().into_iter().map(|b| b.id).collect();
    assert_eq!(before, after);
    assert!(after.iter().all(Option::is_some));
}

#[test]
fn missing_directory_without_create_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(&dir.path().join("absent"));
    opts.create_if_missing = false;
    let err = Engine::open(opts).unwrap_err();
    assert!(matches!(err, DbError::StoreUnavailable(_)));
    assert!(err.is_fatal());
    assert!(!dir.path().join("absent").exists());
}

#[test]
fn a_file_in_place_of_the_data_directory_is_unavailable() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let err = Engine::open(options(file.path())).unwrap_err();
    assert!(matches!(err, DbError::StoreUnavailable(_)));
}

#[test]
fn create_if_missing_makes_the_database_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("data");
    let engine = Engine::open(options(&nested)).unwrap();
    assert_eq!(engine.database(), "plp_bookstore");
    assert_eq!(engine.db_dir(), Some(nested.join("plp_bookstore").as_path()));
    assert!(engine.list_collection_names().is_empty());
    engine.close().unwrap();
}

#[test]
fn collections_can_be_listed_and_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(options(dir.path())).unwrap();
    engine.create_collection("books").unwrap();
    engine.create_collection("authors").unwrap();
    assert_eq!(engine.list_collection_names(), ["authors", "books"]);
    engine.flush().unwrap();
    assert!(engine.drop_collection("authors").unwrap());
    assert!(!engine.drop_collection("authors").unwrap());
    assert!(!dir.path().join("plp_bookstore").join("authors.ndjson").exists());
    assert!(matches!(engine.create_collection("../escape"), Err(DbError::InvalidArgument(_))));
    engine.close().unwrap();
}

#[test]
fn in_memory_database_never_touches_disk() {
    let db = Database::in_memory("plp_bookstore", "books");
    assert!(db.engine().db_dir().is_none());
    seed_collection(&db.books().unwrap(), &default_books().unwrap(), false).unwrap();
    assert_eq!(db.runner().unwrap().count_documents().unwrap(), 12);
    db.close().unwrap();
}
