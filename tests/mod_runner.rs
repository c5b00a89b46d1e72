mod common;

use common::{seeded_runner, titles};
use plp_bookstore::errors::DbError;
use plp_bookstore::query::{Order, UpdateReport};

#[test]
fn finds_by_genre_year_and_author() {
    let r = seeded_runner();
    let fiction = r.find_by_genre("Fiction").unwrap();
    assert_eq!(
        titles(&fiction),
        ["To Kill a Mockingbird", "The Great Gatsby", "The Catcher in the Rye", "The Alchemist"]
    );
    assert!(fiction.iter().all(|b| b.id.is_some()));
    assert!(r.find_by_genre("fiction").unwrap().is_empty());

    let after = r.find_published_after(1950).unwrap();
    assert_eq!(after.len(), 4);
    assert!(after.iter().all(|b| b.published_year > 1950));
    assert!(r.find_published_after(1954).unwrap().iter().all(|b| b.title != "The Lord of the Rings"));

    let orwell = r.find_by_author("George Orwell").unwrap();
    assert_eq!(titles(&orwell), ["1984", "Animal Farm"]);
}

#[test]
fn update_price_is_idempotent_and_misses_are_not_errors() {
    let r = seeded_runner();
    let first = r.update_price("The Great Gatsby", 14.99).unwrap();
    assert_eq!(first, UpdateReport { matched: 1, modified: 1 });
    let again = r.update_price("The Great Gatsby", 14.99).unwrap();
    assert_eq!(again, UpdateReport { matched: 1, modified: 0 });
    let gatsby = r.find_by_title("The Great Gatsby").unwrap();
    assert!((gatsby[0].price - 14.99).abs() < 1e-9);

    let miss = r.update_price("No Such Book", 1.0).unwrap();
    assert_eq!(miss, UpdateReport { matched: 0, modified: 0 });
}

#[test]
fn update_price_rejects_bad_prices() {
    let r = seeded_runner();
    for bad in [-0.01, f64::NAN, f64::INFINITY] {
        assert!(matches!(r.update_price("1984", bad), Err(DbError::InvalidArgument(_))));
    }
    assert!((r.find_by_title("1984").unwrap()[0].price - 10.99).abs() < 1e-9);
}

#[test]
fn delete_by_title_removes_one_then_reports_zero() {
    let r = seeded_runner();
    assert_eq!(r.delete_by_title("The Alchemist").unwrap().deleted, 1);
    assert_eq!(r.delete_by_title("The Alchemist").unwrap().deleted, 0);
    assert_eq!(r.count_documents().unwrap(), 11);
    assert!(r.find_by_title("The Alchemist").unwrap().is_empty());
}

#[test]
fn in_stock_after_year_applies_both_conditions() {
    let r = seeded_runner();
    assert!(r.find_in_stock_after_year(2010).unwrap().is_empty());
    let books = r.find_in_stock_after_year(1940).unwrap();
    assert_eq!(
        titles(&books),
        ["To Kill a Mockingbird", "1984", "The Catcher in the Rye", "The Lord of the Rings", "The Alchemist"]
    );
}

#[test]
fn projection_has_exactly_three_fields() {
    let r = seeded_runner();
    let rows = r.project_title_author_price().unwrap();
    assert_eq!(rows.len(), 12);
    let v = serde_json::to_value(&rows[0]).unwrap();
    let keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 3);
    assert!(v.get("_id").is_none());
    assert_eq!(rows[0].title, "To Kill a Mockingbird");
}

#[test]
fn sort_by_price_both_directions() {
    let r = seeded_runner();
    let asc = r.sort_by_price(Order::Asc).unwrap();
    assert!(asc.windows(2).all(|w| w[0].price <= w[1].price));
    assert_eq!(asc[0].title, "Pride and Prejudice");
    // equal prices keep insertion order
    let nines: Vec<&str> =
        asc.iter().filter(|b| (b.price - 9.99).abs() < 1e-9).map(|b| b.title.as_str()).collect();
    assert_eq!(nines, ["The Great Gatsby", "Wuthering Heights"]);

    let desc = r.sort_by_price(Order::Desc).unwrap();
    assert!(desc.windows(2).all(|w| w[0].price >= w[1].price));
    assert_eq!(desc[0].title, "The Lord of the Rings");
}

#[test]
fn twelve_books_paginate_five_five_two() {
    let r = seeded_runner();
    let p0 = r.paginate(5, 0).unwrap();
    let p1 = r.paginate(5, 1).unwrap();
    let p2 = r.paginate(5, 2).unwrap();
    assert_eq!(titles(&p0), ["1984", "Animal Farm", "Brave New World", "Moby Dick", "Pride and Prejudice"]);
    assert_eq!(
        titles(&p1),
        ["The Alchemist", "The Catcher in the Rye", "The Great Gatsby", "The Hobbit", "The Lord of the Rings"]
    );
    assert_eq!(titles(&p2), ["To Kill a Mockingbird", "Wuthering Heights"]);
    assert!(r.paginate(5, 3).unwrap().is_empty());
    assert!(matches!(r.paginate(0, 0), Err(DbError::InvalidArgument(_))));
    assert!(matches!(r.paginate(usize::MAX, 2), Err(DbError::InvalidArgument(_))));
}

#[test]
fn additional_analysis_queries() {
    let r = seeded_runner();
    assert_eq!(titles(&r.top_by("price", Order::Desc, 1).unwrap()), ["The Lord of the Rings"]);
    assert_eq!(titles(&r.top_by("price", Order::Asc, 1).unwrap()), ["Pride and Prejudice"]);
    assert_eq!(
        titles(&r.top_by("pages", Order::Desc, 3).unwrap()),
        ["The Lord of the Rings", "Moby Dick", "Pride and Prejudice"]
    );
    assert!(matches!(r.top_by("price", Order::Asc, 0), Err(DbError::InvalidArgument(_))));

    assert_eq!(
        titles(&r.find_out_of_stock().unwrap()),
        ["Brave New World", "Animal Farm", "Moby Dick"]
    );
    let century = r.find_published_between(1900, 1999).unwrap();
    assert_eq!(century.len(), 9);
    assert!(century.iter().all(|b| (1900..=1999).contains(&b.published_year)));
    assert!(matches!(r.find_published_between(2000, 1900), Err(DbError::InvalidArgument(_))));
}

#[test]
fn malformed_stored_book_is_a_schema_error() {
    use bson::doc;
    use plp_bookstore::document::Document;
    let r = seeded_runner();
    r.store().insert_document(Document::new(doc! {"title": "Broken", "genre": "Fiction"}));
    assert!(matches!(r.find_by_genre("Fiction"), Err(DbError::Schema(_))));
    assert_eq!(r.find_by_genre("Fantasy").unwrap().len(), 2);
}

#[test]
fn unbounded_finds_return_every_match_in_a_large_collection() {
    use plp_bookstore::book::Book;
    use plp_bookstore::document::Document;
    use plp_bookstore::engine::Engine;
    use plp_bookstore::runner::QueryRunner;

    let engine = Engine::in_memory("plp_bookstore");
    let col = engine.create_collection("books").unwrap();
    for i in 0..10_001 {
        let book = Book {
            id: None,
            title: format!("T{i}"),
            author: "Bulk".into(),
            genre: "Fiction".into(),
            published_year: 2000,
            price: f64::from(i % 50),
            in_stock: true,
            pages: 100,
        };
        col.insert_document(Document::new(book.to_document()));
    }
    let r = QueryRunner::new(col);
    assert_eq!(r.count_documents().unwrap(), 10_001);

    let fiction = r.find_by_genre("Fiction").unwrap();
    assert_eq!(fiction.len(), 10_001);
    assert!(fiction.iter().any(|b| b.title == "T10000"));
    assert_eq!(r.sort_by_price(Order::Asc).unwrap().len(), 10_001);
    assert_eq!(r.find_by_author("Bulk").unwrap().len(), 10_001);
}
