use plp_bookstore::book::Book;
use plp_bookstore::engine::Engine;
use plp_bookstore::runner::QueryRunner;
use plp_bookstore::seed::seed_collection;
use proptest::prelude::*;

fn book(title: &str) -> Book {
    Book {
        id: None,
        title: title.to_string(),
        author: "Prop".into(),
        genre: "Fiction".into(),
        published_year: 2000,
        price: 1.0,
        in_stock: true,
        pages: 10,
    }
}

proptest! {
    #[test]
    fn prop_pages_partition_the_title_order(
        titles in proptest::collection::vec("[a-z]{1,6}", 0..30),
        page_size in 1usize..8,
    ) {
        let engine = Engine::in_memory("prop");
        let col = engine.create_collection("books").unwrap();
        let books: Vec<Book> = titles.iter().map(|t| book(t)).collect();
        seed_collection(&col, &books, false).unwrap();
        let runner = QueryRunner::new(col);

        let mut expected = titles.clone();
        expected.sort();
        let pages = expected.len().div_ceil(page_size);

        let mut seen = Vec::new();
        for page_index in 0..pages {
            let page = runner.paginate(page_size, page_index).unwrap();
            prop_assert!(!page.is_empty());
            prop_assert!(page.len() <= page_size);
            seen.extend(page.into_iter().map(|b| b.title));
        }
        prop_assert_eq!(seen, expected);
        prop_assert!(runner.paginate(page_size, pages).unwrap().is_empty());
    }
}
