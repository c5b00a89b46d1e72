mod common;

use common::seeded_runner;
use plp_bookstore::errors::DbError;
use plp_bookstore::report::{ConsoleSink, NdjsonSink};
use plp_bookstore::script::{Operation, Outcome, Step, bookstore_battery, run_battery};
use serde_json::Value;

#[test]
fn console_report_covers_the_whole_battery() {
    let r = seeded_runner();
    let mut sink = ConsoleSink::new(Vec::new());
    let summary = run_battery(&r, &bookstore_battery(), &mut sink).unwrap();
    assert_eq!(summary.steps, 26);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert!(text.starts_with("=== PLP BOOKSTORE QUERIES ==="));
    assert!(text.contains("\n1. All Fiction books:\n"));
    assert!(text.contains("Matched: 1, modified: 1"));
    assert!(text.contains("Deleted: 1"));
    assert!(text.contains("Remaining books count: 11"));
    assert!(text.contains("\n6. In-stock books published after 2010:\n(no documents)\n"));
    assert!(text.contains("Index title_1: created"));
    assert!(text.contains("Index used: title_1"));
    assert!(text.contains("Index used: author_1_published_year_-1"));
    assert!(text.contains("\n26. Total books in collection:\nCount: 11\n"));
    assert!(text.trim_end().ends_with(" ms ==="));
    assert!(text.contains("=== 26 steps completed in "));
}

#[test]
fn ndjson_report_is_one_object_per_line() {
    let r = seeded_runner();
    let mut sink = NdjsonSink::new(Vec::new());
    run_battery(&r, &bookstore_battery(), &mut sink).unwrap();
    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 28);

    assert_eq!(lines[0]["header"]["collection"], "books");
    assert_eq!(lines[0]["header"]["steps"], 26);
    assert_eq!(lines[27]["summary"]["steps"], 26);

    let sections = &lines[1..27];
    for (i, s) in sections.iter().enumerate() {
        assert_eq!(s["step"], i + 1);
        assert!(s["kind"].is_string());
    }
    assert_eq!(sections[0]["kind"], "books");
    assert_eq!(sections[0]["data"].as_array().unwrap().len(), 4);
    assert_eq!(sections[3]["kind"], "updated");
    assert_eq!(sections[3]["data"]["books"][0]["price"], 14.99);

    // pages run after the delete: 5, 5, 1
    let pages: Vec<usize> =
        sections[9..12].iter().map(|s| s["data"].as_array().unwrap().len()).collect();
    assert_eq!(pages, [5, 5, 1]);

    let genre_plan = &sections[17];
    assert_eq!(genre_plan["kind"], "plan");
    assert_eq!(genre_plan["data"]["indexName"], "genre_1");
    assert_eq!(genre_plan["data"]["totalDocsExamined"], 2);
    assert_eq!(sections[19]["data"]["nReturned"], 2);

    assert_eq!(sections[23]["data"].as_array().unwrap().len(), 3);
    assert_eq!(sections[24]["data"].as_array().unwrap().len(), 8);
    assert_eq!(sections[25], serde_json::json!({"kind": "count", "data": 11, "step": 26, "title": "Total books in collection"}));
}

#[test]
fn first_failing_step_aborts_the_run() {
    let r = seeded_runner();
    let steps = vec![
        Step::new("Before", Operation::CountDocuments),
        Step::new("Bad page", Operation::Paginate { page_size: 0, page_index: 0 }),
        Step::new("After", Operation::DeleteByTitle("1984".into())),
    ];
    let mut sink = ConsoleSink::new(Vec::new());
    let err = run_battery(&r, &steps, &mut sink).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));

    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert!(text.contains("1. Before:\nCount: 12"));
    assert!(!text.contains("After"));
    assert!(!text.contains("steps completed"));
    assert_eq!(r.count_documents().unwrap(), 12);
}

#[test]
fn single_operations_execute_directly() {
    let r = seeded_runner();
    match r.execute(&Operation::TopAuthorsByBookCount(1)).unwrap() {
        Outcome::AuthorCounts(rows) => assert_eq!(rows[0].book_count, 2),
        other => panic!("unexpected outcome {other:?}"),
    }
    match r.execute(&Operation::DeleteByTitle("Moby Dick".into())).unwrap() {
        Outcome::Deleted { report, remaining } => {
            assert_eq!(report.deleted, 1);
            assert_eq!(remaining, 11);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}
