mod common;

use common::{pipeline, row, RecordingExecutor, ScriptedGenerator};
use nlq_gate::execution::ErrorKind;
use std::sync::Arc;

#[tokio::test]
async fn test_best_colleges_in_pune_end_to_end() {
    let generator = Arc::new(ScriptedGenerator::returning(
        "SELECT c.college, AVG(r.rating) AS rating\nFROM college_profiles c\nJOIN alumni_reviews r ON r.college_id = c.id\nWHERE LOWER(c.state) = LOWER('pune')\nGROUP BY c.college\nHAVING AVG(r.rating) > 8",
    ));
    let executor = Arc::new(RecordingExecutor::with_rows(vec![row("COEP", 8.7)]));
    let pipeline = pipeline(generator.clone(), executor.clone());

    let outcome = pipeline.run("best colleges in pune").await.unwrap();

    assert!(outcome.normalized_query.contains("state = 'pune'"));
    assert!(outcome.sql.ends_with("\nLIMIT 500"), "{}", outcome.sql);
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.notice, None);

    // What ran is exactly what was validated and returned
    assert_eq!(executor.executed.lock().unwrap().as_slice(), [outcome.sql.clone()]);

    let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("- college_profiles(id, college, state, ug_fee, pg_fee)"));
    assert!(prompt.contains(&outcome.normalized_query));

    let body = outcome.to_json();
    assert_eq!(body["rows"][0]["college"], "COEP");
    assert!(body.get("notice").is_none());
}

#[tokio::test]
async fn test_existing_limit_is_kept() {
    let generator = Arc::new(ScriptedGenerator::returning(
        "SELECT c.college FROM college_profiles c LIMIT 10",
    ));
    let executor = Arc::new(RecordingExecutor::with_rows(vec![row("NIT Trichy", 9.1)]));

    let outcome = pipeline(generator, executor).run("top 10 colleges").await.unwrap();

    assert_eq!(outcome.sql, "SELECT c.college FROM college_profiles c LIMIT 10");
}

#[tokio::test]
async fn test_unsafe_sql_never_reaches_executor() {
    for sql in [
        "SELECT 1; DROP TABLE college_profiles",
        "DELETE FROM college_profiles",
        "UPDATE college_profiles SET ug_fee = 0",
        "EXPLAIN SELECT 1",
    ] {
        let generator = Arc::new(ScriptedGenerator::returning(sql));
        let executor = Arc::new(RecordingExecutor::with_rows(vec![row("x", 1.0)]));

        let failure = pipeline(generator, executor.clone())
            .run("delete all colleges")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, ErrorKind::UnsafeSql, "{}", sql);
        assert_eq!(executor.call_count(), 0, "{}", sql);
        assert!(failure.sql.as_deref().unwrap().starts_with(sql));

        let body = failure.to_json();
        assert_eq!(body["error"], "unsafe_sql");
        assert!(body["reason"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_multiple_statements_reason() {
    let generator = Arc::new(ScriptedGenerator::returning("SELECT 1;"));
    let executor = Arc::new(RecordingExecutor::with_rows(vec![]));

    let failure = pipeline(generator, executor).run("anything").await.unwrap_err();

    assert_eq!(failure.kind, ErrorKind::UnsafeSql);
    assert_eq!(failure.reason, "multiple statements not allowed");
}

#[tokio::test]
async fn test_empty_result_is_a_notice() {
    let generator = Arc::new(ScriptedGenerator::returning(
        "SELECT c.college FROM college_profiles c WHERE c.ug_fee < 0",
    ));
    let executor = Arc::new(RecordingExecutor::with_rows(vec![]));

    let outcome = pipeline(generator, executor).run("free colleges").await.unwrap();

    assert_eq!(outcome.notice, Some(ErrorKind::NoRows));
    let body = outcome.to_json();
    assert_eq!(body["notice"], "no_rows");
    assert_eq!(body["rows"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_database_error_is_classified() {
    let generator = Arc::new(ScriptedGenerator::returning("SELECT f.name FROM faculty f"));
    let executor = Arc::new(RecordingExecutor::failing(
        "error returned from database: relation \"faculty\" does not exist",
    ));

    let failure = pipeline(generator, executor.clone())
        .run("faculty names")
        .await
        .unwrap_err();

    assert_eq!(executor.call_count(), 1);
    assert_eq!(failure.kind, ErrorKind::MissingTable);
    assert_eq!(failure.detail.as_deref(), Some("faculty"));
    assert_eq!(failure.sql.as_deref(), Some("SELECT f.name FROM faculty f\nLIMIT 500"));

    let body = failure.to_json();
    assert_eq!(body["error"], "missing_table");
    assert_eq!(body["detail"], "faculty");
    assert!(body["cause"].as_str().unwrap().contains("does not exist"));
}

#[tokio::test]
async fn test_generation_failures() {
    let executor = Arc::new(RecordingExecutor::with_rows(vec![]));

    let failed = pipeline(Arc::new(ScriptedGenerator::failing("quota exceeded")), executor.clone())
        .run("best colleges")
        .await
        .unwrap_err();
    assert_eq!(failed.kind, ErrorKind::GenerationError);
    assert!(failed.reason.contains("quota exceeded"));
    assert_eq!(failed.sql, None);

    let empty = pipeline(Arc::new(ScriptedGenerator::returning("   ")), executor.clone())
        .run("best colleges")
        .await
        .unwrap_err();
    assert_eq!(empty.kind, ErrorKind::GenerationError);

    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn test_missing_query() {
    let generator = Arc::new(ScriptedGenerator::returning("SELECT 1"));
    let executor = Arc::new(RecordingExecutor::with_rows(vec![]));

    let failure = pipeline(generator.clone(), executor.clone()).run("   ").await.unwrap_err();

    assert_eq!(failure.kind, ErrorKind::MissingQuery);
    assert!(generator.last_prompt.lock().unwrap().is_none());
    assert_eq!(executor.call_count(), 0);
}
