#[cfg(test)]
pub(crate) mod mocks {
    use crate::error::IngestError;
    use crate::source::{EventSource, MessageStream};
    use async_trait::async_trait;
    use mockall::mock;
    use scorestore::{GroupedStore, StoreError};
    use std::collections::{BTreeMap, BTreeSet};

    mock! {
        pub Store {}
        #[async_trait]
        impl GroupedStore for Store {
            async fn init(&self) -> Result<(), StoreError>;
            async fn upsert(&self, outer: &str, inner: &str, value: &str) -> Result<(), StoreError>;
            async fn get_group(&self, outer: &str) -> Result<BTreeMap<String, String>, StoreError>;
            async fn list_outer_keys(&self) -> Result<BTreeSet<String>, StoreError>;
            async fn delete(&self, outer: &str) -> Result<bool, StoreError>;
        }
    }

    mock! {
        pub Upstream {}
        #[async_trait]
        impl EventSource for Upstream {
            async fn connect(&self) -> Result<MessageStream, IngestError>;
            fn describe(&self) -> String;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{MockStore, MockUpstream};
    use crate::api::{router, AppState};
    use crate::context::{IndexKind, ServiceContext};
    use crate::error::IngestError;
    use crate::event::{StreamMessage, SCORE_EVENT};
    use crate::ingest::{Backoff, Ingestor, MessageOutcome};
    use crate::query::QueryService;
    use crate::source::MessageStream;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures::stream;
    use http_body_util::BodyExt;
    use mockall::*;
    use scorestore::storage::memory::MemoryBackend;
    use scorestore::{GroupedStore, StoreError};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn score(student: &str, exam: &str, score: &str) -> StreamMessage {
        StreamMessage::new(
            SCORE_EVENT,
            format!(r#"{{"studentId":"{}","exam":"{}","score":"{}"}}"#, student, exam, score),
        )
    }

    fn scripted(items: Vec<Result<StreamMessage, IngestError>>) -> MessageStream {
        Box::pin(stream::iter(items))
    }

    fn memory_context() -> ServiceContext {
        ServiceContext::new(Arc::new(MemoryBackend::new()), Arc::new(MemoryBackend::new()))
    }

    fn idle_ingestor(ctx: ServiceContext) -> Ingestor {
        Ingestor::new(Arc::new(MockUpstream::new()), ctx, Backoff::default())
    }

    /// Ingests the three postings used throughout these tests.
    async fn ingest_sample(ingestor: &Ingestor) {
        let messages = scripted(vec![
            Ok(score("studentId12345", "exam500", "0.80")),
            Ok(score("studentId12345", "exam501", "0.70")),
            Ok(score("studentId56789", "exam501", "0.90")),
        ]);
        ingestor.consume(messages).await.unwrap();
    }

    async fn get_body(ctx: ServiceContext, uri: &str) -> (StatusCode, String) {
        let app = router(AppState::new(QueryService::new(ctx)));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let ctx = memory_context();
        ingest_sample(&idle_ingestor(ctx.clone())).await;
        let queries = QueryService::new(ctx);

        assert_eq!(
            queries.list_keys(IndexKind::Students).await.unwrap(),
            BTreeSet::from(["studentId12345".to_string(), "studentId56789".to_string()])
        );

        let student = queries.summary(IndexKind::Students, "studentId12345").await.unwrap();
        assert_eq!(student.results.len(), 2);
        assert_eq!(student.results["exam500"], "0.80");
        assert_eq!(student.results["exam501"], "0.70");
        assert!((student.average - 0.75).abs() < 1e-9);

        let exam = queries.summary(IndexKind::Exams, "exam501").await.unwrap();
        assert_eq!(exam.results.len(), 2);
        assert_eq!(exam.results["studentId12345"], "0.70");
        assert_eq!(exam.results["studentId56789"], "0.90");
        assert!((exam.average - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_indexes_agree_for_every_event() {
        let ctx = memory_context();
        ingest_sample(&idle_ingestor(ctx.clone())).await;

        let students = ctx.index(IndexKind::Students);
        let exams = ctx.index(IndexKind::Exams);
        for student in students.list_outer_keys().await.unwrap() {
            for (exam, value) in students.get_group(&student).await.unwrap() {
                assert_eq!(exams.get_group(&exam).await.unwrap()[&student], value);
            }
        }
    }

    #[tokio::test]
    async fn test_non_score_and_malformed_events_do_not_stop_ingestion() {
        let ctx = memory_context();
        let ingestor = idle_ingestor(ctx.clone());

        let messages = scripted(vec![
            Ok(StreamMessage::new("heartbeat", r#"{"studentId":"x","exam":"y","score":"1"}"#)),
            Ok(StreamMessage::new(SCORE_EVENT, r#"{"studentId":"s1","score":"0.5"}"#)),
            Ok(StreamMessage::new(SCORE_EVENT, "{")),
            Ok(score("s1", "e1", "0.60")),
        ]);
        ingestor.consume(messages).await.unwrap();

        assert_eq!(
            ctx.index(IndexKind::Students).list_outer_keys().await.unwrap(),
            BTreeSet::from(["s1".to_string()])
        );
        assert_eq!(
            ctx.index(IndexKind::Exams).list_outer_keys().await.unwrap(),
            BTreeSet::from(["e1".to_string()])
        );

        let stats = ingestor.monitor().stats().await;
        assert_eq!(stats.events_skipped, 1);
        assert_eq!(stats.parse_failures, 2);
        assert_eq!(stats.events_applied, 1);
    }

    #[tokio::test]
    async fn test_student_write_failure_skips_exam_write() {
        let mut students = MockStore::new();
        let mut exams = MockStore::new();

        students
            .expect_upsert()
            .times(1)
            .returning(|_, _, _| Err(StoreError::Unavailable("connection refused".to_string())));
        exams.expect_upsert().never();

        let ingestor = idle_ingestor(ServiceContext::new(Arc::new(students), Arc::new(exams)));
        let outcome = ingestor.handle_message(&score("s1", "e1", "0.5")).await;

        assert_eq!(outcome, MessageOutcome::WriteFailed);
        assert_eq!(ingestor.monitor().stats().await.write_failures, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_not_fatal_to_the_stream() {
        let mut students = MockStore::new();
        let mut exams = MockStore::new();
        let mut seq = Sequence::new();

        students
            .expect_upsert()
            .withf(|outer, inner, value| outer == "s1" && inner == "e1" && value == "0.5")
            .times(1)
            .returning(|_, _, _| Ok(()));
        exams
            .expect_upsert()
            .withf(|outer, inner, _| outer == "e1" && inner == "s1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(StoreError::Backend("write rejected".to_string())));
        students
            .expect_upsert()
            .withf(|outer, _, _| outer == "s2")
            .times(1)
            .returning(|_, _, _| Ok(()));
        exams
            .expect_upsert()
            .withf(|outer, inner, value| outer == "e1" && inner == "s2" && value == "0.9")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let ingestor = idle_ingestor(ServiceContext::new(Arc::new(students), Arc::new(exams)));
        let messages = scripted(vec![Ok(score("s1", "e1", "0.5")), Ok(score("s2", "e1", "0.9"))]);
        ingestor.consume(messages).await.unwrap();

        let stats = ingestor.monitor().stats().await;
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.events_applied, 1);
    }

    #[tokio::test]
    async fn test_events_lost_while_disconnected_stay_lost() {
        let ctx = memory_context();
        let mut upstream = MockUpstream::new();
        let mut seq = Sequence::new();

        upstream.expect_describe().return_const("mock://scores".to_string());
        upstream
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(scripted(vec![Ok(score("s1", "e1", "0.70"))])));
        upstream
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(scripted(vec![Ok(score("s1", "e3", "0.90"))])));
        upstream
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(IngestError::Connection("refused".to_string())));

        let backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(2), 2.0)
            .with_max_retries(Some(0));
        let ingestor = Ingestor::new(Arc::new(upstream), ctx.clone(), backoff);
        tokio_test::assert_err!(ingestor.run().await);

        let group = ctx.index(IndexKind::Students).get_group("s1").await.unwrap();
        assert_eq!(group.keys().collect::<Vec<_>>(), vec!["e1", "e3"]);
    }

    #[tokio::test]
    async fn test_query_store_failure_is_server_error() {
        let mut students = MockStore::new();
        students
            .expect_list_outer_keys()
            .returning(|| Err(StoreError::Unavailable("down".to_string())));

        let ctx = ServiceContext::new(Arc::new(students), Arc::new(MockStore::new()));
        let (status, body) = get_body(ctx, "/students").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("storage_error"));
    }

    #[tokio::test]
    async fn test_http_students() {
        let ctx = memory_context();
        ingest_sample(&idle_ingestor(ctx.clone())).await;

        let (status, body) = get_body(ctx, "/students").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("studentId12345"));
        assert!(body.contains("studentId56789"));
    }

    #[tokio::test]
    async fn test_http_student_results() {
        let ctx = memory_context();
        ingest_sample(&idle_ingestor(ctx.clone())).await;

        let (status, body) = get_body(ctx, "/students/studentId12345").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("studentId12345"));
        assert!(!body.contains("studentId56789"));
        assert!(body.contains("exam500"));
        assert!(body.contains("exam501"));
        assert!(body.contains("0.70"));
        assert!(body.contains("0.80"));
        assert!(body.contains("0.75"));
    }

    #[tokio::test]
    async fn test_http_exams() {
        let ctx = memory_context();
        ingest_sample(&idle_ingestor(ctx.clone())).await;

        let (status, body) = get_body(ctx, "/exams").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("exam500"));
        assert!(body.contains("exam501"));
    }

    #[tokio::test]
    async fn test_http_exam_results() {
        let ctx = memory_context();
        ingest_sample(&idle_ingestor(ctx.clone())).await;

        let (status, body) = get_body(ctx, "/exams/exam501").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("exam501"));
        assert!(!body.contains("exam500"));
        assert!(body.contains("studentId12345"));
        assert!(body.contains("studentId56789"));
        assert!(body.contains("0.70"));
        assert!(body.contains("0.90"));
        assert!(body.contains("0.8"));
    }

    #[tokio::test]
    async fn test_http_health_reports_ingest_counters() {
        let ctx = memory_context();
        let ingestor = idle_ingestor(ctx.clone());
        ingest_sample(&ingestor).await;

        let app = router(AppState::new(QueryService::new(ctx)).with_ingest(ingestor.monitor()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["ingest"]["state"], "disconnected");
        assert_eq!(body["ingest"]["stats"]["events_applied"], 3);
    }
}
