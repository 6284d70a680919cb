use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use trackwrite_core::backend::FailureKind;
use trackwrite_core::error::BackendError;
use trackwrite_core::testing::{Fault, RecordingWriter};
use trackwrite_core::topology::routing_keys;
use trackwrite_core::translate::{ABORTED_XID_FIELD, ENCODED_TUPLE_FIELD, REPLACEMENT_FIELD};
use trackwrite_core::tuple::decode_tuple_base64;
use trackwrite_core::{
    BulkReport, BulkWrite, Failure, MemoryIndex, OpKind, Phase, RefreshPolicy, RowLocation, Source, Track, TxId,
    VersionRequest, WriteCoordinator, WriteOp, WriteOptions,
};

const INDEX: &str = "idx";

fn enable_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Harness {
    memory: Arc<MemoryIndex>,
    writer: Arc<RecordingWriter<Arc<MemoryIndex>>>,
    coordinator: WriteCoordinator,
}

impl Harness {
    fn new(partitions: u32) -> Self {
        enable_logging();
        let memory = Arc::new(MemoryIndex::new(partitions));
        let writer = Arc::new(RecordingWriter::new(memory.clone()));
        let coordinator = WriteCoordinator::new(writer.clone(), memory.clone());
        Self {
            memory,
            writer,
            coordinator,
        }
    }
}

fn source(value: Value) -> Source {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn insert(id: &str, xmin: u64, prev: Option<&str>) -> WriteOp {
    let mut body = json!({"_xmin": xmin, "_cmin": 0, "_zdb_seq": 0, "title": id});
    if let Some(prev) = prev {
        body["_prev_ctid"] = json!(prev);
    }
    WriteOp::index(INDEX, Track::Data, id, source(body))
}

fn delete(id: &str) -> WriteOp {
    WriteOp::delete(INDEX, Track::Data, id)
}

fn write(ops: Vec<WriteOp>, request_no: i64) -> BulkWrite {
    BulkWrite {
        index: INDEX.to_owned(),
        ops,
        options: WriteOptions::default(),
        request_no,
    }
}

#[tokio::test]
async fn first_insert_writes_aborted_then_xmax_then_data() {
    let h = Harness::new(3);
    let outcome = h.coordinator.execute(write(vec![insert("0-1", 100, None)], 0)).await.unwrap();

    assert_eq!(h.writer.tracks(), vec![Track::Aborted, Track::Xmax, Track::Data]);
    assert_eq!(outcome.halted_at, None);

    let requests = h.writer.requests();
    assert_eq!(requests[0].ops.len(), 3);
    assert!(requests[0].ops.iter().all(|op| op.id == "100"));
    assert_eq!(requests[1].ops.len(), 1);
    assert_eq!(requests[1].ops[0].kind, OpKind::Delete);
    assert_eq!(requests[2].ops[0].version, VersionRequest::Forced(100));

    // The in-flight marker reached every partition.
    assert_eq!(h.memory.partitions_holding(INDEX, Track::Aborted, "100"), vec![0, 1, 2]);
    let first_key = &routing_keys(3)[0];
    let aborted = h.memory.get_routed(INDEX, Track::Aborted, "100", first_key);
    assert!(aborted.is_some_and(|doc| doc.source[ABORTED_XID_FIELD] == json!(100)));

    let data = h.memory.get(INDEX, Track::Data, "0-1").unwrap();
    assert_eq!(data.version, 100);
    assert_eq!(data.source["title"], json!("0-1"));
}

#[tokio::test]
async fn later_requests_do_not_mark_the_transaction_again() {
    let h = Harness::new(3);
    h.coordinator.execute(write(vec![insert("0-2", 100, None)], 1)).await.unwrap();
    assert_eq!(h.writer.tracks(), vec![Track::Xmax, Track::Data]);
    assert_eq!(h.memory.count(INDEX, Track::Aborted), 0);
}

#[tokio::test]
async fn updates_write_an_xmax_marker_for_the_previous_version() {
    let h = Harness::new(2);
    h.coordinator.execute(write(vec![insert("0-1", 100, None)], 0)).await.unwrap();
    h.coordinator
        .execute(write(vec![insert("0-2", 101, Some("0-1"))], 0))
        .await
        .unwrap();

    let marker = h.memory.get(INDEX, Track::Xmax, "0-1").unwrap();
    assert_eq!(marker.version, 101);
    assert_eq!(marker.source[REPLACEMENT_FIELD], json!("0-2"));
    let encoded = marker.source[ENCODED_TUPLE_FIELD].as_str().unwrap();
    let fields = decode_tuple_base64(encoded).unwrap();
    assert_eq!(fields.xid, TxId(101));
    assert_eq!(fields.location, RowLocation::new(0, 1));

    assert_eq!(h.memory.get(INDEX, Track::Data, "0-2").unwrap().version, 101);
}

#[tokio::test]
async fn deletes_remove_data_before_markers() {
    let h = Harness::new(1);
    h.coordinator.execute(write(vec![insert("0-1", 100, None)], 0)).await.unwrap();
    h.coordinator
        .execute(write(vec![insert("0-2", 101, Some("0-1"))], 0))
        .await
        .unwrap();
    let before = h.writer.requests().len();

    let report = h.coordinator.bulk(write(vec![delete("0-1")], 0)).await.unwrap();
    assert!(!report.errors);
    assert_eq!(h.writer.tracks()[before..].to_vec(), vec![Track::Data, Track::Xmax]);
    assert_eq!(h.memory.get(INDEX, Track::Data, "0-1"), None);
    assert_eq!(h.memory.get(INDEX, Track::Xmax, "0-1"), None);
}

#[tokio::test]
async fn failed_data_delete_leaves_markers_alone() {
    let h = Harness::new(1);
    h.writer.inject(
        Track::Data,
        Fault::FailAll(Failure::new(StatusCode::INTERNAL_SERVER_ERROR, FailureKind::Other, "boom")),
    );

    let report = h.coordinator.bulk(write(vec![delete("0-1"), delete("0-2")], 0)).await.unwrap();
    assert_eq!(h.writer.calls(Track::Data), 1);
    assert_eq!(h.writer.calls(Track::Xmax), 0);
    assert!(report.errors);
    assert_eq!(report.error_count, 2);
    let items = report.items.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.report.track == Track::Data && item.report.status == 500));
}

#[tokio::test]
async fn failing_phase_halts_the_sequence() {
    for (failing, expected) in [
        (Track::Aborted, vec![Track::Aborted]),
        (Track::Xmax, vec![Track::Aborted, Track::Xmax]),
    ] {
        let h = Harness::new(2);
        h.writer.inject(
            failing,
            Fault::FailAll(Failure::new(StatusCode::BAD_REQUEST, FailureKind::Other, "rejected")),
        );
        let outcome = h.coordinator.execute(write(vec![insert("0-1", 100, None)], 0)).await.unwrap();
        assert_eq!(h.writer.tracks(), expected);
        assert_eq!(outcome.halted_at.map(Phase::track), Some(failing));
        assert!(!outcome.executed(Phase::Data));
        assert_eq!(h.memory.get(INDEX, Track::Data, "0-1"), None);
    }
}

#[tokio::test]
async fn report_covers_only_executed_phases() {
    let h = Harness::new(4);
    h.writer.inject(
        Track::Aborted,
        Fault::FailAll(Failure::new(StatusCode::BAD_REQUEST, FailureKind::Other, "rejected")),
    );
    let report = h.coordinator.bulk(write(vec![insert("0-1", 7, None)], 0)).await.unwrap();
    assert!(report.errors);
    assert_eq!(report.error_count, 4);
    let items = report.items.unwrap();
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|item| item.report.track == Track::Aborted));
}

#[tokio::test]
async fn lost_marker_delete_races_are_not_errors() {
    let h = Harness::new(1);
    h.writer.inject(Track::Xmax, Fault::FailAll(Failure::version_conflict("lost the race")));

    let report = h.coordinator.bulk(write(vec![delete("0-1")], 0)).await.unwrap();
    assert!(!report.errors);
    assert_eq!(report.error_count, 0);
    // Still listed, just not counted.
    assert_eq!(report.items.map(|items| items.len()), Some(1));
}

#[tokio::test]
async fn uncounted_marker_failures_still_halt_inserts() {
    let h = Harness::new(1);
    h.writer.inject(Track::Xmax, Fault::FailAll(Failure::version_conflict("lost the race")));

    let outcome = h.coordinator.execute(write(vec![insert("0-1", 9, None)], 1)).await.unwrap();
    assert_eq!(outcome.halted_at, Some(Phase::Xmax));
    assert!(!outcome.executed(Phase::Data));
    assert_eq!(h.writer.calls(Track::Data), 0);
    assert_eq!(h.memory.get(INDEX, Track::Data, "0-1"), None);

    let report = BulkReport::classify(&outcome);
    assert!(!report.errors);
    assert_eq!(report.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_phase_times_out() {
    let h = Harness::new(1);
    h.writer.inject(Track::Xmax, Fault::Hang);
    let mut request = write(vec![insert("0-1", 5, None)], 1);
    request.options.timeout = Duration::from_secs(2);

    let report = h.coordinator.bulk(request).await.unwrap();
    assert!(report.errors);
    let items = report.items.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].report.status, 504);
    assert_eq!(h.writer.calls(Track::Data), 0);
}

#[tokio::test]
async fn backend_errors_fail_every_op_of_the_phase() {
    let h = Harness::new(1);
    h.writer.inject(Track::Data, Fault::Error(BackendError::Unavailable("no nodes".into())));
    let report = h
        .coordinator
        .bulk(write(vec![insert("0-1", 5, None), insert("0-2", 5, None)], 1))
        .await
        .unwrap();
    assert_eq!(report.error_count, 2);
    let items = report.items.unwrap();
    assert!(items.iter().all(|item| item.report.status == 503));
}

#[tokio::test]
async fn options_reach_every_phase() {
    let h = Harness::new(2);
    let options = WriteOptions {
        refresh: RefreshPolicy::Immediate,
        timeout: Duration::from_secs(5),
    };
    let mut request = write(vec![insert("0-1", 3, None)], 0);
    request.options = options;
    h.coordinator.bulk(request).await.unwrap();

    let requests = h.writer.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|request| request.options == options));
    assert_eq!(h.memory.refreshes(INDEX), 3);
}

#[tokio::test]
async fn empty_requests_write_nothing() {
    let h = Harness::new(1);
    let report = h.coordinator.bulk(write(vec![], 0)).await.unwrap();
    assert!(!report.errors);
    assert_eq!(report.items, None);
    assert!(h.writer.requests().is_empty());
}

#[tokio::test]
async fn translation_errors_write_nothing() {
    let h = Harness::new(1);
    let bad = WriteOp::index(INDEX, Track::Data, "0-1", source(json!({"_cmin": 0, "_zdb_seq": 0})));
    assert!(h.coordinator.bulk(write(vec![bad], 0)).await.is_err());
    assert!(h.coordinator.bulk(write(vec![delete("0-1"), insert("0-2", 1, None)], 0)).await.is_err());
    assert!(h.writer.requests().is_empty());
}

#[tokio::test]
async fn replayed_inserts_conflict_with_newer_versions() {
    let h = Harness::new(1);
    h.coordinator.execute(write(vec![insert("0-1", 50, None)], 1)).await.unwrap();
    let report = h.coordinator.bulk(write(vec![insert("0-1", 40, None)], 1)).await.unwrap();
    assert!(report.errors);
    let items = report.items.unwrap();
    assert_eq!(items[0].report.status, 409);
    assert_eq!(h.memory.get(INDEX, Track::Data, "0-1").unwrap().version, 50);
}
