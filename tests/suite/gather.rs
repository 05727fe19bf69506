//! Foreign-calls-native gathers over timed, HTTP and collection operations

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use isthmus_core::{CancelSignal, NumbersArena, cancel_pair};
use isthmus_engine::{GatherPolicy, GatherSet, append_numbers, gather, say_after_op, with_cancel};
use isthmus_types::{DomainError, ErrorEnvelope, ErrorKind, FetchError, ForeignValue};
use tokio::time;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mount_status, mount_wait_for_block, native_ops, start_status_mock};

fn greet(ms: u64, who: &str) -> isthmus_engine::OpFuture {
    say_after_op(&ForeignValue::from(ms), &ForeignValue::from(who))
}

#[tokio::test]
async fn results_follow_input_order_not_completion_order() {
    let out = gather([greet(50, "A"), greet(10, "B")], GatherPolicy::AllOrFirstError)
        .await
        .unwrap();
    assert_eq!(
        out,
        [ForeignValue::from("Hello, A!"), ForeignValue::from("Hello, B!")]
    );
}

#[tokio::test]
async fn first_error_fast_does_not_wait_for_slow_members() {
    let mut set = GatherSet::new(GatherPolicy::FirstErrorFast);
    set.push(greet(500, "slow"));
    set.push(say_after_op(&ForeignValue::Int(-1), &ForeignValue::from("bad")));
    let started = Instant::now();
    let err = set.run().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(err.index, 1);
    assert_eq!(err.error.kind(), ErrorKind::BindingViolation);
}

#[tokio::test]
async fn first_error_fast_reports_a_panicking_member_and_leaves_the_rest_running() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let mut set = GatherSet::new(GatherPolicy::FirstErrorFast);
    set.push(async move {
        time::sleep(Duration::from_millis(100)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<_, ErrorEnvelope>(ForeignValue::from("slow"))
    });
    set.push(async {
        time::sleep(Duration::from_millis(5)).await;
        if true {
            panic!("member blew up");
        }
        Ok::<_, ErrorEnvelope>(ForeignValue::Null)
    });

    let err = set.run().await.unwrap_err();
    assert_eq!(err.index, 1);
    assert_eq!(err.error.kind(), ErrorKind::InternalFailure);
    assert_eq!(err.error.message(), "member blew up");
    assert_eq!(err.failures.len(), 1);
    assert!(!finished.load(Ordering::SeqCst));

    time::sleep(Duration::from_millis(250)).await;
    assert!(finished.load(Ordering::SeqCst), "detached member was stopped");
}

#[tokio::test]
async fn all_or_first_error_collects_every_failure() {
    let err = gather(
        [
            greet(5, "ok"),
            say_after_op(&ForeignValue::Null, &ForeignValue::from("x")),
            say_after_op(&ForeignValue::from(1_u64), &ForeignValue::Null),
        ],
        GatherPolicy::AllOrFirstError,
    )
    .await
    .unwrap_err();
    let indices: Vec<usize> = err.failures.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, [1, 2]);
}

#[tokio::test]
async fn status_polling_gathers_concurrently() {
    let server = start_status_mock().await;
    mount_status(&server, 100).await;
    mount_wait_for_block(&server, 102, Duration::from_millis(100)).await;
    mount_wait_for_block(&server, 101, Duration::from_millis(100)).await;
    let ops = native_ops(&server, Duration::from_secs(5));

    let last = ops.last_round().await.unwrap();
    assert_eq!(last, ForeignValue::from(100_u64));

    let started = Instant::now();
    let rounds = gather(
        [
            ops.wait_for_block_after(&ForeignValue::from(102_u64)),
            ops.wait_for_block_after(&ForeignValue::from(101_u64)),
        ],
        GatherPolicy::AllOrFirstError,
    )
    .await
    .unwrap();
    assert_eq!(rounds, [ForeignValue::from(103_u64), ForeignValue::from(102_u64)]);
    assert!(started.elapsed() < Duration::from_millis(190));
}

#[tokio::test]
async fn http_failures_map_to_fetch_domain_errors() {
    let server = start_status_mock().await;
    Mock::given(method("GET"))
        .and(path("/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stalled"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let ops = native_ops(&server, Duration::from_millis(100));

    let err = gather(
        [
            ops.http_get(&ForeignValue::Str(format!("{}/unavailable", server.uri()))),
            ops.http_get(&ForeignValue::Str(format!("{}/stalled", server.uri()))),
            ops.last_round(),
        ],
        GatherPolicy::AllOrFirstError,
    )
    .await
    .unwrap_err();

    let domains: Vec<Option<&DomainError>> =
        err.failures.iter().map(|(_, e)| e.as_domain()).collect();
    assert!(matches!(
        domains[0],
        Some(DomainError::Fetch(FetchError::Status { status: 503, .. }))
    ));
    assert!(matches!(
        domains[1],
        Some(DomainError::Fetch(FetchError::Timeout { .. }))
    ));
    assert!(matches!(
        domains[2],
        Some(DomainError::Fetch(FetchError::Malformed { .. }))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_never_lose_entries() {
    let arena = Arc::new(NumbersArena::new());
    let handle = arena.create();
    let tasks = 32_u64;
    let per_task = 100_u64;
    let batches = (0..tasks).map(|t| {
        let numbers = (0..per_task).map(|i| ForeignValue::from(t * per_task + i)).collect();
        append_numbers(Arc::clone(&arena), handle, numbers, CancelSignal::never())
    });
    gather(batches, GatherPolicy::AllOrFirstError).await.unwrap();

    assert_eq!(arena.len(handle).unwrap(), (tasks * per_task) as usize);
    assert_eq!(arena.find_min(handle).unwrap(), ForeignValue::from(0_u64));
    assert_eq!(
        arena.max_number(handle).unwrap(),
        ForeignValue::from(tasks * per_task - 1)
    );
    let sorted = arena.quick_sort(handle, None).unwrap();
    let expected: Vec<ForeignValue> = (0..tasks * per_task).map(ForeignValue::from).collect();
    assert_eq!(sorted, ForeignValue::List(expected));
}

#[tokio::test]
async fn cancelled_native_op_yields_nothing() {
    let (trigger, signal) = cancel_pair();
    let op = greet(5_000, "never");
    let cancel = tokio::spawn(async move {
        time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });
    let outcome = with_cancel(&signal, op).await.unwrap();
    assert!(outcome.is_cancelled());
    assert!(outcome.completed().is_none());
    cancel.await.unwrap();
}
