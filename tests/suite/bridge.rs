//! Native-calls-foreign across the two schedulers

use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use isthmus_engine::{
    CallbackCapability, Completion, FnCapability, ForeignError, GatherPolicy, ResolveError,
    add_via_foreign, gather, invoke_foreign_async, invoke_foreign_async_with_timeout,
};
use isthmus_types::{ArithmeticError, DomainError, ErrorKind, ForeignValue};
use tokio::sync::mpsc::unbounded_channel;
use tokio::{task, time};

use crate::common::{async_add, foreign_runtime};

#[tokio::test]
async fn native_awaits_foreign_add() {
    let runtime = foreign_runtime();
    let add = runtime.register(async_add());
    assert_eq!(add_via_foreign(&add, 2, 3).await, Ok(5));
    assert_eq!(add_via_foreign(&add, 0, 0).await, Ok(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_native_tasks_share_one_foreign_loop() {
    let runtime = foreign_runtime();
    let add = runtime.register(async_add());
    let calls = (0..64_u64).map(|i| {
        let add = add.clone();
        async move { add_via_foreign(&add, i, i).await }
    });
    let sums = gather(calls, GatherPolicy::AllOrFirstError).await.unwrap();
    assert_eq!(sums, (0..64_u64).map(|i| i * 2).collect::<Vec<_>>());
}

#[tokio::test]
async fn foreign_result_out_of_range_is_a_binding_violation() {
    let runtime = foreign_runtime();
    let negative = runtime.register(FnCapability::new("add", |_args, _ctx| async {
        Ok(ForeignValue::Int(-1))
    }));
    let err = add_via_foreign(&negative, 1, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingViolation);
}

#[tokio::test]
async fn foreign_failures_keep_their_kind() {
    let runtime = foreign_runtime();
    let declared = runtime.register(FnCapability::new("declared", |_args, _ctx| async {
        Err(ForeignError::Domain(DomainError::Arithmetic(
            ArithmeticError::IntegerOverflow { a: 1, b: 2 },
        )))
    }));
    let raised = runtime.register(FnCapability::new("raised", |_args, _ctx| async {
        Err(ForeignError::Raised("TypeError: x is undefined".to_owned()))
    }));

    let err = invoke_foreign_async(&declared, Vec::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainError);
    let err = invoke_foreign_async(&raised, Vec::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFailure);
    assert!(err.message().contains("TypeError"));
}

#[tokio::test]
async fn cancelled_invocation_is_observed_and_delivers_nothing() {
    let runtime = foreign_runtime();
    let observed = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));
    let (seen, done) = (Arc::clone(&observed), Arc::clone(&completed));
    let slow = runtime.register(FnCapability::new("slow", move |_args, ctx| {
        let seen = Arc::clone(&seen);
        let done = Arc::clone(&done);
        async move {
            tokio::select! {
                () = ctx.cancelled() => {
                    seen.store(true, Ordering::SeqCst);
                    Err(ForeignError::Raised("cancelled".to_owned()))
                }
                () = time::sleep(Duration::from_secs(5)) => {
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(ForeignValue::Null)
                }
            }
        }
    }));

    let outcome =
        time::timeout(Duration::from_millis(30), invoke_foreign_async(&slow, Vec::new()))
            .await;
    assert!(outcome.is_err());

    time::sleep(Duration::from_millis(100)).await;
    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timeout_cancels_and_reports_internal_failure() {
    let runtime = foreign_runtime();
    let hang = runtime.register(FnCapability::new("hang", |_args, ctx| async move {
        ctx.cancelled().await;
        Ok(ForeignValue::Null)
    }));
    let err = invoke_foreign_async_with_timeout(&hang, Vec::new(), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFailure);
    assert!(err.message().starts_with("foreign capability `hang` timed out"));
}

#[tokio::test]
async fn double_resolution_is_rejected() {
    let runtime = foreign_runtime();
    let (tx, rx) = mpsc::channel();
    let twice = runtime.register(CallbackCapability::new("twice", move |_args, _ctx, completion| {
        let first = completion.resolve(Ok(ForeignValue::from(1_u64)));
        let second = completion.resolve(Ok(ForeignValue::from(2_u64)));
        tx.send((first, second)).ok();
    }));

    let value = invoke_foreign_async(&twice, Vec::new()).await.unwrap();
    assert_eq!(value, ForeignValue::from(1_u64));
    let (first, second) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(ResolveError::AlreadyResolved));
}

#[tokio::test]
async fn panicking_foreign_code_is_contained() {
    let runtime = foreign_runtime();
    let boom = runtime.register(FnCapability::new("boom", |_args, _ctx| async {
        task::yield_now().await;
        if true {
            panic!("host blew up");
        }
        Ok(ForeignValue::Null)
    }));
    let err = invoke_foreign_async(&boom, Vec::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFailure);
    assert!(err.message().contains("host blew up"));

    // The loop survives.
    let add = runtime.register(async_add());
    assert_eq!(add_via_foreign(&add, 1, 1).await, Ok(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_racing_an_in_flight_resolution_never_delivers_late() {
    let runtime = foreign_runtime();
    let (tx, mut rx) = unbounded_channel();
    let racer = runtime.register(CallbackCapability::new(
        "racer",
        move |args: Vec<ForeignValue>, _ctx, completion: Completion| {
            let delay_ms = args
                .first()
                .and_then(ForeignValue::as_int)
                .and_then(|ms| u64::try_from(ms).ok())
                .unwrap_or(0);
            let tx = tx.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(delay_ms)).await;
                let resolved = completion.resolve(Ok(ForeignValue::from(delay_ms)));
                tx.send((delay_ms, resolved)).ok();
            });
        },
    ));

    let mut outcomes = Vec::new();
    for delay_ms in 0..=40_u64 {
        let outcome = invoke_foreign_async_with_timeout(
            &racer,
            vec![ForeignValue::from(delay_ms)],
            Duration::from_millis(20),
        )
        .await;
        outcomes.push((delay_ms, outcome));
    }
    time::sleep(Duration::from_millis(100)).await;
    let mut resolutions = HashMap::new();
    while let Ok((delay_ms, resolved)) = rx.try_recv() {
        resolutions.insert(delay_ms, resolved);
    }

    let (mut delivered, mut timed_out) = (0, 0);
    for (delay_ms, outcome) in outcomes {
        let resolved = resolutions.get(&delay_ms);
        match outcome {
            Ok(value) => {
                assert_eq!(value, ForeignValue::from(delay_ms));
                assert_eq!(resolved, Some(&Ok(())), "value delivered to a cancelled caller");
                delivered += 1;
            }
            Err(err) => {
                assert!(err.message().contains("timed out"), "{err}");
                assert_ne!(resolved, Some(&Err(ResolveError::AlreadyResolved)));
                timed_out += 1;
            }
        }
    }
    assert!(delivered > 0 && timed_out > 0, "{delivered} delivered, {timed_out} timed out");
}
