//! One pass over every boundary path, printing what came back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};

use isthmus_bench::random_record;
use isthmus_core::{NumbersArena, codec, exports, marshal};
use isthmus_engine::{
    FnCapability, ForeignRuntime, ForeignRuntimeConfig, NativeOps, add_via_foreign, gather,
    say_after_op,
};
use isthmus_fetch::{Fetcher, StatusClient};
use isthmus_types::{BoundaryResult, ForeignValue, GatherPolicy};
use tokio::time;

pub struct DemoContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub status: StatusClient,
    pub foreign: ForeignRuntimeConfig,
    pub policy: GatherPolicy,
}

fn show(label: &str, result: &BoundaryResult<ForeignValue>) {
    match result {
        Ok(value) => println!("{label:<28} ok    {}", value.to_json()),
        Err(error) => println!("{label:<28} error {}", error.to_foreign().to_json()),
    }
}

pub async fn run(ctx: &DemoContext) -> Result<()> {
    errors();
    records()?;
    numbers()?;
    foreign_add(ctx.foreign.clone()).await?;
    greetings(ctx.policy).await?;
    status(ctx).await?;
    Ok(())
}

fn errors() {
    let max = ForeignValue::from(u64::MAX);
    let one = ForeignValue::from(1_u64);
    let zero = ForeignValue::from(0_u64);
    show("add(2, 3)", &exports::add(&ForeignValue::from(2_u64), &ForeignValue::from(3_u64)));
    show("add(u64::MAX, 1)", &exports::add(&max, &one));
    show("sub(0, 1)", &exports::sub(&zero, &one));
    show("div(1, 0)", &exports::div(&one, &zero));
    show("add(-1, 1)", &exports::add(&ForeignValue::Int(-1), &one));
    show("equal(1, 1)", &exports::equal(&one, &one));
    show("call(\"mul\", [1, 1])", &exports::call("mul", &[one.clone(), one]));
}

fn records() -> Result<()> {
    let record = random_record(1);
    let foreign = marshal::to_foreign(&record);
    let back = marshal::to_native(&foreign)?;
    ensure!(back == record, "record changed on a foreign round trip");

    let bytes = codec::serialize(&record)?;
    let decoded = codec::deserialize(&bytes)?;
    ensure!(decoded == record, "record changed on a serialized round trip");
    println!(
        "{:<28} ok    {} numbers, colors {:?}, {} bytes serialized",
        "record round trip",
        record.favorite_numbers.len(),
        record.favorite_colors,
        bytes.len()
    );

    show("to_native(missing id)", &marshal::to_native(&ForeignValue::object([
        ("favorite_numbers", ForeignValue::List(Vec::new())),
        ("favorite_colors", ForeignValue::List(Vec::new())),
    ]))
    .map(|r| marshal::to_foreign(&r)));
    Ok(())
}

fn numbers() -> Result<()> {
    let arena = NumbersArena::new();
    let handle = arena.create();
    show("find_min(empty)", &arena.find_min(handle));
    for n in [42_u64, 7, 19, 7, 3] {
        arena.add_number(handle, &ForeignValue::from(n))?;
    }
    show("find_min", &arena.find_min(handle));
    show("max_number", &arena.max_number(handle));
    show("quick_sort", &arena.quick_sort(handle, None));
    arena.release(handle)?;
    show("find_min(released)", &arena.find_min(handle));
    Ok(())
}

async fn foreign_add(config: ForeignRuntimeConfig) -> Result<()> {
    let runtime = ForeignRuntime::start(config)?;
    let add = runtime.register(FnCapability::new(
        "add",
        |args: Vec<ForeignValue>, _ctx| async move {
            time::sleep(Duration::from_millis(5)).await;
            let a = args.first().and_then(ForeignValue::as_int).unwrap_or(0);
            let b = args.get(1).and_then(ForeignValue::as_int).unwrap_or(0);
            Ok(ForeignValue::Int(a + b))
        },
    ));
    show(
        "foreign add(2, 3)",
        &add_via_foreign(&add, 2, 3).await.map(ForeignValue::from),
    );
    drop(add);
    runtime.shutdown_async().await;
    Ok(())
}

async fn greetings(policy: GatherPolicy) -> Result<()> {
    let greetings = gather(
        [
            say_after_op(&ForeignValue::from(50_u64), &ForeignValue::from("A")),
            say_after_op(&ForeignValue::from(10_u64), &ForeignValue::from("B")),
        ],
        policy,
    )
    .await?;
    show("gather(say_after)", &Ok(ForeignValue::List(greetings)));
    Ok(())
}

/// Network failures are printed, not fatal. A round the next blocks cannot
/// follow is.
async fn status(ctx: &DemoContext) -> Result<()> {
    let ops = NativeOps::new(Arc::clone(&ctx.fetcher), ctx.status.clone());
    let last = ops.last_round().await;
    show("last_round", &last);
    let Ok(last) = last else {
        return Ok(());
    };
    let Some(round) = last.as_int().and_then(|r| u64::try_from(r).ok()) else {
        return Ok(());
    };
    let (next, after_next) = following_rounds(round)?;
    let outcome = gather(
        [
            ops.wait_for_block_after(&ForeignValue::from(after_next)),
            ops.wait_for_block_after(&ForeignValue::from(next)),
        ],
        ctx.policy,
    )
    .await;
    match outcome {
        Ok(rounds) => show("gather(wait_for_block)", &Ok(ForeignValue::List(rounds))),
        Err(err) => {
            tracing::warn!(index = err.index, "status gather failed");
            show("gather(wait_for_block)", &Err(err.error));
        }
    }
    Ok(())
}

fn following_rounds(round: u64) -> Result<(u64, u64)> {
    let next = round
        .checked_add(1)
        .with_context(|| format!("last-round {round} has no successor"))?;
    let after_next = next
        .checked_add(1)
        .with_context(|| format!("last-round {round} has no second successor"))?;
    Ok((next, after_next))
}
