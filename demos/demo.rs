// # Dynamic Filter Service Demo
//
// Drives the service end to end against a scripted in-memory supplier, the
// way an integration harness would, and prints the predicate as it
// tightens. There is no coordinator here to embed the service in — this is
// a standalone walk-through of one query's dynamic filtering lifecycle.

use dynamic_filter_service::dynamic_filter::domain::Domain;
use dynamic_filter_service::dynamic_filter::ids::{ColHandle, FilterId, QueryId};
use dynamic_filter_service::dynamic_filter::stage::{StageSnapshot, StageState, Supplier, TaskSummary};
use dynamic_filter_service::dynamic_filter::DynamicFilterService;
use dynamic_filter_service::{DynamicFilterConfig, Result, VERSION};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// A supplier over two tasks, whose values both exist from the start but
/// are revealed to the caller one at a time across successive ticks, the
/// way a real supplier's view of a partitioned build side fills in as tasks
/// finish and report.
struct TwoTaskSupplier {
    values: [i64; 2],
    revealed: Mutex<usize>,
}

impl TwoTaskSupplier {
    fn new() -> Self {
        let mut rng = rand::rng();
        Self {
            values: [rng.random_range(1..100), rng.random_range(100..200)],
            revealed: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Supplier for TwoTaskSupplier {
    async fn stage_snapshots(&self) -> Result<Vec<StageSnapshot>> {
        let mut revealed = self.revealed.lock().unwrap();
        if *revealed < self.values.len() {
            *revealed += 1;
        }

        let task_summaries = self.values[..*revealed]
            .iter()
            .map(|value| {
                let mut task = TaskSummary::default();
                task.filters.insert(
                    FilterId(1),
                    Domain::single(dynamic_filter_service::common::Value::Integer(*value)),
                );
                task
            })
            .collect();

        Ok(vec![StageSnapshot {
            stage_state: if *revealed == self.values.len() {
                StageState::Done
            } else {
                StageState::Running
            },
            number_of_tasks: self.values.len(),
            task_summaries,
        }])
    }
}

fn print_banner() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║         Dynamic Filter Service - Demo Harness              ║");
    println!("║         version {:<10}                                ║", VERSION);
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    print_banner();

    let config = DynamicFilterConfig {
        refresh_interval: Duration::from_millis(200),
    };
    tracing::info!(?config, "starting dynamic filter service");

    let mut service = DynamicFilterService::new(config);
    service.start();

    let query_id = QueryId::new_v4();
    service.register(
        query_id,
        std::sync::Arc::new(TwoTaskSupplier::new()),
        HashSet::from([FilterId(1)]),
        HashSet::from([FilterId(1)]),
        HashSet::new(),
    );

    let mut symbols = HashMap::new();
    symbols.insert("build_key".to_string(), ColHandle::new(1, 1));
    let filter = service.create_dynamic_filter(
        query_id,
        &[(FilterId(1), "build_key".to_string())],
        &symbols,
    );

    println!("waiting for dynamic filter {} to complete...", FilterId(1));
    while !filter.is_complete() {
        filter.blocked().await;
        println!("predicate so far: {}", filter.current_predicate().domain(&ColHandle::new(1, 1)));
    }

    println!();
    println!("╭─────────────────────────────────────────────────────────╮");
    println!("│  dynamic filter complete                                 │");
    println!("╰─────────────────────────────────────────────────────────╯");
    println!("final predicate: {}", filter.current_predicate().domain(&ColHandle::new(1, 1)));

    service.stop().await;
    Ok(())
}
