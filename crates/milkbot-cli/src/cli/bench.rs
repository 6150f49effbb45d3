//! Broadcast fan-out benchmark.
//!
//! Every route broadcasts to every other route at the same time; the report
//! compares how many deliveries were expected with how many arrived.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use milkbot_core::route::Router;
use milkbot_types::config::RouterConfig;
use tokio::task::JoinSet;
use tracing::info;

/// Outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub routes: usize,
    pub broadcasts: usize,
    pub expected: usize,
    pub delivered: usize,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn is_complete(&self) -> bool {
        self.expected == self.delivered
    }
}

/// Register `routes` routes, have each send `broadcasts` broadcasts
/// concurrently, then stop the router and count deliveries.
pub async fn bench(config: RouterConfig, routes: usize, broadcasts: usize) -> Result<BenchReport> {
    let router: Arc<Router<usize>> = Arc::new(Router::new(config));
    let delivered = Arc::new(AtomicUsize::new(0));

    let mut endpoints = Vec::with_capacity(routes);
    for i in 0..routes {
        let route = router
            .add_route(format!("bench-{i}"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let counter = Arc::clone(&delivered);
        route.handler_func(move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        endpoints.push(route);
    }

    let started = Instant::now();
    let dispatch = router.spawn();

    let mut senders = JoinSet::new();
    for route in endpoints {
        senders.spawn(async move {
            for n in 0..broadcasts {
                route.send_broadcast(n).await?;
            }
            Ok::<_, milkbot_core::route::RouterError>(())
        });
    }
    while let Some(joined) = senders.join_next().await {
        joined.context("sender task panicked")??;
    }

    // Everything is queued; stopping drains the queue before run returns.
    router.stop();
    dispatch.await.context("dispatch task panicked")??;
    let elapsed = started.elapsed();

    let report = BenchReport {
        routes,
        broadcasts,
        expected: routes * broadcasts * routes.saturating_sub(1),
        delivered: delivered.load(Ordering::Relaxed),
        elapsed,
    };
    info!(
        expected = report.expected,
        delivered = report.delivered,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "bench finished"
    );
    Ok(report)
}

/// `milkbot bench`
pub async fn run_bench(
    config: RouterConfig,
    routes: usize,
    broadcasts: usize,
    json: bool,
) -> Result<()> {
    let report = bench(config, routes, broadcasts).await?;

    if json {
        let out = serde_json::json!({
            "routes": report.routes,
            "broadcasts": report.broadcasts,
            "expected": report.expected,
            "delivered": report.delivered,
            "elapsed_ms": report.elapsed.as_secs_f64() * 1000.0,
            "complete": report.is_complete(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Routes").fg(Color::White),
                Cell::new("Broadcasts").fg(Color::White),
                Cell::new("Expected").fg(Color::White),
                Cell::new("Delivered").fg(Color::White),
                Cell::new("Elapsed").fg(Color::White),
            ]);
        let delivered_color = if report.is_complete() {
            Color::Green
        } else {
            Color::Red
        };
        table.add_row(vec![
            Cell::new(report.routes),
            Cell::new(report.broadcasts),
            Cell::new(report.expected),
            Cell::new(report.delivered).fg(delivered_color),
            Cell::new(format!("{:.2?}", report.elapsed)),
        ]);

        println!();
        println!("{table}");
        println!();
    }

    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} broadcasts were not delivered",
            report.expected - report.delivered.min(report.expected),
            report.expected
        );
    }
    if !json {
        println!("  {} all broadcasts delivered", style("ok").green());
    }
    Ok(())
}
