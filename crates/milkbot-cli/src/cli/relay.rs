//! Forwarding chain demo.
//!
//! An origin route sends one packet to `hop-1`, which forwards it to `hop-2`,
//! and so on. The packet loses one unit of ttl per forward, so a short hop
//! budget stops it before the end of the chain.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use milkbot_core::route::{Router, RoutePacketHeader};
use milkbot_types::config::RouterConfig;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload the origin bounces off itself to find out when the chain is done.
const SETTLE: &str = "__settle__";

/// What one hop saw when the packet arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopRecord {
    pub hop: usize,
    pub header: RoutePacketHeader,
    /// Whether this hop handed the packet on. The router decides if the
    /// forward survives the hop budget.
    pub forwarded: bool,
}

enum Event {
    Arrived(HopRecord),
    Settled,
}

/// Build the chain, send one packet from the origin and collect every
/// arrival until the packet stops moving.
///
/// Every hop forwards unconditionally; the router drops the packet once its
/// ttl is spent. The end of the chain is found with a marker the origin
/// keeps re-sending to itself: the queue is FIFO with one consumer, so each
/// bounce lands behind whatever the previous hop enqueued, and after
/// `hops + 1` bounces no forward can still be pending.
pub async fn relay(config: RouterConfig, hops: usize) -> Result<Vec<HopRecord>> {
    let router: Arc<Router<String>> = Arc::new(Router::new(config));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let origin = router
        .add_route("origin")
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    {
        let bouncer = Arc::downgrade(&origin);
        let events = events_tx.clone();
        let bounces = AtomicUsize::new(0);
        origin.handler_func(move |_, data: &String| {
            if data != SETTLE {
                return;
            }
            if bounces.fetch_add(1, Ordering::Relaxed) >= hops {
                let _ = events.send(Event::Settled);
                return;
            }
            let sent = bouncer
                .upgrade()
                .map(|origin| origin.try_send("origin", SETTLE.to_string()));
            if !matches!(sent, Some(Ok(()))) {
                warn!("relay settle marker lost");
                let _ = events.send(Event::Settled);
            }
        });
    }

    for hop in 1..=hops {
        let route = router
            .add_route(format!("hop-{hop}"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let forwarder = Arc::downgrade(&route);
        let events = events_tx.clone();
        route.handler_func(move |header, data: &String| {
            let forwarded = hop < hops;
            let _ = events.send(Event::Arrived(HopRecord {
                hop,
                header: header.clone(),
                forwarded,
            }));
            if !forwarded {
                return;
            }
            let Some(forwarder) = forwarder.upgrade() else {
                return;
            };
            if let Err(e) = forwarder.try_send_forward(format!("hop-{}", hop + 1), header, data.clone())
            {
                warn!(hop, error = %e, "relay forward failed");
            }
        });
    }
    drop(events_tx);

    let dispatch = router.spawn();

    let mut records = Vec::new();
    if hops > 0 {
        origin
            .send("hop-1", "relay".to_string())
            .await
            .context("sending from origin")?;
        origin
            .send("origin", SETTLE.to_string())
            .await
            .context("sending settle marker")?;

        let collect = async {
            while let Some(event) = events_rx.recv().await {
                match event {
                    Event::Arrived(record) => records.push(record),
                    Event::Settled => break,
                }
            }
        };
        if timeout(SETTLE_TIMEOUT, collect).await.is_err() {
            router.stop();
            anyhow::bail!("relay chain did not settle within {SETTLE_TIMEOUT:?}");
        }
    }

    router.stop();
    dispatch.await.context("dispatch task panicked")??;
    Ok(records)
}

/// `milkbot relay`
pub async fn run_relay(config: RouterConfig, hops: usize, json: bool) -> Result<()> {
    let ttl = config.default_ttl;
    let records = relay(config, hops).await?;

    if json {
        let out = serde_json::json!({
            "hops": hops,
            "ttl": ttl,
            "reached": records.len(),
            "arrivals": records.iter().map(|r| serde_json::json!({
                "hop": r.hop,
                "header": r.header,
                "forwarded": r.forwarded,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Hop").fg(Color::White),
            Cell::new("Source").fg(Color::White),
            Cell::new("Dest").fg(Color::White),
            Cell::new("TTL").fg(Color::White),
            Cell::new("Stack").fg(Color::White),
            Cell::new("Forwarded").fg(Color::White),
        ]);
    for record in &records {
        table.add_row(vec![
            Cell::new(record.hop),
            Cell::new(&record.header.src).fg(Color::Cyan),
            Cell::new(&record.header.dest),
            Cell::new(record.header.ttl),
            Cell::new(record.header.stack.join(" > ")),
            Cell::new(if record.forwarded { "yes" } else { "no" }),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    if records.len() == hops {
        println!("  {} packet reached all {hops} hops", style("ok").green());
    } else {
        println!(
            "  {} packet stopped after {} of {hops} hops (ttl {ttl})",
            style("i").blue().bold(),
            records.len(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn packet_walks_the_whole_chain_with_enough_budget() {
        let records = relay(RouterConfig::with_ttl(10), 4).await.unwrap();
        assert_eq!(records.len(), 4);

        let ttls: Vec<u8> = records.iter().map(|r| r.header.ttl).collect();
        assert_eq!(ttls, vec![10, 9, 8, 7]);

        let last = &records[3].header;
        assert_eq!(last.src, "origin");
        assert_eq!(last.dest, "hop-4");
        assert_eq!(last.stack, vec!["origin", "hop-1", "hop-2", "hop-3"]);
    }

    #[tokio::test]
    async fn short_budget_stops_the_packet_early() {
        let records = relay(RouterConfig::with_ttl(2), 5).await.unwrap();
        let hops: Vec<usize> = records.iter().map(|r| r.hop).collect();
        assert_eq!(hops, vec![1, 2]);

        // hop-2 still tried to forward; the router dropped it at ttl 1.
        let last = &records[1];
        assert!(last.forwarded);
        assert_eq!(last.header.ttl, 1);
    }

    #[tokio::test]
    async fn last_hop_does_not_forward() {
        let records = relay(RouterConfig::with_ttl(10), 3).await.unwrap();
        let forwarded: Vec<bool> = records.iter().map(|r| r.forwarded).collect();
        assert_eq!(forwarded, vec![true, true, false]);
    }

    #[tokio::test]
    async fn empty_chain_sends_nothing() {
        let records = relay(RouterConfig::default(), 0).await.unwrap();
        assert!(records.is_empty());
    }
}
