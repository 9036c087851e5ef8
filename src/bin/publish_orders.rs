//! Order stream seeder.
//!
//! Publishes deterministic sample orders (`order_<n>`) onto the topic the
//! service consumes, split across concurrent tasks.
//!
//! ```bash
//! publish_orders --brokers localhost:9092 --topic Json-orders --count 1000 --tasks 8
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::future::join_all;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_ingest::messaging::OrderPublisher;
use order_ingest::models::sample_order;

#[derive(Parser, Debug)]
#[command(name = "publish_orders")]
#[command(about = "Publish sample orders to the order stream", long_about = None)]
struct Args {
    /// Kafka bootstrap servers
    #[arg(long, default_value = "localhost:9092")]
    brokers: String,

    /// Topic the order service consumes
    #[arg(long, default_value = "Json-orders")]
    topic: String,

    /// Number of orders to publish
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Number of concurrent publishing tasks
    #[arg(long, default_value_t = 1)]
    tasks: u32,

    /// Number of the first order; later orders count up from here
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i32).range(0..))]
    start: i32,

    /// Create the topic before publishing
    #[arg(long)]
    create_topic: bool,

    /// Partitions used when creating the topic
    #[arg(long, default_value_t = 3, requires = "create_topic")]
    partitions: i32,
}

/// Split `count` order numbers starting at `start` into at most `tasks`
/// contiguous ranges of near-equal size.
///
/// Order numbers become the integer fields of each sample order, so the last
/// one must still fit in an `i32`.
fn partition_range(start: i32, count: u32, tasks: u32) -> Result<Vec<Range<i32>>> {
    let end = i32::try_from(count)
        .ok()
        .and_then(|count| start.checked_add(count))
        .with_context(|| {
            format!(
                "cannot publish {} orders from order_{}: order numbers stop at {}",
                count,
                start,
                i32::MAX
            )
        })?;

    let tasks = tasks.clamp(1, count.max(1)) as i32;
    let count = end - start;
    let base = count / tasks;
    let extra = count % tasks;

    let mut next = start;
    Ok((0..tasks)
        .map(|i| {
            let len = base + i32::from(i < extra);
            let range = next..next + len;
            next += len;
            range
        })
        .filter(|range| !range.is_empty())
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let publisher = Arc::new(OrderPublisher::new(&args.brokers)?);

    if args.create_topic {
        publisher.ensure_topic(&args.topic, args.partitions).await?;
    }

    let started = Instant::now();
    let handles = partition_range(args.start, args.count, args.tasks)?
        .into_iter()
        .map(|range| {
            let publisher = publisher.clone();
            let topic = args.topic.clone();
            tokio::spawn(async move {
                let mut published = 0u32;
                for n in range {
                    publisher
                        .publish(&topic, &sample_order(n))
                        .await
                        .with_context(|| format!("failed to publish order_{}", n))?;
                    published += 1;
                }
                anyhow::Ok(published)
            })
        });

    let mut published = 0u32;
    for result in join_all(handles).await {
        published += result.context("publishing task panicked")??;
    }

    tracing::info!(
        published,
        topic = %args.topic,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Finished publishing orders"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_range_covers_every_order_once() {
        let ranges = partition_range(1, 10, 3).unwrap();
        assert_eq!(ranges, vec![1..5, 5..8, 8..11]);
    }

    #[test]
    fn test_more_tasks_than_orders() {
        let ranges = partition_range(5, 2, 8).unwrap();
        assert_eq!(ranges, vec![5..6, 6..7]);
    }

    #[test]
    fn test_zero_count_publishes_nothing() {
        assert!(partition_range(1, 0, 4).unwrap().is_empty());
    }

    #[test]
    fn test_range_past_largest_order_number_is_rejected() {
        assert!(partition_range(i32::MAX, 2, 1).is_err());
        assert!(partition_range(0, u32::MAX, 4).is_err());
        assert_eq!(partition_range(i32::MAX - 1, 1, 1).unwrap(), vec![i32::MAX - 1..i32::MAX]);
    }

    #[test]
    fn test_negative_start_is_rejected() {
        assert!(Args::try_parse_from(["publish_orders", "--start", "-1"]).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "publish_orders",
            "--topic",
            "orders",
            "--count",
            "50",
            "--tasks",
            "4",
            "--create-topic",
            "--partitions",
            "6",
        ])
        .unwrap();

        assert_eq!(args.topic, "orders");
        assert_eq!(args.count, 50);
        assert_eq!(args.partitions, 6);
        assert!(args.create_topic);
        assert_eq!(args.start, 1);
    }
}
