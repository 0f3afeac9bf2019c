//! Connection pool walkthrough.
//!
//! Runs the pool against a toy in-memory connection manager and prints the
//! pool status as contexts acquire and release connections.
//!
//! # Running
//!
//! ```bash
//! cargo run -p minibatis-pool --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use minibatis_pool::{
    ConnectionLifecycle, ConnectionManager, ContextId, Pool, PoolConfig, PoolError,
};
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
#[error("toy database is offline")]
struct Offline;

#[derive(Default)]
struct ToyManager {
    serial: AtomicU32,
}

struct ToyConnection {
    serial: u32,
    auto_commit: bool,
}

#[async_trait::async_trait]
impl ConnectionManager for ToyManager {
    type Connection = ToyConnection;
    type Error = Offline;

    async fn connect(&self) -> Result<ToyConnection, Offline> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(ToyConnection {
            serial: self.serial.fetch_add(1, Ordering::Relaxed),
            auto_commit: true,
        })
    }
}

#[async_trait::async_trait]
impl ConnectionLifecycle for ToyConnection {
    async fn reset(&mut self) -> Result<(), PoolError> {
        self.auto_commit = true;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Connection Pool Example ===\n");

    let pool = Pool::builder(ToyManager::default())
        .initial_size(3)
        .min_idle(2)
        .max_active(4)
        .max_wait(Duration::from_millis(200))
        .build()
        .await?;
    println!("opened: {:?}", pool.status());

    // Affinity: one context, one physical connection.
    let ctx = ContextId::new();
    let first = pool.get(&ctx).await?;
    let again = pool.get(&ctx).await?;
    println!(
        "{ctx}: connection {} twice? {}",
        first.lock().await?.serial,
        first.same_connection(&again)
    );

    // Leave the connection in manual-commit mode; release restores it.
    first.lock().await?.auto_commit = false;
    first.close().await?;
    println!("after release: {:?}", pool.status());

    // Fill the pool to capacity.
    let mut held = Vec::new();
    for _ in 0..4 {
        held.push(pool.get(&ContextId::new()).await?);
    }
    println!("at capacity: {:?}", pool.status());

    let started = Instant::now();
    match pool.get(&ContextId::new()).await {
        Err(PoolError::CapacityExceeded { max }) => {
            println!("refused after {:?} (max_active = {max})", started.elapsed());
        }
        other => println!("unexpected: {other:?}"),
    }

    for conn in &held {
        conn.close().await?;
    }
    println!("all released: {:?}", pool.status());

    pool.close().await;
    println!("\n=== Example Complete ===");
    Ok(())
}
