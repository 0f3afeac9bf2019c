//! Named environments example.
//!
//! Writes two `.properties` files, installs a process-wide registry that
//! reads them, and opens sessions against each environment. Mapping
//! entries come from a source that is consulted once per namespace.
//!
//! # Running
//!
//! ```bash
//! cargo run --example environments
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use minibatis::{
    ConnectOptions, Connection, Driver, DriverError, Entity, Environments, Error, MappingEntry,
    ParamMap, PropertiesDir, RowSet, SqlValue, StatementStore,
};

#[derive(Debug, Default, Entity)]
#[minibatis(type_name = "app.pojo.OrderPO")]
struct Order {
    id: i64,
    customer_name: Option<String>,
}

/// Accepts every statement; queries return nothing.
struct NullDriver;

struct NullConnection {
    url: String,
    auto_commit: bool,
}

#[async_trait]
impl Driver for NullDriver {
    fn name(&self) -> &str {
        "null"
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DriverError> {
        Ok(Box::new(NullConnection {
            url: options.url.clone(),
            auto_commit: true,
        }))
    }
}

#[async_trait]
impl Connection for NullConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DriverError> {
        println!("[{}] {sql} {params:?}", self.url);
        Ok(1)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<RowSet, DriverError> {
        println!("[{}] {sql} {params:?}", self.url);
        Ok(RowSet::empty())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn load_namespace(namespace: &str) -> minibatis::Result<Vec<MappingEntry>> {
    println!("loading mappings for {namespace}");
    match namespace {
        "app.dao.OrderDao" => Ok(vec![
            MappingEntry::new(
                "app.dao.OrderDao.insert",
                "insert into t_order (id, customer_name) values (#{id}, #{customerName})",
            )?,
            MappingEntry::new(
                "app.dao.OrderDao.findByCustomer",
                "select id, customer_name from t_order where customer_name = #{customerName}",
            )?
            .result_type("OrderPO"),
        ]),
        _ => Ok(Vec::new()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let dir = std::env::temp_dir().join("minibatis-example-conf");
    std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
    for (name, url) in [
        ("default-config", "null://primary"),
        ("reporting", "null://replica"),
    ] {
        let text = format!("driver=null\nurl={url}\ninitialSize=1\nminIdle=0\nmaxActive=2\n");
        std::fs::write(dir.join(format!("{name}.properties")), text)
            .map_err(|e| Error::Config(e.to_string()))?;
    }

    let store = StatementStore::builder()
        .source(Arc::new(load_namespace))
        .build();

    let envs = Environments::install(
        Environments::builder()
            .driver(Arc::new(NullDriver))
            .config_source(PropertiesDir::new(&dir))
            .statements(Arc::new(store))
            .build()?,
    )?;

    let order = Order {
        id: 42,
        customer_name: Some("Wang".into()),
    };

    let mut session = envs.open_default_session(true).await?;
    session.insert("app.dao.OrderDao.insert", &order).await?;
    session.close().await?;

    let mut report = Environments::global()?
        .open_session("reporting", true)
        .await?;
    let orders: Vec<Order> = report
        .select_list(
            "app.dao.OrderDao.findByCustomer",
            ParamMap::new().with("customerName", "Wang"),
        )
        .await?;
    println!("{} order(s) on the replica", orders.len());
    report.close().await?;

    println!("built environments: {:?}", envs.environments());
    envs.shutdown().await;

    std::fs::remove_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
    Ok(())
}
