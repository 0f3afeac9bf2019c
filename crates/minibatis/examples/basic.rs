//! Basic session example.
//!
//! Registers a few mapping entries for a user table, opens a session over a
//! small in-memory driver and runs inserts, updates and queries by id.
//!
//! # Running
//!
//! ```bash
//! cargo run --example basic
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use minibatis::{
    Arg, ColMetaData, ConnectOptions, Connection, DataSourceConfig, Driver, DriverError, Entity,
    Error, MappingEntry, ParamMap, Params, PoolConfig, RowSet, SqlSessionFactory, SqlValue,
    StatementStore,
};
use parking_lot::Mutex;

#[derive(Debug, Default, Entity)]
#[minibatis(type_name = "app.pojo.UserPO")]
struct User {
    id: i64,
    name: Option<String>,
    old_car: Option<String>,
}

const INSERT: &str = "insert into t_user (id, name, old_car) values (?, ?, ?)";
const UPDATE_CAR: &str = "update t_user set old_car = ? where name = ?";
const FIND_BY_NAME: &str = "select id, name, old_car from t_user where name = ?";

/// Keeps one table in memory and understands exactly three statements.
#[derive(Default)]
struct MemoryDriver {
    rows: Arc<Mutex<Vec<Vec<SqlValue>>>>,
}

struct MemoryConnection {
    rows: Arc<Mutex<Vec<Vec<SqlValue>>>>,
    auto_commit: bool,
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self, _: &ConnectOptions) -> Result<Box<dyn Connection>, DriverError> {
        Ok(Box::new(MemoryConnection {
            rows: Arc::clone(&self.rows),
            auto_commit: true,
        }))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DriverError> {
        let mut rows = self.rows.lock();
        match sql {
            INSERT => {
                rows.push(params.to_vec());
                Ok(1)
            }
            UPDATE_CAR => {
                let mut changed = 0;
                for row in rows.iter_mut().filter(|r| r[1] == params[1]) {
                    row[2] = params[0].clone();
                    changed += 1;
                }
                Ok(changed)
            }
            other => Err(DriverError::Execution(format!("unsupported: {other}"))),
        }
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<RowSet, DriverError> {
        if sql != FIND_BY_NAME {
            return Err(DriverError::Execution(format!("unsupported: {sql}")));
        }
        let matching = self
            .rows
            .lock()
            .iter()
            .filter(|r| r[1] == params[0])
            .cloned()
            .collect();
        Ok(RowSet::new(
            ColMetaData::from_names(["id", "name", "old_car"]),
            matching,
        ))
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

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let store = StatementStore::builder()
        .entry(MappingEntry::new(
            "app.dao.UserDao.insert",
            "insert into t_user (id, name, old_car) values (#{id}, #{name}, #{oldCar})",
        )?)
        .entry(MappingEntry::new(
            "app.dao.UserDao.updateCar",
            "update t_user set old_car = #{oldCar} where name = #{name}",
        )?)
        .entry(
            MappingEntry::new(
                "app.dao.UserDao.findByName",
                "select id, name, old_car from t_user where name = #{name}",
            )?
            .result_type("app.pojo.UserPO"),
        )
        .build();

    let config = DataSourceConfig::new("memory", "memory://users")
        .pool(PoolConfig::new().initial_size(1).min_idle(0).max_active(4));
    let factory = SqlSessionFactory::connect(
        "default-config",
        Arc::new(MemoryDriver::default()),
        &config,
        Arc::new(store),
    )
    .await?;

    let mut session = factory.open_session(false);

    // Insert from an entity: placeholders read its camelCase fields
    let user = User {
        id: 1,
        name: Some("Li".into()),
        old_car: Some("BMW".into()),
    };
    session.insert("app.dao.UserDao.insert", &user).await?;

    // Update through a mapper with named arguments
    let changed = session
        .mapper("app.dao.UserDao")
        .update(
            "updateCar",
            vec![Arg::named("oldCar", "Audi"), Arg::named("name", "Li")],
        )
        .await?;
    println!("updated {changed} row(s)");
    session.commit().await?;

    // Query by map; the old_car column fills the oldCar field
    let found: Option<User> = session
        .select_one(
            "app.dao.UserDao.findByName",
            ParamMap::new().with("name", "Li"),
        )
        .await?;
    println!("found: {found:?}");

    // A single scalar answers every placeholder
    let all: Vec<User> = session
        .select_list("app.dao.UserDao.findByName", Params::scalar("Li")?)
        .await?;
    println!("{} user(s) named Li", all.len());

    session.close().await?;
    factory.close().await;

    println!("pool after close: {:?}", factory.status());
    Ok(())
}
