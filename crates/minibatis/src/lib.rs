//! # minibatis
//!
//! Async SQL mapping layer: templated statements, entity mapping and pooled
//! sessions over any driver that implements [`Driver`].
//!
//! This is the primary public API surface of the workspace. Statements are
//! registered once under a fully-qualified id, bound from maps or entities by
//! placeholder name, and their rows mapped back into entities by column name.
//!
//! ## Features
//!
//! - **Named placeholders**: `#{name}` templates, parsed once at registration
//! - **Entity mapping**: `snake_case` columns fill `camelCase` fields through a
//!   per-type accessor table, usually derived with `#[derive(Entity)]`
//! - **Pooled sessions**: one connection per session context, taken lazily and
//!   returned with autocommit restored
//! - **Named environments**: one pool per configuration name, built on first use
//!
//! ## Session Lifecycle
//!
//! ```text
//! Unopened -> Connected (first statement or connect())
//! Connected -> Closed (close())
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use minibatis::{Entity, Environments, MappingEntry, ParamMap, StatementStore, StaticConfig};
//!
//! #[derive(Debug, Default, Entity)]
//! #[minibatis(type_name = "app.pojo.UserPO")]
//! struct User {
//!     id: i64,
//!     name: Option<String>,
//!     old_car: Option<String>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), minibatis::Error> {
//!     let store = StatementStore::builder()
//!         .entry(MappingEntry::new(
//!             "app.dao.UserDao.findByName",
//!             "select id, name, old_car from t_user where name = #{name}",
//!         )?.result_type("app.pojo.UserPO"))
//!         .build();
//!
//!     let envs = Environments::builder()
//!         .driver(Arc::new(my_driver))
//!         .config_source(StaticConfig::new().with("default-config", config))
//!         .statements(Arc::new(store))
//!         .build()?;
//!
//!     let mut session = envs.open_default_session(true).await?;
//!     let users: Vec<User> = session
//!         .select_list("app.dao.UserDao.findByName", ParamMap::new().with("name", "Li"))
//!         .await?;
//!     session.close().await?;
//!
//!     envs.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Lets `#[derive(Entity)]` output, which names `::minibatis`, compile in this crate's own tests.
extern crate self as minibatis;

pub mod config;
pub mod driver;
pub mod entity;
pub mod environment;
pub mod error;
pub mod factory;
pub mod instrumentation;
pub mod params;
pub mod placeholder;
pub mod result_mapper;
pub mod row;
pub mod session;
pub mod state;
pub mod statement;
pub mod transaction;

// Re-export commonly used types
pub use config::{ConfigSource, DEFAULT_ENVIRONMENT, DataSourceConfig, PropertiesDir, StaticConfig};
pub use driver::{ConnectOptions, Connection, Driver, DriverError, DriverManager};
pub use entity::{Entity, FieldAccessor, FieldTable, declares_type};
pub use environment::{Environments, EnvironmentsBuilder};
pub use error::{Error, Result};
pub use factory::SqlSessionFactory;
pub use minibatis_pool::{ContextId, PoolConfig, PoolError, PoolStatus};
pub use minibatis_types::{FromSql, SqlValue, ToSql, TypeError};
pub use params::{Arg, ParamMap, ParamSource, Params};
pub use placeholder::{
    BoundStatement, ParsedTemplate, Placeholder, extract_placeholders, to_camel_case,
    to_positional_sql, to_snake_case,
};
pub use result_mapper::{MapEntities, ResultMapper, RowIteratorExt};
pub use row::{ColMetaData, Column, Row, RowSet};
pub use session::{Mapper, SqlSession};
pub use state::SessionState;
pub use statement::{MappingEntry, MappingSource, StatementStore, StatementStoreBuilder, statement_id};
pub use transaction::{SessionConnection, TransactionContext};

#[cfg(feature = "derive")]
pub use minibatis_derive::Entity;
