//! Test fixture utilities.
//!
//! A small user table the end-to-end tests share: the entity, the mapping
//! entries of its DAO namespace, and the positional SQL those entries bind
//! to, so mock responses can be keyed on exactly what a session sends.

use std::sync::Arc;
use std::time::Duration;

use minibatis::{
    DataSourceConfig, Entity, MappingEntry, PoolConfig, SqlSessionFactory, SqlValue,
    StatementStore,
};

use crate::mock_driver::{MOCK_DRIVER_NAME, MockDriver};

/// Namespace of the user DAO.
pub const USER_DAO: &str = "app.dao.UserDao";

/// Result type the user DAO's queries declare.
pub const USER_TYPE: &str = "app.pojo.UserPO";

/// Column names of the user table, in select order.
pub const USER_COLUMNS: [&str; 3] = ["id", "name", "old_car"];

/// Positional SQL of each user DAO statement.
pub mod sql {
    /// `insert`
    pub const INSERT: &str = "insert into t_user (id, name, old_car) values (?, ?, ?)";
    /// `updateCar`
    pub const UPDATE_CAR: &str = "update t_user set old_car = ? where name = ?";
    /// `deleteById`
    pub const DELETE_BY_ID: &str = "delete from t_user where id = ?";
    /// `findById`
    pub const FIND_BY_ID: &str = "select id, name, old_car from t_user where id = ?";
    /// `findByName`
    pub const FIND_BY_NAME: &str = "select id, name, old_car from t_user where name = ?";
    /// `findAll`
    pub const FIND_ALL: &str = "select id, name, old_car from t_user";
}

/// Row of `t_user`.
#[derive(Debug, Default, Clone, PartialEq, Entity)]
#[minibatis(type_name = "app.pojo.UserPO")]
pub struct UserRecord {
    /// Primary key.
    pub id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Bound as `#{oldCar}`, filled from `old_car`.
    pub old_car: Option<String>,
}

impl UserRecord {
    /// Create a record.
    pub fn new(id: i64, name: &str, old_car: Option<&str>) -> Self {
        Self {
            id,
            name: Some(name.to_owned()),
            old_car: old_car.map(str::to_owned),
        }
    }

    /// This record as a positional row in [`USER_COLUMNS`] order.
    pub fn row(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::BigInt(self.id),
            self.name.as_deref().map_or(SqlValue::Null, SqlValue::from),
            self.old_car.as_deref().map_or(SqlValue::Null, SqlValue::from),
        ]
    }
}

/// The mapping entries of [`USER_DAO`].
pub fn user_entries() -> minibatis::Result<Vec<MappingEntry>> {
    let id = |op: &str| minibatis::statement_id(USER_DAO, op);
    Ok(vec![
        MappingEntry::new(
            id("insert"),
            "insert into t_user (id, name, old_car) values (#{id}, #{name}, #{oldCar})",
        )?,
        MappingEntry::new(
            id("updateCar"),
            "update t_user set old_car = #{oldCar} where name = #{name}",
        )?,
        MappingEntry::new(id("deleteById"), "delete from t_user where id = #{id}")?,
        MappingEntry::new(
            id("findById"),
            "select id, name, old_car from t_user where id = #{id}",
        )?
        .result_type(USER_TYPE),
        MappingEntry::new(
            id("findByName"),
            "select id, name, old_car from t_user where name = #{name}",
        )?
        .result_type(USER_TYPE),
        MappingEntry::new(id("findAll"), "select id, name, old_car from t_user")?
            .result_type(USER_TYPE),
    ])
}

/// A store holding [`user_entries`].
pub fn user_statements() -> minibatis::Result<Arc<StatementStore>> {
    Ok(Arc::new(
        StatementStore::builder().entries(user_entries()?).build(),
    ))
}

/// Data source for the mock driver with a small pool that never tops up
/// while idle connections remain.
pub fn mock_config(max_active: u32) -> DataSourceConfig {
    DataSourceConfig::new(MOCK_DRIVER_NAME, "mock://test").pool(
        PoolConfig::new()
            .initial_size(max_active.min(2))
            .min_idle(0)
            .max_active(max_active)
            .max_wait(Duration::from_millis(200)),
    )
}

/// A factory over `driver` with the user DAO registered.
pub async fn user_factory(
    driver: &MockDriver,
    config: &DataSourceConfig,
) -> minibatis::Result<SqlSessionFactory> {
    SqlSessionFactory::connect(
        "test",
        Arc::new(driver.clone()),
        config,
        user_statements()?,
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_entries_bind_to_listed_sql() {
        let store = user_statements().unwrap();
        let user = UserRecord::new(1, "Li", Some("BMW"));

        let bound = store
            .get(&minibatis::statement_id(USER_DAO, "insert"))
            .unwrap()
            .bind(&minibatis::Params::from(&user))
            .unwrap();

        assert_eq!(bound.sql(), sql::INSERT);
        assert_eq!(bound.params(), user.row().as_slice());
    }

    #[test]
    fn test_queries_declare_user_type() {
        let store = user_statements().unwrap();
        for op in ["findById", "findByName", "findAll"] {
            let entry = store.get(&minibatis::statement_id(USER_DAO, op)).unwrap();
            assert_eq!(entry.declared_result_type(), Some(USER_TYPE));
            assert!(minibatis::declares_type::<UserRecord>(USER_TYPE));
        }
    }
}
