//! End-to-end session tests against the mock driver.
//!
//! Run with:
//! ```bash
//! cargo test -p minibatis-testing --test session
//! ```

#![allow(clippy::unwrap_used, missing_docs)]

use std::time::Duration;

use minibatis::{
    Arg, ContextId, DriverError, Entity, Error, ParamMap, Params, PoolError, SessionState,
    SqlSessionFactory, SqlValue, statement_id,
};
use minibatis_testing::fixtures::{self, USER_COLUMNS, USER_DAO, UserRecord, sql};
use minibatis_testing::{MockDriver, MockEvent, MockResponse};

fn id(op: &str) -> String {
    statement_id(USER_DAO, op)
}

fn users(records: &[UserRecord]) -> MockResponse {
    MockResponse::rows(USER_COLUMNS, records.iter().map(UserRecord::row).collect())
}

async fn factory(driver: &MockDriver) -> SqlSessionFactory {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    fixtures::user_factory(driver, &fixtures::mock_config(2))
        .await
        .unwrap()
}

#[derive(Debug, Default, Entity)]
#[minibatis(type_name = "app.pojo.CarPO")]
struct CarRecord {
    id: i64,
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_select_one_maps_snake_case_columns() {
    let li = UserRecord::new(1, "Li", Some("BMW"));
    let driver = MockDriver::builder()
        .with_response(sql::FIND_BY_ID, users(std::slice::from_ref(&li)))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let found: Option<UserRecord> = session
        .select_one(&id("findById"), ParamMap::new().with("id", 1i64))
        .await
        .unwrap();

    assert_eq!(found, Some(li));
    assert_eq!(
        driver.statements(),
        vec![(sql::FIND_BY_ID.to_string(), vec![SqlValue::BigInt(1)])]
    );
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_select_one_without_match_is_none() {
    let driver = MockDriver::builder()
        .with_response(sql::FIND_BY_ID, users(&[]))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let found: Option<UserRecord> = session
        .select_one(&id("findById"), Params::scalar(&9i64).unwrap())
        .await
        .unwrap();

    assert!(found.is_none());
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_select_one_with_two_rows_fails() {
    let driver = MockDriver::builder()
        .with_response(
            sql::FIND_BY_NAME,
            users(&[
                UserRecord::new(1, "Li", None),
                UserRecord::new(2, "Li", Some("Audi")),
            ]),
        )
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let err = session
        .select_one::<UserRecord>(&id("findByName"), ParamMap::new().with("name", "Li"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NonUniqueResult { count: 2, .. }));
    assert_eq!(session.state(), SessionState::Connected);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_select_list_keeps_row_order() {
    let rows = [
        UserRecord::new(3, "Zhao", None),
        UserRecord::new(1, "Li", Some("BMW")),
        UserRecord::new(2, "Wang", None),
    ];
    let driver = MockDriver::builder()
        .with_response(sql::FIND_ALL, users(&rows))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let found: Vec<UserRecord> = session.select_list(&id("findAll"), ()).await.unwrap();

    assert_eq!(found, rows);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_result_type_mismatch_sends_nothing() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let err = session
        .select_list::<CarRecord>(&id("findById"), Params::scalar(&1i64).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ResultTypeMismatch { requested: "app.pojo.CarPO", .. }));
    assert!(driver.statements().is_empty());
    assert_eq!(session.state(), SessionState::Unopened);
}

// =============================================================================
// Updates and binding
// =============================================================================

#[tokio::test]
async fn test_insert_binds_entity_fields_in_order() {
    let driver = MockDriver::builder()
        .with_response(sql::INSERT, MockResponse::affected(1))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);
    let user = UserRecord::new(5, "Chen", None);

    let rows = session.insert(&id("insert"), &user).await.unwrap();

    assert_eq!(rows, 1);
    assert_eq!(
        driver.statements(),
        vec![(
            sql::INSERT.to_string(),
            vec![SqlValue::BigInt(5), SqlValue::from("Chen"), SqlValue::Null]
        )]
    );
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_update_binds_by_placeholder_position() {
    let driver = MockDriver::builder()
        .with_response(sql::UPDATE_CAR, MockResponse::affected(2))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    // map order differs from placeholder order
    let params = ParamMap::new().with("name", "Li").with("oldCar", "Audi");
    let rows = session.update(&id("updateCar"), params).await.unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        driver.statements()[0].1,
        vec![SqlValue::from("Audi"), SqlValue::from("Li")]
    );
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_placeholder_value_fails_before_connecting() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let err = session
        .update(&id("updateCar"), ParamMap::new().with("name", "Li"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Binding { ref name, .. } if name == "oldCar"));
    assert!(driver.statements().is_empty());
    assert_eq!(session.state(), SessionState::Unopened);
}

#[tokio::test]
async fn test_unknown_statement() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let err = session.delete(&id("purge"), ()).await.unwrap_err();
    assert!(matches!(err, Error::StatementNotFound(ref s) if s == "app.dao.UserDao.purge"));
}

#[tokio::test]
async fn test_driver_error_passes_through_and_session_stays_open() {
    let driver = MockDriver::builder()
        .with_response(sql::DELETE_BY_ID, MockResponse::error("row locked"))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let err = session
        .delete(&id("deleteById"), Params::scalar(&1i64).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Driver(DriverError::Execution(ref m)) if m == "row locked"));
    assert!(err.is_driver_error());
    assert!(!session.is_closed());

    let _: Vec<UserRecord> = session.select_list(&id("findAll"), ()).await.unwrap();
    session.close().await.unwrap();
}

// =============================================================================
// Mapper dispatch
// =============================================================================

#[tokio::test]
async fn test_mapper_merges_named_arguments() {
    let driver = MockDriver::builder()
        .with_response(sql::UPDATE_CAR, MockResponse::affected(1))
        .with_response(
            sql::FIND_BY_NAME,
            users(&[UserRecord::new(1, "Li", Some("Audi"))]),
        )
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    let mut mapper = session.mapper(USER_DAO);
    let rows = mapper
        .update(
            "updateCar",
            vec![Arg::named("oldCar", "Audi"), Arg::named("name", "Li")],
        )
        .await
        .unwrap();
    let found: Option<UserRecord> = mapper
        .select_one("findByName", vec![Arg::value(ParamMap::new().with("name", "Li"))])
        .await
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(found.and_then(|u| u.old_car).as_deref(), Some("Audi"));
    assert_eq!(
        driver.statements()[0].1,
        vec![SqlValue::from("Audi"), SqlValue::from("Li")]
    );
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_mapper_single_entity_argument() {
    let driver = MockDriver::builder()
        .with_default_response(MockResponse::affected(1))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);
    let user = UserRecord::new(8, "Sun", Some("Kia"));

    let rows = session
        .mapper(USER_DAO)
        .insert("insert", vec![Arg::value(&user)])
        .await
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(driver.statements()[0].1, user.row());
    session.close().await.unwrap();
}

// =============================================================================
// Lifecycle and transactions
// =============================================================================

#[tokio::test]
async fn test_closed_session_rejects_statements() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    session.close().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.select_list::<UserRecord>(&id("findAll"), ()).await,
        Err(Error::SessionClosed)
    ));
    assert!(matches!(session.commit().await, Err(Error::SessionClosed)));
}

#[tokio::test]
async fn test_commit_before_connect_has_no_connection() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(false);

    assert!(matches!(session.commit().await, Err(Error::NoConnection)));
    assert!(matches!(session.rollback().await, Err(Error::NoConnection)));

    session.connect().await.unwrap();
    session.commit().await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_manual_commit_and_autocommit_restored_on_close() {
    let driver = MockDriver::builder()
        .with_default_response(MockResponse::affected(1))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(false);

    session
        .delete(&id("deleteById"), Params::scalar(&1i64).unwrap())
        .await
        .unwrap();
    session.commit().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(
        driver.events_for(1),
        vec![
            MockEvent::SetAutoCommit(false),
            MockEvent::Execute {
                sql: sql::DELETE_BY_ID.to_string(),
                params: vec![SqlValue::BigInt(1)],
            },
            MockEvent::Commit,
            MockEvent::SetAutoCommit(true),
        ]
    );
    assert_eq!(factory.status().active, 0);
}

#[tokio::test]
async fn test_rollback() {
    let driver = MockDriver::builder()
        .with_default_response(MockResponse::affected(1))
        .build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(false);

    session
        .delete(&id("deleteById"), Params::scalar(&1i64).unwrap())
        .await
        .unwrap();
    session.rollback().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(driver.count_events(|e| *e == MockEvent::Rollback), 1);
    assert_eq!(driver.count_events(|e| *e == MockEvent::Commit), 0);
}

#[tokio::test]
async fn test_commit_failure_is_driver_error() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(false);
    session.connect().await.unwrap();

    driver.set_fail_commit(true);
    assert!(matches!(
        session.commit().await,
        Err(Error::Driver(DriverError::Transaction(_)))
    ));
    session.rollback().await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_switching_autocommit_applies_to_open_connection() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let mut session = factory.open_session(true);

    session.connect().await.unwrap();
    session.set_auto_commit(false).await.unwrap();

    assert!(!session.is_auto_commit());
    assert_eq!(driver.events_for(1), vec![MockEvent::SetAutoCommit(false)]);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_sessions_in_one_context_share_a_connection() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let ctx = ContextId::new();
    let mut first = factory.open_session_in(ctx, true);
    let mut second = factory.open_session_in(ctx, true);

    let _: Vec<UserRecord> = first.select_list(&id("findAll"), ()).await.unwrap();
    let _: Vec<UserRecord> = second.select_list(&id("findAll"), ()).await.unwrap();

    assert_eq!(factory.status().active, 1);
    assert_eq!(driver.events_for(1).len(), 2);

    // Closing one session ends the shared checkout; the other takes a new one.
    first.close().await.unwrap();
    assert_eq!(factory.status().active, 0);

    for _ in 0..2 {
        let _: Vec<UserRecord> = second.select_list(&id("findAll"), ()).await.unwrap();
    }
    assert_eq!(second.state(), SessionState::Connected);
    assert_eq!(factory.status().active, 1);

    second.close().await.unwrap();
    assert_eq!(factory.status().active, 0);
}

#[tokio::test]
async fn test_failed_open_keeps_peer_checkout() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    let ctx = ContextId::new();
    let mut holder = factory.open_session_in(ctx, true);
    holder.connect().await.unwrap();

    driver.set_fail_auto_commit(true);
    let mut manual = factory.open_session_in(ctx, false);
    let err = manual.connect().await.unwrap_err();
    assert!(matches!(err, Error::Driver(DriverError::Transaction(_))));
    driver.set_fail_auto_commit(false);

    assert_eq!(factory.status().active, 1);
    let _: Vec<UserRecord> = holder.select_list(&id("findAll"), ()).await.unwrap();

    manual.close().await.unwrap();
    holder.close().await.unwrap();
    assert_eq!(factory.status().active, 0);
}

#[tokio::test]
async fn test_capacity_exceeded_without_waiting() {
    let driver = MockDriver::builder().build();
    let factory = fixtures::user_factory(&driver, &fixtures::mock_config(1))
        .await
        .unwrap();
    let mut first = factory.open_session(true);
    let mut second = factory.open_session(true);

    first.connect().await.unwrap();
    let err = second.connect().await.unwrap_err();
    assert!(matches!(err, Error::Pool(PoolError::CapacityExceeded { max: 1 })));

    first.close().await.unwrap();
    second.connect().await.unwrap();
    second.close().await.unwrap();
}

#[tokio::test]
async fn test_dropped_session_returns_its_connection() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;

    {
        let mut session = factory.open_session(false);
        session.connect().await.unwrap();
        assert_eq!(factory.status().active, 1);
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(factory.status().active, 0);
    assert_eq!(
        driver.count_events(|e| *e == MockEvent::SetAutoCommit(true)),
        1
    );
}

#[tokio::test]
async fn test_closed_factory_fails_first_statement() {
    let driver = MockDriver::builder().build();
    let factory = factory(&driver).await;
    factory.close().await;

    let mut session = factory.open_session(true);
    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, Error::Pool(PoolError::PoolClosed)));
    assert_eq!(driver.count_events(|e| *e == MockEvent::Close), 2);
}
