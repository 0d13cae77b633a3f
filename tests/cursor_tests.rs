//! Integration tests for result set navigation
//!
//! The in-process server serves a two-column table whose first column is
//! the 1-based row number, so every positioned row can be checked by value.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{connect, long_arg, session_reply, table_handler, table_slice, test_config, Action};
use fedquery_rs::constants::{method, ServiceId};
use fedquery_rs::messages::{Message, RemoteException, ResultsMessage, ServiceInvocation, ServiceReply};
use fedquery_rs::{CursorType, Error, Position, ResultSet, Session};

fn id(rs: &ResultSet) -> i64 {
    rs.get(0).unwrap().as_i64().unwrap()
}

async fn open(session: &Session, cursor_type: CursorType) -> ResultSet {
    let mut request = session.new_request("SELECT id, name FROM parts");
    request.cursor_type = cursor_type;
    session.execute(request).await.unwrap()
}

mod forward_only_tests {
    use super::*;

    #[tokio::test]
    async fn test_absolute_then_step_within_resident_batch() {
        let config = test_config().fetch_size(400);
        let (session, _server) = connect(config, table_handler(1000)).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(rs.absolute(290).await.unwrap());
        assert_eq!(id(&rs), 290);
        let fetches = rs.fetches_issued();

        assert!(rs.next().await.unwrap());
        assert_eq!(rs.get_row(), 291);
        assert!(rs.next().await.unwrap());
        assert_eq!(rs.get_row(), 292);
        assert!(rs.previous().await.unwrap());
        assert_eq!(rs.get_row(), 291);
        assert_eq!(id(&rs), 291);
        assert_eq!(rs.fetches_issued(), fetches);
    }

    #[tokio::test]
    async fn test_full_scan_for_several_fetch_sizes() {
        for fetch_size in [1u32, 7, 400, 1000, 2048] {
            let config = test_config().fetch_size(fetch_size);
            let (session, server) = connect(config, table_handler(1000)).await;
            let mut rs = open(&session, CursorType::ForwardOnly).await;

            let mut expected = 0;
            while rs.next().await.unwrap() {
                expected += 1;
                assert_eq!(id(&rs), expected, "fetch size {}", fetch_size);
            }
            assert_eq!(expected, 1000, "fetch size {}", fetch_size);
            assert_eq!(rs.final_row(), Some(1000));
            assert!(rs.is_after_last());
            assert!(!rs.next().await.unwrap());

            let batches = 1000u64.div_ceil(fetch_size as u64);
            assert!(rs.fetches_issued() <= batches, "fetch size {}", fetch_size);
            rs.close().await.unwrap();
            assert_eq!(server.count(method::CLOSE_REQUEST), 1);
        }
    }

    #[tokio::test]
    async fn test_scroll_operations_rejected() {
        let config = test_config().fetch_size(100);
        let (session, _server) = connect(config, table_handler(1000)).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(matches!(rs.first().await, Err(Error::IllegalNavigation(_))));
        assert!(matches!(rs.last().await, Err(Error::IllegalNavigation(_))));
        assert!(matches!(rs.absolute(-3).await, Err(Error::IllegalNavigation(_))));
        assert!(rs.before_first().is_err());
        assert!(rs.after_last().is_err());

        assert!(rs.absolute(950).await.unwrap());
        let fetches = rs.fetches_issued();
        assert!(matches!(rs.absolute(10).await, Err(Error::IllegalNavigation(_))));
        assert_eq!(rs.get_row(), 950);
        assert_eq!(rs.fetches_issued(), fetches);
    }

    #[tokio::test]
    async fn test_absolute_is_idempotent() {
        let config = test_config().fetch_size(50);
        let (session, _server) = connect(config, table_handler(1000)).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(rs.absolute(777).await.unwrap());
        let fetches = rs.fetches_issued();
        assert!(rs.absolute(777).await.unwrap());
        assert_eq!(id(&rs), 777);
        assert_eq!(rs.fetches_issued(), fetches);
        assert!(rs.relative(0).await.unwrap());
        assert_eq!(rs.get_row(), 777);
    }

    #[tokio::test]
    async fn test_absolute_past_end() {
        let config = test_config().fetch_size(100);
        let (session, _server) = connect(config, table_handler(250)).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(!rs.absolute(5000).await.unwrap());
        assert!(rs.is_after_last());
        assert_eq!(rs.final_row(), Some(250));
        assert!(matches!(rs.row(), Err(Error::NoCurrentRow)));
    }
}

mod scrollable_tests {
    use super::*;

    #[tokio::test]
    async fn test_walk_forward_then_back() {
        let config = test_config().fetch_size(400).saved_batches(2);
        let (session, _server) = connect(config, table_handler(1000)).await;
        let mut rs = open(&session, CursorType::Scrollable).await;

        let mut n = 0;
        while rs.next().await.unwrap() {
            n += 1;
            assert_eq!(id(&rs), n);
        }
        assert_eq!(n, 1000);
        while rs.previous().await.unwrap() {
            assert_eq!(id(&rs), n);
            n -= 1;
        }
        assert_eq!(n, 0);
        assert!(rs.is_before_first().await.unwrap());
    }

    #[tokio::test]
    async fn test_absolute_then_step_within_resident_batch() {
        let config = test_config().fetch_size(400);
        let (session, _server) = connect(config, table_handler(1000)).await;
        let mut rs = open(&session, CursorType::Scrollable).await;

        assert!(rs.absolute(290).await.unwrap());
        assert_eq!(id(&rs), 290);
        let fetches = rs.fetches_issued();

        assert!(rs.next().await.unwrap());
        assert_eq!(id(&rs), 291);
        assert!(rs.next().await.unwrap());
        assert_eq!(id(&rs), 292);
        assert!(rs.previous().await.unwrap());
        assert_eq!(rs.get_row(), 291);
        assert_eq!(id(&rs), 291);
        assert_eq!(rs.fetches_issued(), fetches);
    }

    #[tokio::test]
    async fn test_random_access() {
        let config = test_config().fetch_size(400).saved_batches(2);
        let (session, _server) = connect(config, table_handler(1000)).await;
        let mut rs = open(&session, CursorType::Scrollable).await;

        assert!(rs.last().await.unwrap());
        assert_eq!(id(&rs), 1000);
        assert!(rs.is_last().await.unwrap());
        assert!(rs.absolute(-400).await.unwrap());
        assert_eq!(id(&rs), 601);
        assert!(rs.first().await.unwrap());
        assert!(rs.is_first());
        assert_eq!(id(&rs), 1);
        assert!(rs.relative(598).await.unwrap());
        assert_eq!(id(&rs), 599);
        assert!(rs.relative(-500).await.unwrap());
        assert_eq!(id(&rs), 99);
        assert!(!rs.relative(-200).await.unwrap());
        assert!(matches!(rs.row(), Err(Error::NoCurrentRow)));

        rs.after_last().unwrap();
        assert!(rs.is_after_last());
        assert!(rs.previous().await.unwrap());
        assert_eq!(id(&rs), 1000);
        rs.before_first().unwrap();
        assert!(rs.next().await.unwrap());
        assert_eq!(id(&rs), 1);
    }

    #[tokio::test]
    async fn test_columns_from_first_batch() {
        let (session, _server) = connect(test_config(), table_handler(3)).await;
        let mut rs = open(&session, CursorType::Scrollable).await;
        let names: Vec<&str> = rs.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
        assert!(rs.next().await.unwrap());
        assert_eq!(rs.get(1).unwrap().as_str(), Some("row-1"));
        assert!(matches!(rs.get(2), Err(Error::ColumnOutOfRange { index: 2, count: 2 })));
    }
}

mod failure_tests {
    use super::*;

    fn failing_handler(invocation: &ServiceInvocation) -> Action {
        if let Some(action) = session_reply(invocation) {
            return action;
        }
        let key = invocation.message_key;
        let results = match invocation.method.as_str() {
            method::EXECUTE_REQUEST => table_slice(1000, 1, 1),
            _ => ResultsMessage::failure(
                long_arg(invocation, 1),
                RemoteException::new("division by zero").with_code("ERR-22012"),
            ),
        };
        Action::Reply(ServiceReply::ok(key, Message::Results(results)))
    }

    #[tokio::test]
    async fn test_batch_exception_is_sticky() {
        let (session, _server) = connect(test_config(), Arc::new(failing_handler)).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(rs.next().await.unwrap());
        assert_eq!(id(&rs), 1);
        let first = rs.next().await.unwrap_err();
        let second = rs.next().await.unwrap_err();
        assert_eq!(first.remote(), second.remote());
        assert_eq!(
            first.remote().and_then(|e| e.code.as_deref()),
            Some("ERR-22012")
        );
        assert_eq!(rs.get_row(), 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout_then_retry() {
        let handler = Arc::new(|invocation: &ServiceInvocation| {
            if let Some(action) = session_reply(invocation) {
                return action;
            }
            let key = invocation.message_key;
            match invocation.method.as_str() {
                method::EXECUTE_REQUEST => {
                    Action::Reply(ServiceReply::ok(key, Message::Results(table_slice(30, 1, 10))))
                }
                _ => {
                    let batch = table_slice(30, long_arg(invocation, 1), long_arg(invocation, 2));
                    Action::Delay(Duration::from_millis(300), ServiceReply::ok(key, Message::Results(batch)))
                }
            }
        });
        let config = test_config()
            .fetch_size(10)
            .prefetch(false)
            .call_timeout(Duration::from_millis(100));
        let (session, server) = connect(config, handler).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(rs.absolute(10).await.unwrap());
        let err = rs.next().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(rs.get_row(), 10);

        let mut moved = false;
        for _ in 0..10 {
            match rs.next().await {
                Ok(true) => {
                    moved = true;
                    break;
                }
                Err(e) if e.is_timeout() => continue,
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert!(moved);
        assert_eq!(id(&rs), 11);
        assert_eq!(server.count(method::PROCESS_CURSOR_REQUEST), 1);
    }

    #[tokio::test]
    async fn test_timeout_during_last_keeps_current_row() {
        let handler = Arc::new(|invocation: &ServiceInvocation| {
            if let Some(action) = session_reply(invocation) {
                return action;
            }
            let key = invocation.message_key;
            match invocation.method.as_str() {
                method::EXECUTE_REQUEST => {
                    Action::Reply(ServiceReply::ok(key, Message::Results(table_slice(100, 1, 10))))
                }
                _ => {
                    let start = long_arg(invocation, 1);
                    if start > 20 {
                        return Action::Ignore;
                    }
                    let batch = table_slice(100, start, long_arg(invocation, 2));
                    Action::Reply(ServiceReply::ok(key, Message::Results(batch)))
                }
            }
        });
        let config = test_config()
            .fetch_size(10)
            .saved_batches(1)
            .prefetch(false)
            .call_timeout(Duration::from_millis(100));
        let (session, server) = connect(config, handler).await;
        let mut rs = open(&session, CursorType::Scrollable).await;

        assert!(rs.absolute(5).await.unwrap());
        let err = rs.last().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(rs.position(), Position::OnRow(5));
        assert_eq!(id(&rs), 5);

        let fetches = server.count(method::PROCESS_CURSOR_REQUEST);
        assert!(rs.next().await.unwrap());
        assert_eq!(id(&rs), 6);
        assert_eq!(server.count(method::PROCESS_CURSOR_REQUEST), fetches);
    }

    #[tokio::test]
    async fn test_malformed_batch_closes_session() {
        let handler = Arc::new(|invocation: &ServiceInvocation| {
            if let Some(action) = session_reply(invocation) {
                return action;
            }
            let key = invocation.message_key;
            match invocation.method.as_str() {
                method::EXECUTE_REQUEST => {
                    Action::Reply(ServiceReply::ok(key, Message::Results(table_slice(100, 1, 10))))
                }
                method::PROCESS_CURSOR_REQUEST => {
                    let mut batch = table_slice(100, 11, 10);
                    batch.last_row = 25;
                    Action::Reply(ServiceReply::ok(key, Message::Results(batch)))
                }
                _ => Action::Ignore,
            }
        });
        let config = test_config().fetch_size(10).prefetch(false);
        let (session, _server) = connect(config, handler).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;
        let mut outstanding = session.invoke(ServiceId::Dqp, "slow", Vec::new()).await.unwrap();

        assert!(rs.absolute(10).await.unwrap());
        let err = rs.next().await.unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedBatch { first_row: 11, last_row: 25, actual: 10 }
        ));
        assert!(err.is_fatal());
        assert!(session.is_closed());

        let other = outstanding.wait(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(other, Error::ConnectionLost(_)));
        assert!(session.ping().await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_close_with_fetch_in_flight() {
        let handler = Arc::new(|invocation: &ServiceInvocation| {
            if let Some(action) = session_reply(invocation) {
                return action;
            }
            let key = invocation.message_key;
            match invocation.method.as_str() {
                method::EXECUTE_REQUEST => {
                    Action::Reply(ServiceReply::ok(key, Message::Results(table_slice(100, 1, 10))))
                }
                _ => Action::Delay(
                    Duration::from_millis(200),
                    ServiceReply::ok(key, Message::Results(table_slice(100, 11, 10))),
                ),
            }
        });
        let config = test_config().fetch_size(10);
        let (session, server) = connect(config, handler).await;
        let mut rs = open(&session, CursorType::ForwardOnly).await;

        assert!(rs.absolute(9).await.unwrap());
        assert_eq!(server.wait_for(method::PROCESS_CURSOR_REQUEST, 1).await, 1);
        rs.close().await.unwrap();
        assert!(rs.is_closed());
        assert_eq!(server.count(method::CLOSE_REQUEST), 1);
        assert!(matches!(rs.next().await, Err(Error::CursorClosed)));

        tokio::time::sleep(Duration::from_millis(300)).await;
        session.ping().await.unwrap();
    }
}
