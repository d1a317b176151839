//! Client operations against a fake in-memory agent.

mod common;

use bytes::Bytes;
use common::{FakeAgent, MockTransport, test_client, test_client_with};
use snmpkit::message::CommunityMessage;
use snmpkit::pdu::PduType;
use snmpkit::value::Value;
use snmpkit::{Credentials, Error, ErrorStatus, oid};

fn sys_agent() -> FakeAgent {
    let mut agent = FakeAgent::new();
    agent.insert(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("Linux router1"));
    agent.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123456));
    agent.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("router1"));
    agent
}

#[tokio::test]
async fn get_returns_single_value() {
    let client = test_client(sys_agent().into_transport());

    let value = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
    assert_eq!(value.as_str(), Some("Linux router1"));
}

#[tokio::test]
async fn multi_get_preserves_order() {
    let client = test_client(sys_agent().into_transport());

    let values = client
        .multi_get(&[
            oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
        ])
        .await
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_str(), Some("router1"));
    assert_eq!(values[1].as_str(), Some("Linux router1"));
}

#[tokio::test]
async fn get_missing_oid_yields_no_such_object() {
    let client = test_client(sys_agent().into_transport());

    let value = client.get(&oid!(1, 3, 6, 1, 9, 9, 9, 0)).await.unwrap();
    assert_eq!(value, Value::NoSuchObject);
}

#[tokio::test]
async fn get_next_returns_successor() {
    let client = test_client(sys_agent().into_transport());

    let vb = client.get_next(&oid!(1, 3, 6, 1, 2, 1, 1)).await.unwrap();
    assert_eq!(vb.oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));

    let vb = client
        .get_next(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))
        .await
        .unwrap();
    assert_eq!(vb.oid, oid!(1, 3, 6, 1, 2, 1, 1, 3, 0));
}

#[tokio::test]
async fn get_next_past_the_end_errors() {
    let client = test_client(sys_agent().into_transport());

    let err = client.get_next(&oid!(9, 9)).await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn set_echoes_value() {
    let client = test_client(sys_agent().into_transport());

    let echoed = client
        .set(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("renamed"))
        .await
        .unwrap();
    assert_eq!(echoed.as_str(), Some("renamed"));
}

#[tokio::test]
async fn multi_set_returns_pairs() {
    let client = test_client(sys_agent().into_transport());

    let results = client
        .multi_set(&[
            (oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("a")),
            (oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("b")),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, oid!(1, 3, 6, 1, 2, 1, 1, 5, 0));
    assert_eq!(results[1].1.as_str(), Some("b"));
}

#[tokio::test]
async fn agent_error_status_surfaces() {
    // an agent that rejects everything with noSuchName at index 1
    let transport = MockTransport::new(|data| {
        let msg = CommunityMessage::decode(Bytes::copy_from_slice(data)).unwrap();
        let mut response = msg.pdu.clone();
        response.pdu_type = PduType::Response;
        response.error_status = 2;
        response.error_index = 1;
        Some(CommunityMessage::new(msg.version, msg.community, response).encode().to_vec())
    });
    let client = test_client(transport);

    let err = client.get(&oid!(1, 3, 6, 1, 5)).await.unwrap_err();
    match err {
        Error::ErrorResponse { status, index, oid } => {
            assert_eq!(status, ErrorStatus::NoSuchName);
            assert_eq!(index, 1);
            assert_eq!(oid, Some(oid!(1, 3, 6, 1, 5)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn error_index_zero_does_not_name_an_oid() {
    let transport = MockTransport::new(|data| {
        let msg = CommunityMessage::decode(Bytes::copy_from_slice(data)).unwrap();
        let mut response = msg.pdu.clone();
        response.pdu_type = PduType::Response;
        response.error_status = 5; // genErr
        response.error_index = 0;
        response.varbinds.clear();
        Some(CommunityMessage::new(msg.version, msg.community, response).encode().to_vec())
    });
    let client = test_client(transport);

    match client.get(&oid!(1, 3, 6, 1)).await.unwrap_err() {
        Error::ErrorResponse { status, oid, .. } => {
            assert_eq!(status, ErrorStatus::GenErr);
            assert_eq!(oid, None);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn timeouts_consume_all_retries_then_surface() {
    let transport = MockTransport::new(|_| None); // never answers
    let client = test_client(transport.clone());

    let err = client.get(&oid!(1, 3, 6, 1)).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { retries: 3, .. }));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn retry_succeeds_after_dropped_datagrams() {
    let agent = sys_agent();
    let mut drops_left = 2u32;
    let transport = MockTransport::new(move |data| {
        if drops_left > 0 {
            drops_left -= 1;
            return None;
        }
        let msg = CommunityMessage::decode(Bytes::copy_from_slice(data)).unwrap();
        let response = agent.respond(&msg.pdu);
        Some(CommunityMessage::new(msg.version, msg.community, response).encode().to_vec())
    });
    let client = test_client(transport.clone());

    let value = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)).await.unwrap();
    assert_eq!(value.as_str(), Some("router1"));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn mismatched_request_id_is_rejected() {
    let transport = MockTransport::new(|data| {
        let msg = CommunityMessage::decode(Bytes::copy_from_slice(data)).unwrap();
        let mut response = msg.pdu.clone();
        response.pdu_type = PduType::Response;
        response.request_id = response.request_id.wrapping_add(17);
        Some(CommunityMessage::new(msg.version, msg.community, response).encode().to_vec())
    });
    let client = test_client(transport);

    let err = client.get(&oid!(1, 3, 6, 1)).await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn bulk_get_splits_scalars_and_listing() {
    let mut agent = FakeAgent::new();
    agent.insert(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("sysDescr"));
    agent.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(1));
    for i in 1..=5u32 {
        agent.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, i), Value::Integer(i as i64));
    }
    let client = test_client(agent.into_transport());

    let result = client
        .bulk_get(
            &[oid!(1, 3, 6, 1, 2, 1, 1, 1)],
            &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1)],
            4,
        )
        .await
        .unwrap();

    assert_eq!(result.scalars.len(), 1);
    assert_eq!(result.scalars[0].0, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    assert_eq!(result.scalars[0].1.as_str(), Some("sysDescr"));

    assert_eq!(result.listing.len(), 4); // capped at max_list_size
    assert_eq!(result.listing[0].0, oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1));
    assert_eq!(result.listing[3].0, oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 4));
}

#[tokio::test]
async fn bulk_get_listing_stays_inside_subtree() {
    let mut agent = FakeAgent::new();
    agent.insert(oid!(1, 3, 5, 1), Value::Integer(1));
    agent.insert(oid!(1, 3, 5, 2), Value::Integer(2));
    agent.insert(oid!(1, 3, 7, 1), Value::Integer(99)); // next subtree
    let client = test_client(agent.into_transport());

    let result = client
        .bulk_get(&[], &[oid!(1, 3, 5)], 10)
        .await
        .unwrap();

    assert_eq!(result.listing.len(), 2);
    assert!(result.listing.iter().all(|(oid, _)| oid!(1, 3, 5).parent_of(oid)));
}

#[tokio::test]
async fn bulk_rejected_for_v1_clients() {
    let client = test_client_with(
        sys_agent().into_transport(),
        Credentials::v1("public"),
    );

    let err = client
        .bulk_get(&[], &[oid!(1, 3, 6, 1)], 10)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encode { .. }));
}

#[tokio::test]
async fn v1_get_roundtrip() {
    let client = test_client_with(
        sys_agent().into_transport(),
        Credentials::v1("public"),
    );

    let value = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)).await.unwrap();
    assert_eq!(value.as_str(), Some("router1"));
}

#[tokio::test]
async fn table_pivot_end_to_end() {
    // a 2-column, 3-row interface-style table
    let base = oid!(1, 3, 6, 1, 2, 1, 2, 2);
    let mut agent = FakeAgent::new();
    for row in 1..=3u32 {
        agent.insert(base.child(1).child(1).child(row), Value::Integer(row as i64));
        agent.insert(
            base.child(1).child(2).child(row),
            Value::from(format!("if-{row}")),
        );
    }
    let client = test_client(agent.into_transport());

    let table = client.table(&base).await.unwrap();

    assert_eq!(table.len(), 3);
    let row2 = table.iter().find(|r| r.index == "2").unwrap();
    assert_eq!(row2.column(1).unwrap().as_i64(), Some(2));
    assert_eq!(row2.column(2).unwrap().as_str(), Some("if-2"));
}

#[tokio::test]
async fn bulk_table_matches_getnext_table() {
    let base = oid!(1, 3, 6, 1, 2, 1, 2, 2);
    let mut agent = FakeAgent::new();
    for row in 1..=4u32 {
        agent.insert(base.child(1).child(1).child(row), Value::Integer(row as i64));
        agent.insert(base.child(1).child(3).child(row), Value::Counter32(row * 100));
    }

    let client = test_client(agent.clone().into_transport());
    let plain = client.table(&base).await.unwrap();

    let client = test_client(agent.into_transport());
    let bulk = client.bulk_table(&base).await.unwrap();

    assert_eq!(plain, bulk);
}
