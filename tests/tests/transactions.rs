//! Request/response correlation over one association

use std::collections::HashSet;
use std::time::Duration;

use integration_tests::{init_test_logging, open_association, raw, MockPeer, Received, TestResult};
use nextgup_pfcp::ie::{types, Cause, RecoveryTimeStamp};
use nextgup_pfcp::{Message, MessageType, PfcpError};

const CONCURRENT: u32 = 16;

fn tagged_heartbeat(tag: u32) -> TestResult<Message> {
    let mut request = Message::new(MessageType::HeartbeatRequest);
    request.push(&RecoveryTimeStamp(tag))?;
    Ok(request)
}

fn tag_of(message: &Message) -> TestResult<u32> {
    let recovery = message
        .decode_first::<RecoveryTimeStamp>(types::RECOVERY_TIME_STAMP)?
        .ok_or("no Recovery Time Stamp")?;
    Ok(recovery.0)
}

/// Concurrent requests get distinct sequences, and responses answered in
/// reverse order still reach the caller that sent the matching request.
#[tokio::test]
async fn test_concurrent_requests_no_cross_delivery() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let association = std::sync::Arc::new(open_association(&peer, peer.config()?).await?);

    let mut callers = Vec::new();
    for tag in 0..CONCURRENT {
        let association = association.clone();
        callers.push(tokio::spawn(async move {
            let response = association.request(tagged_heartbeat(tag)?).await?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>((tag, tag_of(&response)?))
        }));
    }

    let mut received: Vec<Received> = Vec::new();
    for _ in 0..CONCURRENT {
        received.push(peer.expect(MessageType::HeartbeatRequest).await?);
    }
    let sequences: HashSet<u32> = received.iter().map(|r| r.message.sequence).collect();
    assert_eq!(sequences.len(), CONCURRENT as usize);

    // echo each request's tag back, newest first
    for request in received.iter().rev() {
        let echo = raw(&RecoveryTimeStamp(tag_of(&request.message)?))?;
        peer.respond(request, Cause::RequestAccepted, &[echo]).await?;
    }

    for caller in callers {
        let (sent, echoed) = caller.await??;
        assert_eq!(sent, echoed);
    }
    assert_eq!(association.pending_requests().await, 0);
    Ok(())
}

/// A request left unanswered times out and its slot is released; a late
/// response is dropped and the association keeps working.
#[tokio::test]
async fn test_timeout_releases_slot() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let config = peer.config()?.with_response_timeout(Duration::from_millis(200));
    let association = open_association(&peer, config).await?;

    let result = association.request(tagged_heartbeat(1)?).await;
    assert!(matches!(result, Err(PfcpError::Timeout)));
    assert_eq!(association.pending_requests().await, 0);

    let late = peer.expect(MessageType::HeartbeatRequest).await?;
    peer.respond(&late, Cause::RequestAccepted, &[]).await?;

    let next = {
        let request = association.request(tagged_heartbeat(2)?);
        let answer = async {
            let request = peer.expect(MessageType::HeartbeatRequest).await?;
            assert_ne!(request.message.sequence, late.message.sequence);
            let echo = raw(&RecoveryTimeStamp(2))?;
            peer.respond(&request, Cause::RequestAccepted, &[echo]).await?;
            TestResult::Ok(())
        };
        let (response, answered) = tokio::join!(request, answer);
        answered?;
        response?
    };
    assert_eq!(tag_of(&next)?, 2);
    assert_eq!(association.pending_requests().await, 0);

    association.close().await;
    Ok(())
}

/// A response of the wrong type is surfaced, carrying the received message.
#[tokio::test]
async fn test_wrong_response_type() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let association = open_association(&peer, peer.config()?).await?;

    let (result, answered) = tokio::join!(association.request(tagged_heartbeat(3)?), async {
        let request = peer.expect(MessageType::HeartbeatRequest).await?;
        let mut wrong = Message::response_to(&request.message, MessageType::AssociationUpdateResponse);
        wrong.push(&Cause::RequestAccepted)?;
        peer.send(&wrong, request.from).await?;
        TestResult::Ok(())
    });
    answered?;

    match result {
        Err(PfcpError::UnexpectedResponse {
            expected,
            actual,
            message,
        }) => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 8);
            assert_eq!(message.message_type, MessageType::AssociationUpdateResponse);
        }
        other => return Err(format!("unexpected result {other:?}").into()),
    }
    assert_eq!(association.pending_requests().await, 0);
    association.close().await;
    Ok(())
}
