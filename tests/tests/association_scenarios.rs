//! Association lifecycle scenarios against the mock peer

use std::time::Duration;

use integration_tests::{init_test_logging, open_association, MockPeer, TestResult};
use nextgup_pfcp::ie::{types, Cause, NodeId, RecoveryTimeStamp};
use nextgup_pfcp::{
    Association, CreateRules, EstablishmentOptions, Message, MessageType, PfcpError,
    SessionState,
};
use tokio::net::UdpSocket;

/// A Heartbeat Request is answered with the same sequence and the
/// association's Recovery Time Stamp.
#[tokio::test]
async fn test_heartbeat_request_answered() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let association = open_association(&peer, peer.config()?).await?;

    // flags, type 1, length 4, sequence 0x000abc
    let request = [0x20, 0x01, 0x00, 0x04, 0x00, 0x0a, 0xbc, 0x00];
    peer.send_raw(&request, association.local_addr()).await?;

    let response = peer.expect(MessageType::HeartbeatResponse).await?;
    assert_eq!(response.message.sequence, 0x000abc);
    let recovery = response
        .message
        .find(types::RECOVERY_TIME_STAMP)
        .ok_or("no Recovery Time Stamp")?;
    assert_eq!(recovery.value.len(), 4);
    assert_eq!(
        recovery.decode::<RecoveryTimeStamp>()?,
        association.recovery_time_stamp()
    );

    association.close().await;
    Ok(())
}

/// A rejected Association Setup fails `open` and releases the socket.
#[tokio::test]
async fn test_setup_rejection_closes_socket() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let open = tokio::spawn(Association::open(peer.config()?));

    let setup = peer.expect(MessageType::AssociationSetupRequest).await?;
    assert!(setup.message.find(types::NODE_ID).is_some());
    assert!(setup.message.find(types::RECOVERY_TIME_STAMP).is_some());
    peer.respond(&setup, Cause::NoResourcesAvailable, &[]).await?;

    let result = open.await?;
    assert!(matches!(result, Err(PfcpError::PeerRejected { cause: 75 })));

    // the port the association used can be bound again
    UdpSocket::bind(setup.from).await?;
    Ok(())
}

/// An unanswered Association Setup times out and fails `open`.
#[tokio::test]
async fn test_setup_timeout() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let config = peer.config()?.with_response_timeout(Duration::from_millis(200));
    let open = tokio::spawn(Association::open(config));

    peer.expect(MessageType::AssociationSetupRequest).await?;
    assert!(matches!(open.await?, Err(PfcpError::Timeout)));
    Ok(())
}

/// Heartbeats go out on the configured interval while they are answered.
#[tokio::test]
async fn test_heartbeat_loop() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let config = peer
        .config()?
        .with_heartbeat_interval(Duration::from_millis(150))
        .with_response_timeout(Duration::from_millis(200));
    let association = open_association(&peer, config).await?;

    for _ in 0..2 {
        let heartbeat = peer.expect(MessageType::HeartbeatRequest).await?;
        assert!(heartbeat.message.find(types::RECOVERY_TIME_STAMP).is_some());
        let recovery = RecoveryTimeStamp::now();
        let extra = integration_tests::raw(&recovery)?;
        peer.respond(&heartbeat, Cause::RequestAccepted, &[extra]).await?;
    }

    // an unanswered heartbeat stops the loop for good
    peer.expect(MessageType::HeartbeatRequest).await?;
    assert!(peer.is_silent_for(Duration::from_millis(600)).await);

    association.close().await;
    Ok(())
}

/// Node Report Requests are accepted without a response.
#[tokio::test]
async fn test_node_report_accepted() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let association = open_association(&peer, peer.config()?).await?;

    let mut report = Message::new(MessageType::NodeReportRequest);
    report.sequence = 5;
    report.push(&NodeId::from(peer.addr()?.ip()))?;
    peer.send(&report, association.local_addr()).await?;
    assert!(peer.is_silent_for(Duration::from_millis(200)).await);

    association.close().await;
    Ok(())
}

/// Close deletes every session, then releases the association.
#[tokio::test]
async fn test_close_deletes_sessions_then_releases() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let association = open_association(&peer, peer.config()?).await?;
    let sessions = association.sessions();

    let mut peer_seids = Vec::new();
    for _ in 0..2 {
        let establish = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                sessions
                    .establish(&CreateRules::default(), &EstablishmentOptions::default())
                    .await
            })
        };
        let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
        let (peer_seid, _) = peer.accept_establishment(&request, &[]).await?;
        establish.await??;
        peer_seids.push(peer_seid);
    }

    let close = tokio::spawn(association.close());
    let mut deleted = Vec::new();
    for _ in 0..2 {
        let deletion = peer.expect(MessageType::SessionDeletionRequest).await?;
        deleted.push(deletion.message.seid.ok_or("deletion without SEID")?);
        peer.respond(&deletion, Cause::RequestAccepted, &[]).await?;
    }
    deleted.sort();
    assert_eq!(deleted, peer_seids);

    let release = peer.expect(MessageType::AssociationReleaseRequest).await?;
    assert!(release.message.find(types::NODE_ID).is_some());
    peer.respond(&release, Cause::RequestAccepted, &[]).await?;
    close.await?;

    assert!(sessions.list().await.is_empty());
    Ok(())
}

/// Close also deletes sessions still pending, addressed by SEID 0.
#[tokio::test]
async fn test_close_deletes_pending_sessions() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let association = open_association(&peer, peer.config()?).await?;
    let sessions = association.sessions();

    let establish = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            sessions
                .establish(&CreateRules::default(), &EstablishmentOptions::default())
                .await
        })
    };
    let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
    peer.respond(&request, Cause::RequestRejected, &[]).await?;
    assert!(establish.await?.is_err());
    assert_eq!(sessions.list().await[0].state, SessionState::Pending);

    let close = tokio::spawn(association.close());
    let deletion = peer.expect(MessageType::SessionDeletionRequest).await?;
    assert_eq!(deletion.message.seid, Some(0));
    peer.respond(&deletion, Cause::RequestAccepted, &[]).await?;

    let release = peer.expect(MessageType::AssociationReleaseRequest).await?;
    peer.respond(&release, Cause::RequestAccepted, &[]).await?;
    close.await?;

    assert!(sessions.list().await.is_empty());
    Ok(())
}

/// Close still releases the socket when the peer never answers.
#[tokio::test]
async fn test_close_with_silent_peer() -> TestResult {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let config = peer.config()?.with_response_timeout(Duration::from_millis(150));
    let association = open_association(&peer, config).await?;
    let local = association.local_addr();

    association.close().await;
    peer.expect(MessageType::AssociationReleaseRequest).await?;
    UdpSocket::bind(local).await?;
    Ok(())
}
