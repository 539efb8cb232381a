//! Tunnel engine scenarios over real loopback sockets

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use integration_tests::{init_test_logging, MemoryOpener, TestResult, DEFAULT_TEST_TIMEOUT};
use nextgup_gtp::{GtpConfig, GtpHeader, GtpMessageType, Handler};
use tokio::net::UdpSocket;
use tokio::time::timeout;

async fn start_handler() -> TestResult<(Handler, Arc<MemoryOpener>)> {
    let opener = Arc::new(MemoryOpener::new());
    let handler =
        Handler::start_with_opener(GtpConfig::new("127.0.0.1:0".parse()?), opener.clone()).await?;
    Ok((handler, opener))
}

fn t_pdu(teid: u32, payload: &[u8]) -> Vec<u8> {
    let mut datagram = vec![0x30, 0xff, 0x00, payload.len() as u8];
    datagram.extend_from_slice(&teid.to_be_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Downlink T-PDU from the bound peer reaches the device; the same frame
/// from another address does not.
#[tokio::test]
async fn test_downlink_from_bound_peer_only() -> TestResult {
    init_test_logging();
    let (handler, opener) = start_handler().await?;

    let peer = UdpSocket::bind("127.0.0.1:0").await?;
    let stranger = UdpSocket::bind("127.0.0.2:0").await?;
    let teid = handler.bind(peer.local_addr()?, "tun0").await?;
    let port = opener.port("tun0").await.ok_or("tun0 not opened")?;

    stranger
        .send_to(&t_pdu(teid, &[9, 9, 9, 9]), handler.local_addr())
        .await?;
    peer.send_to(&t_pdu(teid, &[1, 2, 3, 4]), handler.local_addr())
        .await?;

    let written = timeout(DEFAULT_TEST_TIMEOUT, port.next_written())
        .await?
        .ok_or("device closed")?;
    assert_eq!(written, vec![1, 2, 3, 4]);
    // the stranger's frame was rejected, not delayed
    assert_eq!(port.try_next_written().await, None);

    handler.close().await;
    Ok(())
}

/// Frames for an unbound TEID are dropped without disturbing bound tunnels.
#[tokio::test]
async fn test_unknown_teid_dropped() -> TestResult {
    init_test_logging();
    let (handler, opener) = start_handler().await?;
    let peer = UdpSocket::bind("127.0.0.1:0").await?;
    let teid = handler.bind(peer.local_addr()?, "tun0").await?;
    let port = opener.port("tun0").await.ok_or("tun0 not opened")?;

    peer.send_to(&t_pdu(teid.wrapping_add(1), &[7; 4]), handler.local_addr())
        .await?;
    peer.send_to(&[0x30, 0xff], handler.local_addr()).await?;
    peer.send_to(&t_pdu(teid, &[5; 4]), handler.local_addr())
        .await?;

    let written = timeout(DEFAULT_TEST_TIMEOUT, port.next_written())
        .await?
        .ok_or("device closed")?;
    assert_eq!(written, vec![5; 4]);

    handler.close().await;
    Ok(())
}

/// Packets read from the device leave as T-PDUs, with a PDU Session
/// Container once a flow id is assigned.
#[tokio::test]
async fn test_uplink_encapsulation() -> TestResult {
    init_test_logging();
    let (handler, opener) = start_handler().await?;
    let peer = UdpSocket::bind("127.0.0.1:0").await?;
    let teid = handler.bind(peer.local_addr()?, "tun0").await?;
    let port = opener.port("tun0").await.ok_or("tun0 not opened")?;
    let mut buf = vec![0u8; 2048];

    port.inject(vec![0x45, 0, 0, 20]);
    let n = timeout(DEFAULT_TEST_TIMEOUT, peer.recv(&mut buf)).await??;
    let plain = GtpHeader::decode(&buf[..n])?;
    assert_eq!(plain.message_type, GtpMessageType::TPdu);
    assert_eq!(plain.teid, teid);
    assert_eq!(plain.qfi, None);
    assert_eq!(plain.payload, Bytes::from_static(&[0x45, 0, 0, 20]));
    assert_eq!(&buf[2..4], &4u16.to_be_bytes());

    handler.set_flow_id(teid, 9).await?;
    port.inject(vec![0x45, 0, 0, 20]);
    let n = timeout(DEFAULT_TEST_TIMEOUT, peer.recv(&mut buf)).await??;
    let tagged = GtpHeader::decode(&buf[..n])?;
    assert_eq!(tagged.qfi, Some(9));
    assert_eq!(buf[0] & 0x04, 0x04);
    assert_eq!(&buf[2..4], &12u16.to_be_bytes());
    assert_eq!(tagged.payload, Bytes::from_static(&[0x45, 0, 0, 20]));

    handler.close().await;
    Ok(())
}

/// A device packet whose frame would overflow the length field is dropped;
/// the pump keeps forwarding what follows.
#[tokio::test]
async fn test_oversized_uplink_packet_dropped() -> TestResult {
    init_test_logging();
    let (handler, opener) = start_handler().await?;
    let peer = UdpSocket::bind("127.0.0.1:0").await?;
    let teid = handler.bind(peer.local_addr()?, "tun0").await?;
    handler.set_flow_id(teid, 1).await?;
    let port = opener.port("tun0").await.ok_or("tun0 not opened")?;

    port.inject(vec![0x45; 65535]);
    port.inject(vec![0x45, 0, 0, 20]);

    let mut buf = vec![0u8; 2048];
    let n = timeout(DEFAULT_TEST_TIMEOUT, peer.recv(&mut buf)).await??;
    let frame = GtpHeader::decode(&buf[..n])?;
    assert_eq!(frame.teid, teid);
    assert_eq!(frame.payload, Bytes::from_static(&[0x45, 0, 0, 20]));

    handler.close().await;
    Ok(())
}

/// An Echo Request is answered with the same sequence number.
#[tokio::test]
async fn test_echo_request_answered() -> TestResult {
    init_test_logging();
    let (handler, _opener) = start_handler().await?;
    let peer = UdpSocket::bind("127.0.0.1:0").await?;

    peer.send_to(&GtpHeader::echo_request(0x0102).encode()?, handler.local_addr())
        .await?;
    let mut buf = vec![0u8; 64];
    let n = timeout(DEFAULT_TEST_TIMEOUT, peer.recv(&mut buf)).await??;
    let response = GtpHeader::decode(&buf[..n])?;
    assert_eq!(response.message_type, GtpMessageType::EchoResponse);
    assert_eq!(response.sequence_number, Some(0x0102));

    handler.close().await;
    Ok(())
}

/// Keepalive sends one Echo Request per distinct peer IP.
#[tokio::test]
async fn test_keepalive_deduplicates_peers() -> TestResult {
    init_test_logging();
    let opener = Arc::new(MemoryOpener::new());
    let config = GtpConfig::new("127.0.0.1:0".parse()?).with_echo_interval(Duration::from_millis(500));
    let handler = Handler::start_with_opener(config, opener).await?;

    // two tunnels towards the same IP on different ports
    let first = UdpSocket::bind("127.0.0.1:0").await?;
    let second = UdpSocket::bind("127.0.0.1:0").await?;
    handler.bind(first.local_addr()?, "tun0").await?;
    handler.bind(second.local_addr()?, "tun1").await?;

    let mut buf_a = vec![0u8; 64];
    let mut buf_b = vec![0u8; 64];
    let (echo, silent) = tokio::select! {
        r = first.recv(&mut buf_a) => (GtpHeader::decode(&buf_a[..r?])?, &second),
        r = second.recv(&mut buf_b) => (GtpHeader::decode(&buf_b[..r?])?, &first),
        _ = tokio::time::sleep(DEFAULT_TEST_TIMEOUT) => return Err("no Echo Request".into()),
    };
    assert_eq!(echo.message_type, GtpMessageType::EchoRequest);
    assert!(echo.sequence_number.is_some());

    let mut other = vec![0u8; 64];
    let duplicate = timeout(Duration::from_millis(200), silent.recv(&mut other)).await;
    assert!(duplicate.is_err());

    handler.close().await;
    Ok(())
}
