//! Session lifecycle scenarios against the mock peer

use std::net::Ipv4Addr;
use std::time::Duration;

use integration_tests::{init_test_logging, open_association, raw, MockPeer, TestResult};
use nextgup_pfcp::ie::{
    types, ApplyAction, Cause, CreateFar, CreatePdr, CreateQer, CreatedPdr, DownlinkDataReport,
    FTeid, ForwardingParameters, Interface, OuterHeaderCreation, Pdi, RemoveFar, RemovePdr,
    ReportType, UpdateFar, UpdatePdr, UpdatedPdr,
};
use nextgup_pfcp::{
    Association, CreateRules, EstablishmentOptions, Message, MessageType, ModificationOptions,
    PfcpError, RemoveRules, SessionManager, SessionState, UpdateRules,
};

fn uplink_rules() -> CreateRules {
    CreateRules {
        pdrs: vec![CreatePdr {
            pdr_id: 1,
            precedence: 255,
            pdi: Pdi {
                local_f_teid: Some(FTeid::Choose {
                    ipv4: true,
                    ipv6: false,
                    choose_id: None,
                }),
                network_instance: Some("internet".into()),
                ..Pdi::new(Interface::Access)
            },
            outer_header_removal: None,
            far_id: Some(1),
            urr_ids: vec![],
            qer_ids: vec![],
        }],
        fars: vec![CreateFar {
            far_id: 1,
            apply_action: ApplyAction::forward(),
            forwarding_parameters: Some(ForwardingParameters::new(Interface::Core)),
            bar_id: None,
        }],
        ..Default::default()
    }
}

async fn establish(
    peer: &MockPeer,
    sessions: &SessionManager,
    rules: CreateRules,
) -> TestResult<(u64, u64)> {
    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.establish(&rules, &EstablishmentOptions::default()).await })
    };
    let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
    let (peer_seid, _) = peer.accept_establishment(&request, &[]).await?;
    let result = task.await??;
    Ok((result.session_id, peer_seid))
}

async fn setup() -> TestResult<(MockPeer, Association)> {
    init_test_logging();
    let peer = MockPeer::bind().await?;
    let config = peer.config()?.with_response_timeout(Duration::from_millis(300));
    let association = open_association(&peer, config).await?;
    Ok((peer, association))
}

/// PDR then FAR in the request; the Created PDR's F-TEID reaches the caller.
#[tokio::test]
async fn test_establish_surfaces_created_pdr() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();

    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let options = EstablishmentOptions {
                dnn: Some("internet".into()),
                ..Default::default()
            };
            sessions.establish(&uplink_rules(), &options).await
        })
    };

    let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
    assert_eq!(request.message.seid, Some(0));
    let order: Vec<u16> = request.message.ies.iter().map(|ie| ie.ie_type).collect();
    assert_eq!(
        order,
        vec![
            types::NODE_ID,
            types::F_SEID,
            types::CREATE_PDR,
            types::CREATE_FAR,
            types::DNN
        ]
    );
    let pdr = request
        .message
        .decode_first::<CreatePdr>(types::CREATE_PDR)?
        .ok_or("no Create PDR")?;
    assert_eq!(pdr, uplink_rules().pdrs[0]);

    // pending until the peer answers
    let pending = sessions.list().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].state, SessionState::Pending);

    let assigned = FTeid::Assigned {
        teid: 0x0102_0304,
        ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
        ipv6: None,
    };
    let created = CreatedPdr {
        pdr_id: 1,
        local_f_teid: Some(assigned),
        ue_ip_address: None,
    };
    let (peer_seid, _) = peer.accept_establishment(&request, &[raw(&created)?]).await?;

    let result = task.await??;
    assert_eq!(result.peer_seid, peer_seid);
    assert_eq!(result.created_pdrs, vec![created]);
    assert_eq!(result.created_pdrs[0].local_f_teid.and_then(|f| f.teid()), Some(0x0102_0304));

    let info = sessions.session(result.session_id).await.ok_or("session missing")?;
    assert_eq!(info.state, SessionState::Active);
    assert_eq!(info.peer_seid, peer_seid);
    Ok(())
}

/// A rejected establishment leaves the session registered as pending; delete
/// still sends a deletion request, addressed by SEID 0.
#[tokio::test]
async fn test_rejected_establishment_stays_pending() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();

    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            sessions
                .establish(&uplink_rules(), &EstablishmentOptions::default())
                .await
        })
    };
    let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
    peer.respond(&request, Cause::RuleCreationModificationFailure, &[])
        .await?;
    assert!(matches!(
        task.await?,
        Err(PfcpError::PeerRejected { cause: 73 })
    ));

    let listed = sessions.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, SessionState::Pending);
    assert_eq!(listed[0].peer_seid, 0);

    let id = listed[0].id;
    assert!(matches!(
        sessions
            .modify(
                id,
                &RemoveRules::default(),
                &CreateRules::default(),
                &UpdateRules::default(),
                &ModificationOptions::default()
            )
            .await,
        Err(PfcpError::InvalidSessionState { state: SessionState::Pending, .. })
    ));

    let delete = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.delete(id).await })
    };
    let deletion = peer.expect(MessageType::SessionDeletionRequest).await?;
    assert_eq!(deletion.message.seid, Some(0));
    peer.respond(&deletion, Cause::RequestAccepted, &[]).await?;
    delete.await??;
    assert!(sessions.list().await.is_empty());
    Ok(())
}

/// A pending session whose deletion the peer rejects stays registered.
#[tokio::test]
async fn test_rejected_pending_deletion_keeps_session() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();

    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            sessions
                .establish(&uplink_rules(), &EstablishmentOptions::default())
                .await
        })
    };
    let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
    peer.respond(&request, Cause::RuleCreationModificationFailure, &[])
        .await?;
    assert!(task.await?.is_err());
    let id = sessions.list().await[0].id;

    let delete = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.delete(id).await })
    };
    let deletion = peer.expect(MessageType::SessionDeletionRequest).await?;
    peer.respond(&deletion, Cause::SessionContextNotFound, &[]).await?;
    assert!(matches!(
        delete.await?,
        Err(PfcpError::PeerRejected { cause: 65 })
    ));

    let info = sessions.session(id).await.ok_or("session missing")?;
    assert_eq!(info.state, SessionState::Pending);
    Ok(())
}

/// Modification IEs go out as removals, creations, updates, then options.
#[tokio::test]
async fn test_modify_ordering_and_results() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();
    let (id, peer_seid) = establish(&peer, &sessions, uplink_rules()).await?;

    let remove = RemoveRules {
        pdrs: vec![RemovePdr { pdr_id: 1 }],
        fars: vec![RemoveFar { far_id: 1 }],
        ..Default::default()
    };
    let create = CreateRules {
        qers: vec![CreateQer::new(3)],
        ..Default::default()
    };
    let update = UpdateRules {
        pdrs: vec![UpdatePdr {
            precedence: Some(10),
            ..UpdatePdr::new(2)
        }],
        fars: vec![UpdateFar {
            far_id: 2,
            apply_action: Some(ApplyAction::buffer_and_notify()),
            ..Default::default()
        }],
        ..Default::default()
    };
    let options = ModificationOptions {
        include_cp_f_seid: true,
        inactivity_timer: Some(120),
        include_node_id: true,
    };

    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.modify(id, &remove, &create, &update, &options).await })
    };
    let request = peer.expect(MessageType::SessionModificationRequest).await?;
    assert_eq!(request.message.seid, Some(peer_seid));
    let order: Vec<u16> = request.message.ies.iter().map(|ie| ie.ie_type).collect();
    assert_eq!(
        order,
        vec![
            types::F_SEID,
            types::REMOVE_PDR,
            types::REMOVE_FAR,
            types::CREATE_QER,
            types::UPDATE_PDR,
            types::UPDATE_FAR,
            types::USER_PLANE_INACTIVITY_TIMER,
            types::NODE_ID,
        ]
    );

    let updated = UpdatedPdr { pdr_id: 2 };
    peer.respond(&request, Cause::RequestAccepted, &[raw(&updated)?])
        .await?;
    let result = task.await??;
    assert!(result.created_pdrs.is_empty());
    assert_eq!(result.updated_pdrs, vec![updated]);
    Ok(())
}

/// Deleting an active session contacts the peer and removes it on success only.
#[tokio::test]
async fn test_delete_active_session() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();
    let (id, peer_seid) = establish(&peer, &sessions, uplink_rules()).await?;

    // first attempt rejected: the session survives
    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.delete(id).await })
    };
    let request = peer.expect(MessageType::SessionDeletionRequest).await?;
    assert_eq!(request.message.seid, Some(peer_seid));
    peer.respond(&request, Cause::SystemFailure, &[]).await?;
    assert!(task.await?.is_err());
    assert!(sessions.session(id).await.is_some());

    let task = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.delete(id).await })
    };
    let request = peer.expect(MessageType::SessionDeletionRequest).await?;
    peer.respond(&request, Cause::RequestAccepted, &[]).await?;
    task.await??;
    assert!(sessions.session(id).await.is_none());

    assert!(matches!(
        sessions.delete(id).await,
        Err(PfcpError::UnknownSession(unknown)) if unknown == id
    ));
    Ok(())
}

/// A report for an unregistered session gets cause 65 and reaches no inbox.
#[tokio::test]
async fn test_report_for_unknown_session() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();
    let (id, _) = establish(&peer, &sessions, uplink_rules()).await?;

    let unknown = id.wrapping_add(1);
    let mut report = Message::with_seid(MessageType::SessionReportRequest, unknown);
    report.sequence = 77;
    report.push(&ReportType {
        dldr: true,
        ..Default::default()
    })?;
    peer.send(&report, association.local_addr()).await?;

    let response = peer.expect(MessageType::SessionReportResponse).await?;
    assert_eq!(response.message.sequence, 77);
    assert_eq!(response.message.seid, Some(0));
    assert_eq!(response.message.cause()?, Some(65));
    assert_eq!(sessions.try_next_report(id).await?, None);
    Ok(())
}

/// Reports for a known session are acknowledged and queued in order.
#[tokio::test]
async fn test_reports_queue_per_session() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();
    let (id, peer_seid) = establish(&peer, &sessions, uplink_rules()).await?;

    let downlink = DownlinkDataReport {
        pdr_id: 1,
        ppi: None,
        qfi: Some(5),
        buffered: true,
        dropped: false,
    };
    for sequence in [10, 11] {
        let mut report = Message::with_seid(MessageType::SessionReportRequest, id);
        report.sequence = sequence;
        report.push(&ReportType {
            dldr: true,
            ..Default::default()
        })?;
        report.push(&downlink)?;
        peer.send(&report, association.local_addr()).await?;

        let response = peer.expect(MessageType::SessionReportResponse).await?;
        assert_eq!(response.message.sequence, sequence);
        assert_eq!(response.message.seid, Some(peer_seid));
        assert_eq!(response.message.cause()?, Some(1));
    }

    for _ in 0..2 {
        let report = tokio::time::timeout(Duration::from_secs(2), sessions.next_report(id)).await??;
        assert!(report.report_type.dldr);
        assert_eq!(report.downlink_data, Some(downlink));
    }
    assert_eq!(sessions.try_next_report(id).await?, None);

    // a report without Report Type is answered with Mandatory IE incorrect
    let mut broken = Message::with_seid(MessageType::SessionReportRequest, id);
    broken.sequence = 12;
    peer.send(&broken, association.local_addr()).await?;
    let response = peer.expect(MessageType::SessionReportResponse).await?;
    assert_eq!(response.message.cause()?, Some(69));
    assert_eq!(sessions.try_next_report(id).await?, None);
    Ok(())
}

/// Outer Header Creation in a FAR is encoded as configured.
#[tokio::test]
async fn test_establish_with_outer_header_creation() -> TestResult {
    let (peer, association) = setup().await?;
    let sessions = association.sessions();

    let mut rules = uplink_rules();
    rules.fars[0].forwarding_parameters = Some(ForwardingParameters {
        outer_header_creation: Some(OuterHeaderCreation::gtpu_ipv4(
            0xaabb_ccdd,
            Ipv4Addr::new(192, 168, 1, 10),
        )),
        ..ForwardingParameters::new(Interface::Access)
    });

    let task = {
        let sessions = sessions.clone();
        let rules = rules.clone();
        tokio::spawn(async move { sessions.establish(&rules, &EstablishmentOptions::default()).await })
    };
    let request = peer.expect(MessageType::SessionEstablishmentRequest).await?;
    let far = request
        .message
        .decode_first::<CreateFar>(types::CREATE_FAR)?
        .ok_or("no Create FAR")?;
    assert_eq!(far, rules.fars[0]);
    peer.accept_establishment(&request, &[]).await?;
    task.await??;
    Ok(())
}
