//! Session lifecycle
//!
//! Sessions move `Pending` → `Active` → removed. A session is registered as
//! `Pending` before its establishment request goes out and only becomes
//! `Active` once the peer answers with its SEID. A failed establishment
//! leaves the session `Pending`; [`SessionManager::delete`] still reaches the
//! peer for it, addressed by SEID 0.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::association::Shared;
use crate::error::{PfcpError, Result};
use crate::ie::{
    types, Cause, CreateBar, CreateFar, CreatePdr, CreateQer, CreateUrr, CreatedPdr,
    DownlinkDataReport, FSeid, IeEncode, NodeId, PdnType, RawIe, RecoveryTimeStamp, RemoveBar,
    RemoveFar, RemovePdr, RemoveQer, RemoveUrr, ReportType, SNssai, UpdateBar, UpdateFar,
    UpdatePdr, UpdateQer, UpdateUrr, UpdatedPdr,
};
use crate::message::{Message, MessageType};

/// Formats a local session id as 16 lowercase hex digits.
pub fn format_context_id(id: u64) -> String {
    format!("{id:016x}")
}

/// Parses 1 to 16 hex digits into a local session id.
pub fn parse_context_id(text: &str) -> Result<u64> {
    if text.is_empty() || text.len() > 16 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PfcpError::InvalidContextId(text.to_string()));
    }
    u64::from_str_radix(text, 16).map_err(|_| PfcpError::InvalidContextId(text.to_string()))
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Registered locally, peer has not confirmed
    Pending,
    /// Peer SEID known
    Active,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Active => f.write_str("active"),
        }
    }
}

/// Snapshot of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Local SEID
    pub id: u64,
    /// Peer SEID, zero until established
    pub peer_seid: u64,
    /// Current state
    pub state: SessionState,
}

/// A decoded Session Report Request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    /// Which reports the message carries
    pub report_type: ReportType,
    /// Downlink data notification, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downlink_data: Option<DownlinkDataReport>,
}

impl SessionReport {
    fn decode(message: &Message) -> Result<Self> {
        Ok(Self {
            report_type: message
                .decode_first(types::REPORT_TYPE)?
                .ok_or(PfcpError::MissingIe(types::REPORT_TYPE))?,
            downlink_data: message.decode_first(types::DOWNLINK_DATA_REPORT)?,
        })
    }
}

/// Rules to create, in PDR, FAR, URR, QER, BAR order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRules {
    /// Create PDR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pdrs: Vec<CreatePdr>,
    /// Create FAR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fars: Vec<CreateFar>,
    /// Create URR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urrs: Vec<CreateUrr>,
    /// Create QER list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qers: Vec<CreateQer>,
    /// Create BAR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<CreateBar>,
}

/// Rules to update, in PDR, FAR, URR, QER, BAR order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRules {
    /// Update PDR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pdrs: Vec<UpdatePdr>,
    /// Update FAR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fars: Vec<UpdateFar>,
    /// Update URR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urrs: Vec<UpdateUrr>,
    /// Update QER list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qers: Vec<UpdateQer>,
    /// Update BAR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<UpdateBar>,
}

/// Rules to remove, in PDR, FAR, URR, QER, BAR order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoveRules {
    /// Remove PDR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pdrs: Vec<RemovePdr>,
    /// Remove FAR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fars: Vec<RemoveFar>,
    /// Remove URR list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urrs: Vec<RemoveUrr>,
    /// Remove QER list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qers: Vec<RemoveQer>,
    /// Remove BAR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<RemoveBar>,
}

fn push_rules<P, F, U, Q, B>(
    message: &mut Message,
    pdrs: &[P],
    fars: &[F],
    urrs: &[U],
    qers: &[Q],
    bar: Option<&B>,
) -> Result<()>
where
    P: IeEncode,
    F: IeEncode,
    U: IeEncode,
    Q: IeEncode,
    B: IeEncode,
{
    pdrs.iter().try_for_each(|ie| message.push(ie))?;
    fars.iter().try_for_each(|ie| message.push(ie))?;
    urrs.iter().try_for_each(|ie| message.push(ie))?;
    qers.iter().try_for_each(|ie| message.push(ie))?;
    if let Some(bar) = bar {
        message.push(bar)?;
    }
    Ok(())
}

impl CreateRules {
    fn push_into(&self, message: &mut Message) -> Result<()> {
        push_rules(message, &self.pdrs, &self.fars, &self.urrs, &self.qers, self.bar.as_ref())
    }
}

impl UpdateRules {
    fn push_into(&self, message: &mut Message) -> Result<()> {
        push_rules(message, &self.pdrs, &self.fars, &self.urrs, &self.qers, self.bar.as_ref())
    }
}

impl RemoveRules {
    fn push_into(&self, message: &mut Message) -> Result<()> {
        push_rules(message, &self.pdrs, &self.fars, &self.urrs, &self.qers, self.bar.as_ref())
    }
}

fn inactivity_timer_ie(seconds: u32) -> RawIe {
    RawIe::new(
        types::USER_PLANE_INACTIVITY_TIMER,
        seconds.to_be_bytes().to_vec(),
    )
}

/// Optional session-level IEs of a Session Establishment Request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstablishmentOptions {
    /// PDN Type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdn_type: Option<PdnType>,
    /// User Plane Inactivity Timer, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timer: Option<u32>,
    /// Data network name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnn: Option<String>,
    /// Include the association's Recovery Time Stamp
    pub include_recovery_time_stamp: bool,
    /// Network slice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_nssai: Option<SNssai>,
}

impl EstablishmentOptions {
    fn push_into(&self, message: &mut Message, recovery: RecoveryTimeStamp) -> Result<()> {
        if let Some(pdn_type) = &self.pdn_type {
            message.push(pdn_type)?;
        }
        if let Some(seconds) = self.inactivity_timer {
            message.ies.push(inactivity_timer_ie(seconds));
        }
        if let Some(dnn) = &self.dnn {
            message
                .ies
                .push(RawIe::new(types::DNN, dnn.as_bytes().to_vec()));
        }
        if self.include_recovery_time_stamp {
            message.push(&recovery)?;
        }
        if let Some(s_nssai) = &self.s_nssai {
            message.push(s_nssai)?;
        }
        Ok(())
    }
}

/// Optional IEs of a Session Modification Request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModificationOptions {
    /// Resend the CP F-SEID
    pub include_cp_f_seid: bool,
    /// New User Plane Inactivity Timer, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timer: Option<u32>,
    /// Include the local Node ID
    pub include_node_id: bool,
}

/// Outcome of a successful establishment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishmentResult {
    /// Local SEID, the caller's handle for the session
    pub session_id: u64,
    /// SEID assigned by the peer
    pub peer_seid: u64,
    /// Created PDR IEs echoed by the peer
    pub created_pdrs: Vec<CreatedPdr>,
}

/// Outcome of a successful modification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModificationResult {
    /// Created PDR IEs echoed by the peer
    pub created_pdrs: Vec<CreatedPdr>,
    /// Updated PDR IEs echoed by the peer
    pub updated_pdrs: Vec<UpdatedPdr>,
}

struct SessionEntry {
    peer_seid: u64,
    state: SessionState,
    reports_tx: mpsc::UnboundedSender<SessionReport>,
    inbox: Arc<Mutex<mpsc::UnboundedReceiver<SessionReport>>>,
}

impl SessionEntry {
    fn info(&self, id: u64) -> SessionInfo {
        SessionInfo {
            id,
            peer_seid: self.peer_seid,
            state: self.state,
        }
    }
}

/// Sessions keyed by local SEID
#[derive(Default)]
pub(crate) struct SessionRegistry {
    sessions: HashMap<u64, SessionEntry>,
}

impl SessionRegistry {
    /// Registers a `Pending` session under a fresh random id.
    fn register(&mut self) -> u64 {
        let id = loop {
            let id: u64 = rand::random();
            if id != 0 && !self.sessions.contains_key(&id) {
                break id;
            }
        };
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        self.sessions.insert(
            id,
            SessionEntry {
                peer_seid: 0,
                state: SessionState::Pending,
                reports_tx,
                inbox: Arc::new(Mutex::new(reports_rx)),
            },
        );
        id
    }

    fn activate(&mut self, id: u64, peer_seid: u64) {
        if let Some(entry) = self.sessions.get_mut(&id) {
            entry.peer_seid = peer_seid;
            entry.state = SessionState::Active;
        }
    }

    fn get(&self, id: u64) -> Result<&SessionEntry> {
        self.sessions.get(&id).ok_or(PfcpError::UnknownSession(id))
    }

    fn remove(&mut self, id: u64) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub(crate) fn drain(&mut self) -> Vec<SessionInfo> {
        self.sessions
            .drain()
            .map(|(id, entry)| entry.info(id))
            .collect()
    }
}

/// Establishes, modifies and deletes sessions over an association.
///
/// Obtained from [`Association::sessions`](crate::Association::sessions);
/// clones share the same registry.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    fn local_ip(&self) -> IpAddr {
        self.shared.local_addr.ip()
    }

    fn node_id(&self) -> NodeId {
        self.shared.node_id.clone()
    }

    /// Registers a new session and asks the peer to establish it.
    ///
    /// On any failure after the request was sent, the session stays
    /// registered as `Pending`.
    pub async fn establish(
        &self,
        create: &CreateRules,
        options: &EstablishmentOptions,
    ) -> Result<EstablishmentResult> {
        let id = self.shared.sessions.write().await.register();
        let context = format_context_id(id);

        let request = match self.establishment_request(id, create, options) {
            Ok(request) => request,
            Err(e) => {
                self.shared.sessions.write().await.remove(id);
                return Err(e);
            }
        };

        info!("Establishing session {}", context);
        let response = self.shared.transactor.send(request).await.map_err(|e| {
            warn!("Session {} establishment failed: {}", context, e);
            e
        })?;
        if let Err(e) = response.ensure_accepted() {
            warn!("Session {} establishment rejected: {}", context, e);
            return Err(e);
        }

        let peer = response
            .decode_first::<FSeid>(types::F_SEID)?
            .ok_or(PfcpError::MissingIe(types::F_SEID))?;
        let created_pdrs = response
            .find_all(types::CREATED_PDR)
            .map(|ie| ie.decode())
            .collect::<Result<Vec<CreatedPdr>>>()?;

        self.shared.sessions.write().await.activate(id, peer.seid);
        info!(
            "Session {} active, peer SEID {:#018x}",
            context, peer.seid
        );

        Ok(EstablishmentResult {
            session_id: id,
            peer_seid: peer.seid,
            created_pdrs,
        })
    }

    fn establishment_request(
        &self,
        id: u64,
        create: &CreateRules,
        options: &EstablishmentOptions,
    ) -> Result<Message> {
        let mut request = Message::with_seid(MessageType::SessionEstablishmentRequest, 0);
        request.push(&self.node_id())?;
        request.push(&FSeid::new(id, self.local_ip()))?;
        create.push_into(&mut request)?;
        options.push_into(&mut request, self.shared.recovery)?;
        Ok(request)
    }

    /// Modifies an `Active` session.
    ///
    /// IEs go out as removals, then creations, then updates, then the
    /// optional fields. A requested CP F-SEID precedes the rule lists.
    pub async fn modify(
        &self,
        id: u64,
        remove: &RemoveRules,
        create: &CreateRules,
        update: &UpdateRules,
        options: &ModificationOptions,
    ) -> Result<ModificationResult> {
        let peer_seid = self.active_peer_seid(id).await?;

        let mut request = Message::with_seid(MessageType::SessionModificationRequest, peer_seid);
        if options.include_cp_f_seid {
            request.push(&FSeid::new(id, self.local_ip()))?;
        }
        remove.push_into(&mut request)?;
        create.push_into(&mut request)?;
        update.push_into(&mut request)?;
        if let Some(seconds) = options.inactivity_timer {
            request.ies.push(inactivity_timer_ie(seconds));
        }
        if options.include_node_id {
            request.push(&self.node_id())?;
        }

        debug!("Modifying session {}", format_context_id(id));
        let response = self.shared.transactor.send(request).await?;
        response.ensure_accepted()?;

        Ok(ModificationResult {
            created_pdrs: response
                .find_all(types::CREATED_PDR)
                .map(|ie| ie.decode())
                .collect::<Result<_>>()?,
            updated_pdrs: response
                .find_all(types::UPDATED_PDR)
                .map(|ie| ie.decode())
                .collect::<Result<_>>()?,
        })
    }

    /// Deletes a session.
    ///
    /// The deletion request is addressed by the peer SEID, which is 0 for a
    /// `Pending` session. The session is removed only once the peer accepts.
    pub async fn delete(&self, id: u64) -> Result<()> {
        let info = self.session(id).await.ok_or(PfcpError::UnknownSession(id))?;
        let context = format_context_id(id);

        let request = Message::with_seid(MessageType::SessionDeletionRequest, info.peer_seid);
        let response = self.shared.transactor.send(request).await?;
        response.ensure_accepted()?;

        self.shared.sessions.write().await.remove(id);
        info!("Session {} deleted", context);
        Ok(())
    }

    /// Snapshot of one session
    pub async fn session(&self, id: u64) -> Option<SessionInfo> {
        let registry = self.shared.sessions.read().await;
        registry.get(id).ok().map(|entry| entry.info(id))
    }

    /// Snapshot of every session, ordered by id
    pub async fn list(&self) -> Vec<SessionInfo> {
        let registry = self.shared.sessions.read().await;
        let mut sessions: Vec<_> = registry
            .sessions
            .iter()
            .map(|(id, entry)| entry.info(*id))
            .collect();
        sessions.sort_by_key(|info| info.id);
        sessions
    }

    /// Waits for the next report queued for session `id`.
    ///
    /// Fails with `UnknownSession` if the session does not exist or is
    /// removed while waiting with nothing left queued.
    pub async fn next_report(&self, id: u64) -> Result<SessionReport> {
        let inbox = self.inbox(id).await?;
        let mut inbox = inbox.lock().await;
        inbox.recv().await.ok_or(PfcpError::UnknownSession(id))
    }

    /// Takes the next queued report for session `id` without waiting.
    pub async fn try_next_report(&self, id: u64) -> Result<Option<SessionReport>> {
        let inbox = self.inbox(id).await?;
        let mut inbox = inbox.lock().await;
        Ok(inbox.try_recv().ok())
    }

    async fn inbox(&self, id: u64) -> Result<Arc<Mutex<mpsc::UnboundedReceiver<SessionReport>>>> {
        let registry = self.shared.sessions.read().await;
        Ok(registry.get(id)?.inbox.clone())
    }

    async fn active_peer_seid(&self, id: u64) -> Result<u64> {
        let registry = self.shared.sessions.read().await;
        let entry = registry.get(id)?;
        match entry.state {
            SessionState::Active => Ok(entry.peer_seid),
            state => Err(PfcpError::InvalidSessionState { seid: id, state }),
        }
    }
}

/// Answers a Session Report Request and queues the report for its session.
///
/// A response always goes back: cause 65 with SEID 0 for an unknown
/// session, cause 69 for an undecodable report.
pub(crate) async fn handle_report(shared: &Shared, request: &Message) -> Result<()> {
    let local_id = request.seid.unwrap_or(0);
    let target = {
        let registry = shared.sessions.read().await;
        registry
            .get(local_id)
            .ok()
            .map(|entry| (entry.peer_seid, entry.reports_tx.clone()))
    };

    let mut response = Message::response_to(request, MessageType::SessionReportResponse);
    let cause = match target {
        None => {
            warn!(
                "Session Report for unknown session {}",
                format_context_id(local_id)
            );
            response.seid = Some(0);
            Cause::SessionContextNotFound
        }
        Some((peer_seid, reports_tx)) => {
            response.seid = Some(peer_seid);
            match SessionReport::decode(request) {
                Ok(report) => {
                    debug!(
                        "Session {} report {:?}",
                        format_context_id(local_id),
                        report.report_type
                    );
                    // receiver lives as long as the registry entry
                    let _ = reports_tx.send(report);
                    Cause::RequestAccepted
                }
                Err(e) => {
                    warn!(
                        "Undecodable Session Report for {}: {}",
                        format_context_id(local_id),
                        e
                    );
                    Cause::MandatoryIeIncorrect
                }
            }
        }
    };
    response.push(&cause)?;
    shared.transactor.reply(&response).await
}
