//! Per-peer session: the report and mutation operations the command layer calls.
//!
//! A [`PeerSession`] owns the [`ExchangeCoordinator`] for one peer. Reports are
//! lock-free and may run concurrently; mutations are serialised per session so
//! each write is planned against, and carries the token of, a fetch that
//! completed after the previous write.
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::ExchangeError;
use crate::exchange::{Delivery, ExchangeCoordinator, InboundMessage, PeerId};
use crate::model::{AchievementDefinition, StatWrite};
use crate::planner::{plan_mutation, Diagnostic};
use crate::schema::{apply_display_names, parse_achievements};

/// One line of an achievement report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// 1-based, schema order.
    pub index: u32,
    pub name: String,
    pub unlocked: bool,
    pub restricted: bool,
}

impl ReportRow {
    /// Row for the definition at zero-based position `pos`.
    pub fn from_definition(pos: usize, def: &AchievementDefinition) -> Self {
        Self {
            index: pos as u32 + 1,
            name: def.display_name.clone().unwrap_or_default(),
            unlocked: def.is_unlocked,
            restricted: def.restricted,
        }
    }
}

/// Outcome of [`PeerSession::apply_mutation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationReport {
    pub resource_id: u64,
    pub set: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Writes submitted to the peer; empty when nothing was applicable.
    pub writes: Vec<StatWrite>,
    pub success: bool,
}

pub struct PeerSession {
    coordinator: ExchangeCoordinator,
    locale: String,
    mutation_lock: Mutex<()>,
}

impl PeerSession {
    pub fn new(coordinator: ExchangeCoordinator, locale: impl Into<String>) -> Self {
        Self {
            coordinator,
            locale: locale.into(),
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn peer(&self) -> &PeerId {
        self.coordinator.peer()
    }

    pub fn coordinator(&self) -> &ExchangeCoordinator {
        &self.coordinator
    }

    /// Fetch `resource_id` and list its achievements with localized names.
    pub async fn get_report(&self, resource_id: u64) -> Result<Vec<ReportRow>, ExchangeError> {
        let definitions = self.fetch_definitions(resource_id).await?;
        Ok(definitions
            .iter()
            .enumerate()
            .map(|(pos, def)| ReportRow::from_definition(pos, def))
            .collect())
    }

    /// Reports for several resources fetched concurrently; results follow
    /// `resource_ids` order.
    pub async fn get_reports(
        self: &Arc<Self>,
        resource_ids: &[u64],
    ) -> Vec<(u64, Result<Vec<ReportRow>, ExchangeError>)> {
        let handles: Vec<(u64, JoinHandle<_>)> = resource_ids
            .iter()
            .map(|&resource_id| {
                let session = Arc::clone(self);
                (
                    resource_id,
                    tokio::spawn(async move { session.get_report(resource_id).await }),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (resource_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            };
            results.push((resource_id, result));
        }
        results
    }

    /// Move the achievements at `indices` (1-based; empty means all) to `set`.
    ///
    /// Per-item problems land in [`MutationReport::diagnostics`]. Failures before
    /// the write (fetch, decode, transport down) abort with an error. A write the
    /// peer rejects or never acknowledges still returns the report, with
    /// `success == false`.
    pub async fn apply_mutation(
        &self,
        resource_id: u64,
        indices: &[u32],
        set: bool,
    ) -> Result<MutationReport, ExchangeError> {
        let _serial = self.mutation_lock.lock().await;

        let fetched = self.coordinator.fetch(resource_id).await?;
        let definitions = parse_achievements(&fetched.schema, &fetched.stats)?;
        let plan = plan_mutation(&definitions, indices, set);
        for diagnostic in &plan.diagnostics {
            debug!("peer {} resource {}: {}", self.peer(), resource_id, diagnostic);
        }

        if !plan.has_writes() {
            info!(
                "peer {} resource {}: nothing to write ({} diagnostic(s))",
                self.peer(),
                resource_id,
                plan.diagnostics.len()
            );
            return Ok(MutationReport {
                resource_id,
                set,
                diagnostics: plan.diagnostics,
                writes: Vec::new(),
                success: false,
            });
        }

        let success = match self
            .coordinator
            .write(resource_id, plan.writes.clone(), fetched.version_token)
            .await
        {
            Ok(()) => true,
            Err(e @ (ExchangeError::RemoteRejected { .. } | ExchangeError::Timeout { .. })) => {
                warn!("peer {} resource {}: write failed: {}", self.peer(), resource_id, e);
                false
            }
            Err(e) => return Err(e),
        };
        Ok(MutationReport {
            resource_id,
            set,
            diagnostics: plan.diagnostics,
            writes: plan.writes,
            success,
        })
    }

    pub fn deliver(&self, msg: InboundMessage) -> Delivery {
        self.coordinator.deliver(msg)
    }

    /// Feed replies from the transport's receive side into this session until
    /// the channel closes.
    pub fn spawn_inbound_pump(
        self: &Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                session.deliver(msg);
            }
            debug!("peer {} inbound channel closed", session.peer());
        })
    }

    async fn fetch_definitions(
        &self,
        resource_id: u64,
    ) -> Result<Vec<AchievementDefinition>, ExchangeError> {
        let fetched = self.coordinator.fetch(resource_id).await?;
        let mut definitions = parse_achievements(&fetched.schema, &fetched.stats)?;
        apply_display_names(&mut definitions, &self.locale);
        debug!(
            "peer {} resource {}: {} achievement(s)",
            self.peer(),
            resource_id,
            definitions.len()
        );
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::exchange::{ChannelTransport, FetchResponse, OutboundRequest, WriteAck};
    use crate::model::RawStat;
    use crate::schema::kv::{encode, Node};

    fn schema() -> Vec<u8> {
        let bit = |idx: &str, name: &str| {
            Node::table(
                idx,
                vec![Node::table(
                    "display",
                    vec![Node::table("name", vec![Node::string("english", name)])],
                )],
            )
        };
        encode(&Node::table(
            "440",
            vec![Node::table(
                "stats",
                vec![Node::table(
                    "10",
                    vec![
                        Node::int("type", 4),
                        Node::table("bits", vec![bit("0", "First"), bit("1", "Second")]),
                    ],
                )],
            )],
        ))
    }

    fn session() -> (Arc<PeerSession>, mpsc::UnboundedReceiver<OutboundRequest>) {
        let (transport, rx) = ChannelTransport::channel();
        let coordinator = ExchangeCoordinator::with_seed(
            PeerId::from("bot-a"),
            Arc::new(transport),
            Duration::from_secs(5),
            1,
        );
        (Arc::new(PeerSession::new(coordinator, "english")), rx)
    }

    fn reply_fetch(session: &PeerSession, id: u64, value: u32) {
        session.deliver(InboundMessage::FetchResponse(FetchResponse {
            correlation_id: id,
            success: true,
            schema: schema(),
            stats: vec![RawStat::new(10, value)],
            version_token: 5,
        }));
    }

    #[tokio::test]
    async fn report_lists_rows_in_schema_order() {
        let (session, mut rx) = session();
        let s = session.clone();
        let task = tokio::spawn(async move { s.get_report(440).await });
        let id = rx.recv().await.unwrap().correlation_id();
        reply_fetch(&session, id, 0b10);

        let rows = task.await.unwrap().unwrap();
        assert_eq!(
            rows,
            vec![
                ReportRow { index: 1, name: "First".into(), unlocked: false, restricted: false },
                ReportRow { index: 2, name: "Second".into(), unlocked: true, restricted: false },
            ]
        );
    }

    #[tokio::test]
    async fn mutation_fetches_then_writes() {
        let (session, mut rx) = session();
        let s = session.clone();
        let task = tokio::spawn(async move { s.apply_mutation(440, &[1, 2], true).await });

        let id = rx.recv().await.unwrap().correlation_id();
        reply_fetch(&session, id, 0b10);

        let write = rx.recv().await.unwrap();
        let OutboundRequest::Write(req) = &write else {
            panic!("expected write, got {write:?}");
        };
        assert_eq!(req.writes, vec![StatWrite { stat_id: 10, value: 0b11 }]);
        assert_eq!(req.version_token, 5);
        session.deliver(InboundMessage::WriteAck(WriteAck {
            correlation_id: req.correlation_id,
            success: true,
        }));

        let report = task.await.unwrap().unwrap();
        assert!(report.success);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::AlreadyInState { index: 2, unlocked: true }]
        );
    }

    #[tokio::test]
    async fn rejected_write_keeps_diagnostics() {
        let (session, mut rx) = session();
        let s = session.clone();
        let task = tokio::spawn(async move { s.apply_mutation(440, &[9, 2], true).await });
        let id = rx.recv().await.unwrap().correlation_id();
        reply_fetch(&session, id, 0);

        let write = rx.recv().await.unwrap();
        session.deliver(InboundMessage::WriteAck(WriteAck {
            correlation_id: write.correlation_id(),
            success: false,
        }));

        let report = task.await.unwrap().unwrap();
        assert!(!report.success);
        assert_eq!(report.diagnostics, vec![Diagnostic::OutOfRange { index: 9 }]);
        assert_eq!(report.writes, vec![StatWrite { stat_id: 10, value: 0b10 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_write_reports_failure() {
        let (session, mut rx) = session();
        let s = session.clone();
        let task = tokio::spawn(async move { s.apply_mutation(440, &[1, 2], true).await });
        let id = rx.recv().await.unwrap().correlation_id();
        reply_fetch(&session, id, 0b01);
        assert!(matches!(rx.recv().await, Some(OutboundRequest::Write(_))));

        let report = task.await.unwrap().unwrap();
        assert!(!report.success);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::AlreadyInState { index: 1, unlocked: true }]
        );
        assert_eq!(session.coordinator().metrics().timeouts, 1);
    }

    #[tokio::test]
    async fn nothing_to_write_skips_write_request() {
        let (session, mut rx) = session();
        let s = session.clone();
        let task = tokio::spawn(async move { s.apply_mutation(440, &[5], true).await });
        let id = rx.recv().await.unwrap().correlation_id();
        reply_fetch(&session, id, 0);

        let report = task.await.unwrap().unwrap();
        assert!(!report.success);
        assert!(report.writes.is_empty());
        assert_eq!(report.diagnostics, vec![Diagnostic::OutOfRange { index: 5 }]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn corrupt_schema_aborts_before_write() {
        let (session, mut rx) = session();
        let s = session.clone();
        let task = tokio::spawn(async move { s.apply_mutation(440, &[], true).await });
        let id = rx.recv().await.unwrap().correlation_id();
        session.deliver(InboundMessage::FetchResponse(FetchResponse {
            correlation_id: id,
            success: true,
            schema: vec![0x00, b'x'],
            stats: vec![],
            version_token: 0,
        }));
        assert!(matches!(task.await.unwrap(), Err(ExchangeError::SchemaDecode(_))));
        assert!(rx.try_recv().is_err());
    }
}
