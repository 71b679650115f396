//! The assignment engine.
//!
//! Owns the whole life of one assignment attempt: admission, the
//! strategy cascade, the atomic claim, order persistence, and the
//! best-effort fan-out. Runs as a detached task per order, decoupled
//! from the payment request that triggered it.
//!
//! Liveness contract: every run terminates with the order either
//! `assigned` or `manual_assignment_required`, with the failure trail
//! recorded: a lost claim race moves to the next candidate, a tier
//! without candidates moves to the next tier, and an unexpected failure
//! routes through the error alert into escalation.

use crate::escalation::EscalationHandler;
use crate::outcome::{AssignmentAttempt, AssignmentDecision, AssignmentOutcome};
use crate::strategy::{default_chain, eta_minutes, incentive_for, Strategy};
use chrono::Utc;
use phlebo_config::DispatchConfig;
use phlebo_core::{
    rounded_km, AssignedStaff, AssignmentRecordStatus, DispatchError, GeoPoint, Order,
    OrderStatus, Result, StrategyKind, Technician,
};
use phlebo_geo::{Candidate, GeoIndex};
use phlebo_notify::{DispatchEvent, NotificationDispatcher};
use phlebo_registry::{ClaimOutcome, StaffRegistry};
use phlebo_store::OrderStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// A technician won from the cascade, pending commit.
struct ClaimedCandidate {
    technician: Technician,
    strategy: StrategyKind,
    distance_km: f64,
}

/// What one full cascade run produced.
struct ChainResult {
    claimed: Option<ClaimedCandidate>,
    attempts: Vec<AssignmentAttempt>,
    reasons: Vec<String>,
}

pub struct AssignmentEngine {
    store: Arc<dyn OrderStore>,
    registry: Arc<dyn StaffRegistry>,
    geo: Arc<dyn GeoIndex>,
    dispatcher: Arc<NotificationDispatcher>,
    escalation: EscalationHandler,
    chain: Vec<Strategy>,
    config: DispatchConfig,
}

impl AssignmentEngine {
    pub fn new(
        store: Arc<dyn OrderStore>,
        registry: Arc<dyn StaffRegistry>,
        geo: Arc<dyn GeoIndex>,
        dispatcher: Arc<NotificationDispatcher>,
        config: DispatchConfig,
    ) -> Self {
        let escalation = EscalationHandler::new(Arc::clone(&store), Arc::clone(&dispatcher));
        let chain = default_chain(&config);
        Self {
            store,
            registry,
            geo,
            dispatcher,
            escalation,
            chain,
            config,
        }
    }

    /// Replace the cascade (tests, regional tier experiments).
    pub fn with_chain(mut self, chain: Vec<Strategy>) -> Self {
        self.chain = chain;
        self
    }

    /// Run one assignment to a terminal state.
    ///
    /// Returns `NotAssignable` when the order is already owned by
    /// another attempt or already assigned; duplicate triggers are
    /// rejected, not re-run.
    pub async fn assign(&self, order_id: Uuid) -> Result<AssignmentOutcome> {
        let mut order = self.store.get(order_id).await?;
        if !order.status.assignment_eligible() {
            return Err(DispatchError::NotAssignable {
                status: order.status,
            });
        }
        order.status = OrderStatus::AssignmentPending;
        order.touch();
        self.store.update(order.clone()).await?;

        info!(order_id = %order.id, patient_id = %order.patient_id, "assignment started");

        let origin = match order.collection_location {
            Some(point) => point,
            None => {
                let order = self
                    .escalation
                    .escalate(order, vec!["missing location".to_string()])
                    .await?;
                return Ok(AssignmentOutcome::escalated(order, Vec::new()));
            }
        };

        let deadline = Duration::from_secs(self.config.assign_timeout_secs);
        match tokio::time::timeout(deadline, self.run_chain(order.id, origin)).await {
            Ok(Ok(chain)) => match chain.claimed {
                Some(claim) => {
                    match self
                        .commit_assignment(order.clone(), claim, chain.attempts)
                        .await
                    {
                        Ok(outcome) => Ok(outcome),
                        Err(e) => self.fail_unexpected(order, e).await,
                    }
                }
                None => {
                    let order = self.escalation.escalate(order, chain.reasons).await?;
                    Ok(AssignmentOutcome::escalated(order, chain.attempts))
                }
            },
            Ok(Err(e)) => self.fail_unexpected(order, e).await,
            Err(_) => {
                let err = DispatchError::Timeout {
                    secs: self.config.assign_timeout_secs,
                };
                self.fail_unexpected(order, err).await
            }
        }
    }

    /// Fire-and-forget wrapper: payment confirmation returns immediately
    /// while the assignment runs on its own task.
    pub fn spawn_assign(self: &Arc<Self>, order_id: Uuid) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            match engine.assign(order_id).await {
                Ok(outcome) => {
                    debug!(order_id = %order_id, outcome = outcome.label(), "assignment task finished")
                }
                Err(e) => {
                    error!(order_id = %order_id, error = %e, "assignment task failed")
                }
            }
        })
    }

    /// Operator console path. Goes through the same atomic claim gate;
    /// a technician without headroom surfaces as `ClaimRejected`.
    pub async fn manual_assign(&self, order_id: Uuid, staff_id: Uuid) -> Result<AssignmentOutcome> {
        let order = self.store.get(order_id).await?;
        let eligible = matches!(
            order.status,
            OrderStatus::ManualAssignmentRequired
                | OrderStatus::Created
                | OrderStatus::AssignmentFailed
        );
        if !eligible {
            return Err(DispatchError::NotAssignable {
                status: order.status,
            });
        }

        match self.registry.try_claim(staff_id, order_id).await? {
            ClaimOutcome::Rejected { reason } => Err(DispatchError::ClaimRejected { reason }),
            ClaimOutcome::Claimed { technician } => {
                // A manual order may have no resolved point (that can be
                // exactly why it escalated); report zero distance then.
                let distance_km = order
                    .collection_location
                    .map(|p| p.distance_km(&technician.location))
                    .unwrap_or(0.0);
                let claim = ClaimedCandidate {
                    technician,
                    strategy: StrategyKind::Manual,
                    distance_km,
                };
                match self.commit_assignment(order.clone(), claim, Vec::new()).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) => self.fail_unexpected(order, e).await,
                }
            }
        }
    }

    /// Downstream completion: close the order and free the slot.
    pub async fn complete_order(&self, order_id: Uuid) -> Result<Order> {
        self.close_order(
            order_id,
            OrderStatus::Completed,
            AssignmentRecordStatus::Completed,
        )
        .await
    }

    /// Cancellation by patient or operator.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order> {
        self.close_order(
            order_id,
            OrderStatus::Cancelled,
            AssignmentRecordStatus::Cancelled,
        )
        .await
    }

    async fn close_order(
        &self,
        order_id: Uuid,
        final_status: OrderStatus,
        record_status: AssignmentRecordStatus,
    ) -> Result<Order> {
        let mut order = self.store.get(order_id).await?;
        if order.status.is_terminal() {
            return Ok(order);
        }
        if let Some(assigned) = &order.assigned_staff {
            self.registry
                .release(assigned.staff_id, order_id, record_status)
                .await?;
        }
        order.status = final_status;
        order.touch();
        self.store.update(order.clone()).await?;
        info!(order_id = %order.id, status = %order.status, "order closed");
        Ok(order)
    }

    /// Walk the tiers in priority order. Within a tier, try each of the
    /// top-N candidates, since the index answer may be stale by the time we
    /// claim, and "this technician is busy" must not be conflated with
    /// "this tier has no viable technician".
    async fn run_chain(&self, order_id: Uuid, origin: GeoPoint) -> Result<ChainResult> {
        let mut attempts = Vec::with_capacity(self.chain.len());
        let mut reasons = Vec::new();

        for strategy in &self.chain {
            let candidates = self.candidates_with_retry(strategy, origin).await?;
            if candidates.is_empty() {
                attempts.push(AssignmentAttempt {
                    strategy: strategy.kind,
                    radius_km: strategy.radius_km(),
                    candidate_found: false,
                    candidate_staff_id: None,
                    claimed: false,
                });
                reasons.push(format!("{}: no eligible technician in range", strategy.kind));
                continue;
            }

            let mut claimed = None;
            for candidate in &candidates {
                match self.claim_with_retry(candidate.staff.id, order_id).await? {
                    ClaimOutcome::Claimed { technician } => {
                        claimed = Some(ClaimedCandidate {
                            technician,
                            strategy: strategy.kind,
                            distance_km: candidate.distance_km,
                        });
                        break;
                    }
                    ClaimOutcome::Rejected { reason } => {
                        debug!(
                            order_id = %order_id,
                            staff_id = %candidate.staff.id,
                            strategy = %strategy.kind,
                            %reason,
                            "claim rejected, trying next candidate"
                        );
                    }
                }
            }

            match claimed {
                Some(claim) => {
                    attempts.push(AssignmentAttempt {
                        strategy: strategy.kind,
                        radius_km: strategy.radius_km(),
                        candidate_found: true,
                        candidate_staff_id: Some(claim.technician.id),
                        claimed: true,
                    });
                    return Ok(ChainResult {
                        claimed: Some(claim),
                        attempts,
                        reasons,
                    });
                }
                None => {
                    attempts.push(AssignmentAttempt {
                        strategy: strategy.kind,
                        radius_km: strategy.radius_km(),
                        candidate_found: true,
                        candidate_staff_id: Some(candidates[0].staff.id),
                        claimed: false,
                    });
                    reasons.push(format!(
                        "{}: {} candidate(s) no longer claimable",
                        strategy.kind,
                        candidates.len()
                    ));
                }
            }
        }

        Ok(ChainResult {
            claimed: None,
            attempts,
            reasons,
        })
    }

    /// Commit the won claim: persist the order first, fan out after.
    /// If persistence fails the claim is rolled back so capacity cannot
    /// leak, and the error propagates to the caller's failure path.
    async fn commit_assignment(
        &self,
        mut order: Order,
        claim: ClaimedCandidate,
        attempts: Vec<AssignmentAttempt>,
    ) -> Result<AssignmentOutcome> {
        let assigned_at = Utc::now();
        let distance_km = rounded_km(claim.distance_km);
        let estimated_arrival =
            assigned_at + chrono::Duration::minutes(eta_minutes(claim.distance_km, &self.config));
        let incentive = incentive_for(claim.strategy, claim.distance_km, &self.config);

        order.status = OrderStatus::Assigned;
        order.assigned_staff = Some(AssignedStaff {
            staff_id: claim.technician.id,
            strategy: claim.strategy,
            distance_km,
            assigned_at,
            estimated_arrival,
        });
        order.touch();

        if let Err(e) = self.store.update(order.clone()).await {
            if let Err(release_err) = self
                .registry
                .release(
                    claim.technician.id,
                    order.id,
                    AssignmentRecordStatus::Cancelled,
                )
                .await
            {
                error!(
                    order_id = %order.id,
                    staff_id = %claim.technician.id,
                    error = %release_err,
                    "claim rollback failed after persist failure"
                );
            }
            return Err(e);
        }

        info!(
            order_id = %order.id,
            staff_id = %claim.technician.id,
            strategy = %claim.strategy,
            distance_km,
            "order assigned"
        );

        // The transition is durable; everything below is best-effort.
        self.dispatcher
            .notify_patient_assigned(&order, &claim.technician, claim.strategy, distance_km)
            .await;
        self.dispatcher
            .notify_staff_assigned(
                &claim.technician,
                &order,
                distance_km,
                claim.strategy,
                &incentive,
            )
            .await;
        self.dispatcher
            .publish(DispatchEvent::StaffAssigned {
                order_id: order.id,
                staff_id: claim.technician.id,
                strategy: claim.strategy,
                distance_km,
            })
            .await;

        Ok(AssignmentOutcome {
            order,
            decision: AssignmentDecision::Assigned {
                staff_id: claim.technician.id,
                strategy: claim.strategy,
                distance_km,
                estimated_arrival,
                incentive,
            },
            attempts,
        })
    }

    /// Unexpected-failure path: alert, record, escalate. The order must
    /// never be dropped in `assignment_pending`.
    async fn fail_unexpected(&self, order: Order, err: DispatchError) -> Result<AssignmentOutcome> {
        error!(order_id = %order.id, error = %err, "assignment hit an unexpected failure");
        self.dispatcher
            .notify_assignment_error(order.id, &err.to_string())
            .await;
        self.dispatcher
            .publish(DispatchEvent::AssignmentError {
                order_id: order.id,
                error: err.to_string(),
            })
            .await;
        let order = self
            .escalation
            .escalate(order, vec![format!("engine failure: {}", err)])
            .await?;
        Ok(AssignmentOutcome::escalated(order, Vec::new()))
    }

    async fn candidates_with_retry(
        &self,
        strategy: &Strategy,
        origin: GeoPoint,
    ) -> Result<Vec<Candidate>> {
        let mut attempt = 0;
        loop {
            match strategy
                .candidates(origin, self.geo.as_ref(), self.config.claim_candidates)
                .await
            {
                Ok(candidates) => return Ok(candidates),
                Err(e) if attempt + 1 < self.config.infra_retry_attempts => {
                    debug!(strategy = %strategy.kind, error = %e, attempt, "geo query failed, backing off");
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn claim_with_retry(&self, staff_id: Uuid, order_id: Uuid) -> Result<ClaimOutcome> {
        let mut attempt = 0;
        loop {
            match self.registry.try_claim(staff_id, order_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt + 1 < self.config.infra_retry_attempts => {
                    debug!(%staff_id, error = %e, attempt, "claim failed, backing off");
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let base = self.config.infra_retry_base_ms.max(1);
        let exp = base.saturating_mul(1u64 << attempt.min(6));
        let jitter = rand::thread_rng().gen_range(0..base);
        tokio::time::sleep(Duration::from_millis(exp + jitter)).await;
    }
}
