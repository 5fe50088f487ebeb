use serde::Serialize;
use shakmaty::Move;

use crate::search::difficulty::GateTier;
use crate::search::tactics::{RejectReason, ScoredMove};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRejection {
    #[serde(rename = "move")]
    pub uci: String,
    pub reason: RejectReason,
    /// Net material the move put at stake.
    pub risk_cp: i32,
    #[serde(skip)]
    pub mv: Option<Move>,
}

#[derive(Clone, Debug, Default)]
pub struct GateOutcome {
    /// Survivors in the input order.
    pub allowed: Vec<ScoredMove>,
    pub rejected: Vec<GateRejection>,
    /// Every move would have been rejected, so all were let through.
    pub safety_valve_used: bool,
}

impl GateOutcome {
    pub fn rejected_count(&self) -> usize { self.rejected.len() }

    /// Distinct rejection reasons in first-seen order.
    pub fn reasons(&self) -> Vec<RejectReason> {
        let mut out: Vec<RejectReason> = Vec::new();
        for r in &self.rejected {
            if !out.contains(&r.reason) { out.push(r.reason); }
        }
        out
    }
}

/// Why `tier` would refuse this move, if it would.
pub fn rejection_reason(sm: &ScoredMove, tier: GateTier) -> Option<RejectReason> {
    if sm.delivers_mate_in_1 { return None; }
    if tier.rejects_mate_threats() && sm.allows_opponent_mate_in_1 {
        return Some(RejectReason::AllowsMateIn1);
    }
    if tier.rejects_stalemates() && sm.stalemates_while_ahead {
        return Some(RejectReason::Stalemates);
    }
    if sm.material_risk() < -tier.threshold_cp() {
        return Some(sm.worst_reason().unwrap_or(RejectReason::LosingCapture));
    }
    None
}

/// Drops catastrophic moves for the tier. Never leaves the caller with nothing
/// to play: if everything is rejected, everything is allowed.
pub fn apply_gate(scored: &[ScoredMove], tier: GateTier) -> GateOutcome {
    let mut out = GateOutcome::default();
    for sm in scored {
        match rejection_reason(sm, tier) {
            Some(reason) => out.rejected.push(GateRejection {
                uci: sm.uci.clone(),
                reason,
                risk_cp: sm.material_risk(),
                mv: Some(sm.mv),
            }),
            None => out.allowed.push(sm.clone()),
        }
    }
    if out.allowed.is_empty() && !scored.is_empty() {
        log::warn!("blunder gate rejected all {} moves; letting them through", scored.len());
        out.allowed = scored.to_vec();
        out.safety_valve_used = true;
    }
    out
}
