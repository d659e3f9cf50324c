//! AgentMesh Reputation - Converts task outcomes into a trust signal
//!
//! The engine is a pure function of the prior reputation row and one task
//! outcome. It performs no I/O; persisting the new row is the caller's job.
//!
//! # Rating formula
//!
//! ```text
//! success_rate = successful / total
//! task_weight  = min(total / 100, 1)
//! rating       = round(success_rate * 100 * (0.5 + 0.5 * task_weight))
//! ```
//!
//! Rounding is half away from zero, for both the rating and the running
//! latency mean. The formula is evaluated on integers so the result never
//! depends on floating point behavior.
//!
//! # Cold start
//!
//! New agents are seeded at 50. Confidence ramps linearly over the first
//! 100 tasks, so a single success only yields 51 (`round(50.5)`) while a
//! single failure drops the rating to 0. A perfect record climbs one point
//! per task and reaches 100 at 99 tasks, where `round(99.5)` rounds up.

use agentmesh_types::{PaymentToken, Reputation, TaskOutcome, RATING_MAX};

/// Tasks after which the rating carries full confidence
pub const CONFIDENCE_TASKS: u64 = 100;

/// Apply one outcome to a reputation row, returning the new row
pub fn update(current: &Reputation, outcome: &TaskOutcome) -> Reputation {
    let mut next = current.clone();

    next.total_tasks = current.total_tasks + 1;
    if outcome.success {
        next.successful_tasks = current.successful_tasks + 1;
    } else {
        next.failed_tasks = current.failed_tasks + 1;
    }

    match outcome.token {
        PaymentToken::Stx => next.earned_stx = current.earned_stx.saturating_add(outcome.paid_amount),
        PaymentToken::Sbtc => next.earned_sbtc = current.earned_sbtc.saturating_add(outcome.paid_amount),
    }

    let latency_sum = current.avg_response_time_ms as u128 * current.total_tasks as u128
        + outcome.response_time_ms as u128;
    next.avg_response_time_ms = div_round(latency_sum, next.total_tasks as u128) as u64;

    next.rating = rating_for(next.successful_tasks, next.total_tasks);
    next.last_active_at = Some(outcome.completed_at);
    next
}

/// Rating derived from raw counters.
///
/// `successful / total * (100 + min(total, 100)) / 2`, rounded half away
/// from zero. Returns the seed rating when no task ran yet.
pub fn rating_for(successful: u64, total: u64) -> u8 {
    if total == 0 {
        return agentmesh_types::RATING_SEED;
    }
    let successful = successful.min(total) as u128;
    let weighted = 100 + total.min(CONFIDENCE_TASKS) as u128;
    let rating = div_round(successful * weighted, 2 * total as u128);
    rating.min(RATING_MAX as u128) as u8
}

/// Confidence factor in [0, 1]
pub fn task_weight(total: u64) -> f64 {
    total.min(CONFIDENCE_TASKS) as f64 / CONFIDENCE_TASKS as f64
}

/// True when the row's counters and rating agree with the formula
pub fn is_consistent(rep: &Reputation) -> bool {
    rep.total_tasks == rep.successful_tasks + rep.failed_tasks
        && rep.rating == rating_for(rep.successful_tasks, rep.total_tasks)
        && rep.rating <= RATING_MAX
}

// Non-negative division rounding half away from zero.
fn div_round(numerator: u128, denominator: u128) -> u128 {
    (2 * numerator + denominator) / (2 * denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_types::{AgentId, RATING_SEED};
    use chrono::Utc;

    fn outcome(success: bool, paid: u64, token: PaymentToken, latency: u64) -> TaskOutcome {
        TaskOutcome {
            success,
            paid_amount: paid,
            token,
            response_time_ms: latency,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_agent_starts_at_fifty() {
        let rep = Reputation::seeded(AgentId::new());
        assert_eq!(rep.rating, RATING_SEED);
        assert!(is_consistent(&rep));
    }

    #[test]
    fn test_first_success_rounds_half_up_to_51() {
        let rep = Reputation::seeded(AgentId::new());
        let next = update(&rep, &outcome(true, 1_000, PaymentToken::Stx, 120));
        assert_eq!(task_weight(next.total_tasks), 0.01);
        assert_eq!(next.rating, 51);
        assert_eq!(next.total_tasks, 1);
        assert_eq!(next.successful_tasks, 1);
        assert_eq!(next.failed_tasks, 0);
        assert_eq!(next.avg_response_time_ms, 120);
        assert!(next.last_active_at.is_some());
    }

    #[test]
    fn test_first_failure_drops_to_zero() {
        let rep = Reputation::seeded(AgentId::new());
        let next = update(&rep, &outcome(false, 1_000, PaymentToken::Stx, 80));
        assert_eq!(next.rating, 0);
        assert_eq!(next.failed_tasks, 1);
        // Failed tasks still count their nominal reward
        assert_eq!(next.earned_stx, 1_000);
    }

    #[test]
    fn test_perfect_record_climbs_to_100() {
        let mut rep = Reputation::seeded(AgentId::new());
        for _ in 0..98 {
            rep = update(&rep, &outcome(true, 1, PaymentToken::Stx, 10));
        }
        assert_eq!(rep.rating, 99);
        rep = update(&rep, &outcome(true, 1, PaymentToken::Stx, 10));
        assert_eq!(rep.rating, 100);
        for _ in 0..50 {
            rep = update(&rep, &outcome(true, 1, PaymentToken::Stx, 10));
        }
        assert_eq!(rep.rating, 100);
        assert_eq!(rep.earned_stx, 149);
    }

    #[test]
    fn test_earnings_only_touch_the_used_token() {
        let rep = Reputation::seeded(AgentId::new());
        let next = update(&rep, &outcome(true, 2_500, PaymentToken::Sbtc, 10));
        assert_eq!(next.earned_sbtc, 2_500);
        assert_eq!(next.earned_stx, 0);

        let mut saturated = next.clone();
        saturated.earned_sbtc = u64::MAX - 1;
        let next = update(&saturated, &outcome(true, 10, PaymentToken::Sbtc, 10));
        assert_eq!(next.earned_sbtc, u64::MAX);
    }

    #[test]
    fn test_latency_mean_rounds_half_away_from_zero() {
        let rep = Reputation::seeded(AgentId::new());
        let rep = update(&rep, &outcome(true, 0, PaymentToken::Stx, 10));
        let rep = update(&rep, &outcome(true, 0, PaymentToken::Stx, 11));
        // (10 * 1 + 11) / 2 = 10.5
        assert_eq!(rep.avg_response_time_ms, 11);
        let rep = update(&rep, &outcome(true, 0, PaymentToken::Stx, 0));
        // (11 * 2 + 0) / 3 = 7.33
        assert_eq!(rep.avg_response_time_ms, 7);
    }

    #[test]
    fn test_counters_and_rating_stay_consistent() {
        let mut rep = Reputation::seeded(AgentId::new());
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let before = rep.total_tasks;
            rep = update(&rep, &outcome(seed % 3 != 0, seed % 1_000, PaymentToken::Stx, seed % 900));
            assert_eq!(rep.total_tasks, before + 1);
            assert_eq!(rep.successful_tasks + rep.failed_tasks, rep.total_tasks);
            assert!(rep.rating <= 100);
            assert!(is_consistent(&rep));
        }
    }

    #[test]
    fn test_rating_for_pinned_values() {
        assert_eq!(rating_for(0, 0), 50);
        assert_eq!(rating_for(1, 1), 51);
        assert_eq!(rating_for(0, 1), 0);
        assert_eq!(rating_for(1, 2), 26);
        assert_eq!(rating_for(2, 3), 34);
        assert_eq!(rating_for(3, 4), 39);
        assert_eq!(rating_for(50, 100), 50);
        assert_eq!(rating_for(150, 150), 100);
        assert_eq!(rating_for(80, 200), 40);
    }
}
