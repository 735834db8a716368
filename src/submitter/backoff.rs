//! Exponential backoff with jitter, floored at the last node round trip.

use rand::Rng;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay before resubmitting after `attempt` failed sends.
///
/// Never shorter than `last_round_trip`: a resubmission must not overtake
/// the node's answer to the previous one.
pub fn resubmit_delay(attempt: u32, base_ms: u64, max_ms: u64, last_round_trip: Duration) -> Duration {
    calculate_backoff(attempt, base_ms, max_ms).max(last_round_trip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn test_zero_attempt() {
        assert_eq!(calculate_backoff(0, 100, 1000), Duration::ZERO);
    }

    #[test]
    fn test_round_trip_floor() {
        let slow_node = Duration::from_millis(750);
        assert!(resubmit_delay(1, 10, 1000, slow_node) >= slow_node);

        let fast_node = Duration::from_millis(1);
        assert!(resubmit_delay(3, 100, 1000, fast_node) >= Duration::from_millis(400));
    }
}
