use crate::error::{Result, WorkHistError};

/// Compute the exponential backoff delay, in seconds, for a retry attempt.
///
/// The delay doubles with every attempt: `base * 2^(attempt - 1)`, so a base
/// of one second yields the sequence 1, 2, 4, 8, 16, ... Attempt numbers are
/// 1-indexed; an attempt of zero is a caller bug and is rejected.
pub fn backoff(base_seconds: u64, attempt: u32) -> Result<u64> {
    if attempt < 1 {
        return Err(WorkHistError::Input(format!(
            "backoff attempt number must be at least 1, got {attempt}"
        )));
    }
    Ok(base_seconds.saturating_mul(1u64 << (attempt - 1).min(62)))
}

/// Exponential backoff with a ceiling.
///
/// An uncapped schedule can stall for hours against a deeply degraded
/// upstream, so the requester always goes through this variant.
pub fn backoff_capped(base_seconds: u64, attempt: u32, cap_seconds: u64) -> Result<u64> {
    Ok(backoff(base_seconds, attempt)?.min(cap_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let delays: Vec<u64> = (1..=5).map(|n| backoff(1, n).unwrap()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_backoff_scales_with_base() {
        assert_eq!(backoff(10, 1).unwrap(), 10);
        assert_eq!(backoff(10, 3).unwrap(), 40);
    }

    #[test]
    fn test_backoff_is_deterministic() {
        assert_eq!(backoff(1, 4).unwrap(), backoff(1, 4).unwrap());
    }

    #[test]
    fn test_backoff_rejects_attempt_zero() {
        let result = backoff(1, 0);
        assert!(matches!(result, Err(WorkHistError::Input(_))));
    }

    #[test]
    fn test_backoff_capped_applies_ceiling() {
        assert_eq!(backoff_capped(1, 3, 900).unwrap(), 4);
        assert_eq!(backoff_capped(1, 12, 900).unwrap(), 900);
    }

    #[test]
    fn test_backoff_saturates_on_huge_attempts() {
        // attempt numbers beyond the shift width must not panic
        assert!(backoff(1, 200).is_ok());
    }
}
