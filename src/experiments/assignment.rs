//! Deterministic visitor-to-arm assignment.
//!
//! Assignment is a pure function of (session id, experiment id, traffic
//! split): the session id concatenated with the experiment id is hashed with
//! FNV-1a, reduced to a bucket in [0,1000), and compared against the split.
//! A sticky client-held session token therefore always lands on the same arm
//! for the lifetime of the experiment. No external randomness is involved.

use uuid::Uuid;

use crate::storage::Variant;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a. Non-cryptographic; stability across builds and
/// deployments is the requirement here, not collision resistance.
fn fnv1a_64(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Assign a session to an experiment arm.
///
/// Buckets below `traffic_split` go to control, the rest to test.
pub fn assign(session_id: &str, experiment_id: &str, traffic_split: f64) -> Variant {
    let key = format!("{}{}", session_id, experiment_id);
    let bucket = fnv1a_64(key.as_bytes()) % 1000;
    if (bucket as f64) / 1000.0 < traffic_split {
        Variant::Control
    } else {
        Variant::Test
    }
}

/// Return a usable session token, minting a fresh one when the provided
/// token is missing or malformed.
///
/// Counters are independent of identity persistence across sessions, so a
/// new token on a malformed input is acceptable.
pub fn ensure_session_token(token: Option<&str>) -> String {
    match token {
        Some(t) if Uuid::parse_str(t.trim()).is_ok() => t.trim().to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_is_pure() {
        let first = assign("sess-abc", "exp-1", 0.5);
        for _ in 0..100 {
            assert_eq!(assign("sess-abc", "exp-1", 0.5), first);
        }
    }

    #[test]
    fn test_assign_boundary_splits() {
        // A split of 1.0 sends every bucket to control; 0.0 sends all to test
        for i in 0..50 {
            let session = format!("sess-{}", i);
            assert_eq!(assign(&session, "exp-1", 1.0), Variant::Control);
            assert_eq!(assign(&session, "exp-1", 0.0), Variant::Test);
        }
    }

    #[test]
    fn test_assign_distribution_converges() {
        let n = 20_000;
        let split = 0.5;
        let control = (0..n)
            .filter(|i| {
                assign(&format!("session-token-{}", i), "exp-dist", split) == Variant::Control
            })
            .count();

        let fraction = control as f64 / n as f64;
        assert!(
            (fraction - split).abs() < 0.02,
            "control fraction {} too far from split {}",
            fraction,
            split
        );
    }

    #[test]
    fn test_assign_differs_across_experiments() {
        // The same session can land on different arms for different experiments
        let mut seen_both = false;
        for i in 0..100 {
            let session = format!("sess-{}", i);
            if assign(&session, "exp-a", 0.5) != assign(&session, "exp-b", 0.5) {
                seen_both = true;
                break;
            }
        }
        assert!(seen_both);
    }

    #[test]
    fn test_ensure_session_token_keeps_valid() {
        let token = Uuid::new_v4().to_string();
        assert_eq!(ensure_session_token(Some(&token)), token);
    }

    #[test]
    fn test_ensure_session_token_mints_on_missing_or_malformed() {
        let minted = ensure_session_token(None);
        assert!(Uuid::parse_str(&minted).is_ok());

        let minted = ensure_session_token(Some("not-a-token"));
        assert!(Uuid::parse_str(&minted).is_ok());

        let minted = ensure_session_token(Some(""));
        assert!(Uuid::parse_str(&minted).is_ok());
    }
}
