use thiserror::Error;

/// Target value meaning "leave the state machine".
pub const EXIT_CASE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal fsm offset: source {source_case}, target {target}, case count {count}")]
pub struct FsmOffsetError {
    pub source_case: i32,
    pub target: i32,
    pub count: i32,
}

/// Value a case pushes so that the dispatch loop lands on `target` next.
///
/// Cases are numbered from 1; `count + 1` (or [`EXIT_CASE`]) leaves the loop.
/// The dispatcher decrements the pushed value once per loop iteration and
/// once per case it passes, so the offset is the forward distance from
/// `source`, wrapping around through the exit slot.
///
/// `source` 0 is the entry point before the first case runs.
pub fn case_offset(source: i32, target: i32, count: i32) -> Result<i32, FsmOffsetError> {
    let target = if target == EXIT_CASE { count + 1 } else { target };
    let err = FsmOffsetError {
        source_case: source,
        target,
        count,
    };

    if count < 0 || !(0..=count).contains(&source) || !(1..=count + 1).contains(&target) {
        return Err(err);
    }

    let delta = target - source;
    Ok(if delta <= 0 { delta + count + 1 } else { delta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_forward_offsets() {
        assert_eq!(case_offset(0, 1, 3), Ok(1));
        assert_eq!(case_offset(1, 3, 3), Ok(2));
        assert_eq!(case_offset(2, 4, 3), Ok(2));
    }

    #[test]
    fn test_backward_offsets_wrap() {
        assert_eq!(case_offset(1, 1, 1), Ok(2));
        assert_eq!(case_offset(3, 1, 3), Ok(2));
        assert_eq!(case_offset(4, 1, 4), Ok(2));
    }

    #[test]
    fn test_exit_target() {
        assert_eq!(case_offset(2, EXIT_CASE, 3), case_offset(2, 4, 3));
        assert_eq!(case_offset(3, EXIT_CASE, 3), Ok(1));
    }

    #[test]
    fn test_rejects_invalid_arguments() {
        assert!(case_offset(0, 1, -1).is_err());
        assert!(case_offset(4, 1, 3).is_err());
        assert!(case_offset(-1, 1, 3).is_err());
        assert!(case_offset(1, 0, 3).is_err());
        assert!(case_offset(1, 5, 3).is_err());
        let err = case_offset(1, 5, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "illegal fsm offset: source 1, target 5, case count 3"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Walking `offset` slots forward from `source` on a ring of
        /// `count + 1` slots lands on `target`.
        #[test]
        fn test_offset_lands_on_target(
            (count, source, target) in (0i32..40).prop_flat_map(|n| (Just(n), 0..=n, 1..=n + 1))
        ) {
            let offset = case_offset(source, target, count).unwrap();
            prop_assert!(offset >= 1 && offset <= count + 1);
            prop_assert_eq!((source + offset - 1).rem_euclid(count + 1) + 1, target);
        }
    }
}
