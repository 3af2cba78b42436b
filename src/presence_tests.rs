// src/presence_tests.rs

#[cfg(test)]
mod tests {
    use crate::presence::{absence_candidates, PresenceRecord};
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
    use std::collections::HashSet;

    fn record(
        employee_id: &str,
        push_token: &str,
        shift_start: &str,
        last_detection: Option<&str>,
    ) -> PresenceRecord {
        PresenceRecord {
            employee_id: employee_id.to_string(),
            push_token: push_token.to_string(),
            shift_start: NaiveTime::parse_from_str(shift_start, "%H:%M")
                .expect("test shift start should parse"),
            last_detection: last_detection.map(|s| {
                NaiveDate::from_ymd_opt(2025, 7, 21)
                    .unwrap()
                    .and_time(NaiveTime::parse_from_str(s, "%H:%M").unwrap())
            }),
        }
    }

    // All instants below share one operating offset; the computation
    // must never see UTC.
    fn local(h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 7, 21, h, min, 0)
            .unwrap()
    }

    #[test]
    fn no_detection_measures_from_shift_start() {
        let records = vec![record("EMP001", "tok-1", "09:00", None)];
        let candidates = absence_candidates(&records, local(9, 45), 30);

        assert_eq!(candidates.len(), 1, "45 minutes absent should qualify");
        let elapsed = candidates[0].elapsed_minutes;
        assert!(
            (elapsed - 45.0).abs() < 0.01,
            "expected ~45 elapsed minutes, got {}",
            elapsed
        );
    }

    #[test]
    fn real_detection_measures_from_that_instant() {
        let records = vec![record("EMP001", "tok-1", "09:00", Some("09:50"))];
        let candidates = absence_candidates(&records, local(10, 5), 10);

        assert_eq!(candidates.len(), 1);
        let elapsed = candidates[0].elapsed_minutes;
        assert!(
            (elapsed - 15.0).abs() < 0.01,
            "expected ~15 elapsed minutes since last detection, got {}",
            elapsed
        );
    }

    #[test]
    fn detection_equal_to_shift_instant_counts_as_no_detection() {
        // A defaulted last_detection equals today's shift start and must
        // behave exactly like a null one.
        let defaulted = vec![record("EMP001", "tok-1", "09:00", Some("09:00"))];
        let null = vec![record("EMP001", "tok-1", "09:00", None)];

        let from_defaulted = absence_candidates(&defaulted, local(9, 45), 30);
        let from_null = absence_candidates(&null, local(9, 45), 30);

        assert_eq!(from_defaulted.len(), 1);
        assert_eq!(from_null.len(), 1);
        assert!(
            (from_defaulted[0].elapsed_minutes - from_null[0].elapsed_minutes).abs() < 0.001,
            "defaulted and null detections must produce the same elapsed time"
        );
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let records = vec![record("EMP001", "tok-1", "09:00", None)];
        let candidates = absence_candidates(&records, local(9, 30), 30);

        assert_eq!(
            candidates.len(),
            1,
            "elapsed time exactly equal to the threshold must be included"
        );
    }

    #[test]
    fn below_threshold_is_excluded() {
        let records = vec![record("EMP001", "tok-1", "09:00", Some("09:50"))];
        let candidates = absence_candidates(&records, local(10, 5), 30);

        assert!(
            candidates.is_empty(),
            "15 minutes absent must not qualify at a 30-minute threshold"
        );
    }

    #[test]
    fn empty_push_token_is_still_a_candidate() {
        let records = vec![record("EMP001", "", "09:00", None)];
        let candidates = absence_candidates(&records, local(10, 0), 30);

        assert_eq!(
            candidates.len(),
            1,
            "token validity is not this layer's concern"
        );
        assert!(candidates[0].push_token.is_empty());
    }

    #[test]
    fn mixed_snapshot_selects_only_qualifying_employees() {
        let records = vec![
            record("EMP001", "tok-1", "09:00", None), // 120 min absent
            record("EMP002", "tok-2", "09:00", Some("10:45")), // 15 min absent
            record("EMP003", "tok-3", "08:00", Some("10:15")), // 45 min absent
        ];
        let candidates = absence_candidates(&records, local(11, 0), 30);

        let ids: HashSet<&str> = candidates.iter().map(|c| c.employee_id.as_str()).collect();
        assert_eq!(
            ids,
            HashSet::from(["EMP001", "EMP003"]),
            "only employees at or past the threshold should be selected"
        );
    }
}
