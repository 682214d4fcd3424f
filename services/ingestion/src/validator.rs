//! Row-level business rules for unified records.

use crate::normalizer::UNKNOWN_BRANCH;
use crate::record::UnifiedIngestionRecord;

/// Check one record, returning every violated rule in a fixed order.
/// An empty list means the record is valid.
pub fn validate(record: &UnifiedIngestionRecord) -> Vec<String> {
    let mut errors = Vec::new();

    if record.branch_code.is_empty() || record.branch_code == UNKNOWN_BRANCH {
        errors.push("Invalid Branch Code".to_string());
    }

    if record.week_no <= 0 {
        errors.push("Invalid Week Number".to_string());
    }

    if !(0.0..=100.0).contains(&record.avg_attendance_percent) {
        errors.push(format!(
            "Impossible Attendance %: {}",
            record.avg_attendance_percent
        ));
    }

    if !(0.0..=100.0).contains(&record.avg_test_pass_percent) {
        errors.push(format!("Impossible Pass %: {}", record.avg_test_pass_percent));
    }

    // Skipped when no total is known
    if record.syllabus_total > 0 && record.syllabus_covered > record.syllabus_total {
        errors.push(format!(
            "Covered syllabus ({}) cannot exceed total ({})",
            record.syllabus_covered, record.syllabus_total
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_record() -> UnifiedIngestionRecord {
        UnifiedIngestionRecord {
            branch_code: "CSE".to_string(),
            week_no: 1,
            sessions: 5,
            avg_attendance_percent: 85.0,
            avg_test_attendance_percent: 90.0,
            avg_test_pass_percent: 75.0,
            syllabus_covered: 5,
            syllabus_total: 50,
            raw_data: None,
        }
    }

    #[test]
    fn test_valid_record_has_no_errors() {
        assert!(validate(&valid_record()).is_empty());
    }

    #[test]
    fn test_unknown_branch() {
        let record = UnifiedIngestionRecord {
            branch_code: "UNKNOWN".to_string(),
            ..valid_record()
        };
        assert_eq!(validate(&record), vec!["Invalid Branch Code"]);

        let record = UnifiedIngestionRecord {
            branch_code: String::new(),
            ..valid_record()
        };
        assert_eq!(validate(&record), vec!["Invalid Branch Code"]);
    }

    #[test]
    fn test_week_zero_independent_of_other_fields() {
        let record = UnifiedIngestionRecord {
            week_no: 0,
            ..valid_record()
        };
        assert_eq!(validate(&record), vec!["Invalid Week Number"]);

        let record = UnifiedIngestionRecord {
            week_no: 0,
            branch_code: "UNKNOWN".to_string(),
            avg_attendance_percent: 150.0,
            ..valid_record()
        };
        assert!(validate(&record).contains(&"Invalid Week Number".to_string()));
    }

    #[test]
    fn test_attendance_out_of_range_mentions_value() {
        let record = UnifiedIngestionRecord {
            avg_attendance_percent: 105.0,
            ..valid_record()
        };
        let errors = validate(&record);
        assert_eq!(errors, vec!["Impossible Attendance %: 105"]);
        assert!(errors[0].contains("105"));
    }

    #[test]
    fn test_pass_percent_out_of_range() {
        let record = UnifiedIngestionRecord {
            avg_test_pass_percent: -0.5,
            ..valid_record()
        };
        assert_eq!(validate(&record), vec!["Impossible Pass %: -0.5"]);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let record = UnifiedIngestionRecord {
            avg_attendance_percent: 100.0,
            avg_test_pass_percent: 0.0,
            ..valid_record()
        };
        assert!(validate(&record).is_empty());
    }

    #[test]
    fn test_covered_exceeds_total() {
        let record = UnifiedIngestionRecord {
            syllabus_covered: 60,
            syllabus_total: 50,
            ..valid_record()
        };
        assert_eq!(
            validate(&record),
            vec!["Covered syllabus (60) cannot exceed total (50)"]
        );
    }

    #[test]
    fn test_covered_check_skipped_without_total() {
        let record = UnifiedIngestionRecord {
            syllabus_covered: 10,
            syllabus_total: 0,
            ..valid_record()
        };
        assert!(validate(&record).is_empty());
    }

    #[test]
    fn test_errors_keep_rule_order() {
        let record = UnifiedIngestionRecord {
            branch_code: "UNKNOWN".to_string(),
            week_no: -1,
            avg_attendance_percent: 101.0,
            avg_test_pass_percent: 200.0,
            syllabus_covered: 9,
            syllabus_total: 8,
            ..valid_record()
        };
        assert_eq!(
            validate(&record),
            vec![
                "Invalid Branch Code",
                "Invalid Week Number",
                "Impossible Attendance %: 101",
                "Impossible Pass %: 200",
                "Covered syllabus (9) cannot exceed total (8)",
            ]
        );
    }
}
