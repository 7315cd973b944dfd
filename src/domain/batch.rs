use crate::domain::models::SurveyRow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const QUESTION_COUNT: usize = 3;

/// All rows of one authoring action, in the order they were fetched.
#[derive(Debug)]
pub struct BatchGroup {
    pub key: Uuid,
    pub rows: Vec<SurveyRow>,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub applicant_count: usize,
    pub responded_count: usize,
}

#[derive(Debug)]
pub struct BatchStats {
    pub total: usize,
    pub responded: usize,
    pub response_rate_pct: f64,
    pub averages: [Option<f64>; QUESTION_COUNT],
}

#[derive(Debug, Default)]
pub struct BatchFilter {
    pub title: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BatchGroup {
    /// The group is represented by its first row, as fetched (newest-first
    /// ordering upstream makes that the most recent one).
    pub fn summary(&self) -> BatchSummary {
        let first = &self.rows[0];
        BatchSummary {
            id: first.id,
            batch_id: self.key,
            title: first.title.clone(),
            created_at: first.created_at,
            applicant_count: self.rows.len(),
            responded_count: self.rows.iter().filter(|r| r.responded).count(),
        }
    }

    pub fn stats(&self) -> BatchStats {
        let total = self.rows.len();
        let answered: Vec<&SurveyRow> =
            self.rows.iter().filter(|r| r.fully_answered()).collect();

        let mut averages = [None; QUESTION_COUNT];
        for (idx, slot) in averages.iter_mut().enumerate() {
            let values: Vec<f64> = answered
                .iter()
                .filter_map(|r| match idx {
                    0 => r.a1,
                    1 => r.a2,
                    _ => r.a3,
                })
                .map(f64::from)
                .collect();
            if !values.is_empty() {
                *slot = Some(values.iter().sum::<f64>() / values.len() as f64);
            }
        }

        BatchStats {
            total,
            responded: answered.len(),
            response_rate_pct: if total == 0 {
                0.0
            } else {
                answered.len() as f64 / total as f64 * 100.0
            },
            averages,
        }
    }

    pub fn matches(&self, filter: &BatchFilter) -> bool {
        let first = &self.rows[0];
        if let Some(title) = &filter.title {
            if !first.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        let created = first.created_at.date_naive();
        if let Some(start) = filter.start_date {
            if created < start {
                return false;
            }
        }
        if let Some(end) = filter.end_date {
            if created > end {
                return false;
            }
        }
        true
    }
}

/// Group rows by batch id, falling back to the row's own id when absent.
/// Group order follows first appearance in the input.
pub fn group_by_batch(rows: Vec<SurveyRow>) -> Vec<BatchGroup> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut groups: Vec<BatchGroup> = Vec::new();
    for row in rows {
        let key = row.batch_key();
        match index.get(&key) {
            Some(&i) => groups[i].rows.push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(BatchGroup { key, rows: vec![row] });
            }
        }
    }
    groups
}

/// "N/A" with no data, whole numbers without decimals, otherwise two places.
pub fn format_average(avg: Option<f64>) -> String {
    match avg {
        None => "N/A".to_string(),
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{v:.2}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sqlx::types::Json;

    fn row(
        batch_id: Option<Uuid>,
        responded: bool,
        answers: [Option<i16>; 3],
        title: &str,
        day: u32,
    ) -> SurveyRow {
        SurveyRow {
            id: Uuid::new_v4(),
            batch_id,
            title: title.to_string(),
            questions: Json(vec![
                "Q1".to_string(),
                "Q2".to_string(),
                "Q3".to_string(),
            ]),
            manager_id: Uuid::new_v4(),
            team_member_email: "member@example.com".to_string(),
            invite_token: "token".to_string(),
            responded,
            a1: answers[0],
            a2: answers[1],
            a3: answers[2],
            created_at: Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn groups_share_batch_id_and_count_responses() {
        let batch = Uuid::new_v4();
        let rows = vec![
            row(Some(batch), true, [Some(4), Some(5), Some(3)], "Q1 Check-in", 1),
            row(Some(batch), false, [None, None, None], "Q1 Check-in", 1),
        ];
        let groups = group_by_batch(rows);
        assert_eq!(groups.len(), 1);
        let summary = groups[0].summary();
        assert_eq!(summary.applicant_count, 2);
        assert_eq!(summary.responded_count, 1);
        assert!(summary.responded_count <= summary.applicant_count);
    }

    #[test]
    fn rows_without_batch_id_stand_alone() {
        let rows = vec![
            row(None, false, [None, None, None], "Solo A", 1),
            row(None, false, [None, None, None], "Solo B", 2),
        ];
        let groups = group_by_batch(rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, groups[0].rows[0].id);
    }

    #[test]
    fn averages_cover_only_fully_answered_responded_rows() {
        let batch = Uuid::new_v4();
        let rows = vec![
            row(Some(batch), true, [Some(4), Some(5), Some(3)], "T", 1),
            row(Some(batch), true, [Some(2), Some(1), Some(5)], "T", 1),
            // responded but incomplete: excluded from averages
            row(Some(batch), true, [Some(5), None, None], "T", 1),
            row(Some(batch), false, [None, None, None], "T", 1),
        ];
        let stats = group_by_batch(rows).remove(0).stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.responded, 2);
        assert_eq!(stats.averages[0], Some(3.0));
        assert_eq!(stats.averages[1], Some(3.0));
        assert_eq!(stats.averages[2], Some(4.0));
    }

    #[test]
    fn averages_are_undefined_without_responses() {
        let batch = Uuid::new_v4();
        let rows = vec![row(Some(batch), false, [None, None, None], "T", 1)];
        let stats = group_by_batch(rows).remove(0).stats();
        assert_eq!(stats.responded, 0);
        assert_eq!(stats.averages, [None, None, None]);
        assert_eq!(format_average(stats.averages[0]), "N/A");
    }

    #[test]
    fn average_formatting_matches_display_rules() {
        assert_eq!(format_average(None), "N/A");
        assert_eq!(format_average(Some(4.0)), "4");
        assert_eq!(format_average(Some(10.0 / 3.0)), "3.33");
    }

    #[test]
    fn title_filter_is_case_insensitive_substring() {
        let rows = vec![row(None, false, [None, None, None], "Q1 Check-in", 1)];
        let groups = group_by_batch(rows);
        let filter = BatchFilter {
            title: Some("check".to_string()),
            ..Default::default()
        };
        assert!(groups[0].matches(&filter));
        let filter = BatchFilter {
            title: Some("retro".to_string()),
            ..Default::default()
        };
        assert!(!groups[0].matches(&filter));
    }

    #[test]
    fn date_filter_bounds_are_inclusive() {
        let rows = vec![row(None, false, [None, None, None], "T", 15)];
        let groups = group_by_batch(rows);
        let on = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let filter = BatchFilter {
            start_date: Some(on),
            end_date: Some(on),
            ..Default::default()
        };
        assert!(groups[0].matches(&filter));
        let filter = BatchFilter {
            start_date: Some(NaiveDate::from_ymd_opt(2024, 6, 16).unwrap()),
            ..Default::default()
        };
        assert!(!groups[0].matches(&filter));
        let filter = BatchFilter {
            end_date: Some(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()),
            ..Default::default()
        };
        assert!(!groups[0].matches(&filter));
    }
}
