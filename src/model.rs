use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One gradable (or excluded) unit of work.
///
/// Canonical assignments come from the data source; synthetic what-if entries
/// are created locally with `is_custom` set and never appear in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub category: String,
    /// `mm/dd/yyyy` in canonical data; placeholder text on custom entries.
    pub due_date: String,
    #[serde(default, deserialize_with = "de_opt_score")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_score")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub not_for_grading: bool,
    #[serde(default)]
    pub is_custom: bool,
}

impl Assignment {
    /// Counts toward the weighted ratio: gradable and actually scored.
    pub fn is_gradable(&self) -> bool {
        !self.not_for_grading && self.score.is_some()
    }

    pub fn due_date_parsed(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.due_date.trim(), "%m/%d/%Y").ok()
    }
}

/// Field-wise edit against one overlay assignment. Absent fields are left
/// untouched; `score`/`maxScore` distinguish "unchanged" from "cleared".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de_patch_score")]
    pub score: Option<Option<f64>>,
    #[serde(default, deserialize_with = "de_patch_score")]
    pub max_score: Option<Option<f64>>,
    #[serde(default)]
    pub not_for_grading: Option<bool>,
}

/// Server-reported per-category summary, carried on the snapshot verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedWeight {
    pub category: String,
    pub points: f64,
    pub points_possible: f64,
    pub weight: f64,
}

/// Immutable course snapshot as of the last fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub class_id: String,
    #[serde(default)]
    pub period: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub room: String,
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reported_weights: Vec<ReportedWeight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingPeriod {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Num(f64),
    Text(String),
}

/// Scores sometimes arrive as numeric strings ("85" or "1,024.5"); normalize
/// to a typed optional number here so the engine never parses text.
fn de_opt_score<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawScore>::deserialize(de)? {
        None => Ok(None),
        Some(RawScore::Num(v)) => Ok(Some(v)),
        Some(RawScore::Text(s)) => {
            let t = s.trim().replace(',', "");
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid numeric score: {s:?}")))
        }
    }
}

fn de_patch_score<'de, D>(de: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_score(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment(v: serde_json::Value) -> Assignment {
        serde_json::from_value(v).expect("parse assignment")
    }

    #[test]
    fn score_accepts_number_string_and_null() {
        let a = assignment(json!({
            "id": "1", "name": "Quiz", "category": "Tests", "dueDate": "03/14/2025",
            "score": "85", "maxScore": 100,
        }));
        assert_eq!(a.score, Some(85.0));
        assert_eq!(a.max_score, Some(100.0));

        let b = assignment(json!({
            "id": "2", "name": "HW", "category": "Practice", "dueDate": "03/15/2025",
            "score": null, "maxScore": "1,024.5",
        }));
        assert_eq!(b.score, None);
        assert_eq!(b.max_score, Some(1024.5));
        assert!(!b.is_gradable());
    }

    #[test]
    fn score_rejects_non_numeric_text() {
        let res: Result<Assignment, _> = serde_json::from_value(json!({
            "id": "1", "name": "Quiz", "category": "Tests", "dueDate": "03/14/2025",
            "score": "eighty five", "maxScore": 100,
        }));
        assert!(res.is_err());
    }

    #[test]
    fn due_date_parses_canonical_format_only() {
        let a = assignment(json!({
            "id": "1", "name": "Quiz", "category": "Tests", "dueDate": "03/14/2025",
        }));
        assert_eq!(
            a.due_date_parsed(),
            NaiveDate::from_ymd_opt(2025, 3, 14)
        );

        let custom = assignment(json!({
            "id": "2", "name": "New Assignment", "category": "Tests",
            "dueDate": "Custom Assignment", "isCustom": true,
        }));
        assert_eq!(custom.due_date_parsed(), None);
    }

    #[test]
    fn patch_distinguishes_absent_from_cleared_score() {
        let untouched: AssignmentPatch = serde_json::from_value(json!({"name": "Renamed"})).expect("patch");
        assert_eq!(untouched.score, None);

        let cleared: AssignmentPatch = serde_json::from_value(json!({"score": null})).expect("patch");
        assert_eq!(cleared.score, Some(None));

        let set: AssignmentPatch = serde_json::from_value(json!({"score": "42"})).expect("patch");
        assert_eq!(set.score, Some(Some(42.0)));
    }
}
