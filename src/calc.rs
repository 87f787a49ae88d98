use serde::{Deserialize, Serialize};

use crate::model::Assignment;
use crate::policy::{MarkRule, WeightingPolicy};

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Simulated shift of one category's point totals, used to ask "what would
/// the ratio be without (or with) this contribution". No adjustment is the
/// empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAdjustment {
    pub category: String,
    #[serde(default)]
    pub extra_points: f64,
    #[serde(default)]
    pub extra_max_points: f64,
}

impl CategoryAdjustment {
    /// The adjustment that subtracts one assignment's contribution.
    pub fn removing(assignment: &Assignment) -> Self {
        Self {
            category: assignment.category.clone(),
            extra_points: -assignment.score.unwrap_or(0.0),
            extra_max_points: -assignment.max_score.unwrap_or(0.0),
        }
    }
}

/// Summed `(points, maxPoints)` over gradable scored assignments, optionally
/// restricted to one category. The same filter feeds the weighted ratio, so
/// progress displays and the overall grade always agree.
pub fn assignment_points(assignments: &[Assignment], category: Option<&str>) -> (f64, f64) {
    let mut points = 0.0;
    let mut max_points = 0.0;
    for a in assignments {
        if !a.is_gradable() {
            continue;
        }
        if let Some(cat) = category {
            if a.category != cat {
                continue;
            }
        }
        points += a.score.unwrap_or(0.0);
        max_points += a.max_score.unwrap_or(0.0);
    }
    (points, max_points)
}

/// The overall course grade as a fraction.
///
/// Categories with no scored max-points are skipped entirely: they contribute
/// neither weight nor ratio, so an empty category never drags the average
/// toward zero. The aggregate renormalizes over the weights that actually
/// participated; with none, the result is NaN — the "no grade yet" signal.
pub fn weighted_ratio(
    weighting: &WeightingPolicy,
    assignments: &[Assignment],
    adjustments: &[CategoryAdjustment],
) -> f64 {
    let mut sum_weight = 0.0_f64;
    let mut sum_ratio = 0.0_f64;

    for w in &weighting.weights {
        let (mut points, mut max_points) = assignment_points(assignments, Some(w.name.as_str()));
        for adj in adjustments.iter().filter(|a| a.category == w.name) {
            points += adj.extra_points;
            max_points += adj.extra_max_points;
        }
        if max_points == 0.0 {
            continue;
        }
        let category_ratio = points / max_points * w.weight;
        if category_ratio.is_nan() {
            continue;
        }
        sum_weight += w.weight;
        sum_ratio += category_ratio;
    }

    sum_ratio / sum_weight
}

/// Signed change in the overall ratio attributable to one assignment: the
/// ratio with it minus the ratio with its points subtracted out. NaN when
/// the assignment has no score or is excluded from grading.
pub fn marginal_impact(
    weighting: &WeightingPolicy,
    assignments: &[Assignment],
    assignment: &Assignment,
) -> f64 {
    if !assignment.is_gradable() {
        return f64::NAN;
    }
    let base = weighted_ratio(weighting, assignments, &[]);
    let without = weighted_ratio(
        weighting,
        assignments,
        &[CategoryAdjustment::removing(assignment)],
    );
    base - without
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub weighted: Option<f64>,
    pub unweighted: Option<f64>,
}

/// GPA accumulation over one grading period's courses. Courses whose mark
/// carries no point value for an axis are left out of that axis entirely
/// rather than counted as zero.
#[derive(Debug, Default)]
pub struct GpaAccumulator {
    unweighted_sum: f64,
    unweighted_count: u32,
    weighted_sum: f64,
    weighted_count: u32,
}

impl GpaAccumulator {
    pub fn add(&mut self, rule: &MarkRule, is_weighted_course: bool) {
        if let Some(points) = rule.gpa_points {
            self.unweighted_sum += points;
            self.unweighted_count += 1;
        }
        if rule.gpa_points.is_some() || rule.wgpa_points.is_some() {
            let points = if is_weighted_course {
                rule.wgpa_points.or(rule.gpa_points)
            } else {
                rule.gpa_points
            };
            self.weighted_sum += points.unwrap_or(0.0);
            self.weighted_count += 1;
        }
    }

    pub fn finish(&self) -> GpaSummary {
        let axis = |sum: f64, count: u32| {
            if count == 0 {
                None
            } else {
                Some(sum / f64::from(count))
            }
        };
        GpaSummary {
            weighted: axis(self.weighted_sum, self.weighted_count),
            unweighted: axis(self.unweighted_sum, self.unweighted_count),
        }
    }
}

/// One step of the running-grade series: the overall ratio once this
/// assignment (and everything due before it) is counted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub name: String,
    pub category: String,
    pub due_date: String,
    pub scored: bool,
    pub ratio: Option<f64>,
}

/// Walks the overlay oldest-first (the list is kept due-date descending),
/// accumulating assignments and recomputing the ratio at each step. The
/// leading run of custom entries is skipped; they carry no real due date.
pub fn trend_series(weighting: &WeightingPolicy, assignments: &[Assignment]) -> Vec<TrendPoint> {
    let first_real = assignments
        .iter()
        .position(|a| !a.is_custom)
        .unwrap_or(assignments.len());
    let scoped = &assignments[first_real..];

    let mut accumulated: Vec<Assignment> = Vec::with_capacity(scoped.len());
    let mut points = Vec::with_capacity(scoped.len());
    for a in scoped.iter().rev() {
        accumulated.push(a.clone());
        let ratio = weighted_ratio(weighting, &accumulated, &[]);
        points.push(TrendPoint {
            name: a.name.clone(),
            category: a.category.clone(),
            due_date: a.due_date.clone(),
            scored: a.score.is_some(),
            ratio: ratio_opt(ratio),
        });
    }
    points
}

/// NaN does not survive a JSON round trip; the whole surface encodes it as
/// null instead.
pub fn ratio_opt(ratio: f64) -> Option<f64> {
    if ratio.is_nan() {
        None
    } else {
        Some(ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Threshold, Weight};

    fn weighting(pairs: &[(&str, f64)]) -> WeightingPolicy {
        WeightingPolicy::new(
            pairs
                .iter()
                .map(|(name, weight)| Weight {
                    name: (*name).to_string(),
                    colloquial: String::new(),
                    short: String::new(),
                    weight: *weight,
                })
                .collect(),
        )
    }

    fn scored(id: &str, category: &str, score: f64, max: f64) -> Assignment {
        Assignment {
            id: id.into(),
            name: format!("Assignment {id}"),
            category: category.into(),
            due_date: "01/15/2025".into(),
            score: Some(score),
            max_score: Some(max),
            description: None,
            not_for_grading: false,
            is_custom: false,
        }
    }

    fn unscored(id: &str, category: &str, max: f64) -> Assignment {
        Assignment {
            score: None,
            max_score: Some(max),
            ..scored(id, category, 0.0, max)
        }
    }

    #[test]
    fn empty_categories_yield_nan_not_zero() {
        let w = weighting(&[("Tests", 0.9), ("Practice", 0.1)]);
        assert!(weighted_ratio(&w, &[], &[]).is_nan());

        // Unscored work still counts as "no gradable work".
        let only_unscored = [unscored("1", "Tests", 100.0)];
        assert!(weighted_ratio(&w, &only_unscored, &[]).is_nan());
    }

    #[test]
    fn lone_category_renormalizes_by_its_own_weight() {
        let w = weighting(&[("Tests", 0.9), ("Practice", 0.1)]);
        let assignments = [scored("1", "Tests", 85.0, 100.0)];
        let ratio = weighted_ratio(&w, &assignments, &[]);
        assert!((ratio - 0.85).abs() < 1e-12);

        // The configured weight value is irrelevant while the category is
        // alone, as long as it is nonzero.
        let w2 = weighting(&[("Tests", 0.25), ("Practice", 0.1)]);
        let ratio2 = weighted_ratio(&w2, &assignments, &[]);
        assert!((ratio2 - 0.85).abs() < 1e-12);
    }

    #[test]
    fn both_categories_blend_by_weight() {
        let w = weighting(&[("Tests", 0.9), ("Practice", 0.1)]);
        let assignments = [
            scored("1", "Tests", 85.0, 100.0),
            scored("2", "Practice", 10.0, 10.0),
        ];
        let ratio = weighted_ratio(&w, &assignments, &[]);
        assert!((ratio - 0.865).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_category_is_inert() {
        let w = weighting(&[("Tests", 0.9), ("Extra", 0.0)]);
        let assignments = [
            scored("1", "Tests", 85.0, 100.0),
            scored("2", "Extra", 0.0, 50.0),
        ];
        let ratio = weighted_ratio(&w, &assignments, &[]);
        assert!((ratio - 0.85).abs() < 1e-12);
    }

    #[test]
    fn excluded_assignments_do_not_count() {
        let w = weighting(&[("Tests", 1.0)]);
        let mut flagged = scored("2", "Tests", 0.0, 100.0);
        flagged.not_for_grading = true;
        let assignments = [scored("1", "Tests", 90.0, 100.0), flagged];
        let ratio = weighted_ratio(&w, &assignments, &[]);
        assert!((ratio - 0.9).abs() < 1e-12);
    }

    #[test]
    fn adjustment_can_empty_a_category() {
        let w = weighting(&[("Tests", 0.9), ("Practice", 0.1)]);
        let assignments = [
            scored("1", "Tests", 85.0, 100.0),
            scored("2", "Practice", 10.0, 10.0),
        ];
        // Subtracting the only practice assignment leaves the category with
        // zero max-points, so it drops out and Tests renormalizes alone.
        let adj = [CategoryAdjustment {
            category: "Practice".into(),
            extra_points: -10.0,
            extra_max_points: -10.0,
        }];
        let ratio = weighted_ratio(&w, &assignments, &adj);
        assert!((ratio - 0.85).abs() < 1e-12);
    }

    #[test]
    fn impact_matches_the_removal_formula() {
        let w = weighting(&[("Tests", 0.9), ("Practice", 0.1)]);
        let assignments = [
            scored("1", "Tests", 85.0, 100.0),
            scored("2", "Practice", 10.0, 10.0),
        ];
        let base = weighted_ratio(&w, &assignments, &[]);
        let impact = marginal_impact(&w, &assignments, &assignments[1]);
        // Removing the 10/10 practice assignment leaves 0.85.
        assert!((impact - (base - 0.85)).abs() < 1e-12);
        assert!(impact > 0.0);
    }

    #[test]
    fn impact_sum_is_not_linear() {
        let w = weighting(&[("Tests", 1.0)]);
        let assignments = [
            scored("1", "Tests", 50.0, 100.0),
            scored("2", "Tests", 100.0, 100.0),
        ];
        let base = weighted_ratio(&w, &assignments, &[]);
        let total: f64 = assignments
            .iter()
            .map(|a| marginal_impact(&w, &assignments, a))
            .sum();
        // Each removal changes the denominator, so per-assignment impacts
        // do not add up to the base ratio.
        assert!((total - base).abs() > 1e-6);
    }

    #[test]
    fn impact_is_nan_for_unscored_or_excluded() {
        let w = weighting(&[("Tests", 1.0)]);
        let assignments = [scored("1", "Tests", 90.0, 100.0), unscored("2", "Tests", 50.0)];
        assert!(marginal_impact(&w, &assignments, &assignments[1]).is_nan());

        let mut flagged = scored("3", "Tests", 10.0, 10.0);
        flagged.not_for_grading = true;
        assert!(marginal_impact(&w, &assignments, &flagged).is_nan());
    }

    #[test]
    fn gpa_axes_skip_pointless_marks() {
        let a = MarkRule {
            mark: "A".into(),
            color: "0 0 0".into(),
            threshold: Threshold::AtLeast(0.895),
            gpa_points: Some(4.0),
            wgpa_points: Some(5.0),
        };
        let na = MarkRule {
            mark: "N/A".into(),
            color: "0 0 0".into(),
            threshold: Threshold::Unconditional,
            gpa_points: None,
            wgpa_points: None,
        };

        let mut acc = GpaAccumulator::default();
        acc.add(&a, true); // honors course
        acc.add(&a, false);
        acc.add(&na, false); // ungraded course: excluded from both axes
        let summary = acc.finish();
        assert_eq!(summary.unweighted, Some(4.0));
        assert_eq!(summary.weighted, Some(4.5));

        let empty = GpaAccumulator::default().finish();
        assert_eq!(empty.weighted, None);
        assert_eq!(empty.unweighted, None);
    }

    #[test]
    fn trend_walks_oldest_first_and_skips_custom_prefix() {
        let w = weighting(&[("Tests", 1.0)]);
        let mut custom = scored("c", "Tests", 100.0, 100.0);
        custom.is_custom = true;
        custom.due_date = "Custom Assignment".into();

        // Overlay order: custom prefix, then newest-to-oldest.
        let mut newer = scored("2", "Tests", 100.0, 100.0);
        newer.due_date = "02/01/2025".into();
        let mut older = scored("1", "Tests", 50.0, 100.0);
        older.due_date = "01/01/2025".into();

        let series = trend_series(&w, &[custom, newer, older]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].due_date, "01/01/2025");
        assert_eq!(series[0].ratio, Some(0.5));
        assert_eq!(series[1].ratio, Some(0.75));
    }
}
