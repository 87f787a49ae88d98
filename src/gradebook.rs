use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calc::{self, CalcError, CategoryAdjustment, GpaAccumulator, GpaSummary, TrendPoint};
use crate::model::{Assignment, AssignmentPatch, Course, GradingPeriod};
use crate::policy::{InstitutionProfile, MarkRule};

/// The locally-editable working copy of one course's assignments. The
/// canonical snapshot it derives from is never mutated, only replaced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOverlay {
    pub assignments: Vec<Assignment>,
    /// Set by any edit, cleared by rollback or a fresh snapshot. This is
    /// the one signal the host needs to choose between "discard edits" and
    /// "re-fetch" on its refresh action.
    pub needs_rollback: bool,
}

/// Host-supplied session identity. The engine stores it and surfaces it in
/// health output; the network layer that actually uses it lives outside.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}

/// Course entry for the period listing, with the derived grade attached so
/// the host can render tiles in one round trip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTile {
    pub class_id: String,
    pub period: Option<i64>,
    pub name: String,
    pub teacher: String,
    pub room: String,
    pub ratio: Option<f64>,
    pub mark: String,
    pub color: String,
    pub needs_rollback: bool,
}

type Key = (String, String);

fn key(period: &str, course_id: &str) -> Key {
    (period.to_string(), course_id.to_string())
}

/// Aggregate root: canonical snapshots, their overlays, the active policies,
/// and the grading-period catalog.
///
/// Everything here is synchronous over in-memory state. Snapshot fetches
/// happen outside; whichever snapshot is accepted last wins its key, and a
/// failed fetch simply never reaches `accept_snapshot`, leaving prior state
/// intact. In a multi-threaded host each overlay needs exclusive locking,
/// since edits are read-modify-write on the assignment list.
pub struct Gradebook {
    profile: InstitutionProfile,
    context: SessionContext,
    grading_periods: Vec<GradingPeriod>,
    default_grading_period: String,
    snapshots: HashMap<Key, Course>,
    overlays: HashMap<Key, CourseOverlay>,
    loaded_periods: HashSet<String>,
}

impl Gradebook {
    pub fn new(
        profile: InstitutionProfile,
        context: SessionContext,
        grading_periods: Vec<GradingPeriod>,
        default_grading_period: String,
    ) -> Result<Self, CalcError> {
        if !grading_periods.iter().any(|p| p.id == default_grading_period) {
            return Err(CalcError::new(
                "bad_params",
                format!("default grading period {default_grading_period:?} is not in the catalog"),
            ));
        }
        Ok(Self {
            profile,
            context,
            grading_periods,
            default_grading_period,
            snapshots: HashMap::new(),
            overlays: HashMap::new(),
            loaded_periods: HashSet::new(),
        })
    }

    pub fn profile(&self) -> &InstitutionProfile {
        &self.profile
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn grading_periods(&self) -> &[GradingPeriod] {
        &self.grading_periods
    }

    pub fn default_grading_period(&self) -> &str {
        &self.default_grading_period
    }

    pub fn loaded_periods(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.loaded_periods.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn is_period_loaded(&self, period: &str) -> bool {
        self.loaded_periods.contains(period)
    }

    fn check_period(&self, period: &str) -> Result<(), CalcError> {
        if self.grading_periods.iter().any(|p| p.id == period) {
            Ok(())
        } else {
            Err(CalcError::new(
                "not_found",
                format!("unknown grading period {period:?}"),
            ))
        }
    }

    /// Accept one fresh snapshot, replacing both the canonical copy and the
    /// overlay at its key. Last write wins; edits in flight are discarded.
    pub fn accept_snapshot(&mut self, period: &str, course: Course) -> Result<(), CalcError> {
        self.check_period(period)?;
        let k = key(period, &course.class_id);
        self.overlays.insert(k.clone(), derive_overlay(&course));
        self.snapshots.insert(k, course);
        Ok(())
    }

    /// Accept the full course list for a period, marking it loaded.
    pub fn populate_all(&mut self, period: &str, courses: Vec<Course>) -> Result<usize, CalcError> {
        self.check_period(period)?;
        let count = courses.len();
        for course in courses {
            self.accept_snapshot(period, course)?;
        }
        self.loaded_periods.insert(period.to_string());
        Ok(count)
    }

    pub fn snapshot(&self, period: &str, course_id: &str) -> Result<&Course, CalcError> {
        self.check_period(period)?;
        self.snapshots.get(&key(period, course_id)).ok_or_else(|| {
            CalcError::new(
                "not_loaded",
                format!("course {course_id} is not loaded for grading period {period}"),
            )
        })
    }

    pub fn overlay(&self, period: &str, course_id: &str) -> Result<&CourseOverlay, CalcError> {
        self.check_period(period)?;
        self.overlays.get(&key(period, course_id)).ok_or_else(|| {
            CalcError::new(
                "not_loaded",
                format!("course {course_id} is not loaded for grading period {period}"),
            )
        })
    }

    fn overlay_mut(&mut self, period: &str, course_id: &str) -> Result<&mut CourseOverlay, CalcError> {
        self.check_period(period)?;
        self.overlays.get_mut(&key(period, course_id)).ok_or_else(|| {
            CalcError::new(
                "not_loaded",
                format!("course {course_id} is not loaded for grading period {period}"),
            )
        })
    }

    /// Discard overlay edits and rebuild from the canonical snapshot. A
    /// second rollback against a pristine overlay is a no-op.
    pub fn rollback(&mut self, period: &str, course_id: &str) -> Result<&CourseOverlay, CalcError> {
        let fresh = derive_overlay(self.snapshot(period, course_id)?);
        let slot = self
            .overlays
            .entry(key(period, course_id))
            .or_insert_with(|| CourseOverlay {
                assignments: Vec::new(),
                needs_rollback: false,
            });
        *slot = fresh;
        Ok(slot)
    }

    /// Replace the working list wholesale. Counts as an edit.
    pub fn set_assignments(
        &mut self,
        period: &str,
        course_id: &str,
        assignments: Vec<Assignment>,
    ) -> Result<(), CalcError> {
        let overlay = self.overlay_mut(period, course_id)?;
        overlay.assignments = assignments;
        overlay.needs_rollback = true;
        Ok(())
    }

    pub fn set_needs_rollback(
        &mut self,
        period: &str,
        course_id: &str,
        value: bool,
    ) -> Result<(), CalcError> {
        self.overlay_mut(period, course_id)?.needs_rollback = value;
        Ok(())
    }

    /// Prepend a synthetic what-if assignment: first category of the policy,
    /// zero score out of zero, placeholder due date.
    pub fn add_custom_assignment(
        &mut self,
        period: &str,
        course_id: &str,
    ) -> Result<Assignment, CalcError> {
        let category = self
            .profile
            .weighting
            .first()
            .map(|w| w.name.clone())
            .unwrap_or_else(|| "Assignment".to_string());
        let assignment = Assignment {
            id: Uuid::new_v4().to_string(),
            name: "New Assignment".into(),
            category,
            due_date: "Custom Assignment".into(),
            score: Some(0.0),
            max_score: Some(0.0),
            description: None,
            not_for_grading: false,
            is_custom: true,
        };
        let overlay = self.overlay_mut(period, course_id)?;
        overlay.assignments.insert(0, assignment.clone());
        overlay.needs_rollback = true;
        Ok(assignment)
    }

    pub fn update_assignment(
        &mut self,
        period: &str,
        course_id: &str,
        index: usize,
        patch: AssignmentPatch,
    ) -> Result<Assignment, CalcError> {
        let overlay = self.overlay_mut(period, course_id)?;
        let Some(slot) = overlay.assignments.get_mut(index) else {
            return Err(CalcError::new(
                "not_found",
                format!("no assignment at index {index}"),
            ));
        };
        if let Some(name) = patch.name {
            slot.name = name;
        }
        if let Some(category) = patch.category {
            slot.category = category;
        }
        if let Some(score) = patch.score {
            slot.score = score;
        }
        if let Some(max_score) = patch.max_score {
            slot.max_score = max_score;
        }
        if let Some(flag) = patch.not_for_grading {
            slot.not_for_grading = flag;
        }
        let updated = slot.clone();
        overlay.needs_rollback = true;
        Ok(updated)
    }

    pub fn delete_assignment(
        &mut self,
        period: &str,
        course_id: &str,
        index: usize,
    ) -> Result<Assignment, CalcError> {
        let overlay = self.overlay_mut(period, course_id)?;
        if index >= overlay.assignments.len() {
            return Err(CalcError::new(
                "not_found",
                format!("no assignment at index {index}"),
            ));
        }
        let removed = overlay.assignments.remove(index);
        overlay.needs_rollback = true;
        Ok(removed)
    }

    /// The weighted ratio for a course, against the overlay unless an
    /// explicit assignment list is supplied (trend charts pass prefixes).
    pub fn weighted_ratio(
        &self,
        period: &str,
        course_id: &str,
        adjustments: &[CategoryAdjustment],
        assignments_override: Option<&[Assignment]>,
    ) -> Result<f64, CalcError> {
        let ratio = match assignments_override {
            Some(list) => calc::weighted_ratio(&self.profile.weighting, list, adjustments),
            None => calc::weighted_ratio(
                &self.profile.weighting,
                &self.overlay(period, course_id)?.assignments,
                adjustments,
            ),
        };
        Ok(ratio)
    }

    pub fn mark(&self, period: &str, course_id: &str) -> Result<(&MarkRule, f64), CalcError> {
        let ratio = self.weighted_ratio(period, course_id, &[], None)?;
        Ok((self.profile.marking.get_mark(ratio), ratio))
    }

    /// Standalone `(points, maxPoints)` pair for progress displays.
    pub fn points(
        &self,
        period: &str,
        course_id: &str,
        category: Option<&str>,
    ) -> Result<(f64, f64), CalcError> {
        let overlay = self.overlay(period, course_id)?;
        Ok(calc::assignment_points(&overlay.assignments, category))
    }

    pub fn impact(&self, period: &str, course_id: &str, index: usize) -> Result<f64, CalcError> {
        let overlay = self.overlay(period, course_id)?;
        let Some(assignment) = overlay.assignments.get(index) else {
            return Err(CalcError::new(
                "not_found",
                format!("no assignment at index {index}"),
            ));
        };
        Ok(calc::marginal_impact(
            &self.profile.weighting,
            &overlay.assignments,
            assignment,
        ))
    }

    pub fn trend(&self, period: &str, course_id: &str) -> Result<Vec<TrendPoint>, CalcError> {
        let overlay = self.overlay(period, course_id)?;
        Ok(calc::trend_series(&self.profile.weighting, &overlay.assignments))
    }

    /// GPA over every course in the period. Requires the full course list:
    /// a partial GPA would silently misrepresent the term.
    pub fn gpa(&self, period: &str) -> Result<GpaSummary, CalcError> {
        self.check_period(period)?;
        if !self.is_period_loaded(period) {
            return Err(CalcError::new(
                "not_loaded",
                format!("grading period {period} is not fully loaded"),
            ));
        }

        let mut acc = GpaAccumulator::default();
        for ((p, _), course) in &self.snapshots {
            if p != period {
                continue;
            }
            let ratio = self.weighted_ratio(period, &course.class_id, &[], None)?;
            let rule = self.profile.marking.get_mark(ratio);
            acc.add(rule, self.profile.is_weighted_course(&course.name));
        }
        Ok(acc.finish())
    }

    /// Courses of a period ordered by class period slot, then name, each
    /// carrying its derived grade.
    pub fn course_list(&self, period: &str) -> Result<Vec<CourseTile>, CalcError> {
        self.check_period(period)?;
        if !self.is_period_loaded(period) {
            return Err(CalcError::new(
                "not_loaded",
                format!("grading period {period} is not fully loaded"),
            ));
        }

        let mut tiles = Vec::new();
        for ((p, _), course) in &self.snapshots {
            if p != period {
                continue;
            }
            let ratio = self.weighted_ratio(period, &course.class_id, &[], None)?;
            let rule = self.profile.marking.get_mark(ratio);
            let needs_rollback = self
                .overlays
                .get(&key(period, &course.class_id))
                .map(|o| o.needs_rollback)
                .unwrap_or(false);
            tiles.push(CourseTile {
                class_id: course.class_id.clone(),
                period: course.period,
                name: course.name.clone(),
                teacher: course.teacher.clone(),
                room: course.room.clone(),
                ratio: calc::ratio_opt(ratio),
                mark: rule.mark.clone(),
                color: rule.color.clone(),
                needs_rollback,
            });
        }
        tiles.sort_by(|a, b| {
            let pa = a.period.unwrap_or(i64::MAX);
            let pb = b.period.unwrap_or(i64::MAX);
            pa.cmp(&pb).then_with(|| a.name.cmp(&b.name))
        });
        Ok(tiles)
    }
}

/// Snapshot assignments, due date descending, customs never present.
fn derive_overlay(course: &Course) -> CourseOverlay {
    let mut assignments = course.assignments.clone();
    for a in &mut assignments {
        a.is_custom = false;
    }
    assignments.sort_by(|a, b| b.due_date_parsed().cmp(&a.due_date_parsed()));
    CourseOverlay {
        assignments,
        needs_rollback: false,
    }
}
