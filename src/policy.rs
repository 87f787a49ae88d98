use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::calc::CalcError;

/// One grading category and its fractional weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weight {
    pub name: String,
    #[serde(default)]
    pub colloquial: String,
    #[serde(default)]
    pub short: String,
    /// 0.0 to 1.0. The engine renormalizes dynamically, so the table need
    /// not sum to 1.
    pub weight: f64,
}

/// Ordered category table. Iteration order is the order given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightingPolicy {
    pub weights: Vec<Weight>,
}

impl WeightingPolicy {
    pub fn new(weights: Vec<Weight>) -> Self {
        Self { weights }
    }

    pub fn first(&self) -> Option<&Weight> {
        self.weights.first()
    }
}

/// How a mark rule decides whether it applies to a ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Inclusive lower bound on the ratio.
    AtLeast(f64),
    /// Any real ratio, however low. Catches everything below the numeric
    /// thresholds but still rejects NaN.
    AnyRealRatio,
    /// Matches anything, NaN included. The table's terminal rule.
    Unconditional,
}

impl Threshold {
    pub fn matches(self, ratio: f64) -> bool {
        match self {
            Threshold::AtLeast(min) => ratio >= min,
            Threshold::AnyRealRatio => !ratio.is_nan(),
            Threshold::Unconditional => true,
        }
    }

    pub fn is_unconditional(&self) -> bool {
        matches!(self, Threshold::Unconditional)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Unconditional
    }
}

// Wire encoding mirrors the data source: a number is an inclusive bound,
// an explicit null is "any real ratio", an absent field is unconditional.
fn threshold_ser<S: Serializer>(t: &Threshold, ser: S) -> Result<S::Ok, S::Error> {
    match t {
        Threshold::AtLeast(v) => ser.serialize_some(v),
        Threshold::AnyRealRatio | Threshold::Unconditional => ser.serialize_none(),
    }
}

fn threshold_de<'de, D: Deserializer<'de>>(de: D) -> Result<Threshold, D::Error> {
    Ok(match Option::<f64>::deserialize(de)? {
        Some(v) => Threshold::AtLeast(v),
        None => Threshold::AnyRealRatio,
    })
}

/// One row of a grading policy: label, display color, threshold, GPA points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRule {
    pub mark: String,
    pub color: String,
    #[serde(
        rename = "ratioNeeded",
        default,
        serialize_with = "threshold_ser",
        deserialize_with = "threshold_de",
        skip_serializing_if = "Threshold::is_unconditional"
    )]
    pub threshold: Threshold,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wgpa_points: Option<f64>,
}

/// Ordered mark table. First matching rule wins; construction guarantees a
/// terminal unconditional rule so lookup is total.
#[derive(Debug, Clone)]
pub struct GradingPolicy {
    head: Vec<MarkRule>,
    fallback: MarkRule,
}

impl GradingPolicy {
    pub fn new(mut rules: Vec<MarkRule>) -> Result<Self, CalcError> {
        let Some(last) = rules.pop() else {
            return Err(CalcError::new("bad_policy", "mark table is empty"));
        };
        if !last.threshold.is_unconditional() {
            return Err(CalcError::new(
                "bad_policy",
                "mark table must end in an unconditional fallback rule",
            ));
        }
        Ok(Self {
            head: rules,
            fallback: last,
        })
    }

    pub fn get_mark(&self, ratio: f64) -> &MarkRule {
        self.head
            .iter()
            .find(|rule| rule.threshold.matches(ratio))
            .unwrap_or(&self.fallback)
    }

    pub fn rules(&self) -> impl Iterator<Item = &MarkRule> {
        self.head.iter().chain(std::iter::once(&self.fallback))
    }
}

/// Everything institution-specific in one place: the category weights, the
/// mark table, and the course-name markers that flag a weighted course.
#[derive(Debug, Clone)]
pub struct InstitutionProfile {
    pub id: String,
    pub weighting: WeightingPolicy,
    pub marking: GradingPolicy,
    pub weighted_markers: Vec<String>,
}

impl InstitutionProfile {
    /// Substring heuristic over the display name. Institution-specific and
    /// deliberately not smarter than the data it mimics; alternate
    /// institutions supply their own marker list.
    pub fn is_weighted_course(&self, course_name: &str) -> bool {
        self.weighted_markers
            .iter()
            .any(|marker| course_name.contains(marker.as_str()))
    }

    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "mcps" | "default" => Some(Self::mcps()),
            _ => None,
        }
    }

    /// The built-in default: a 90/10 two-category split with a five-tier
    /// A-E table and a terminal N/A rule.
    pub fn mcps() -> Self {
        let weighting = WeightingPolicy::new(vec![
            Weight {
                name: "All Tasks / Assessments".into(),
                colloquial: "All Tasks".into(),
                short: "AT".into(),
                weight: 0.9,
            },
            Weight {
                name: "Practice / Preparation".into(),
                colloquial: "Practice/Prep".into(),
                short: "PP".into(),
                weight: 0.1,
            },
        ]);

        let head = vec![
            MarkRule {
                mark: "A".into(),
                color: "var(--c-scale-5)".into(),
                threshold: Threshold::AtLeast(0.895),
                gpa_points: Some(4.0),
                wgpa_points: Some(5.0),
            },
            MarkRule {
                mark: "B".into(),
                color: "var(--c-scale-4)".into(),
                threshold: Threshold::AtLeast(0.795),
                gpa_points: Some(3.0),
                wgpa_points: Some(4.0),
            },
            MarkRule {
                mark: "C".into(),
                color: "var(--c-scale-3)".into(),
                threshold: Threshold::AtLeast(0.695),
                gpa_points: Some(2.0),
                wgpa_points: Some(3.0),
            },
            MarkRule {
                mark: "D".into(),
                color: "var(--c-scale-2)".into(),
                threshold: Threshold::AtLeast(0.595),
                gpa_points: Some(1.0),
                wgpa_points: Some(1.0),
            },
            MarkRule {
                mark: "E".into(),
                color: "var(--c-scale-1)".into(),
                threshold: Threshold::AnyRealRatio,
                gpa_points: Some(0.0),
                wgpa_points: Some(0.0),
            },
        ];
        let marking = GradingPolicy {
            head,
            fallback: MarkRule {
                mark: "N/A".into(),
                color: "var(--c-fg)".into(),
                threshold: Threshold::Unconditional,
                gpa_points: None,
                wgpa_points: None,
            },
        };

        Self {
            id: "mcps".into(),
            weighting,
            marking,
            weighted_markers: vec![
                "Honors".into(),
                "AP ".into(),
                "IB ".into(),
                "Adv ".into(),
                "Magnet".into(),
            ],
        }
    }
}

/// serde-facing profile shape accepted inline or from a policy file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default)]
    pub institution: Option<String>,
    pub weights: Vec<Weight>,
    pub mark_rules: Vec<MarkRule>,
    #[serde(default)]
    pub weighted_markers: Vec<String>,
}

impl PolicyConfig {
    pub fn build(self) -> Result<InstitutionProfile, CalcError> {
        Ok(InstitutionProfile {
            id: self.institution.unwrap_or_else(|| "custom".into()),
            weighting: WeightingPolicy::new(self.weights),
            marking: GradingPolicy::new(self.mark_rules)?,
            weighted_markers: self.weighted_markers,
        })
    }
}
