use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One mark row as fetched for a class. `percentage` is nullable in the
/// store; see `effective_percentage` for the coercion policy.
#[derive(Debug, Clone)]
pub struct MarkRecord {
    pub student_id: String,
    pub subject_id: String,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceBand {
    pub name: &'static str,
    pub students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectPerformance {
    pub subject_id: String,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassAnalytics {
    pub total_students: usize,
    pub average_score: f64,
    pub below_average_count: usize,
    pub improvement_rate: f64,
    pub performance_distribution: Vec<PerformanceBand>,
    pub subject_performance: Vec<SubjectPerformance>,
    pub total_marks: usize,
}

impl ClassAnalytics {
    fn empty() -> Self {
        ClassAnalytics {
            total_students: 0,
            average_score: 0.0,
            below_average_count: 0,
            improvement_rate: 0.0,
            performance_distribution: Vec::new(),
            subject_performance: Vec::new(),
            total_marks: 0,
        }
    }
}

/// `round(100*x) / 100`, applied to every reported average.
pub fn round_to_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Coercion policy: a missing or non-finite percentage counts as 0 and
/// stays in the mean. Incomplete marks drag a class average down rather
/// than vanish from it.
fn effective_percentage(p: Option<f64>) -> f64 {
    match p {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

const BAND_NAMES: [&str; 4] = [
    "Excellent (80-100)",
    "Good (60-80)",
    "Average (40-60)",
    "Below Average (0-40)",
];

fn band_index(p: f64) -> usize {
    if p >= 80.0 {
        0
    } else if p >= 60.0 {
        1
    } else if p >= 40.0 {
        2
    } else {
        3
    }
}

/// Class dashboard summary over the raw mark rows of one class.
///
/// Total over any input: an empty list yields the all-zero summary with
/// empty band and subject lists, while any non-empty list reports all
/// four bands even at zero so charts can render every category.
/// Band membership uses the raw percentage; rounding applies only to
/// the reported averages. `improvement_rate` is a wire-compat stub held
/// at 0 until marks carry more than one assessment period.
pub fn class_analytics(marks: &[MarkRecord]) -> ClassAnalytics {
    if marks.is_empty() {
        return ClassAnalytics::empty();
    }

    let mut sum = 0.0_f64;
    let mut below_average_count = 0usize;
    let mut band_counts = [0usize; 4];
    let mut students: HashSet<&str> = HashSet::new();

    // Subject groups keep first-occurrence order.
    let mut subject_order: Vec<&str> = Vec::new();
    let mut subject_acc: HashMap<&str, (f64, usize)> = HashMap::new();

    for mark in marks {
        let p = effective_percentage(mark.percentage);
        sum += p;
        if p < 50.0 {
            below_average_count += 1;
        }
        band_counts[band_index(p)] += 1;
        students.insert(mark.student_id.as_str());

        let entry = subject_acc.entry(mark.subject_id.as_str()).or_insert_with(|| {
            subject_order.push(mark.subject_id.as_str());
            (0.0, 0)
        });
        entry.0 += p;
        entry.1 += 1;
    }

    let performance_distribution = BAND_NAMES
        .iter()
        .zip(band_counts.iter())
        .map(|(name, students)| PerformanceBand {
            name: *name,
            students: *students,
        })
        .collect();

    let subject_performance = subject_order
        .iter()
        .map(|sid| {
            let (subj_sum, count) = subject_acc[sid];
            SubjectPerformance {
                subject_id: (*sid).to_string(),
                average: round_to_2dp(subj_sum / count as f64),
                count,
            }
        })
        .collect();

    ClassAnalytics {
        total_students: students.len(),
        average_score: round_to_2dp(sum / marks.len() as f64),
        below_average_count,
        improvement_rate: 0.0,
        performance_distribution,
        subject_performance,
        total_marks: marks.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(student: &str, subject: &str, pct: impl Into<Option<f64>>) -> MarkRecord {
        MarkRecord {
            student_id: student.to_string(),
            subject_id: subject.to_string(),
            percentage: pct.into(),
        }
    }

    #[test]
    fn empty_input_yields_all_zero_summary() {
        let out = class_analytics(&[]);
        assert_eq!(out.total_students, 0);
        assert_eq!(out.average_score, 0.0);
        assert_eq!(out.below_average_count, 0);
        assert_eq!(out.total_marks, 0);
        assert!(out.performance_distribution.is_empty());
        assert!(out.subject_performance.is_empty());
    }

    #[test]
    fn class_summary_matches_hand_computed_scenario() {
        let marks = vec![
            rec("s1", "m", 90.0),
            rec("s1", "e", 55.0),
            rec("s2", "m", 30.0),
        ];
        let out = class_analytics(&marks);

        assert_eq!(out.total_students, 2);
        assert_eq!(out.average_score, 58.33);
        assert_eq!(out.below_average_count, 1);
        assert_eq!(out.improvement_rate, 0.0);
        assert_eq!(out.total_marks, 3);

        let counts: Vec<(&str, usize)> = out
            .performance_distribution
            .iter()
            .map(|b| (b.name, b.students))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("Excellent (80-100)", 1),
                ("Good (60-80)", 0),
                ("Average (40-60)", 1),
                ("Below Average (0-40)", 1),
            ]
        );

        // Subject order is first occurrence, not alphabetical.
        assert_eq!(
            out.subject_performance,
            vec![
                SubjectPerformance {
                    subject_id: "m".to_string(),
                    average: 60.0,
                    count: 2,
                },
                SubjectPerformance {
                    subject_id: "e".to_string(),
                    average: 55.0,
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn band_boundaries_are_half_open() {
        let marks = vec![
            rec("s1", "m", 80.0),
            rec("s2", "m", 79.999),
            rec("s3", "m", 40.0),
            rec("s4", "m", 39.999),
        ];
        let out = class_analytics(&marks);
        let counts: Vec<usize> = out
            .performance_distribution
            .iter()
            .map(|b| b.students)
            .collect();
        assert_eq!(counts, vec![1, 1, 1, 1]);
    }

    #[test]
    fn band_counts_sum_to_total_marks() {
        let marks = vec![
            rec("s1", "m", 0.0),
            rec("s2", "m", 100.0),
            rec("s3", "e", 50.0),
            rec("s4", "e", None),
            rec("s5", "sci", 60.0),
        ];
        let out = class_analytics(&marks);
        let banded: usize = out
            .performance_distribution
            .iter()
            .map(|b| b.students)
            .sum();
        assert_eq!(banded, out.total_marks);
        assert_eq!(out.total_marks, marks.len());
    }

    #[test]
    fn missing_percentage_counts_as_zero_in_mean_and_bottom_band() {
        let marks = vec![rec("s1", "m", 100.0), rec("s2", "m", None)];
        let out = class_analytics(&marks);
        assert_eq!(out.average_score, 50.0);
        assert_eq!(out.below_average_count, 1);
        assert_eq!(out.performance_distribution[3].students, 1);
        assert_eq!(out.subject_performance[0].average, 50.0);
    }

    #[test]
    fn nan_percentage_coerces_to_zero() {
        let marks = vec![rec("s1", "m", f64::NAN), rec("s2", "m", 80.0)];
        let out = class_analytics(&marks);
        assert_eq!(out.average_score, 40.0);
        assert_eq!(out.performance_distribution[3].students, 1);
    }

    #[test]
    fn total_students_dedupes_across_subjects_and_order() {
        let marks = vec![
            rec("s2", "e", 70.0),
            rec("s1", "m", 90.0),
            rec("s1", "e", 10.0),
            rec("s2", "m", 70.0),
            rec("s1", "sci", 45.0),
        ];
        let out = class_analytics(&marks);
        assert_eq!(out.total_students, 2);

        let mut shuffled = marks.clone();
        shuffled.reverse();
        assert_eq!(class_analytics(&shuffled).total_students, 2);
    }

    #[test]
    fn same_input_twice_yields_identical_output() {
        let marks = vec![
            rec("s1", "m", 61.5),
            rec("s2", "m", 48.25),
            rec("s3", "e", 92.0),
        ];
        assert_eq!(class_analytics(&marks), class_analytics(&marks));
    }

    #[test]
    fn average_stays_within_percentage_range() {
        let marks = vec![
            rec("s1", "m", 0.0),
            rec("s2", "m", 100.0),
            rec("s3", "m", 33.333),
        ];
        let out = class_analytics(&marks);
        assert!(out.average_score >= 0.0 && out.average_score <= 100.0);
        assert_eq!(out.average_score, 44.44);
    }
}
