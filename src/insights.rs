//! Display models for the AI insight fields. Everything here reshapes
//! server-provided values; nothing is scored client-side.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{AcademicRecord, Staff, StudentDetail};

/// An embedded JSON document that may be absent or malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedded<T> {
    Missing,
    Parsed(T),
    /// The server sent something that is not valid JSON for `T`; shown verbatim.
    Raw(String),
}

impl<T> Embedded<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Embedded::Parsed(value) => Some(value),
            _ => None,
        }
    }
}

pub fn decode_embedded<T: DeserializeOwned>(raw: Option<&str>) -> Embedded<T> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Embedded::Missing;
    };
    match serde_json::from_str(raw) {
        Ok(value) => Embedded::Parsed(value),
        Err(err) => {
            tracing::debug!(error = %err, "embedded insight is not valid JSON, showing raw text");
            Embedded::Raw(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CareerMatch {
    Scored {
        role: String,
        fit: Option<String>,
        icon: Option<String>,
    },
    Title(String),
}

impl CareerMatch {
    pub fn role(&self) -> &str {
        match self {
            CareerMatch::Scored { role, .. } => role,
            CareerMatch::Title(title) => title,
        }
    }

    pub fn fit(&self) -> Option<&str> {
        match self {
            CareerMatch::Scored { fit, .. } => fit.as_deref(),
            CareerMatch::Title(_) => None,
        }
    }
}

/// The career compass comes in two shapes: a list of matches, or a single
/// path summary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CareerSuggestions {
    Matches(Vec<CareerMatch>),
    Path {
        primary_path: Option<String>,
        growth_potential: Option<String>,
    },
}

impl CareerSuggestions {
    pub fn primary_path(&self) -> &str {
        let path = match self {
            CareerSuggestions::Matches(matches) => matches.first().map(CareerMatch::role),
            CareerSuggestions::Path { primary_path, .. } => primary_path.as_deref(),
        };
        path.unwrap_or("Standard Path")
    }

    pub fn growth_potential(&self) -> &str {
        match self {
            CareerSuggestions::Path {
                growth_potential: Some(growth),
                ..
            } => growth,
            _ => "High",
        }
    }

    pub fn matches(&self) -> &[CareerMatch] {
        match self {
            CareerSuggestions::Matches(matches) => matches,
            CareerSuggestions::Path { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecommendedCourses {
    #[serde(default)]
    pub strong: Vec<String>,
    #[serde(default)]
    pub weak: Vec<String>,
}

/// Decoded AI insight strings for one student.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentInsights {
    pub career: Embedded<CareerSuggestions>,
    pub courses: Embedded<RecommendedCourses>,
}

impl StudentInsights {
    pub fn from_detail(detail: &StudentDetail) -> Self {
        let scores = detail.ai_scores.as_ref();
        Self {
            career: decode_embedded(scores.and_then(|s| s.career_suggestions.as_deref())),
            courses: decode_embedded(scores.and_then(|s| s.recommended_courses.as_deref())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadarAxis {
    pub label: &'static str,
    pub value: f64,
}

pub const RADAR_FULL_MARK: f64 = 100.0;

/// Puts server metrics on a common 0..100 scale for the skill radar.
pub fn skill_radar(detail: &StudentDetail) -> Vec<RadarAxis> {
    let scores = detail.ai_scores.as_ref();
    let student = &detail.student;
    let axes = [
        (
            "Consistency",
            scores.map_or(0.0, |s| s.consistency_index) * 100.0,
        ),
        ("Performance", student.academic_dna_score),
        ("Growth", student.growth_index * 20.0),
        ("Readiness", student.career_readiness_score),
        ("Skill Gap", scores.map_or(0.0, |s| s.skill_gap_score)),
    ];
    axes.into_iter()
        .map(|(label, value)| RadarAxis {
            label,
            value: value.clamp(0.0, RADAR_FULL_MARK),
        })
        .collect()
}

/// Faculty metrics on the same 0..100 scale. Counts saturate: 25 projects or
/// 13 publications fill their axis.
pub fn staff_radar(staff: &Staff) -> Vec<RadarAxis> {
    let axes = [
        ("Consistency", staff.consistency_score * 100.0),
        ("Feedback", staff.student_feedback_rating * 20.0),
        ("Projects", f64::from(staff.projects_completed) * 4.0),
        ("Publications", f64::from(staff.publications_count) * 8.0),
    ];
    axes.into_iter()
        .map(|(label, value)| RadarAxis {
            label,
            value: value.clamp(0.0, RADAR_FULL_MARK),
        })
        .collect()
}

/// Academic records ordered by semester, then subject, for trend charts.
pub fn semester_trend(detail: &StudentDetail) -> Vec<&AcademicRecord> {
    let mut records: Vec<&AcademicRecord> = detail.academic_records.iter().collect();
    records.sort_by(|a, b| {
        a.semester
            .cmp(&b.semester)
            .then_with(|| a.subject.cmp(&b.subject))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AiScores, Role, Student, User};
    use uuid::Uuid;

    fn detail(career: Option<&str>, courses: Option<&str>) -> StudentDetail {
        let id = Uuid::new_v4();
        StudentDetail {
            student: Student {
                id,
                user_id: Uuid::new_v4(),
                name: Some("Asha Rao".to_string()),
                roll_number: None,
                department: Some("CSE".to_string()),
                year: Some(2),
                dob: None,
                blood_group: None,
                parent_phone: None,
                personal_phone: None,
                personal_email: None,
                previous_school: None,
                current_cgpa: 8.4,
                academic_dna_score: 72.0,
                growth_index: 6.0,
                risk_level: "Low".to_string(),
                career_readiness_score: 64.0,
            },
            user: User {
                email: "asha.cse24@gmail.com".to_string(),
                role: Role::Student,
                full_name: Some("Asha Rao".to_string()),
                institutional_email: None,
            },
            academic_records: Vec::new(),
            ai_scores: Some(AiScores {
                student_id: id,
                consistency_index: 0.82,
                performance_volatility: 0.1,
                cgpa_prediction: 8.6,
                risk_probability: 0.1,
                skill_gap_score: 18.0,
                career_suggestions: career.map(str::to_string),
                recommended_courses: courses.map(str::to_string),
            }),
            feedback: Vec::new(),
        }
    }

    #[test]
    fn malformed_career_json_falls_back_to_raw_text() {
        let insights = StudentInsights::from_detail(&detail(Some("{bad json"), None));
        assert_eq!(insights.career, Embedded::Raw("{bad json".to_string()));
        assert_eq!(insights.courses, Embedded::Missing);
    }

    #[test]
    fn career_matches_decode_with_fit() {
        let raw = r#"[{"role":"AI Engineer","fit":"85% Match","icon":"*"},{"role":"Data Scientist","fit":"80% Match"}]"#;
        let insights = StudentInsights::from_detail(&detail(Some(raw), None));
        let career = insights.career.parsed().expect("parsed");
        assert_eq!(career.primary_path(), "AI Engineer");
        assert_eq!(career.matches()[1].fit(), Some("80% Match"));
        assert_eq!(career.growth_potential(), "High");
    }

    #[test]
    fn career_path_summary_and_title_lists_decode() {
        let summary: Embedded<CareerSuggestions> =
            decode_embedded(Some(r#"{"primary_path":"Robotics","growth_potential":"Steady"}"#));
        let summary = summary.parsed().expect("parsed");
        assert_eq!(summary.primary_path(), "Robotics");
        assert_eq!(summary.growth_potential(), "Steady");

        let titles: Embedded<CareerSuggestions> = decode_embedded(Some(r#"["Urban Planner"]"#));
        assert_eq!(titles.parsed().expect("parsed").primary_path(), "Urban Planner");

        let empty: Embedded<CareerSuggestions> = decode_embedded(Some("[]"));
        assert_eq!(empty.parsed().expect("parsed").primary_path(), "Standard Path");
    }

    #[test]
    fn courses_default_missing_lists() {
        let courses: Embedded<RecommendedCourses> =
            decode_embedded(Some(r#"{"strong":["DBMS","OS"]}"#));
        let courses = courses.parsed().expect("parsed");
        assert_eq!(courses.strong, vec!["DBMS", "OS"]);
        assert!(courses.weak.is_empty());
    }

    #[test]
    fn radar_scales_and_clamps_server_values() {
        let radar = skill_radar(&detail(None, None));
        let values: Vec<(&str, f64)> = radar.iter().map(|a| (a.label, a.value)).collect();
        assert_eq!(values[0].0, "Consistency");
        assert!((values[0].1 - 82.0).abs() < 1e-9);
        assert_eq!(values[2], ("Growth", 100.0));
        assert_eq!(values[4], ("Skill Gap", 18.0));
    }

    #[test]
    fn staff_radar_scales_and_caps_counts() {
        let staff = Staff {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            staff_id: Some("STF-07".to_string()),
            name: Some("Meera Iyer".to_string()),
            department: Some("ECE".to_string()),
            designation: Some("Professor".to_string()),
            be_degree: None,
            be_college: None,
            me_degree: None,
            me_college: None,
            primary_skill: None,
            projects_completed: 10,
            publications_count: 20,
            consistency_score: 0.9,
            student_feedback_rating: 4.5,
            personal_email: None,
            personal_phone: None,
        };
        let radar: Vec<(&str, f64)> = staff_radar(&staff)
            .iter()
            .map(|axis| (axis.label, axis.value))
            .collect();
        assert_eq!(radar.len(), 4);
        assert!((radar[0].1 - 90.0).abs() < 1e-9);
        assert_eq!(radar[1], ("Feedback", 90.0));
        assert_eq!(radar[2], ("Projects", 40.0));
        assert_eq!(radar[3], ("Publications", 100.0));
    }
}
