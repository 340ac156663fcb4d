use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }

    /// Portal landing route for this role.
    pub fn home_route(self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Faculty => "/faculty",
            Role::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Staff,
}

impl EntityKind {
    pub fn path_segment(self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Staff => "staff",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Student => "Student",
            EntityKind::Staff => "Staff",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Student => f.write_str("student"),
            EntityKind::Staff => f.write_str("staff"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "students" => Ok(EntityKind::Student),
            "staff" | "faculty" => Ok(EntityKind::Staff),
            other => Err(format!("unknown entity kind `{other}` (expected student or staff)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub institutional_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub roll_number: Option<String>,
    pub department: Option<String>,
    pub year: Option<u8>,
    pub dob: Option<String>,
    pub blood_group: Option<String>,
    pub parent_phone: Option<String>,
    pub personal_phone: Option<String>,
    pub personal_email: Option<String>,
    pub previous_school: Option<String>,
    pub current_cgpa: f64,
    pub academic_dna_score: f64,
    pub growth_index: f64,
    pub risk_level: String,
    pub career_readiness_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub semester: u8,
    pub subject: String,
    pub internal_marks: f64,
    pub external_marks: f64,
    pub attendance_percentage: f64,
    pub grade: Option<String>,
}

/// Server-computed AI metrics. `career_suggestions` and
/// `recommended_courses` are JSON documents serialized into strings; see
/// [`crate::insights`] for decoding them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiScores {
    pub student_id: Uuid,
    pub consistency_index: f64,
    pub performance_volatility: f64,
    pub cgpa_prediction: f64,
    pub risk_probability: f64,
    pub skill_gap_score: f64,
    pub career_suggestions: Option<String>,
    pub recommended_courses: Option<String>,
}

/// The 25 faculty rating metrics, in wire order.
pub const RATING_METRICS: [&str; 25] = [
    "technical_clarity",
    "problem_solving",
    "code_efficiency",
    "algorithm_knowledge",
    "debugging_skills",
    "concept_application",
    "mathematical_aptitude",
    "system_design",
    "documentation_quality",
    "test_coverage_awareness",
    "presentation_skills",
    "collaborative_spirit",
    "adaptability",
    "curiosity_level",
    "deadline_discipline",
    "resourcefulness",
    "critical_thinking",
    // The API spells it this way.
    "puncuality",
    "peer_mentoring",
    "leadership_potential",
    "ethical_awareness",
    "feedback_receptivity",
    "passion_for_field",
    "originality_of_ideas",
    "consistency_index",
];

/// Rating values keyed on the wire as `q{n}_{metric}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratings(pub [f64; 25]);

impl Ratings {
    pub fn uniform(value: f64) -> Self {
        Self([value; 25])
    }

    pub fn wire_key(index: usize) -> String {
        format!("q{}_{}", index + 1, RATING_METRICS[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        RATING_METRICS.iter().copied().zip(self.0.iter().copied())
    }
}

impl Default for Ratings {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

impl Serialize for Ratings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, value) in self.0.iter().enumerate() {
            map.serialize_entry(&Ratings::wire_key(index), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Ratings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut values = [0.0; 25];
        for (index, slot) in values.iter_mut().enumerate() {
            if let Some(value) = raw.get(&Ratings::wire_key(index)) {
                *slot = value.as_f64().ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "{} must be a number",
                        Ratings::wire_key(index)
                    ))
                })?;
            }
        }
        Ok(Ratings(values))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub student_id: Uuid,
    pub faculty_id: Uuid,
    pub overall_rating: f64,
    pub created_at: String,
    pub detailed_remarks: Option<String>,
    #[serde(flatten)]
    pub ratings: Ratings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub user: User,
    #[serde(default)]
    pub academic_records: Vec<AcademicRecord>,
    pub ai_scores: Option<AiScores>,
    #[serde(default)]
    pub feedback: Vec<Feedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub user_id: Uuid,
    pub staff_id: Option<String>,
    pub name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub be_degree: Option<String>,
    pub be_college: Option<String>,
    pub me_degree: Option<String>,
    pub me_college: Option<String>,
    pub primary_skill: Option<String>,
    #[serde(default)]
    pub projects_completed: u32,
    #[serde(default)]
    pub publications_count: u32,
    #[serde(default)]
    pub consistency_score: f64,
    #[serde(default)]
    pub student_feedback_rating: f64,
    pub personal_email: Option<String>,
    pub personal_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffDetail {
    #[serde(flatten)]
    pub staff: Staff,
    pub user: User,
}

/// One row of the admin directory.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryEntry {
    Student(Student),
    Staff(Staff),
}

impl DirectoryEntry {
    pub fn id(&self) -> Uuid {
        match self {
            DirectoryEntry::Student(s) => s.id,
            DirectoryEntry::Staff(s) => s.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            DirectoryEntry::Student(_) => EntityKind::Student,
            DirectoryEntry::Staff(_) => EntityKind::Staff,
        }
    }

    pub fn display_name(&self) -> &str {
        let name = match self {
            DirectoryEntry::Student(s) => s.name.as_deref(),
            DirectoryEntry::Staff(s) => s.name.as_deref(),
        };
        name.unwrap_or("Unnamed")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub task_name: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
    pub is_completed: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoCreate {
    pub task_name: String,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TodoToggle {
    pub message: String,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanDay {
    pub id: Uuid,
    pub day_number: u32,
    pub topic: String,
    pub sub_tasks: Option<String>,
    pub is_completed: bool,
    pub actual_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalStats {
    pub total_students: u32,
    pub active_students: u32,
    pub placement_readiness_avg: f64,
    pub dna_score: f64,
    pub risk_ratio: f64,
    pub avg_growth_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyWarningStats {
    pub high_risk_count: u32,
    pub medium_risk_count: u32,
    pub low_risk_percent: f64,
    pub dropout_probability_next_6m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCluster {
    pub name: String,
    pub count: u32,
    pub percentage: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentRank {
    pub department: String,
    pub avg_cgpa: f64,
    pub avg_growth: f64,
    pub placement_readiness: f64,
    pub skill_score: f64,
    pub risk_percent: f64,
    pub overall_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementForecast {
    pub forecast_placement_percent: f64,
    pub core_vs_it_ratio: String,
    pub avg_career_readiness: f64,
    pub skill_gap_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyImpact {
    pub name: String,
    pub dept: String,
    pub feedback_consistency: f64,
    pub improvement_impact: f64,
    pub impact_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOptimization {
    pub faculty_load_percent: f64,
    pub lab_utilization_percent: f64,
    pub remedial_need_percent: f64,
    pub coaching_demand: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledDetail {
    pub label: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapStep {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub executive_summary: String,
    pub roi_efficiency: String,
    pub strategies: Vec<LabeledDetail>,
    pub resource_label: String,
    pub resource_value: String,
    pub roadmap: Vec<RoadmapStep>,
    pub insight_quote: String,
}

/// Snapshot behind the admin dashboard. Fetched once per load and never
/// modified client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalOverview {
    pub institutional: InstitutionalStats,
    pub early_warning: EarlyWarningStats,
    pub performance_clusters: Vec<PerformanceCluster>,
    pub department_ranking: Vec<DepartmentRank>,
    pub placement_forecast: PlacementForecast,
    pub faculty_impact: Vec<FacultyImpact>,
    pub resource_opt: ResourceOptimization,
    pub weekly_insight: String,
    pub action_plan: ActionPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// The API derives the real role from the email domain.
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentCreate {
    pub full_name: String,
    pub personal_email: String,
    pub password: String,
    pub department: String,
    pub year: u8,
    pub dob: String,
    pub blood_group: String,
    pub parent_phone: String,
    pub personal_phone: String,
    pub previous_school: Option<String>,
    pub current_cgpa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffCreate {
    pub full_name: String,
    pub personal_email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    pub department: String,
    pub designation: String,
    pub personal_phone: Option<String>,
    pub primary_skill: Option<String>,
    pub be_degree: Option<String>,
    pub me_degree: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackCreate {
    pub student_id: Uuid,
    #[serde(flatten)]
    pub ratings: Ratings,
    pub detailed_remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackReceipt {
    pub message: String,
    pub overall_rating: f64,
}
