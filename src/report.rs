use std::fmt::Write;

use crate::directory::{DirectoryView, NoticeLevel, Phase};
use crate::forms::year_batch;
use crate::insights::{
    semester_trend, skill_radar, staff_radar, Embedded, StudentInsights, RADAR_FULL_MARK,
};
use crate::modal::{Modal, Viewport};
use crate::models::{
    DirectoryEntry, InstitutionalOverview, Staff, StaffDetail, Student, StudentDetail,
    StudyPlanDay, Todo,
};

const MODAL_WIDTH: usize = 72;

fn or_dash(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "-",
    }
}

pub fn render_overview(overview: Option<&InstitutionalOverview>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Institutional Overview");

    let Some(overview) = overview else {
        let _ = writeln!(output, "No institutional data available yet.");
        return output;
    };

    let stats = &overview.institutional;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Institution");
    let _ = writeln!(
        output,
        "- Students: {} total, {} active",
        stats.total_students, stats.active_students
    );
    let _ = writeln!(output, "- Academic DNA score: {:.1}", stats.dna_score);
    let _ = writeln!(
        output,
        "- Placement readiness: {:.1}%",
        stats.placement_readiness_avg
    );
    let _ = writeln!(output, "- Average growth index: {:.2}", stats.avg_growth_index);
    let _ = writeln!(output, "- Risk ratio: {:.1}%", stats.risk_ratio);

    let warning = &overview.early_warning;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Early Warning");
    let _ = writeln!(
        output,
        "- {} high risk, {} medium risk, {:.1}% low risk",
        warning.high_risk_count, warning.medium_risk_count, warning.low_risk_percent
    );
    let _ = writeln!(
        output,
        "- Dropout probability (next 6 months): {:.1}%",
        warning.dropout_probability_next_6m
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance Clusters");
    if overview.performance_clusters.is_empty() {
        let _ = writeln!(output, "No clusters reported.");
    } else {
        for cluster in &overview.performance_clusters {
            let _ = writeln!(
                output,
                "- {}: {} students ({:.1}%) {}",
                cluster.name, cluster.count, cluster.percentage, cluster.description
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Department Ranking");
    if overview.department_ranking.is_empty() {
        let _ = writeln!(output, "No departments ranked.");
    } else {
        let mut ranking: Vec<_> = overview.department_ranking.iter().collect();
        ranking.sort_by_key(|rank| rank.overall_rank);
        for rank in ranking {
            let _ = writeln!(
                output,
                "{}. {} CGPA {:.2}, growth {:.2}, readiness {:.1}%, skill {:.1}, risk {:.1}%",
                rank.overall_rank,
                rank.department,
                rank.avg_cgpa,
                rank.avg_growth,
                rank.placement_readiness,
                rank.skill_score,
                rank.risk_percent
            );
        }
    }

    let forecast = &overview.placement_forecast;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Placement Forecast");
    let _ = writeln!(
        output,
        "- Forecast placement: {:.1}%",
        forecast.forecast_placement_percent
    );
    let _ = writeln!(output, "- Core vs IT: {}", forecast.core_vs_it_ratio);
    let _ = writeln!(
        output,
        "- Career readiness {:.1}, skill gap {:.1}",
        forecast.avg_career_readiness, forecast.skill_gap_avg
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Faculty Impact");
    if overview.faculty_impact.is_empty() {
        let _ = writeln!(output, "No faculty impact data.");
    } else {
        for faculty in &overview.faculty_impact {
            let _ = writeln!(
                output,
                "- {} ({}) impact {:.1}, consistency {:.1}, improvement {:.1}",
                faculty.name,
                faculty.dept,
                faculty.impact_score,
                faculty.feedback_consistency,
                faculty.improvement_impact
            );
        }
    }

    let resources = &overview.resource_opt;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Resources");
    let _ = writeln!(
        output,
        "- Faculty load {:.1}%, lab utilization {:.1}%, remedial need {:.1}%",
        resources.faculty_load_percent,
        resources.lab_utilization_percent,
        resources.remedial_need_percent
    );
    let _ = writeln!(output, "- Coaching demand: {}", resources.coaching_demand);

    if !overview.weekly_insight.trim().is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "> {}", overview.weekly_insight);
    }

    output
}

/// The strategic action plan, framed as an overlay.
pub fn render_action_plan(viewport: &Viewport, overview: &InstitutionalOverview) -> String {
    let plan = &overview.action_plan;
    let mut body = String::new();

    let _ = writeln!(body, "{}", plan.executive_summary);
    let _ = writeln!(body, "ROI efficiency: {}", plan.roi_efficiency);
    let _ = writeln!(body);
    let _ = writeln!(body, "Strategies:");
    if plan.strategies.is_empty() {
        let _ = writeln!(body, "none");
    }
    for strategy in &plan.strategies {
        let _ = writeln!(body, "* {}: {}", strategy.label, strategy.detail);
    }
    let _ = writeln!(body, "{}: {}", plan.resource_label, plan.resource_value);
    let _ = writeln!(body);
    let _ = writeln!(body, "Roadmap:");
    if plan.roadmap.is_empty() {
        let _ = writeln!(body, "none");
    }
    for (index, step) in plan.roadmap.iter().enumerate() {
        let _ = writeln!(body, "{}. {}: {}", index + 1, step.title, step.detail);
    }
    if !plan.insight_quote.trim().is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "\"{}\"", plan.insight_quote);
    }

    let modal = Modal::open(
        viewport,
        "Strategic Action Plan",
        Some("Generated from the latest institutional overview".to_string()),
    );
    modal.render(&body, MODAL_WIDTH)
}

fn write_student_line(output: &mut String, student: &Student) {
    let _ = writeln!(
        output,
        "- {} [{}] {} year {} CGPA {:.2}, risk {} ({})",
        or_dash(student.name.as_deref()),
        or_dash(student.roll_number.as_deref()),
        or_dash(student.department.as_deref()),
        student.year.map_or_else(|| "-".to_string(), |y| y.to_string()),
        student.current_cgpa,
        student.risk_level,
        student.id
    );
}

fn write_staff_line(output: &mut String, staff: &Staff) {
    let _ = writeln!(
        output,
        "- {} [{}] {} {}, rating {:.1} ({})",
        or_dash(staff.name.as_deref()),
        or_dash(staff.staff_id.as_deref()),
        or_dash(staff.designation.as_deref()),
        or_dash(staff.department.as_deref()),
        staff.student_feedback_rating,
        staff.id
    );
}

/// Student list; a year filter adds its batch to the heading.
pub fn render_students(students: &[Student], year: Option<u8>) -> String {
    let mut output = String::new();
    match year.and_then(|year| year_batch(year).map(|batch| (year, batch))) {
        Some((year, batch)) => {
            let _ = writeln!(output, "## Students: year {year} (batch {batch})");
        }
        None => {
            let _ = writeln!(output, "## Students");
        }
    }
    if students.is_empty() {
        let _ = writeln!(output, "No students found.");
    }
    for student in students {
        write_student_line(&mut output, student);
    }
    output
}

pub fn render_staff_list(staff: &[Staff]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Staff");
    if staff.is_empty() {
        let _ = writeln!(output, "No staff found.");
    }
    for member in staff {
        write_staff_line(&mut output, member);
    }
    output
}

pub fn render_student_detail(detail: &StudentDetail) -> String {
    let student = &detail.student;
    let mut output = String::new();

    let _ = writeln!(output, "# {}", or_dash(student.name.as_deref()));
    let _ = writeln!(output, "- Email: {}", detail.user.email);
    if let Some(institutional) = &detail.user.institutional_email {
        let _ = writeln!(output, "- Institutional email: {institutional}");
    }
    let _ = writeln!(
        output,
        "- Roll number: {}",
        or_dash(student.roll_number.as_deref())
    );
    let _ = writeln!(
        output,
        "- Department: {}, year {}",
        or_dash(student.department.as_deref()),
        student.year.map_or_else(|| "-".to_string(), |y| y.to_string())
    );
    let _ = writeln!(
        output,
        "- CGPA {:.2}, DNA {:.1}, growth {:.2}, readiness {:.1}, risk {}",
        student.current_cgpa,
        student.academic_dna_score,
        student.growth_index,
        student.career_readiness_score,
        student.risk_level
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## AI Scores");
    match &detail.ai_scores {
        None => {
            let _ = writeln!(output, "No AI scores yet.");
        }
        Some(scores) => {
            let _ = writeln!(
                output,
                "- Predicted CGPA {:.2}, risk probability {:.0}%, volatility {:.2}",
                scores.cgpa_prediction,
                scores.risk_probability * 100.0,
                scores.performance_volatility
            );
        }
    }

    let insights = StudentInsights::from_detail(detail);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Career Compass");
    match &insights.career {
        Embedded::Missing => {
            let _ = writeln!(output, "No career suggestions.");
        }
        Embedded::Raw(raw) => {
            let _ = writeln!(output, "{raw}");
        }
        Embedded::Parsed(career) => {
            let _ = writeln!(
                output,
                "- Primary path: {} (growth {})",
                career.primary_path(),
                career.growth_potential()
            );
            for suggestion in career.matches() {
                match suggestion.fit() {
                    Some(fit) => {
                        let _ = writeln!(output, "- {}: {}", suggestion.role(), fit);
                    }
                    None => {
                        let _ = writeln!(output, "- {}", suggestion.role());
                    }
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Courses");
    match &insights.courses {
        Embedded::Missing => {
            let _ = writeln!(output, "No course recommendations.");
        }
        Embedded::Raw(raw) => {
            let _ = writeln!(output, "{raw}");
        }
        Embedded::Parsed(courses) => {
            let strong = if courses.strong.is_empty() {
                "none".to_string()
            } else {
                courses.strong.join(", ")
            };
            let weak = if courses.weak.is_empty() {
                "none".to_string()
            } else {
                courses.weak.join(", ")
            };
            let _ = writeln!(output, "- Strong: {strong}");
            let _ = writeln!(output, "- Needs work: {weak}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Skill Radar");
    for axis in skill_radar(detail) {
        let _ = writeln!(
            output,
            "- {:<12} {:>5.1} / {}",
            axis.label, axis.value, RADAR_FULL_MARK
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Semester Trend");
    let trend = semester_trend(detail);
    if trend.is_empty() {
        let _ = writeln!(output, "No academic records.");
    }
    for record in trend {
        let _ = writeln!(
            output,
            "- S{} {}: internal {:.0}, external {:.0}, attendance {:.0}%, grade {}",
            record.semester,
            record.subject,
            record.internal_marks,
            record.external_marks,
            record.attendance_percentage,
            or_dash(record.grade.as_deref())
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feedback");
    if detail.feedback.is_empty() {
        let _ = writeln!(output, "No feedback recorded.");
    }
    for feedback in &detail.feedback {
        let _ = writeln!(
            output,
            "- {} overall {:.1}: {}",
            feedback.created_at,
            feedback.overall_rating,
            or_dash(feedback.detailed_remarks.as_deref())
        );
    }

    output
}

pub fn render_staff_detail(detail: &StaffDetail) -> String {
    let mut output = String::new();
    write_staff_profile(&mut output, &detail.staff);
    let _ = writeln!(output, "- Email: {}", detail.user.email);
    output
}

pub fn render_staff_profile(staff: &Staff) -> String {
    let mut output = String::new();
    write_staff_profile(&mut output, staff);
    output
}

fn write_staff_profile(output: &mut String, staff: &Staff) {
    let _ = writeln!(output, "# {}", or_dash(staff.name.as_deref()));
    let _ = writeln!(
        output,
        "- {} of {} [{}]",
        or_dash(staff.designation.as_deref()),
        or_dash(staff.department.as_deref()),
        or_dash(staff.staff_id.as_deref())
    );
    let _ = writeln!(
        output,
        "- Degrees: BE {} ({}), ME {} ({})",
        or_dash(staff.be_degree.as_deref()),
        or_dash(staff.be_college.as_deref()),
        or_dash(staff.me_degree.as_deref()),
        or_dash(staff.me_college.as_deref())
    );
    let _ = writeln!(
        output,
        "- Primary skill: {}",
        or_dash(staff.primary_skill.as_deref())
    );
    let _ = writeln!(
        output,
        "- {} projects, {} publications, consistency {:.1}, feedback rating {:.1}",
        staff.projects_completed,
        staff.publications_count,
        staff.consistency_score,
        staff.student_feedback_rating
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Metric Radar");
    for axis in staff_radar(staff) {
        let _ = writeln!(
            output,
            "- {:<12} {:>5.1} / {}",
            axis.label, axis.value, RADAR_FULL_MARK
        );
    }
}

pub fn render_directory(view: &DirectoryView) -> String {
    let mut output = String::new();
    let query = if view.query.is_empty() {
        "all"
    } else {
        view.query.as_str()
    };
    let status = match view.phase {
        Phase::Idle => "",
        Phase::Debouncing => " (typing)",
        Phase::Fetching => " (searching)",
    };
    let _ = writeln!(
        output,
        "## {} directory: {}{}",
        view.kind.label(),
        query,
        status
    );

    if let Some(notice) = &view.notice {
        let prefix = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        let _ = writeln!(output, "[{prefix}] {}", notice.message);
    }

    if view.entries.is_empty() {
        let _ = writeln!(output, "No matching records.");
    }
    for entry in &view.entries {
        match entry {
            DirectoryEntry::Student(student) => write_student_line(&mut output, student),
            DirectoryEntry::Staff(staff) => write_staff_line(&mut output, staff),
        }
    }
    output
}

pub fn render_todos(todos: &[Todo]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Todos");
    if todos.is_empty() {
        let _ = writeln!(output, "No todos yet.");
    }
    for todo in todos {
        let mark = if todo.is_completed { "x" } else { " " };
        let due = todo
            .due_date
            .map(|d| format!(" due {d}"))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "- [{mark}] {} ({}){} {}",
            todo.task_name, todo.priority, due, todo.id
        );
    }
    output
}

pub fn render_study_plan(days: &[StudyPlanDay]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Study Plan");
    if days.is_empty() {
        let _ = writeln!(output, "No study plan generated.");
    }
    let mut days: Vec<&StudyPlanDay> = days.iter().collect();
    days.sort_by_key(|day| day.day_number);
    for day in days {
        let mark = if day.is_completed { "x" } else { " " };
        let _ = writeln!(output, "- [{mark}] Day {}: {}", day.day_number, day.topic);
        if let Some(tasks) = day.sub_tasks.as_deref().filter(|t| !t.trim().is_empty()) {
            let _ = writeln!(output, "  {tasks}");
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Notice;
    use crate::models::{
        ActionPlan, EarlyWarningStats, EntityKind, InstitutionalStats, LabeledDetail,
        PlacementForecast, ResourceOptimization, Role, RoadmapStep, User,
    };
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student(name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: Some(name.to_string()),
            roll_number: Some("CSE24001".to_string()),
            department: Some("CSE".to_string()),
            year: Some(2),
            dob: None,
            blood_group: None,
            parent_phone: None,
            personal_phone: None,
            personal_email: None,
            previous_school: None,
            current_cgpa: 8.25,
            academic_dna_score: 70.0,
            growth_index: 1.5,
            risk_level: "Low".to_string(),
            career_readiness_score: 60.0,
        }
    }

    fn overview() -> InstitutionalOverview {
        InstitutionalOverview {
            institutional: InstitutionalStats {
                total_students: 120,
                active_students: 118,
                placement_readiness_avg: 64.0,
                dna_score: 71.5,
                risk_ratio: 8.0,
                avg_growth_index: 1.2,
            },
            early_warning: EarlyWarningStats {
                high_risk_count: 4,
                medium_risk_count: 11,
                low_risk_percent: 87.5,
                dropout_probability_next_6m: 3.5,
            },
            performance_clusters: Vec::new(),
            department_ranking: Vec::new(),
            placement_forecast: PlacementForecast {
                forecast_placement_percent: 78.0,
                core_vs_it_ratio: "40:60".to_string(),
                avg_career_readiness: 62.0,
                skill_gap_avg: 21.0,
            },
            faculty_impact: Vec::new(),
            resource_opt: ResourceOptimization {
                faculty_load_percent: 80.0,
                lab_utilization_percent: 65.0,
                remedial_need_percent: 12.0,
                coaching_demand: "Moderate".to_string(),
            },
            weekly_insight: "Attendance dips in week 9.".to_string(),
            action_plan: ActionPlan {
                executive_summary: "Stabilise second years.".to_string(),
                roi_efficiency: "High".to_string(),
                strategies: vec![LabeledDetail {
                    label: "Mentoring".to_string(),
                    detail: "Pair at-risk students with seniors".to_string(),
                }],
                resource_label: "Budget".to_string(),
                resource_value: "Low".to_string(),
                roadmap: vec![RoadmapStep {
                    title: "Week 1".to_string(),
                    detail: "Identify cohort".to_string(),
                }],
                insight_quote: "Small steps compound.".to_string(),
            },
        }
    }

    #[test]
    fn overview_without_data_says_so() {
        let text = render_overview(None);
        assert!(text.contains("No institutional data available yet."));
    }

    #[test]
    fn overview_renders_empty_sections_explicitly() {
        let text = render_overview(Some(&overview()));
        assert!(text.contains("- Students: 120 total, 118 active"));
        assert!(text.contains("No clusters reported."));
        assert!(text.contains("No departments ranked."));
        assert!(text.contains("> Attendance dips in week 9."));
    }

    #[test]
    fn action_plan_releases_scroll_lock_after_rendering() {
        let viewport = Viewport::new();
        let text = render_action_plan(&viewport, &overview());
        assert!(text.contains("Strategic Action Plan"));
        assert!(text.contains("Mentoring"));
        assert!(!viewport.scroll_locked());
    }

    #[test]
    fn student_detail_shows_raw_career_text() {
        let detail = StudentDetail {
            student: student("Asha Rao"),
            user: User {
                email: "asha@example.com".to_string(),
                role: Role::Student,
                full_name: None,
                institutional_email: None,
            },
            academic_records: Vec::new(),
            ai_scores: Some(crate::models::AiScores {
                student_id: Uuid::new_v4(),
                consistency_index: 0.5,
                performance_volatility: 0.2,
                cgpa_prediction: 8.0,
                risk_probability: 0.25,
                skill_gap_score: 30.0,
                career_suggestions: Some("{bad json".to_string()),
                recommended_courses: None,
            }),
            feedback: Vec::new(),
        };
        let text = render_student_detail(&detail);
        assert!(text.contains("## Career Compass\n{bad json"));
        assert!(text.contains("No course recommendations."));
        assert!(text.contains("No academic records."));
        assert!(text.contains("risk probability 25%"));
    }

    #[test]
    fn directory_shows_notice_and_entries() {
        let view = DirectoryView {
            query: "asha".to_string(),
            kind: EntityKind::Student,
            phase: Phase::Idle,
            entries: vec![DirectoryEntry::Student(student("Asha Rao"))],
            notice: Some(Notice::success("Student deleted successfully")),
        };
        let text = render_directory(&view);
        assert!(text.starts_with("## Student directory: asha\n"));
        assert!(text.contains("[ok] Student deleted successfully"));
        assert!(text.contains("- Asha Rao [CSE24001] CSE year 2 CGPA 8.25"));
    }

    #[test]
    fn todos_and_plan_render_none_lines() {
        assert!(render_todos(&[]).contains("No todos yet."));
        assert!(render_study_plan(&[]).contains("No study plan generated."));

        let todo = Todo {
            id: Uuid::new_v4(),
            task_name: "Revise DBMS".to_string(),
            priority: "High".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 11, 2),
            is_completed: true,
            created_at: "2026-10-01".to_string(),
        };
        let text = render_todos(&[todo]);
        assert!(text.contains("- [x] Revise DBMS (High) due 2026-11-02"));
    }

    #[test]
    fn student_list_heading_names_the_batch() {
        let students = [student("Asha Rao")];
        assert!(render_students(&students, None).starts_with("## Students\n"));
        assert!(render_students(&students, Some(2))
            .starts_with("## Students: year 2 (batch 2024-2028)\n"));
        assert!(render_students(&[], Some(9)).starts_with("## Students\nNo students found."));
    }

    #[test]
    fn staff_profile_includes_metric_radar() {
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
            primary_skill: Some("VLSI".to_string()),
            projects_completed: 30,
            publications_count: 5,
            consistency_score: 0.5,
            student_feedback_rating: 4.0,
            personal_email: None,
            personal_phone: None,
        };
        let text = render_staff_profile(&staff);
        assert!(text.contains("## Metric Radar"));
        assert!(text.contains("- Consistency   50.0 / 100"));
        assert!(text.contains("- Feedback      80.0 / 100"));
        assert!(text.contains("- Projects     100.0 / 100"));
        assert!(text.contains("- Publications  40.0 / 100"));
    }
}
