//! Wire types of the course-selection service
//!
//! Field names follow the portal's JSON. Everything the portal may omit is
//! defaulted so that a missing field shows up as an empty value the caller
//! can reject with a proper message.

use super::reservation::Category;
use serde::{Deserialize, Serialize};

/// Response of `student/{code}.do`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchInfoResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<StudentBatchInfo>,
}

/// Student profile plus every registration window visible to them
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBatchInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub college_name: Option<String>,
    #[serde(default)]
    pub campus_name: Option<String>,
    #[serde(default)]
    pub elective_batch_list: Vec<ElectiveBatch>,
}

/// Registration window
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ElectiveBatch {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "schoolTermName", default)]
    pub term_name: String,
    #[serde(rename = "beginTime", default)]
    pub begin_time: String,
    #[serde(rename = "endTime", default)]
    pub end_time: String,
    #[serde(rename = "canSelect", default)]
    pub can_select: String,
    #[serde(rename = "displayTJKC", default)]
    pub display_major: String,
    #[serde(rename = "displayXGXK", default)]
    pub display_elective: String,
    #[serde(rename = "displayTYKC", default)]
    pub display_physical: String,
    #[serde(rename = "displayFANKC", default)]
    pub display_program: String,
}

impl ElectiveBatch {
    pub fn is_selectable(&self) -> bool {
        self.can_select == "1"
    }

    /// Categories this window lets the student pick from
    pub fn enabled_categories(&self) -> Vec<Category> {
        [
            (Category::Major, &self.display_major),
            (Category::Elective, &self.display_elective),
            (Category::Physical, &self.display_physical),
            (Category::Program, &self.display_program),
        ]
        .into_iter()
        .filter(|(_, flag)| flag.as_str() == "1")
        .map(|(category, _)| category)
        .collect()
    }

    /// Whether this window is the one the grabber should use
    pub fn is_open_for(&self, audience: &str) -> bool {
        self.is_selectable() && self.name.contains(audience) && !self.enabled_categories().is_empty()
    }
}

/// Response of `elective/recommendedCourse.do`
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendedCourseResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(rename = "dataList", default)]
    pub data_list: Vec<RecommendedCourse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendedCourse {
    #[serde(rename = "courseNumber", default)]
    pub course_number: String,
    #[serde(rename = "courseName", default)]
    pub course_name: String,
    #[serde(rename = "tcList", default)]
    pub teaching_classes: Vec<TeachingClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeachingClass {
    #[serde(rename = "teachingClassID", default)]
    pub teaching_class_id: String,
}

/// Response of `elective/volunteer.do`
#[derive(Debug, Clone, Deserialize)]
pub struct VolunteerResponse {
    pub msg: String,
}

/// `querySetting` payload of the recommended-course query
#[derive(Debug, Clone, Serialize)]
pub struct CourseQuery<'a> {
    pub data: CourseQueryData<'a>,
    #[serde(rename = "pageSize")]
    pub page_size: &'a str,
    #[serde(rename = "pageNumber")]
    pub page_number: &'a str,
    pub order: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseQueryData<'a> {
    pub student_code: &'a str,
    pub campus: &'a str,
    pub elective_batch_code: &'a str,
    pub is_major: &'a str,
    pub teaching_class_type: &'a str,
    pub check_conflict: &'a str,
    pub check_capacity: &'a str,
    pub query_content: &'a str,
}

/// `addParam` payload of the privileged action
#[derive(Debug, Clone, Serialize)]
pub struct VolunteerRequest<'a> {
    pub data: VolunteerRequestData<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerRequestData<'a> {
    pub operation_type: &'a str,
    pub student_code: &'a str,
    pub elective_batch_code: &'a str,
    pub teaching_class_id: &'a str,
    pub is_major: &'a str,
    pub campus: &'a str,
    pub teaching_class_type: &'a str,
}
