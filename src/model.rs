use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub email: String,
    pub name: String,
    pub status_pkl: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
}

/// A stored placement. Dates are kept as `YYYY-MM-DD` text, the way they
/// travel through the form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub id: String,
    pub student_id: String,
    pub company_id: String,
    pub teacher_id: Option<String>,
    pub start_date: String,
    pub end_date: String,
}

/// Placement joined with the display names the list view needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRow {
    #[serde(flatten)]
    pub placement: Placement,
    pub student_name: String,
    pub company_name: String,
    pub teacher_name: Option<String>,
    pub can_edit_delete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPage {
    pub rows: Vec<PlacementRow>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}
