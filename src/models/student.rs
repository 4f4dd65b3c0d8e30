use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub admission_number: String,
    pub phone_number: Option<String>,
    /// Free text; may carry a fee due date ("Fee due 25th Oct") or "fully paid".
    pub remarks: Option<String>,
}

impl Student {
    pub fn remarks_str(&self) -> &str {
        self.remarks.as_deref().unwrap_or("")
    }
}
