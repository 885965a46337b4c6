use serde::{Deserialize, Serialize};

use crate::grading::compare_code;
use crate::packages::{PackageList, PackageTable};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    pub answer: String,
}

impl Exercise {
    pub fn is_correct(&self, code: &str) -> bool {
        compare_code(Some(code), Some(self.answer.as_str()))
    }
}

/// The exercises shown on one tutorial page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub page: String,
    pub title: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Lesson {
    pub fn exercise(&self, id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == id)
    }

    pub fn required_packages(&self, table: &PackageTable) -> PackageList {
        table.resolve(Some(self.page.as_str()))
    }
}
