//! Which R libraries each tutorial page needs before code can run.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Libraries loaded on pages without their own entry.
pub const DEFAULT_PACKAGES: &[&str] = &["dplyr", "ggplot2", "tidyr", "stringr", "lubridate"];

/// Page filename to required libraries.
pub const PAGE_PACKAGES: &[(&str, &[&str])] = &[
    ("basics.html", DEFAULT_PACKAGES),
    ("wrangling.html", &["dplyr"]),
    ("tidying.html", &["tidyr", "dplyr"]),
    ("visualization.html", &["ggplot2", "dplyr"]),
    ("statistics.html", &["dplyr"]),
    ("anova.html", &["ggplot2", "dplyr"]),
    ("regression.html", &["ggplot2", "dplyr"]),
    ("categorical.html", &["ggplot2", "dplyr"]),
    ("module6.html", &["dplyr"]),
    ("skill_b.html", &["lubridate", "dplyr"]),
    ("skill_c.html", &["stringr", "tidyr", "dplyr"]),
    ("functional.html", &["purrr", "dplyr"]),
    ("oop.html", &["R6", "dplyr"]),
];

pub type PackageList = Vec<String>;

/// Last segment of a page path, e.g. `wrangling.html` for `/r/wrangling.html`.
pub fn page_name(page_path: &str) -> &str {
    page_path.rsplit('/').next().unwrap_or_default()
}

/// Libraries required by the built-in page table.
pub fn required_packages(page_path: Option<&str>) -> PackageList {
    let name = page_path.map(page_name).unwrap_or_default();
    let packages = PAGE_PACKAGES
        .iter()
        .find(|(page, _)| *page == name)
        .map(|(_, packages)| *packages)
        .unwrap_or(DEFAULT_PACKAGES);
    dedup(packages.iter().copied())
}

fn dedup<'a>(packages: impl IntoIterator<Item = &'a str>) -> PackageList {
    let mut seen = HashSet::new();
    packages
        .into_iter()
        .filter(|pkg| seen.insert(*pkg))
        .map(str::to_string)
        .collect()
}

/// A page table that can be replaced from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTable {
    #[serde(default = "default_list")]
    pub default: Vec<String>,
    #[serde(default)]
    pub pages: BTreeMap<String, Vec<String>>,
}

fn default_list() -> Vec<String> {
    DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect()
}

impl Default for PackageTable {
    fn default() -> Self {
        Self {
            default: default_list(),
            pages: PAGE_PACKAGES
                .iter()
                .map(|(page, pkgs)| {
                    (page.to_string(), pkgs.iter().map(|p| p.to_string()).collect())
                })
                .collect(),
        }
    }
}

impl PackageTable {
    pub fn resolve(&self, page_path: Option<&str>) -> PackageList {
        let name = page_path.map(page_name).unwrap_or_default();
        let packages = self.pages.get(name).unwrap_or(&self.default);
        tracing::debug!("Resolved {} packages for page {:?}", packages.len(), name);
        dedup(packages.iter().map(String::as_str))
    }
}
