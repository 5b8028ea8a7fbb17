//! Lookup tables driving the normalizer.
//!
//! The built-in tables target a college-review schema (`college`, `state`,
//! `ug_fee`, `rating`, ...). A JSON file with the same shape replaces any
//! table it names; omitted tables keep their built-in values.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Canonical column token -> natural-language synonyms
    pub fuzzy_keywords: BTreeMap<String, Vec<String>>,

    /// Qualifier -> literal comparison fragment
    pub qualitative_thresholds: BTreeMap<String, String>,

    /// Vague trigger word -> column it implies
    pub implicit_references: BTreeMap<String, String>,

    /// Location names annotated as state equality conditions
    pub locations: Vec<String>,

    /// Columns holding names rather than scores or amounts. A qualifier
    /// next to one of these is never turned into a comparison on it.
    pub text_columns: Vec<String>,

    pub state_column: String,
    pub undergraduate_fee_column: String,
    pub postgraduate_fee_column: String,
}

impl NormalizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Every token the normalizer treats as a column reference.
    pub fn column_tokens(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.fuzzy_keywords.keys().cloned().collect();
        columns.extend(self.implicit_references.values().cloned());
        columns.push(self.state_column.clone());
        columns.push(self.undergraduate_fee_column.clone());
        columns.push(self.postgraduate_fee_column.clone());
        columns.sort();
        columns.dedup();
        columns
    }

    /// Column tokens a qualitative threshold can be compared against.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.column_tokens()
            .into_iter()
            .filter(|column| *column != self.state_column && !self.text_columns.contains(column))
            .collect()
    }

    pub fn fee_columns(&self) -> [&str; 2] {
        [&self.undergraduate_fee_column, &self.postgraduate_fee_column]
    }
}

fn table(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(column, synonyms)| {
            (
                column.to_string(),
                synonyms.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

fn pairs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let fuzzy_keywords = table(&[
            ("college", &["college name", "institute", "university", "campus", "school", "institution"]),
            ("state", &["location", "region", "province", "area", "state name"]),
            ("stream", &["branch", "department", "discipline", "course category", "field of study", "major"]),
            ("ug_fee", &["undergraduate fee", "bachelor fee", "ug cost", "tuition for undergrad", "bachelor tuition"]),
            ("pg_fee", &["postgraduate fee", "master fee", "pg cost", "tuition for masters", "graduate tuition"]),
            ("rating", &["overall rating", "score", "rank", "stars", "review score"]),
            ("academic", &["academics", "study quality", "curriculum", "academic excellence", "course content"]),
            ("accommodation", &["hostel", "housing", "dormitory", "student residence", "accommodations"]),
            ("faculty", &["teachers", "professors", "staff", "mentors", "faculty quality"]),
            ("infrastructure", &["facilities", "buildings", "campus infra", "infrastructure quality", "labs"]),
            ("placement", &["placements", "job offers", "recruitment", "career support", "company offers", "hiring stats"]),
            ("social_life", &["campus life", "student activities", "events", "fun", "festivals", "social scene"]),
        ]);

        let qualitative_thresholds = pairs(&[
            ("excellent", "> 8"),
            ("top", "> 8"),
            ("best", "> 8"),
            ("high", "> 7"),
            ("good", "> 6"),
            ("decent", "> 5"),
            ("average", "~ 5"),
            ("poor", "< 4"),
            ("bad", "< 4"),
            ("worst", "< 3"),
            ("low", "< 4"),
            ("cheap", "< 200000"),
            ("affordable", "< 300000"),
            ("expensive", "> 500000"),
            ("costly", "> 500000"),
        ]);

        let implicit_references = pairs(&[
            ("best", "rating"),
            ("top", "rating"),
            ("excellent", "rating"),
            ("high", "rating"),
            ("good", "rating"),
            ("decent", "rating"),
            ("average", "rating"),
            ("poor", "rating"),
            ("bad", "rating"),
            ("worst", "rating"),
            ("low", "rating"),
            ("highest", "rating"),
            ("popular", "rating"),
            ("famous", "rating"),
            ("top rated", "rating"),
            ("cheap", "ug_fee"),
            ("cheapest", "ug_fee"),
            ("affordable", "ug_fee"),
            ("budget", "ug_fee"),
            ("expensive", "ug_fee"),
            ("costly", "ug_fee"),
            ("costliest", "ug_fee"),
        ]);

        let locations = [
            "andhra pradesh", "assam", "bihar", "chhattisgarh", "delhi", "goa",
            "gujarat", "haryana", "himachal pradesh", "jammu and kashmir",
            "jharkhand", "karnataka", "kerala", "madhya pradesh", "maharashtra",
            "odisha", "punjab", "rajasthan", "tamil nadu", "telangana",
            "uttar pradesh", "uttarakhand", "west bengal", "new delhi",
            "ahmedabad", "bangalore", "bengaluru", "bhopal", "chandigarh",
            "chennai", "coimbatore", "hyderabad", "indore", "jaipur",
            "kolkata", "lucknow", "mumbai", "nagpur", "noida", "pune",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            fuzzy_keywords,
            qualitative_thresholds,
            implicit_references,
            locations,
            text_columns: vec!["college".to_string(), "stream".to_string()],
            state_column: "state".to_string(),
            undergraduate_fee_column: "ug_fee".to_string(),
            postgraduate_fee_column: "pg_fee".to_string(),
        }
    }
}
