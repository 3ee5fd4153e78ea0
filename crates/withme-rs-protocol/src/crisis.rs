//! Crisis-resource shapes shown to a person when a crisis is detected.

use serde::{Deserialize, Serialize};

/// A single support line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hotline {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Emergency number and hotlines for a region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrisisResources {
    pub country: String,
    pub country_code: String,
    pub emergency_number: String,
    pub hotlines: Vec<Hotline>,
}

/// Region choice offered during onboarding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionOption {
    pub value: String,
    pub label: String,
}
