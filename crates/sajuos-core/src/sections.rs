use serde::Serialize;

/// One section of the premium report and the rule-card topics that feed it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionSpec {
    pub id: &'static str,
    pub title: &'static str,
    /// Rough page count the section is written for
    pub pages: u32,
    /// Upper bound on rule cards handed to the section prompt
    pub rulecard_quota: usize,
    pub topics: &'static [&'static str],
}

/// Report sections in the order they appear in the final document.
pub const SECTIONS: &[SectionSpec] = &[
    SectionSpec {
        id: "exec",
        title: "Executive Summary",
        pages: 2,
        rulecard_quota: 50,
        topics: &["general", "personality", "yearly_fortune"],
    },
    SectionSpec {
        id: "money",
        title: "Money & Cashflow",
        pages: 5,
        rulecard_quota: 80,
        topics: &["wealth", "finance", "investment"],
    },
    SectionSpec {
        id: "business",
        title: "Business Strategy",
        pages: 5,
        rulecard_quota: 80,
        topics: &["career", "business", "leadership"],
    },
    SectionSpec {
        id: "team",
        title: "Team & Partner Risk",
        pages: 4,
        rulecard_quota: 60,
        topics: &["relationship", "partnership", "conflict"],
    },
    SectionSpec {
        id: "health",
        title: "Health & Performance",
        pages: 3,
        rulecard_quota: 50,
        topics: &["health", "energy", "wellness"],
    },
    SectionSpec {
        id: "calendar",
        title: "12-Month Calendar",
        pages: 6,
        rulecard_quota: 100,
        topics: &["monthly", "timing", "seasonal"],
    },
    SectionSpec {
        id: "sprint",
        title: "90-Day Sprint Plan",
        pages: 5,
        rulecard_quota: 80,
        topics: &["action", "planning", "execution"],
    },
];

pub fn section(id: &str) -> Option<&'static SectionSpec> {
    SECTIONS.iter().find(|s| s.id == id)
}
