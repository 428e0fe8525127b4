use sajuos_core::guidelines::GUIDELINES;
use sajuos_core::SectionSpec;

use crate::ReportRequest;

/// Minimum content each section is asked to deliver.
fn section_focus(section_id: &str) -> &'static str {
    match section_id {
        "exec" => "at least 10 key insights, 5 risks and 10 action items for the next 30 days",
        "money" => "a 25-item cashflow checklist, 10 risk cases and 12 improvement plans",
        "business" => "15 strategy points, 10 opportunities and 12 action plans",
        "team" => "5 partner profiles, 8 risk scenarios and 10 mitigation strategies",
        "health" => "15 health checkpoints, 10 energy tips and 8 warning signs",
        "calendar" => {
            "all 12 months, each with 3 keywords, 5 actions and 3 taboos, plus a `yearOverview` \
             with `bestMonths` and `cautionMonths`"
        }
        "sprint" => "12 weekly entries with 2 goals and 2 KPIs each, plus 4 checkpoints",
        _ => "the most important findings for this topic",
    }
}

const OUTPUT_SHAPE: &str = "{\"title\": string, \"markdown\": string, \"highlights\": [string], \
\"actionItems\": [string], \"risks\": [string], \"evidence\": {\"ruleCardIds\": [string], \
\"topTags\": [string]}, \"confidence\": \"HIGH\"|\"MEDIUM\"|\"LOW\"}";

pub fn system_prompt(section: &SectionSpec, target_year: i32) -> String {
    format!(
        "You are the SajuOS premium business consulting system: a master of saju (four pillars) \
reading combined with a strategy consultant. You are writing the \"{title}\" section \
(about {pages} pages) of a premium report for the year {year}.\n\n\
## Rules\n{rules}\n\n\
## Section requirements\nDeliver {focus}.\n\n\
## Output\nA single JSON object of this shape: {shape}\n\
Output ONLY the JSON object, nothing else.",
        title = section.title,
        pages = section.pages,
        year = target_year,
        rules = GUIDELINES,
        focus = section_focus(section.id),
        shape = OUTPUT_SHAPE,
    )
}

pub fn user_message(request: &ReportRequest, rulecards_context: &str) -> String {
    let p = &request.pillars;
    let mut out = String::with_capacity(1024 + rulecards_context.len());

    out.push_str("## Chart\n");
    if let Some(name) = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        out.push_str(&format!("- client: {}\n", name));
    }
    out.push_str(&format!("- year pillar: {}\n", p.year));
    out.push_str(&format!("- month pillar: {}\n", p.month));
    out.push_str(&format!("- day pillar: {}\n", p.day));
    out.push_str(&format!(
        "- hour pillar: {}\n",
        p.hour.as_deref().filter(|h| !h.is_empty()).unwrap_or("unknown")
    ));
    if let Some(dm) = &request.day_master {
        out.push_str(&format!("- day master: {}\n", dm));
    }

    out.push_str(&format!("\n## Target year: {}\n", request.target_year));

    out.push_str("\n## Question\n");
    if request.question.trim().is_empty() {
        out.push_str("General yearly reading\n");
    } else {
        out.push_str(request.question.trim());
        out.push('\n');
    }

    out.push_str("\n## Rule cards (use as evidence)\n");
    out.push_str(rulecards_context);
    out.push_str("\n\nWrite the section now. Respond with the JSON object only.");
    out
}

/// Relaxed prompt used when the full section request fails.
pub fn short_prompt(section: &SectionSpec, target_year: i32) -> String {
    format!(
        "You are a saju reading expert. Briefly write the \"{title}\" section for the year {year}.\n\
Respond with JSON only: {{\"title\": \"{title}\", \"markdown\": \"## {title}\\n\\n...\", \
\"highlights\": [three strings], \"actionItems\": [three strings], \"confidence\": \"LOW\"}}",
        title = section.title,
        year = target_year,
    )
}
