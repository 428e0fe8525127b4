/// Writing rules shared by every report section prompt and exposed to agents over MCP.
pub const GUIDELINES: &str = "\
1. Anchor every statement in the target year. Months, good periods and caution periods \
refer to January through December of that year only.\n\
2. Respond with a single JSON object. No markdown code fences, no prose before or after it.\n\
3. Use the supplied rule cards as evidence. Cite card ids in `evidence.ruleCardIds` and do not \
invent cards that were not supplied.\n\
4. Be concrete. Replace abstract phrasing with numbers, dates and checklists the reader can act on.\n\
5. No definitive medical, legal or investment advice. Frame risks as things to review with a professional.\n\
6. Keep a premium consulting tone: professional, warm, and focused on execution.\n\
7. Set `confidence` to HIGH, MEDIUM or LOW. Use LOW when few rule cards support the section.";
