//! Prompt Assembler
//!
//! Combines the schema snapshot and a normalized question into the single
//! instruction text sent to the generative backend. The rules steer the
//! backend only; the validator enforces safety.

use crate::config::DEFAULT_ROW_LIMIT;
use crate::schema::SchemaMap;
use crate::validator::DENIED_KEYWORDS;

/// Build the prompt with the default row limit.
pub fn build_prompt(schema: &SchemaMap, normalized_query: &str) -> String {
    build_prompt_with_limit(schema, normalized_query, DEFAULT_ROW_LIMIT)
}

pub fn build_prompt_with_limit(schema: &SchemaMap, normalized_query: &str, row_limit: u64) -> String {
    let schema_text = render_schema(schema);
    let denied = DENIED_KEYWORDS.join(", ");

    format!(
        r#"You are an expert PostgreSQL query generator. Output ONLY one safe, read-only SQL query in PostgreSQL dialect, with no explanations.

DATABASE SCHEMA (public):
{schema_text}

USER REQUEST:
"""{normalized_query}"""

REQUIREMENTS:
- The first token of the query must be SELECT or WITH.
- Never modify data. Never use {denied}.
- Do not include semicolons anywhere, including at the end of the query.
- Add LIMIT {row_limit} if the request does not specify a limit.
- Give every table an alias and qualify every column with its table alias.
- Use exact column names as shown in the schema.
- Give every selected column a unique output name; alias duplicates, e.g. c.id AS college_id, r.id AS review_id.
- Compare text case-insensitively by wrapping both sides in LOWER(), e.g. LOWER(c.state) = LOWER('pune').
- Use explicit JOINs with ON for relationships.
- If selecting parent rows (e.g. colleges) with related child rows (e.g. reviews), return one row per parent and aggregate child rows into a JSON array using JSON_AGG(JSON_BUILD_OBJECT(...)).
- Apply FILTER (WHERE ...) directly to JSON_AGG, NOT inside JSON_BUILD_OBJECT.
  *Correct:*
    COALESCE(
      JSON_AGG(JSON_BUILD_OBJECT('id', r.id, 'name', r.name)) FILTER (WHERE r.id IS NOT NULL),
      '[]'
    )
  *Incorrect:*
    COALESCE(
      JSON_AGG(JSON_BUILD_OBJECT('id', r.id, 'name', r.name) FILTER (WHERE r.id IS NOT NULL)),
      '[]'
    )
- Always wrap JSON_AGG in COALESCE(..., '[]') so parents without children get an empty array.
- To include parent rows with zero matching child rows, use LEFT JOIN and put child filters in the JOIN condition, not in WHERE.
- When using JSON_AGG with non-aggregated parent columns, add a GROUP BY listing every non-aggregated selected column.
- Do not include comments or explanations.

Only output the SQL. No commentary.
"#
    )
}

fn render_schema(schema: &SchemaMap) -> String {
    schema
        .tables()
        .map(|(table, columns)| format!("- {}({})", table, columns.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaMap {
        SchemaMap::from_rows([
            ("college_profiles", "id"),
            ("college_profiles", "college"),
            ("college_profiles", "state"),
            ("alumni_reviews", "id"),
            ("alumni_reviews", "college_id"),
        ])
    }

    #[test]
    fn test_schema_rendered_one_line_per_table() {
        let prompt = build_prompt(&schema(), "rating > 8");

        assert!(prompt.contains("- alumni_reviews(id, college_id)\n- college_profiles(id, college, state)"));
    }

    #[test]
    fn test_query_embedded_verbatim_in_quotes() {
        let prompt = build_prompt(&schema(), "> 8 colleges in state = 'pune' rating");
        assert!(prompt.contains("\"\"\"> 8 colleges in state = 'pune' rating\"\"\""));
    }

    #[test]
    fn test_rules_present() {
        let prompt = build_prompt_with_limit(&schema(), "q", 250);

        assert!(prompt.contains("must be SELECT or WITH"));
        assert!(prompt.contains("LIMIT 250"));
        assert!(prompt.contains("semicolons"));
        assert!(prompt.contains("TRUNCATE"));
        assert!(prompt.contains("LOWER()"));
        assert!(prompt.contains("FILTER (WHERE"));
        assert!(prompt.contains("GROUP BY"));
        assert!(prompt.contains("alias"));
    }

    #[test]
    fn test_duplicate_output_names_must_be_aliased() {
        let prompt = build_prompt(&schema(), "q");
        assert!(prompt.contains("unique output name"));
        assert!(prompt.contains("c.id AS college_id, r.id AS review_id"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(build_prompt(&schema(), "x"), build_prompt(&schema(), "x"));
    }
}
