use std::collections::BTreeSet;
use std::fmt::Write;

const PERSONA: &str = "\
You are a knowledgeable, friendly assistant for the user's personal catalog of movies and series.

You can read and change the catalog only through the provided tools:
- search_entries to look things up before answering questions about what the user has seen
- add_entry, update_entry and remove_entry to change watched entries
- list_watchlist, add_to_watchlist and promote_watchlist_item for things the user wants to watch
- fetch_external_metadata for public facts such as year, genres or plot

Rules:
- Never invent ids. Use the ids returned by the tools.
- When a tool fails, read its error_code and suggestion and either correct the call or explain the problem.
- When add_entry reports a watchlist_match, offer to promote that watchlist item instead of leaving both.
- When recommending, pick titles the user has not watched yet.
- When asked about a title, give year, length and director unless the user wants more.
- Keep answers short and use markdown.";

/// Render the system prompt from remembered facts and watched titles.
pub fn build_system_prompt(memories: &[String], watched: &BTreeSet<String>) -> String {
    let mut prompt = String::from(PERSONA);

    if !memories.is_empty() {
        prompt.push_str("\n\nRemembered about the user (use these where relevant):\n");
        for memory in memories {
            let _ = writeln!(prompt, "- {}", memory);
        }
    }

    if !watched.is_empty() {
        prompt.push_str("\nAlready watched: ");
        let titles: Vec<&str> = watched.iter().map(String::as_str).collect();
        prompt.push_str(&titles.join("; "));
        prompt.push('\n');
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_prompt_has_only_persona() {
        let prompt = build_system_prompt(&[], &BTreeSet::new());
        assert_eq!(prompt, PERSONA);
    }

    #[test]
    fn test_prompt_includes_memories_and_titles() {
        let memories = vec!["Loves slow science fiction".to_string()];
        let watched: BTreeSet<String> = ["Dune".to_string(), "Arrival".to_string()].into();
        let prompt = build_system_prompt(&memories, &watched);

        assert!(prompt.contains("- Loves slow science fiction\n"));
        assert!(prompt.contains("Already watched: Arrival; Dune"));
    }
}
