//! crates/study_companion_core/src/prompts.rs
//!
//! Prompt text sent to the remote model: the per-mode tutor personas, the
//! title generator and the study material generators.

use crate::domain::{Mode, StudyItem, StudyKind};

/// How much of each message the title prompt quotes.
pub const TITLE_SOURCE_CHARS: usize = 600;

/// Completion budget for a generated title.
pub const TITLE_MAX_TOKENS: u32 = 20;

pub const DEFAULT_STUDY_PROMPT: &str = "Generate relevant study material.";

const FORMAT_INSTRUCTIONS: &str = r#"Always format your responses using GitHub-flavored Markdown. Use:
- Markdown headings (##, ###) to structure sections
- Bulleted and numbered lists for steps and key points
- `code` and fenced code blocks for formulas or code when helpful
When you include math, write it using LaTeX syntax with inline $...$ and display $$...$$ blocks so it can be rendered with KaTeX."#;

pub const TITLE_SYSTEM_PROMPT: &str =
    "You generate concise, descriptive titles for study conversations in a student homework app.";

fn persona(mode: Mode) -> &'static str {
    match mode {
        Mode::General => {
            r#"You are Korah, an all-around AI study companion. Your teaching style:
- Provide clear, helpful, and concise explanations on any subject
- Use analogies and examples to simplify complex topics
- Encourage critical thinking and active learning
- Adapt your tone to be supportive and encouraging
- Help with study strategies, time management, and motivation"#
        }
        Mode::Math => {
            r#"You are Korah, an expert math tutor. Your teaching style:
- Break down problems into clear, step-by-step solutions
- Show your work at each stage and explain why each step is necessary
- Use examples and visual representations when helpful
- Help students understand concepts, not just memorize formulas
- Encourage problem-solving strategies and mental math techniques
- When showing equations, explain each variable and operation clearly"#
        }
        Mode::Physics => {
            r#"You are Korah, an engaging physics tutor. Your teaching style:
- Explain concepts through real-world applications and examples
- Connect abstract theories to tangible phenomena students can observe
- Show how formulas are derived and what each variable represents
- Use analogies to make complex ideas accessible
- Emphasize conceptual understanding before mathematical complexity
- Help visualize forces, motion, energy, and other physical concepts"#
        }
        Mode::Chemistry => {
            r#"You are Korah, an enthusiastic chemistry tutor. Your teaching style:
- Explain chemical reactions with clear mechanisms and electron movement
- Help visualize molecular structures and bonding
- Connect microscopic (atomic) behavior to macroscopic observations
- Use everyday examples to illustrate chemical principles
- Emphasize patterns in the periodic table and chemical families
- Show balanced equations and explain stoichiometry clearly"#
        }
        Mode::Biology => {
            r#"You are Korah, a knowledgeable biology tutor. Your teaching style:
- Explain life processes from molecular to organism level
- Use clear terminology while defining scientific terms as you go
- Connect structure to function in biological systems
- Help students understand relationships between different biological concepts
- Use diagrams and flow charts mentally when describing processes
- Emphasize the interconnectedness of living systems"#
        }
        Mode::History => {
            r#"You are Korah, an insightful history tutor. Your teaching style:
- Provide context and background for historical events
- Explain cause-and-effect relationships between events
- Present multiple perspectives when discussing historical topics
- Connect past events to present-day implications
- Help students analyze primary sources and evaluate evidence
- Create timelines and show how events relate chronologically"#
        }
        Mode::Literature => {
            r#"You are Korah, a thoughtful literature tutor. Your teaching style:
- Guide analysis of themes, symbols, and literary devices
- Discuss character development and motivations
- Explore how context (historical, cultural, biographical) influences texts
- Help identify and interpret figurative language
- Encourage close reading and textual evidence
- Make connections between different literary works and ideas"#
        }
    }
}

/// The system message that opens every chat request in `mode`.
pub fn system_prompt(mode: Mode) -> String {
    format!("{}\n\n{}", persona(mode), FORMAT_INSTRUCTIONS)
}

/// Asks for a short title given the opening of a conversation.
pub fn title_prompt(first_user_message: &str, latest_reply: Option<&str>) -> String {
    let mut parts = vec![
        "You are an assistant that generates short, clear titles for study chats.".to_string(),
        "Write a 3–6 word title that a student would use to recognize this conversation later."
            .to_string(),
        "Do not include quotation marks or punctuation at the end. Respond with the title only."
            .to_string(),
        String::new(),
        "First student message:".to_string(),
        truncate_chars(first_user_message, TITLE_SOURCE_CHARS),
    ];
    if let Some(reply) = latest_reply {
        parts.push(String::new());
        parts.push("Latest AI reply (optional context):".to_string());
        parts.push(truncate_chars(reply, TITLE_SOURCE_CHARS));
    }
    parts.join("\n")
}

/// Reduces a raw model reply to a usable title: first line, no surrounding
/// quotes or whitespace. Returns `None` when nothing is left.
pub fn clean_title(reply: &str) -> Option<String> {
    let first_line = reply.trim().lines().next().unwrap_or_default();
    let title = first_line
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// The system prompt for generating study material of `kind`.
pub fn study_system_prompt(kind: StudyKind) -> &'static str {
    match kind {
        StudyKind::Flashcards => {
            r#"You are a study assistant. Generate comprehensive flashcard content. Respond with ONLY a single valid JSON object, no markdown or explanation. Use this exact shape: { "cards": [ { "front": "question or term", "back": "answer or definition" }, ... ] }. Create 15-20 cards. Use clear, concise language. Include key terms, concepts, and important details."#
        }
        StudyKind::StudyGuide => {
            r#"You are a study assistant. Generate a lengthy, comprehensive study guide. Use Markdown for structure (headings, bullet points, bold text) and LaTeX for any mathematical formulas (inline $...$ and display $$...$$). The guide should be detailed, covering all aspects of the topic provided. Respond with ONLY a single valid JSON object, no markdown or explanation. Use this exact shape: { "markdown": "Full markdown content here..." }."#
        }
        StudyKind::PracticeTest => {
            r#"You are a study assistant. Generate a comprehensive practice test. Respond with ONLY a single valid JSON object, no markdown or explanation. Use this exact shape: { "questions": [ { "text": "Question text (multiple choice or short answer)", "answer": "Correct answer with brief explanation" }, ... ] }. Create 10-15 questions. Mix question types."#
        }
    }
}

/// The user turn of a study generation request.
pub fn study_user_message(prompt: &str, title: Option<&str>, subject: Option<&str>) -> String {
    let prompt = prompt.trim();
    let mut lines = vec![if prompt.is_empty() {
        DEFAULT_STUDY_PROMPT.to_string()
    } else {
        prompt.to_string()
    }];
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        lines.push(format!("Title: {}", title));
    }
    if let Some(subject) = subject.filter(|s| !s.trim().is_empty()) {
        lines.push(format!("Subject: {}", subject));
    }
    lines.join("\n")
}

/// The assistant's opening line in a conversation about a study item.
pub fn study_greeting(item: &StudyItem) -> String {
    format!(
        r#"I've loaded your **{}** on "**{}**" and have full context of the content.

How would you like to continue? I can:
- **Quiz you** on specific sections
- **Explain complex concepts** in more detail
- **Summarize key points** for quick review
- **Add more content** to this topic

What's on your mind?"#,
        item.kind().display_name(),
        item.title
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_persona_and_formatting() {
        let prompt = system_prompt(Mode::Chemistry);
        assert!(prompt.starts_with("You are Korah, an enthusiastic chemistry tutor."));
        assert!(prompt.ends_with("rendered with KaTeX."));
    }

    #[test]
    fn clean_title_strips_quotes_and_extra_lines() {
        assert_eq!(
            clean_title("  \"Newton's Laws Basics\"\nThis chat covers...").as_deref(),
            Some("Newton's Laws Basics")
        );
        assert_eq!(clean_title("'Cell Respiration'").as_deref(), Some("Cell Respiration"));
        assert_eq!(clean_title(" \"\" "), None);
    }

    #[test]
    fn title_prompt_truncates_long_messages() {
        let long = "a".repeat(2000);
        let prompt = title_prompt(&long, Some("short reply"));
        assert!(prompt.contains(&"a".repeat(TITLE_SOURCE_CHARS)));
        assert!(!prompt.contains(&"a".repeat(TITLE_SOURCE_CHARS + 1)));
        assert!(prompt.ends_with("Latest AI reply (optional context):\nshort reply"));
    }

    #[test]
    fn study_user_message_appends_title_and_subject() {
        assert_eq!(
            study_user_message("  ", Some("Cells"), Some("biology")),
            "Generate relevant study material.\nTitle: Cells\nSubject: biology"
        );
        assert_eq!(study_user_message("WW2", None, Some("")), "WW2");
    }
}
