//! Follow-up prompts offered after an assistant reply.

use crate::domain::Mode;

/// Maximum number of contextual suggestions returned for one reply.
pub const MAX_SUGGESTIONS: usize = 3;

/// A one-tap follow-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpAction {
    pub icon: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

const COMMON_ACTIONS: &[FollowUpAction] = &[
    FollowUpAction {
        icon: "🃏",
        label: "Make flashcards",
        prompt: "Create flashcards based on what you just explained",
    },
    FollowUpAction {
        icon: "🎯",
        label: "Quiz me",
        prompt: "Give me a quick quiz on this topic",
    },
    FollowUpAction {
        icon: "🔄",
        label: "Explain simpler",
        prompt: "Can you explain that in simpler terms?",
    },
];

/// (keywords, suggestions) pairs checked in order; the last entry of each
/// table has no keywords and always matches.
type Rule = (&'static [&'static str], [&'static str; 2]);

const MATH_RULES: &[Rule] = &[
    (&["quadratic", "x²"], ["What is the discriminant?", "How do I complete the square?"]),
    (&["derivative", "calculus"], ["Show me the chain rule", "What about integration?"]),
    (&["equation", "solve"], ["Show me another example", "What if the numbers were different?"]),
    (&[], ["Can you show me a practice problem?", "Explain the next step"]),
];

const PHYSICS_RULES: &[Rule] = &[
    (&["force", "newton"], ["What about friction?", "Show me an example calculation"]),
    (&["energy", "kinetic"], ["What is potential energy?", "How is energy conserved?"]),
    (&["motion", "velocity"], ["What about acceleration?", "Show me a real-world example"]),
    (&[], ["Can you explain the formula?", "What's a practical application?"]),
];

const CHEMISTRY_RULES: &[Rule] = &[
    (&["reaction", "chemical"], ["What are the products?", "Is this exothermic?"]),
    (&["atom", "electron"], ["What about ionic bonds?", "Show me the Lewis structure"]),
    (&["acid", "base"], ["What is pH?", "Show me a neutralization reaction"]),
    (&[], ["Can you show the balanced equation?", "What are similar reactions?"]),
];

const BIOLOGY_RULES: &[Rule] = &[
    (&["cell", "mitochondria"], ["What about the nucleus?", "How does cellular respiration work?"]),
    (&["dna", "gene"], ["What is transcription?", "How does mutation occur?"]),
    (&["evolution", "natural selection"], ["What is adaptation?", "Can you give an example?"]),
    (&[], ["What's the biological significance?", "Are there related processes?"]),
];

const HISTORY_RULES: &[Rule] = &[
    (&["war", "battle"], ["What caused this conflict?", "What were the consequences?"]),
    (&["revolution", "independence"], ["Who were the key figures?", "What happened afterwards?"]),
    (&["century", "era"], ["What else was happening then?", "How did this shape history?"]),
    (&[], ["What's the historical context?", "What were the long-term effects?"]),
];

const LITERATURE_RULES: &[Rule] = &[
    (&["character", "protagonist"], ["What motivates this character?", "How do they develop?"]),
    (&["theme", "symbol"], ["What other themes appear?", "Can you analyze the imagery?"]),
    (&["author", "writer"], ["What influenced the author?", "What's their writing style?"]),
    (&[], ["What's the deeper meaning?", "How does this relate to the text?"]),
];

fn rules(mode: Mode) -> &'static [Rule] {
    match mode {
        Mode::General => &[],
        Mode::Math => MATH_RULES,
        Mode::Physics => PHYSICS_RULES,
        Mode::Chemistry => CHEMISTRY_RULES,
        Mode::Biology => BIOLOGY_RULES,
        Mode::History => HISTORY_RULES,
        Mode::Literature => LITERATURE_RULES,
    }
}

/// Picks follow-up questions for `reply` by keyword, per subject mode.
pub fn contextual_suggestions(mode: Mode, reply: &str) -> Vec<&'static str> {
    let reply = reply.to_lowercase();
    rules(mode)
        .iter()
        .find(|(keywords, _)| keywords.is_empty() || keywords.iter().any(|k| reply.contains(k)))
        .map(|(_, suggestions)| suggestions.iter().copied().take(MAX_SUGGESTIONS).collect())
        .unwrap_or_default()
}

/// The common follow-up actions plus the ones specific to `mode`.
pub fn follow_up_actions(mode: Mode) -> Vec<FollowUpAction> {
    let specific: &[FollowUpAction] = match mode {
        Mode::General => &[],
        Mode::Math => &[
            FollowUpAction { icon: "📝", label: "Practice problems", prompt: "Give me similar practice problems to solve" },
            FollowUpAction { icon: "✅", label: "Show examples", prompt: "Show me more step-by-step examples" },
        ],
        Mode::Physics => &[
            FollowUpAction { icon: "🌍", label: "Real-world example", prompt: "Give me a real-world example of this concept" },
            FollowUpAction { icon: "🔬", label: "Show experiment", prompt: "Describe an experiment that demonstrates this" },
        ],
        Mode::Chemistry => &[
            FollowUpAction { icon: "⚗️", label: "Show reaction", prompt: "Show me the balanced chemical equation" },
            FollowUpAction { icon: "🧪", label: "Related reactions", prompt: "What are similar chemical reactions?" },
        ],
        Mode::Biology => &[
            FollowUpAction { icon: "🔬", label: "Show diagram", prompt: "Describe a diagram of this process" },
            FollowUpAction { icon: "🧬", label: "Related concepts", prompt: "What other biological concepts relate to this?" },
        ],
        Mode::History => &[
            FollowUpAction { icon: "📅", label: "Timeline", prompt: "Create a timeline of these events" },
            FollowUpAction { icon: "🌍", label: "Broader context", prompt: "What was happening globally during this time?" },
        ],
        Mode::Literature => &[
            FollowUpAction { icon: "📖", label: "Find themes", prompt: "What are the main themes in this text?" },
            FollowUpAction { icon: "💭", label: "Analyze symbols", prompt: "What symbols or motifs appear in this work?" },
        ],
    };
    COMMON_ACTIONS.iter().chain(specific).copied().collect()
}
