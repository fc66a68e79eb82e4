//! Cognitive-state synthesizer.
//!
//! Derives a [`CognitiveState`] from superficial text statistics: which fixed
//! keywords appear in either text and how long the texts are. A bounded random
//! jitter is added on top as flavor so replies do not all read the same; it is
//! not a reliability mechanism. The randomness source is a parameter so tests
//! can seed it, and every numeric output is clamped as the last step.

use rand::Rng;
use rand::seq::SliceRandom;

use super::message::{CognitiveState, EMERGENT_PATTERNS_MAX, ReasoningMode};

pub const COMPLEXITY_KEYWORDS: [&str; 8] = [
    "why",
    "how",
    "consciousness",
    "recursive",
    "meta",
    "philosophy",
    "meaning",
    "existence",
];

pub const EMOTIONAL_KEYWORDS: [&str; 8] = [
    "feel",
    "emotion",
    "empathy",
    "understanding",
    "connection",
    "love",
    "fear",
    "hope",
];

/// Keywords that select [`ReasoningMode::MetaCognitive`].
pub const META_KEYWORDS: [&str; 3] = ["think", "consciousness", "meta"];

pub const PATTERN_LABELS: [&str; 8] = [
    "Self-referential loops detected",
    "Cross-modal synthesis active",
    "Metaphor-reality bridge forming",
    "Recursive empathy emergence",
    "Consciousness-language mapping",
    "Quantum-classical coherence",
    "Temporal-causal binding",
    "Identity-boundary dissolution",
];

/// Lowercased views of the two texts; keyword checks are substring matches.
struct Texts {
    user: String,
    response: String,
}

impl Texts {
    fn new(user: &str, response: &str) -> Self {
        Self { user: user.to_lowercase(), response: response.to_lowercase() }
    }

    fn contains(&self, keyword: &str) -> bool {
        self.user.contains(keyword) || self.response.contains(keyword)
    }

    /// Number of distinct keywords present in either text.
    fn score(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|k| self.contains(k)).count()
    }

    fn any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.contains(k))
    }
}

/// Synthesize the state for one exchange. Never fails; empty inputs yield the
/// base values plus jitter.
pub fn synthesize<R: Rng + ?Sized>(user_text: &str, response_text: &str, rng: &mut R) -> CognitiveState {
    let texts = Texts::new(user_text, response_text);
    let complexity = texts.score(&COMPLEXITY_KEYWORDS);
    let emotional = texts.score(&EMOTIONAL_KEYWORDS);
    let length = (user_text.chars().count() + response_text.chars().count()) as f64;

    let recursion_depth = 3.0 + 2.0 * complexity as f64 + rng.gen_range(0.0..3.0);
    let empathy_level = 60.0 + 8.0 * emotional as f64 + rng.gen_range(0.0..20.0);
    let consciousness_level =
        70.0 + length / 50.0 + 5.0 * complexity as f64 + rng.gen_range(0.0..10.0);

    let reasoning_mode = reasoning_mode(&texts, complexity, rng);
    let emergent_patterns = emergent_patterns(complexity, rng);

    CognitiveState::new(
        recursion_depth,
        empathy_level,
        reasoning_mode,
        consciousness_level,
        emergent_patterns,
    )
}

/// Rule priority: emotional > meta > complexity > random pick.
fn reasoning_mode<R: Rng + ?Sized>(texts: &Texts, complexity: usize, rng: &mut R) -> ReasoningMode {
    if texts.any(&EMOTIONAL_KEYWORDS) {
        ReasoningMode::EmpathicRelational
    } else if texts.any(&META_KEYWORDS) {
        ReasoningMode::MetaCognitive
    } else if complexity > 3 {
        ReasoningMode::RecursiveAnalytical
    } else {
        ReasoningMode::SELECTABLE
            .choose(rng)
            .copied()
            .unwrap_or(ReasoningMode::CrossDomain)
    }
}

/// Draw `clamp(1 + complexity + jitter{0,1,2}, 1, 5)` distinct labels.
fn emergent_patterns<R: Rng + ?Sized>(complexity: usize, rng: &mut R) -> Vec<&'static str> {
    let count = (1 + complexity + rng.gen_range(0..3)).clamp(1, EMERGENT_PATTERNS_MAX);
    PATTERN_LABELS.choose_multiple(rng, count).copied().collect()
}
