//! Activity categories and their mapping onto the classifier vocabulary.
//!
//! Labels come from an externally trained model and are free text, partly
//! in Spanish. A label belongs to a category when its lowercase form
//! contains one of the category's tokens.

use std::fmt;

/// Coarse activity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityCategory {
    Walking,
    Approaching,
    Retreating,
    Squatting,
    Crouching,
    Turning,
    Standing,
    Sitting,
    Motionless,
    ForwardBend,
    LeanRight,
    LeanLeft,
    Lean,
}

/// Category → label substrings
const CATEGORY_TOKENS: &[(ActivityCategory, &[&str])] = &[
    (ActivityCategory::Walking, &["caminar", "walk"]),
    (ActivityCategory::Approaching, &["acercandose", "approach"]),
    (ActivityCategory::Retreating, &["alejandose", "walk_away", "espaldas"]),
    (ActivityCategory::Squatting, &["sentadilla", "squat"]),
    (ActivityCategory::Crouching, &["agacharse", "crouch"]),
    (ActivityCategory::Turning, &["giro", "turn"]),
    (ActivityCategory::Standing, &["parado", "stand"]),
    (ActivityCategory::Sitting, &["sentado", "sit"]),
    (ActivityCategory::Motionless, &["sin movimiento", "motionless"]),
    (ActivityCategory::ForwardBend, &["adelante", "bend_forward"]),
    (ActivityCategory::LeanRight, &["derecha", "right"]),
    (ActivityCategory::LeanLeft, &["izquierda", "left"]),
    (ActivityCategory::Lean, &["inclin", "lean"]),
];

impl ActivityCategory {
    /// Categories that imply visible body movement
    pub const DYNAMIC: [ActivityCategory; 5] = [
        ActivityCategory::Walking,
        ActivityCategory::Approaching,
        ActivityCategory::Retreating,
        ActivityCategory::Squatting,
        ActivityCategory::Turning,
    ];

    /// Categories that imply the body is still
    pub const STATIC: [ActivityCategory; 3] = [
        ActivityCategory::Standing,
        ActivityCategory::Sitting,
        ActivityCategory::Motionless,
    ];

    /// Label substrings identifying this category
    #[must_use]
    pub fn tokens(self) -> &'static [&'static str] {
        CATEGORY_TOKENS
            .iter()
            .find(|(category, _)| *category == self)
            .map_or(&[][..], |(_, tokens)| *tokens)
    }

    /// Whether `label` belongs to this category
    #[must_use]
    pub fn matches(self, label: &str) -> bool {
        let lower = label.to_lowercase();
        self.tokens().iter().any(|token| lower.contains(token))
    }

    /// Label used when the vocabulary has no entry for the category
    #[must_use]
    pub const fn canonical_label(self) -> &'static str {
        match self {
            ActivityCategory::Walking => "walk",
            ActivityCategory::Approaching => "approach",
            ActivityCategory::Retreating => "walk_away",
            ActivityCategory::Squatting => "squat",
            ActivityCategory::Crouching => "crouch",
            ActivityCategory::Turning => "turn",
            ActivityCategory::Standing => "stand",
            ActivityCategory::Sitting => "sit",
            ActivityCategory::Motionless => "motionless",
            ActivityCategory::ForwardBend => "bend_forward",
            ActivityCategory::LeanRight => "incline_right",
            ActivityCategory::LeanLeft => "incline_left",
            ActivityCategory::Lean => "lean",
        }
    }

    #[must_use]
    pub fn is_dynamic(self) -> bool {
        Self::DYNAMIC.contains(&self)
    }

    #[must_use]
    pub fn is_static(self) -> bool {
        Self::STATIC.contains(&self)
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_label())
    }
}

/// Every category `label` belongs to
pub fn categories(label: &str) -> impl Iterator<Item = ActivityCategory> + '_ {
    CATEGORY_TOKENS
        .iter()
        .map(|(category, _)| *category)
        .filter(move |category| category.matches(label))
}

/// True when `label` names an activity with visible movement
#[must_use]
pub fn is_dynamic(label: &str) -> bool {
    categories(label).any(ActivityCategory::is_dynamic)
}

/// True when `label` names a still activity
#[must_use]
pub fn is_static(label: &str) -> bool {
    categories(label).any(ActivityCategory::is_static)
}

/// Vocabulary used when the model artifacts carry no labels
pub const DEFAULT_VOCABULARY: [&str; 11] = [
    "stand",
    "sit",
    "walk",
    "squat",
    "bend_forward",
    "incline_left",
    "incline_right",
    "turn",
    "approach",
    "walk_away",
    "transition",
];
