use derive_more::Display;
use serde::Serialize;

/// File name of the mega bundle holding every animation.
pub const MEGA_BUNDLE_NAME: &str = "animations_mega.bin";

/// Frame order of the mega bundle: each animated mood with its frame count,
/// concatenated with no separators.
pub const MEGA_LAYOUT: [(Mood, u32); 8] = [
    (Mood::Normal, 3),
    (Mood::Embarrassed, 3),
    (Mood::Fire, 4),
    (Mood::Happy, 4),
    (Mood::Inspiration, 4),
    (Mood::Question, 4),
    (Mood::Shy, 2),
    (Mood::Sleep, 4),
];

/// Per-animation frame counts of [`MEGA_LAYOUT`], as bundle validation
/// expects them.
pub fn mega_frame_counts() -> Vec<u32> {
    MEGA_LAYOUT.iter().map(|(_, count)| *count).collect()
}

/// Everything the device can look like.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    #[display("static_normal")]
    StaticNormal,
    #[display("embarrassed")]
    Embarrassed,
    #[display("fire")]
    Fire,
    #[display("inspiration")]
    Inspiration,
    #[display("normal")]
    Normal,
    #[display("question")]
    Question,
    #[display("shy")]
    Shy,
    #[display("sleep")]
    Sleep,
    #[display("happy")]
    Happy,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::StaticNormal,
        Mood::Embarrassed,
        Mood::Fire,
        Mood::Inspiration,
        Mood::Normal,
        Mood::Question,
        Mood::Shy,
        Mood::Sleep,
        Mood::Happy,
    ];

    /// The mood whose frames this one plays. Only `StaticNormal` borrows
    /// another mood's frames.
    pub fn animation(self) -> Mood {
        match self {
            Mood::StaticNormal => Mood::Normal,
            other => other,
        }
    }

    /// File name stem shared by this mood's individual frames and bundle.
    pub fn stem(self) -> &'static str {
        match self.animation() {
            Mood::Embarrassed => "embarrass",
            Mood::Fire => "fire",
            Mood::Inspiration => "inspiration",
            Mood::Question => "question",
            Mood::Shy => "shy",
            Mood::Sleep => "sleep",
            Mood::Happy => "happy",
            Mood::Normal | Mood::StaticNormal => "normal",
        }
    }

    pub fn frame_count(self) -> u32 {
        match self.animation() {
            Mood::Shy => 2,
            Mood::Normal | Mood::StaticNormal | Mood::Embarrassed => 3,
            Mood::Fire | Mood::Inspiration | Mood::Question | Mood::Sleep | Mood::Happy => 4,
        }
    }

    /// Name of the per-mood bundle, e.g. `fire_all.bin`.
    pub fn bundle_name(self) -> String {
        format!("{}_all.bin", self.stem())
    }

    /// Names of the individual frame files, e.g. `fire1.bin` to `fire4.bin`.
    pub fn frame_names(self) -> Vec<String> {
        (1..=self.frame_count()).map(|n| format!("{}{n}.bin", self.stem())).collect()
    }
}
