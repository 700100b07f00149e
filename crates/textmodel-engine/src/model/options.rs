use serde::{Deserialize, Serialize};

/// Class names that mark a decoration as a validation result (squiggles).
pub const ERROR_CLASS_NAME: &str = "squiggly-error";
pub const WARNING_CLASS_NAME: &str = "squiggly-warning";
pub const INFO_CLASS_NAME: &str = "squiggly-info";

/// How a decoration's range reacts to typing exactly at its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackedRangeStickiness {
    AlwaysGrowsWhenTypingAtEdges,
    #[default]
    NeverGrowsWhenTypingAtEdges,
    GrowsOnlyWhenTypingBefore,
    GrowsOnlyWhenTypingAfter,
}

impl TrackedRangeStickiness {
    pub fn start_sticks_to_previous_character(self) -> bool {
        matches!(
            self,
            Self::AlwaysGrowsWhenTypingAtEdges | Self::GrowsOnlyWhenTypingBefore
        )
    }

    pub fn end_sticks_to_previous_character(self) -> bool {
        matches!(
            self,
            Self::NeverGrowsWhenTypingAtEdges | Self::GrowsOnlyWhenTypingBefore
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverviewRulerLane {
    Left,
    #[default]
    Center,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverviewRulerOptions {
    pub color: String,
    pub dark_color: String,
    #[serde(default)]
    pub position: OverviewRulerLane,
}

/// Decoration options as supplied by callers.
///
/// Every field is optional. `show_in_overview_ruler` is the legacy way to
/// ask for an overview ruler mark (a bare colour); `overview_ruler` wins when
/// both are given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationOptions {
    pub stickiness: Option<TrackedRangeStickiness>,
    pub class_name: Option<String>,
    pub hover_message: Option<String>,
    pub glyph_margin_class_name: Option<String>,
    pub lines_decorations_class_name: Option<String>,
    pub margin_class_name: Option<String>,
    pub inline_class_name: Option<String>,
    pub before_content_class_name: Option<String>,
    pub after_content_class_name: Option<String>,
    pub is_whole_line: bool,
    pub show_in_overview_ruler: Option<String>,
    pub overview_ruler: Option<OverviewRulerOptions>,
}

impl DecorationOptions {
    pub fn with_class_name(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    pub fn stickiness(mut self, stickiness: TrackedRangeStickiness) -> Self {
        self.stickiness = Some(stickiness);
        self
    }

    pub fn whole_line(mut self) -> Self {
        self.is_whole_line = true;
        self
    }
}

/// Decoration options after normalization.
///
/// Defaults are resolved, class names cleaned and the legacy overview ruler
/// field folded in exactly once, so comparing two option sets is a plain
/// field-by-field equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelDecorationOptions {
    pub stickiness: TrackedRangeStickiness,
    pub class_name: Option<String>,
    pub hover_message: Option<String>,
    pub glyph_margin_class_name: Option<String>,
    pub lines_decorations_class_name: Option<String>,
    pub margin_class_name: Option<String>,
    pub inline_class_name: Option<String>,
    pub before_content_class_name: Option<String>,
    pub after_content_class_name: Option<String>,
    pub is_whole_line: bool,
    pub overview_ruler: Option<OverviewRulerOptions>,
    pub is_for_validation: bool,
}

impl ModelDecorationOptions {
    pub fn normalize(options: DecorationOptions) -> Self {
        let class_name = clean_class_name(options.class_name);
        let is_for_validation = matches!(
            class_name.as_deref(),
            Some(ERROR_CLASS_NAME | WARNING_CLASS_NAME | INFO_CLASS_NAME)
        );
        let overview_ruler = options.overview_ruler.or_else(|| {
            options
                .show_in_overview_ruler
                .filter(|color| !color.is_empty())
                .map(|color| OverviewRulerOptions {
                    dark_color: color.clone(),
                    color,
                    position: OverviewRulerLane::Center,
                })
        });

        Self {
            stickiness: options.stickiness.unwrap_or_default(),
            class_name,
            hover_message: options.hover_message,
            glyph_margin_class_name: clean_class_name(options.glyph_margin_class_name),
            lines_decorations_class_name: clean_class_name(options.lines_decorations_class_name),
            margin_class_name: clean_class_name(options.margin_class_name),
            inline_class_name: clean_class_name(options.inline_class_name),
            before_content_class_name: clean_class_name(options.before_content_class_name),
            after_content_class_name: clean_class_name(options.after_content_class_name),
            is_whole_line: options.is_whole_line,
            overview_ruler,
            is_for_validation,
        }
    }
}

impl From<DecorationOptions> for ModelDecorationOptions {
    fn from(options: DecorationOptions) -> Self {
        Self::normalize(options)
    }
}

impl Default for ModelDecorationOptions {
    fn default() -> Self {
        Self::normalize(DecorationOptions::default())
    }
}

/// Characters outside `[A-Za-z0-9-]` become spaces; empty names are dropped.
fn clean_class_name(class_name: Option<String>) -> Option<String> {
    let class_name = class_name?;
    let cleaned: String = class_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                ' '
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
