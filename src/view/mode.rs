use std::fmt;

/// The presentations an editor can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    #[default]
    Continuous,
    Page,
    Typewriter,
    Manuscript,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [
        ViewMode::Continuous,
        ViewMode::Page,
        ViewMode::Typewriter,
        ViewMode::Manuscript,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ViewMode::Continuous => "continuous",
            ViewMode::Page => "page",
            ViewMode::Typewriter => "typewriter",
            ViewMode::Manuscript => "manuscript",
        }
    }

    /// Accepts the id plus a few common aliases.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "continuous" | "scroll" => Some(ViewMode::Continuous),
            "page" | "paginated" | "print" => Some(ViewMode::Page),
            "typewriter" | "focus" | "centerlock" => Some(ViewMode::Typewriter),
            "manuscript" => Some(ViewMode::Manuscript),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ViewMode::Continuous => "Continuous",
            ViewMode::Page => "Page",
            ViewMode::Typewriter => "Typewriter",
            ViewMode::Manuscript => "Manuscript",
        }
    }

    pub fn next(&self) -> Self {
        let index = Self::ALL.iter().position(|m| m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        let index = Self::ALL.iter().position(|m| m == self).unwrap_or(0);
        Self::ALL[(index + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip_and_aliases() {
        for mode in ViewMode::ALL {
            assert_eq!(ViewMode::from_id(mode.id()), Some(mode));
        }
        assert_eq!(ViewMode::from_id("Focus"), Some(ViewMode::Typewriter));
        assert_eq!(ViewMode::from_id("sideways"), None);
    }

    #[test]
    fn test_cycle() {
        assert_eq!(ViewMode::Manuscript.next(), ViewMode::Continuous);
        assert_eq!(ViewMode::Continuous.previous(), ViewMode::Manuscript);
    }
}
