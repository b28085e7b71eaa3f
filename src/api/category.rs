//! Allocation categories.

/// A tag for attributing allocations to an engine subsystem.
///
/// Categories are purely for accounting: every block belongs to exactly one
/// category for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocCategory {
    /// Anything without a more specific home.
    General = 0,
    /// Shared resources held by the registry.
    Assets = 1,
    /// Decoded texture data.
    Textures = 2,
    /// Decoded scene data.
    Scene = 3,
    /// Renderer-side staging and bookkeeping.
    Renderer = 4,
    /// Audio buffers.
    Audio = 5,
    /// UI and editor panels.
    Ui = 6,
    /// Short-lived scratch memory, typically from a linear arena.
    Temporary = 7,
}

impl AllocCategory {
    /// Number of categories.
    pub const COUNT: usize = 8;

    /// Every category, in index order.
    pub const ALL: [AllocCategory; Self::COUNT] = [
        AllocCategory::General,
        AllocCategory::Assets,
        AllocCategory::Textures,
        AllocCategory::Scene,
        AllocCategory::Renderer,
        AllocCategory::Audio,
        AllocCategory::Ui,
        AllocCategory::Temporary,
    ];

    /// Index into per-category tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Category for a stored index, if valid.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Get the category name.
    pub fn name(self) -> &'static str {
        match self {
            AllocCategory::General => "general",
            AllocCategory::Assets => "assets",
            AllocCategory::Textures => "textures",
            AllocCategory::Scene => "scene",
            AllocCategory::Renderer => "renderer",
            AllocCategory::Audio => "audio",
            AllocCategory::Ui => "ui",
            AllocCategory::Temporary => "temporary",
        }
    }
}

impl Default for AllocCategory {
    fn default() -> Self {
        Self::General
    }
}

impl std::fmt::Display for AllocCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for category in AllocCategory::ALL {
            assert_eq!(AllocCategory::from_index(category.index()), Some(category));
        }
        assert_eq!(AllocCategory::from_index(AllocCategory::COUNT), None);
    }
}
