//! Reserved attribute names shared between the builder and the SCope viewer.
//!
//! Every fixed key the viewer looks up lives here, so producer and consumer
//! cannot drift apart through scattered literals.

/// Fixed attribute keys understood by SCope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedKey {
    /// Row identity copied from the source gene index.
    VarNames,
    /// Column identity copied from the source cell index.
    ObsNames,
    /// Row identity duplicate the viewer searches genes by.
    Gene,
    /// Default 2D layout, a structured array with `_X`/`_Y` fields.
    Embedding,
    /// X coordinates of every registered embedding, one field per id.
    EmbeddingsX,
    /// Y coordinates of every registered embedding, one field per id.
    EmbeddingsY,
    /// Dataset title.
    Title,
    /// Compressed metadata registry.
    MetaData,
    /// First level of the viewer's file tree.
    TreeL1,
    /// Second level of the viewer's file tree.
    TreeL2,
    /// Third level of the viewer's file tree.
    TreeL3,
}

impl ReservedKey {
    /// The three hierarchy keys, outermost first.
    pub const HIERARCHY: [ReservedKey; 3] =
        [ReservedKey::TreeL1, ReservedKey::TreeL2, ReservedKey::TreeL3];

    /// The attribute name as stored in the file.
    pub const fn as_str(self) -> &'static str {
        match self {
            ReservedKey::VarNames => "var_names",
            ReservedKey::ObsNames => "obs_names",
            ReservedKey::Gene => "Gene",
            ReservedKey::Embedding => "Embedding",
            ReservedKey::EmbeddingsX => "Embeddings_X",
            ReservedKey::EmbeddingsY => "Embeddings_Y",
            ReservedKey::Title => "title",
            ReservedKey::MetaData => "MetaData",
            ReservedKey::TreeL1 => "SCopeTreeL1",
            ReservedKey::TreeL2 => "SCopeTreeL2",
            ReservedKey::TreeL3 => "SCopeTreeL3",
        }
    }
}

impl std::fmt::Display for ReservedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name of the default embedding's X coordinate.
pub const DEFAULT_X: &str = "_X";

/// Field name of the default embedding's Y coordinate.
pub const DEFAULT_Y: &str = "_Y";

/// Largest number of distinct values an annotation may carry.
pub const MAX_ANNOTATION_VALUES: usize = 245;

/// Loom layout version written next to the global attributes.
pub const LOOM_SPEC_VERSION: &str = "2.0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_keys_in_order() {
        let names: Vec<&str> = ReservedKey::HIERARCHY.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, ["SCopeTreeL1", "SCopeTreeL2", "SCopeTreeL3"]);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ReservedKey::EmbeddingsX.to_string(), "Embeddings_X");
        assert_eq!(ReservedKey::MetaData.to_string(), "MetaData");
    }
}
