//! Table-driven classification checks.
//!
//! Each [`Dimension`] maps one classification kind to a pair of guards, one
//! for presence and one for absence. Evaluating a table always yields exactly
//! one guard per dimension, so adding a checked dimension is a table entry,
//! not new control flow.

use std::collections::BTreeSet;

use action_primitives::GuardToken;

/// One independently checked property of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension<G> {
    name: String,
    classification: String,
    present: G,
    absent: G,
}

impl<G: GuardToken> Dimension<G> {
    /// Creates a dimension checking for `classification`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        classification: impl Into<String>,
        present: G,
        absent: G,
    ) -> Self {
        Self {
            name: name.into(),
            classification: classification.into(),
            present,
            absent,
        }
    }

    /// Returns the dimension name used in policy configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the classification whose presence is checked.
    #[must_use]
    pub fn classification(&self) -> &str {
        &self.classification
    }

    fn check(&self, classifications: &BTreeSet<String>) -> Finding<'_, G> {
        let present = classifications.contains(&self.classification);
        Finding {
            dimension: &self.name,
            present,
            guard: if present { self.present } else { self.absent },
        }
    }
}

/// Result of checking one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding<'a, G> {
    /// Name of the checked dimension.
    pub dimension: &'a str,
    /// Whether the classification was present.
    pub present: bool,
    /// The guard this dimension contributes.
    pub guard: G,
}

/// Ordered set of dimensions evaluated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionTable<G> {
    dimensions: Vec<Dimension<G>>,
}

impl<G: GuardToken> DimensionTable<G> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    /// Appends a dimension. A dimension with the same name replaces the old one.
    #[must_use]
    pub fn with(mut self, dimension: Dimension<G>) -> Self {
        self.dimensions.retain(|d| d.name != dimension.name);
        self.dimensions.push(dimension);
        self
    }

    /// Returns `true` when a dimension with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d.name == name)
    }

    /// Returns the dimension names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    /// Checks every dimension against the element's classifications.
    #[must_use]
    pub fn evaluate(&self, classifications: &BTreeSet<String>) -> Vec<Finding<'_, G>> {
        self.dimensions
            .iter()
            .map(|dimension| dimension.check(classifications))
            .collect()
    }
}

impl<G: GuardToken> Default for DimensionTable<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use action_primitives::CompletionStatus;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Labelled,
        Unlabelled,
        Signed,
        Unsigned,
    }

    impl GuardToken for Tag {
        fn all() -> &'static [Self] {
            &[Self::Labelled, Self::Unlabelled, Self::Signed, Self::Unsigned]
        }

        fn name(self) -> &'static str {
            match self {
                Self::Labelled => "labelled",
                Self::Unlabelled => "unlabelled",
                Self::Signed => "signed",
                Self::Unsigned => "unsigned",
            }
        }

        fn description(self) -> &'static str {
            "tag"
        }

        fn typical_completion_status(self) -> CompletionStatus {
            CompletionStatus::Actioned
        }
    }

    fn table() -> DimensionTable<Tag> {
        DimensionTable::new()
            .with(Dimension::new("label", "Label", Tag::Labelled, Tag::Unlabelled))
            .with(Dimension::new("signature", "Signature", Tag::Signed, Tag::Unsigned))
    }

    #[test]
    fn one_guard_per_dimension() {
        let table = table();
        for classes in [
            vec![],
            vec!["Label"],
            vec!["Signature"],
            vec!["Label", "Signature", "Other"],
        ] {
            let set: BTreeSet<String> = classes.into_iter().map(String::from).collect();
            let findings = table.evaluate(&set);
            assert_eq!(findings.len(), 2);
            assert_eq!(findings[0].dimension, "label");
            assert_eq!(findings[0].present, set.contains("Label"));
            assert_eq!(findings[1].present, set.contains("Signature"));
        }
    }

    #[test]
    fn replacing_a_dimension_keeps_names_unique() {
        let table = table().with(Dimension::new("label", "Tag", Tag::Labelled, Tag::Unlabelled));
        assert_eq!(table.names().collect::<Vec<_>>(), ["signature", "label"]);
        assert!(table.contains("label"));
        assert!(!table.contains("owner"));
    }
}
