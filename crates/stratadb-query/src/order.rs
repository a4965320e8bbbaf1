use serde::{Deserialize, Serialize};

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

///
/// TraversalMode
///
/// Order in which hierarchy nodes are visited when a reference ordering
/// traverses the referenced entity's hierarchy.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum TraversalMode {
    #[default]
    DepthFirst,
    BreadthFirst,
}

///
/// ReferenceOrderingSpecification
///
/// How a multi-valued reference maps its per-relation blocks onto the final
/// order: `TraverseBy` appends every block in traversal order, `PickFirstBy`
/// keeps one entry per distinct referenced entity.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ReferenceOrderingSpecification {
    TraverseBy {
        children: Vec<OrderConstraint>,
        mode: TraversalMode,
    },
    PickFirstBy {
        children: Vec<OrderConstraint>,
    },
}

///
/// OrderConstraint
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum OrderConstraint {
    EntityPrimaryKeyNatural(OrderDirection),
    AttributeNatural {
        name: String,
        direction: OrderDirection,
    },
    ReferenceProperty {
        reference_name: String,
        specification: Option<ReferenceOrderingSpecification>,
        children: Vec<Self>,
    },
}

///
/// OrderBy
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OrderBy(pub Vec<OrderConstraint>);

impl OrderBy {
    #[must_use]
    pub fn new(children: impl IntoIterator<Item = OrderConstraint>) -> Self {
        Self(children.into_iter().collect())
    }

    #[must_use]
    pub fn children(&self) -> &[OrderConstraint] {
        &self.0
    }
}

// constructor functions mirroring the query grammar

#[must_use]
pub const fn entity_primary_key_natural(direction: OrderDirection) -> OrderConstraint {
    OrderConstraint::EntityPrimaryKeyNatural(direction)
}

#[must_use]
pub fn attribute_natural(name: impl Into<String>, direction: OrderDirection) -> OrderConstraint {
    OrderConstraint::AttributeNatural {
        name: name.into(),
        direction,
    }
}

#[must_use]
pub fn reference_property(
    reference_name: impl Into<String>,
    specification: Option<ReferenceOrderingSpecification>,
    children: impl IntoIterator<Item = OrderConstraint>,
) -> OrderConstraint {
    OrderConstraint::ReferenceProperty {
        reference_name: reference_name.into(),
        specification,
        children: children.into_iter().collect(),
    }
}

#[must_use]
pub fn traverse_by_entity_property(
    mode: TraversalMode,
    children: impl IntoIterator<Item = OrderConstraint>,
) -> ReferenceOrderingSpecification {
    ReferenceOrderingSpecification::TraverseBy {
        children: children.into_iter().collect(),
        mode,
    }
}

#[must_use]
pub fn pick_first_by_entity_property(
    children: impl IntoIterator<Item = OrderConstraint>,
) -> ReferenceOrderingSpecification {
    ReferenceOrderingSpecification::PickFirstBy {
        children: children.into_iter().collect(),
    }
}
