use serde::{Deserialize, Serialize};

/// Represents a single axis extent in an operand shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Static(usize),
    Dynamic,
}

/// Ordered list of operand dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dimension>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<Dimension>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn from_static(dims: &[usize]) -> Self {
        Self::new(
            dims.iter()
                .copied()
                .map(Dimension::Static)
                .collect::<Vec<_>>(),
        )
    }

    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|dim| matches!(dim, Dimension::Dynamic))
    }

    /// Returns static dimensions when all dims are static.
    pub fn static_dims(&self) -> Option<Vec<usize>> {
        static_dims(&self.dims)
    }

    /// Returns element count when all dims are static.
    pub fn element_count(&self) -> Option<usize> {
        element_count(&self.dims)
    }
}

pub fn static_dims(dims: &[Dimension]) -> Option<Vec<usize>> {
    let mut out = Vec::with_capacity(dims.len());
    for dim in dims {
        match dim {
            Dimension::Static(value) => out.push(*value),
            Dimension::Dynamic => return None,
        }
    }
    Some(out)
}

/// Element count of a fully static dimension list; a rank-0 list counts one element.
pub fn element_count(dims: &[Dimension]) -> Option<usize> {
    let mut count = 1usize;
    for dim in static_dims(dims)? {
        count = count.checked_mul(dim)?;
    }
    Some(count)
}
