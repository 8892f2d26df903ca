pub mod types;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use compact_str::CompactString;

pub use self::types::{Category, TypeIndicator};

/// Reasons a path specification cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathSpecError {
    #[error("{0} path specification requires a parent")]
    MissingParent(TypeIndicator),
    #[error("{0} path specification cannot have a parent")]
    UnexpectedParent(TypeIndicator),
    #[error("{child} path specification requires a {expected} parent, got {found}")]
    WrongParent {
        child: TypeIndicator,
        expected: TypeIndicator,
        found: TypeIndicator,
    },
    #[error("{0} path specification requires a location")]
    MissingLocation(TypeIndicator),
}

/// Immutable descriptor of one layer in a stack of containers.
///
/// Equality and hashing cover the type, every parameter and the whole
/// parent chain, so two specs compare equal only when they address the
/// same logical layer through the same stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSpec {
    type_indicator: TypeIndicator,
    location: Option<CompactString>,
    identifier: Option<CompactString>,
    start_offset: Option<u64>,
    parent: Option<Arc<PathSpec>>,
}

impl PathSpec {
    pub fn builder(type_indicator: TypeIndicator) -> PathSpecBuilder {
        PathSpecBuilder {
            type_indicator,
            location: None,
            identifier: None,
            start_offset: None,
            parent: None,
        }
    }

    /// Path specification of a raw source on the host.
    pub fn os(path: impl AsRef<Path>) -> Self {
        PathSpec {
            type_indicator: TypeIndicator::Os,
            location: Some(CompactString::new(path.as_ref().to_string_lossy())),
            identifier: None,
            start_offset: None,
            parent: None,
        }
    }

    pub fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator
    }

    pub fn category(&self) -> Category {
        self.type_indicator.category()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn start_offset(&self) -> Option<u64> {
        self.start_offset
    }

    pub fn parent(&self) -> Option<&PathSpec> {
        self.parent.as_deref()
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Number of layers in the chain, including this one.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Iterate from this layer down to the root layer.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            current: Some(self),
        }
    }

    /// Bottom-most layer of the chain.
    pub fn root(&self) -> &PathSpec {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut layers: Vec<&PathSpec> = self.ancestors().collect();
        layers.reverse();

        for layer in layers {
            write!(f, "type: {}", layer.type_indicator)?;
            if let Some(location) = &layer.location {
                write!(f, ", location: {}", location)?;
            }
            if let Some(identifier) = &layer.identifier {
                write!(f, ", identifier: {}", identifier)?;
            }
            if let Some(offset) = layer.start_offset {
                write!(f, ", start offset: 0x{:08x}", offset)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Iterator over a path specification and its parents.
pub struct Ancestors<'a> {
    current: Option<&'a PathSpec>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a PathSpec;

    fn next(&mut self) -> Option<&'a PathSpec> {
        let spec = self.current?;
        self.current = spec.parent();
        Some(spec)
    }
}

/// Builder that validates the parent chain before producing a [`PathSpec`].
#[derive(Debug, Clone)]
pub struct PathSpecBuilder {
    type_indicator: TypeIndicator,
    location: Option<CompactString>,
    identifier: Option<CompactString>,
    start_offset: Option<u64>,
    parent: Option<Arc<PathSpec>>,
}

impl PathSpecBuilder {
    pub fn location(mut self, location: impl AsRef<str>) -> Self {
        self.location = Some(CompactString::new(location.as_ref()));
        self
    }

    pub fn identifier(mut self, identifier: impl AsRef<str>) -> Self {
        self.identifier = Some(CompactString::new(identifier.as_ref()));
        self
    }

    pub fn start_offset(mut self, offset: u64) -> Self {
        self.start_offset = Some(offset);
        self
    }

    pub fn maybe_start_offset(mut self, offset: Option<u64>) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn parent(mut self, parent: impl Into<Arc<PathSpec>>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn build(self) -> Result<PathSpec, PathSpecError> {
        let type_indicator = self.type_indicator;

        match (&self.parent, type_indicator) {
            (Some(_), TypeIndicator::Os) => {
                return Err(PathSpecError::UnexpectedParent(type_indicator));
            }
            (None, TypeIndicator::Os) => {
                if self.location.is_none() {
                    return Err(PathSpecError::MissingLocation(type_indicator));
                }
            }
            (None, _) => return Err(PathSpecError::MissingParent(type_indicator)),
            (Some(parent), _) => {
                if let Some(expected) = type_indicator.required_parent() {
                    if parent.type_indicator != expected {
                        return Err(PathSpecError::WrongParent {
                            child: type_indicator,
                            expected,
                            found: parent.type_indicator,
                        });
                    }
                }
            }
        }

        Ok(PathSpec {
            type_indicator,
            location: self.location,
            identifier: self.identifier,
            start_offset: self.start_offset,
            parent: self.parent,
        })
    }
}
