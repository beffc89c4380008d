//! Type-keyed registry entries for feature slices.
//!
//! Slices are initialized once at startup, boxed behind [`FeatureSlice`] and looked up
//! again by concrete type from request handlers.

use std::any::{Any, TypeId};
use std::fmt::Debug;

/// State of one feature slice, shared across request handlers.
pub trait FeatureSlice: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Type name of the slice, e.g. `Links`.
    fn name(&self) -> &'static str;
}

/// A slice erased to a trait object, keyed by its concrete type.
#[derive(Debug)]
pub struct InitializedSlice {
    id: TypeId,
    state: Box<dyn FeatureSlice>,
}

impl InitializedSlice {
    pub fn new<T: FeatureSlice>(state: T) -> Self {
        Self { id: TypeId::of::<T>(), state: Box::new(state) }
    }

    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.state.name()
    }

    /// The slice as `T`, `None` when it holds another type.
    #[must_use]
    pub fn downcast_ref<T: FeatureSlice>(&self) -> Option<&T> {
        self.state.as_any().downcast_ref::<T>()
    }
}
