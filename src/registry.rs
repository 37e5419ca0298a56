use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::error::SimError;

/// A named-singleton registry scoped to one environment.
///
/// Bindings are keyed by `(type, qualifier)` and become immutable once the
/// simulation starts, so components can resolve collaborators without the
/// lookup result changing under them mid-run.
#[derive(Default)]
pub struct Registry {
    bindings: HashMap<(TypeId, Option<String>), Box<dyn Any>>,
    frozen: bool,
}

impl Registry {
    /// Binds `value` as the singleton for its type, under an optional
    /// qualifier. Rebinding the same key replaces the previous value; any
    /// binding after the simulation started is rejected.
    pub fn bind<T: 'static>(&mut self, qualifier: Option<&str>, value: T) -> Result<(), SimError> {
        if self.frozen {
            return Err(SimError::domain(
                "dependency bindings are immutable once the simulation has started",
            ));
        }
        self.bindings.insert(
            (TypeId::of::<T>(), qualifier.map(ToString::to_string)),
            Box::new(value),
        );
        Ok(())
    }

    /// Resolves the singleton bound for `T` under `qualifier`.
    pub fn get<T: 'static>(&self, qualifier: Option<&str>) -> Result<&T, SimError> {
        self.bindings
            .get(&(TypeId::of::<T>(), qualifier.map(ToString::to_string)))
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .ok_or_else(|| {
                SimError::unavailable(format!(
                    "no binding for `{}`{}",
                    std::any::type_name::<T>(),
                    qualifier.map(|q| format!(" qualified `{}`", q)).unwrap_or_default()
                ))
            })
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bind_and_get_with_qualifiers() {
        let mut registry = Registry::default();
        registry.bind(None, 42_u32).unwrap();
        registry.bind(Some("other"), 7_u32).unwrap();
        assert_eq!(*registry.get::<u32>(None).unwrap(), 42);
        assert_eq!(*registry.get::<u32>(Some("other")).unwrap(), 7);
        assert!(matches!(
            registry.get::<String>(None),
            Err(SimError::Unavailable(_))
        ));
    }

    #[test]
    fn test_frozen_registry_rejects_bindings() {
        let mut registry = Registry::default();
        registry.bind(None, 1_u8).unwrap();
        registry.freeze();
        assert!(matches!(
            registry.bind(None, 2_u8),
            Err(SimError::Domain(_))
        ));
        // Reads keep working.
        assert_eq!(*registry.get::<u8>(None).unwrap(), 1);
    }
}
