//! Lane outcomes and collection slots.

use crate::errors::LaneError;

/// The terminal state of a lane.
///
/// Filtering travels through the same channel as failure so that every later
/// step can tell the three cases apart without inspecting the error.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The lane produced a value.
    Value(T),
    /// A predicate rejected the lane's value.
    Filtered,
    /// The lane failed.
    Failed(LaneError),
}

impl<T> Outcome<T> {
    /// Returns true if the lane produced a value.
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if the lane was filtered out.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered)
    }

    /// Returns true if the lane failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Applies `f` to a value, leaving filtered and failed outcomes untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Value(v) => Outcome::Value(f(v)),
            Self::Filtered => Outcome::Filtered,
            Self::Failed(e) => Outcome::Failed(e),
        }
    }

    /// Chains a step that can itself filter or fail.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Value(v) => f(v),
            Self::Filtered => Outcome::Filtered,
            Self::Failed(e) => Outcome::Failed(e),
        }
    }

    /// Replaces a failure with a recovered value. Filtered outcomes stay filtered.
    pub fn recover(self, f: impl FnOnce(&LaneError) -> T) -> Self {
        match self {
            Self::Failed(e) => Self::Value(f(&e)),
            other => other,
        }
    }

    /// Returns the failure cause, if any.
    #[must_use]
    pub fn error(&self) -> Option<&LaneError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Converts the outcome to a collection slot, dropping the discard reason.
    pub fn into_slot(self) -> Slot<T> {
        match self {
            Self::Value(v) => Slot::Present(v),
            Self::Filtered | Self::Failed(_) => Slot::Missing,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T>
where
    E: Into<anyhow::Error>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Failed(LaneError::new(e)),
        }
    }
}

/// A lane's position in a result collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    /// The lane contributed a value.
    Present(T),
    /// The lane was filtered or failed.
    Missing,
}

impl<T> Slot<T> {
    /// Returns true if the slot holds a value.
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Converts to an `Option`, for use with `filter_map`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(v) => Some(v),
            Self::Missing => None,
        }
    }
}

/// Drops missing slots, keeping the order of the present ones.
pub(crate) fn kept_values<T>(slots: impl IntoIterator<Item = Slot<T>>) -> impl Iterator<Item = T> {
    slots.into_iter().filter_map(Slot::into_option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_map_skips_filtered_and_failed() {
        assert!(matches!(Outcome::Value(2).map(|x| x * 10), Outcome::Value(20)));
        assert!(Outcome::<i32>::Filtered.map(|x| x * 10).is_filtered());

        let failed: Outcome<i32> = Outcome::Failed(LaneError::msg("boom"));
        let mapped = failed.map(|x| x * 10);
        assert_eq!(mapped.error().unwrap().to_string(), "boom");
    }

    #[test]
    fn test_recover_leaves_filtered_alone() {
        assert!(Outcome::<i32>::Filtered.recover(|_| -1).is_filtered());
        assert!(matches!(
            Outcome::Failed(LaneError::msg("boom")).recover(|_| -1),
            Outcome::Value(-1)
        ));
        assert!(matches!(Outcome::Value(3).recover(|_| -1), Outcome::Value(3)));
    }

    #[test]
    fn test_from_result() {
        let ok: Outcome<i32> = Ok::<_, anyhow::Error>(1).into();
        assert!(ok.is_value());

        let err: Outcome<i32> = Err::<i32, _>(anyhow::anyhow!("nope")).into();
        assert!(err.is_failed());
    }

    #[test]
    fn test_kept_values_drops_missing() {
        let slots = vec![
            Outcome::Value(1).into_slot(),
            Outcome::<i32>::Filtered.into_slot(),
            Outcome::Failed(LaneError::msg("x")).into_slot(),
            Outcome::Value(4).into_slot(),
        ];
        assert!(!slots[1].is_present());

        let kept: Vec<i32> = kept_values(slots).collect();
        assert_eq!(kept, vec![1, 4]);
    }
}
