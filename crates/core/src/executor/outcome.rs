use serde_json::Value;

use crate::error::{Error, ItemError};

/// Result of one item, tagged with its dispatch index.
#[derive(Debug)]
pub struct Outcome {
    pub index: usize,
    pub result: Result<Value, ItemError>,
}

impl Outcome {
    pub fn new(index: usize, result: Result<Value, ItemError>) -> Self {
        Self { index, result }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }

    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ItemError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<Value, Error> {
        let index = self.index;
        self.result.map_err(|source| Error::Item { index, source })
    }

    /// Passes a success through; turns a failure into the run-level error.
    pub fn into_checked(self) -> Result<Self, Error> {
        match self.result {
            Ok(value) => Ok(Self::new(self.index, Ok(value))),
            Err(source) => Err(Error::Item {
                index: self.index,
                source,
            }),
        }
    }
}

#[derive(Debug)]
pub enum RunResult {
    /// Parallel or sequential run: one outcome per dispatched item, in
    /// dispatch order.
    Batch(Vec<Outcome>),
    /// Single-item run.
    Single(Outcome),
    /// An item replaced the run's result.
    Overridden(Value),
}

impl RunResult {
    pub fn outcomes(&self) -> &[Outcome] {
        match self {
            Self::Batch(outcomes) => outcomes,
            Self::Single(outcome) => std::slice::from_ref(outcome),
            Self::Overridden(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes().is_empty()
    }

    pub fn is_overridden(&self) -> bool {
        matches!(self, Self::Overridden(_))
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes().iter().filter(|outcome| outcome.is_failure())
    }

    /// Fails with the lowest-index failure, if there is one.
    pub fn raise_first_failure(self) -> Result<Self, Error> {
        Ok(match self {
            Self::Batch(outcomes) => Self::Batch(
                outcomes
                    .into_iter()
                    .map(Outcome::into_checked)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Single(outcome) => Self::Single(outcome.into_checked()?),
            overridden @ Self::Overridden(_) => overridden,
        })
    }

    /// Collapses the result into one value: an array for batches, the item's
    /// value for single runs, the override as-is. Fails on the first failed
    /// outcome.
    pub fn into_value(self) -> Result<Value, Error> {
        match self {
            Self::Batch(outcomes) => outcomes
                .into_iter()
                .map(Outcome::into_result)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Self::Single(outcome) => outcome.into_result(),
            Self::Overridden(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_collapses_to_array() {
        let result = RunResult::Batch(vec![
            Outcome::new(0, Ok(json!("a"))),
            Outcome::new(1, Ok(json!("b"))),
        ]);
        assert_eq!(result.into_value().expect("all succeeded"), json!(["a", "b"]));
    }

    #[test]
    fn failed_outcome_surfaces_with_index() {
        let result = RunResult::Batch(vec![
            Outcome::new(0, Ok(json!(1))),
            Outcome::new(1, Err(ItemError::Cancelled)),
        ]);
        assert_eq!(result.failures().count(), 1);

        let error = result.raise_first_failure().expect_err("second item failed");
        assert_eq!(error.item_index(), Some(1));
    }

    #[test]
    fn single_and_override_expose_their_value() {
        let single = RunResult::Single(Outcome::new(0, Ok(json!(6))));
        assert_eq!(single.len(), 1);
        assert_eq!(single.into_value().expect("succeeded"), json!(6));

        let overridden = RunResult::Overridden(json!("found"));
        assert!(overridden.is_overridden());
        assert!(overridden.is_empty());
        assert_eq!(overridden.into_value().expect("override"), json!("found"));
    }
}
