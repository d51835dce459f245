//! Classification of an entry's produced value into one execution mode.

use futures::{StreamExt, TryStreamExt};
use serde_json::Value;

use crate::{
    error::BoxError,
    producer::{ItemStream, ProducerStream, Source},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Parallel,
    Sequential,
    Single,
}

pub enum Dispatch {
    Parallel(ItemStream),
    Sequential(ProducerStream),
    Single(Value),
}

impl Dispatch {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Parallel(_) => Mode::Parallel,
            Self::Sequential(_) => Mode::Sequential,
            Self::Single(_) => Mode::Single,
        }
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(value) => f.debug_tuple("Single").field(value).finish(),
            other => write!(f, "{:?}(..)", other.mode()),
        }
    }
}

/// Rules, first match wins:
/// 1. protected items: the whole produced value is one item (streams are
///    drained into an array first);
/// 2. incremental producer: sequential, one item per produced value;
/// 3. iterable value or stream: parallel, one item per element;
/// 4. anything else: one item.
pub async fn classify(source: Source, protected_items: bool) -> Result<Dispatch, BoxError> {
    if protected_items {
        let whole = match source {
            Source::Value(value) => value,
            Source::Iterable(stream) => Value::Array(stream.collect().await),
            Source::Incremental(producer) => Value::Array(producer.try_collect().await?),
        };
        return Ok(Dispatch::Single(whole));
    }

    Ok(match source {
        Source::Incremental(producer) => Dispatch::Sequential(producer),
        Source::Iterable(stream) => Dispatch::Parallel(stream),
        Source::Value(Value::Array(values)) => {
            Dispatch::Parallel(futures::stream::iter(values).boxed())
        }
        Source::Value(value) => Dispatch::Single(value),
    })
}
