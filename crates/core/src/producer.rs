use futures::{Stream, StreamExt, TryStreamExt, stream::BoxStream};
use serde_json::Value;

use crate::{error::BoxError, interceptor::Activation};

/// Elements of an iterable source; dispatched concurrently.
pub type ItemStream = BoxStream<'static, Value>;

/// Values pulled one at a time from an incremental producer.
pub type ProducerStream = BoxStream<'static, Result<Value, BoxError>>;

pub enum Source {
    /// A single produced value. Arrays fan out; anything else is one item.
    Value(Value),
    /// A finite or unbounded sequence whose elements fan out.
    Iterable(ItemStream),
    /// A producer that suspends between values; consumed strictly in order.
    Incremental(ProducerStream),
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Iterable(_) => f.write_str("Iterable(..)"),
            Self::Incremental(_) => f.write_str("Incremental(..)"),
        }
    }
}

/// What an entry hands back to the coordinator.
///
/// Any interceptor activations attached with [`Produced::within`] stay open
/// until every item has settled.
#[derive(Debug)]
pub struct Produced {
    source: Source,
    activations: Vec<Activation>,
}

impl Produced {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::from_source(Source::Value(value.into()))
    }

    pub fn items<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value> + 'static,
        I::IntoIter: Send + 'static,
    {
        Self::stream(futures::stream::iter(items.into_iter().map(Into::into)))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        Self::from_source(Source::Iterable(stream.boxed()))
    }

    pub fn incremental<S, E>(producer: S) -> Self
    where
        S: Stream<Item = Result<Value, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_source(Source::Incremental(
            producer.map_err(|error| -> BoxError { error.into() }).boxed(),
        ))
    }

    /// Keeps `activation` open while the produced items are dispatched.
    pub fn within(mut self, activation: Activation) -> Self {
        self.activations.push(activation);
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub(crate) fn into_parts(self) -> (Source, Vec<Activation>) {
        (self.source, self.activations)
    }

    fn from_source(source: Source) -> Self {
        Self {
            source,
            activations: Vec::new(),
        }
    }
}

impl From<Value> for Produced {
    fn from(value: Value) -> Self {
        Self::value(value)
    }
}

impl From<Source> for Produced {
    fn from(source: Source) -> Self {
        Self::from_source(source)
    }
}
