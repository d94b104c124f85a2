use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    row::Row,
};

/// Deserializes keyed records into `T`.
///
/// Field names are matched against record keys; use
/// [`MappifyOptions::snake_case_keys`](crate::transform::MappifyOptions::snake_case_keys)
/// when headers read like `Order ID` and fields like `order_id`. Cast
/// columns before this stage when `T` has numeric or boolean fields; string
/// cells are not coerced here.
#[derive(Debug)]
pub struct Structify<I, T> {
    upstream: I,
    _target: PhantomData<fn() -> T>,
}

impl<I, T> Structify<I, T> {
    pub fn new(upstream: I) -> Self {
        Self {
            upstream,
            _target: PhantomData,
        }
    }
}

impl<I, T> Iterator for Structify<I, T>
where
    I: Iterator<Item = Result<Row>>,
    T: DeserializeOwned,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.upstream.next()? {
            Ok(row) => row,
            Err(err) => return Some(Err(err)),
        };
        Some(match row {
            Row::Keyed(record) => serde_json::to_value(&record)
                .and_then(serde_json::from_value)
                .map_err(Error::from),
            Row::Positional(_) => Err(Error::configuration(
                "structify expects keyed records; mappify the rows first",
            )),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.upstream.size_hint()
    }
}
