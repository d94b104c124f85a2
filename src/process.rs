//! One-call pipeline assembly.
//!
//! [`process`] chains the standard stages in their fixed order: comment
//! removal on positional rows, then keying, then casting. Each stage depends
//! on the row shape the previous one established, so the order is not
//! configurable; only whether a stage runs.

use std::fmt;
use std::iter;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{
    caster::{CastSpec, ExceptionHandler},
    error::{Error, Result},
    row::{Column, Row, snake_case_key},
    transform::{
        CastWithOptions, CommentMatcher, HeaderFn, MappifyOptions, RowStream, RowStreamExt,
        comments::DEFAULT_COMMENT_PATTERN,
    },
};

#[derive(Clone)]
pub struct ProcessOptions {
    pub mappify: bool,
    pub keyify: bool,
    pub header: Option<Vec<String>>,
    pub transform_header: Option<HeaderFn>,
    /// Only honored by [`process_structs`].
    pub structs: bool,
    pub remove_comments: bool,
    pub comment_re: String,
    /// Takes precedence over `comment_re` when set.
    pub comment_char: Option<char>,
    pub cast_fns: Option<CastSpec>,
    pub cast_exception_handler: Option<ExceptionHandler>,
    pub cast_only: Option<Vec<Column>>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            mappify: true,
            keyify: true,
            header: None,
            transform_header: None,
            structs: false,
            remove_comments: true,
            comment_re: DEFAULT_COMMENT_PATTERN.to_string(),
            comment_char: None,
            cast_fns: None,
            cast_exception_handler: None,
            cast_only: None,
        }
    }
}

impl fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("mappify", &self.mappify)
            .field("keyify", &self.keyify)
            .field("header", &self.header)
            .field("transform_header", &self.transform_header.is_some())
            .field("structs", &self.structs)
            .field("remove_comments", &self.remove_comments)
            .field("comment_re", &self.comment_re)
            .field("comment_char", &self.comment_char)
            .field("cast_fns", &self.cast_fns)
            .field("cast_exception_handler", &self.cast_exception_handler.is_some())
            .field("cast_only", &self.cast_only)
            .finish()
    }
}

impl ProcessOptions {
    /// Captured header cells become `snake_case` keys.
    pub fn snake_case_keys(self) -> Self {
        Self {
            transform_header: Some(Arc::new(snake_case_key)),
            ..self
        }
    }

    pub fn comment_matcher(&self) -> Result<CommentMatcher> {
        match self.comment_char {
            Some(marker) => Ok(CommentMatcher::Char(marker)),
            None => CommentMatcher::pattern(&self.comment_re),
        }
    }

    fn mappify_options(&self) -> MappifyOptions {
        MappifyOptions {
            keyify: self.keyify,
            header: self.header.clone(),
            transform_header: self.transform_header.clone(),
        }
    }

    fn cast_options(&self) -> CastWithOptions {
        CastWithOptions {
            except_first: false,
            exception_handler: self.cast_exception_handler.clone(),
            only: self.cast_only.clone(),
        }
    }
}

fn failed<'a>(err: Error) -> RowStream<'a> {
    Box::new(iter::once(Err(err)))
}

fn stages<'a, I>(rows: I, options: &ProcessOptions) -> Result<RowStream<'a>>
where
    I: IntoIterator<Item = Result<Row>>,
    I::IntoIter: 'a,
{
    let mut stream: RowStream<'a> = Box::new(rows.into_iter());
    if options.remove_comments {
        stream = Box::new(stream.remove_comments(options.comment_matcher()?));
    }
    if options.mappify {
        stream = Box::new(stream.mappify(options.mappify_options()));
    }
    if let Some(spec) = &options.cast_fns {
        stream = Box::new(stream.cast_with(spec.clone(), options.cast_options()));
    }
    Ok(stream)
}

/// Builds the configured pipeline over `rows`.
///
/// Configuration problems (a bad comment pattern, `structs` requested here
/// rather than through [`process_structs`]) surface as the first item of the
/// returned stream.
pub fn process<'a, I>(rows: I, options: &ProcessOptions) -> RowStream<'a>
where
    I: IntoIterator<Item = Result<Row>>,
    I::IntoIter: 'a,
{
    if options.structs {
        return failed(Error::configuration(
            "structs output needs a target type; use process_structs",
        ));
    }
    stages(rows, options).unwrap_or_else(failed)
}

/// Runs the configured stages and deserializes each record into `T`.
pub fn process_structs<'a, T, I>(
    rows: I,
    options: &ProcessOptions,
) -> Box<dyn Iterator<Item = Result<T>> + 'a>
where
    T: DeserializeOwned + 'a,
    I: IntoIterator<Item = Result<Row>>,
    I::IntoIter: 'a,
{
    if !options.mappify {
        return Box::new(iter::once(Err(Error::configuration(
            "structs output requires mappify",
        ))));
    }
    match stages(rows, options) {
        Ok(stream) => Box::new(stream.structify::<T>()),
        Err(err) => Box::new(iter::once(Err(err))),
    }
}
