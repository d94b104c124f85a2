use log::trace;
use regex::Regex;

use crate::{
    error::{Error, Result},
    row::Row,
};

pub const DEFAULT_COMMENT_PATTERN: &str = "^#";

/// Decides whether a row's leading cell marks it as a comment.
#[derive(Debug, Clone)]
pub enum CommentMatcher {
    Pattern(Regex),
    Char(char),
}

impl CommentMatcher {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(CommentMatcher::Pattern)
            .map_err(|err| Error::configuration(format!("comment pattern '{pattern}': {err}")))
    }

    pub fn is_comment(&self, cell: &str) -> bool {
        match self {
            CommentMatcher::Pattern(regex) => regex.is_match(cell),
            CommentMatcher::Char(marker) => cell.starts_with(*marker),
        }
    }
}

impl Default for CommentMatcher {
    fn default() -> Self {
        CommentMatcher::Pattern(
            Regex::new(DEFAULT_COMMENT_PATTERN).expect("default comment pattern compiles"),
        )
    }
}

/// Drops positional rows whose first cell matches a [`CommentMatcher`], along
/// with rows that have no cells at all.
#[derive(Debug)]
pub struct RemoveComments<I> {
    upstream: I,
    matcher: CommentMatcher,
    dropped: usize,
}

impl<I> RemoveComments<I> {
    pub fn new(upstream: I, matcher: CommentMatcher) -> Self {
        Self {
            upstream,
            matcher,
            dropped: 0,
        }
    }

    /// Rows dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn keep(&self, row: &Row) -> Result<bool> {
        match row {
            Row::Positional(cells) => Ok(cells
                .first()
                .is_some_and(|cell| !self.matcher.is_comment(&cell.as_display()))),
            Row::Keyed(_) => Err(Error::configuration(
                "comment removal needs positional rows; run it before mappify",
            )),
        }
    }
}

impl<I> Iterator for RemoveComments<I>
where
    I: Iterator<Item = Result<Row>>,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.upstream.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(err)),
            };
            match self.keep(&row) {
                Ok(true) => return Some(Ok(row)),
                Ok(false) => {
                    self.dropped += 1;
                    trace!("Dropping comment row {:?}", row.to_strings());
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.upstream.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{RowStreamExt, rows_from_strings};

    fn collect(rows: impl Iterator<Item = Result<Row>>) -> Vec<Vec<String>> {
        rows.map(|row| row.unwrap().to_strings()).collect()
    }

    #[test]
    fn default_pattern_drops_hash_rows() {
        let rows = rows_from_strings(vec![vec!["#a comment"], vec!["x", "y"]]);
        assert_eq!(
            collect(rows.remove_comments(CommentMatcher::default())),
            vec![vec!["x", "y"]]
        );
    }

    #[test]
    fn comment_char_replaces_pattern() {
        let rows = rows_from_strings(vec![vec!["$c"], vec!["#kept", "y"]]);
        assert_eq!(
            collect(rows.remove_comments(CommentMatcher::Char('$'))),
            vec![vec!["#kept", "y"]]
        );
    }

    #[test]
    fn empty_rows_are_dropped() {
        let rows = rows_from_strings(vec![vec![], vec!["a"]]);
        let mut stage = rows.remove_comments(CommentMatcher::default());
        assert_eq!(stage.next().unwrap().unwrap().to_strings(), vec!["a"]);
        assert!(stage.next().is_none());
        assert_eq!(stage.dropped(), 1);
    }

    #[test]
    fn keyed_rows_are_rejected() {
        let keyed: Vec<Result<Row>> = vec![Ok(Row::Keyed([("a", "1")].into_iter().collect()))];
        let mut stage = keyed.into_iter().remove_comments(CommentMatcher::default());
        assert!(matches!(stage.next(), Some(Err(Error::Configuration(_)))));
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        assert!(matches!(
            CommentMatcher::pattern("("),
            Err(Error::Configuration(_))
        ));
    }
}
