use std::sync::Arc;

use csv_stages::caster::ExceptionHandler;
use csv_stages::casts::{to_int, with_options};
use csv_stages::transform::{
    BatchExt, CastWithOptions, CommentMatcher, MappifyOptions, RowStreamExt, VectorizeOptions,
    rows_from_strings,
};
use csv_stages::{CastOptions, CastSpec, Column, Row, Value};
use proptest::prelude::*;

fn strings(rows: Vec<Row>) -> Vec<Vec<String>> {
    rows.iter().map(Row::to_strings).collect()
}

fn collect<I>(stream: I) -> Vec<Row>
where
    I: Iterator<Item = csv_stages::error::Result<Row>>,
{
    stream.collect::<Result<Vec<_>, _>>().expect("pipeline rows")
}

#[test]
fn mappify_captures_first_row_as_header() {
    let rows = rows_from_strings(vec![vec!["this", "that"], vec!["a", "b"], vec!["c", "d"]]);
    let records = collect(rows.mappify(MappifyOptions::default()));
    assert_eq!(records.len(), 2);
    let first = records[0].clone().into_record().expect("keyed");
    assert_eq!(first.keys().collect::<Vec<_>>(), vec!["this", "that"]);
    assert_eq!(first.get("that"), Some(&Value::from("b")));
}

#[test]
fn default_and_custom_comment_markers() {
    let input = vec![vec!["# hash"], vec!["$ dollar"], vec!["data"]];
    let hashed = collect(rows_from_strings(input.clone()).remove_comments(CommentMatcher::default()));
    assert_eq!(strings(hashed), vec![vec!["$ dollar"], vec!["data"]]);

    let dollar = collect(rows_from_strings(input).remove_comments(CommentMatcher::Char('$')));
    assert_eq!(strings(dollar), vec![vec!["# hash"], vec!["data"]]);
}

#[test]
fn cast_with_exception_handler_substitutes_value() {
    let handler: ExceptionHandler = Arc::new(|_: &Column, _: &Value| Value::from("stuff"));
    let spec = CastSpec::columns().with("that", with_options(to_int, CastOptions::default()));
    let rows = rows_from_strings(vec![vec!["this", "that"], vec!["a", "nope"], vec!["b", "78"]]);
    let records = collect(rows.mappify(MappifyOptions::default()).cast_with(
        spec,
        CastWithOptions {
            exception_handler: Some(handler),
            ..CastWithOptions::default()
        },
    ));
    let that = records
        .into_iter()
        .map(|row| row.into_record().expect("keyed").get("that").cloned())
        .collect::<Vec<_>>();
    assert_eq!(that, vec![Some(Value::from("stuff")), Some(Value::Int(78))]);
}

#[test]
fn coercion_failure_stops_at_the_failing_row() {
    let spec = CastSpec::columns().with("n", with_options(to_int, CastOptions::default()));
    let rows = rows_from_strings(vec![vec!["n"], vec!["1"], vec!["x"], vec!["3"]]);
    let mut stream = rows
        .mappify(MappifyOptions::default())
        .cast_with(spec, CastWithOptions::default());
    assert!(stream.next().expect("first row").is_ok());
    assert!(matches!(
        stream.next(),
        Some(Err(csv_stages::Error::Coercion { .. }))
    ));
}

#[test]
fn default_keys_survive_a_round_trip() {
    let input = vec![vec!["Order ID", "Name"], vec!["1", "ann"]];
    let output = collect(
        rows_from_strings(input)
            .mappify(MappifyOptions::default())
            .vectorize(VectorizeOptions::default()),
    );
    assert_eq!(
        strings(output),
        vec![vec!["Order ID", "Name"], vec!["1", "ann"]]
    );
}

#[test]
fn batching_twenty_rows_by_seven() {
    let rows = rows_from_strings((0..20).map(|i| vec![i.to_string()]));
    let sizes = rows.batch(7).map(|batch| batch.len()).collect::<Vec<_>>();
    assert_eq!(sizes, vec![7, 7, 6]);
}

#[test]
fn ragged_rows_zip_to_the_shorter_length() {
    let rows = rows_from_strings(vec![vec!["a", "b"], vec!["1"], vec!["1", "2", "3"]]);
    let records = collect(rows.mappify(MappifyOptions::default()))
        .into_iter()
        .map(|row| row.into_record().expect("keyed").len())
        .collect::<Vec<_>>();
    assert_eq!(records, vec![1, 2]);
}

fn cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9 ]{0,6}",
        "#[a-z ]{0,5}",
    ]
}

proptest! {
    #[test]
    fn remove_comments_is_idempotent(
        rows in proptest::collection::vec(proptest::collection::vec(cell(), 0..4), 0..12)
    ) {
        let once = collect(rows_from_strings(rows.clone()).remove_comments(CommentMatcher::default()));
        let twice = collect(
            rows_from_strings(rows)
                .remove_comments(CommentMatcher::default())
                .remove_comments(CommentMatcher::default()),
        );
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn vectorize_undoes_mappify(
        header in proptest::collection::hash_set("[A-Za-z][A-Za-z _]{0,6}[A-Za-z]", 1..5),
        body in proptest::collection::vec("[a-z0-9]{0,4}", 0..40),
    ) {
        let header = header.into_iter().collect::<Vec<_>>();
        let mut input = vec![header.clone()];
        input.extend(body.chunks(header.len()).filter(|c| c.len() == header.len()).map(<[String]>::to_vec));
        let output = collect(
            rows_from_strings(input.clone())
                .mappify(MappifyOptions::default())
                .vectorize(VectorizeOptions::default()),
        );
        let expected = if input.len() > 1 { input } else { Vec::new() };
        prop_assert_eq!(strings(output), expected);
    }
}
