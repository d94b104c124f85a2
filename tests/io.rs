mod common;

use csv_stages::io_utils::{ReadOptions, WriteOptions, read_csv, write_csv};
use csv_stages::plan::CastPlan;
use csv_stages::{CastKind, CastSpec, ProcessOptions, Row, Value};

use common::{ORDERS_CSV, TestWorkspace, lines};

#[test]
fn read_csv_keys_and_casts_a_file() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let options = ReadOptions {
        process: ProcessOptions {
            cast_fns: Some(
                CastSpec::columns()
                    .with_kind("order_id", CastKind::Long)
                    .with_kind("paid", CastKind::Boolean),
            ),
            ..ProcessOptions::default().snake_case_keys()
        },
        ..ReadOptions::default()
    };
    let rows = read_csv(&input, &options).expect("read orders");
    assert_eq!(rows.len(), 4);
    let last = rows[3].clone().into_record().expect("keyed");
    assert_eq!(
        last.keys().collect::<Vec<_>>(),
        vec!["order_id", "customer", "amount", "paid"]
    );
    assert_eq!(last.get("order_id"), Some(&Value::Long(4)));
    assert_eq!(last.get("paid"), Some(&Value::Boolean(false)));
    assert_eq!(last.get("amount"), Some(&Value::from("oops")));
}

#[test]
fn reading_fails_with_context_on_bad_cells() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let options = ReadOptions {
        process: ProcessOptions {
            cast_fns: Some(CastSpec::columns().with_kind("Amount", CastKind::Double)),
            ..ProcessOptions::default()
        },
        ..ReadOptions::default()
    };
    let err = read_csv(&input, &options).expect_err("oops is not a number");
    let message = format!("{err:#}");
    assert!(message.contains("orders.csv"), "{message}");
    assert!(message.contains("'Amount'"), "{message}");
}

#[test]
fn tsv_extension_selects_tab_delimiter() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("pairs.tsv", "k\tv\na\t1\n");
    let rows = read_csv(&input, &ReadOptions::default()).expect("read tsv");
    let record = rows[0].clone().into_record().expect("keyed");
    assert_eq!(record.get("v"), Some(&Value::from("1")));
}

#[test]
fn written_file_round_trips_through_read() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let rows = read_csv(&input, &ReadOptions::default()).expect("read orders");
    let output = workspace.path().join("copy.csv");
    let written = write_csv(&output, rows.clone(), &WriteOptions::default()).expect("write");
    assert_eq!(written, rows.len() + 1);
    assert_eq!(
        lines(&workspace.read("copy.csv")),
        vec![
            "Order ID,Customer,Amount,Paid",
            "1,Alice,42.5,yes",
            "2,Bob,13.37,no",
            "3,Cara,,t",
            "4,Dan,oops,f",
        ]
    );
    let again = read_csv(&output, &ReadOptions::default()).expect("read copy");
    assert_eq!(again, rows);
}

#[test]
fn write_casts_keyed_rows_by_column_key() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let rows = read_csv(&input, &ReadOptions::default()).expect("read orders");
    let output = workspace.path().join("paid.csv");
    let options = WriteOptions {
        cast_fns: Some(CastSpec::columns().with_kind("Paid", CastKind::Boolean)),
        ..WriteOptions::default()
    };
    write_csv(&output, rows, &options).expect("write with casts");
    assert_eq!(
        lines(&workspace.read("paid.csv")),
        vec![
            "Order ID,Customer,Amount,Paid",
            "1,Alice,42.5,true",
            "2,Bob,13.37,false",
            "3,Cara,,true",
            "4,Dan,oops,false",
        ]
    );
}

#[test]
fn positional_rows_are_written_verbatim() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("out.tsv");
    let rows = vec![Row::from_strings(["a", "b"]), Row::from_strings(["1", "2"])];
    write_csv(&output, rows, &WriteOptions::default()).expect("write tsv");
    assert_eq!(lines(&workspace.read("out.tsv")), vec!["a\tb", "1\t2"]);
}

#[test]
fn cast_plan_drives_read_casts() {
    let workspace = TestWorkspace::new();
    let plan_path = workspace.write(
        "plan.yaml",
        "columns:\n  - column: amount\n    kind: decimal\n    nil_fill: \"0\"\n",
    );
    let input = workspace.write("amounts.csv", "amount,note\n1.50,a\n,b\n2,c\n");
    let plan = CastPlan::load(&plan_path).expect("load plan");
    let options = ReadOptions {
        process: ProcessOptions {
            cast_fns: Some(plan.to_cast_spec().expect("plan spec")),
            ..ProcessOptions::default()
        },
        ..ReadOptions::default()
    };
    let amounts = read_csv(&input, &options)
        .expect("read amounts")
        .into_iter()
        .map(|row| row.into_record().expect("keyed").get("amount").map(Value::as_display))
        .collect::<Vec<_>>();
    assert_eq!(
        amounts,
        vec![
            Some("1.5".to_string()),
            Some("0".to_string()),
            Some("2".to_string())
        ]
    );
}
