use metrics_aggregate::{aggregate, add_aggregate_observations, AggregationSpec, Expansion, FieldId, Row};
use metrics_model::Observation;
use pretty_assertions::assert_eq;

fn like_rows() -> Vec<Row> {
    ["yes", "no", "no", "yes", "yes"]
        .into_iter()
        .map(|like| Row::new().with("like_answer", like))
        .collect()
}

fn like_height_rows() -> Vec<Row> {
    [
        ("yes", "tall"),
        ("no", "tall"),
        ("no", "tall"),
        ("yes", "short"),
        ("yes", "short"),
    ]
    .into_iter()
    .map(|(like, height)| {
        Row::new()
            .with("like_answer", like)
            .with("height_answer", height)
    })
    .collect()
}

fn like_height_hair_rows() -> Vec<Row> {
    [
        ("yes", "tall", "lots"),
        ("no", "tall", "lots"),
        ("no", "tall", "lots"),
        ("yes", "short", "none"),
        ("yes", "short", "lots"),
    ]
    .into_iter()
    .map(|(like, height, hair)| {
        Row::new()
            .with("like_answer", like)
            .with("height_answer", height)
            .with("hair_answer", hair)
    })
    .collect()
}

type Expected<'a> = (&'a str, &'a str, Option<&'a str>, Option<&'a str>);

fn summarize(observations: &[Observation]) -> Vec<Expected<'_>> {
    observations
        .iter()
        .map(|o| {
            (
                o.measure.as_deref().unwrap(),
                o.dimension_value("answer").unwrap(),
                o.dimension_value("height"),
                o.dimension_value("hair"),
            )
        })
        .collect()
}

#[test]
fn no_dimensions_counts_each_answer() {
    let observations = aggregate(&like_rows(), &AggregationSpec::new("like_answer", "answer"));

    assert_eq!(
        observations,
        vec![
            Observation::with_measure("000000001", "2").dimension("answer", "no"),
            Observation::with_measure("000000002", "3").dimension("answer", "yes"),
        ]
    );
}

#[test]
fn one_dimension_emits_bare_then_combined() {
    let spec = AggregationSpec::new("like_answer", "answer").dimension("height_answer", "height");
    let observations = aggregate(&like_height_rows(), &spec);

    assert_eq!(
        summarize(&observations),
        vec![
            ("2", "no", None, None),
            ("3", "yes", None, None),
            ("0", "no", Some("short"), None),
            ("2", "no", Some("tall"), None),
            ("2", "yes", Some("short"), None),
            ("1", "yes", Some("tall"), None),
        ]
    );
}

#[test]
fn two_dimensions_accumulate_levels() {
    let spec = AggregationSpec::new("like_answer", "answer")
        .dimension("height_answer", "height")
        .dimension("hair_answer", "hair");
    let observations = aggregate(&like_height_hair_rows(), &spec);

    assert_eq!(observations.len(), 18);
    assert_eq!(
        summarize(&observations),
        vec![
            ("2", "no", None, None),
            ("3", "yes", None, None),
            ("0", "no", Some("short"), None),
            ("2", "no", Some("tall"), None),
            ("2", "yes", Some("short"), None),
            ("1", "yes", Some("tall"), None),
            ("2", "no", None, Some("lots")),
            ("0", "no", None, Some("none")),
            ("2", "yes", None, Some("lots")),
            ("1", "yes", None, Some("none")),
            ("0", "no", Some("short"), Some("lots")),
            ("0", "no", Some("short"), Some("none")),
            ("2", "no", Some("tall"), Some("lots")),
            ("0", "no", Some("tall"), Some("none")),
            ("1", "yes", Some("short"), Some("lots")),
            ("1", "yes", Some("short"), Some("none")),
            ("1", "yes", Some("tall"), Some("lots")),
            ("0", "yes", Some("tall"), Some("none")),
        ]
    );

    let ids: Vec<_> = observations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids.first(), Some(&"000000001"));
    assert_eq!(ids.last(), Some(&"000000018"));
}

#[test]
fn exponential_alias_matches_the_default() {
    let spec = AggregationSpec::new("like_answer", "answer")
        .dimension("height_answer", "height")
        .dimension("hair_answer", "hair");
    let from_job: AggregationSpec = serde_json::from_str(
        r#"{
            "field": "like_answer",
            "answer_dimension": "answer",
            "dimensions": [
                {"field": "height_answer", "dimension_name": "height"},
                {"field": "hair_answer", "dimension_name": "hair"}
            ],
            "expansion": "exponential"
        }"#,
    )
    .unwrap();

    assert_eq!(from_job.expansion, Expansion::Accumulated);
    assert_eq!(aggregate(&like_height_hair_rows(), &from_job), aggregate(&like_height_hair_rows(), &spec));
}

#[test]
fn unknown_dimension_fields_anywhere_leave_output_unchanged() {
    let expected = aggregate(
        &like_height_hair_rows(),
        &AggregationSpec::new("like_answer", "answer")
            .dimension("height_answer", "height")
            .dimension("hair_answer", "hair"),
    );

    let specs = [
        AggregationSpec::new("like_answer", "answer")
            .dimension("shoe_answer", "shoe")
            .dimension("height_answer", "height")
            .dimension("hair_answer", "hair"),
        AggregationSpec::new("like_answer", "answer")
            .dimension("height_answer", "height")
            .dimension("shoe_answer", "shoe")
            .dimension("hair_answer", "hair"),
        AggregationSpec::new("like_answer", "answer")
            .dimension("height_answer", "height")
            .dimension("hair_answer", "hair")
            .dimension("shoe_answer", "shoe"),
    ];
    for spec in &specs {
        assert_eq!(aggregate(&like_height_hair_rows(), spec), expected);
    }
}

#[test]
fn three_dimensions_include_every_subset() {
    let rows: Vec<Row> = like_height_hair_rows()
        .into_iter()
        .zip(["blue", "brown", "blue", "brown", "brown"])
        .map(|(row, eyes)| row.with("eyes_answer", eyes))
        .collect();
    let spec = AggregationSpec::new("like_answer", "answer")
        .dimension("height_answer", "height")
        .dimension("hair_answer", "hair")
        .dimension("eyes_answer", "eyes");

    let observations = aggregate(&rows, &spec);
    assert_eq!(observations.len(), 2 + 4 + 12 + 36);
    assert_eq!(observations.last().unwrap().id, "000000054");

    // The first 18 are exactly the two-dimension output.
    let two = aggregate(
        &rows,
        &AggregationSpec::new("like_answer", "answer")
            .dimension("height_answer", "height")
            .dimension("hair_answer", "hair"),
    );
    assert_eq!(observations[..18], two[..]);

    let height_eyes: Vec<_> = observations
        .iter()
        .filter(|o| o.dimensions.len() == 3 && o.dimensions.contains_key("height") && o.dimensions.contains_key("eyes"))
        .map(|o| {
            (
                o.dimension_value("answer").unwrap(),
                o.dimension_value("height").unwrap(),
                o.dimension_value("eyes").unwrap(),
                o.measure.as_deref().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        height_eyes,
        vec![
            ("no", "short", "blue", "0"),
            ("no", "short", "brown", "0"),
            ("no", "tall", "blue", "1"),
            ("no", "tall", "brown", "1"),
            ("yes", "short", "blue", "0"),
            ("yes", "short", "brown", "2"),
            ("yes", "tall", "blue", "1"),
            ("yes", "tall", "brown", "0"),
        ]
    );

    let total_with_all_three = observations
        .iter()
        .filter(|o| o.dimensions.len() == 4)
        .map(|o| o.measure.as_deref().unwrap().parse::<u64>().unwrap())
        .sum::<u64>();
    assert_eq!(total_with_all_three, 5);
}

#[test]
fn per_dimension_expansion_counts_each_dimension_alone() {
    let spec = AggregationSpec::new("like_answer", "answer")
        .dimension("height_answer", "height")
        .dimension("hair_answer", "hair")
        .expansion(Expansion::PerDimension);

    assert_eq!(
        summarize(&aggregate(&like_height_hair_rows(), &spec)),
        vec![
            ("2", "no", None, None),
            ("3", "yes", None, None),
            ("0", "no", Some("short"), None),
            ("2", "no", Some("tall"), None),
            ("2", "yes", Some("short"), None),
            ("1", "yes", Some("tall"), None),
            ("2", "no", None, Some("lots")),
            ("0", "no", None, Some("none")),
            ("2", "yes", None, Some("lots")),
            ("1", "yes", None, Some("none")),
        ]
    );
}

#[test]
fn rows_without_an_answer_are_ignored() {
    let mut rows = like_rows();
    rows.push(Row::new().with("like_answer", ""));
    rows.push(Row::new().with("other", "yes"));

    let observations = aggregate(&rows, &AggregationSpec::new("like_answer", "answer"));
    assert_eq!(summarize(&observations), vec![("2", "no", None, None), ("3", "yes", None, None)]);
}

#[test]
fn unknown_dimension_field_degrades_to_bare_counts() {
    let spec = AggregationSpec::new("like_answer", "answer").dimension("missing", "height");
    let observations = aggregate(&like_rows(), &spec);
    assert_eq!(observations.len(), 2);
}

#[test]
fn positional_fields_aggregate_like_named_ones() {
    let rows: Vec<Row> = [("yes", "tall"), ("no", "tall"), ("yes", "short")]
        .into_iter()
        .map(|(a, b)| Row::from_values([Some(a.to_string()), Some(b.to_string())]))
        .collect();
    let spec = AggregationSpec::new(0usize, "answer").dimension(FieldId::Index(1), "height");

    assert_eq!(
        summarize(&aggregate(&rows, &spec)),
        vec![
            ("1", "no", None, None),
            ("2", "yes", None, None),
            ("0", "no", Some("short"), None),
            ("1", "no", Some("tall"), None),
            ("1", "yes", Some("short"), None),
            ("1", "yes", Some("tall"), None),
        ]
    );
}

#[test]
fn sink_receives_the_same_sequence() {
    let spec = AggregationSpec::new("like_answer", "answer").dimension("height_answer", "height");
    let mut sink: Vec<Observation> = Vec::new();

    let emitted = add_aggregate_observations(&mut sink, &like_height_rows(), &spec).unwrap();

    assert_eq!(emitted, 6);
    assert_eq!(sink, aggregate(&like_height_rows(), &spec));
}

#[test]
fn no_rows_emit_nothing() {
    let spec = AggregationSpec::new("like_answer", "answer").dimension("height_answer", "height");
    assert!(aggregate(&[], &spec).is_empty());
}
