//! The scrape (text) formatter.
//!
//! Renders a registry's metrics in deterministic order as `name{k="v"}
//! value` lines, with a `# TYPE` line per metric.

use std::fmt::Write as _;

use crate::metric::Kind;
use crate::registry::Registry;

fn kind_str(kind: Kind) -> &'static str {
    match kind {
        Kind::Counter => "counter",
        Kind::Gauge => "gauge",
    }
}

/// Renders `registry` to a scrape-compatible text document.
///
/// Metrics are emitted in ascending name order; within a metric, cells are
/// ordered by their formatted label clause (including braces and quoted
/// values) for stable test output. Every metric's block ends with a blank
/// line.
pub fn render(registry: &Registry) -> String {
    let mut out = String::new();

    for (name, metric) in registry.iter() {
        writeln!(out, "# TYPE {name} {}", kind_str(metric.kind())).expect("String write cannot fail");

        let mut lines: Vec<(String, f64)> = metric
            .snapshot_cells()
            .iter()
            .map(|cell| (cell.labels().formatted(), cell.value()))
            .collect();
        lines.sort_by(|a, b| a.0.cmp(&b.0));

        for (label_clause, value) in lines {
            // `{:?}` (not `{}`) so whole-number floats keep their decimal
            // point, e.g. `1.0` rather than `1`.
            writeln!(out, "{name}{label_clause} {value:?}").expect("String write cannot fail");
        }

        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{LabelSchema, LabelType, LabelValue};
    use crate::metric::{labels, Metric};

    #[test]
    fn scenario_a_counter_with_labels() {
        let registry = Registry::new();
        let schema = LabelSchema::new([
            ("action".to_owned(), LabelType::String),
            ("response_code".to_owned(), LabelType::Int64),
        ]);
        let requests = Metric::grouped_counter(schema);
        registry.register(requests.clone(), "requests", false).unwrap();

        requests
            .counter_cell(&labels([("action", LabelValue::from("get")), ("response_code", LabelValue::from(404i64))]))
            .inc(1.0);
        requests
            .counter_cell(&labels([("action", LabelValue::from("put")), ("response_code", LabelValue::from(500i64))]))
            .inc(1.0);

        let expected = "# TYPE requests counter\n\
             requests{action=\"get\",response_code=\"404\"} 1.0\n\
             requests{action=\"put\",response_code=\"500\"} 1.0\n\n";
        assert_eq!(render(&registry), expected);
    }

    #[test]
    fn scenario_b_gauge_sorted_by_label_clause() {
        let registry = Registry::new();
        let schema = LabelSchema::new([
            ("location".to_owned(), LabelType::String),
            ("hour".to_owned(), LabelType::Int64),
        ]);
        let temperature = Metric::grouped_gauge(schema, 0.0);
        registry.register(temperature.clone(), "temperature", false).unwrap();

        temperature
            .gauge_cell(&labels([("location", LabelValue::from("outside")), ("hour", LabelValue::from(6i64))]))
            .set(36.0);
        temperature
            .gauge_cell(&labels([("location", LabelValue::from("outside")), ("hour", LabelValue::from(8i64))]))
            .set(40.0);
        temperature
            .gauge_cell(&labels([("location", LabelValue::from("inside")), ("hour", LabelValue::from(8i64))]))
            .set(60.0);

        let expected = "# TYPE temperature gauge\n\
             temperature{hour=\"6\",location=\"outside\"} 36.0\n\
             temperature{hour=\"8\",location=\"inside\"} 60.0\n\
             temperature{hour=\"8\",location=\"outside\"} 40.0\n\n";
        assert_eq!(render(&registry), expected);
    }

    #[test]
    fn scalar_metric_has_no_label_clause() {
        let registry = Registry::new();
        let uptime = Metric::gauge(0.0);
        registry.register(uptime.clone(), "uptime_seconds", false).unwrap();
        uptime.gauge_cell(&crate::label::LabelSet::empty()).set(120.0);

        assert_eq!(render(&registry), "# TYPE uptime_seconds gauge\nuptime_seconds 120.0\n\n");
    }

    #[test]
    fn scrape_is_deterministic_with_no_intervening_mutation() {
        let registry = Registry::new();
        registry.register(Metric::counter(), "a", false).unwrap();
        registry.register(Metric::gauge(0.0), "b", false).unwrap();

        let first = render(&registry);
        let second = render(&registry);
        assert_eq!(first, second);
    }

    #[test]
    fn metrics_are_emitted_in_name_order() {
        let registry = Registry::new();
        registry.register(Metric::counter(), "zebra", false).unwrap();
        registry.register(Metric::counter(), "apple", false).unwrap();

        let output = render(&registry);
        let apple_pos = output.find("apple").unwrap();
        let zebra_pos = output.find("zebra").unwrap();
        assert!(apple_pos < zebra_pos);
    }
}
