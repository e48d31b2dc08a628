//! Prometheus text exposition for pass metrics
//!
//! Rendered on demand by the `/metrics` route of the API server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use std::fmt::Write;

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a gauge metric with f64 value
fn write_gauge_f64(output: &mut String, name: &str, help: &str, site: &str, val: f64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} gauge");
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val:.6}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
///
/// Takes a report, so the periodic histogram window restarts on each scrape.
pub fn format_prometheus_metrics(metrics: &Metrics, site_id: &str) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(4096);

    write_pass_metrics(&mut output, site_id, &summary);
    write_vehicle_metrics(&mut output, site_id, &summary);
    write_duration_metrics(&mut output, site_id, &summary);

    output
}

fn write_pass_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_passes_total",
        "Matching passes that produced a summary",
        MetricType::Counter,
        site,
        summary.passes_total,
    );
    write_metric(
        output,
        "parking_passes_failed_total",
        "Passes aborted by a snapshot load failure",
        MetricType::Counter,
        site,
        summary.passes_failed,
    );
    write_metric(
        output,
        "parking_passes_rejected_total",
        "Triggers refused while a pass was running",
        MetricType::Counter,
        site,
        summary.passes_rejected,
    );
    write_metric(
        output,
        "parking_passes_cancelled_total",
        "Passes stopped early by shutdown",
        MetricType::Counter,
        site,
        summary.passes_cancelled,
    );
    write_gauge_f64(
        output,
        "parking_passes_per_min",
        "Passes per minute since the previous report",
        site,
        summary.passes_per_min,
    );
    write_metric(
        output,
        "parking_last_pass_timestamp_ms",
        "Epoch ms at which the most recent pass started",
        MetricType::Gauge,
        site,
        summary.last_pass_at_ms,
    );
}

fn write_vehicle_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_vehicles_processed_total",
        "Vehicles evaluated across all passes",
        MetricType::Counter,
        site,
        summary.vehicles_processed,
    );
    write_metric(
        output,
        "parking_vehicles_matched_total",
        "Vehicles matched to a region",
        MetricType::Counter,
        site,
        summary.vehicles_matched,
    );
    write_metric(
        output,
        "parking_vehicles_unmatched_total",
        "Vehicles found in no region",
        MetricType::Counter,
        site,
        summary.vehicles_unmatched,
    );
    write_metric(
        output,
        "parking_last_pass_matched",
        "Vehicles matched in the most recent pass",
        MetricType::Gauge,
        site,
        summary.last_pass_matched,
    );
    write_metric(
        output,
        "parking_boundary_errors_total",
        "Region evaluations skipped for a malformed boundary",
        MetricType::Counter,
        site,
        summary.boundary_errors,
    );
    write_metric(
        output,
        "parking_write_failures_total",
        "Occupancy writes that failed",
        MetricType::Counter,
        site,
        summary.write_failures,
    );
}

fn write_duration_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_histogram(
        output,
        "parking_pass_duration_ms",
        "Pass duration in milliseconds",
        site,
        &summary.pass_duration_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.pass_duration_avg_ms,
    );
    write_metric(
        output,
        "parking_pass_duration_p50_ms",
        "Median pass duration",
        MetricType::Gauge,
        site,
        summary.pass_duration_p50_ms,
    );
    write_metric(
        output,
        "parking_pass_duration_p99_ms",
        "99th percentile pass duration",
        MetricType::Gauge,
        site,
        summary.pass_duration_p99_ms,
    );
    write_metric(
        output,
        "parking_pass_duration_max_ms",
        "Longest pass since the previous report",
        MetricType::Gauge,
        site,
        summary.pass_duration_max_ms,
    );
}
