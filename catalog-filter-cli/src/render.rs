use catalog_filter::AttributeValue;
use catalog_filter::CatalogEntry;
use catalog_filter::CatalogView;
use catalog_filter::Facet;
use catalog_filter::FilterSelection;
use catalog_filter::OperationMetrics;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn for_stdout() -> Self {
        Self {
            enabled: supports_color::on_cached(supports_color::Stream::Stdout).is_some(),
        }
    }

    fn heading(self, text: &str) -> String {
        if self.enabled {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(self, text: &str) -> String {
        if self.enabled {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    sequence: u64,
    selection: &'a FilterSelection,
    total: usize,
    matched: usize,
    entries: Vec<&'a CatalogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    facets: Option<Vec<Facet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<Vec<MetricSummary>>,
}

#[derive(Debug, Serialize)]
struct MetricSummary {
    name: String,
    samples: u64,
    failures: u64,
    slow: u64,
    average_ms: f64,
    last_ms: f64,
}

impl From<OperationMetrics> for MetricSummary {
    fn from(metrics: OperationMetrics) -> Self {
        Self {
            name: metrics.name,
            samples: metrics.samples,
            failures: metrics.failures,
            slow: metrics.slow,
            average_ms: metrics.average.as_secs_f64() * 1000.0,
            last_ms: metrics.last.as_secs_f64() * 1000.0,
        }
    }
}

impl<'a> Report<'a> {
    pub fn new(
        view: &'a CatalogView,
        total: usize,
        facets: Option<Vec<Facet>>,
        metrics: Option<Vec<OperationMetrics>>,
    ) -> Self {
        Self {
            sequence: view.sequence,
            selection: &view.selection,
            total,
            matched: view.len(),
            entries: view.entries.iter().map(Arc::as_ref).collect(),
            facets,
            metrics: metrics.map(|report| report.into_iter().map(MetricSummary::from).collect()),
        }
    }

    pub fn render(&self, palette: Palette) -> String {
        let mut out = String::new();
        let filter = if self.selection.is_empty() {
            "no filter".to_string()
        } else {
            let values: Vec<&str> = self.selection.iter().map(AttributeValue::as_str).collect();
            values.join(" + ")
        };
        let _ = writeln!(
            out,
            "{}",
            palette.heading(&format!(
                "{} of {} entries match {filter}",
                self.matched, self.total
            ))
        );
        for entry in &self.entries {
            let _ = writeln!(out, "{}", entry_line(entry, palette));
        }

        if let Some(facets) = &self.facets {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", palette.heading("Available values"));
            if facets.is_empty() {
                let _ = writeln!(out, "  {}", palette.dim("none"));
            }
            for facet in facets {
                let _ = writeln!(out, "  {:<8} {}", facet.value, facet.count);
            }
        }

        if let Some(metrics) = &self.metrics {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", palette.heading("Timings"));
            for metric in metrics {
                let _ = writeln!(
                    out,
                    "  {:<18} {:>4} samples  avg {:>8.3}ms  last {:>8.3}ms",
                    metric.name, metric.samples, metric.average_ms, metric.last_ms
                );
            }
        }
        out
    }
}

fn entry_line(entry: &CatalogEntry, palette: Palette) -> String {
    let sizes: Vec<&str> = entry.attributes.iter().map(AttributeValue::as_str).collect();
    let mut line = format!(
        "  {:<10} {:<28} {:>10.2} {}",
        entry.id, entry.title, entry.price, entry.currency
    );
    if entry.installments > 1 {
        let _ = write!(line, "  {}x", entry.installments);
    }
    let _ = write!(line, "  [{}]", sizes.join(", "));
    if entry.free_shipping {
        let _ = write!(line, "  {}", palette.dim("free shipping"));
    }
    line
}
