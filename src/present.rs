//! Presentation helpers shared by the terminal view and the exporters.
//!
//! Everything here is pure formatting over a [`ComparisonResult`]: the row
//! layout (one column per policy, one row per field), tr-TR number
//! formatting, and the premium bar chart.

use crate::config::ResponseLanguage;
use crate::pipeline::contract::{ComparisonResult, ExtractedPolicyRecord};

/// Row labels for a comparison grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLabels {
    pub header: &'static str,
    pub policy_type: &'static str,
    pub premium: &'static str,
    pub coverage: &'static str,
    pub deductible: &'static str,
    pub limits: &'static str,
    pub pros: &'static str,
    pub cons: &'static str,
    pub summary: &'static str,
}

impl FieldLabels {
    /// Labels for the paginated report.
    pub fn report(language: ResponseLanguage) -> Self {
        match language {
            ResponseLanguage::Turkish => Self {
                header: "Özellik",
                policy_type: "Poliçe Türü",
                premium: "Fiyat",
                coverage: "Teminat",
                deductible: "Muafiyet",
                limits: "Limitler",
                pros: "Avantajlar",
                cons: "Eksiler",
                summary: "Özet:",
            },
            ResponseLanguage::English => Self::english(),
        }
    }

    /// Labels for the workbook and the terminal table.
    pub fn workbook(language: ResponseLanguage) -> Self {
        match language {
            ResponseLanguage::Turkish => Self {
                header: "Özellik",
                policy_type: "Poliçe Türü",
                premium: "Prim Tutarı",
                coverage: "Sigorta Bedeli",
                deductible: "Muafiyet",
                limits: "Önemli Limitler",
                pros: "Avantajlar",
                cons: "Dezavantajlar",
                summary: "Karşılaştırma Özeti:",
            },
            ResponseLanguage::English => Self::english(),
        }
    }

    fn english() -> Self {
        Self {
            header: "Feature",
            policy_type: "Policy Type",
            premium: "Premium",
            coverage: "Sum Insured",
            deductible: "Deductible",
            limits: "Key Limits",
            pros: "Advantages",
            cons: "Disadvantages",
            summary: "Comparison Summary:",
        }
    }
}

/// How list fields are laid out inside one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    /// One item per line, prefixed `• ` / `+ ` / `- ` for limits/pros/cons.
    Report,
    /// One item per line, no prefix.
    Workbook,
}

/// One field across all policies.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub label: String,
    pub cells: Vec<String>,
}

/// Header row: the label column title followed by each company name.
pub fn header_row(result: &ComparisonResult, labels: &FieldLabels) -> Vec<String> {
    std::iter::once(labels.header.to_string())
        .chain(result.policies.iter().map(|p| p.company_name.clone()))
        .collect()
}

/// The seven field rows, one cell per returned policy.
pub fn comparison_rows(
    result: &ComparisonResult,
    labels: &FieldLabels,
    style: ListStyle,
) -> Vec<ComparisonRow> {
    let policies = &result.policies;
    vec![
        field_row(labels.policy_type, policies, |p| p.policy_type.clone()),
        field_row(labels.premium, policies, |p| {
            format_premium(p.premium_amount, &p.currency)
        }),
        field_row(labels.coverage, policies, |p| p.coverage_amount.clone()),
        field_row(labels.deductible, policies, |p| p.deductible.clone()),
        field_row(labels.limits, policies, |p| list_cell(&p.limits, "•", style)),
        field_row(labels.pros, policies, |p| list_cell(&p.pros, "+", style)),
        field_row(labels.cons, policies, |p| list_cell(&p.cons, "-", style)),
    ]
}

fn field_row<F>(label: &str, policies: &[ExtractedPolicyRecord], cell: F) -> ComparisonRow
where
    F: Fn(&ExtractedPolicyRecord) -> String,
{
    ComparisonRow {
        label: label.to_string(),
        cells: policies.iter().map(cell).collect(),
    }
}

fn list_cell(items: &[String], prefix: &str, style: ListStyle) -> String {
    match style {
        ListStyle::Report => items
            .iter()
            .map(|i| format!("{prefix} {i}"))
            .collect::<Vec<_>>()
            .join("\n"),
        ListStyle::Workbook => items.join("\n"),
    }
}

/// Format a number the way tr-TR locales do: `.` groups thousands, `,`
/// separates at most three fraction digits.
///
/// ```
/// use edgequake_policy_compare::present::format_amount;
/// assert_eq!(format_amount(12500.0), "12.500");
/// assert_eq!(format_amount(1234567.891), "1.234.567,891");
/// ```
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    let negative = value < 0.0 && (grouped != "0" || !frac.is_empty());
    let sign = if negative { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped},{frac}")
    }
}

/// Premium with its currency, e.g. `12.500 TL`.
pub fn format_premium(value: f64, currency: &str) -> String {
    let amount = format_amount(value);
    if currency.trim().is_empty() {
        amount
    } else {
        format!("{amount} {}", currency.trim())
    }
}

/// One bar of the premium chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    /// Company name, shortened for the axis.
    pub label: String,
    pub amount: f64,
    /// Amount with currency for tooltips/annotations.
    pub display: String,
}

/// Chart series: one bar per policy, names over 15 characters cut to 12 + `...`.
pub fn chart_data(result: &ComparisonResult) -> Vec<ChartBar> {
    result
        .policies
        .iter()
        .map(|p| {
            let label = if p.company_name.chars().count() > 15 {
                format!("{}...", p.company_name.chars().take(12).collect::<String>())
            } else {
                p.company_name.clone()
            };
            ChartBar {
                label,
                amount: p.premium_amount,
                display: format!("{} {}", p.premium_amount, p.currency),
            }
        })
        .collect()
}

/// Render the premium chart as horizontal text bars.
///
/// `width` is the length of the longest bar; bars scale linearly to the
/// highest premium.
pub fn render_bar_chart(result: &ComparisonResult, width: usize) -> String {
    let bars = chart_data(result);
    let label_width = bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
    let max = bars.iter().map(|b| b.amount).fold(0.0_f64, f64::max);

    let mut out = String::new();
    for (bar, policy) in bars.iter().zip(&result.policies) {
        let len = if max > 0.0 && bar.amount > 0.0 {
            ((bar.amount / max) * width as f64).round().max(1.0) as usize
        } else {
            0
        };
        out.push_str(&format!(
            "{:<label_width$}  {}{}  {}\n",
            bar.label,
            "█".repeat(len),
            " ".repeat(width - len.min(width)),
            format_premium(policy.premium_amount, &policy.currency),
        ));
    }
    out
}

/// Render the comparison as a text grid for the terminal.
pub fn render_table(result: &ComparisonResult, labels: &FieldLabels, column_width: usize) -> String {
    let header = header_row(result, labels);
    let rows = comparison_rows(result, labels, ListStyle::Report);
    let label_width = rows
        .iter()
        .map(|r| r.label.chars().count())
        .chain(std::iter::once(labels.header.chars().count()))
        .max()
        .unwrap_or(0);

    let columns = result.policies.len();
    let rule = format!(
        "+{}+{}\n",
        "-".repeat(label_width + 2),
        format!("{}+", "-".repeat(column_width + 2)).repeat(columns)
    );

    let mut out = rule.clone();
    let header_cells: Vec<String> = header.iter().skip(1).cloned().collect();
    push_grid_row(&mut out, &header[0], &header_cells, label_width, column_width);
    out.push_str(&rule);
    for row in &rows {
        push_grid_row(&mut out, &row.label, &row.cells, label_width, column_width);
        out.push_str(&rule);
    }
    out
}

fn push_grid_row(
    out: &mut String,
    label: &str,
    cells: &[String],
    label_width: usize,
    column_width: usize,
) {
    let wrapped: Vec<Vec<String>> = cells.iter().map(|c| wrap_text(c, column_width)).collect();
    let height = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);

    for line in 0..height {
        let label_text = if line == 0 { label } else { "" };
        out.push_str(&format!("| {:<label_width$} |", label_text));
        for cell in &wrapped {
            let text = cell.get(line).map(String::as_str).unwrap_or("");
            out.push_str(&format!(" {:<column_width$} |", text));
        }
        out.push('\n');
    }
}

/// Greedy word wrap on character counts. Explicit newlines are kept; words
/// longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    wrap_measured(text, width.max(1) as f32, |s| s.chars().count() as f32)
}

/// Greedy word wrap where `measure` gives the rendered width of a string.
pub fn wrap_measured(text: &str, max: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            // Word alone exceeds the width: hard split.
            let mut rest = word;
            while measure(rest) > max {
                let cut = split_point(rest, max, &measure);
                lines.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            current = rest.to_string();
        }
        lines.push(current);
    }

    lines
}

/// Byte index of the longest prefix of `word` that fits; at least one char.
fn split_point(word: &str, max: f32, measure: &impl Fn(&str) -> f32) -> usize {
    let mut cut = 0;
    for (idx, c) in word.char_indices() {
        let end = idx + c.len_utf8();
        if cut > 0 && measure(&word[..end]) > max {
            break;
        }
        cut = end;
    }
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str, premium: f64) -> ExtractedPolicyRecord {
        ExtractedPolicyRecord {
            company_name: name.into(),
            policy_type: "Kasko".into(),
            premium_amount: premium,
            currency: "TL".into(),
            coverage_amount: "1.000.000 TL".into(),
            deductible: "%2".into(),
            limits: vec!["İMM 5M".into(), "Cam 10K".into()],
            pros: vec!["Hızlı hasar".into()],
            cons: vec![],
        }
    }

    fn result() -> ComparisonResult {
        ComparisonResult {
            policies: vec![policy("Anadolu Sigorta AŞ", 12500.0), policy("Allianz", 9800.5)],
            summary: "Özet".into(),
        }
    }

    #[test]
    fn format_amount_tr_locale() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1000.0), "1.000");
        assert_eq!(format_amount(12500.0), "12.500");
        assert_eq!(format_amount(9800.5), "9.800,5");
        assert_eq!(format_amount(1234567.25), "1.234.567,25");
        assert_eq!(format_amount(-1500.25), "-1.500,25");
    }

    #[test]
    fn format_premium_with_and_without_currency() {
        assert_eq!(format_premium(12500.0, "TL"), "12.500 TL");
        assert_eq!(format_premium(12500.0, " "), "12.500");
    }

    #[test]
    fn rows_have_one_cell_per_policy() {
        let rows = comparison_rows(&result(), &FieldLabels::workbook(ResponseLanguage::Turkish), ListStyle::Workbook);
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.cells.len() == 2));
        let premium = rows.iter().find(|r| r.label == "Prim Tutarı").unwrap();
        assert_eq!(premium.cells, vec!["12.500 TL", "9.800,5 TL"]);
        let limits = rows.iter().find(|r| r.label == "Önemli Limitler").unwrap();
        assert_eq!(limits.cells[0], "İMM 5M\nCam 10K");
    }

    #[test]
    fn report_style_prefixes_list_items() {
        let rows = comparison_rows(&result(), &FieldLabels::report(ResponseLanguage::Turkish), ListStyle::Report);
        assert_eq!(rows[4].cells[0], "• İMM 5M\n• Cam 10K");
        assert_eq!(rows[5].cells[0], "+ Hızlı hasar");
        assert_eq!(rows[6].cells[0], "");
    }

    #[test]
    fn header_lists_companies_in_order() {
        let h = header_row(&result(), &FieldLabels::workbook(ResponseLanguage::English));
        assert_eq!(h, vec!["Feature", "Anadolu Sigorta AŞ", "Allianz"]);
    }

    #[test]
    fn chart_labels_are_truncated() {
        let bars = chart_data(&result());
        assert_eq!(bars[0].label, "Anadolu Sigo...");
        assert_eq!(bars[1].label, "Allianz");
        assert_eq!(bars[0].display, "12500 TL");
    }

    #[test]
    fn bar_chart_scales_to_max() {
        let chart = render_bar_chart(&result(), 20);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('█').count(), 20);
        assert_eq!(lines[1].matches('█').count(), 16);
        assert!(lines[0].ends_with("12.500 TL"));
    }

    #[test]
    fn table_contains_every_label() {
        let labels = FieldLabels::workbook(ResponseLanguage::Turkish);
        let table = render_table(&result(), &labels, 20);
        for label in ["Poliçe Türü", "Prim Tutarı", "Sigorta Bedeli", "Dezavantajlar"] {
            assert!(table.contains(label), "missing {label}");
        }
        assert!(table.contains("12.500 TL"));
    }

    #[test]
    fn wrap_text_respects_width_and_newlines() {
        assert_eq!(wrap_text("a bb ccc", 4), vec!["a bb", "ccc"]);
        assert_eq!(wrap_text("x\ny", 10), vec!["x", "y"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("", 5), vec![""]);
    }
}
