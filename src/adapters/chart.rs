//! Text price chart
//!
//! Draws a round's price history with a ratatui `Chart` into an off-screen
//! `Buffer` and prints its cells, with axis labels at the instrument's display
//! precision, followed by count/range/volatility lines.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    symbols,
    text::Span,
    widgets::{Axis, Chart, Dataset, GraphType, Widget},
};
use rust_decimal::prelude::*;

use crate::domain::quote::{format_price, round_display};

pub const DEFAULT_CHART_WIDTH: usize = 50;
pub const DEFAULT_CHART_HEIGHT: usize = 10;

/// Rows below the plot taken by the x axis line and its labels
const X_AXIS_ROWS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRenderer {
    width: usize,
    height: usize,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_WIDTH, DEFAULT_CHART_HEIGHT)
    }
}

impl ChartRenderer {
    /// Plot area of `width` columns by `height` rows, excluding axes
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(2),
            height: height.max(3),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Render the plot plus summary lines. Empty input renders nothing.
    pub fn render(&self, prices: &[Decimal], precision: u32) -> String {
        if prices.is_empty() {
            return String::new();
        }

        let (lower, middle, upper) = y_bounds(prices, precision);
        let y_labels: Vec<Span> = [lower, middle, upper]
            .iter()
            .map(|value| Span::raw(format_price(*value, precision)))
            .collect();
        let label_width = y_labels.iter().map(Span::width).max().unwrap_or(0);

        let points: Vec<(f64, f64)> = prices
            .iter()
            .enumerate()
            .map(|(i, price)| (i as f64, price.to_f64().unwrap_or_default()))
            .collect();
        let x_max = prices.len().saturating_sub(1).max(1) as f64;

        let chart = Chart::new(vec![Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .data(&points)])
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![Span::raw("1"), Span::raw(prices.len().to_string())]),
        )
        .y_axis(
            Axis::default()
                .bounds([
                    lower.to_f64().unwrap_or_default(),
                    upper.to_f64().unwrap_or_default(),
                ])
                .labels(y_labels),
        );

        let width = to_u16(label_width + 1 + self.width);
        let height = to_u16(self.height).saturating_add(X_AXIS_ROWS);
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        chart.render(area, &mut buf);

        let mut out = String::new();
        let rule = "-".repeat(usize::from(width));
        out.push_str(&rule);
        out.push('\n');
        for row in buf.content.chunks(usize::from(area.width)) {
            let line: String = row.iter().map(|cell| cell.symbol()).collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&summary(prices, precision));
        out
    }
}

/// Lower, middle and upper y-axis values. A flat history is padded by one
/// display step so the line sits mid-plot.
fn y_bounds(prices: &[Decimal], precision: u32) -> (Decimal, Decimal, Decimal) {
    let (low, high) = min_max(prices);
    let (lower, upper) = if low == high {
        let step = Decimal::new(1, precision);
        (low - step, high + step)
    } else {
        (low, high)
    };
    let middle = ((lower + upper) / Decimal::TWO).round_dp(precision);
    (lower, middle, upper)
}

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Count, range and volatility lines for a price history
pub fn summary(prices: &[Decimal], precision: u32) -> String {
    let (low, high) = min_max(prices);
    let mut out = format!("Data points: {}\n", prices.len());
    out.push_str(&format!(
        "Price range: {} - {}\n",
        format_price(low, precision),
        format_price(high, precision)
    ));
    if prices.len() > 1 {
        let swing = high - low;
        match volatility_percent(low, high) {
            Some(pct) => out.push_str(&format!(
                "Volatility: {} ({:.2}%)\n",
                format_price(swing, precision),
                pct
            )),
            None => out.push_str(&format!("Volatility: {}\n", format_price(swing, precision))),
        }
    }
    out
}

/// (high - low) / low as a rounded percentage
pub fn volatility_percent(low: Decimal, high: Decimal) -> Option<Decimal> {
    if low <= Decimal::ZERO {
        return None;
    }
    Some(round_display((high - low) / low * Decimal::ONE_HUNDRED))
}

fn min_max(prices: &[Decimal]) -> (Decimal, Decimal) {
    prices.iter().fold((prices[0], prices[0]), |(lo, hi), p| (lo.min(*p), hi.max(*p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn plot_lines(chart: &str, renderer: &ChartRenderer) -> Vec<String> {
        // rule, then one line per buffer row
        chart
            .lines()
            .skip(1)
            .take(renderer.height() + X_AXIS_ROWS as usize)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_empty_history_renders_nothing() {
        assert_eq!(ChartRenderer::default().render(&[], 2), "");
    }

    #[test]
    fn test_labels_use_precision() {
        let chart = ChartRenderer::new(20, 8).render(&[dec!(2.001), dec!(2.003)], 3);

        assert!(chart.contains("2.003"));
        assert!(chart.contains("2.002"));
        assert!(chart.contains("2.001"));
        assert!(chart.contains("Price range: 2.001 - 2.003"));
    }

    #[test]
    fn test_renders_every_buffer_row() {
        let renderer = ChartRenderer::new(30, 8);
        let chart = renderer.render(&[dec!(9.00), dec!(9.10), dec!(9.05)], 2);

        // rules + plot and axis rows + three summary lines
        assert_eq!(chart.lines().count(), 2 + 8 + 2 + 3);
        let plot = plot_lines(&chart, &renderer);
        assert!(plot.iter().any(|line| line.contains(symbols::DOT)));
    }

    #[test]
    fn test_flat_history() {
        let renderer = ChartRenderer::new(20, 6);
        let chart = renderer.render(&[dec!(9.04); 3], 2);

        assert!(chart.contains("9.03"));
        assert!(chart.contains("9.04"));
        assert!(chart.contains("9.05"));
        assert!(chart.contains("Volatility: 0.00 (0.00%)"));
    }

    #[test]
    fn test_y_bounds() {
        assert_eq!(
            y_bounds(&[dec!(9.00), dec!(9.10)], 2),
            (dec!(9.00), dec!(9.05), dec!(9.10))
        );
        assert_eq!(
            y_bounds(&[dec!(2.046)], 3),
            (dec!(2.045), dec!(2.046), dec!(2.047))
        );
    }

    #[test]
    fn test_size_is_clamped() {
        let renderer = ChartRenderer::new(0, 0);
        assert_eq!((renderer.width(), renderer.height()), (2, 3));
        assert!(!renderer.render(&[dec!(1.00), dec!(2.00)], 2).is_empty());
    }

    #[test]
    fn test_summary_volatility() {
        let text = summary(&[dec!(10.00), dec!(10.50), dec!(10.20)], 2);

        assert!(text.contains("Data points: 3"));
        assert!(text.contains("Price range: 10.00 - 10.50"));
        assert!(text.contains("Volatility: 0.50 (5.00%)"));
    }

    #[test]
    fn test_single_point_has_no_volatility_line() {
        let text = summary(&[dec!(9.04)], 2);
        assert!(!text.contains("Volatility"));
    }
}
