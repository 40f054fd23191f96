//! Rendered artifacts: the bill-comparison chart and the segmentation
//! visualization, both produced as PNG bytes for base64 transport.

use std::io::Cursor;

use ab_glyph::{FontRef, PxScale};
use base64::Engine;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::advisory::AdvisoryMetrics;
use crate::inference::SegmentationMask;

/// Average electricity rate in India, ₹ per kWh
pub const AVG_TARIFF_INR_PER_KWH: f64 = 6.5;

/// Average Indian household consumption, kWh per month
pub const AVG_MONTHLY_CONSUMPTION_KWH: f64 = 1_395.0;

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 600;
const MARGIN_LEFT: i32 = 90;
const MARGIN_RIGHT: i32 = 40;
const MARGIN_TOP: i32 = 70;
const MARGIN_BOTTOM: i32 = 70;
const BAR_WIDTH: u32 = 160;

const COLOR_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const COLOR_AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const COLOR_TEXT: Rgb<u8> = Rgb([30, 30, 30]);
const COLOR_WITHOUT_SOLAR: Rgb<u8> = Rgb([255, 107, 107]);
const COLOR_WITH_SOLAR: Rgb<u8> = Rgb([78, 205, 196]);

/// Mask colors indexed by class label (viridis endpoints first)
const MASK_PALETTE: [[u8; 3]; 4] = [[68, 1, 84], [253, 231, 37], [33, 145, 140], [94, 201, 98]];

const FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Chart rendering error types
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Font error: {0}")]
    Font(String),

    #[error("Image encoding error: {0}")]
    Encode(String),
}

/// Monthly bill figures derived from advisory metrics and fixed tariff
/// and consumption constants.
#[derive(Debug, Clone, PartialEq)]
pub struct BillComparison {
    pub monthly_production_kwh: f64,
    /// LLM-reported savings scaled to a month. Kept alongside the
    /// bill-derived figures even though the two are not reconciled; the
    /// chart annotates the bill delta.
    pub monthly_savings_inr: f64,
    pub bill_without_solar_inr: f64,
    pub bill_with_solar_inr: f64,
}

impl BillComparison {
    /// Absolute monthly bill reduction
    pub fn bill_reduction_inr(&self) -> f64 {
        self.bill_without_solar_inr - self.bill_with_solar_inr
    }

    /// Bill reduction as a percentage of the without-solar bill
    pub fn bill_reduction_percent(&self) -> f64 {
        if self.bill_without_solar_inr > 0.0 {
            self.bill_reduction_inr() / self.bill_without_solar_inr * 100.0
        } else {
            0.0
        }
    }
}

/// Compute the with/without-solar monthly bill comparison.
///
/// Deterministic given the metrics; missing metric fields count as zero
/// production/savings.
pub fn compare_bills(metrics: &AdvisoryMetrics) -> BillComparison {
    let monthly_production_kwh = metrics.yearly_production_kwh.unwrap_or(0.0) / 12.0;
    let monthly_savings_inr = metrics.yearly_savings_inr.unwrap_or(0.0) / 12.0;

    let bill_without_solar_inr = AVG_MONTHLY_CONSUMPTION_KWH * AVG_TARIFF_INR_PER_KWH;
    let grid_draw_kwh = (AVG_MONTHLY_CONSUMPTION_KWH - monthly_production_kwh).max(0.0);
    let bill_with_solar_inr = grid_draw_kwh * AVG_TARIFF_INR_PER_KWH;

    BillComparison {
        monthly_production_kwh,
        monthly_savings_inr,
        bill_without_solar_inr,
        bill_with_solar_inr,
    }
}

/// Render the two-bar bill comparison as PNG bytes.
pub fn render_bill_chart(comparison: &BillComparison) -> Result<Vec<u8>, ChartError> {
    let font = load_font()?;
    let mut canvas = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, COLOR_BACKGROUND);

    let plot_height = CHART_HEIGHT as i32 - MARGIN_TOP - MARGIN_BOTTOM;
    let plot_width = CHART_WIDTH as i32 - MARGIN_LEFT - MARGIN_RIGHT;
    let baseline_y = CHART_HEIGHT as i32 - MARGIN_BOTTOM;

    let max_bill = comparison
        .bill_without_solar_inr
        .max(comparison.bill_with_solar_inr)
        .max(1.0);

    // Axes
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(MARGIN_LEFT, MARGIN_TOP).of_size(2, plot_height as u32),
        COLOR_AXIS,
    );
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(MARGIN_LEFT, baseline_y).of_size(plot_width as u32, 2),
        COLOR_AXIS,
    );

    let bars = [
        ("Without Solar", comparison.bill_without_solar_inr, COLOR_WITHOUT_SOLAR),
        ("With Solar", comparison.bill_with_solar_inr, COLOR_WITH_SOLAR),
    ];

    let slot_width = plot_width / bars.len() as i32;
    let label_scale = PxScale::from(20.0);
    let title_scale = PxScale::from(26.0);

    for (i, (label, bill, color)) in bars.iter().enumerate() {
        let bar_height = ((bill / max_bill) * f64::from(plot_height)) as i32;
        let x = MARGIN_LEFT + slot_width * i as i32 + (slot_width - BAR_WIDTH as i32) / 2;

        if bar_height > 0 {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x, baseline_y - bar_height).of_size(BAR_WIDTH, bar_height as u32),
                *color,
            );
        }

        let value = format!("₹{}", bill.round() as i64);
        draw_text_mut(
            &mut canvas,
            COLOR_TEXT,
            x + 30,
            baseline_y - bar_height - 28,
            label_scale,
            &font,
            &value,
        );
        draw_text_mut(
            &mut canvas,
            COLOR_TEXT,
            x + 10,
            baseline_y + 14,
            label_scale,
            &font,
            label,
        );
    }

    draw_text_mut(
        &mut canvas,
        COLOR_TEXT,
        MARGIN_LEFT + plot_width / 2 - 190,
        24,
        title_scale,
        &font,
        "Monthly Electricity Bill Comparison",
    );

    let annotation = format!(
        "Monthly Savings ₹{} ({:.1}% reduction)",
        comparison.bill_reduction_inr().round() as i64,
        comparison.bill_reduction_percent()
    );
    draw_text_mut(
        &mut canvas,
        COLOR_TEXT,
        MARGIN_LEFT + plot_width / 2 - 160,
        MARGIN_TOP + plot_height / 2,
        label_scale,
        &font,
        &annotation,
    );

    let consumption = format!(
        "Monthly Consumption: {AVG_MONTHLY_CONSUMPTION_KWH:.0} kWh | Solar Production: {:.0} kWh",
        comparison.monthly_production_kwh
    );
    draw_text_mut(
        &mut canvas,
        COLOR_TEXT,
        MARGIN_LEFT,
        CHART_HEIGHT as i32 - 28,
        PxScale::from(16.0),
        &font,
        &consumption,
    );

    encode_png(&canvas)
}

/// Render the original image next to the colorized predicted mask.
pub fn render_segmentation(
    original: &RgbImage,
    mask: &SegmentationMask,
) -> Result<Vec<u8>, ChartError> {
    let font = load_font()?;

    const GAP: u32 = 12;
    const HEADER: u32 = 28;

    let width = original.width() + GAP + mask.width;
    let height = original.height().max(mask.height) + HEADER;
    let mut canvas = RgbImage::from_pixel(width, height, COLOR_BACKGROUND);

    for (x, y, pixel) in original.enumerate_pixels() {
        canvas.put_pixel(x, y + HEADER, *pixel);
    }

    let mask_x0 = original.width() + GAP;
    for y in 0..mask.height {
        for x in 0..mask.width {
            let class = mask.classes[(y * mask.width + x) as usize] as usize;
            let color = MASK_PALETTE[class % MASK_PALETTE.len()];
            canvas.put_pixel(mask_x0 + x, y + HEADER, Rgb(color));
        }
    }

    let scale = PxScale::from(18.0);
    draw_text_mut(&mut canvas, COLOR_TEXT, 4, 4, scale, &font, "Original Image");
    draw_text_mut(
        &mut canvas,
        COLOR_TEXT,
        mask_x0 as i32 + 4,
        4,
        scale,
        &font,
        "Predicted Rooftop Mask",
    );

    encode_png(&canvas)
}

/// Base64-encode PNG bytes for JSON transport.
pub fn to_base64(png: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(png)
}

fn load_font() -> Result<FontRef<'static>, ChartError> {
    FontRef::try_from_slice(FONT_BYTES).map_err(|e| ChartError::Font(e.to_string()))
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ChartError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| ChartError::Encode(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

    fn metrics(yearly_production_kwh: f64, yearly_savings_inr: f64) -> AdvisoryMetrics {
        AdvisoryMetrics {
            yearly_production_kwh: Some(yearly_production_kwh),
            yearly_savings_inr: Some(yearly_savings_inr),
            ..AdvisoryMetrics::default()
        }
    }

    #[test]
    fn test_bill_comparison_production_covers_consumption() {
        let comparison = compare_bills(&metrics(18_000.0, 60_000.0));

        assert!((comparison.monthly_production_kwh - 1_500.0).abs() < 1e-9);
        assert!((comparison.monthly_savings_inr - 5_000.0).abs() < 1e-9);
        assert!((comparison.bill_without_solar_inr - 9_067.5).abs() < 1e-9);
        // 1395 - 1500 clamps to zero grid draw
        assert_eq!(comparison.bill_with_solar_inr, 0.0);
        assert!((comparison.bill_reduction_percent() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_bill_comparison_partial_offset() {
        let comparison = compare_bills(&metrics(6_000.0, 30_000.0));

        assert!((comparison.monthly_production_kwh - 500.0).abs() < 1e-9);
        let expected_with = (1_395.0 - 500.0) * 6.5;
        assert!((comparison.bill_with_solar_inr - expected_with).abs() < 1e-9);
        assert!(comparison.bill_reduction_inr() > 0.0);
    }

    #[test]
    fn test_bill_comparison_missing_metrics() {
        let comparison = compare_bills(&AdvisoryMetrics::default());

        assert_eq!(comparison.monthly_production_kwh, 0.0);
        assert_eq!(
            comparison.bill_with_solar_inr,
            comparison.bill_without_solar_inr
        );
        assert_eq!(comparison.bill_reduction_percent(), 0.0);
    }

    #[test]
    fn test_bill_chart_is_valid_png() {
        let png = render_bill_chart(&compare_bills(&metrics(18_000.0, 60_000.0))).unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn test_bill_chart_is_deterministic() {
        let comparison = compare_bills(&metrics(6_000.0, 30_000.0));
        let a = render_bill_chart(&comparison).unwrap();
        let b = render_bill_chart(&comparison).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_segmentation_render() {
        let original = RgbImage::from_pixel(8, 8, Rgb([100, 120, 140]));
        let mask = SegmentationMask {
            classes: (0..64).map(|i| u8::from(i % 2 == 0)).collect(),
            width: 8,
            height: 8,
        };

        let png = render_segmentation(&original, &mask).unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn test_parsed_advisory_drives_chart() {
        // Canned 150 m² advisory response, wrapped the way models wrap it
        let response = r#"Here is the assessment you asked for:
{"recommended_panels": 94, "total_capacity_kw": 30.0, "yearly_production_kwh": 18000,
 "installation_cost_inr": 1500000, "yearly_savings_inr": 60000, "payback_period_years": 25}
Hope that helps!"#;

        let metrics = crate::advisory::parse_metrics(response).unwrap();
        let comparison = compare_bills(&metrics);

        assert!((comparison.monthly_production_kwh - 1_500.0).abs() < 1e-9);
        assert!((comparison.bill_without_solar_inr - 9_067.5).abs() < 1e-9);
        assert_eq!(comparison.bill_with_solar_inr, 0.0);

        let png = render_bill_chart(&comparison).unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn test_base64_round_trip() {
        let encoded = to_base64(&PNG_MAGIC);
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(decoded, PNG_MAGIC);
    }
}
