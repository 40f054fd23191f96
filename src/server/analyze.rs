//! Rooftop analysis route handlers.

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{error, info, warn};

use crate::advisory::{build_prompt, parse_metrics, AdvisoryMetrics};
use crate::chart::{compare_bills, render_bill_chart, render_segmentation, to_base64};
use crate::error::AppError;
use crate::inference::{MAX_AREA_M2, MIN_AREA_M2};
use crate::types::{AnalyzeResponse, ManualAnalyzeRequest};

use super::AppState;

/// Mock estimate returned when running without a model (development mode)
const MOCK_AREA_M2: f64 = 150.0;

/// 1x1 placeholder PNG standing in for the segmentation visualization
/// when no model is loaded
const MOCK_MASK_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// POST /api/v1/analyze
///
/// Analyze an uploaded rooftop image: estimate usable area from the
/// segmentation model, then run the advisory and chart pipeline.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let upload = read_upload(multipart).await?;

    let (area_m2, segmentation_png) = match &state.model {
        Some(model) => {
            let model = model.clone();
            let estimate = tokio::task::spawn_blocking(move || model.estimate(&upload))
                .await
                .map_err(|e| {
                    error!(error = %e, "Estimation task panicked");
                    AppError::Internal(e.to_string())
                })??;

            info!(area_m2 = estimate.area_m2, "Rooftop area estimated");

            let png = render_segmentation(&estimate.input, &estimate.mask)?;
            (estimate.area_m2, to_base64(&png))
        }
        None if !state.config.model.required => {
            // Development mode: canned estimate, placeholder visualization
            warn!("No model loaded, returning mock estimate");
            (MOCK_AREA_M2, MOCK_MASK_PNG_B64.to_string())
        }
        None => {
            return Err(AppError::ModelUnavailable(
                "segmentation model is not loaded".to_string(),
            ));
        }
    };

    if area_m2 < MIN_AREA_M2 {
        return Err(AppError::BadRequest(format!(
            "Estimated rooftop area ({area_m2:.2} m²) is too small. \
             Please ensure the image is clear and the rooftop is visible."
        )));
    }

    let (advisory_text, metrics, bill_chart_png) = run_advisory(&state, area_m2).await?;

    Ok(Json(AnalyzeResponse {
        estimated_area_m2: area_m2,
        metrics,
        advisory_text,
        segmentation_png: Some(segmentation_png),
        bill_chart_png,
    }))
}

/// POST /api/v1/analyze/manual
///
/// Run the advisory and chart pipeline for a manually entered area.
pub async fn analyze_manual(
    State(state): State<AppState>,
    Json(request): Json<ManualAnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let area_m2 = request.area;

    if !area_m2.is_finite() {
        return Err(AppError::BadRequest(
            "Please enter a valid number for rooftop area".to_string(),
        ));
    }
    if area_m2 < MIN_AREA_M2 {
        return Err(AppError::BadRequest(format!(
            "Rooftop area must be at least {MIN_AREA_M2} m²"
        )));
    }
    if area_m2 > MAX_AREA_M2 {
        return Err(AppError::BadRequest(
            "Rooftop area seems too large. Please check your input.".to_string(),
        ));
    }

    let (advisory_text, metrics, bill_chart_png) = run_advisory(&state, area_m2).await?;

    Ok(Json(AnalyzeResponse {
        estimated_area_m2: area_m2,
        metrics,
        advisory_text,
        segmentation_png: None,
        bill_chart_png,
    }))
}

/// Shared advisory/chart tail of both analysis endpoints.
async fn run_advisory(
    state: &AppState,
    area_m2: f64,
) -> Result<(String, AdvisoryMetrics, String), AppError> {
    let prompt = build_prompt(area_m2);
    let advisory_text = state.advisor.query(&prompt).await?;
    let metrics = parse_metrics(&advisory_text)?;

    let comparison = compare_bills(&metrics);
    let chart_png = render_bill_chart(&comparison)?;

    Ok((advisory_text, metrics, to_base64(&chart_png)))
}

/// Pull the uploaded image bytes out of the multipart body.
///
/// The bytes are held in memory only; nothing is written to disk on any
/// path.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(AppError::BadRequest("No file selected".to_string()));
        }
        if !allowed_file(&filename) {
            return Err(AppError::BadRequest(
                "Invalid file type. Please upload JPG, JPEG, or PNG files only.".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;

        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }

        return Ok(bytes.to_vec());
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file_extensions() {
        assert!(allowed_file("roof.png"));
        assert!(allowed_file("roof.JPG"));
        assert!(allowed_file("house.back.jpeg"));
        assert!(!allowed_file("roof.gif"));
        assert!(!allowed_file("roof"));
        assert!(!allowed_file(""));
    }
}
