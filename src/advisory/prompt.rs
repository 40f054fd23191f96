//! Advisory prompt construction.

/// Average surface of a residential solar panel
pub const AVG_PANEL_SIZE_M2: f64 = 1.6;

/// Typical per-panel power output range, watts
pub const PANEL_WATTAGE_RANGE: (u32, u32) = (250, 400);

/// Build the advisory prompt for a rooftop area.
///
/// Pure function of the area (formatted to two decimals) and fixed
/// constants; instructs the model to answer with only the JSON schema
/// the parser expects.
pub fn build_prompt(area_m2: f64) -> String {
    format!(
        r#"You are a solar energy advisor AI. Analyze the given rooftop area in square meters and return installation suggestions and financial assessment.
Rooftop area: {area_m2:.2}
Avg solar panel size: {AVG_PANEL_SIZE_M2} m²
Power Output: {}W to {}W.
remember the avg household power consumption in India is 1,395 kWh/month.
Respond ONLY in JSON with the following keys:
{{
  "recommended_panels": int,
  "recommended_panels_explanation": str,
  "total_capacity_kw": float,
  "total_capacity_kw_explanation": str,
  "yearly_production_kwh": float,
  "yearly_production_explanation": str,
  "installation_cost_inr": float,
  "installation_cost_explanation": str,
  "yearly_savings_inr": float,
  "yearly_savings_explanation": str,
  "payback_period_years": float,
  "payback_period_explanation": str
}}"#,
        PANEL_WATTAGE_RANGE.0, PANEL_WATTAGE_RANGE.1
    )
}
