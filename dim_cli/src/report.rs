//! Rendering of calculation results for stdout.

use dim_core::{CalculationResultData, CalculationStatus};
use serde_json::json;

/// One JSON line per calculation; dimension fields are 0 unless successful.
pub fn result_json(data: &CalculationResultData) -> String {
    let r = &data.result;
    json!({
        "timestamp": r.timestamp.timestamp_millis(),
        "time": r.timestamp.to_rfc3339(),
        "status": data.status.as_str(),
        "calculation_index": data.calculation_index,
        "barcode": r.barcode,
        "weight": r.weight,
        "weight_units": r.weight_units.as_str(),
        "unit_count": r.unit_count,
        "length_mm": r.length_mm,
        "width_mm": r.width_mm,
        "height_mm": r.height_mm,
        "volume_mm3": r.volume_mm3,
        "pallet_subtracted": r.pallet_subtracted,
        "comment": r.comment,
        "algorithm": data.algorithm.map(|a| a.as_str()),
        "laser_used": data.laser_used,
        "elapsed_ms": data.elapsed_ms,
    })
    .to_string()
}

pub fn result_text(data: &CalculationResultData) -> String {
    let r = &data.result;
    if data.status != CalculationStatus::Successful {
        return crate::error_fmt::describe_status(data.status);
    }
    let mut out = format!(
        "Measurement complete: {} #{}\n  L x W x H: {} x {} x {} mm\n  Volume: {} mm3\n  Weight: {:.3} {}",
        r.barcode,
        data.calculation_index.unwrap_or_default(),
        r.length_mm,
        r.width_mm,
        r.height_mm,
        r.volume_mm3,
        r.weight,
        r.weight_units.as_str(),
    );
    if r.unit_count > 1 {
        out.push_str(&format!("\n  Units: {}", r.unit_count));
    }
    if r.pallet_subtracted {
        out.push_str("\n  Pallet subtracted");
    }
    if let Some(algorithm) = data.algorithm {
        out.push_str(&format!(
            "\n  Mode: {algorithm}{}",
            if data.laser_used { " (range meter)" } else { "" }
        ));
    }
    if !r.comment.is_empty() {
        out.push_str(&format!("\n  Comment: {}", r.comment));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_renders_explanation_and_zero_dims() {
        let data = CalculationResultData::empty(CalculationStatus::ObjectNotFound);
        assert!(result_text(&data).starts_with("What happened: No object"));
        let v: serde_json::Value = serde_json::from_str(&result_json(&data)).unwrap();
        assert_eq!(v["status"], "object_not_found");
        assert_eq!(v["volume_mm3"], 0);
        assert!(v["algorithm"].is_null());
    }
}
