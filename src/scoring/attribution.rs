//! Causal attribution formatter.
//!
//! Pure function over a group row: each contributing sensor's share of the
//! composite is `z_i² / Σ z_j²`. Shares are ranked descending; the head
//! sensor is the top contributor. When Σ z² is zero the shares distribute
//! equally. Fractions sum to 1.0 ± rounding by construction.

use serde_json::{Map, Number, Value};

use crate::types::{AttributedAnomaly, GroupRow};

/// Enrich a group row with attribution fields. Does not mutate the input
/// beyond taking ownership.
pub fn format_alert(group: GroupRow) -> AttributedAnomaly {
    let fractions = compute_fractions(&group.sensor_z_scores);
    let sorted = sort_descending(fractions);

    let (top_contributor, top_fraction) = sorted
        .first()
        .map_or_else(|| (String::new(), 0.0), |(sid, f)| (sid.clone(), *f));

    let attribution_detail = format_attribution_detail(&sorted);
    let alert_message = format!(
        "Anomaly in {}: primary driver {} ({:.0}% of score)",
        group.group_name,
        top_contributor,
        top_fraction * 100.0
    );

    AttributedAnomaly {
        group,
        top_contributor,
        attribution_detail,
        alert_message,
    }
}

/// `fraction_i = z_i² / Σ z_j²`; equal shares when the total is zero.
fn compute_fractions(sensor_z_scores: &[(String, f64)]) -> Vec<(String, f64)> {
    let squares: Vec<(String, f64)> = sensor_z_scores
        .iter()
        .map(|(sid, z)| (sid.clone(), z * z))
        .collect();
    let total: f64 = squares.iter().map(|(_, sq)| sq).sum();

    if total == 0.0 {
        let n = squares.len();
        #[allow(clippy::cast_precision_loss)]
        let share = if n > 0 { 1.0 / n as f64 } else { 0.0 };
        return squares.into_iter().map(|(sid, _)| (sid, share)).collect();
    }
    squares
        .into_iter()
        .map(|(sid, sq)| (sid, sq / total))
        .collect()
}

/// Stable descending sort — ties keep group member order.
fn sort_descending(mut fractions: Vec<(String, f64)>) -> Vec<(String, f64)> {
    fractions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fractions
}

/// Serialize `{sensor_id: fraction}` to 3 dp, preserving descending order.
fn format_attribution_detail(sorted: &[(String, f64)]) -> String {
    let mut map = Map::new();
    for (sid, fraction) in sorted {
        let rounded = (fraction * 1000.0).round() / 1000.0;
        let number = Number::from_f64(rounded).unwrap_or_else(|| Number::from(0));
        map.insert(sid.clone(), Value::Number(number));
    }
    Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(z_scores: &[(&str, f64)]) -> GroupRow {
        GroupRow {
            group_name: "POINT_1".to_string(),
            timestamp: "2026-02-01 12:00".to_string(),
            composite_score: 2.646,
            sensor_z_scores: z_scores
                .iter()
                .map(|(s, z)| ((*s).to_string(), *z))
                .collect(),
            contributing: z_scores.iter().map(|(s, _)| (*s).to_string()).collect(),
            missing: vec![],
            is_group_anomaly: true,
        }
    }

    #[test]
    fn shares_rank_descending_by_z_squared() {
        // pH=4.0, turb=-2.0, flow=1.0 → shares 16/21, 4/21, 1/21
        let out = format_alert(group(&[("pH", 4.0), ("turb", -2.0), ("flow", 1.0)]));
        assert_eq!(out.top_contributor, "pH");
        assert_eq!(
            out.attribution_detail,
            r#"{"pH":0.762,"turb":0.19,"flow":0.048}"#
        );
        assert_eq!(
            out.alert_message,
            "Anomaly in POINT_1: primary driver pH (76% of score)"
        );
    }

    #[test]
    fn fractions_sum_to_one_after_rounding() {
        let out = format_alert(group(&[("a", 3.3), ("b", -1.7), ("c", 0.4)]));
        let detail: serde_json::Value = serde_json::from_str(&out.attribution_detail).unwrap();
        let sum: f64 = detail
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_f64().unwrap())
            .sum();
        assert!((sum - 1.0).abs() <= 0.01, "sum = {sum}");
    }

    #[test]
    fn zero_total_distributes_equally() {
        let out = format_alert(group(&[("a", 0.0), ("b", 0.0)]));
        let detail: serde_json::Value = serde_json::from_str(&out.attribution_detail).unwrap();
        assert_eq!(detail["a"], 0.5);
        assert_eq!(detail["b"], 0.5);
        // Ties keep member order — head of the list wins.
        assert_eq!(out.top_contributor, "a");
    }

    #[test]
    fn empty_contributors_yield_empty_top() {
        let out = format_alert(group(&[]));
        assert_eq!(out.top_contributor, "");
        assert_eq!(out.attribution_detail, "{}");
        assert!(out.alert_message.contains("primary driver  (0% of score)"));
    }

    #[test]
    fn negative_z_contributes_by_square() {
        let out = format_alert(group(&[("a", -5.0), ("b", 1.0)]));
        assert_eq!(out.top_contributor, "a");
    }
}
