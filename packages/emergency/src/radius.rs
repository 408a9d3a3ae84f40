//! Search radius estimation.

use safe_wander_emergency_models::{MobilityLevel, SearchConfig};

/// Estimated search radius in meters.
///
/// `avg_speed_mps * missing_secs * mobility factor * terrain factor`,
/// clamped to the configured range. A finite, positive `override_m`
/// replaces the estimate entirely and is returned unclamped. Inputs that
/// produce no number at all yield `config.default_radius_m`.
#[must_use]
pub fn estimate_search_radius(
    avg_speed_mps: f64,
    missing_secs: f64,
    mobility: MobilityLevel,
    override_m: Option<f64>,
    config: &SearchConfig,
) -> f64 {
    if let Some(radius) = override_m {
        if radius.is_finite() && radius > 0.0 {
            return radius;
        }
        log::warn!("Ignoring invalid search radius override {radius}");
    }

    let estimate = avg_speed_mps
        * missing_secs
        * config.mobility.factor(mobility)
        * config.terrain_factor;

    if estimate.is_nan() {
        log::warn!(
            "No search radius estimate for speed {avg_speed_mps} over {missing_secs}s, using {}m",
            config.default_radius_m
        );
        return config.default_radius_m;
    }

    estimate.clamp(config.min_radius_m, config.max_radius_m)
}

/// [`estimate_search_radius`] for a stored mobility name. Unknown names
/// use the medium factor.
#[must_use]
pub fn estimate_search_radius_named(
    avg_speed_mps: f64,
    missing_secs: f64,
    mobility: &str,
    override_m: Option<f64>,
    config: &SearchConfig,
) -> f64 {
    estimate_search_radius(
        avg_speed_mps,
        missing_secs,
        MobilityLevel::parse_or_medium(mobility),
        override_m,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn walking_for_an_hour() {
        let config = SearchConfig::default();
        // 0.8 * 3600 * 1.0 = 2880
        let radius = estimate_search_radius(0.8, 3600.0, MobilityLevel::Medium, None, &config);
        assert!(approx(radius, 2880.0), "radius {radius}");

        let high = estimate_search_radius(0.8, 3600.0, MobilityLevel::High, None, &config);
        assert!(approx(high, 3456.0), "radius {high}");
    }

    #[test]
    fn short_absences_use_the_minimum() {
        let config = SearchConfig::default();
        let radius =
            estimate_search_radius(0.8, 60.0, MobilityLevel::Wheelchair, None, &config);
        assert!(approx(radius, 100.0), "radius {radius}");

        let still = estimate_search_radius(0.0, 0.0, MobilityLevel::Medium, None, &config);
        assert!(approx(still, 100.0));
    }

    #[test]
    fn long_absences_use_the_maximum() {
        let config = SearchConfig::default();
        let radius = estimate_search_radius(1.2, 86_400.0, MobilityLevel::High, None, &config);
        assert!(approx(radius, 5000.0), "radius {radius}");
    }

    #[test]
    fn override_replaces_the_estimate_unclamped() {
        let config = SearchConfig::default();
        let radius =
            estimate_search_radius(0.8, 3600.0, MobilityLevel::Medium, Some(8000.0), &config);
        assert!(approx(radius, 8000.0));

        let small = estimate_search_radius(0.8, 3600.0, MobilityLevel::Medium, Some(40.0), &config);
        assert!(approx(small, 40.0));
    }

    #[test]
    fn invalid_override_falls_back_to_the_estimate() {
        let config = SearchConfig::default();
        let radius =
            estimate_search_radius(0.8, 3600.0, MobilityLevel::Medium, Some(-5.0), &config);
        assert!(approx(radius, 2880.0));
    }

    #[test]
    fn unknown_mobility_name_uses_medium() {
        let config = SearchConfig::default();
        let radius = estimate_search_radius_named(0.8, 3600.0, "hovercraft", None, &config);
        assert!(approx(radius, 2880.0));

        let low = estimate_search_radius_named(0.8, 3600.0, "LOW", None, &config);
        assert!(approx(low, 1440.0));
    }

    #[test]
    fn nan_input_uses_the_default_radius() {
        let config = SearchConfig::default();
        let radius = estimate_search_radius(f64::NAN, 3600.0, MobilityLevel::Medium, None, &config);
        assert!(approx(radius, 500.0), "radius {radius}");

        let unbounded =
            estimate_search_radius(f64::INFINITY, 0.0, MobilityLevel::Medium, None, &config);
        assert!(approx(unbounded, 500.0), "radius {unbounded}");
    }

    #[test]
    fn default_radius_follows_the_config() {
        let config = SearchConfig {
            default_radius_m: 750.0,
            ..SearchConfig::default()
        };
        let radius = estimate_search_radius(0.8, f64::NAN, MobilityLevel::Low, None, &config);
        assert!(approx(radius, 750.0), "radius {radius}");
    }
}
