//! Zone classification and zone lifecycle.

use safe_wander_geo_models::{Coordinate, Geofence, ZoneDefaults, ZoneStatus, ZoneType};

use crate::distance::haversine_distance;

/// Whether `point` lies within `radius_m` of `center` (boundary inclusive).
#[must_use]
pub fn point_in_circle(point: Coordinate, center: Coordinate, radius_m: f64) -> bool {
    haversine_distance(point, center) <= radius_m
}

/// Classifies `point` against `zones`.
///
/// Every matching type flag is set independently, so a point can be both
/// `in_safe` and `in_buffer`. The label is resolved by type priority:
/// danger always wins, restricted wins unless a danger zone matched, safe
/// wins unless a danger or restricted zone matched, and a buffer only
/// labels the point when nothing else has. Among zones of equal priority
/// the later one in `zones` wins.
///
/// Inactive zones, zones without a center, and zones with a non-positive
/// radius are skipped. The danger distance still counts danger zones the
/// point is outside of.
#[must_use]
pub fn evaluate_zones(point: Coordinate, zones: &[Geofence]) -> ZoneStatus {
    let mut status = ZoneStatus::default();

    for zone in zones {
        if !zone.active {
            continue;
        }
        let Some(center) = zone.center else {
            continue;
        };
        if zone.radius_m <= 0.0 || zone.radius_m.is_nan() {
            log::trace!("Skipping degenerate zone {} (radius {})", zone.id, zone.radius_m);
            continue;
        }

        let distance = haversine_distance(point, center);
        let inside = distance <= zone.radius_m;

        match zone.zone_type {
            ZoneType::Danger => {
                if distance < status.nearest_danger_distance_m {
                    status.nearest_danger_distance_m = distance;
                }
                if inside {
                    status.in_danger = true;
                    status.current_zone_name = Some(zone.label().to_string());
                }
            }
            ZoneType::Safe => {
                if inside {
                    status.in_safe = true;
                    if !status.in_danger && !status.in_restricted {
                        status.current_zone_name = Some(zone.label().to_string());
                    }
                }
            }
            ZoneType::Restricted => {
                if inside {
                    status.in_restricted = true;
                    if !status.in_danger {
                        status.current_zone_name = Some(zone.label().to_string());
                    }
                }
            }
            ZoneType::Buffer => {
                if inside {
                    status.in_buffer = true;
                    if status.current_zone_name.is_none() {
                        status.current_zone_name = Some(zone.label().to_string());
                    }
                }
            }
        }
    }

    status
}

/// Builds the buffer halo for a safe zone.
///
/// The buffer's radius is the safe radius plus `offset_m` and it is owned
/// by (and deactivated together with) its parent.
#[must_use]
pub fn buffer_for(safe: &Geofence, offset_m: f64) -> Geofence {
    Geofence {
        id: format!("{}-buffer", safe.id),
        subject_id: safe.subject_id.clone(),
        name: format!("{} (buffer)", safe.label()),
        zone_type: ZoneType::Buffer,
        center: safe.center,
        radius_m: safe.radius_m + offset_m,
        active: safe.active,
        auto_generated: true,
        parent_id: Some(safe.id.clone()),
    }
}

/// One subject's zones, maintaining the safe/buffer ownership invariant.
#[derive(Debug, Clone)]
pub struct ZoneSet {
    subject_id: String,
    defaults: ZoneDefaults,
    zones: Vec<Geofence>,
}

impl ZoneSet {
    /// Creates an empty zone set for `subject_id`.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, defaults: ZoneDefaults) -> Self {
        Self {
            subject_id: subject_id.into(),
            defaults,
            zones: Vec::new(),
        }
    }

    /// Wraps zones loaded from storage. Safe zones that are missing their
    /// buffer get one generated.
    #[must_use]
    pub fn from_zones(
        subject_id: impl Into<String>,
        defaults: ZoneDefaults,
        zones: Vec<Geofence>,
    ) -> Self {
        let mut set = Self {
            subject_id: subject_id.into(),
            defaults,
            zones,
        };

        let orphans: Vec<Geofence> = set
            .zones
            .iter()
            .filter(|z| z.zone_type == ZoneType::Safe)
            .filter(|safe| {
                !set.zones
                    .iter()
                    .any(|z| z.parent_id.as_deref() == Some(safe.id.as_str()))
            })
            .map(|safe| buffer_for(safe, set.defaults.buffer_offset_m))
            .collect();

        if !orphans.is_empty() {
            log::debug!(
                "Generated {} missing buffer zone(s) for subject {}",
                orphans.len(),
                set.subject_id
            );
        }
        set.zones.extend(orphans);
        set
    }

    /// Adds a zone and returns its ID.
    ///
    /// A `radius_m` of `None` uses the type's default. Safe zones also get
    /// their buffer halo.
    pub fn add_zone(
        &mut self,
        zone_type: ZoneType,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: Option<f64>,
    ) -> String {
        let zone = Geofence {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: self.subject_id.clone(),
            name: name.into(),
            zone_type,
            center: Some(center),
            radius_m: radius_m.unwrap_or_else(|| self.defaults.radius_for(zone_type)),
            active: true,
            auto_generated: false,
            parent_id: None,
        };
        let id = zone.id.clone();

        if zone_type == ZoneType::Safe {
            let buffer = buffer_for(&zone, self.defaults.buffer_offset_m);
            self.zones.push(zone);
            self.zones.push(buffer);
        } else {
            self.zones.push(zone);
        }

        id
    }

    /// Deactivates a zone and every zone it owns. Returns `false` if no
    /// zone has that ID.
    pub fn deactivate(&mut self, id: &str) -> bool {
        let mut found = false;
        for zone in &mut self.zones {
            if zone.id == id || zone.parent_id.as_deref() == Some(id) {
                found |= zone.id == id;
                zone.active = false;
            }
        }
        found
    }

    /// Looks up a zone by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Geofence> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Active zones, in insertion order.
    #[must_use]
    pub fn active(&self) -> Vec<Geofence> {
        self.zones.iter().filter(|z| z.active).cloned().collect()
    }

    /// All zones including deactivated ones.
    #[must_use]
    pub fn all(&self) -> &[Geofence] {
        &self.zones
    }

    /// Consumes the set, returning every zone.
    #[must_use]
    pub fn into_zones(self) -> Vec<Geofence> {
        self.zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Coordinate = Coordinate::new(40.0, -75.0);

    fn zone(id: &str, zone_type: ZoneType, center: Coordinate, radius_m: f64) -> Geofence {
        Geofence {
            id: id.to_string(),
            subject_id: "p1".to_string(),
            name: id.to_string(),
            zone_type,
            center: Some(center),
            radius_m,
            active: true,
            auto_generated: false,
            parent_id: None,
        }
    }

    /// A point roughly `meters` north of [`ORIGIN`].
    fn north_of_origin(meters: f64) -> Coordinate {
        let degrees = meters / crate::EARTH_RADIUS_M * 180.0 / std::f64::consts::PI;
        Coordinate::new(ORIGIN.lat + degrees, ORIGIN.lng)
    }

    #[test]
    fn safe_and_buffer_flags_are_independent() {
        let home = zone("home", ZoneType::Safe, ORIGIN, 100.0);
        let buffer = buffer_for(&home, 50.0);
        let status = evaluate_zones(ORIGIN, &[home, buffer]);

        assert!(status.in_safe);
        assert!(status.in_buffer);
        assert_eq!(status.current_zone_name.as_deref(), Some("home"));
    }

    #[test]
    fn boundary_is_inclusive() {
        let edge = north_of_origin(100.0);
        let radius = haversine_distance(edge, ORIGIN);
        let status = evaluate_zones(edge, &[zone("home", ZoneType::Safe, ORIGIN, radius)]);
        assert!(status.in_safe);
    }

    #[test]
    fn danger_label_beats_later_safe_zone() {
        let zones = vec![
            zone("road", ZoneType::Danger, ORIGIN, 50.0),
            zone("home", ZoneType::Safe, ORIGIN, 100.0),
        ];
        let status = evaluate_zones(ORIGIN, &zones);
        assert!(status.in_danger && status.in_safe);
        assert_eq!(status.current_zone_name.as_deref(), Some("road"));
    }

    #[test]
    fn danger_label_beats_earlier_restricted_zone() {
        let zones = vec![
            zone("yard", ZoneType::Restricted, ORIGIN, 100.0),
            zone("road", ZoneType::Danger, ORIGIN, 50.0),
        ];
        let status = evaluate_zones(ORIGIN, &zones);
        assert_eq!(status.current_zone_name.as_deref(), Some("road"));
    }

    #[test]
    fn buffer_only_labels_when_nothing_else_matched() {
        let zones = vec![
            zone("home", ZoneType::Safe, ORIGIN, 100.0),
            zone("halo", ZoneType::Buffer, ORIGIN, 150.0),
        ];
        assert_eq!(
            evaluate_zones(ORIGIN, &zones).current_zone_name.as_deref(),
            Some("home")
        );

        let outside_home = north_of_origin(120.0);
        assert_eq!(
            evaluate_zones(outside_home, &zones).current_zone_name.as_deref(),
            Some("halo")
        );
    }

    #[test]
    fn restricted_label_beats_safe_zone_in_either_order() {
        let yard = zone("yard", ZoneType::Restricted, ORIGIN, 100.0);
        let home = zone("home", ZoneType::Safe, ORIGIN, 100.0);

        let safe_first = evaluate_zones(ORIGIN, &[home.clone(), yard.clone()]);
        assert!(safe_first.in_safe && safe_first.in_restricted);
        assert_eq!(safe_first.current_zone_name.as_deref(), Some("yard"));

        let restricted_first = evaluate_zones(ORIGIN, &[yard, home]);
        assert!(restricted_first.in_safe && restricted_first.in_restricted);
        assert_eq!(restricted_first.current_zone_name.as_deref(), Some("yard"));
    }

    #[test]
    fn later_safe_zone_wins_tie() {
        let zones = vec![
            zone("home", ZoneType::Safe, ORIGIN, 100.0),
            zone("garden", ZoneType::Safe, ORIGIN, 100.0),
        ];
        assert_eq!(
            evaluate_zones(ORIGIN, &zones).current_zone_name.as_deref(),
            Some("garden")
        );
    }

    #[test]
    fn nearest_danger_tracked_outside_radius() {
        let point = north_of_origin(200.0);
        let zones = vec![
            zone("far", ZoneType::Danger, north_of_origin(1000.0), 50.0),
            zone("near", ZoneType::Danger, ORIGIN, 50.0),
        ];
        let status = evaluate_zones(point, &zones);
        assert!(!status.in_danger);
        assert!((status.nearest_danger_distance_m - 200.0).abs() < 0.01);
    }

    #[test]
    fn degenerate_zones_are_skipped() {
        let mut no_center = zone("nowhere", ZoneType::Safe, ORIGIN, 100.0);
        no_center.center = None;
        let zero_radius = zone("dot", ZoneType::Danger, ORIGIN, 0.0);
        let mut inactive = zone("old", ZoneType::Safe, ORIGIN, 100.0);
        inactive.active = false;

        let status = evaluate_zones(ORIGIN, &[no_center, zero_radius, inactive]);
        assert_eq!(status, ZoneStatus::default());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let zones = vec![
            zone("home", ZoneType::Safe, ORIGIN, 100.0),
            zone("road", ZoneType::Danger, north_of_origin(80.0), 20.0),
            zone("shed", ZoneType::Restricted, north_of_origin(30.0), 10.0),
        ];
        let point = north_of_origin(40.0);
        assert_eq!(evaluate_zones(point, &zones), evaluate_zones(point, &zones));
    }

    #[test]
    fn adding_safe_zone_creates_owned_buffer() {
        let mut set = ZoneSet::new("p1", ZoneDefaults::default());
        let id = set.add_zone(ZoneType::Safe, "Home", ORIGIN, Some(120.0));

        let active = set.active();
        assert_eq!(active.len(), 2);
        let buffer = active
            .iter()
            .find(|z| z.zone_type == ZoneType::Buffer)
            .expect("buffer zone");
        assert_eq!(buffer.parent_id.as_deref(), Some(id.as_str()));
        assert!(buffer.auto_generated);
        assert!((buffer.radius_m - 170.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deactivating_safe_zone_deactivates_buffer() {
        let mut set = ZoneSet::new("p1", ZoneDefaults::default());
        let home = set.add_zone(ZoneType::Safe, "Home", ORIGIN, None);
        set.add_zone(ZoneType::Danger, "Road", north_of_origin(300.0), None);

        assert!(set.deactivate(&home));
        let active = set.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].zone_type, ZoneType::Danger);
        assert!(!set.deactivate("missing"));
    }

    #[test]
    fn default_radius_by_type() {
        let mut set = ZoneSet::new("p1", ZoneDefaults::default());
        let id = set.add_zone(ZoneType::Restricted, "Shed", ORIGIN, None);
        assert!((set.get(&id).unwrap().radius_m - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn loaded_safe_zone_without_buffer_gets_one() {
        let set = ZoneSet::from_zones(
            "p1",
            ZoneDefaults::default(),
            vec![zone("home", ZoneType::Safe, ORIGIN, 100.0)],
        );
        assert_eq!(set.all().len(), 2);
        assert_eq!(set.all()[1].parent_id.as_deref(), Some("home"));
    }
}
