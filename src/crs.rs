use gdal::spatial_ref::SpatialRef;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearUnit {
    Meters,
    Degrees,
    Other(f64), // meters per unit
    Unknown,
}

/// Linear unit of the pixel grid, for reporting pixel sizes.
pub fn linear_unit(projection_wkt: &str) -> LinearUnit {
    if projection_wkt.trim().is_empty() {
        return LinearUnit::Unknown;
    }

    let spatial_ref = match SpatialRef::from_wkt(projection_wkt) {
        Ok(sr) => sr,
        Err(e) => {
            warn!("Failed to parse projection WKT: {}", e);
            return LinearUnit::Unknown;
        }
    };

    if spatial_ref.is_geographic() {
        return LinearUnit::Degrees;
    }

    if spatial_ref.is_projected() {
        let linear_units = spatial_ref.linear_units();
        if (linear_units - 1.0).abs() < 0.01 {
            return LinearUnit::Meters;
        }
        return LinearUnit::Other(linear_units);
    }

    LinearUnit::Unknown
}

/// Byte-equal projections match immediately; otherwise GDAL decides equivalence.
pub fn projections_equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    let (sr_a, sr_b) = match (SpatialRef::from_wkt(a), SpatialRef::from_wkt(b)) {
        (Ok(sr_a), Ok(sr_b)) => (sr_a, sr_b),
        _ => {
            debug!("Projection WKT could not be parsed, treating as different");
            return false;
        }
    };

    let same = sr_a == sr_b;
    if same {
        info!("Projections differ textually but describe the same CRS");
    }
    same
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_projections_match() {
        assert!(projections_equivalent("", ""));
        assert!(projections_equivalent("not wkt", "not wkt"));
    }

    #[test]
    fn test_unparseable_projections_differ() {
        assert!(!projections_equivalent("not wkt", "also not wkt"));
    }

    #[test]
    fn test_empty_projection_unit_is_unknown() {
        assert_eq!(linear_unit(""), LinearUnit::Unknown);
    }
}
