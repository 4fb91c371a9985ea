//! Coverage grid: latitude/longitude cell occupancy, area-weighted coverage
//! percentage, gap distances and macro-region reporting.

use balloon_domain::geodesy::{area_weight, haversine_km};
use balloon_domain::{Position, Position2D};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fine grid used for the coverage percentage (12 x 12 cells).
pub const FINE_LAT_STEP_DEG: f64 = 15.0;
/// Fine grid column width in degrees
pub const FINE_LNG_STEP_DEG: f64 = 30.0;

/// Coarse grid used for region naming (9 x 12 cells).
pub const COARSE_LAT_STEP_DEG: f64 = 20.0;
/// Coarse grid column width in degrees
pub const COARSE_LNG_STEP_DEG: f64 = 30.0;

/// One grid cell. `covered` iff `occupant_count > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Southern edge
    pub lat_min: f64,
    /// Northern edge
    pub lat_max: f64,
    /// Western edge
    pub lng_min: f64,
    /// Eastern edge
    pub lng_max: f64,
    /// Positions counted in the cell
    pub occupant_count: usize,
    /// Whether any position fell in the cell
    pub covered: bool,
}

impl GridCell {
    /// Midpoint of the cell bounds
    #[must_use]
    pub fn center(&self) -> Position2D {
        Position2D::new(
            (self.lat_min + self.lat_max) / 2.0,
            (self.lng_min + self.lng_max) / 2.0,
        )
    }

    /// Area weight, `cos` of the center latitude.
    #[must_use]
    pub fn weight(&self) -> f64 {
        area_weight(self.center().latitude)
    }
}

/// Exhaustive, non-overlapping partition of lat/lng space, row-major from
/// the south-west corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGrid {
    lat_step: f64,
    lng_step: f64,
    rows: usize,
    cols: usize,
    cells: Vec<GridCell>,
}

/// Distance from an uncovered cell to the nearest covered one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    /// Index into [`CoverageGrid::cells`]
    pub cell_index: usize,
    /// Centre of the uncovered cell
    pub center: Position2D,
    /// Distance to the nearest covered cell centre
    pub distance_km: f64,
    /// Region of the enclosing coarse cell
    pub region: MacroRegion,
}

impl CoverageGrid {
    /// Empty grid with the given cell size in degrees.
    ///
    /// Steps are expected to be positive; the last row and column are
    /// clipped to the pole and the antimeridian.
    #[must_use]
    pub fn new(lat_step: f64, lng_step: f64) -> Self {
        let rows = ((180.0 / lat_step).ceil() as usize).max(1);
        let cols = ((360.0 / lng_step).ceil() as usize).max(1);

        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let lat_min = -90.0 + row as f64 * lat_step;
            let lat_max = (lat_min + lat_step).min(90.0);
            for col in 0..cols {
                let lng_min = -180.0 + col as f64 * lng_step;
                let lng_max = (lng_min + lng_step).min(180.0);
                cells.push(GridCell {
                    lat_min,
                    lat_max,
                    lng_min,
                    lng_max,
                    occupant_count: 0,
                    covered: false,
                });
            }
        }

        Self {
            lat_step,
            lng_step,
            rows,
            cols,
            cells,
        }
    }

    /// 15° x 30° grid used for the coverage percentage
    #[must_use]
    pub fn fine() -> Self {
        Self::new(FINE_LAT_STEP_DEG, FINE_LNG_STEP_DEG)
    }

    /// 20° x 30° grid used for region naming
    #[must_use]
    pub fn coarse() -> Self {
        Self::new(COARSE_LAT_STEP_DEG, COARSE_LNG_STEP_DEG)
    }

    /// Grid with every position counted.
    #[must_use]
    pub fn with_positions(mut self, positions: &[Position]) -> Self {
        for p in positions {
            self.add(p);
        }
        self
    }

    /// Index of the cell containing a point. Latitude 90 and longitude 180
    /// fall into the last row and column.
    #[must_use]
    pub fn cell_index(&self, lat: f64, lng: f64) -> usize {
        let row = (((lat + 90.0) / self.lat_step).floor().max(0.0) as usize).min(self.rows - 1);
        let col = (((lng + 180.0) / self.lng_step).floor().max(0.0) as usize).min(self.cols - 1);
        row * self.cols + col
    }

    /// Macro-region of the cell containing a point, named by the cell's
    /// centre. On the coarse grid this agrees with [`region_coverage`].
    #[must_use]
    pub fn region_at(&self, lat: f64, lng: f64) -> MacroRegion {
        let center = self.cells[self.cell_index(lat, lng)].center();
        macro_region(center.latitude, center.longitude)
    }

    /// Count one position in its cell.
    pub fn add(&mut self, position: &Position) {
        let index = self.cell_index(position.latitude, position.longitude);
        let cell = &mut self.cells[index];
        cell.occupant_count += 1;
        cell.covered = true;
    }

    /// Cells in row-major order
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Number of latitude rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of longitude columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells with at least one occupant
    pub fn covered_count(&self) -> usize {
        self.cells.iter().filter(|c| c.covered).count()
    }

    /// Area-weighted share of covered cells, in percent.
    #[must_use]
    pub fn coverage_percent(&self) -> f64 {
        let total: f64 = self.cells.iter().map(GridCell::weight).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let covered: f64 = self
            .cells
            .iter()
            .filter(|c| c.covered)
            .map(GridCell::weight)
            .sum();
        (covered / total * 100.0).clamp(0.0, 100.0)
    }

    /// Gap size of every uncovered cell by brute-force scan over the covered
    /// cells. Empty when nothing is covered.
    #[must_use]
    pub fn gaps(&self) -> Vec<CoverageGap> {
        let covered_centers: Vec<Position2D> = self
            .cells
            .iter()
            .filter(|c| c.covered)
            .map(GridCell::center)
            .collect();
        if covered_centers.is_empty() {
            return Vec::new();
        }
        let coarse = Self::coarse();

        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.covered)
            .map(|(cell_index, cell)| {
                let center = cell.center();
                let distance_km = covered_centers
                    .iter()
                    .map(|c| {
                        haversine_km(center.latitude, center.longitude, c.latitude, c.longitude)
                    })
                    .fold(f64::INFINITY, f64::min);
                CoverageGap {
                    cell_index,
                    center,
                    distance_km,
                    region: coarse.region_at(center.latitude, center.longitude),
                }
            })
            .collect()
    }
}

// =============================================================================
// MACRO REGIONS
// =============================================================================

/// Named macro-regions used for human-readable gap reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacroRegion {
    /// North of 66°N
    Arctic,
    /// South of 60°S
    Antarctica,
    /// North Pacific
    NorthPacific,
    /// North America
    NorthAmerica,
    /// Central America and the Caribbean
    CentralAmerica,
    /// North Atlantic
    NorthAtlantic,
    /// Europe
    Europe,
    /// North Africa
    NorthAfrica,
    /// Middle East
    MiddleEast,
    /// Siberia and Central Asia
    NorthernAsia,
    /// Indian subcontinent
    SouthAsia,
    /// East Asia
    EastAsia,
    /// Sub-Saharan Africa
    SouthernAfrica,
    /// South America
    SouthAmerica,
    /// Australia
    Australia,
    /// Indonesian archipelago
    MaritimeSoutheastAsia,
    /// South Pacific
    SouthPacific,
    /// South Atlantic
    SouthAtlantic,
    /// Indian Ocean
    IndianOcean,
    /// Anything the table does not name
    OpenOcean,
}

impl MacroRegion {
    /// Human-readable region name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arctic => "Arctic",
            Self::Antarctica => "Antarctica",
            Self::NorthPacific => "North Pacific",
            Self::NorthAmerica => "North America",
            Self::CentralAmerica => "Central America & Caribbean",
            Self::NorthAtlantic => "North Atlantic",
            Self::Europe => "Europe",
            Self::NorthAfrica => "North Africa",
            Self::MiddleEast => "Middle East",
            Self::NorthernAsia => "Northern Asia",
            Self::SouthAsia => "South Asia",
            Self::EastAsia => "East Asia",
            Self::SouthernAfrica => "Southern Africa",
            Self::SouthAmerica => "South America",
            Self::Australia => "Australia",
            Self::MaritimeSoutheastAsia => "Maritime Southeast Asia",
            Self::SouthPacific => "South Pacific",
            Self::SouthAtlantic => "South Atlantic",
            Self::IndianOcean => "Indian Ocean",
            Self::OpenOcean => "Open Ocean",
        }
    }
}

/// Lookup table entry. Bounds are inclusive; `lng_min > lng_max` marks a
/// range crossing the antimeridian.
struct RegionBounds {
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
    region: MacroRegion,
}

const fn bounds(
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
    region: MacroRegion,
) -> RegionBounds {
    RegionBounds {
        lat_min,
        lat_max,
        lng_min,
        lng_max,
        region,
    }
}

// First match wins. Every entry owns at least one coarse cell centre.
const REGION_TABLE: &[RegionBounds] = &[
    bounds(66.0, 90.0, -180.0, 180.0, MacroRegion::Arctic),
    bounds(-90.0, -60.0, -180.0, 180.0, MacroRegion::Antarctica),
    bounds(0.0, 66.0, 140.0, -110.0, MacroRegion::NorthPacific),
    bounds(15.0, 66.0, -110.0, -50.0, MacroRegion::NorthAmerica),
    bounds(0.0, 15.0, -110.0, -60.0, MacroRegion::CentralAmerica),
    bounds(0.0, 66.0, -60.0, -10.0, MacroRegion::NorthAtlantic),
    bounds(36.0, 66.0, -10.0, 45.0, MacroRegion::Europe),
    bounds(0.0, 36.0, -10.0, 35.0, MacroRegion::NorthAfrica),
    bounds(12.0, 40.0, 35.0, 60.0, MacroRegion::MiddleEast),
    bounds(40.0, 66.0, 45.0, 140.0, MacroRegion::NorthernAsia),
    bounds(0.0, 40.0, 60.0, 95.0, MacroRegion::SouthAsia),
    bounds(-10.0, 0.0, 95.0, 150.0, MacroRegion::MaritimeSoutheastAsia),
    bounds(0.0, 40.0, 95.0, 140.0, MacroRegion::EastAsia),
    bounds(-35.0, 0.0, 8.0, 50.0, MacroRegion::SouthernAfrica),
    bounds(-60.0, 0.0, -82.0, -34.0, MacroRegion::SouthAmerica),
    bounds(-45.0, -10.0, 110.0, 155.0, MacroRegion::Australia),
    bounds(-60.0, 0.0, 150.0, -82.0, MacroRegion::SouthPacific),
    bounds(-60.0, 0.0, -34.0, 20.0, MacroRegion::SouthAtlantic),
    bounds(-60.0, 12.0, 20.0, 150.0, MacroRegion::IndianOcean),
];

impl RegionBounds {
    fn contains(&self, lat: f64, lng: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        if self.lng_min <= self.lng_max {
            (self.lng_min..=self.lng_max).contains(&lng)
        } else {
            // Wraps across the antimeridian.
            lng >= self.lng_min || lng <= self.lng_max
        }
    }
}

/// Macro-region containing a point.
#[must_use]
pub fn macro_region(lat: f64, lng: f64) -> MacroRegion {
    REGION_TABLE
        .iter()
        .find(|b| b.contains(lat, lng))
        .map_or(MacroRegion::OpenOcean, |b| b.region)
}

/// Coarse-grid coverage of one macro-region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionCoverage {
    /// Region
    pub region: MacroRegion,
    /// Coarse cells assigned to the region
    pub total_cells: usize,
    /// Coarse cells with an occupant
    pub covered_cells: usize,
}

/// Per-region coarse cell coverage, in region declaration order.
#[must_use]
pub fn region_coverage(positions: &[Position]) -> Vec<RegionCoverage> {
    let grid = CoverageGrid::coarse().with_positions(positions);
    let mut by_region: BTreeMap<MacroRegion, RegionCoverage> = BTreeMap::new();

    for cell in grid.cells() {
        let center = cell.center();
        let region = macro_region(center.latitude, center.longitude);
        let entry = by_region.entry(region).or_insert(RegionCoverage {
            region,
            total_cells: 0,
            covered_cells: 0,
        });
        entry.total_cells += 1;
        if cell.covered {
            entry.covered_cells += 1;
        }
    }

    by_region.into_values().collect()
}

/// Full coverage analysis of one set of positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Area-weighted coverage in percent
    pub coverage_percent: f64,
    /// Covered fine cells
    pub covered_cells: usize,
    /// All fine cells
    pub total_cells: usize,
    /// Uncovered fine cells
    pub gap_count: usize,
    /// Uncovered cell farthest from coverage
    pub largest_gap: Option<CoverageGap>,
    /// Coarse-grid coverage per region
    pub regions: Vec<RegionCoverage>,
    /// Regions with no covered coarse cell at all.
    pub uncovered_regions: Vec<MacroRegion>,
}

/// Run the fine-grid coverage and coarse-grid region passes.
#[must_use]
pub fn analyze_coverage(positions: &[Position]) -> (CoverageGrid, CoverageSummary) {
    let grid = CoverageGrid::fine().with_positions(positions);
    let gaps = grid.gaps();
    let largest_gap = gaps
        .iter()
        .copied()
        .max_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let regions = region_coverage(positions);
    let uncovered_regions = if positions.is_empty() {
        Vec::new()
    } else {
        regions
            .iter()
            .filter(|r| r.covered_cells == 0)
            .map(|r| r.region)
            .collect()
    };

    tracing::debug!(
        positions = positions.len(),
        covered = grid.covered_count(),
        gaps = gaps.len(),
        "Coverage grid built"
    );

    let summary = CoverageSummary {
        coverage_percent: grid.coverage_percent(),
        covered_cells: grid.covered_count(),
        total_cells: grid.cells().len(),
        gap_count: gaps.len(),
        largest_gap,
        regions,
        uncovered_regions,
    };
    (grid, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fine_grid_shape() {
        let grid = CoverageGrid::fine();
        assert_eq!(grid.rows(), 12);
        assert_eq!(grid.cols(), 12);
        assert_eq!(grid.cells().len(), 144);
        assert_eq!(CoverageGrid::coarse().cells().len(), 108);
    }

    #[test]
    fn test_cell_index_edges() {
        let grid = CoverageGrid::fine();
        assert_eq!(grid.cell_index(-90.0, -180.0), 0);
        assert_eq!(grid.cell_index(90.0, 180.0), 143);
        let cell = grid.cells()[grid.cell_index(10.0, 40.0)];
        assert!(cell.lat_min <= 10.0 && 10.0 < cell.lat_max);
        assert!(cell.lng_min <= 40.0 && 40.0 < cell.lng_max);
    }

    #[test]
    fn test_coverage_percent_bounds() {
        assert_eq!(CoverageGrid::fine().coverage_percent(), 0.0);

        let one = CoverageGrid::fine().with_positions(&[Position::new(1.0, 1.0, 10.0)]);
        let pct = one.coverage_percent();
        assert!(pct > 0.0 && pct < 100.0);

        let everywhere: Vec<Position> = CoverageGrid::fine()
            .cells()
            .iter()
            .map(|c| {
                let center = c.center();
                Position::new(center.latitude, center.longitude, 10.0)
            })
            .collect();
        let full = CoverageGrid::fine().with_positions(&everywhere);
        assert!((full.coverage_percent() - 100.0).abs() < 1e-9);
        assert!(full.gaps().is_empty());
    }

    #[test]
    fn test_equatorial_cells_weigh_more() {
        let equator = CoverageGrid::fine().with_positions(&[Position::new(1.0, 1.0, 10.0)]);
        let polar = CoverageGrid::fine().with_positions(&[Position::new(85.0, 1.0, 10.0)]);
        assert!(equator.coverage_percent() > polar.coverage_percent());
    }

    #[test]
    fn test_gaps_measure_nearest_covered_cell() {
        let grid = CoverageGrid::fine().with_positions(&[Position::new(1.0, 1.0, 10.0)]);
        let gaps = grid.gaps();
        assert_eq!(gaps.len(), 143);

        // The neighbouring cell to the east is one 30 degree step away.
        let east = grid.cell_index(1.0, 31.0);
        let gap = gaps.iter().find(|g| g.cell_index == east).unwrap();
        let expected = haversine_km(7.5, 15.0, 7.5, 45.0);
        assert!((gap.distance_km - expected).abs() < 1e-9);

        assert!(CoverageGrid::fine().gaps().is_empty());
    }

    #[test]
    fn test_macro_region_lookup() {
        assert_eq!(macro_region(80.0, 0.0), MacroRegion::Arctic);
        assert_eq!(macro_region(-80.0, 100.0), MacroRegion::Antarctica);
        assert_eq!(macro_region(30.0, 170.0), MacroRegion::NorthPacific);
        assert_eq!(macro_region(30.0, -170.0), MacroRegion::NorthPacific);
        assert_eq!(macro_region(45.0, 10.0), MacroRegion::Europe);
        assert_eq!(macro_region(-20.0, -170.0), MacroRegion::SouthPacific);
        assert_eq!(macro_region(-20.0, 165.0), MacroRegion::SouthPacific);
        assert_eq!(macro_region(-25.0, 135.0), MacroRegion::Australia);
        assert_eq!(MacroRegion::NorthPacific.as_str(), "North Pacific");
    }

    #[test]
    fn test_region_coverage_partition() {
        let regions = region_coverage(&[Position::new(45.0, 10.0, 10.0)]);
        let total: usize = regions.iter().map(|r| r.total_cells).sum();
        assert_eq!(total, 108);

        let europe = regions
            .iter()
            .find(|r| r.region == MacroRegion::Europe)
            .unwrap();
        assert_eq!(europe.covered_cells, 1);
    }

    #[test]
    fn test_every_region_owns_a_coarse_cell() {
        let regions = region_coverage(&[]);
        assert_eq!(regions.len(), REGION_TABLE.len());
        assert!(regions.iter().all(|r| r.total_cells > 0));
        assert!(
            regions
                .iter()
                .any(|r| r.region == MacroRegion::MaritimeSoutheastAsia)
        );
        assert!(regions.iter().all(|r| r.region != MacroRegion::OpenOcean));
    }

    #[test]
    fn test_gap_regions_follow_coarse_cells() {
        let grid = CoverageGrid::fine().with_positions(&[Position::new(45.0, 10.0, 10.0)]);
        let coarse = CoverageGrid::coarse();
        for gap in grid.gaps() {
            assert_eq!(
                gap.region,
                coarse.region_at(gap.center.latitude, gap.center.longitude)
            );
        }

        // Fine centre (7.5, 105) lies in the coarse cell centred on the equator.
        let gap = grid
            .gaps()
            .into_iter()
            .find(|g| g.cell_index == grid.cell_index(7.5, 105.0))
            .unwrap();
        assert_eq!(gap.region, MacroRegion::MaritimeSoutheastAsia);
    }

    #[test]
    fn test_analyze_coverage_empty() {
        let (_, summary) = analyze_coverage(&[]);
        assert_eq!(summary.coverage_percent, 0.0);
        assert_eq!(summary.covered_cells, 0);
        assert!(summary.largest_gap.is_none());
        assert!(summary.uncovered_regions.is_empty());
    }

    #[test]
    fn test_analyze_coverage_reports_largest_gap() {
        let (_, summary) = analyze_coverage(&[Position::new(45.0, 10.0, 10.0)]);
        assert_eq!(summary.covered_cells, 1);
        let gap = summary.largest_gap.unwrap();
        assert!(gap.distance_km > 10_000.0);
        assert!(summary.uncovered_regions.contains(&MacroRegion::SouthPacific));
        assert!(!summary.uncovered_regions.contains(&MacroRegion::Europe));
    }
}
