//! JSON scenario files
//!
//! A scenario describes a synthetic tiled world (a flat grid of square cells
//! with holes, area tags and off-mesh links), the query filter to use on it,
//! and a list of agents whose queries the tool runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use navtiles::{NavMeshParams, PolyFlags, QueryFilter};
use serde::{Deserialize, Serialize};

/// Largest tile edge in cells; tile vertices must fit in 16-bit indices
pub const MAX_TILE_CELLS: usize = 254;

/// Area types of the demo world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Ground,
    Water,
    Road,
    Door,
    Grass,
    Jump,
}

impl Area {
    pub const ALL: [Area; 6] = [
        Area::Ground,
        Area::Water,
        Area::Road,
        Area::Door,
        Area::Grass,
        Area::Jump,
    ];

    /// Area id stored on polygons
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Polygon flags given to cells of this area
    pub fn flags(self) -> PolyFlags {
        match self {
            Area::Ground | Area::Road | Area::Grass => PolyFlags::WALK,
            Area::Water => PolyFlags::SWIM,
            Area::Door => PolyFlags::WALK | PolyFlags::DOOR,
            Area::Jump => PolyFlags::JUMP,
        }
    }

    pub fn default_cost(self) -> f32 {
        match self {
            Area::Ground | Area::Road | Area::Door => 1.0,
            Area::Water => 10.0,
            Area::Grass => 2.0,
            Area::Jump => 1.5,
        }
    }
}

/// Query the tool runs for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Follow the corridor in small steps, producing a smooth path
    PathfindIter,
    /// Corridor straightened with the funnel algorithm
    PathfindStraight,
    Raycast,
    DistanceToWall,
    /// Polygons within the start-to-end distance of the start
    FindPolysAround,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub mode: AgentMode,
    pub start: [f32; 3],
    #[serde(default)]
    pub end: [f32; 3],
    /// Search radius for wall distance queries
    #[serde(default = "default_wall_radius")]
    pub radius: f32,
}

/// Area tag of a single cell, in world cell coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOverride {
    pub cell: [usize; 2],
    pub area: Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffMeshLink {
    pub start: [f32; 3],
    pub end: [f32; 3],
    #[serde(default = "default_link_radius")]
    pub radius: f32,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default = "default_link_area")]
    pub area: Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_include")]
    pub include: PolyFlags,
    #[serde(default = "default_exclude")]
    pub exclude: PolyFlags,
    /// Cost overrides on top of the area defaults
    #[serde(default)]
    pub area_costs: BTreeMap<Area, f32>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            area_costs: BTreeMap::new(),
        }
    }
}

impl FilterConfig {
    pub fn to_query_filter(&self) -> QueryFilter {
        let mut filter = QueryFilter::new();
        filter.include_flags = self.include;
        filter.exclude_flags = self.exclude;
        for area in Area::ALL {
            let cost = self.area_costs.get(&area).copied().unwrap_or(area.default_cost());
            filter.set_area_cost(area.id(), cost);
        }
        filter
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_tiles")]
    pub tiles_x: usize,
    #[serde(default = "default_tiles")]
    pub tiles_y: usize,
    /// Tile edge length in cells
    #[serde(default = "default_tile_cells")]
    pub tile_cells: usize,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Height of the ground plane
    #[serde(default)]
    pub height: f32,
    /// Cells without ground, in world cell coordinates
    #[serde(default)]
    pub holes: Vec<[usize; 2]>,
    #[serde(default)]
    pub areas: Vec<AreaOverride>,
    #[serde(default)]
    pub off_mesh: Vec<OffMeshLink>,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Search box half extents used to find the polygons under agent positions
    #[serde(default = "default_pick_extents")]
    pub pick_extents: [f32; 3],
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

fn default_tiles() -> usize {
    1
}

fn default_tile_cells() -> usize {
    16
}

fn default_cell_size() -> f32 {
    0.5
}

fn default_pick_extents() -> [f32; 3] {
    [2.0, 4.0, 2.0]
}

fn default_max_nodes() -> usize {
    2048
}

fn default_wall_radius() -> f32 {
    100.0
}

fn default_link_radius() -> f32 {
    0.6
}

fn default_link_area() -> Area {
    Area::Jump
}

fn default_include() -> PolyFlags {
    PolyFlags::ALL ^ PolyFlags::DISABLED
}

fn default_exclude() -> PolyFlags {
    PolyFlags::empty()
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(text).context("Failed to parse scenario JSON")?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.tiles_x == 0 || self.tiles_y == 0 {
            bail!("Scenario needs at least one tile, got {}x{}", self.tiles_x, self.tiles_y);
        }
        if self.tile_cells == 0 || self.tile_cells > MAX_TILE_CELLS {
            bail!("tile_cells must be in 1..={}, got {}", MAX_TILE_CELLS, self.tile_cells);
        }
        if !(self.cell_size > 0.0) || !self.cell_size.is_finite() {
            bail!("cell_size must be positive, got {}", self.cell_size);
        }
        let (w, h) = self.grid_cells();
        for o in &self.areas {
            if o.cell[0] >= w || o.cell[1] >= h {
                bail!("Area override at {:?} lies outside the {}x{} cell grid", o.cell, w, h);
            }
        }
        if self.max_nodes == 0 || self.max_nodes > u16::MAX as usize {
            bail!("max_nodes must be in 1..=65535, got {}", self.max_nodes);
        }
        Ok(())
    }

    /// World size of the grid in cells
    pub fn grid_cells(&self) -> (usize, usize) {
        (self.tiles_x * self.tile_cells, self.tiles_y * self.tile_cells)
    }

    /// World size of one tile
    pub fn tile_size(&self) -> f32 {
        self.tile_cells as f32 * self.cell_size
    }

    /// Area of a world cell, `None` for holes
    pub fn area_at(&self, x: usize, z: usize) -> Option<Area> {
        if self.holes.contains(&[x, z]) {
            return None;
        }
        // Later overrides win
        let area = self
            .areas
            .iter()
            .rev()
            .find(|o| o.cell == [x, z])
            .map_or(Area::Ground, |o| o.area);
        Some(area)
    }

    pub fn mesh_params(&self) -> NavMeshParams {
        NavMeshParams {
            origin: [0.0, self.height, 0.0],
            tile_width: self.tile_size(),
            tile_height: self.tile_size(),
            max_tiles: self.tiles_x * self.tiles_y,
            max_polys_per_tile: self.tile_cells * self.tile_cells + self.off_mesh.len(),
            max_nodes: self.max_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> Result<()> {
        let scenario = Scenario::from_json("{}")?;
        assert_eq!((scenario.tiles_x, scenario.tiles_y), (1, 1));
        assert_eq!(scenario.tile_cells, 16);
        assert_eq!(scenario.tile_size(), 8.0);
        assert!(scenario.agents.is_empty());

        let filter = scenario.filter.to_query_filter();
        assert_eq!(filter.area_cost(Area::Water.id()), 10.0);
        assert_eq!(filter.area_cost(Area::Grass.id()), 2.0);
        assert_eq!(filter.area_cost(Area::Jump.id()), 1.5);
        assert!(!filter.include_flags.contains(PolyFlags::DISABLED));
        Ok(())
    }

    #[test]
    fn test_full_scenario() -> Result<()> {
        let scenario = Scenario::from_json(
            r#"{
                "tiles_x": 2,
                "tiles_y": 3,
                "tile_cells": 4,
                "cell_size": 1.0,
                "holes": [[1, 1]],
                "areas": [{ "cell": [2, 2], "area": "water" }],
                "off_mesh": [{ "start": [0.5, 0, 0.5], "end": [3.5, 0, 3.5], "bidirectional": true }],
                "filter": { "exclude": "DOOR", "area_costs": { "water": 3.0 } },
                "agents": [
                    { "mode": "pathfind_straight", "start": [0.5, 0, 0.5], "end": [7.5, 0, 11.5] },
                    { "mode": "distance_to_wall", "start": [1.5, 0, 2.5], "radius": 4.0 }
                ]
            }"#,
        )?;

        assert_eq!(scenario.grid_cells(), (8, 12));
        assert_eq!(scenario.area_at(1, 1), None);
        assert_eq!(scenario.area_at(2, 2), Some(Area::Water));
        assert_eq!(scenario.area_at(0, 0), Some(Area::Ground));
        assert_eq!(scenario.off_mesh[0].area, Area::Jump);
        assert_eq!(scenario.off_mesh[0].radius, 0.6);
        assert_eq!(scenario.agents[0].mode, AgentMode::PathfindStraight);
        assert_eq!(scenario.agents[1].radius, 4.0);

        let filter = scenario.filter.to_query_filter();
        assert_eq!(filter.exclude_flags, PolyFlags::DOOR);
        assert_eq!(filter.area_cost(Area::Water.id()), 3.0);

        let params = scenario.mesh_params();
        assert_eq!(params.max_tiles, 6);
        assert_eq!(params.max_polys_per_tile, 17);
        Ok(())
    }

    #[test]
    fn test_invalid_scenarios() {
        assert!(Scenario::from_json(r#"{ "tiles_x": 0 }"#).is_err());
        assert!(Scenario::from_json(r#"{ "tile_cells": 1000 }"#).is_err());
        assert!(Scenario::from_json(r#"{ "cell_size": -1.0 }"#).is_err());
        assert!(Scenario::from_json(r#"{ "areas": [{ "cell": [99, 0], "area": "road" }] }"#).is_err());
        assert!(Scenario::from_json(r#"{ "agents": [{ "mode": "fly", "start": [0, 0, 0] }] }"#).is_err());
        assert!(Scenario::from_json("not json").is_err());
    }
}
