//! Declarative materialisation of the thematic datasets.
//!
//! Each dataset is a fixed selection predicate over the geometry-typed
//! staging tables, reprojected into the configured target SRID and indexed
//! spatially. Creation is idempotent by existence: a dataset whose output
//! table already exists is skipped entirely. Datasets are independent of one
//! another and committed one at a time.

use kerbside_core::{Database, DatabaseError};
use log::info;

const SRID_PLACEHOLDER: &str = "__srid__";

/// A curated output table built from a fixed predicate over staging tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThematicDataset {
    /// Output table name.
    pub name: &'static str,
    definition: &'static str,
}

impl ThematicDataset {
    fn definition_for(&self, srid: u32) -> String {
        self.definition
            .replace(SRID_PLACEHOLDER, &srid.to_string())
    }

    /// Create this dataset unless a conflicting output already exists.
    ///
    /// Returns `true` when the dataset was created and `false` for the
    /// idempotent no-op. The commit boundary is per dataset.
    ///
    /// # Errors
    /// Propagates database failures unchanged.
    pub fn materialise(
        &self,
        db: &mut dyn Database,
        schema: &str,
        srid: u32,
    ) -> Result<bool, DatabaseError> {
        if !db.handle_conflicting_output_tables(&[self.name], schema)? {
            info!("dataset \"{}\" already present, skipping", self.name);
            return Ok(false);
        }
        db.execute(&self.definition_for(srid))?;
        db.commit()?;
        Ok(true)
    }
}

/// The thematic datasets derived from every OSM import.
pub const THEMATIC_DATASETS: &[ThematicDataset] = &[
    ThematicDataset {
        name: "building",
        definition: "\
CREATE TABLE building AS (
    SELECT ST_Transform(way, __srid__)::geometry(Polygon, __srid__) AS geom
    FROM osm_polygon
    WHERE building IS NOT NULL
);

CREATE INDEX building_geom_idx ON building USING gist (geom);",
    },
    ThematicDataset {
        name: "crossing",
        definition: "\
CREATE TABLE crossing AS (
    SELECT ST_Transform(way, __srid__)::geometry(Point, __srid__) AS geom FROM osm_point WHERE highway IN ('crossing') UNION ALL
    SELECT ST_Transform(way, __srid__)::geometry(LineString, __srid__) AS geom FROM osm_line WHERE highway IN ('crossing') UNION ALL
    SELECT ST_Transform(way, __srid__)::geometry(Polygon, __srid__) AS geom FROM osm_polygon WHERE highway IN ('crossing')
);

CREATE INDEX crossing_geom_idx ON crossing USING gist (geom);",
    },
    ThematicDataset {
        name: "facility",
        definition: "\
CREATE TABLE facility AS (
    SELECT ST_Transform(way, __srid__)::geometry(Point, __srid__) AS geom
    FROM osm_point
    WHERE amenity IN ('arts_centre', 'artwork', 'attraction', 'bar', 'biergarten', 'cafe', 'castle', 'cinema', 'museum',
                      'park', 'pub', 'restaurant', 'swimming_pool', 'theatre', 'viewpoint') -- entertainment
       OR amenity IN ('bakery', 'beverages', 'butcher', 'clothes', 'department_store', 'fast_food',
                      'florist', 'furniture_shop', 'kiosk', 'mall', 'outdoor_shop', 'pharmacy',
                      'shoe_shop', 'sports_shop', 'supermarket', 'commercial', 'retail', 'shop') -- retail
       OR amenity IN ('university', 'school', 'college', 'gymnasium', 'kindergarten', 'boarding_school', 'music_school',
                      'riding_school', 'school;dormitory') -- institutional
       OR tourism IN ('museum', 'attraction', 'gallery', 'viewpoint', 'zoo')

    UNION ALL

    SELECT ST_Transform(way, __srid__)::geometry(Polygon, __srid__) AS geom
    FROM osm_polygon
    WHERE amenity IN ('arts_centre', 'artwork', 'attraction', 'bar', 'biergarten', 'cafe', 'castle', 'cinema', 'museum',
                      'park', 'pub', 'restaurant', 'swimming_pool', 'theatre', 'viewpoint') -- entertainment
       OR amenity IN ('bakery', 'beverages', 'butcher', 'clothes', 'department_store', 'fast_food', 'florist',
                      'furniture_shop', 'kiosk', 'mall', 'outdoor_shop', 'pharmacy', 'shoe_shop', 'sports_shop',
                      'supermarket', 'commercial', 'retail', 'shop') -- retail
       OR amenity IN ('university', 'school', 'college', 'gymnasium', 'kindergarten', 'boarding_school', 'music_school',
                      'riding_school', 'school;dormitory') -- institutional
       OR tourism IN ('museum', 'attraction', 'gallery', 'viewpoint', 'zoo')
);

CREATE INDEX facility_geom_idx ON facility USING gist (geom);",
    },
    ThematicDataset {
        name: "greenness",
        definition: "\
CREATE TABLE greenness AS (
    SELECT ST_Transform(way, __srid__)::geometry(Polygon, __srid__) AS geom
    FROM osm_polygon
    WHERE landuse IN ('forest', 'grass', 'meadow', 'village_green', 'recreation_ground', 'vineyard', 'flowerbed', 'farmland', 'heath', 'nature_reseve', 'park', 'greenfield')
       OR leisure IN ('garden', 'golf_course', 'park')
       OR \"natural\" IN ('tree', 'wood', 'grassland', 'heath', 'scrub')
);

CREATE INDEX greenness_geom_idx ON greenness USING gist (geom);",
    },
    ThematicDataset {
        name: "water",
        definition: "\
CREATE TABLE water AS (
    SELECT ST_Transform(way, __srid__)::geometry(LineString, __srid__) AS geom FROM osm_line WHERE (waterway IS NOT NULL OR \"natural\" = 'water') AND tunnel IS NULL UNION ALL
    SELECT ST_Transform(way, __srid__)::geometry(Polygon, __srid__) AS geom FROM osm_polygon WHERE (waterway IS NOT NULL OR \"natural\" = 'water') AND tunnel IS NULL
);

CREATE INDEX water_geom_idx ON water USING gist (geom);",
    },
];

/// Materialise every thematic dataset, returning the names actually created.
///
/// Partial completion of one dataset does not block the others; each is
/// checked and committed on its own.
///
/// # Errors
/// Propagates database failures unchanged.
pub fn materialise_all(
    db: &mut dyn Database,
    schema: &str,
    srid: u32,
) -> Result<Vec<&'static str>, DatabaseError> {
    let mut created = Vec::new();
    for dataset in THEMATIC_DATASETS {
        info!("create dataset \"{}\"", dataset.name);
        if dataset.materialise(db, schema, srid)? {
            created.push(dataset.name);
        }
    }
    Ok(created)
}
