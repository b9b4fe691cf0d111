// SVG rendering of recorded track maps

use std::fmt::{self, Write};

use crate::errors::MapperError;
use crate::track_map::types::{Coordinate, PathAsset, ViewBox};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Fixed margin around the driving line, in track units
pub const VIEW_BOX_MARGIN: f64 = 20.0;

/// Configuration for SVG track map rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackMapConfig {
    /// Stroke width for the driving line
    pub stroke_width: f64,
    /// Radius of the sector boundary markers
    pub marker_radius: f64,
}

impl Default for TrackMapConfig {
    fn default() -> Self {
        Self {
            stroke_width: 3.0,
            marker_radius: 6.0,
        }
    }
}

/// Renders track map assets as standalone SVG documents
#[derive(Default)]
pub struct TrackMapRenderer {
    config: TrackMapConfig,
}

impl TrackMapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrackMapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackMapConfig {
        &self.config
    }

    /// Render the driving line and sector markers of `asset`.
    ///
    /// The document uses the asset's own coordinates, so the view box is the stored one
    /// (recomputed with [`VIEW_BOX_MARGIN`] when the stored box is degenerate).
    pub fn render(&self, asset: &PathAsset) -> Result<String, MapperError> {
        if asset.coordinates.len() < 2 {
            return Err(MapperError::SvgGenerationError {
                reason: format!(
                    "Need at least 2 points to draw a track map, got {}",
                    asset.coordinates.len()
                ),
            });
        }
        asset
            .validate()
            .map_err(|reason| MapperError::SvgGenerationError { reason })?;

        let view_box = if asset.view_box.width > 0. && asset.view_box.height > 0. {
            asset.view_box
        } else {
            ViewBox::from_coordinates(&asset.coordinates, VIEW_BOX_MARGIN).ok_or(
                MapperError::SvgGenerationError {
                    reason: "Cannot compute view box".to_string(),
                },
            )?
        };
        debug!("Rendering {} with view box {}", asset.track_id, view_box);

        let svg = self
            .write_document(asset, view_box)
            .map_err(|e| MapperError::SvgGenerationError {
                reason: format!("Could not format SVG document: {}", e),
            })?;

        info!(
            "Rendered track map for {} ({} points)",
            asset.track_id,
            asset.coordinates.len()
        );
        Ok(svg)
    }

    fn write_document(&self, asset: &PathAsset, view_box: ViewBox) -> Result<String, fmt::Error> {
        let mut svg = String::new();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{}">"#,
            view_box
        )?;
        writeln!(svg, "<title>{}</title>", escape_xml(&asset.track_id))?;
        writeln!(
            svg,
            r#"<path d="{}" fill="none" stroke="black" stroke-width="{}" stroke-linejoin="round"/>"#,
            path_data(&asset.coordinates)?,
            self.config.stroke_width
        )?;

        for (sector, index) in asset.sector_indices.iter().enumerate() {
            // index 0 means the boundary was never crossed
            if *index == 0 {
                continue;
            }
            let (x, y) = asset.coordinates[*index];
            writeln!(
                svg,
                r#"<circle class="sector{}" cx="{:.4}" cy="{:.4}" r="{}" fill="red"/>"#,
                sector + 2,
                x,
                y,
                self.config.marker_radius
            )?;
        }
        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

/// SVG path data for a closed driving line
fn path_data(points: &[Coordinate]) -> Result<String, fmt::Error> {
    let mut data = String::new();
    for (i, (x, y)) in points.iter().enumerate() {
        let command = if i == 0 { 'M' } else { 'L' };
        write!(data, "{} {:.4},{:.4} ", command, x, y)?;
    }
    data.push('Z');
    Ok(data)
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_asset(sector_indices: [usize; 2]) -> PathAsset {
        let coordinates = vec![(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)];
        let view_box = ViewBox::from_coordinates(&coordinates, VIEW_BOX_MARGIN).unwrap();
        PathAsset::new(
            "test_track".to_string(),
            coordinates,
            vec![(0.0, 1.0), (100.0, 1.0), (150.0, 1.0), (250.0, 1.0)],
            view_box,
            sector_indices,
        )
    }

    #[test]
    fn test_renderer_with_custom_config() {
        let renderer = TrackMapRenderer::with_config(TrackMapConfig {
            stroke_width: 5.0,
            marker_radius: 2.0,
        });
        assert_eq!(renderer.config().stroke_width, 5.0);

        let svg = renderer.render(&create_test_asset([1, 2])).unwrap();
        assert!(svg.contains(r#"stroke-width="5""#));
        assert!(svg.contains(r#"r="2""#));
    }

    #[test]
    fn test_render_simple_asset() {
        let svg = TrackMapRenderer::new()
            .render(&create_test_asset([1, 2]))
            .unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"viewBox="-20.0000 -20.0000 140.0000 90.0000""#));
        assert!(svg.contains("M 0.0000,0.0000 L 100.0000,0.0000"));
        assert!(svg.contains(r#"class="sector2" cx="100.0000" cy="0.0000""#));
        assert!(svg.contains(r#"class="sector3" cx="100.0000" cy="50.0000""#));
    }

    #[test]
    fn test_unset_sector_markers_are_skipped() {
        let svg = TrackMapRenderer::new()
            .render(&create_test_asset([0, 3]))
            .unwrap();

        assert!(!svg.contains("sector2"));
        assert!(svg.contains("sector3"));
    }

    #[test]
    fn test_render_rejects_tiny_paths() {
        let mut asset = create_test_asset([0, 0]);
        asset.coordinates.truncate(1);
        asset.distance_profile.truncate(1);

        assert!(matches!(
            TrackMapRenderer::new().render(&asset),
            Err(MapperError::SvgGenerationError { .. })
        ));
    }

    #[test]
    fn test_degenerate_view_box_is_recomputed() {
        let mut asset = create_test_asset([0, 0]);
        asset.view_box.width = 0.;

        let svg = TrackMapRenderer::new().render(&asset).unwrap();
        assert!(svg.contains(r#"viewBox="-20.0000 -20.0000 140.0000 90.0000""#));
    }

    #[test]
    fn test_document_structure_and_escaped_title() {
        let mut asset = create_test_asset([1, 0]);
        asset.track_id = "Road <America> & Co".to_string();

        let svg = TrackMapRenderer::new().render(&asset).unwrap();
        let lines: Vec<&str> = svg.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "<title>Road &lt;America&gt; &amp; Co</title>");
        assert!(lines[2].starts_with(r#"<path d="M 0.0000,0.0000"#));
        assert!(lines[2].contains(r#"L 0.0000,50.0000 Z""#));
        assert!(lines[3].starts_with(r#"<circle class="sector2""#));
        assert_eq!(lines[4], "</svg>");
    }

    #[test]
    fn test_path_data() {
        assert_eq!(
            path_data(&[(1.0, 2.0), (3.5, -4.25)]).unwrap(),
            "M 1.0000,2.0000 L 3.5000,-4.2500 Z"
        );
    }
}
