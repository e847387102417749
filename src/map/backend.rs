//! The seam between the listing map and the mapping library.

use serde::Serialize;

/// `[latitude, longitude]`
pub type LatLng = [f64; 2];

/// Handle of a layer created by a backend.
pub type LayerId = usize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapConfig {
    pub container: String,
    pub zoom: u8,
    pub max_zoom: u8,
    pub dragging: bool,
    pub tap: bool,
    pub scroll_wheel_zoom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileConfig {
    pub url: String,
    pub attribution: String,
    pub subdomains: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icon {
    pub url: String,
    pub size: [f64; 2],
    pub anchor: [f64; 2],
    pub popup_anchor: [f64; 2],
    pub tooltip_anchor: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Path style, a field left `None` keeps the library default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupOptions {
    pub min_width: u32,
    pub max_width: u32,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipOptions {
    pub direction: String,
    pub permanent: bool,
    pub opacity: f64,
    pub interactive: bool,
    pub class_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub fn around(point: LatLng) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    pub fn extend(&mut self, [lat, lng]: LatLng) {
        self.south_west = [self.south_west[0].min(lat), self.south_west[1].min(lng)];
        self.north_east = [self.north_east[0].max(lat), self.north_east[1].max(lng)];
    }
}

/// A mapping library the listing map renders into.
pub trait MapBackend {
    fn create_map(&mut self, config: &MapConfig);

    fn add_tile_layer(&mut self, tiles: &TileConfig);

    /// Turn on scroll-wheel zoom, which every map starts without.
    fn enable_scroll_zoom(&mut self);

    fn add_marker(&mut self, at: LatLng, icon: &Icon, opacity: f64) -> LayerId;

    fn add_path(&mut self, points: &[LatLng], style: &PathStyle) -> LayerId;

    fn set_icon(&mut self, layer: LayerId, icon: &Icon);

    fn set_style(&mut self, layer: LayerId, style: &PathStyle);

    fn bind_popup(&mut self, layer: LayerId, html: &str, options: &PopupOptions);

    fn bind_tooltip(&mut self, layer: LayerId, html: &str, options: &TooltipOptions);

    /// Toggle the `active` state of the tooltip bound to `layer`.
    fn set_tooltip_active(&mut self, layer: LayerId, active: bool);

    fn fit_bounds(&mut self, bounds: Bounds, padding: [u32; 2]);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Marker { at: LatLng, icon: Icon, opacity: f64 },
    Path { points: Vec<LatLng>, style: PathStyle },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub html: String,
    pub options: PopupOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub html: String,
    pub options: TooltipOptions,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub shape: Shape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup: Option<Popup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub bounds: Bounds,
    pub padding: [u32; 2],
}

/// An in-memory backend which records everything rendered into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    pub map: Option<MapConfig>,
    pub tiles: Vec<TileConfig>,
    pub layers: Vec<Layer>,
    pub viewport: Option<Viewport>,
}

impl Scene {
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn markers(&self) -> impl Iterator<Item = &Layer> {
        self.layers
            .iter()
            .filter(|layer| matches!(layer.shape, Shape::Marker { .. }))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn push(&mut self, shape: Shape) -> LayerId {
        self.layers.push(Layer {
            shape,
            popup: None,
            tooltip: None,
        });
        self.layers.len() - 1
    }
}

impl MapBackend for Scene {
    fn create_map(&mut self, config: &MapConfig) {
        self.map = Some(config.clone());
    }

    fn add_tile_layer(&mut self, tiles: &TileConfig) {
        self.tiles.push(tiles.clone());
    }

    fn enable_scroll_zoom(&mut self) {
        if let Some(map) = &mut self.map {
            map.scroll_wheel_zoom = true;
        }
    }

    fn add_marker(&mut self, at: LatLng, icon: &Icon, opacity: f64) -> LayerId {
        self.push(Shape::Marker {
            at,
            icon: icon.clone(),
            opacity,
        })
    }

    fn add_path(&mut self, points: &[LatLng], style: &PathStyle) -> LayerId {
        self.push(Shape::Path {
            points: points.to_vec(),
            style: style.clone(),
        })
    }

    fn set_icon(&mut self, layer: LayerId, icon: &Icon) {
        if let Some(Layer {
            shape: Shape::Marker { icon: current, .. },
            ..
        }) = self.layers.get_mut(layer)
        {
            *current = icon.clone();
        }
    }

    fn set_style(&mut self, layer: LayerId, style: &PathStyle) {
        if let Some(Layer {
            shape: Shape::Path { style: current, .. },
            ..
        }) = self.layers.get_mut(layer)
        {
            *current = style.clone();
        }
    }

    fn bind_popup(&mut self, layer: LayerId, html: &str, options: &PopupOptions) {
        if let Some(layer) = self.layers.get_mut(layer) {
            layer.popup = Some(Popup {
                html: html.to_string(),
                options: options.clone(),
            });
        }
    }

    fn bind_tooltip(&mut self, layer: LayerId, html: &str, options: &TooltipOptions) {
        if let Some(layer) = self.layers.get_mut(layer) {
            layer.tooltip = Some(Tooltip {
                html: html.to_string(),
                options: options.clone(),
                active: false,
            });
        }
    }

    fn set_tooltip_active(&mut self, layer: LayerId, active: bool) {
        if let Some(tooltip) = self.layers.get_mut(layer).and_then(|l| l.tooltip.as_mut()) {
            tooltip.active = active;
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds, padding: [u32; 2]) {
        self.viewport = Some(Viewport { bounds, padding });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_extend() {
        let mut bounds = Bounds::around([50.0, 14.0]);
        bounds.extend([49.0, 16.5]);
        bounds.extend([49.5, 15.0]);

        assert_eq!(bounds.south_west, [49.0, 14.0]);
        assert_eq!(bounds.north_east, [50.0, 16.5]);
    }

    #[test]
    fn test_scene_serializes() {
        let mut scene = Scene::default();
        let style = PathStyle {
            color: Some("#ff0000".into()),
            ..Default::default()
        };
        let id = scene.add_path(&[[50.0, 14.0], [49.0, 16.5]], &style);

        let json: serde_json::Value = serde_json::from_str(&scene.to_json().unwrap()).unwrap();
        assert_eq!(json["layers"][id]["shape"]["kind"], "path");
        assert_eq!(json["layers"][id]["shape"]["style"], serde_json::json!({ "color": "#ff0000" }));
    }
}
