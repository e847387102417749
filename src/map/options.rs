use serde::{Deserialize, Serialize};

/// Which popup layout a feature gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupType {
    #[default]
    Venue,
    Rental,
    Flight,
}

impl PopupType {
    pub fn as_str(self) -> &'static str {
        match self {
            PopupType::Venue => "venue",
            PopupType::Rental => "rental",
            PopupType::Flight => "flight",
        }
    }
}

/// What happens when the GeoJSON document cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Retry, then log the failure and record it in the map status.
    #[default]
    Surface,
    /// Give up on the first failure and leave an empty map behind.
    AbandonSilently,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    /// URL template with `{s}`, `{z}`, `{x}`, `{y}` and `{r}` placeholders.
    pub tiles: String,
    pub attribution: String,
    pub subdomains: String,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            tiles: "https://{s}.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}{r}.png".into(),
            attribution: r#"&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors &copy; <a href="https://carto.com/attributions">CARTO</a>"#.into(),
            subdomains: "abcd".into(),
        }
    }
}

/// Options of a [`ListingsMap`](super::ListingsMap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub marker_path: String,
    pub marker_path_highlight: String,
    /// Prefix of the `image` property in popups.
    pub img_base_path: String,
    pub point_popup_type: PopupType,
    pub line_popup_type: PopupType,
    /// Hide the marker icons and show a permanent price tooltip instead.
    pub use_text_icon: bool,
    /// Enables hover effects, popups and tooltips.
    pub interactivity: bool,
    pub tile_layer: TileLayer,
    /// Identifier of the container element.
    pub map_id: String,
    pub zoom_level: u8,
    pub max_zoom: u8,
    pub fetch_failure: FailurePolicy,
    /// Additional fetch attempts under [`FailurePolicy::Surface`].
    pub retries: u32,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            marker_path: "img/marker-plane.svg".into(),
            marker_path_highlight: "img/marker-plane-hover.svg".into(),
            img_base_path: "img/photo/".into(),
            point_popup_type: PopupType::Venue,
            line_popup_type: PopupType::Flight,
            use_text_icon: false,
            interactivity: true,
            tile_layer: TileLayer::default(),
            map_id: "map".into(),
            zoom_level: 14,
            max_zoom: 19,
            fetch_failure: FailurePolicy::Surface,
            retries: 1,
        }
    }
}

/// Caller supplied options, every field present replaces the default.
///
/// The merge is shallow: a `tileLayer` replaces the whole default tile
/// layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapOptionsPatch {
    pub marker_path: Option<String>,
    pub marker_path_highlight: Option<String>,
    pub img_base_path: Option<String>,
    pub point_popup_type: Option<PopupType>,
    pub line_popup_type: Option<PopupType>,
    pub use_text_icon: Option<bool>,
    pub interactivity: Option<bool>,
    pub tile_layer: Option<TileLayer>,
    pub map_id: Option<String>,
    pub zoom_level: Option<u8>,
    pub max_zoom: Option<u8>,
    pub fetch_failure: Option<FailurePolicy>,
    pub retries: Option<u32>,
}

impl MapOptions {
    pub fn merge(self, patch: MapOptionsPatch) -> Self {
        macro_rules! merge {
            ($into:ident, $from:ident; $($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = $from.$field {
                        $into.$field = value;
                    }
                )*
            };
        }

        let mut options = self;
        merge!(
            options, patch;
            marker_path,
            marker_path_highlight,
            img_base_path,
            point_popup_type,
            line_popup_type,
            use_text_icon,
            interactivity,
            tile_layer,
            map_id,
            zoom_level,
            max_zoom,
            fetch_failure,
            retries,
        );

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_overrides_only_present_fields() {
        let patch: MapOptionsPatch = serde_json::from_str(
            r#"{ "pointPopupType": "rental", "useTextIcon": true, "mapId": "categorySideMap" }"#,
        )
        .unwrap();

        let options = MapOptions::default().merge(patch);

        assert_eq!(options.point_popup_type, PopupType::Rental);
        assert_eq!(options.line_popup_type, PopupType::Flight);
        assert!(options.use_text_icon);
        assert!(options.interactivity);
        assert_eq!(options.map_id, "categorySideMap");
        assert_eq!(options.zoom_level, 14);
        assert_eq!(options.tile_layer.subdomains, "abcd");
        assert_eq!(options.fetch_failure, FailurePolicy::Surface);
    }

    #[test]
    fn test_tile_layer_is_replaced_whole() {
        let patch: MapOptionsPatch = serde_json::from_str(
            r#"{ "tileLayer": { "tiles": "https://tiles.example.com/{z}/{x}/{y}.png", "attribution": "", "subdomains": "" } }"#,
        )
        .unwrap();

        let options = MapOptions::default().merge(patch);
        assert_eq!(options.tile_layer.subdomains, "");
    }
}
