//! Listing map widget.
//!
//! [`ListingsMap`] loads a GeoJSON [`FeatureCollection`], renders its point
//! and line features into a [`MapBackend`] and keeps the hover state of the
//! rendered layers in sync with the listing next to the map. The widget is
//! driven through `&mut self` calls, the only suspension point is the fetch
//! in [`ListingsMap::load`].

mod backend;
mod geojson;
mod options;
mod popup;
mod source;

use std::collections::{HashMap, HashSet};

pub use backend::{
    Bounds, Icon, LatLng, Layer, LayerId, MapBackend, MapConfig, PathStyle, Popup, PopupOptions,
    Scene, Shape, TileConfig, Tooltip, TooltipOptions, Viewport,
};
pub use geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
pub use options::{FailurePolicy, MapOptions, MapOptionsPatch, PopupType, TileLayer};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{FileSource, GeoJsonSource, Response};

use crate::error::FetchError;
use popup::Popups;

/// Dragging and tap gestures are only enabled above this viewport width.
const GESTURE_MIN_WIDTH: u32 = 700;
const FIT_PADDING: [u32; 2] = [20, 20];

/// Where the map is in its load lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum MapStatus {
    /// Created, nothing requested yet.
    Idle,
    /// The document is being fetched.
    Pending,
    /// The document was rendered into `layers` layers.
    Ready { layers: usize },
    /// The document couldn't be loaded, the map stays empty.
    Failed { reason: FetchError },
    /// The load was given up on without a trace.
    Abandoned,
}

/// What hovering a layer changes, and how to undo it.
#[derive(Debug, Clone)]
enum Transition {
    Marker {
        default: Icon,
        highlight: Icon,
        tooltip: bool,
    },
    Path {
        default: PathStyle,
    },
}

fn highlight_style() -> PathStyle {
    PathStyle {
        color: Some("#A50700".into()),
        weight: Some(3.5),
        opacity: None,
        fill_color: Some("#D21209".into()),
        fill_opacity: Some(0.08),
    }
}

/// The style a line feature asks for, fields without a value are left unset.
fn line_style(properties: &Properties) -> PathStyle {
    PathStyle {
        color: properties.stroke.clone(),
        weight: properties.stroke_width,
        opacity: properties.stroke_opacity,
        fill_color: properties.fill.clone(),
        fill_opacity: properties.fill_opacity,
    }
}

/// GeoJSON positions are `[lng, lat]`, the backend takes `[lat, lng]`.
fn lat_lng(position: &[f64]) -> Option<LatLng> {
    match position {
        [lng, lat, ..] => Some([*lat, *lng]),
        _ => None,
    }
}

fn popup_options() -> PopupOptions {
    PopupOptions {
        min_width: 200,
        max_width: 600,
        class_name: "map-custom-popup".into(),
    }
}

fn tooltip_options() -> TooltipOptions {
    TooltipOptions {
        direction: "top".into(),
        permanent: true,
        opacity: 1.0,
        interactive: true,
        class_name: "map-custom-tooltip".into(),
    }
}

async fn fetch_collection<S: GeoJsonSource>(
    source: &S,
    url: &str,
) -> Result<FeatureCollection, FetchError> {
    let response = source.fetch(url).await?;

    if !(200..400).contains(&response.status) {
        return Err(FetchError::Status(response.status));
    }

    serde_json::from_str(&response.body).map_err(|e| FetchError::Parse(e.to_string()))
}

pub struct ListingsMap<B: MapBackend> {
    backend: B,
    options: MapOptions,
    popups: Popups,
    status: MapStatus,
    focused: bool,
    transitions: HashMap<LayerId, Transition>,
    /// Marker layers by feature id.
    markers: HashMap<String, LayerId>,
    /// Feature ids present in the listing.
    listing: HashSet<String>,
}

impl<B: MapBackend> ListingsMap<B> {
    /// Creates the map and its tile layer. The fields present in `patch`
    /// replace the defaults of [`MapOptions`].
    pub fn initialize(mut backend: B, patch: MapOptionsPatch, viewport_width: u32) -> Self {
        let options = MapOptions::default().merge(patch);
        let gestures = viewport_width > GESTURE_MIN_WIDTH;

        backend.create_map(&MapConfig {
            container: options.map_id.clone(),
            zoom: options.zoom_level,
            max_zoom: options.max_zoom,
            dragging: gestures,
            tap: gestures,
            scroll_wheel_zoom: false,
        });

        backend.add_tile_layer(&TileConfig {
            url: options.tile_layer.tiles.clone(),
            attribution: options.tile_layer.attribution.clone(),
            subdomains: options.tile_layer.subdomains.clone(),
            min_zoom: 1,
            max_zoom: 19,
        });

        Self {
            backend,
            options,
            popups: Popups::new(),
            status: MapStatus::Idle,
            focused: false,
            transitions: HashMap::new(),
            markers: HashMap::new(),
            listing: HashSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn status(&self) -> &MapStatus {
        &self.status
    }

    /// Scroll-wheel zoom is enabled by the first focus and stays enabled.
    pub fn focus(&mut self) {
        if !self.focused {
            self.focused = true;
            self.backend.enable_scroll_zoom();
        }
    }

    /// Fetches the document at `url` and renders it. Failures never escape,
    /// they end up in the returned status and leave the map without layers.
    pub async fn load<S: GeoJsonSource>(&mut self, source: &S, url: &str) -> MapStatus {
        self.status = MapStatus::Pending;

        self.status = match self.fetch(source, url).await {
            Ok(collection) => MapStatus::Ready {
                layers: self.render(&collection),
            },
            Err(reason) => match self.options.fetch_failure {
                FailurePolicy::Surface => {
                    tracing::warn!(url, error = %reason, "Couldn't load map data");
                    MapStatus::Failed { reason }
                }
                FailurePolicy::AbandonSilently => {
                    tracing::debug!(url, error = %reason, "Abandoned map data");
                    MapStatus::Abandoned
                }
            },
        };

        self.status.clone()
    }

    async fn fetch<S: GeoJsonSource>(
        &self,
        source: &S,
        url: &str,
    ) -> Result<FeatureCollection, FetchError> {
        let attempts = match self.options.fetch_failure {
            FailurePolicy::Surface => 1 + self.options.retries,
            FailurePolicy::AbandonSilently => 1,
        };

        let mut attempt = 1;
        loop {
            match fetch_collection(source, url).await {
                Err(e) if attempt < attempts && !matches!(e, FetchError::Parse(_)) => {
                    tracing::debug!(url, attempt, error = %e, "Retrying map data");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Renders every point and line feature of `collection` and fits the
    /// viewport around them. Returns the number of layers added.
    pub fn render(&mut self, collection: &FeatureCollection) -> usize {
        let mut bounds: Option<Bounds> = None;
        let mut count = 0;

        for feature in &collection.features {
            let points: Vec<LatLng> = match &feature.geometry {
                Some(Geometry::Point { coordinates }) => lat_lng(coordinates).into_iter().collect(),
                Some(Geometry::LineString { coordinates }) => {
                    coordinates.iter().filter_map(|p| lat_lng(p)).collect()
                }
                _ => {
                    tracing::debug!(id = ?feature.properties.id, "Skipping unsupported geometry");
                    continue;
                }
            };

            if points.is_empty() {
                tracing::debug!(id = ?feature.properties.id, "Skipping feature without positions");
                continue;
            }

            match feature.geometry {
                Some(Geometry::Point { .. }) => self.add_point(points[0], &feature.properties),
                _ => self.add_line(&points, &feature.properties),
            }

            for &point in &points {
                match &mut bounds {
                    Some(bounds) => bounds.extend(point),
                    None => bounds = Some(Bounds::around(point)),
                }
            }

            count += 1;
        }

        if let Some(bounds) = bounds {
            self.backend.fit_bounds(bounds, FIT_PADDING);
        }

        count
    }

    fn add_point(&mut self, at: LatLng, properties: &Properties) {
        let interactive = self.options.interactivity;

        let default = Icon {
            url: properties.marker.clone().unwrap_or_else(|| self.options.marker_path.clone()),
            size: [25.0, 37.5],
            anchor: [13.0, 38.0],
            popup_anchor: [0.0, -35.0],
            tooltip_anchor: [0.0, 19.0],
            class_name: interactive.then(|| "marker-hover-effect".to_string()),
        };
        let highlight = Icon {
            url: properties
                .marker
                .clone()
                .unwrap_or_else(|| self.options.marker_path_highlight.clone()),
            size: [28.0, 42.0],
            anchor: [13.0, 43.0],
            ..default.clone()
        };

        let opacity = if self.options.use_text_icon { 0.0 } else { 1.0 };
        let layer = self.backend.add_marker(at, &default, opacity);

        let descriptive = interactive && properties.is_descriptive();

        if descriptive && properties.is_active {
            self.bind_popup(layer, self.options.point_popup_type, properties);
        }

        let tooltip = descriptive && self.options.use_text_icon;
        if tooltip {
            match self.popups.tooltip(properties) {
                Ok(html) => self.backend.bind_tooltip(layer, &html, &tooltip_options()),
                Err(e) => tracing::error!(id = ?properties.id, "Couldn't render tooltip:\n{e:#}"),
            }
        }

        if let Some(id) = properties.id.as_ref().filter(|id| !id.is_empty()) {
            self.markers.insert(id.clone(), layer);
        }

        self.transitions.insert(
            layer,
            Transition::Marker {
                default,
                highlight,
                tooltip,
            },
        );
    }

    fn add_line(&mut self, points: &[LatLng], properties: &Properties) {
        let style = line_style(properties);
        let layer = self.backend.add_path(points, &style);

        if self.options.interactivity && properties.is_descriptive() {
            self.bind_popup(layer, self.options.line_popup_type, properties);
        }

        self.transitions
            .insert(layer, Transition::Path { default: style });
    }

    fn bind_popup(&mut self, layer: LayerId, layout: PopupType, properties: &Properties) {
        match self
            .popups
            .popup(layout, properties, &self.options.img_base_path)
        {
            Ok(html) => self.backend.bind_popup(layer, &html, &popup_options()),
            Err(e) => tracing::error!(id = ?properties.id, "Couldn't render popup:\n{e:#}"),
        }
    }

    /// Pointer entered `layer`.
    pub fn hover(&mut self, layer: LayerId) {
        if self.options.interactivity {
            self.highlight(layer);
        }
    }

    /// Pointer left `layer`.
    pub fn unhover(&mut self, layer: LayerId) {
        if self.options.interactivity {
            self.reset(layer);
        }
    }

    fn highlight(&mut self, layer: LayerId) {
        match self.transitions.get(&layer) {
            Some(Transition::Marker {
                highlight, tooltip, ..
            }) => {
                self.backend.set_icon(layer, highlight);
                if *tooltip {
                    self.backend.set_tooltip_active(layer, true);
                }
            }
            Some(Transition::Path { .. }) => self.backend.set_style(layer, &highlight_style()),
            None => {}
        }
    }

    fn reset(&mut self, layer: LayerId) {
        match self.transitions.get(&layer) {
            Some(Transition::Marker {
                default, tooltip, ..
            }) => {
                self.backend.set_icon(layer, default);
                if *tooltip {
                    self.backend.set_tooltip_active(layer, false);
                }
            }
            Some(Transition::Path { default }) => self.backend.set_style(layer, default),
            None => {}
        }
    }

    /// Registers the marker ids shown in the listing, empty ids are ignored.
    pub fn bind_listing<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listing.extend(
            ids.into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.is_empty()),
        );
    }

    fn listed_marker(&self, id: &str) -> Option<LayerId> {
        if self.listing.contains(id) {
            self.markers.get(id).copied()
        } else {
            None
        }
    }

    /// Pointer entered the listing entry of `id`.
    pub fn listing_enter(&mut self, id: &str) {
        if let Some(layer) = self.listed_marker(id) {
            self.highlight(layer);
        }
    }

    /// Pointer left the listing entry of `id`.
    pub fn listing_leave(&mut self, id: &str) {
        if let Some(layer) = self.listed_marker(id) {
            self.reset(layer);
        }
    }

    /// Marker layer rendered for the feature `id`.
    pub fn marker(&self, id: &str) -> Option<LayerId> {
        self.markers.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Stub {
        response: Result<Response, FetchError>,
        calls: AtomicUsize,
    }

    impl Stub {
        fn ok(body: &str) -> Self {
            Self::status(200, body)
        }

        fn status(status: u16, body: &str) -> Self {
            Self {
                response: Ok(Response {
                    status,
                    body: body.into(),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GeoJsonSource for Stub {
        async fn fetch(&self, _url: &str) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn load(patch: MapOptionsPatch, source: &Stub) -> ListingsMap<Scene> {
        let mut map = ListingsMap::initialize(Scene::default(), patch, 1280);
        block_on(map.load(source, "js/listings.geojson"));
        map
    }

    const POINTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [14.42, 50.08] },
                "properties": { "id": 1, "name": "A", "link": "/a", "address": "X", "isActive": true, "price": 120 }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [16.6, 49.2] },
                "properties": { "id": "2", "name": "B", "isActive": false }
            }
        ]
    }"#;

    const LINE: &str = r##"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[14.4, 50.0], [16.6, 49.2]] },
                "properties": { "stroke": "#ff0000", "stroke-width": 2, "fill": null }
            }
        ]
    }"##;

    #[test]
    fn test_venue_popup() {
        let source = Stub::ok(POINTS);
        let map = load(MapOptionsPatch::default(), &source);

        assert_eq!(map.status(), &MapStatus::Ready { layers: 2 });

        let layer = map.backend().layer(map.marker("1").unwrap()).unwrap();
        let popup = layer.popup.as_ref().unwrap();
        assert_eq!(
            popup.html,
            concat!(
                "<div class=\"popup-venue\"><div class=\"image\"></div><div class=\"text\">",
                "<h6><a class=\"text-reset text-decoration-none text-hover-primary stretched-link\" href=\"/a\" target=\"_blank\">A</a></h6>",
                "<p class=\"text-muted mb-1\"><i class=\"fas fa-map-marker-alt fa-fw text-dark mr-2\"></i>X</p>",
                "</div></div>",
            )
        );
        assert_eq!(popup.options, popup_options());

        // inactive venues get no popup
        let inactive = map.backend().layer(map.marker("2").unwrap()).unwrap();
        assert!(inactive.popup.is_none());
    }

    #[test]
    fn test_marker_icons_and_viewport() {
        let source = Stub::ok(POINTS);
        let mut map = load(MapOptionsPatch::default(), &source);
        let id = map.marker("1").unwrap();

        let Shape::Marker { at, icon, opacity } = &map.backend().layer(id).unwrap().shape else {
            panic!("expected a marker");
        };
        assert_eq!(*at, [50.08, 14.42]);
        assert_eq!(*opacity, 1.0);
        assert_eq!(icon.url, "img/marker-plane.svg");
        assert_eq!(icon.size, [25.0, 37.5]);
        assert_eq!(icon.class_name.as_deref(), Some("marker-hover-effect"));

        map.hover(id);
        let Shape::Marker { icon, .. } = &map.backend().layer(id).unwrap().shape else {
            panic!("expected a marker");
        };
        assert_eq!(icon.url, "img/marker-plane-hover.svg");
        assert_eq!(icon.size, [28.0, 42.0]);
        assert_eq!(icon.anchor, [13.0, 43.0]);

        let viewport = map.backend().viewport.as_ref().unwrap();
        assert_eq!(viewport.bounds.south_west, [49.2, 14.42]);
        assert_eq!(viewport.bounds.north_east, [50.08, 16.6]);
        assert_eq!(viewport.padding, [20, 20]);
    }

    #[test]
    fn test_line_style_highlight_and_revert() {
        let source = Stub::ok(LINE);
        let mut map = load(MapOptionsPatch::default(), &source);

        let style = |map: &ListingsMap<Scene>| match &map.backend().layer(0).unwrap().shape {
            Shape::Path { style, .. } => style.clone(),
            Shape::Marker { .. } => panic!("expected a path"),
        };

        let initial = style(&map);
        assert_eq!(initial.color.as_deref(), Some("#ff0000"));
        assert_eq!(initial.weight, Some(2.0));
        assert_eq!(initial.fill_color, None);
        assert_eq!(initial.fill_opacity, None);
        assert_eq!(initial.opacity, None);

        map.hover(0);
        assert_eq!(style(&map), highlight_style());

        map.unhover(0);
        assert_eq!(style(&map), initial);

        // no descriptive property, no popup
        assert!(map.backend().layer(0).unwrap().popup.is_none());
    }

    #[test]
    fn test_server_error_leaves_empty_map() {
        let source = Stub::status(500, "");
        let map = load(MapOptionsPatch::default(), &source);

        assert_eq!(map.backend().markers().count(), 0);
        assert!(map.backend().viewport.is_none());
        assert_eq!(
            map.status(),
            &MapStatus::Failed {
                reason: FetchError::Status(500)
            }
        );
        // one retry by default
        assert_eq!(source.calls(), 2);

        let source = Stub::status(500, "");
        let patch = MapOptionsPatch {
            fetch_failure: Some(FailurePolicy::AbandonSilently),
            ..Default::default()
        };
        let map = load(patch, &source);

        assert_eq!(map.backend().markers().count(), 0);
        assert_eq!(map.status(), &MapStatus::Abandoned);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_malformed_document_is_not_retried() {
        let source = Stub::ok("{ not json");
        let patch = MapOptionsPatch {
            retries: Some(3),
            ..Default::default()
        };
        let map = load(patch, &source);

        assert!(matches!(
            map.status(),
            MapStatus::Failed {
                reason: FetchError::Parse(_)
            }
        ));
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_redirect_statuses_are_accepted() {
        let source = Stub::status(304, POINTS);
        let map = load(MapOptionsPatch::default(), &source);
        assert_eq!(map.status(), &MapStatus::Ready { layers: 2 });
    }

    #[test]
    fn test_listing_sync() {
        let source = Stub::ok(POINTS);
        let mut map = load(MapOptionsPatch::default(), &source);
        map.bind_listing(["1", "", "9"]);

        let icon = |map: &ListingsMap<Scene>, id: &str| match &map
            .backend()
            .layer(map.marker(id).unwrap())
            .unwrap()
            .shape
        {
            Shape::Marker { icon, .. } => icon.url.clone(),
            Shape::Path { .. } => panic!("expected a marker"),
        };

        map.listing_enter("1");
        assert_eq!(icon(&map, "1"), "img/marker-plane-hover.svg");

        map.listing_leave("1");
        assert_eq!(icon(&map, "1"), "img/marker-plane.svg");

        // rendered but not listed, or listed but not rendered
        let before = map.backend().clone();
        map.listing_enter("2");
        map.listing_enter("9");
        map.listing_enter("");
        assert_eq!(map.backend(), &before);
    }

    #[test]
    fn test_text_icon_tooltip() {
        let source = Stub::ok(POINTS);
        let patch = MapOptionsPatch {
            use_text_icon: Some(true),
            ..Default::default()
        };
        let mut map = load(patch, &source);
        let id = map.marker("1").unwrap();

        let layer = map.backend().layer(id).unwrap();
        assert!(matches!(layer.shape, Shape::Marker { opacity, .. } if opacity == 0.0));
        let tooltip = layer.tooltip.as_ref().unwrap();
        assert_eq!(tooltip.html, "<div id=\"customTooltip-1\">$120</div>");
        assert_eq!(tooltip.options, tooltip_options());
        assert!(!tooltip.active);

        map.hover(id);
        assert!(map.backend().layer(id).unwrap().tooltip.as_ref().unwrap().active);

        map.unhover(id);
        assert!(!map.backend().layer(id).unwrap().tooltip.as_ref().unwrap().active);
    }

    #[test]
    fn test_without_interactivity() {
        let source = Stub::ok(POINTS);
        let patch = MapOptionsPatch {
            interactivity: Some(false),
            ..Default::default()
        };
        let mut map = load(patch, &source);
        let id = map.marker("1").unwrap();

        let before = map.backend().clone();
        map.hover(id);
        assert_eq!(map.backend(), &before);

        let layer = map.backend().layer(id).unwrap();
        assert!(layer.popup.is_none());
        assert!(matches!(&layer.shape, Shape::Marker { icon, .. } if icon.class_name.is_none()));
    }

    #[test]
    fn test_gestures_and_focus() {
        let mut map = ListingsMap::initialize(Scene::default(), MapOptionsPatch::default(), 640);

        let config = map.backend().map.clone().unwrap();
        assert!(!config.dragging);
        assert!(!config.tap);
        assert!(!config.scroll_wheel_zoom);
        assert_eq!(config.container, "map");
        assert_eq!(config.zoom, 14);

        let tiles = &map.backend().tiles[0];
        assert_eq!(tiles.subdomains, "abcd");
        assert_eq!((tiles.min_zoom, tiles.max_zoom), (1, 19));
        assert_eq!(map.status(), &MapStatus::Idle);

        map.focus();
        map.focus();
        assert!(map.backend().map.as_ref().unwrap().scroll_wheel_zoom);

        let wide = ListingsMap::initialize(Scene::default(), MapOptionsPatch::default(), 1280);
        let config = wide.backend().map.as_ref().unwrap();
        assert!(config.dragging);
        assert!(config.tap);
    }
}
