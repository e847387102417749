//! Popup and tooltip markup.
//!
//! Every layout is a template assembled from named fragments. A fragment
//! whose property is missing renders as an empty string, except for the
//! image which always leaves an empty placeholder behind.

use minijinja::{AutoEscape, Environment, context};

use super::geojson::Properties;
use super::options::PopupType;

const TEMPLATES: &[(&str, &str)] = &[
    (
        "title",
        "{% if name %}<h6><a class=\"text-reset text-decoration-none text-hover-primary stretched-link\" href=\"{{ link }}\" target=\"_blank\">{{ name }}</a></h6>{% endif %}",
    ),
    (
        "about",
        "{% if about %}<p class=\"\">{{ about }}</p>{% endif %}",
    ),
    (
        "image",
        "{% if image %}<div class=\"image{% if layout == 'venue' %} d-none d-md-block{% endif %}\" style=\"background-image: url('{{ img_base_path }}{{ image }}')\"></div>{% else %}<div class=\"image\"></div>{% endif %}",
    ),
    (
        "address",
        "{% if address %}<p class=\"text-muted mb-1\"><i class=\"fas fa-map-marker-alt fa-fw text-dark mr-2\"></i>{{ address }}</p>{% endif %}",
    ),
    (
        "email",
        "{% if email %}<p class=\"text-muted mb-1\"><i class=\"fas fa-envelope-open fa-fw text-dark mr-2\"></i><a href=\"mailto:{{ email }}\" class=\"text-muted\">{{ email }}</a></p>{% endif %}",
    ),
    (
        "phone",
        "{% if phone %}<p class=\"text-muted mb-1\"><i class=\"fa fa-phone fa-fw text-dark mr-2\"></i>{{ phone }}</p>{% endif %}",
    ),
    (
        "stars",
        "{% if stars %}<div class=\"text-xs\">{% for step in range(1, 6) %}{% if step <= stars %}<i class='fa fa-star text-warning'></i>{% else %}<i class='fa fa-star text-gray-300'></i>{% endif %}{% endfor %}</div>{% endif %}",
    ),
    (
        "price",
        "{% if price %}<p class=\"text-sm mb-0\">from <strong class=\"fw-bold\">{{ price }}</strong></p>{% endif %}",
    ),
    (
        "venue",
        "<div class=\"popup-venue\">{% include 'image' %}<div class=\"text\">{% include 'title' %}{% include 'about' %}{% include 'address' %}{% include 'email' %}{% include 'phone' %}{% include 'stars' %}</div></div>",
    ),
    (
        "rental",
        "<div class=\"popup-rental\">{% include 'image' %}<div class=\"text\">{% include 'title' %}{% include 'address' %}{% include 'stars' %}</div></div>",
    ),
    (
        "flight",
        "<div class=\"popup-rental\">{% include 'image' %}<div class=\"text\">{% include 'title' %}{% include 'price' %}</div></div>",
    ),
    (
        "tooltip",
        "<div id=\"customTooltip-{{ id }}\">${{ price }}</div>",
    ),
];

/// Renders popup and tooltip markup from feature properties.
pub(crate) struct Popups {
    jinja: Environment<'static>,
}

impl Popups {
    pub(crate) fn new() -> Self {
        let mut jinja = Environment::new();
        jinja.set_loader(|name| {
            Ok(TEMPLATES
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, source)| source.to_string()))
        });
        jinja.set_auto_escape_callback(|_| AutoEscape::None);
        Self { jinja }
    }

    pub(crate) fn popup(
        &self,
        layout: PopupType,
        properties: &Properties,
        img_base_path: &str,
    ) -> Result<String, minijinja::Error> {
        self.jinja.get_template(layout.as_str())?.render(context! {
            layout => layout.as_str(),
            img_base_path => img_base_path,
            name => properties.name,
            link => properties.link,
            about => properties.about,
            image => properties.image,
            address => properties.address,
            email => properties.email,
            phone => properties.phone,
            stars => properties.stars,
            price => properties.price_text(),
        })
    }

    pub(crate) fn tooltip(&self, properties: &Properties) -> Result<String, minijinja::Error> {
        self.jinja.get_template("tooltip")?.render(context! {
            id => properties.id,
            price => properties.price_text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(json: &str) -> Properties {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_venue_with_missing_fields() {
        let popups = Popups::new();
        let props = properties(r#"{ "name": "A", "link": "/a", "address": "X", "isActive": true }"#);

        let html = popups.popup(PopupType::Venue, &props, "img/photo/").unwrap();

        assert_eq!(
            html,
            concat!(
                "<div class=\"popup-venue\"><div class=\"image\"></div><div class=\"text\">",
                "<h6><a class=\"text-reset text-decoration-none text-hover-primary stretched-link\" href=\"/a\" target=\"_blank\">A</a></h6>",
                "<p class=\"text-muted mb-1\"><i class=\"fas fa-map-marker-alt fa-fw text-dark mr-2\"></i>X</p>",
                "</div></div>",
            )
        );
    }

    #[test]
    fn test_venue_image_is_hidden_on_small_screens() {
        let popups = Popups::new();
        let props = properties(r#"{ "image": "cafe.jpg" }"#);

        let venue = popups.popup(PopupType::Venue, &props, "img/photo/").unwrap();
        assert!(venue.contains(
            "<div class=\"image d-none d-md-block\" style=\"background-image: url('img/photo/cafe.jpg')\"></div>"
        ));

        let rental = popups.popup(PopupType::Rental, &props, "img/photo/").unwrap();
        assert!(rental.contains("<div class=\"image\" style=\"background-image: url('img/photo/cafe.jpg')\"></div>"));
    }

    #[test]
    fn test_stars_and_price() {
        let popups = Popups::new();
        let props = properties(r#"{ "name": "Loft", "stars": 3, "price": 120 }"#);

        let rental = popups.popup(PopupType::Rental, &props, "").unwrap();
        assert_eq!(rental.matches("text-warning").count(), 3);
        assert_eq!(rental.matches("text-gray-300").count(), 2);

        let flight = popups.popup(PopupType::Flight, &props, "").unwrap();
        assert!(flight.contains("from <strong class=\"fw-bold\">120</strong>"));
        assert!(!flight.contains("fa-star"));
    }

    #[test]
    fn test_tooltip() {
        let popups = Popups::new();
        let props = properties(r#"{ "id": 4, "price": "89" }"#);

        assert_eq!(
            popups.tooltip(&props).unwrap(),
            "<div id=\"customTooltip-4\">$89</div>"
        );
    }
}
