//! Leaflet map fragment
//!
//! The fragment is embedded by the dashboard page as is, so it carries its own
//! stylesheet and script tags. Marker data travels as a JSON array; popup text
//! is HTML-escaped before serialization.

use serde::Serialize;

use crate::aggregation::{MapMarker, MarkerLayer};

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const TILE_URL: &str = "https://{s}.basemap.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png";

#[derive(Serialize)]
struct JsMarker<'a> {
    layer: &'static str,
    lat: f64,
    lon: f64,
    radius: f64,
    color: &'a str,
    popup: String,
}

fn layer_name(layer: MarkerLayer) -> &'static str {
    match layer {
        MarkerLayer::SshAttack => "SSH attacks",
        MarkerLayer::SshSuccess => "SSH logins",
        MarkerLayer::AppAccess => "OpenProject access",
        MarkerLayer::ActiveSsh => "Active SSH",
        MarkerLayer::ActiveWeb => "Active web",
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Render markers into a self-contained `<div>` + `<script>` fragment
pub fn render_map_html(markers: &[MapMarker]) -> Result<String, serde_json::Error> {
    let js_markers: Vec<JsMarker> = markers
        .iter()
        .map(|m| JsMarker {
            layer: layer_name(m.layer),
            lat: m.lat,
            lon: m.lon,
            radius: m.radius,
            color: &m.color,
            popup: escape_html(&m.label),
        })
        .collect();
    // "</" inside a script block would close it early
    let data = serde_json::to_string(&js_markers)?.replace("</", "<\\/");

    Ok(format!(
        r#"<link rel="stylesheet" href="{css}"/>
<div id="watchpost-map" style="width:100%;height:600px;"></div>
<script src="{js}"></script>
<script>
(function() {{
  var map = L.map('watchpost-map').setView([20, 0], 2);
  L.tileLayer('{tiles}', {{ attribution: '&copy; OpenStreetMap &copy; CARTO', maxZoom: 18 }}).addTo(map);
  var layers = {{}};
  var markers = {data};
  markers.forEach(function(m) {{
    if (!layers[m.layer]) {{ layers[m.layer] = L.layerGroup().addTo(map); }}
    L.circleMarker([m.lat, m.lon], {{
      radius: m.radius, color: m.color, fillColor: m.color, fillOpacity: 0.7, weight: 1
    }}).bindPopup(m.popup).addTo(layers[m.layer]);
  }});
  L.control.layers(null, layers).addTo(map);
}})();
</script>"#,
        css = LEAFLET_CSS,
        js = LEAFLET_JS,
        tiles = TILE_URL,
        data = data,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(label: &str) -> MapMarker {
        MapMarker {
            layer: MarkerLayer::SshAttack,
            lat: 52.52,
            lon: 13.405,
            ip: "1.2.3.4".to_string(),
            count: 3,
            radius: 6.0,
            color: "red".to_string(),
            is_trusted: false,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_empty_map_still_renders() {
        let html = render_map_html(&[]).unwrap();
        assert!(html.contains("watchpost-map"));
        assert!(html.contains("var markers = [];"));
    }

    #[test]
    fn test_marker_data_is_embedded() {
        let html = render_map_html(&[marker("SSH attacks from 1.2.3.4 (total: 3)")]).unwrap();
        assert!(html.contains("\"layer\":\"SSH attacks\""));
        assert!(html.contains("\"lat\":52.52"));
        assert!(html.contains("\"color\":\"red\""));
    }

    #[test]
    fn test_labels_cannot_break_out_of_script() {
        let html = render_map_html(&[marker("</script><script>alert(1)</script>")]).unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;\\/script&gt;") || html.contains("&lt;/script&gt;"));
    }
}
