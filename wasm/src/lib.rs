use wasm_bindgen::prelude::*;

/// Routes every edge of a JSON diagram and returns the route dump as JSON.
///
/// `options_json` takes the same camelCase keys as the CLI config file.
#[wasm_bindgen]
pub fn route_diagram_json(diagram_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    sketch_router::route_diagram_json(diagram_json, options_json.as_deref())
        .map_err(|error| JsValue::from_str(&format!("{error:#}")))
}

#[cfg(test)]
mod tests {
    use sketch_router::route_diagram_json;

    #[test]
    fn routes_orthogonal_diagram_with_options() {
        let diagram = r#"{
            "direction": "TD",
            "nodes": {
                "A": { "bbox": { "x": 0, "y": 0, "width": 100, "height": 60 } },
                "B": { "bbox": { "x": 300, "y": 0, "width": 100, "height": 60 } },
                "C": { "bbox": { "x": 150, "y": 150, "width": 100, "height": 60 } }
            },
            "edges": [
                { "from": "A", "to": "B" },
                { "from": "A", "to": "C" },
                { "from": "B", "to": "C" }
            ]
        }"#;
        let dump = route_diagram_json(diagram, Some(r#"{ "edgeRouting": "orthogonal" }"#))
            .expect("diagram should route");
        let value: serde_json::Value = serde_json::from_str(&dump).unwrap();
        let edges = value["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 3);
        assert_eq!(value["degraded"], 0);
    }

    #[test]
    fn rejects_invalid_options() {
        let err = route_diagram_json("{}", Some(r#"{ "smoothness": 3 }"#)).unwrap_err();
        assert!(err.to_string().contains("smoothness"));
    }
}
