//! Normalization of job completion payloads.
//!
//! Producers disagree on where they put things: some answer with top-level
//! fields, some nest them under `output`, and text models tend to wrap their
//! JSON in a markdown code fence. Each lookup below is an independent attempt
//! over a fixed list of locations; the first usable value wins and anything of
//! the wrong shape is treated as absent.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::types::{
    Bounds, CanvasElement, GenerationResult, Point, RectElement, TextElement, TextStyle,
};

const IMAGE_POINTERS: &[&str] = &[
    "/imageUrl",
    "/image_url",
    "/output/imageUrl",
    "/output/image_url",
    "/output/image",
    "/output/images/0",
    "/output/result",
    "/output",
];

const ELEMENT_POINTERS: &[&str] = &["/elements", "/output/elements", "/output/result/elements"];

const REASONING_POINTERS: &[&str] = &["/reasoning", "/output/reasoning", "/output/result/reasoning"];

const TEXT_POINTERS: &[&str] = &[
    "/rawText",
    "/raw_text",
    "/text",
    "/output/rawText",
    "/output/raw_text",
    "/output/text",
    "/output/result",
    "/output",
];

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_+-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is valid")
});

/// Turn a completion payload of unknown shape into a [`GenerationResult`].
///
/// Never fails: a payload with nothing usable yields an empty result.
pub fn normalize(payload: &Value) -> GenerationResult {
    let image_url = first_str(payload, IMAGE_POINTERS, looks_like_image);
    let mut elements = first_elements(payload);
    let mut reasoning = first_str(payload, REASONING_POINTERS, |s| !s.trim().is_empty());
    let raw_text = first_str(payload, TEXT_POINTERS, |s| {
        !s.trim().is_empty() && !looks_like_image(s)
    });

    if elements.is_empty() {
        if let Some(embedded) = raw_text.as_deref().and_then(extract_fenced_json) {
            let fenced = embedded
                .get("elements")
                .and_then(Value::as_array)
                .map(|items| parse_elements(items))
                .unwrap_or_default();
            debug!(count = fenced.len(), "Recovered elements from fenced JSON");
            elements = fenced;
            if let Some(r) = embedded.get("reasoning").and_then(Value::as_str) {
                reasoning = Some(r.to_string());
            }
        }
    }

    GenerationResult {
        image_url,
        elements,
        reasoning,
        raw_text,
    }
}

/// Parse the first fenced code block in `text` as JSON.
pub fn extract_fenced_json(text: &str) -> Option<Value> {
    let body = FENCE.captures(text)?.get(1)?.as_str().trim();
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(%e, "Fenced block is not valid JSON");
            None
        }
    }
}

fn looks_like_image(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("data:image/")
}

fn first_str(payload: &Value, pointers: &[&str], accept: impl Fn(&str) -> bool) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| payload.pointer(p).and_then(Value::as_str))
        .find(|s| accept(s))
        .map(|s| s.trim().to_string())
}

fn first_elements(payload: &Value) -> Vec<CanvasElement> {
    ELEMENT_POINTERS
        .iter()
        .filter_map(|p| payload.pointer(p).and_then(Value::as_array))
        .map(|items| parse_elements(items))
        .find(|parsed| !parsed.is_empty())
        .unwrap_or_default()
}

/// Elements without a `type` are text. Items of unexpected shape are skipped.
fn parse_elements(items: &[Value]) -> Vec<CanvasElement> {
    items.iter().filter_map(parse_element).collect()
}

/// Fields are read one at a time so a malformed style or geometry value only
/// loses that field. Text needs its content; a rect needs both dimensions.
fn parse_element(item: &Value) -> Option<CanvasElement> {
    let kind = item.get("type").and_then(Value::as_str).unwrap_or("text");
    let element = match kind {
        "text" => {
            let content = item
                .get("content")
                .or_else(|| item.get("text"))
                .and_then(Value::as_str)?;
            CanvasElement::Text(TextElement {
                content: content.to_string(),
                position: parse_point(item.get("position")),
                style: parse_style(item.get("style")),
                bounds: parse_bounds(item.get("bounds")),
            })
        }
        "rect" => CanvasElement::Rect(RectElement {
            position: parse_point(item.get("position")),
            bounds: parse_bounds(item.get("bounds"))?,
            color: string_field(item, &["color"]),
        }),
        other => {
            debug!(kind = other, "Skipping element of unknown type");
            return None;
        }
    };
    Some(element)
}

fn parse_point(value: Option<&Value>) -> Point {
    let coord = |key: &str| value.and_then(|v| v.get(key)).and_then(Value::as_f64);
    Point {
        x: coord("x").unwrap_or_default(),
        y: coord("y").unwrap_or_default(),
    }
}

fn parse_style(value: Option<&Value>) -> TextStyle {
    let Some(style) = value.filter(|v| v.is_object()) else {
        return TextStyle::default();
    };
    TextStyle {
        font_size: ["fontSize", "font_size"]
            .iter()
            .find_map(|key| style.get(*key).and_then(Value::as_f64)),
        color: string_field(style, &["color"]),
        font_family: string_field(style, &["fontFamily", "font_family"]),
    }
}

fn parse_bounds(value: Option<&Value>) -> Option<Bounds> {
    let value = value?;
    Some(Bounds {
        width: value.get("width")?.as_f64()?,
        height: value.get("height")?.as_f64()?,
    })
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sale() -> Value {
        json!({
            "content": "SALE",
            "position": {"x": 40, "y": 60},
            "style": {"fontSize": 48, "color": "#ff0000"}
        })
    }

    #[test]
    fn test_image_from_output_result() {
        let result = normalize(&json!({
            "status": "COMPLETED",
            "output": {"result": "https://cdn.example/poster.png"}
        }));
        assert_eq!(result.image_url.as_deref(), Some("https://cdn.example/poster.png"));
        assert!(result.elements.is_empty());
        assert!(result.raw_text.is_none());
    }

    #[test]
    fn test_top_level_fields_take_priority() {
        let result = normalize(&json!({
            "imageUrl": "https://a.example/top.png",
            "output": {"image_url": "https://a.example/nested.png"}
        }));
        assert_eq!(result.image_url.as_deref(), Some("https://a.example/top.png"));
    }

    #[test]
    fn test_direct_elements() {
        let result = normalize(&json!({
            "output": {"elements": [sale()], "reasoning": "top band is empty"}
        }));
        assert_eq!(
            result.elements,
            vec![CanvasElement::Text(TextElement {
                content: "SALE".into(),
                position: Point { x: 40.0, y: 60.0 },
                style: TextStyle {
                    font_size: Some(48.0),
                    color: Some("#ff0000".into()),
                    font_family: None,
                },
                bounds: None,
            })]
        );
        assert_eq!(result.reasoning.as_deref(), Some("top band is empty"));
    }

    #[test]
    fn test_fenced_json_matches_direct_fields() {
        let direct = normalize(&json!({
            "output": {"elements": [sale()], "reasoning": "x"}
        }));
        let text = format!(
            "Here is the layout:\n```json\n{}\n```\nEnjoy!",
            json!({"elements": [sale()], "reasoning": "x"})
        );
        let fenced = normalize(&json!({"output": {"text": text}}));
        assert_eq!(fenced.elements, direct.elements);
        assert_eq!(fenced.reasoning, direct.reasoning);
        assert!(fenced.raw_text.is_some());
    }

    #[test]
    fn test_fence_without_language_tag() {
        let text = format!("```{}```", json!({"elements": [sale()]}));
        let result = normalize(&json!({"rawText": text}));
        assert_eq!(result.elements.len(), 1);
    }

    #[test]
    fn test_malformed_fence_yields_empty_result() {
        let result = normalize(&json!({"output": "```json\n{not json}\n```"}));
        assert!(result.is_empty());
        assert!(result.raw_text.is_some());
    }

    #[test]
    fn test_wrong_shapes_are_absent() {
        let result = normalize(&json!({
            "imageUrl": 42,
            "elements": "nope",
            "output": {"elements": [{"position": {"x": 1}}, 7]}
        }));
        assert!(result.is_empty());
        assert!(result.raw_text.is_none());
    }

    #[test]
    fn test_image_and_elements_together() {
        let result = normalize(&json!({
            "output": {"image_url": "data:image/png;base64,AAAA", "elements": [sale()]}
        }));
        assert!(result.image_url.is_some());
        assert_eq!(result.elements.len(), 1);
    }

    #[test]
    fn test_rect_element_parses() {
        let result = normalize(&json!({
            "elements": [{"type": "rect", "position": {"x": 0, "y": 0},
                          "bounds": {"width": 100, "height": 20}, "color": "black"}]
        }));
        assert!(matches!(result.elements[0], CanvasElement::Rect(_)));
    }

    #[test]
    fn test_off_schema_style_keeps_text() {
        let result = normalize(&json!({
            "elements": [{"content": "SALE", "style": {"fontSize": "48px", "color": "red"}}]
        }));
        assert_eq!(result.elements.len(), 1);
        let CanvasElement::Text(el) = &result.elements[0] else {
            panic!("expected text element");
        };
        assert_eq!(el.content, "SALE");
        assert_eq!(el.style.font_size, None);
        assert_eq!(el.style.color.as_deref(), Some("red"));
    }

    #[test]
    fn test_numeric_color_is_absent() {
        let result = normalize(&json!({
            "elements": [{"content": "SALE", "style": {"fontSize": 48, "color": 16711680}}]
        }));
        assert_eq!(result.elements.len(), 1);
        let CanvasElement::Text(el) = &result.elements[0] else {
            panic!("expected text element");
        };
        assert_eq!(el.style.font_size, Some(48.0));
        assert_eq!(el.style.color, None);
    }

    #[test]
    fn test_partial_bounds_and_null_position() {
        let result = normalize(&json!({
            "elements": [{"text": "SALE", "position": null, "bounds": {"width": 300}}]
        }));
        assert_eq!(
            result.elements,
            vec![CanvasElement::Text(TextElement {
                content: "SALE".into(),
                position: Point::default(),
                style: TextStyle::default(),
                bounds: None,
            })]
        );
    }

    #[test]
    fn test_rect_without_height_is_skipped() {
        let result = normalize(&json!({
            "elements": [
                {"type": "rect", "bounds": {"width": 100}},
                {"type": "circle", "content": "x"},
                {"content": "KEEP"}
            ]
        }));
        assert_eq!(result.elements.len(), 1);
        assert!(matches!(&result.elements[0], CanvasElement::Text(el) if el.content == "KEEP"));
    }
}
