//! Lecture des coordonnées saisies
//!
//! Formats acceptés :
//! - tableau JSON de `{"x": .., "y": ..}` ou de `[x, y]`
//! - une ligne par sommet : `395400 793850`, `395400,793850`, `P1: 395400; 793850`
//!
//! Les lignes vides et celles commençant par `#` sont ignorées.

use std::sync::OnceLock;

use empietement::Coordinate;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Ligne {line}: coordonnée illisible '{content}' (attendu: X Y)")]
    Line { line: usize, content: String },

    #[error("JSON de coordonnées invalide: {0}")]
    Json(String),
}

fn point_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:[Pp]?\d+\s*[:=)]\s*)?(-?\d+(?:\.\d+)?)\s*(?:[,;]\s*|\s+)(-?\d+(?:\.\d+)?)\s*$",
        )
        .expect("regex valide")
    })
}

/// Lit un sommet `X Y` (ou `X,Y`, `X;Y`)
pub fn parse_point(text: &str) -> Option<Coordinate> {
    let caps = point_regex().captures(text)?;
    let x = caps.get(1)?.as_str().parse().ok()?;
    let y = caps.get(2)?.as_str().parse().ok()?;
    Some(Coordinate::new(x, y))
}

/// Lit une saisie complète, JSON ou texte ligne à ligne
pub fn parse_coordinates(text: &str) -> Result<Vec<Coordinate>, InputError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return parse_json(trimmed);
    }

    let mut points = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let point = parse_point(content).ok_or_else(|| InputError::Line {
            line: i + 1,
            content: content.to_string(),
        })?;
        points.push(point);
    }
    Ok(points)
}

fn parse_json(text: &str) -> Result<Vec<Coordinate>, InputError> {
    if let Ok(points) = serde_json::from_str::<Vec<Coordinate>>(text) {
        return Ok(points);
    }
    serde_json::from_str::<Vec<[f64; 2]>>(text)
        .map(|pairs| pairs.into_iter().map(|[x, y]| Coordinate::new(x, y)).collect())
        .map_err(|e| InputError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_variants() {
        let expected = Some(Coordinate::new(395400.0, 793850.5));
        assert_eq!(parse_point("395400 793850.5"), expected);
        assert_eq!(parse_point("395400,793850.5"), expected);
        assert_eq!(parse_point("395400 ; 793850.5"), expected);
        assert_eq!(parse_point("P1: 395400 793850.5"), expected);
        assert_eq!(parse_point("3) 395400, 793850.5"), expected);
        assert_eq!(parse_point("395400"), None);
        assert_eq!(parse_point("x y"), None);
    }

    #[test]
    fn test_parse_lines() {
        let text = "# levé du 12/03\nP1: 395400 793850\n\nP2: 395500 793850\nP3: 395500 793950\n";
        let points = parse_coordinates(text).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], Coordinate::new(395500.0, 793950.0));
    }

    #[test]
    fn test_parse_bad_line() {
        let err = parse_coordinates("395400 793850\nabc\n").unwrap_err();
        assert_eq!(
            err,
            InputError::Line {
                line: 2,
                content: "abc".into()
            }
        );
    }

    #[test]
    fn test_parse_json_forms() {
        let objects = parse_coordinates(r#"[{"x": 395400, "y": 793850}, {"x": 395500, "y": 793850}]"#).unwrap();
        let pairs = parse_coordinates("[[395400, 793850], [395500, 793850]]").unwrap();
        assert_eq!(objects, pairs);
        assert!(parse_coordinates("[1, 2").is_err());
    }
}
