/// Parses a `style` attribute into ordered `(property, value)` pairs. Later duplicates win.
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for declaration in split_declarations(style) {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        match out.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => out.push((name, value.to_string())),
        }
    }
    out
}

fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (ix, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..ix]);
                start = ix + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

pub fn render_style(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn get<'a>(declarations: &'a [(String, String)], name: &str) -> Option<&'a str> {
    declarations
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

pub fn push(declarations: &mut Vec<(String, String)>, name: &str, value: Option<&String>) {
    if let Some(value) = value {
        declarations.push((name.to_string(), value.clone()));
    }
}

/// Expands a 1–4 value box shorthand (`margin`, `padding`) into top/right/bottom/left.
pub fn expand_box(value: &str) -> Option<[String; 4]> {
    let parts: Vec<&str> = value.split_ascii_whitespace().collect();
    let [top, right, bottom, left] = match parts.as_slice() {
        [a] => [*a, *a, *a, *a],
        [a, b] => [*a, *b, *a, *b],
        [a, b, c] => [*a, *b, *c, *b],
        [a, b, c, d] => [*a, *b, *c, *d],
        _ => return None,
    };
    Some([
        top.to_string(),
        right.to_string(),
        bottom.to_string(),
        left.to_string(),
    ])
}

/// Reads a CSS length in px (or a bare number); other units yield `None`.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn format_px(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}px", value as i64)
    } else {
        format!("{value}px")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_declarations() {
        let decls = parse_style("color:red; FONT-WEIGHT: bold;; font-family: 'a;b', serif; color: blue");
        assert_eq!(
            decls,
            vec![
                ("color".to_string(), "blue".to_string()),
                ("font-weight".to_string(), "bold".to_string()),
                ("font-family".to_string(), "'a;b', serif".to_string()),
            ]
        );
        assert_eq!(
            render_style(&decls),
            "color: blue; font-weight: bold; font-family: 'a;b', serif"
        );
    }

    #[test]
    fn expands_box_shorthands() {
        assert_eq!(
            expand_box("1px 2px"),
            Some(["1px", "2px", "1px", "2px"].map(String::from))
        );
        assert_eq!(expand_box(""), None);
    }

    #[test]
    fn px_lengths() {
        assert_eq!(parse_px("120px"), Some(120.0));
        assert_eq!(parse_px("12.5"), Some(12.5));
        assert_eq!(parse_px("3em"), None);
        assert_eq!(format_px(40.0), "40px");
    }
}
