//! 摘录定位：`"开头...结尾"` 形式，忽略引号样式、空白与大小写

fn normalize(value: &str) -> String {
    value
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 拆出开头与结尾；没有 `...` 时两者相同
fn excerpt_parts(excerpt: &str) -> (String, String) {
    let trimmed = excerpt.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed).trim();

    let mut parts = trimmed.split("...");
    let start = parts.next().unwrap_or_default().trim();
    let end = parts
        .next()
        .filter(|e| !e.is_empty())
        .unwrap_or(start)
        .trim();
    (start.to_string(), end.to_string())
}

/// 源文中能先找到开头、再在其后找到结尾
pub fn source_contains_excerpt(source_text: &str, excerpt: &str) -> bool {
    let (start, end) = excerpt_parts(excerpt);
    if start.is_empty() {
        return false;
    }
    let source = normalize(source_text);
    let Some(start_index) = source.find(&normalize(&start)) else {
        return false;
    };
    source[start_index..].contains(&normalize(&end))
}
