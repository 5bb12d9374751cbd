use indicatif::{ProgressBar, ProgressStyle};

/// Level names go on the wire with spaces as `+` (`county subdivision` -> `county+subdivision`).
pub(crate) fn plus_spaces(s: &str) -> String {
    s.trim().replace(' ', "+")
}

/// First non-empty line of a response body, trimmed.
pub(crate) fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

pub(crate) fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    let quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')));
    if quoted { &s[1..s.len() - 1] } else { s }
}

/// Separator for the first parameter appended to `base`.
pub(crate) fn query_separator(base: &str) -> &'static str {
    if base.ends_with('?') || base.ends_with('&') {
        ""
    } else if base.contains('?') {
        "&"
    } else {
        "?"
    }
}

pub(crate) fn last_path_segment(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

pub(crate) fn spinner(enabled: bool, message: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    let template = "{spinner:.green} {msg} [{pos} done, {elapsed}]";
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    Some(pb)
}
