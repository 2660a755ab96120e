//! Topic joining
//!
//! Rewritten topics are rooted under an optional destination base. The base
//! is treated as a directory and the rule target is resolved against it the
//! way a generic URL join resolves a relative reference:
//!
//! | base      | target        | result            |
//! |-----------|---------------|-------------------|
//! | `""`      | `out/temp`    | `out/temp`        |
//! | `home`    | `out/temp`    | `home/out/temp`   |
//! | `home/x`  | `../temp`     | `home/temp`       |
//! | `home`    | `/abs/temp`   | `/abs/temp`       |
//!
//! Absolute targets override the base. Deployed configurations may depend
//! on that, so it is kept instead of plain concatenation.

/// Schemes whose URLs always carry an authority section, even an empty one
const NETLOC_SCHEMES: &[&str] = &[
    "ftp", "http", "gopher", "nntp", "telnet", "imap", "wais", "file", "mms", "https", "shttp",
    "snews", "prospero", "rtsp", "rtsps", "rtspu", "rsync", "svn", "svn+ssh", "sftp", "nfs",
    "git", "git+ssh", "ws", "wss", "itms-services",
];

/// Schemes that support relative resolution
const RELATIVE_SCHEMES: &[&str] = &[
    "", "ftp", "http", "gopher", "nntp", "imap", "wais", "file", "https", "shttp", "mms",
    "prospero", "rtsp", "rtsps", "rtspu", "sftp", "svn", "svn+ssh", "ws", "wss",
];

/// Join a destination base and a rule target into the outbound topic
pub fn join_topic(base: &str, target: &str) -> String {
    if base.is_empty() {
        return target.to_string();
    }
    resolve(&format!("{base}/"), target)
}

#[derive(Debug, Default, Clone, Copy)]
struct Reference<'a> {
    scheme: &'a str,
    authority: Option<&'a str>,
    path: &'a str,
    query: &'a str,
    fragment: &'a str,
}

impl<'a> Reference<'a> {
    fn parse(input: &'a str) -> Self {
        let (scheme, rest) = split_scheme(input);
        let (rest, fragment) = rest.split_once('#').unwrap_or((rest, ""));
        let (rest, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };
        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }

    fn render(&self, path: &str) -> String {
        let scheme = self.scheme.to_ascii_lowercase();
        let authority = self.authority.unwrap_or("");
        // `http:` + `x` is `http:///x`: netloc schemes keep an empty authority.
        let with_authority = !authority.is_empty()
            || (NETLOC_SCHEMES.contains(&scheme.as_str()) && !path.starts_with("//"));

        let mut out = String::new();
        if !scheme.is_empty() {
            out.push_str(&scheme);
            out.push(':');
        }
        if with_authority {
            out.push_str("//");
            out.push_str(authority);
            if !path.is_empty() && !path.starts_with('/') {
                out.push('/');
            }
        }
        out.push_str(path);
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(self.query);
        }
        if !self.fragment.is_empty() {
            out.push('#');
            out.push_str(self.fragment);
        }
        out
    }
}

fn split_scheme(input: &str) -> (&str, &str) {
    let Some(colon) = input.find(':') else {
        return ("", input);
    };
    let candidate = &input[..colon];
    let valid = candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        (candidate, &input[colon + 1..])
    } else {
        ("", input)
    }
}

fn resolve(base: &str, target: &str) -> String {
    if target.is_empty() {
        return base.to_string();
    }

    let base_ref = Reference::parse(base);
    let mut reference = Reference::parse(target);

    let scheme_lower = base_ref.scheme.to_ascii_lowercase();
    let foreign_scheme =
        !reference.scheme.is_empty() && !reference.scheme.eq_ignore_ascii_case(base_ref.scheme);
    if foreign_scheme || !RELATIVE_SCHEMES.contains(&scheme_lower.as_str())
    {
        return target.to_string();
    }
    reference.scheme = base_ref.scheme;

    if reference.authority.is_some_and(|a| !a.is_empty()) {
        return reference.render(reference.path);
    }
    reference.authority = base_ref.authority;

    if reference.path.is_empty() {
        if reference.query.is_empty() {
            reference.query = base_ref.query;
        }
        return reference.render(base_ref.path);
    }

    let segments: Vec<&str> = if reference.path.starts_with('/') {
        reference.path.split('/').collect()
    } else {
        let mut base_parts: Vec<&str> = base_ref.path.split('/').collect();
        if base_parts.last().is_some_and(|last| !last.is_empty()) {
            base_parts.pop();
        }
        base_parts.extend(reference.path.split('/'));
        // Drop empty interior segments so re-joining does not double slashes.
        let last = base_parts.len() - 1;
        base_parts
            .iter()
            .enumerate()
            .filter(|(i, seg)| *i == 0 || *i == last || !seg.is_empty())
            .map(|(_, seg)| *seg)
            .collect()
    };

    let mut resolved: Vec<&str> = Vec::with_capacity(segments.len());
    for segment in &segments {
        match *segment {
            ".." => {
                resolved.pop();
            }
            "." => {}
            other => resolved.push(other),
        }
    }
    if segments.last().is_some_and(|last| *last == "." || *last == "..") {
        resolved.push("");
    }

    let path = resolved.join("/");
    let path = if path.is_empty() { "/" } else { path.as_str() };
    reference.render(path)
}
