//! Origin labels to short comments

const MAX_VERBATIM: usize = 100;
const TRUNCATED: usize = 97;

/// Convert an origin label into a YAML comment.
///
/// Known scope labels are shortened to their category and name, for
/// example `Env/Cloud: acme/prod` becomes `# cloud: prod`. Unknown labels
/// are kept, truncated with `...` when longer than 100 characters. Labels
/// that already are comments pass through unchanged.
#[must_use]
pub fn origin_to_comment(origin: &str) -> String {
    if origin.trim_start().starts_with('#') {
        return single_line(origin);
    }
    let lower = origin.to_lowercase();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| origin.starts_with(p));
    let labelled = |label: &str, name: Option<&str>| match name {
        Some(name) => single_line(&format!("# {label}: {name}")),
        None => format!("# {label}"),
    };

    if starts(&["Env/Tenant:", "Params/Tenant:"]) {
        return labelled("tenant", name_after_colon(origin, ':', 0));
    }
    if starts(&["Env/Cloud:", "Params/Cloud:"]) {
        return labelled("cloud", name_after_colon(origin, '/', 1));
    }
    if starts(&["Env/Namespace:", "Params/Namespace:"]) {
        return labelled("namespace", name_after_colon(origin, '/', 2));
    }
    if starts(&["Application:", "Env/Namespace/App:", "Env/Cloud/App:", "Params/App:"]) {
        return labelled("application", name_after_colon(origin, ':', 0));
    }
    if lower.contains("sbom") {
        let name = name_after_colon(origin, ':', 0)
            .filter(|_| lower.contains("resource-profile-baseline"));
        return labelled("sbom, resource-profile-baseline", name);
    }
    if lower.contains("resource-profile-override") {
        return labelled("resource-profile-override", name_after_colon(origin, ':', 0));
    }
    if lower.contains("calculated") {
        return "# envgene calculated".to_string();
    }
    if ["pipeline parameter", "extra_params", "extra-params"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return "# envgene pipeline parameter".to_string();
    }
    if lower.contains("envgene default") || lower == "default" {
        return "# envgene default".to_string();
    }

    if origin.chars().count() > MAX_VERBATIM {
        let head: String = origin.chars().take(TRUNCATED).collect();
        single_line(&format!("# {head}..."))
    } else {
        single_line(&format!("# {origin}"))
    }
}

/// Part `index` of the text after the first colon, split by `delimiter`.
/// Falls back to the last non-empty part.
fn name_after_colon(origin: &str, delimiter: char, index: usize) -> Option<&str> {
    let (_, after) = origin.split_once(':')?;
    let after = after.trim();
    if after.is_empty() {
        return None;
    }
    let parts: Vec<&str> = after.split(delimiter).map(str::trim).collect();
    parts
        .get(index)
        .copied()
        .filter(|p| !p.is_empty())
        .or_else(|| parts.last().copied().filter(|p| !p.is_empty()))
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}
