/*
 * Episode identifiers. Numbered broadcast episodes use the `ep` type and a
 * two-digit zero-padded number (`ep01`); special types (`op`, `ed`, `pv`, ...)
 * may carry a free-text suffix that is sanitized into a path-safe form.
 */

pub const NUMBERED_EPISODE_TYPE: &str = "ep";
pub const EPISODE_NUMBER_WIDTH: usize = 2;

pub fn is_numbered_type(type_tag: &str) -> bool {
    type_tag.trim().eq_ignore_ascii_case(NUMBERED_EPISODE_TYPE)
}

/* Spaces and path separators become underscores. */
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

/*
 * Builds the episode id for a type tag and optional identifier:
 * - `ep` + digits -> `ep` + zero-padded number (`ep` + "1" -> `ep01`)
 * - type + identifier -> `<type>_<identifier>`, or just the identifier when it
 *   already spells the type (`op` + "OP" -> `OP`)
 * - type alone -> the type
 * Returns `None` when both parts are empty.
 */
pub fn build_episode_id(type_tag: &str, identifier: Option<&str>) -> Option<String> {
    let type_tag = type_tag.trim().to_lowercase();
    let identifier = identifier.map(str::trim).filter(|s| !s.is_empty());

    match identifier {
        Some(ident)
            if type_tag == NUMBERED_EPISODE_TYPE && ident.bytes().all(|b| b.is_ascii_digit()) =>
        {
            let number: u64 = ident.parse().ok()?;
            Some(format!(
                "{NUMBERED_EPISODE_TYPE}{number:0width$}",
                width = EPISODE_NUMBER_WIDTH
            ))
        }
        Some(ident) => {
            let safe = sanitize_identifier(ident);
            if type_tag.is_empty() || type_tag == ident.to_lowercase() {
                Some(safe)
            } else {
                Some(format!("{type_tag}_{safe}"))
            }
        }
        None if type_tag.is_empty() => None,
        None => Some(type_tag),
    }
}

/*
 * An episode id names a folder directly under the project root, so it must be a
 * single plain path component.
 */
pub fn is_valid_episode_id(id: &str) -> bool {
    const FORBIDDEN: &[char] = &['/', '\\', ':'];
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.chars().any(|c| FORBIDDEN.contains(&c) || c.is_control())
}
