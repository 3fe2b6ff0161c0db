//! Secret references
//!
//! Manifests refer to secrets as `((map.key))`. GitHub Actions reads them
//! from repository secrets, named `EE_<MAP>_<KEY>`.

/// Prefix of secrets provisioned for halfpipe workflows
pub const SECRET_PREFIX: &str = "EE_";

/// Turn a whole-value `((map.key))` reference into a secrets expression.
///
/// - `((github.token))` -> `${{ secrets.EE_GITHUB_TOKEN }}`
/// - `((team-a.api-key))` -> `${{ secrets.EE_TEAM_A_API_KEY }}`
/// - `prefix-((map.key))` -> unchanged (embedded reference)
/// - `regular_value` -> unchanged
#[must_use]
pub fn secret_ref(value: &str) -> String {
    let trimmed = value.trim();
    let Some(inner) = trimmed
        .strip_prefix("((")
        .and_then(|rest| rest.strip_suffix("))"))
    else {
        return value.to_string();
    };

    let Some((map, key)) = inner.split_once('.') else {
        return value.to_string();
    };
    if map.is_empty() || key.is_empty() || inner.contains(['(', ')', ' ']) {
        return value.to_string();
    }

    format!("${{{{ secrets.{} }}}}", secret_name(map, key))
}

fn secret_name(map: &str, key: &str) -> String {
    let name: String = format!("{map}_{key}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{SECRET_PREFIX}{name}")
}
