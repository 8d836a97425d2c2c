//! SQL identifier validation.
//!
//! Table names, column names and computed-column aliases are spliced into
//! statement text (Postgres cannot bind identifiers as parameters). Record
//! tables and columns are declared constants checked by
//! [`Record::validate_mapping`](crate::Record::validate_mapping), which is not
//! run per query; call it once per record type (at startup or in a test).
//! Join computed-column aliases are checked when they are added. Computed
//! field expressions are raw SQL and are not validated.
//!
//! - Each dotted part must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - `schema.table` style names are accepted, empty parts are not

use crate::error::{OrmError, OrmResult};

/// Validate a (possibly dotted) unquoted SQL identifier.
///
/// ```ignore
/// pgdao::ident::validate_ident("public.users")?;
/// assert!(pgdao::ident::validate_ident("users; DROP TABLE x").is_err());
/// ```
pub fn validate_ident(ident: &str) -> OrmResult<()> {
    if ident.is_empty() {
        return Err(OrmError::validation("Identifier cannot be empty"));
    }

    for part in ident.split('.') {
        validate_part(ident, part)?;
    }
    Ok(())
}

/// Whether `ident` passes [`validate_ident`].
pub fn is_valid_ident(ident: &str) -> bool {
    validate_ident(ident).is_ok()
}

fn validate_part(ident: &str, part: &str) -> OrmResult<()> {
    let mut chars = part.chars();
    match chars.next() {
        None => {
            return Err(OrmError::validation(format!(
                "Empty part in identifier '{ident}'"
            )));
        }
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => {
            return Err(OrmError::validation(format!(
                "Invalid identifier start character '{c}' in '{ident}'"
            )));
        }
    }

    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(OrmError::validation(format!(
            "Invalid character '{c}' in identifier '{ident}'"
        )));
    }
    Ok(())
}
