//! Stable identifiers derived from type structure.

use sha2::{Digest, Sha256};

use super::TypeRef;

/// Longest unique name emitted before truncation kicks in
pub const UNIQUE_NAME_LIMIT: usize = 128;

const HASH_HEX_LEN: usize = 16;

impl TypeRef {
    /// Deterministic identifier for this type, usable as a key for
    /// deduplicating generated declarations.
    ///
    /// ```rust
    /// use ferrous_inject::{ClassifierRef, QualifierTag, TypeRef};
    ///
    /// let t = ClassifierRef::type_parameter("kotlin.collections.List.E");
    /// let list = ClassifierRef::builder("kotlin.collections.List").type_parameters(vec![t]).build();
    /// let string = TypeRef::of(&ClassifierRef::class("kotlin.String"));
    ///
    /// let ty = TypeRef::with_arguments(&list, vec![string.nullable()]);
    /// assert_eq!(ty.unique_name(), "kotlin_collections_List_nullable_kotlin_String");
    ///
    /// let tagged = TypeRef::of(&ClassifierRef::class("app.Id"))
    ///     .with_qualifier(QualifierTag::new("app.UserId"));
    /// assert_eq!(tagged.unique_name(), "app_UserId_app_Id");
    /// ```
    pub fn unique_name(&self) -> String {
        self.unique_name_with_limit(UNIQUE_NAME_LIMIT)
    }

    /// Like [`TypeRef::unique_name`] with a custom length ceiling.
    ///
    /// Names over the ceiling keep a prefix and end in `_` followed by the
    /// first 16 hex digits of the SHA-256 of the full name.
    pub fn unique_name_with_limit(&self, limit: usize) -> String {
        let mut full = String::new();
        write_unique(self, &mut full);
        if full.len() <= limit {
            return full;
        }

        let digest = Sha256::digest(full.as_bytes());
        let hash: String = digest
            .iter()
            .take(HASH_HEX_LEN / 2)
            .map(|b| format!("{:02x}", b))
            .collect();

        let keep = limit.saturating_sub(HASH_HEX_LEN + 1);
        let mut truncated: String = full.chars().take(keep).collect();
        truncated.push('_');
        truncated.push_str(&hash);
        truncated
    }
}

fn write_unique(ty: &TypeRef, out: &mut String) {
    if ty.is_star_projection {
        out.push_str("star");
        return;
    }
    if ty.is_marked_nullable {
        out.push_str("nullable_");
    }
    if let Some(qualifier) = &ty.qualifier {
        push_sanitized(qualifier.name(), out);
        out.push('_');
    }
    push_sanitized(ty.classifier.fq_name(), out);
    for argument in &ty.arguments {
        out.push('_');
        write_unique(argument, out);
    }
}

fn push_sanitized(name: &str, out: &mut String) {
    if out.is_empty() && name.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }),
    );
}
