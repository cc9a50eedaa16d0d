//! Visibility helpers for the Rust front-end.

use syn::Visibility;

/// Whether another file of the same crate can `use` an item with this visibility.
///
/// Every restricted form (`pub(crate)`, `pub(super)`, `pub(in ..)`) reaches at
/// least one other module, so all of them count as exports.
pub fn is_importable(v: &Visibility) -> bool {
    !matches!(v, Visibility::Inherited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_visibility_public() {
        let vis: Visibility = parse_quote!(pub);
        assert!(is_importable(&vis));
    }

    #[test]
    fn test_visibility_restricted() {
        let vis: Visibility = parse_quote!(pub(crate));
        assert!(is_importable(&vis));
        let vis: Visibility = parse_quote!(pub(super));
        assert!(is_importable(&vis));
    }

    #[test]
    fn test_visibility_private() {
        let vis: Visibility = Visibility::Inherited;
        assert!(!is_importable(&vis));
    }
}
