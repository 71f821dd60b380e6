//! XMPP addressing: parsing, validation and normalization of JIDs.
//!
//! A JID has the textual form `[node "@"] domain ["/" resource]` (RFC 6122)
//! and is the wire representation used in stanza `to`/`from` attributes.
//! Parsing is total: malformed input produces an invalid [`Jid`] value whose
//! derived strings collapse to empty, never an error. That matches how
//! addresses are consumed during routing, where a bad `from` attribute
//! rejects one stanza, not the connection.

use std::fmt;

/// Maximum byte length of each JID component (RFC 6122 §2.1).
///
/// An oversized component invalidates the whole identifier rather than being
/// truncated; truncation could alias two distinct addresses.
const MAX_COMPONENT_BYTES: usize = 1023;

/// Control characters are never legal in any component.
fn has_control(s: &str) -> bool {
    s.chars().any(|c| c.is_control())
}

/// Whitespace is disallowed in node and domain (nodeprep/nameprep).
/// Resourceprep permits it, so resources are not checked with this.
fn has_whitespace(s: &str) -> bool {
    s.chars().any(|c| c.is_whitespace())
}

/// Structured XMPP address of the form `node@domain/resource`.
///
/// Immutable value type: construction case-folds node and domain, validates
/// every component and caches the derived `bare` and `full` strings. Copies
/// are independent values. Node and resource are kept as `Option` internally
/// so that "absent" and "present but empty" stay distinguishable (a raw
/// string ending in `/` has an empty resource, which most callers treat the
/// same as no resource at all).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    node: Option<String>,
    domain: String,
    resource: Option<String>,
    bare: String,
    full: String,
    valid: bool,
}

impl Jid {
    /// Parse a raw address string.
    ///
    /// Splitting is first-delimiter-wins: the first `/` ends the bare part
    /// and everything after it (including further `/` or `@`) is the
    /// resource; within the bare part, the first `@` ends the node. A second
    /// `@` therefore lands in the domain and invalidates it. Never fails;
    /// structural violations yield `is_valid() == false`.
    pub fn new(raw: &str) -> Self {
        let (bare_part, resource) = match raw.split_once('/') {
            Some((bare, res)) => (bare, Some(res.to_string())),
            None => (raw, None),
        };
        let (node, domain) = match bare_part.split_once('@') {
            Some((node, domain)) => (Some(node.to_string()), domain.to_string()),
            None => (None, bare_part.to_string()),
        };
        Self::assemble(node, domain, resource)
    }

    /// Build an address from explicit components.
    ///
    /// An empty `node` or `resource` means "absent". Validation and
    /// case-folding are the same as for [`Jid::new`].
    pub fn from_parts(node: &str, domain: &str, resource: &str) -> Self {
        Self::assemble(
            (!node.is_empty()).then(|| node.to_string()),
            domain.to_string(),
            (!resource.is_empty()).then(|| resource.to_string()),
        )
    }

    /// Single construction path shared by every constructor: normalize,
    /// validate, cache the derived forms.
    fn assemble(node: Option<String>, domain: String, resource: Option<String>) -> Self {
        let node = node.map(|n| n.to_lowercase());
        let domain = domain.to_lowercase();
        let valid = Self::well_formed(node.as_deref(), &domain, resource.as_deref());

        let (bare, full) = if valid {
            let bare = match &node {
                Some(n) => format!("{}@{}", n, domain),
                None => domain.clone(),
            };
            let full = match &resource {
                Some(r) => format!("{}/{}", bare, r),
                None => bare.clone(),
            };
            (bare, full)
        } else {
            (String::new(), String::new())
        };

        Self {
            node,
            domain,
            resource,
            bare,
            full,
            valid,
        }
    }

    fn well_formed(node: Option<&str>, domain: &str, resource: Option<&str>) -> bool {
        if domain.is_empty()
            || domain.len() > MAX_COMPONENT_BYTES
            || domain.contains('@')
            || domain.contains('/')
            || has_whitespace(domain)
            || has_control(domain)
        {
            return false;
        }
        if let Some(n) = node {
            if n.is_empty()
                || n.len() > MAX_COMPONENT_BYTES
                || n.contains('@')
                || n.contains('/')
                || has_whitespace(n)
                || has_control(n)
            {
                return false;
            }
        }
        if let Some(r) = resource {
            if r.len() > MAX_COMPONENT_BYTES || has_control(r) {
                return false;
            }
        }
        true
    }

    /// Node (local part), case-folded. Empty when absent or invalid.
    pub fn node(&self) -> &str {
        if !self.valid {
            return "";
        }
        self.node.as_deref().unwrap_or("")
    }

    /// Domain, case-folded. Empty when the address is invalid.
    pub fn domain(&self) -> &str {
        if self.valid {
            &self.domain
        } else {
            ""
        }
    }

    /// Resource, case-sensitive. Empty when absent or invalid.
    pub fn resource(&self) -> &str {
        if !self.valid {
            return "";
        }
        self.resource.as_deref().unwrap_or("")
    }

    /// Address without its resource: `node@domain`, or the domain alone.
    /// Empty when the address is invalid.
    pub fn bare(&self) -> &str {
        &self.bare
    }

    /// Full textual form, the representation placed in stanza attributes.
    /// Empty when the address is invalid.
    pub fn full(&self) -> &str {
        &self.full
    }

    /// True when every component is syntactically well-formed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True when the address renders to the empty string.
    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// New address with the node replaced (empty string removes it).
    /// Derived forms are recomputed; `self` is untouched.
    pub fn with_node(&self, node: &str) -> Self {
        Self::assemble(
            (!node.is_empty()).then(|| node.to_string()),
            self.domain.clone(),
            self.resource.clone(),
        )
    }

    /// New address with the resource replaced (empty string removes it).
    pub fn with_resource(&self, resource: &str) -> Self {
        Self::assemble(
            self.node.clone(),
            self.domain.clone(),
            (!resource.is_empty()).then(|| resource.to_string()),
        )
    }

    /// Component-wise equality. With `include_resource == false` the
    /// comparison is between bare addresses: resources are ignored on both
    /// sides.
    pub fn compare(&self, other: &Jid, include_resource: bool) -> bool {
        self.node == other.node
            && self.domain == other.domain
            && (!include_resource || self.resource == other.resource)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl From<&str> for Jid {
    fn from(raw: &str) -> Self {
        Jid::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- parsing tests ---

    #[test]
    fn test_parse_full_address() {
        let jid = Jid::new("a@b.com/res");
        assert!(jid.is_valid());
        assert_eq!(jid.node(), "a");
        assert_eq!(jid.domain(), "b.com");
        assert_eq!(jid.resource(), "res");
        assert_eq!(jid.bare(), "a@b.com");
        assert_eq!(jid.full(), "a@b.com/res");
    }

    #[test]
    fn test_parse_domain_only() {
        let jid = Jid::new("b.com");
        assert!(jid.is_valid());
        assert!(jid.node().is_empty());
        assert!(jid.resource().is_empty());
        assert_eq!(jid.domain(), "b.com");
        assert_eq!(jid.bare(), "b.com");
        assert_eq!(jid.full(), "b.com");
    }

    #[test]
    fn test_parse_bare_address() {
        let jid = Jid::new("alice@wonderland.lit");
        assert!(jid.is_valid());
        assert_eq!(jid.node(), "alice");
        assert_eq!(jid.bare(), "alice@wonderland.lit");
        assert_eq!(jid.full(), "alice@wonderland.lit");
        assert!(jid.resource().is_empty());
    }

    #[test]
    fn test_parse_empty_string_is_invalid() {
        let jid = Jid::new("");
        assert!(!jid.is_valid());
        assert!(jid.is_empty());
    }

    #[test]
    fn test_parse_empty_domain_is_invalid() {
        // "a@" has a node but nothing after the separator
        let jid = Jid::new("a@");
        assert!(!jid.is_valid());
        assert!(jid.full().is_empty());
        assert!(jid.bare().is_empty());
        assert!(jid.domain().is_empty());
    }

    #[test]
    fn test_parse_round_trip() {
        for s in [
            "a@b.com/res",
            "b.com",
            "a@b.com",
            "room@muc.example.org/Nick Name",
            "user@example.com/work/laptop",
        ] {
            assert_eq!(Jid::new(s).full(), s, "round trip failed for {:?}", s);
        }
    }

    // --- delimiter edge cases ---

    #[test]
    fn test_trailing_slash_yields_empty_resource() {
        // Empty resource is distinguishable from no resource, and still
        // renders with the trailing slash.
        let jid = Jid::new("b.com/");
        assert!(jid.is_valid());
        assert!(jid.resource().is_empty());
        assert_eq!(jid.full(), "b.com/");
        assert_eq!(jid.bare(), "b.com");

        let bare_only = Jid::new("b.com");
        assert!(!jid.compare(&bare_only, true));
        assert!(jid.compare(&bare_only, false));
    }

    #[test]
    fn test_at_sign_in_resource_is_resource_content() {
        // The resource starts at the first slash; later separators are data.
        let jid = Jid::new("a@b.com/c@d");
        assert!(jid.is_valid());
        assert_eq!(jid.node(), "a");
        assert_eq!(jid.domain(), "b.com");
        assert_eq!(jid.resource(), "c@d");
    }

    #[test]
    fn test_slash_before_at_means_no_node() {
        // First slash wins: the at sign lands inside the resource.
        let jid = Jid::new("dom/res@x");
        assert!(jid.is_valid());
        assert!(jid.node().is_empty());
        assert_eq!(jid.domain(), "dom");
        assert_eq!(jid.resource(), "res@x");
    }

    #[test]
    fn test_double_at_invalidates_domain() {
        // Only the first at sign delimits the node; the second stays in the
        // domain, which may not contain one.
        let jid = Jid::new("a@b@c");
        assert!(!jid.is_valid());
        assert!(jid.full().is_empty());
    }

    #[test]
    fn test_slash_in_resource_is_kept() {
        let jid = Jid::new("a@b.com/home/desk");
        assert!(jid.is_valid());
        assert_eq!(jid.resource(), "home/desk");
        assert_eq!(jid.full(), "a@b.com/home/desk");
    }

    #[test]
    fn test_empty_node_before_at_is_invalid() {
        let jid = Jid::new("@b.com");
        assert!(!jid.is_valid());
    }

    // --- validation tests ---

    #[test]
    fn test_whitespace_in_domain_is_invalid() {
        assert!(!Jid::new("a@b c.com").is_valid());
        assert!(!Jid::new("a@b.com\t").is_valid());
    }

    #[test]
    fn test_whitespace_in_node_is_invalid() {
        assert!(!Jid::new("a b@c.com").is_valid());
    }

    #[test]
    fn test_whitespace_in_resource_is_allowed() {
        // Resourceprep permits spaces ("Nick Name" is a common MUC resource).
        let jid = Jid::new("room@muc.example.org/Nick Name");
        assert!(jid.is_valid());
        assert_eq!(jid.resource(), "Nick Name");
    }

    #[test]
    fn test_control_characters_are_invalid() {
        assert!(!Jid::new("a@b.com/res\u{0000}").is_valid());
        assert!(!Jid::new("a\u{0007}@b.com").is_valid());
        assert!(!Jid::new("a@b\u{001b}.com").is_valid());
    }

    #[test]
    fn test_oversized_component_is_invalid() {
        let big = "x".repeat(MAX_COMPONENT_BYTES + 1);
        assert!(!Jid::new(&format!("{}@b.com", big)).is_valid());
        assert!(!Jid::new(&format!("a@{}", big)).is_valid());
        assert!(!Jid::new(&format!("a@b.com/{}", big)).is_valid());

        let exact = "x".repeat(MAX_COMPONENT_BYTES);
        assert!(Jid::new(&format!("a@b.com/{}", exact)).is_valid());
    }

    // --- normalization tests ---

    #[test]
    fn test_node_and_domain_are_case_folded() {
        let jid = Jid::new("Alice@Wonderland.LIT/Tea Party");
        assert!(jid.is_valid());
        assert_eq!(jid.node(), "alice");
        assert_eq!(jid.domain(), "wonderland.lit");
        // Resource keeps its case
        assert_eq!(jid.resource(), "Tea Party");
        assert_eq!(jid.full(), "alice@wonderland.lit/Tea Party");
    }

    #[test]
    fn test_case_folded_addresses_compare_equal() {
        let a = Jid::new("Alice@Example.COM/r");
        let b = Jid::new("alice@example.com/r");
        assert!(a.compare(&b, true));
        assert_eq!(a, b);
    }

    // --- comparison tests ---

    #[test]
    fn test_compare_ignoring_resource() {
        let r1 = Jid::new("a@b.com/r1");
        let r2 = Jid::new("a@b.com/r2");
        assert!(r1.compare(&r2, false));
        assert!(!r1.compare(&r2, true));
    }

    #[test]
    fn test_compare_different_nodes() {
        let a = Jid::new("a@b.com/r");
        let b = Jid::new("x@b.com/r");
        assert!(!a.compare(&b, false));
        assert!(!a.compare(&b, true));
    }

    #[test]
    fn test_compare_same_value() {
        let a = Jid::new("a@b.com/r");
        assert!(a.compare(&a.clone(), true));
    }

    // --- component constructor and replacement tests ---

    #[test]
    fn test_from_parts_matches_parse() {
        let built = Jid::from_parts("a", "b.com", "res");
        let parsed = Jid::new("a@b.com/res");
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_from_parts_case_folds() {
        let jid = Jid::from_parts("Alice", "EXAMPLE.com", "Home");
        assert_eq!(jid.full(), "alice@example.com/Home");
    }

    #[test]
    fn test_from_parts_empty_components_are_absent() {
        let jid = Jid::from_parts("", "b.com", "");
        assert!(jid.is_valid());
        assert_eq!(jid.full(), "b.com");
    }

    #[test]
    fn test_from_parts_empty_domain_is_invalid() {
        assert!(!Jid::from_parts("a", "", "r").is_valid());
    }

    #[test]
    fn test_with_node_recomputes_derived_forms() {
        let jid = Jid::new("a@b.com/res");
        let renamed = jid.with_node("z");
        assert_eq!(renamed.full(), "z@b.com/res");
        assert_eq!(renamed.bare(), "z@b.com");
        // Original is untouched
        assert_eq!(jid.full(), "a@b.com/res");
    }

    #[test]
    fn test_with_node_empty_removes_node() {
        let jid = Jid::new("a@b.com/res");
        assert_eq!(jid.with_node("").full(), "b.com/res");
    }

    #[test]
    fn test_with_resource_recomputes_derived_forms() {
        let jid = Jid::new("a@b.com/old");
        assert_eq!(jid.with_resource("new").full(), "a@b.com/new");
        assert_eq!(jid.with_resource("").full(), "a@b.com");
    }

    #[test]
    fn test_with_resource_on_bare_address() {
        let jid = Jid::new("a@b.com");
        assert_eq!(jid.with_resource("mobile").full(), "a@b.com/mobile");
    }

    // --- display tests ---

    #[test]
    fn test_display_renders_full_form() {
        assert_eq!(Jid::new("a@b.com/r").to_string(), "a@b.com/r");
        assert_eq!(Jid::new("a@").to_string(), "");
    }

    #[test]
    fn test_from_str_reference() {
        let jid: Jid = "a@b.com".into();
        assert_eq!(jid.bare(), "a@b.com");
    }
}
