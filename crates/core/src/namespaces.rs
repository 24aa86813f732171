#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// prefix -> URI
pub type NamespaceMap = BTreeMap<String, String>;

pub const PREFIX_EMPTY: &str = "";
pub const PREFIX_JCR: &str = "jcr";
pub const PREFIX_NT: &str = "nt";
pub const PREFIX_MIX: &str = "mix";
pub const PREFIX_XML: &str = "xml";
pub const PREFIX_SV: &str = "sv";

pub const BUILTIN_NAMESPACES: [(&str, &str); 6] = [
    (PREFIX_EMPTY, ""),
    (PREFIX_JCR, "http://www.jcp.org/jcr/1.0"),
    (PREFIX_NT, "http://www.jcp.org/jcr/nt/1.0"),
    (PREFIX_MIX, "http://www.jcp.org/jcr/mix/1.0"),
    (PREFIX_XML, "http://www.w3.org/XML/1998/namespace"),
    (PREFIX_SV, "http://www.jcp.org/jcr/sv/1.0"),
];

pub fn builtin_namespaces() -> NamespaceMap {
    BUILTIN_NAMESPACES
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect()
}

pub fn is_builtin_prefix(prefix: &str) -> bool {
    BUILTIN_NAMESPACES.iter().any(|(builtin, _)| *builtin == prefix)
}

pub fn is_builtin_uri(uri: &str) -> bool {
    BUILTIN_NAMESPACES.iter().any(|(_, builtin)| *builtin == uri)
}

/// Splits `prefix:local` into its parts. Unprefixed names get the empty prefix.
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => (PREFIX_EMPTY, name),
    }
}
