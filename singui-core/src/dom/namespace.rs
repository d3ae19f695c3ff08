//! Namespace aliases.
//!
//! Builders name namespaces by short alias (`"svg"`); backends that speak
//! real XML namespaces resolve the alias here. Anything that is not a known
//! alias is taken to be a namespace URI already.

pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const HTML: &str = "http://www.w3.org/1999/xhtml";
pub const SVG: &str = "http://www.w3.org/2000/svg";
pub const MATHML: &str = "http://www.w3.org/1998/Math/MathML";
pub const XLINK: &str = "http://www.w3.org/1999/xlink";
pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

/// Resolve a namespace alias to its URI.
pub fn resolve(alias: &str) -> &str {
    match alias {
        "xml" => XML,
        "html" => HTML,
        "svg" => SVG,
        "math" => MATHML,
        "xlink" => XLINK,
        "xmlns" => XMLNS,
        uri => uri,
    }
}
