//! Derivation of the stable hierarchical identifiers carried by every tree node.
//!
//! ```text
//! root      xss:<version>@<name>
//! child     <parent iri>/<name>
//! term      <term set iri>?<name>
//! ```

pub const IRI_SCHEME: &str = "xss:";
pub const VERSION_SEPARATOR: char = '@';
pub const CHILD_SEPARATOR: char = '/';
pub const TERM_SEPARATOR: char = '?';

const RESERVED: [char; 3] = [VERSION_SEPARATOR, CHILD_SEPARATOR, TERM_SEPARATOR];

/// Where a node sits, which is all its iri depends on besides its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IriContext<'a> {
    Root { version: &'a str },
    Child { parent_iri: &'a str },
    Term { term_set_iri: &'a str },
}

/// Replace every space with an underscore.
pub fn normalize_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Whether the name contains one of the separator characters. Such names
/// are accepted but yield iris that cannot be split back into segments.
pub fn has_reserved_chars(name: &str) -> bool {
    name.contains(RESERVED)
}

pub fn derive_iri(context: IriContext<'_>, name: &str) -> String {
    if has_reserved_chars(name) {
        tracing::warn!("Name '{}' contains reserved iri separators", name);
    }

    let name = normalize_name(name);
    match context {
        IriContext::Root { version } => {
            format!("{}{}{}{}", IRI_SCHEME, version, VERSION_SEPARATOR, name)
        }
        IriContext::Child { parent_iri } => format!("{}{}{}", parent_iri, CHILD_SEPARATOR, name),
        IriContext::Term { term_set_iri } => {
            format!("{}{}{}", term_set_iri, TERM_SEPARATOR, name)
        }
    }
}

/// Whether `iri` names `root` itself or a node somewhere underneath it.
pub fn is_within(iri: &str, root: &str) -> bool {
    match iri.strip_prefix(root) {
        Some("") => true,
        Some(rest) => rest.starts_with([CHILD_SEPARATOR, TERM_SEPARATOR]),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_root_iri() {
        let iri = derive_iri(IriContext::Root { version: "1.0.0" }, "test");
        assert_eq!(iri, "xss:1.0.0@test");
    }

    #[test]
    fn derives_child_and_term_iris() {
        let child = derive_iri(
            IriContext::Child {
                parent_iri: "xss:1.0.0@test",
            },
            "Course",
        );
        assert_eq!(child, "xss:1.0.0@test/Course");

        let term = derive_iri(IriContext::Term { term_set_iri: &child }, "Title");
        assert_eq!(term, "xss:1.0.0@test/Course?Title");
    }

    #[test]
    fn normalizes_spaces() {
        let iri = derive_iri(IriContext::Root { version: "0.0.1" }, "my schema name");
        assert_eq!(iri, "xss:0.0.1@my_schema_name");
    }

    #[test]
    fn derivation_is_deterministic_and_name_only_changes_tail() {
        let ctx = IriContext::Child {
            parent_iri: "xss:2.0.0@root/group",
        };
        assert_eq!(derive_iri(ctx, "a"), derive_iri(ctx, "a"));

        let a = derive_iri(ctx, "a");
        let b = derive_iri(ctx, "b");
        assert_eq!(a.rsplit_once('/').unwrap().0, b.rsplit_once('/').unwrap().0);
        assert_ne!(a, b);
    }

    #[test]
    fn reserved_characters_are_not_escaped() {
        assert!(has_reserved_chars("a/b"));
        let iri = derive_iri(IriContext::Term { term_set_iri: "xss:1.0.0@t" }, "a?b");
        assert_eq!(iri, "xss:1.0.0@t?a?b");
    }

    #[test]
    fn is_within_respects_segment_boundaries() {
        assert!(is_within("xss:1.0.0@src", "xss:1.0.0@src"));
        assert!(is_within("xss:1.0.0@src/A?B", "xss:1.0.0@src"));
        assert!(is_within("xss:1.0.0@src?B", "xss:1.0.0@src"));
        assert!(!is_within("xss:1.0.0@src2/A?B", "xss:1.0.0@src"));
        assert!(!is_within("xss:1.0.0@other", "xss:1.0.0@src"));
    }
}
