/// Derives the distro id slug from a distribution name.
///
/// The name is lower-cased and every run of spaces and `=` collapses to a
/// single hyphen. Nothing else is transformed, so applying it twice yields
/// the same id.
#[must_use]
pub fn make_distro_id(name: &str) -> String {
    let mut distro_id = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c == ' ' || c == '=' {
            if !distro_id.ends_with('-') {
                distro_id.push('-');
            }
            continue;
        }
        distro_id.push(c);
    }
    distro_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_distro_id() {
        assert_eq!(make_distro_id("Foo Bar  Cool"), "foo-bar-cool");
        assert_eq!(make_distro_id("Distro One"), "distro-one");
        assert_eq!(make_distro_id("a = b"), "a-b");
        assert_eq!(make_distro_id("Already_Slugged.pkg"), "already_slugged.pkg");
    }

    #[test]
    fn test_make_distro_id_idempotent() {
        for name in ["Foo Bar  Cool", "x==y", " lead", "trail ", "Zope.Interface"] {
            let once = make_distro_id(name);
            assert_eq!(make_distro_id(&once), once);
        }
    }
}
