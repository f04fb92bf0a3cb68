//! Titles of nestable entities.
//!
//! Nestable entities such as locations carry a title that chains the
//! ancestor names: `Europe/Germany/Berlin` is the location `Berlin`
//! below `Europe/Germany`.

/// Split a title into the entity's own name and its parent title.
pub fn split_title(title: &str) -> (String, Option<String>) {
    match title.rsplit_once('/') {
        Some((parent, name)) => (name.to_string(), Some(parent.to_string())),
        None => (title.to_string(), None),
    }
}

/// Build a title from an entity name and an optional parent title.
pub fn build_title(name: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}/{name}"),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_title_plain_name() {
        assert_eq!(split_title("Berlin"), ("Berlin".to_string(), None));
    }

    #[test]
    fn test_split_title_nested() {
        assert_eq!(
            split_title("Europe/Germany/Berlin"),
            ("Berlin".to_string(), Some("Europe/Germany".to_string()))
        );
    }

    #[test]
    fn test_build_title() {
        assert_eq!(build_title("Berlin", None), "Berlin");
        assert_eq!(build_title("Berlin", Some("Europe/Germany")), "Europe/Germany/Berlin");
        assert_eq!(build_title("Berlin", Some("")), "Berlin");
    }

    #[test]
    fn test_split_and_build_round_trip() {
        let (name, parent) = split_title("Europe/Germany");
        assert_eq!(build_title(&name, parent.as_deref()), "Europe/Germany");
    }
}
