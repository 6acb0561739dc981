//! Page URL ↔ slug ↔ subject term.

/// Role suffixes stripped from a slug to get the technology part.
const ROLE_SUFFIXES: &[&str] = &[
    "-developers",
    "-developer",
    "-engineers",
    "-engineer",
    "-analysts",
    "-analyst",
    "-scientists",
    "-scientist",
];

/// Slug bases whose display form is not plain title case.
const KNOWN_CASING: &[(&str, &str)] = &[
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("php", "PHP"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("ios", "iOS"),
    ("asp-net", "ASP.NET"),
    ("net", ".NET"),
    ("node-js", "Node.js"),
    ("react-native", "React Native"),
    ("vue-js", "Vue.js"),
    ("next-js", "Next.js"),
    ("three-js", "Three.js"),
    ("ruby-on-rails", "Ruby on Rails"),
];

/// Last non-empty path segment of a URL.
///
/// `https://lemon.io/hire/python-developers/` → `python-developers`.
pub fn slug_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Strip the role suffix: `python-developers` → `python`.
pub fn slug_base(slug: &str) -> &str {
    ROLE_SUFFIXES
        .iter()
        .find_map(|suffix| slug.strip_suffix(suffix))
        .filter(|base| !base.is_empty())
        .unwrap_or(slug)
}

/// Display term for a slug: `node-js-developers` → `Node.js`.
pub fn subject_from_slug(slug: &str) -> String {
    let base = slug_base(slug);
    if let Some((_, display)) = KNOWN_CASING.iter().find(|(key, _)| *key == base) {
        return display.to_string();
    }
    base.split('-')
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn subject_from_url(url: &str) -> String {
    subject_from_slug(&slug_from_url(url))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_from_url() {
        assert_eq!(
            slug_from_url("https://lemon.io/hire/python-developers/"),
            "python-developers"
        );
        assert_eq!(
            slug_from_url("https://lemon.io/hire/Go-Developers?ref=x"),
            "go-developers"
        );
        assert_eq!(slug_from_url("react-developers"), "react-developers");
    }

    #[test]
    fn test_slug_base_strips_role() {
        assert_eq!(slug_base("python-developers"), "python");
        assert_eq!(slug_base("data-scientist"), "data");
        assert_eq!(slug_base("devops-engineers"), "devops");
        assert_eq!(slug_base("devops"), "devops");
        assert_eq!(slug_base("-developers"), "-developers");
    }

    #[test]
    fn test_subject_known_casing() {
        assert_eq!(subject_from_slug("node-js-developers"), "Node.js");
        assert_eq!(subject_from_slug("asp-net-developers"), "ASP.NET");
        assert_eq!(subject_from_slug("ios-developers"), "iOS");
        assert_eq!(subject_from_slug("ruby-on-rails-developers"), "Ruby on Rails");
    }

    #[test]
    fn test_subject_title_case_fallback() {
        assert_eq!(subject_from_slug("python-developers"), "Python");
        assert_eq!(subject_from_slug("machine-learning-engineers"), "Machine Learning");
        assert_eq!(
            subject_from_url("https://lemon.io/hire/golang-developers/"),
            "Golang"
        );
    }
}
