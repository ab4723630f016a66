pub(crate) const INDEX_HTML: &str = include_str!("templates/index.html");
