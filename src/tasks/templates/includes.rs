//! The include graph of the template tree.
//!
//! Every template is a node, every `include`, `extends`, `import` or
//! `from` tag adds an edge from the template to the referenced one. The
//! graph is rebuilt from the sources on each run, templates affected by a
//! change are found by walking the edges backwards.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

const TAGS: &[&str] = &["include", "extends", "import", "from"];

#[derive(Debug, Default)]
pub(crate) struct IncludeGraph {
    graph: DiGraph<Utf8PathBuf, ()>,
    nodes: HashMap<Utf8PathBuf, NodeIndex>,
}

impl IncludeGraph {
    /// Reads every template in `templates` (paths relative to `source`).
    pub(crate) fn build(source: &Utf8Path, templates: &[Utf8PathBuf]) -> io::Result<Self> {
        let mut graph = Self::default();

        for template in templates {
            let text = fs::read_to_string(source.join(template))?;
            let from = graph.node(template);

            for name in references(&text) {
                let to = graph.node(Utf8Path::new(&name));
                graph.graph.update_edge(from, to, ());
            }
        }

        Ok(graph)
    }

    fn node(&mut self, path: &Utf8Path) -> NodeIndex {
        if let Some(&index) = self.nodes.get(path) {
            return index;
        }

        let index = self.graph.add_node(path.to_owned());
        self.nodes.insert(path.to_owned(), index);
        index
    }

    /// Every template which transitively references one of `changed`, the
    /// changed templates themselves included.
    pub(crate) fn dependents<'a>(
        &self,
        changed: impl IntoIterator<Item = &'a Utf8Path>,
    ) -> HashSet<Utf8PathBuf> {
        let reversed = Reversed(&self.graph);
        let mut found = HashSet::new();

        for path in changed {
            let Some(&start) = self.nodes.get(path) else {
                found.insert(path.to_owned());
                continue;
            };

            let mut dfs = Dfs::new(reversed, start);
            while let Some(index) = dfs.next(reversed) {
                found.insert(self.graph[index].clone());
            }
        }

        found
    }
}

/// Template names referenced by the tags of `text`.
fn references(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{%") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("%}") else {
            break;
        };

        let tag = after[..end].trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '+');
        let keyword = tag.split_whitespace().next().unwrap_or("");

        if TAGS.contains(&keyword) {
            names.extend(literals(&tag[keyword.len()..]));
        }

        rest = &after[end + 2..];
    }

    names
}

/// String literals of a tag body. `from` and `import` reference a single
/// template, `include` may also take a list.
fn literals(body: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '"' && c != '\'' {
            continue;
        }

        let literal: String = chars.by_ref().take_while(|&next| next != c).collect();
        if !literal.is_empty() {
            found.push(literal);
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::io::write;

    #[test]
    fn test_references() {
        let text = r#"
{% extends "_includes/layout.jinja" %}
{%- include ['_includes/a.jinja', "_includes/b.jinja"] ignore missing -%}
{% from '_includes/macros.jinja' import card %}
{% set title = "not a template" %}
"#;

        assert_eq!(
            references(text),
            vec![
                "_includes/layout.jinja",
                "_includes/a.jinja",
                "_includes/b.jinja",
                "_includes/macros.jinja",
            ]
        );
    }

    #[test]
    fn test_transitive_dependents() {
        let dir = TempDir::new().unwrap();
        let source = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        write(&source.join("_includes/head.jinja"), "<head>").unwrap();
        write(
            &source.join("_includes/layout.jinja"),
            "{% include '_includes/head.jinja' %}{% block body %}{% endblock %}",
        )
        .unwrap();
        write(
            &source.join("index.jinja"),
            "{% extends '_includes/layout.jinja' %}",
        )
        .unwrap();
        write(&source.join("about.jinja"), "<p>about</p>").unwrap();

        let templates: Vec<Utf8PathBuf> = vec![
            "_includes/head.jinja".into(),
            "_includes/layout.jinja".into(),
            "about.jinja".into(),
            "index.jinja".into(),
        ];
        let graph = IncludeGraph::build(&source, &templates).unwrap();

        let found = graph.dependents([Utf8Path::new("_includes/layout.jinja")]);
        let mut found: Vec<_> = found.iter().map(|p| p.as_str()).collect();
        found.sort();
        assert_eq!(found, vec!["_includes/layout.jinja", "index.jinja"]);

        let found = graph.dependents([Utf8Path::new("_includes/head.jinja")]);
        let mut found: Vec<_> = found.iter().map(|p| p.as_str()).collect();
        found.sort();

        assert_eq!(
            found,
            vec!["_includes/head.jinja", "_includes/layout.jinja", "index.jinja"]
        );
    }
}
