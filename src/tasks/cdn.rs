use std::fs;
use std::time::Instant;

use glob::Pattern;

use crate::core::{Environment, TaskContext, as_overhead};
use crate::engine::Task;
use crate::error::RewriteError;
use crate::io::glob_files;

const ATTRIBUTES: &[&str] = &["src=", "href="];

/// Points `src` and `href` attributes of the published pages at the CDN.
pub struct ExternalizeCdn;

impl ExternalizeCdn {
    /// Returns the number of rewritten pages.
    pub fn run(&self, env: &Environment) -> Result<usize, RewriteError> {
        let options = &env.profile.cdn;
        if !options.enabled {
            tracing::debug!("CDN references are disabled for this profile");
            return Ok(0);
        }

        let files = options
            .files
            .iter()
            .map(|glob| Pattern::new(glob))
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = 0;
        for page in glob_files::<RewriteError>(&env.publish_dir(), "**/*.html")? {
            let html = fs::read_to_string(&page) //
                .map_err(|e| RewriteError::Io(page.to_string(), e))?;

            let rewritten = externalize(&html, &options.base, &files);
            if rewritten != html {
                fs::write(&page, rewritten) //
                    .map_err(|e| RewriteError::Io(page.to_string(), e))?;
                count += 1;
            }
        }

        Ok(count)
    }
}

/// The CDN location of `value`, when it names a local file matched by one of
/// `files`.
fn to_cdn(value: &str, base: &str, files: &[Pattern]) -> Option<String> {
    let skip = ["//", "data:", "#", "mailto:"];
    if value.contains("://") || skip.iter().any(|prefix| value.starts_with(prefix)) {
        return None;
    }

    let path = value.trim_start_matches("./").trim_start_matches('/');
    let bare = path.split(['?', '#']).next().unwrap_or(path);

    files
        .iter()
        .any(|pattern| pattern.matches(bare))
        .then(|| format!("{}/{path}", base.trim_end_matches('/')))
}

fn externalize(html: &str, base: &str, files: &[Pattern]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some((index, attribute)) = ATTRIBUTES
        .iter()
        .filter_map(|a| rest.find(a).map(|i| (i, *a)))
        .min()
    {
        let value_start = index + attribute.len();
        let quote = rest[value_start..].chars().next();
        let preceded = rest[..index].chars().next_back().is_none_or(char::is_whitespace);

        let (Some(quote @ ('"' | '\'')), true) = (quote, preceded) else {
            out.push_str(&rest[..value_start]);
            rest = &rest[value_start..];
            continue;
        };

        let value_start = value_start + 1;
        let Some(len) = rest[value_start..].find(quote) else {
            break;
        };

        let value = &rest[value_start..value_start + len];
        out.push_str(&rest[..value_start]);
        match to_cdn(value, base, files) {
            Some(url) => out.push_str(&url),
            None => out.push_str(value),
        }

        rest = &rest[value_start + len..];
    }

    out.push_str(rest);
    out
}

impl Task for ExternalizeCdn {
    fn name(&self) -> &'static str {
        "externalize-cdn"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        let count = self.run(context.env)?;
        tracing::info!("externalized references in {count} pages {}", as_overhead(start));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;
    use crate::config::Profile;
    use crate::core::Mode;
    use crate::io::write;

    fn patterns() -> Vec<Pattern> {
        ["img/**", "vendor/**", "css/**"]
            .iter()
            .map(|p| Pattern::new(p).unwrap())
            .collect()
    }

    #[test]
    fn test_externalize() {
        let html = r#"<link href="css/style.1a2b3c4d.css"><img src="/img/logo.png?v=2" alt="x"><a href="/listings/detail.html"><script src="https://unpkg.com/x.js"></script><a data-href="img/a.png" href='#top'>"#;

        let expected = r#"<link href="https://cdn.example.com/css/style.1a2b3c4d.css"><img src="https://cdn.example.com/img/logo.png?v=2" alt="x"><a href="/listings/detail.html"><script src="https://unpkg.com/x.js"></script><a data-href="img/a.png" href='#top'>"#;

        assert_eq!(
            externalize(html, "https://cdn.example.com/", &patterns()),
            expected
        );
    }

    #[test]
    fn test_disabled_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let page = "<img src=\"img/a.png\">";
        write(&root.join("online/index.html"), page).unwrap();

        let mut profile = Profile::online();
        let env = Environment::new(profile.clone(), root.clone(), Mode::Build);
        assert_eq!(ExternalizeCdn.run(&env).unwrap(), 0);
        assert_eq!(fs::read_to_string(root.join("online/index.html")).unwrap(), page);

        profile.cdn.enabled = true;
        profile.cdn.base = "https://cdn.example.com".into();
        let env = Environment::new(profile, root.clone(), Mode::Build);
        assert_eq!(ExternalizeCdn.run(&env).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(root.join("online/index.html")).unwrap(),
            "<img src=\"https://cdn.example.com/img/a.png\">"
        );
    }
}
